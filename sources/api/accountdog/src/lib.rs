/*!
# Introduction

accountdog provisions local users and groups on an appliance whose whole configuration lives in
one XML document.  It works on the document through `configxml`, so the appliance's own tools
see the new accounts as if they'd been added through its UI.

It can:
* create users, with an optional description, expiry date, password, group memberships and lock
* set a user's password, from plain text (hashed with bcrypt) or an existing bcrypt hash
* lock, unlock and expire users
* create groups with existing users as members, and add users to groups

Each call returns an `Outcome`.  Expected problems, like creating a user that already exists,
are `Outcome::Rejected` with a reason and leave the document alone; only a failure of the
document itself (missing counter, unparseable XML, I/O) is an `Err`.

Batches of groups and users can be applied from a TOML file; see the `batch` module.  After a
batch changes anything, the `accountdog` binary runs the appliance's reload command.
*/

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod outcome;
pub mod password;
pub mod reload;

pub use backend::{ConfigXmlBackend, IdentityBackend};
pub use batch::{Batch, BatchReport, GroupSpec, UserSpec};
pub use config::{Config, Layout};
pub use error::{Error, Result};
pub use outcome::{Outcome, Rejection};
pub use password::{Bcrypt, PasswordHasher};
