//! The provisioning calls, and their implementation against the configuration document.
//!
//! Users and groups are records in collections of the document, found by scanning the
//! collection for a matching `name` field.  New uids and gids come from counters in the
//! document.  A user's password hash lives in its `bcrypt-hash` field; a locked user has an
//! empty `disabled` field.

use chrono::NaiveDate;
use configxml::{ConfigPath, DocumentStore, Record, Value};
use log::{debug, info, warn};
use snafu::ResultExt;

use crate::batch::{GroupSpec, UserSpec};
use crate::config::Layout;
use crate::error::{self, Result};
use crate::outcome::{Outcome, Rejection};
use crate::password::PasswordHasher;

const NAME_FIELD: &str = "name";
const HASH_FIELD: &str = "bcrypt-hash";
const DISABLED_FIELD: &str = "disabled";
const USER_SCOPE: &str = "user";
const GROUP_SCOPE: &str = "system";

/// Expiry dates are accepted in ISO form and stored the way the appliance displays them.
const ISO_DATE: &str = "%Y-%m-%d";
const DISPLAY_DATE: &str = "%m/%d/%Y";

/// The calls used to provision identities.  Expected problems, like a name that's already
/// taken, come back as `Outcome::Rejected`; `Err` means the store itself failed.
pub trait IdentityBackend {
    fn create_user(&mut self, name: &str, spec: &UserSpec) -> Result<Outcome>;

    /// Sets the user's password.  If `hashed`, the secret is stored as-is, as long as it looks
    /// like a supported hash; otherwise it's hashed first.
    fn set_password(&mut self, name: &str, secret: &str, hashed: bool) -> Result<Outcome>;

    fn lock(&mut self, name: &str) -> Result<Outcome>;

    fn unlock(&mut self, name: &str) -> Result<Outcome>;

    /// The appliance has no separate notion of an expired account, so this locks it.
    fn expire(&mut self, name: &str) -> Result<Outcome> {
        self.lock(name)
    }

    fn create_group(&mut self, name: &str, spec: &GroupSpec) -> Result<Outcome>;

    fn add_user_to_group(&mut self, uid: &str, group: &str) -> Result<Outcome>;
}

pub struct ConfigXmlBackend<S, H> {
    store: S,
    hasher: H,
    users: ConfigPath,
    groups: ConfigPath,
    next_uid: ConfigPath,
    next_gid: ConfigPath,
}

impl<S, H> ConfigXmlBackend<S, H>
where
    S: DocumentStore,
    H: PasswordHasher,
{
    pub fn new(store: S, hasher: H, layout: &Layout) -> Result<Self> {
        let parse = |field: &'static str, path: &str| {
            ConfigPath::new(path).context(error::LayoutPathSnafu { field, path })
        };
        Ok(Self {
            store,
            hasher,
            users: parse("users", &layout.users)?,
            groups: parse("groups", &layout.groups)?,
            next_uid: parse("next-uid", &layout.next_uid)?,
            next_gid: parse("next-gid", &layout.next_gid)?,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns every member of a collection that's a record.
    fn members(&self, collection: &ConfigPath) -> Result<Vec<Record>> {
        Ok(self
            .store
            .get_elements(collection)
            .context(error::StoreSnafu)?
            .into_iter()
            .filter_map(Value::into_record)
            .collect())
    }

    /// Names are compared trimmed, the way the document reads them back.
    fn find(&self, collection: &ConfigPath, name: &str) -> Result<Option<Record>> {
        let name = name.trim();
        Ok(self
            .members(collection)?
            .into_iter()
            .find(|r| r.get_str(NAME_FIELD) == Some(name)))
    }

    fn find_user(&self, name: &str) -> Result<Option<Record>> {
        self.find(&self.users, name)
    }

    fn find_group(&self, name: &str) -> Result<Option<Record>> {
        self.find(&self.groups, name)
    }

    fn replace_user(&mut self, name: &str, user: &Record) -> Result<()> {
        self.store
            .replace_element(&self.users, NAME_FIELD, name, user)
            .context(error::StoreSnafu)?;
        Ok(())
    }

    /// Runs the steps that follow a new user's creation.  They're each logged on failure and
    /// never undo the creation.
    fn finish_user(&mut self, name: &str, uid: &str, spec: &UserSpec) {
        if let Some((secret, hashed)) = spec.password() {
            let result = self.set_password(name, secret, hashed);
            log_follow_up(name, "set password", result);
        }

        for group in &spec.groups {
            match self.add_user_to_group(uid, group) {
                Ok(Outcome::Done) => {}
                Ok(Outcome::Rejected(_)) => warn!(
                    "Unable to add user '{}' to group '{}', group does not exist",
                    name, group
                ),
                Err(e) => warn!("Unable to add user '{}' to group '{}': {}", name, group, e),
            }
        }

        if spec.lock_passwd || spec.expired {
            let result = self.lock(name);
            log_follow_up(name, "lock", result);
        }
    }
}

fn log_follow_up(name: &str, step: &str, result: Result<Outcome>) {
    match result {
        Ok(Outcome::Done) => {}
        Ok(Outcome::Rejected(rejection)) => {
            warn!("Could not {} for new user '{}': {}", step, name, rejection)
        }
        Err(e) => warn!("Could not {} for new user '{}': {}", step, name, e),
    }
}

/// Converts an expiry date to the appliance's display format.  Dates already in that format
/// are kept; anything else is None.
fn format_expiry(date: &str) -> Option<String> {
    let date = date.trim();
    if let Ok(parsed) = NaiveDate::parse_from_str(date, ISO_DATE) {
        return Some(parsed.format(DISPLAY_DATE).to_string());
    }
    NaiveDate::parse_from_str(date, DISPLAY_DATE)
        .ok()
        .map(|parsed| parsed.format(DISPLAY_DATE).to_string())
}

impl<S, H> IdentityBackend for ConfigXmlBackend<S, H>
where
    S: DocumentStore,
    H: PasswordHasher,
{
    fn create_user(&mut self, name: &str, spec: &UserSpec) -> Result<Outcome> {
        let name = name.trim();
        if name.is_empty() {
            info!("Unable to create user, name cannot be empty");
            return Ok(Rejection::EmptyName.into());
        }
        if self.find_user(name)?.is_some() {
            info!("User '{}' already exists, skipping", name);
            return Ok(Rejection::DuplicateUser(name.to_string()).into());
        }
        let expires = match spec.expiredate.as_deref() {
            None => None,
            Some(date) => match format_expiry(date) {
                Some(formatted) => Some(formatted),
                None => {
                    info!("Unable to create user '{}', bad expiry date '{}'", name, date);
                    return Ok(Rejection::InvalidExpiry(date.to_string()).into());
                }
            },
        };

        let uid = self
            .store
            .allocate_counter(&self.next_uid)
            .context(error::StoreSnafu)?
            .to_string();

        let mut user = Record::new();
        user.insert(NAME_FIELD, name);
        user.insert("uid", uid.as_str());
        user.insert("scope", USER_SCOPE);
        if let Some(descr) = &spec.gecos {
            user.insert("descr", descr.as_str());
        }
        if let Some(expires) = expires {
            user.insert("expires", expires);
        }
        self.store
            .append_element(&self.users, &user)
            .context(error::StoreSnafu)?;
        info!("Created user '{}' with uid {}", name, uid);

        self.finish_user(name, &uid, spec);
        Ok(Outcome::Done)
    }

    fn set_password(&mut self, name: &str, secret: &str, hashed: bool) -> Result<Outcome> {
        let name = name.trim();
        let mut user = match self.find_user(name)? {
            Some(user) => user,
            None => {
                info!("User '{}' does not exist", name);
                return Ok(Rejection::UnknownUser(name.to_string()).into());
            }
        };

        let hash = if hashed {
            if !self.hasher.looks_hashed(secret) {
                info!("Invalid bcrypt hash for user '{}', skipping", name);
                return Ok(Rejection::InvalidHash(name.to_string()).into());
            }
            secret.to_string()
        } else {
            self.hasher.hash(secret)?
        };

        user.insert(HASH_FIELD, hash);
        self.replace_user(name, &user)?;
        info!("Set password for user '{}'", name);
        Ok(Outcome::Done)
    }

    fn lock(&mut self, name: &str) -> Result<Outcome> {
        let name = name.trim();
        let mut user = match self.find_user(name)? {
            Some(user) => user,
            None => {
                info!("User '{}' does not exist", name);
                return Ok(Rejection::UnknownUser(name.to_string()).into());
            }
        };
        if user.contains(DISABLED_FIELD) {
            debug!("User '{}' is already locked", name);
            return Ok(Outcome::Done);
        }

        user.insert(DISABLED_FIELD, Value::Absent);
        self.replace_user(name, &user)?;
        info!("Locked user '{}'", name);
        Ok(Outcome::Done)
    }

    fn unlock(&mut self, name: &str) -> Result<Outcome> {
        let name = name.trim();
        let mut user = match self.find_user(name)? {
            Some(user) => user,
            None => {
                info!("User '{}' does not exist", name);
                return Ok(Rejection::UnknownUser(name.to_string()).into());
            }
        };
        if user.remove(DISABLED_FIELD).is_none() {
            debug!("User '{}' is not locked", name);
            return Ok(Outcome::Done);
        }

        self.replace_user(name, &user)?;
        info!("Unlocked user '{}'", name);
        Ok(Outcome::Done)
    }

    fn create_group(&mut self, name: &str, spec: &GroupSpec) -> Result<Outcome> {
        let name = name.trim();
        if name.is_empty() {
            info!("Unable to create group, name cannot be empty");
            return Ok(Rejection::EmptyName.into());
        }
        if self.find_group(name)?.is_some() {
            info!("Group '{}' already exists, skipping", name);
            return Ok(Rejection::DuplicateGroup(name.to_string()).into());
        }

        let gid = self
            .store
            .allocate_counter(&self.next_gid)
            .context(error::StoreSnafu)?
            .to_string();

        // Members have to exist already; there's no waiting for users created later.
        let users = self.members(&self.users)?;
        let mut member_uids: Vec<String> = Vec::new();
        for member in &spec.members {
            let uid = users
                .iter()
                .find(|u| u.get_str(NAME_FIELD) == Some(member.as_str()))
                .and_then(|u| u.get_str("uid"));
            match uid {
                Some(uid) if !member_uids.iter().any(|m| m == uid) => {
                    member_uids.push(uid.to_string())
                }
                Some(_) => {}
                None => warn!(
                    "Unable to add group member '{}' to group '{}'; user does not exist",
                    member, name
                ),
            }
        }

        let mut group = Record::new();
        group.insert(NAME_FIELD, name);
        if let Some(description) = &spec.description {
            group.insert("description", description.as_str());
        }
        group.insert("scope", GROUP_SCOPE);
        group.insert("gid", gid.as_str());
        if !member_uids.is_empty() {
            group.insert(
                "member",
                member_uids.into_iter().map(Value::from).collect::<Vec<_>>(),
            );
        }
        self.store
            .append_element(&self.groups, &group)
            .context(error::StoreSnafu)?;
        info!("Created group '{}' with gid {}", name, gid);
        Ok(Outcome::Done)
    }

    fn add_user_to_group(&mut self, uid: &str, group_name: &str) -> Result<Outcome> {
        let group_name = group_name.trim();
        let mut group = match self.find_group(group_name)? {
            Some(group) => group,
            None => {
                info!("Group '{}' does not exist", group_name);
                return Ok(Rejection::UnknownGroup(group_name.to_string()).into());
            }
        };

        let mut members = group.scalars("member");
        if members.iter().any(|m| m == uid) {
            info!("User {} already in group '{}'", uid, group_name);
            return Ok(Outcome::Done);
        }

        members.push(uid.to_string());
        group.insert(
            "member",
            members.into_iter().map(Value::from).collect::<Vec<_>>(),
        );
        self.store
            .replace_element(&self.groups, NAME_FIELD, group_name, &group)
            .context(error::StoreSnafu)?;
        info!("Added user {} to group '{}'", uid, group_name);
        Ok(Outcome::Done)
    }
}
