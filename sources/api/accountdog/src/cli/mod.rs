use accountdog::{
    reload, Batch, BatchReport, Bcrypt, Config, ConfigXmlBackend, IdentityBackend, Outcome,
};
use argh::FromArgs;
use configxml::{ConfigPath, DocumentStore, FilesystemDocumentStore};
use log::info;
use snafu::{ensure, OptionExt, ResultExt};
use std::path::PathBuf;

use crate::error::{self, Result};

type Backend = ConfigXmlBackend<FilesystemDocumentStore, Bcrypt>;

fn backend(config: &Config) -> Result<Backend> {
    let store = FilesystemDocumentStore::new(&config.config_file);
    ConfigXmlBackend::new(store, Bcrypt::new(config.bcrypt_cost), &config.layout)
        .context(error::AccountdogSnafu)
}

/// Turns a rejected call into an error, so the exit code reflects it.
fn check(outcome: Result<Outcome>) -> Result<()> {
    match outcome? {
        Outcome::Done => Ok(()),
        Outcome::Rejected(rejection) => error::RejectedSnafu {
            reason: rejection.to_string(),
        }
        .fail(),
    }
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "apply")]
/// Create the groups and users described in a batch file
pub(crate) struct ApplyArgs {
    #[argh(positional)]
    /// TOML batch file
    batch: PathBuf,

    #[argh(switch)]
    /// don't run the reload command afterward
    no_reload: bool,
}

pub(crate) fn apply(config: &Config, args: ApplyArgs) -> Result<()> {
    let batch = Batch::from_path(&args.batch).context(error::AccountdogSnafu)?;
    let mut backend = backend(config)?;
    let report = batch.apply(&mut backend);
    println!("{}", report);

    if should_reload(&report, args.no_reload) {
        reload::reload(&config.reload_command).context(error::ReloadSnafu)?;
    }

    let failed = report.failed();
    ensure!(failed == 0, error::BatchFailedSnafu { failed });
    Ok(())
}

/// The document only needs reloading if the batch changed something.
fn should_reload(report: &BatchReport, no_reload: bool) -> bool {
    if report.changed() == 0 {
        info!("Nothing changed, not reloading");
        return false;
    }
    if no_reload {
        info!("Skipping reload");
        return false;
    }
    true
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "get")]
/// Print what's at a path of the configuration document, as JSON
pub(crate) struct GetArgs {
    #[argh(positional)]
    /// path, like 'system/user'
    path: String,
}

pub(crate) fn get(config: &Config, args: GetArgs) -> Result<()> {
    let store = FilesystemDocumentStore::new(&config.config_file);
    let path = ConfigPath::new(&args.path).context(error::DocumentSnafu)?;
    let value = store
        .get_element(&path)
        .context(error::DocumentSnafu)?
        .context(error::NothingAtPathSnafu { path: args.path })?;
    let json = serde_json::to_string_pretty(&value).context(error::SerializeJsonSnafu)?;
    println!("{}", json);
    Ok(())
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "set-password")]
/// Set a user's password
pub(crate) struct SetPasswordArgs {
    #[argh(positional)]
    /// user name
    user: String,

    #[argh(positional)]
    /// new password, or bcrypt hash with --hashed
    secret: String,

    #[argh(switch)]
    /// the secret is already a bcrypt hash
    hashed: bool,
}

pub(crate) fn set_password(config: &Config, args: SetPasswordArgs) -> Result<()> {
    let mut backend = backend(config)?;
    check(
        backend
            .set_password(&args.user, &args.secret, args.hashed)
            .context(error::AccountdogSnafu),
    )
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "lock")]
/// Disable a user
pub(crate) struct LockArgs {
    #[argh(positional)]
    /// user name
    user: String,
}

pub(crate) fn lock(config: &Config, args: LockArgs) -> Result<()> {
    let mut backend = backend(config)?;
    check(backend.lock(&args.user).context(error::AccountdogSnafu))
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "unlock")]
/// Re-enable a disabled user
pub(crate) struct UnlockArgs {
    #[argh(positional)]
    /// user name
    user: String,
}

pub(crate) fn unlock(config: &Config, args: UnlockArgs) -> Result<()> {
    let mut backend = backend(config)?;
    check(backend.unlock(&args.user).context(error::AccountdogSnafu))
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "expire")]
/// Expire a user, which disables it
pub(crate) struct ExpireArgs {
    #[argh(positional)]
    /// user name
    user: String,
}

pub(crate) fn expire(config: &Config, args: ExpireArgs) -> Result<()> {
    let mut backend = backend(config)?;
    check(backend.expire(&args.user).context(error::AccountdogSnafu))
}
