/*!
# Introduction

accountdog adds local users and groups to the appliance's configuration document and tells the
appliance to reload it.

Subcommands:
* `apply <batch.toml>`: create the groups and users described in a batch file, print a summary,
  and run the reload command if anything changed (unless `--no-reload` is given)
* `get <path>`: print what's at a path of the document, as JSON
* `set-password <user> <secret>`: set a user's password; `--hashed` means the secret is
  already a bcrypt hash
* `lock <user>`, `unlock <user>`, `expire <user>`

The document's location, the reload command, the bcrypt cost and where users and groups live in
the document come from `/etc/accountdog.toml` (or `--config`); anything unset there uses the
appliance's defaults.
*/

#![deny(rust_2018_idioms)]

use accountdog::config::{Config, DEFAULT_CONFIG_PATH};
use argh::FromArgs;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};
use snafu::ResultExt;
use std::path::PathBuf;
use std::process;

use crate::error::Result;

mod cli;

/// Provisions users and groups in the appliance configuration document.
#[derive(FromArgs, Debug)]
struct Args {
    #[argh(option, default = "PathBuf::from(DEFAULT_CONFIG_PATH)")]
    /// path to accountdog's own config file
    config: PathBuf,

    #[argh(option, default = "LevelFilter::Info")]
    /// filter level for log messages
    log_level: LevelFilter,

    #[argh(subcommand)]
    subcommand: SubCommand,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Apply(cli::ApplyArgs),
    Get(cli::GetArgs),
    SetPassword(cli::SetPasswordArgs),
    Lock(cli::LockArgs),
    Unlock(cli::UnlockArgs),
    Expire(cli::ExpireArgs),
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    // SimpleLogger will send errors to stderr and anything less to stdout.
    SimpleLogger::init(args.log_level, LogConfig::default()).context(error::LoggerSnafu)?;

    let config = Config::from_path(&args.config).context(error::AccountdogSnafu)?;

    match args.subcommand {
        SubCommand::Apply(apply) => cli::apply(&config, apply),
        SubCommand::Get(get) => cli::get(&config, get),
        SubCommand::SetPassword(set_password) => cli::set_password(&config, set_password),
        SubCommand::Lock(lock) => cli::lock(&config, lock),
        SubCommand::Unlock(unlock) => cli::unlock(&config, unlock),
        SubCommand::Expire(expire) => cli::expire(&config, expire),
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub(crate) enum Error {
        #[snafu(display("{}", source))]
        Accountdog { source: accountdog::Error },

        #[snafu(display("{}", source))]
        Document { source: configxml::Error },

        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },

        #[snafu(display("Error serializing to JSON: {}", source))]
        SerializeJson { source: serde_json::Error },

        #[snafu(display("Nothing found at '{}'", path))]
        NothingAtPath { path: String },

        #[snafu(display("{}", reason))]
        Rejected { reason: String },

        #[snafu(display("Batch had {} failure(s)", failed))]
        BatchFailed { failed: usize },

        #[snafu(display(
            "Batch changed the document, but reloading failed; run the reload command by hand: {}",
            source
        ))]
        Reload { source: accountdog::Error },
    }

    pub(crate) type Result<T> = std::result::Result<T, Error>;
}
