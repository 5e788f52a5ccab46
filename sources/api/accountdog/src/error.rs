use snafu::Snafu;
use std::io;
use std::path::PathBuf;
use std::process::Output;

/// Failures that stop an operation outright.  Expected conditions like a duplicate name are
/// not errors; see `Outcome`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Configuration document operation failed: {}", source))]
    Store { source: configxml::Error },

    #[snafu(display("Invalid '{}' path '{}' in layout: {}", field, path, source))]
    LayoutPath {
        field: &'static str,
        path: String,
        source: configxml::Error,
    },

    #[snafu(display("Failed to hash password: {}", source))]
    Hash { source: bcrypt::BcryptError },

    #[snafu(display("Failed to read config file '{}': {}", path.display(), source))]
    ConfigRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse config file '{}': {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Failed to read batch file '{}': {}", path.display(), source))]
    BatchRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse batch: {}", source))]
    BatchParse { source: toml::de::Error },

    #[snafu(display("Reload command is empty"))]
    EmptyReloadCommand,

    #[snafu(display("Failed to execute '{}': {}", command, source))]
    ReloadExecution { command: String, source: io::Error },

    #[snafu(display("'{}' failed ({}) - stderr: {}",
                    command, output.status, String::from_utf8_lossy(&output.stderr)))]
    ReloadFailure { command: String, output: Output },
}

pub type Result<T> = std::result::Result<T, Error>;
