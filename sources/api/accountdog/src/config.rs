//! Settings for accountdog itself, read from a TOML file.  Every field has a default matching a
//! stock appliance, so a missing file or an empty one is fine.

use log::debug;
use serde::Deserialize;
use snafu::ResultExt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{self, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/accountdog.toml";
pub const DEFAULT_DOCUMENT_PATH: &str = "/cf/conf/config.xml";
pub const DEFAULT_RELOAD_COMMAND: &str = "/etc/rc.reload_all";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// The configuration document to provision into.
    pub config_file: PathBuf,
    /// Program and arguments run after a batch changes the document.
    pub reload_command: Vec<String>,
    pub bcrypt_cost: u32,
    pub layout: Layout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            reload_command: vec![DEFAULT_RELOAD_COMMAND.to_string()],
            bcrypt_cost: bcrypt::DEFAULT_COST,
            layout: Layout::default(),
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults if it doesn't exist.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e).context(error::ConfigReadSnafu { path }),
        };
        toml::from_str(&data).context(error::ConfigParseSnafu { path })
    }
}

/// Where users, groups and their id counters live in the document.  The last segment of
/// `users` and `groups` is the tag of one member of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Layout {
    pub users: String,
    pub groups: String,
    pub next_uid: String,
    pub next_gid: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            users: "system/user".to_string(),
            groups: "system/group".to_string(),
            next_uid: "system/nextuid".to_string(),
            next_gid: "system/nextgid".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_path(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reload_command, vec!["/etc/rc.reload_all"]);
    }

    #[test]
    fn partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accountdog.toml");
        fs::write(
            &path,
            r#"
config-file = "/tmp/config.xml"
bcrypt-cost = 4

[layout]
next-uid = "system/uidcounter"
"#,
        )
        .unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.config_file, PathBuf::from("/tmp/config.xml"));
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(config.layout.next_uid, "system/uidcounter");
        assert_eq!(config.layout.users, "system/user");
        assert_eq!(config.reload_command, vec![DEFAULT_RELOAD_COMMAND]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accountdog.toml");
        fs::write(&path, "config-path = \"/tmp/x\"\n").unwrap();
        assert!(Config::from_path(&path).is_err());
    }
}
