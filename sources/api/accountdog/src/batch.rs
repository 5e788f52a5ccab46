/*!
A batch describes the groups and users to provision in one run, in TOML:

```toml
[[groups]]
name = "admins"
description = "Appliance administrators"
members = ["root"]

[[users]]
name = "bob"
gecos = "Bob Smith"
expiredate = "2030-01-31"
groups = ["admins"]
hashed-passwd = "$2b$10$..."
lock-passwd = false
```

Groups are applied before users, so new users can join new groups; a group's `members` can
only name users that already exist.  Each entity is applied on its own: a rejection or failure
is recorded in the report and the rest of the batch carries on.
*/

use log::{error, info, warn};
use serde::Deserialize;
use snafu::ResultExt;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::backend::IdentityBackend;
use crate::error::{self, Result};
use crate::outcome::{Outcome, Rejection};

/// The optional settings of a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserSpec {
    /// Free-form description, stored as the user's `descr`.
    pub gecos: Option<String>,
    /// `YYYY-MM-DD` or `MM/DD/YYYY`.
    pub expiredate: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub lock_passwd: bool,
    #[serde(default)]
    pub expired: bool,
    pub plain_text_passwd: Option<String>,
    pub hashed_passwd: Option<String>,
    pub passwd: Option<String>,
}

impl UserSpec {
    /// The password to set, and whether it's already hashed.  A plain-text password wins over
    /// a hashed one, and `hashed-passwd` over `passwd`, which is always treated as a hash.
    pub fn password(&self) -> Option<(&str, bool)> {
        let given = [
            (&self.plain_text_passwd, false),
            (&self.hashed_passwd, true),
            (&self.passwd, true),
        ];
        let mut present = given
            .iter()
            .filter_map(|(secret, hashed)| secret.as_deref().map(|s| (s, *hashed)));
        let chosen = present.next();
        if chosen.is_some() && present.next().is_some() {
            warn!("More than one password given; using the first of plain-text-passwd, hashed-passwd, passwd");
        }
        chosen
    }
}

/// The optional settings of a new group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSpec {
    pub description: Option<String>,
    /// Names of existing users.
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(flatten)]
    pub spec: UserSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    #[serde(flatten)]
    pub spec: GroupSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl Batch {
    pub fn parse(data: &str) -> Result<Self> {
        toml::from_str(data).context(error::BatchParseSnafu)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).context(error::BatchReadSnafu { path })?;
        Self::parse(&data)
    }

    /// Applies the batch, groups first.  Never stops early; check the report for what
    /// happened to each entity.
    pub fn apply<B: IdentityBackend>(&self, backend: &mut B) -> BatchReport {
        let mut report = BatchReport::default();

        for group in &self.groups {
            let result = backend.create_group(&group.name, &group.spec);
            report.record(EntityKind::Group, &group.name, result);
        }
        for user in &self.users {
            let result = backend.create_user(&user.name, &user.spec);
            report.record(EntityKind::User, &user.name, result);
        }

        info!("{}", report);
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

/// What happened to one entity of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryResult {
    Done,
    Rejected(Rejection),
    /// The store failed; holds the error message.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub kind: EntityKind,
    pub name: String,
    pub result: EntryResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn record(&mut self, kind: EntityKind, name: &str, result: Result<Outcome>) {
        let result = match result {
            Ok(Outcome::Done) => EntryResult::Done,
            Ok(Outcome::Rejected(rejection)) => EntryResult::Rejected(rejection),
            Err(e) => {
                error!("Failed to create {} '{}': {}", kind, name, e);
                EntryResult::Failed(e.to_string())
            }
        };
        self.entries.push(BatchEntry {
            kind,
            name: name.to_string(),
            result,
        });
    }

    fn count(&self, wanted: fn(&EntryResult) -> bool) -> usize {
        self.entries.iter().filter(|e| wanted(&e.result)).count()
    }

    /// How many entities were created.
    pub fn changed(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Done))
    }

    pub fn rejected(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Rejected(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Failed(_)))
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Applied batch: {} created, {} rejected, {} failed",
            self.changed(),
            self.rejected(),
            self.failed()
        )?;
        for entry in &self.entries {
            match &entry.result {
                EntryResult::Done => {}
                EntryResult::Rejected(rejection) => {
                    write!(f, "\n  {} '{}' rejected: {}", entry.kind, entry.name, rejection)?
                }
                EntryResult::Failed(msg) => {
                    write!(f, "\n  {} '{}' failed: {}", entry.kind, entry.name, msg)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::test::backend;
    use configxml::{ConfigPath, DocumentStore};

    static BATCH: &str = r#"
[[groups]]
name = "admins"
description = "Administrators"
members = ["ghost"]

[[groups]]
name = "admins"

[[users]]
name = "bob"
gecos = "Bob Smith"
groups = ["admins"]
plain-text-passwd = "secret"

[[users]]
name = "bob"

[[users]]
name = ""

[[users]]
name = "carol"
expiredate = "2031-12-01"
lock-passwd = true
"#;

    #[test]
    fn parse() {
        let batch = Batch::parse(BATCH).unwrap();
        assert_eq!(batch.groups.len(), 2);
        assert_eq!(batch.groups[0].spec.members, vec!["ghost"]);
        assert_eq!(batch.users.len(), 4);

        let bob = &batch.users[0];
        assert_eq!(bob.name, "bob");
        assert_eq!(bob.spec.gecos.as_deref(), Some("Bob Smith"));
        assert_eq!(bob.spec.password(), Some(("secret", false)));
        assert!(batch.users[3].spec.lock_passwd);

        assert!(Batch::parse("").unwrap().users.is_empty());
        assert!(Batch::parse("[[users]]\ngecos = \"no name\"\n").is_err());
    }

    #[test]
    fn password_choice() {
        let spec = UserSpec {
            passwd: Some("$2b$x".to_string()),
            hashed_passwd: Some("$2a$y".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.password(), Some(("$2a$y", true)));
        assert_eq!(UserSpec::default().password(), None);
    }

    #[test]
    fn apply_continues_past_rejections() {
        let batch = Batch::parse(BATCH).unwrap();
        let mut b = backend();
        let report = batch.apply(&mut b);

        assert_eq!(report.changed(), 3);
        assert_eq!(report.rejected(), 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(
            report.entries[3].result,
            EntryResult::Rejected(Rejection::DuplicateUser("bob".to_string()))
        );

        let summary = report.to_string();
        assert!(summary.starts_with("Applied batch: 3 created, 3 rejected, 0 failed"));
        assert!(summary.contains("group 'admins' rejected"));

        let store = b.store();
        let users = store
            .get_elements(&ConfigPath::new("system/user").unwrap())
            .unwrap();
        assert_eq!(users.len(), 2);
        let members = store
            .get_element(&ConfigPath::new("system/group/member").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(members.as_str(), Some("2000"));
    }

    #[test]
    fn store_failures_are_reported() {
        let store = configxml::MemoryDocumentStore::from_xml("<pfsense/>").unwrap();
        let mut b = crate::backend::ConfigXmlBackend::new(
            store,
            crate::backend::test::FakeHasher,
            &crate::config::Layout::default(),
        )
        .unwrap();

        let batch = Batch::parse("[[users]]\nname = \"a\"\n[[users]]\nname = \"b\"\n").unwrap();
        let report = batch.apply(&mut b);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.changed(), 0);
    }
}
