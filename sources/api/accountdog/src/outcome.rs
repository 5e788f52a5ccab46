use std::fmt;

/// The result of a provisioning call that didn't hit a structural failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Done)
    }

    /// A human-readable reason, if the call was rejected.
    pub fn reason(&self) -> Option<String> {
        self.rejection().map(|r| r.to_string())
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Done => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

/// Why a provisioning call was turned down.  None of these change the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyName,
    DuplicateUser(String),
    DuplicateGroup(String),
    UnknownUser(String),
    UnknownGroup(String),
    /// The user whose pre-hashed password didn't look like a supported hash.
    InvalidHash(String),
    /// An expiry date we couldn't parse.
    InvalidExpiry(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyName => write!(f, "name cannot be empty"),
            Rejection::DuplicateUser(name) => write!(f, "user '{}' already exists", name),
            Rejection::DuplicateGroup(name) => write!(f, "group '{}' already exists", name),
            Rejection::UnknownUser(name) => write!(f, "user '{}' does not exist", name),
            Rejection::UnknownGroup(name) => write!(f, "group '{}' does not exist", name),
            Rejection::InvalidHash(name) => {
                write!(f, "password given for user '{}' is not a bcrypt hash", name)
            }
            Rejection::InvalidExpiry(date) => {
                write!(f, "expiry date '{}' is not YYYY-MM-DD or MM/DD/YYYY", date)
            }
        }
    }
}
