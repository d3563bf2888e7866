use thiserror::Error;

use crate::core::host::HostError;
use crate::core::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid expression: {0}")]
    Syntax(String),
    #[error("expression too large: {0}")]
    TooLarge(String),
    #[error("invalid user pattern '{0}': expected nick, user@host or nick!user@host")]
    InvalidUserPattern(String),
}

impl From<regex::Error> for PatternError {
    fn from(err: regex::Error) -> Self {
        match &err {
            regex::Error::CompiledTooBig(_) => Self::TooLarge(err.to_string()),
            _ => Self::Syntax(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("alert '{0}' already exists")]
    NameConflict(String),
    #[error("alert is not a member of this registry")]
    NotMember,
    #[error("alert already belongs to a registry")]
    AlreadyMember,
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("value for {setting} must be {expected}")]
    InvalidValue {
        setting: &'static str,
        expected: String,
    },
    #[error("{0} cannot be cleared")]
    NotClearable(&'static str),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected an alert record or an array of records")]
    NotARecord,
    #[error("record has no name")]
    MissingName,
    #[error("unknown flag '{0}'")]
    InvalidFlags(char),
    #[error("invalid color '{0}'")]
    InvalidColor(String),
    #[error("invalid filter rule '{0}': must start with '+' or '-'")]
    InvalidFilterRule(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Failures of engine-level alert management.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("alert '{0}' not found")]
    NotFound(String),
    #[error("no alerts are currently defined")]
    NoAlerts,
    #[error("missing argument")]
    MissingArgument,
    #[error("sharing every alert at once is not supported, as it may flood the channel")]
    ShareAll,
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("failed to serialize alerts: {0}")]
    Serialize(#[from] serde_json::Error),
}
