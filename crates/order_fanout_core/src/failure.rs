//! Failure injection policy used to exercise redelivery and dead-letter paths.

use serde_json::Value;

use crate::contract::OrderMessage;

const ALL_ROLES: &str = "all";

/// Decoded form of the `forceFail` message field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailureSpec {
    #[default]
    None,
    All,
    SingleRole(String),
    RoleList(Vec<String>),
}

impl FailureSpec {
    /// Decodes the raw field. Falsy values (`null`, `false`, `""`, `[]`, `0`)
    /// and unsupported shapes decode to `None`.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::All,
            Some(Value::String(text)) if text == ALL_ROLES => Self::All,
            Some(Value::String(text)) if !text.is_empty() => Self::SingleRole(text.clone()),
            Some(Value::Array(items)) if !items.is_empty() => {
                Self::RoleList(items.iter().map(role_text).collect())
            }
            _ => Self::None,
        }
    }

    pub fn matches(&self, role: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::SingleRole(name) => name.eq_ignore_ascii_case(role),
            Self::RoleList(names) => names.iter().any(|name| name.eq_ignore_ascii_case(role)),
        }
    }
}

pub fn should_fail(role: &str, message: &OrderMessage) -> bool {
    message.force_fail.matches(role)
}

fn role_text(item: &Value) -> String {
    match item {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
