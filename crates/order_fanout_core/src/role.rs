use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::contract::ContractError;

/// A downstream consumer subscribed to the fan-out topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Fulfillment,
    Analytics,
    Shipping,
    Stress,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Fulfillment,
        Role::Analytics,
        Role::Shipping,
        Role::Stress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fulfillment => "fulfillment",
            Self::Analytics => "analytics",
            Self::Shipping => "shipping",
            Self::Stress => "stress",
        }
    }

    /// Offset added to each phase base code so concurrent roles writing to the
    /// same correlation id never collide.
    pub(crate) fn slot(self) -> u8 {
        match self {
            Self::Fulfillment => 0,
            Self::Analytics => 1,
            Self::Shipping => 2,
            Self::Stress => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ContractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ContractError::UnknownRole(trimmed.to_string()))
    }
}
