use crate::role::Role;

pub const TRACE_PREFIX: &str = "traces";
pub const ANALYTICS_PREFIX: &str = "analytics";
pub const ORDERS_PREFIX: &str = "orders";
pub const SHIPPING_PREFIX: &str = "shipping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Received,
    Processed,
    DeadLettered,
    Error,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::DeadLettered => "dlq",
            Self::Error => "error",
        }
    }

    fn base_code(self) -> u8 {
        match self {
            Self::Received => 10,
            Self::Processed => 20,
            Self::DeadLettered => 50,
            Self::Error => 96,
        }
    }

    fn uses_role_slot(self) -> bool {
        !matches!(self, Self::DeadLettered)
    }

    fn parse(value: &str) -> Option<Self> {
        [
            Self::Received,
            Self::Processed,
            Self::DeadLettered,
            Self::Error,
        ]
        .into_iter()
        .find(|phase| phase.as_str() == value)
    }
}

/// A named checkpoint in the timeline of one correlation id.
///
/// Step names start with a two-digit code so that a lexicographic listing of
/// `traces/{correlationId}/` is also the chronological order of one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceStep {
    Published,
    Routes,
    Role { role: Role, phase: Phase },
    DeadLetter,
}

impl TraceStep {
    pub fn received(role: Role) -> Self {
        Self::Role {
            role,
            phase: Phase::Received,
        }
    }

    pub fn processed(role: Role) -> Self {
        Self::Role {
            role,
            phase: Phase::Processed,
        }
    }

    pub fn error(role: Role) -> Self {
        Self::Role {
            role,
            phase: Phase::Error,
        }
    }

    pub fn dead_letter(role: Option<Role>) -> Self {
        match role {
            Some(role) => Self::Role {
                role,
                phase: Phase::DeadLettered,
            },
            None => Self::DeadLetter,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Published => 0,
            Self::Routes => 1,
            Self::DeadLetter => Phase::DeadLettered.base_code(),
            Self::Role { role, phase } if phase.uses_role_slot() => phase.base_code() + role.slot(),
            Self::Role { phase, .. } => phase.base_code(),
        }
    }

    pub fn name(self) -> String {
        match self {
            Self::Published => "00-published".to_string(),
            Self::Routes => "01-routes".to_string(),
            Self::DeadLetter => format!("{:02}-dlq", self.code()),
            Self::Role { role, phase } => {
                format!("{:02}-{}-{}", self.code(), role.as_str(), phase.as_str())
            }
        }
    }

    /// Parses a step name (without the `.json` suffix). Names that do not
    /// follow the step convention return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let step = match name {
            "00-published" => Self::Published,
            "01-routes" => Self::Routes,
            "50-dlq" => Self::DeadLetter,
            other => {
                let mut parts = other.splitn(3, '-');
                let _code = parts.next()?;
                let role = parts.next()?.parse::<Role>().ok()?;
                let phase = Phase::parse(parts.next()?)?;
                Self::Role { role, phase }
            }
        };
        (step.name() == name).then_some(step)
    }

    pub fn role(self) -> Option<Role> {
        match self {
            Self::Role { role, .. } => Some(role),
            _ => None,
        }
    }

    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::Role { phase, .. } => Some(phase),
            Self::DeadLetter => Some(Phase::DeadLettered),
            _ => None,
        }
    }
}

pub fn trace_prefix(correlation_id: &str) -> String {
    format!("{TRACE_PREFIX}/{}/", encode_key_segment(correlation_id))
}

/// Escapes `%` and `/` so an identifier always occupies exactly one key
/// segment. Ids without either character are returned unchanged.
pub fn encode_key_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Inverse of [`encode_key_segment`]. Unknown escapes are kept verbatim.
pub fn decode_key_segment(segment: &str) -> String {
    let mut decoded = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(index) = rest.find('%') {
        decoded.push_str(&rest[..index]);
        let escape = &rest[index..];
        if let Some(tail) = escape.strip_prefix("%25") {
            decoded.push('%');
            rest = tail;
        } else if let Some(tail) = escape.strip_prefix("%2F") {
            decoded.push('/');
            rest = tail;
        } else {
            decoded.push('%');
            rest = &escape[1..];
        }
    }
    decoded.push_str(rest);
    decoded
}

pub fn trace_object_key(correlation_id: &str, step: TraceStep) -> String {
    format!("{}{}.json", trace_prefix(correlation_id), step.name())
}

/// Extracts the step name from a trace object key.
pub fn step_name_from_key(key: &str) -> Option<&str> {
    key.rsplit('/').next()?.strip_suffix(".json")
}

pub fn analytics_object_key(event_type: &str, order_id: &str) -> String {
    format!("{ANALYTICS_PREFIX}/{event_type}/{order_id}.json")
}

pub fn order_object_key(order_id: &str) -> String {
    format!("{ORDERS_PREFIX}/{order_id}.json")
}

pub fn shipping_object_key(event_type: &str, order_id: &str, correlation_id: &str) -> String {
    format!(
        "{SHIPPING_PREFIX}/{event_type}/{order_id}-{}.json",
        encode_key_segment(correlation_id)
    )
}
