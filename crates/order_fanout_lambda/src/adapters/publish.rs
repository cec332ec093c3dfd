use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("invalid message attribute '{name}': {message}")]
    Attribute { name: String, message: String },
    #[error("failed to publish event to '{target}': {message}")]
    Send { target: String, message: String },
}

/// Sends an event onto the fan-out transport and returns the broker message id.
pub trait EventPublisher: Send + Sync {
    fn publish(
        &self,
        body: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<String, PublishError>;

    /// Topic ARN or queue URL, for diagnostics.
    fn target(&self) -> &str;
}
