use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write object '{key}': {message}")]
    Write { key: String, message: String },
    #[error("failed to read object '{key}': {message}")]
    Read { key: String, message: String },
    #[error("failed to list objects under '{prefix}': {message}")]
    List { prefix: String, message: String },
    #[error("failed to serialize object '{key}': {message}")]
    Serialize { key: String, message: String },
}

/// Durable key/value object storage shared by every worker.
///
/// Writes overwrite silently: redelivered messages rewrite the same keys with
/// equivalent content.
pub trait ObjectStore: Send + Sync {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    fn read_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

pub fn put_json(
    store: &dyn ObjectStore,
    key: &str,
    value: &impl Serialize,
) -> Result<(), StoreError> {
    let body = serde_json::to_vec(value).map_err(|error| StoreError::Serialize {
        key: key.to_string(),
        message: error.to_string(),
    })?;
    store.write_object(key, &body)
}
