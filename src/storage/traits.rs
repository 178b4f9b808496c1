use crate::model::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Durable string-keyed store. Values are JSON documents.
pub trait KeyValueStore: Send {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>
    where
        Self: Sized,
    {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.put_raw(key, &raw)
    }
}
