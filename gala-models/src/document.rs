//! Document id handling shared by the server entities.
//!
//! Servers send the primary key as `_id`, as `id`, or as both when a
//! virtual `id` is serialized next to the stored `_id`. Both keys are
//! read and `_id` wins.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocumentKeys {
    #[serde(rename = "_id", default)]
    stored: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl DocumentKeys {
    pub(crate) fn resolve(self, entity: &str) -> Result<String, String> {
        self.stored
            .or(self.id)
            .ok_or_else(|| format!("{entity} is missing `_id`/`id`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_id_wins() {
        let keys: DocumentKeys =
            serde_json::from_value(serde_json::json!({"_id": "a", "id": "b"})).unwrap();
        assert_eq!(keys.resolve("chat").unwrap(), "a");
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let keys: DocumentKeys = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(keys.resolve("message").unwrap_err().contains("message"));
    }
}
