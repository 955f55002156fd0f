use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CorrcError;

/// Deserialize an already-parsed document, reporting where in it a field
/// failed (e.g. `corrections[3].inputs[0]`).
pub fn from_value_with_path<T: DeserializeOwned>(doc: Value) -> Result<T, CorrcError> {
    serde_path_to_error::deserialize::<_, T>(doc).map_err(|err| {
        let path = err.path().to_string();
        CorrcError::Schema(format!("at JSON path {path} → {}", err.into_inner()))
    })
}
