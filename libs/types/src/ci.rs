//! Case-insensitive JSON ingestion.
//!
//! Producers on the bus disagree about key casing (`chainName`, `chain_name`,
//! `ChainName` all occur in the wild). Rather than sprinkling per-field
//! handling through every struct, inbound payloads are normalized once: every
//! object key is folded to lowercase with underscores stripped, and inbound
//! types carry a folded `#[serde(alias = ...)]` next to their canonical
//! camelCase name. Unknown fields are ignored as usual.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Fold a JSON object key: lowercase, underscores removed.
///
/// `chainName`, `chain_name` and `CHAIN_NAME` all fold to `chainname`.
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Recursively fold every object key in a JSON value.
pub fn fold_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            for (key, inner) in map {
                folded.insert(fold_key(&key), fold_value(inner));
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(fold_value).collect()),
        other => other,
    }
}

/// Deserialize `T` from raw JSON bytes with case-insensitive keys.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_slice(bytes)?;
    serde_json::from_value(fold_value(value))
}

/// Deserialize `T` from a JSON string with case-insensitive keys.
pub fn from_str<T: DeserializeOwned>(json: &str) -> Result<T, serde_json::Error> {
    from_slice(json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        #[serde(alias = "chainname")]
        chain_name: String,
        #[serde(alias = "gaslimit")]
        gas_limit: u64,
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key("chainName"), "chainname");
        assert_eq!(fold_key("chain_name"), "chainname");
        assert_eq!(fold_key("CHAIN_NAME"), "chainname");
        assert_eq!(fold_key("GasPriceGwei"), "gaspricegwei");
    }

    #[test]
    fn test_accepts_any_casing() {
        for json in [
            r#"{"chainName": "polygon", "gasLimit": 300000}"#,
            r#"{"chain_name": "polygon", "gas_limit": 300000}"#,
            r#"{"ChainName": "polygon", "GASLIMIT": 300000}"#,
        ] {
            let probe: Probe = from_str(json).unwrap();
            assert_eq!(probe.chain_name, "polygon");
            assert_eq!(probe.gas_limit, 300_000);
        }
    }

    #[test]
    fn test_nested_objects_and_arrays_fold() {
        let folded = fold_value(serde_json::json!({
            "Outer_Key": [{"Inner_Key": 1}],
        }));
        assert_eq!(folded["outerkey"][0]["innerkey"], 1);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let probe: Probe =
            from_str(r#"{"chainName": "base", "gasLimit": 1, "somethingElse": true}"#).unwrap();
        assert_eq!(probe.chain_name, "base");
    }
}
