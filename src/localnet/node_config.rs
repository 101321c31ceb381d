//! Node config rewriting
//!
//! Whitelists only ever grow: merging a set of subnet ids into a node's
//! list keeps everything already there.

use serde_json::{Map, Value};

use super::cluster::ClusterError;
use crate::core::ids::{parse, Id};

pub const WHITELISTED_SUBNETS_KEY: &str = "whitelisted-subnets";

/// Subnet ids of a comma-separated whitelist
pub fn parse_whitelist(whitelist: &str) -> Result<Vec<Id>, ClusterError> {
    whitelist
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse::<Id>("subnet id", s).map_err(ClusterError::from))
        .collect()
}

/// Comma-joined id strings in sorted order, without duplicates
pub fn whitelist_string<'a>(ids: impl IntoIterator<Item = &'a Id>) -> String {
    let mut strings: Vec<String> = ids.into_iter().map(Id::to_string).collect();
    strings.sort();
    strings.dedup();
    strings.join(",")
}

/// Union of an existing whitelist and `subnet_ids`
pub fn merge_whitelist(existing: &str, subnet_ids: &[Id]) -> Result<String, ClusterError> {
    let mut ids = parse_whitelist(existing)?;
    ids.extend_from_slice(subnet_ids);
    Ok(whitelist_string(&ids))
}

/// Set `key` to `value` in a JSON object config. An empty config is
/// treated as `{}`.
pub fn update_json_key(config: &str, key: &str, value: &str) -> Result<String, ClusterError> {
    let mut object = if config.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(config)? {
            Value::Object(map) => map,
            other => {
                return Err(ClusterError::Malformed {
                    call: "node config",
                    detail: format!("expected a JSON object, got {}", other),
                })
            }
        }
    };
    object.insert(key.to_string(), Value::String(value.to_string()));
    Ok(serde_json::to_string(&Value::Object(object))?)
}

/// Rewrite a node config so its whitelist covers `subnet_ids`
pub fn whitelist_subnets(config: &str, subnet_ids: &[Id]) -> Result<String, ClusterError> {
    let existing = if config.trim().is_empty() {
        String::new()
    } else {
        serde_json::from_str::<Value>(config)?
            .get(WHITELISTED_SUBNETS_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let merged = merge_whitelist(&existing, subnet_ids)?;
    update_json_key(config, WHITELISTED_SUBNETS_KEY, &merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;

    fn ids() -> (Id, Id, Id) {
        (content_id(b"one"), content_id(b"two"), content_id(b"three"))
    }

    #[test]
    fn test_whitelist_string_sorted() {
        let (a, b, c) = ids();
        let joined = whitelist_string(&[c, a, b, a]);
        let mut expected = vec![a.to_string(), b.to_string(), c.to_string()];
        expected.sort();
        assert_eq!(joined, expected.join(","));
    }

    #[test]
    fn test_merge_is_monotonic() {
        let (a, b, c) = ids();
        let first = merge_whitelist("", &[a]).unwrap();
        let second = merge_whitelist(&first, &[b, c]).unwrap();
        let third = merge_whitelist(&second, &[]).unwrap();

        let parsed = parse_whitelist(&third).unwrap();
        assert!(parsed.contains(&a));
        assert!(parsed.contains(&b));
        assert!(parsed.contains(&c));
        assert_eq!(second, third);
    }

    #[test]
    fn test_update_json_key_preserves_other_keys() {
        let updated = update_json_key(
            r#"{"log-level":"info","whitelisted-subnets":"x"}"#,
            "whitelisted-subnets",
            "y",
        )
        .unwrap();
        let value: Value = serde_json::from_str(&updated).unwrap();
        assert_eq!(value["log-level"], "info");
        assert_eq!(value["whitelisted-subnets"], "y");

        let fresh = update_json_key("", "k", "v").unwrap();
        assert_eq!(fresh, r#"{"k":"v"}"#);
        assert!(update_json_key("[1,2]", "k", "v").is_err());
    }

    #[test]
    fn test_whitelist_subnets_keeps_existing_entries() {
        let (a, b, _) = ids();
        let config = format!(r#"{{"whitelisted-subnets":"{}","http-port":9650}}"#, a);
        let updated = whitelist_subnets(&config, &[b]).unwrap();
        let value: Value = serde_json::from_str(&updated).unwrap();

        let list = parse_whitelist(value["whitelisted-subnets"].as_str().unwrap()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&a) && list.contains(&b));
        assert_eq!(value["http-port"], 9650);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_whitelist("not-an-id").is_err());
        assert!(parse_whitelist(" , ").unwrap().is_empty());
    }
}
