//! Canonical `key=value&...` form used as signature input.
//!
//! The rules here must match the server byte for byte; any drift in filtering
//! or ordering invalidates every signed request.

use serde_json::Value;
use std::collections::BTreeMap;

/// Textual form of `true` in the canonical string. `false` never appears
/// because it counts as empty.
pub const BOOL_TRUE_REPR: &str = "1";

/// Separator between `key=value` pairs
pub const PAIR_SEPARATOR: &str = "&";

/// Whether the server treats a value as absent.
///
/// Null, `false`, numeric zero, `""`, `"0"`, `[]` and `{}` are all empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Render a non-empty value; `None` when the value is filtered out.
pub fn render_value(value: &Value) -> Option<String> {
    if is_empty_value(value) {
        return None;
    }
    let rendered = match value {
        Value::String(s) => s.clone(),
        Value::Bool(_) => BOOL_TRUE_REPR.to_string(),
        other => other.to_string(),
    };
    Some(rendered)
}

/// Drop empty entries and sort the rest by key (byte order).
///
/// A key supplied more than once keeps its last value.
pub fn canonical_params<'a, I, K>(params: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, &'a Value)>,
    K: AsRef<str>,
{
    let mut sorted = BTreeMap::new();
    for (key, value) in params {
        match render_value(value) {
            Some(rendered) => {
                sorted.insert(key.as_ref().to_string(), rendered);
            }
            None => {
                sorted.remove(key.as_ref());
            }
        }
    }
    sorted
}

/// Produce the canonical string for a set of fields.
pub fn canonicalize<'a, I, K>(params: I) -> String
where
    I: IntoIterator<Item = (K, &'a Value)>,
    K: AsRef<str>,
{
    canonical_params(params)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(PAIR_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(value: &Value) -> String {
        canonicalize(value.as_object().unwrap().iter())
    }

    #[test]
    fn test_empty_input_yields_empty_string() {
        assert_eq!(canon(&json!({})), "");
        assert_eq!(canon(&json!({"A": null, "B": ""})), "");
    }

    #[test]
    fn test_keys_sorted_by_byte_order() {
        let params = json!({"b": "2", "a": "1", "B": "3", "Timestamp": "t", "BizContent": "{}"});
        assert_eq!(canon(&params), "B=3&BizContent={}&Timestamp=t&a=1&b=2");
    }

    #[test]
    fn test_empty_values_filtered() {
        let params = json!({
            "Null": null,
            "EmptyString": "",
            "ZeroString": "0",
            "Zero": 0,
            "ZeroFloat": 0.0,
            "False": false,
            "EmptyArray": [],
            "EmptyObject": {},
            "Kept": "x"
        });
        assert_eq!(canon(&params), "Kept=x");
    }

    #[test]
    fn test_boolean_rendering() {
        let params = json!({"IncludePreAuthorization": false, "IsDeposit": true});
        assert_eq!(canon(&params), format!("IsDeposit={}", BOOL_TRUE_REPR));
        assert_eq!(BOOL_TRUE_REPR, "1");
    }

    #[test]
    fn test_scalar_and_nested_rendering() {
        let params = json!({
            "Amount": 12.5,
            "OrgId": 1001,
            "Ids": [1, 2],
            "Nested": {"k": "v"},
            "Text": "a b&c"
        });
        assert_eq!(
            canon(&params),
            r#"Amount=12.5&Ids=[1,2]&Nested={"k":"v"}&OrgId=1001&Text=a b&c"#
        );
    }

    #[test]
    fn test_permutation_invariance() {
        let a = json!("alpha");
        let b = json!(2);
        let c = json!(true);
        let forward = vec![("Alpha", &a), ("Beta", &b), ("Gamma", &c)];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();
        let rotated = vec![("Beta", &b), ("Gamma", &c), ("Alpha", &a)];

        let expected = canonicalize(forward);
        assert_eq!(canonicalize(reversed), expected);
        assert_eq!(canonicalize(rotated), expected);
        assert_eq!(expected, "Alpha=alpha&Beta=2&Gamma=1");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let first = json!("x");
        let second = json!("y");
        let empty = json!("");
        assert_eq!(canonicalize(vec![("K", &first), ("K", &second)]), "K=y");
        assert_eq!(canonicalize(vec![("K", &first), ("K", &empty)]), "");
    }
}
