use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::error::TypeError;

pub type FormData = HashMap<String, Value>;

/// Accessor over a request payload. Both the JSON body and the multipart
/// field set funnel into the same map, so every handler reads fields the
/// same way regardless of how the client submitted them.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Failed to parse value as string")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    /// Numbers arrive as JSON numbers from the JSON body and as strings
    /// from multipart fields; both parse here.
    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(Value::String(v)) => v
                .trim()
                .parse()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            Some(value) if value.is_number() => value
                .to_string()
                .parse()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            Some(_) => Err(TypeError::new("Failed to parse value as number")),
            None => Err(TypeError::new("Invalid key")),
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        parse_list_field(self.inner.get(key))
    }
}

/// Normalizes a list-valued field into trimmed, non-empty strings.
///
/// Accepts a JSON array directly, a string holding a JSON-encoded array,
/// or a comma/newline delimited string. Malformed structured input falls
/// back to delimiter splitting instead of failing the request.
pub fn parse_list_field(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(raw)) => {
            if raw.trim().is_empty() {
                return vec![];
            }
            if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(raw) {
                return parse_list_field(Some(&parsed));
            }
            raw.replace(',', "\n")
                .split('\n')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }
        Some(_) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_field_accepts_json_array() {
        let value = json!(["flour", " sugar ", ""]);
        assert_eq!(parse_list_field(Some(&value)), vec!["flour", "sugar"]);
    }

    #[test]
    fn list_field_splits_on_commas_and_newlines() {
        let value = json!("flour, sugar\n butter ,\n");
        assert_eq!(
            parse_list_field(Some(&value)),
            vec!["flour", "sugar", "butter"]
        );
    }

    #[test]
    fn list_field_parses_embedded_json() {
        let value = json!("[\"flour\", \"sugar\"]");
        assert_eq!(parse_list_field(Some(&value)), vec!["flour", "sugar"]);
    }

    #[test]
    fn malformed_json_falls_back_to_splitting() {
        let value = json!("[\"flour\", sugar");
        assert_eq!(
            parse_list_field(Some(&value)),
            vec!["[\"flour\"", "sugar"]
        );
    }

    #[test]
    fn empty_inputs_yield_empty_lists() {
        assert!(parse_list_field(None).is_empty());
        assert!(parse_list_field(Some(&Value::Null)).is_empty());
        assert!(parse_list_field(Some(&json!("   "))).is_empty());
        assert!(parse_list_field(Some(&json!(" , ,\n"))).is_empty());
    }

    #[test]
    fn numbers_parse_from_both_encodings() {
        let mut data = FormData::new();
        data.insert("a".into(), json!("15"));
        data.insert("b".into(), json!(15));
        data.insert("c".into(), json!("fifteen"));
        let form = Form::from_data(data);

        assert_eq!(form.get_number::<i32>("a").unwrap(), 15);
        assert_eq!(form.get_number::<i32>("b").unwrap(), 15);
        assert!(form.get_number::<i32>("c").is_err());
        assert!(form.get_number::<i32>("missing").is_err());
    }
}
