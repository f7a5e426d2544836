//! Candidate payload parsing and validation.
//!
//! Generated listings arrive as loosely-typed JSON, often wrapped in prose
//! or a markdown fence. [`extract_candidates`] pulls out the first complete
//! JSON array, and [`RawCandidate::validate`] is the only way to turn an
//! element of it into a [`NewVehicle`]. Nothing untyped crosses that
//! boundary.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::NewVehicle;

/// Required fields, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 4] = ["make", "model", "year", "price"];

/// A listing as supplied by a source or a caller, before validation.
///
/// Every field is optional and keeps its JSON value: models may answer
/// `"year": "2024"` or `"price": "$321,400"`, and `validate` decides what
/// is usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub make: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub url: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub image_url: Option<Value>,
}

impl RawCandidate {
    /// Convert one JSON value, such as an HTTP request body. Anything that is
    /// not an object becomes an empty candidate and fails validation later.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Short description for log lines, tolerant of missing fields.
    pub fn describe(&self) -> String {
        let part = |v: &Option<Value>| scalar_text(v).unwrap_or_else(|| "?".to_string());
        format!(
            "{} {} {}",
            part(&self.year),
            part(&self.make),
            part(&self.model)
        )
    }

    /// Validate required fields and coerce types.
    ///
    /// `default_source` is used when the candidate carries no `source`.
    pub fn validate(&self, default_source: &str) -> Result<NewVehicle, ValidationError> {
        let make = required_text(&self.make, "make")?;
        let model = required_text(&self.model, "model")?;

        let year = required_number(&self.year, "year")?;
        if year.fract() != 0.0 || year < 1.0 || year > i32::MAX as f64 {
            return Err(ValidationError::InvalidField {
                field: "year",
                reason: format!("expected a positive whole year, got {}", year),
            });
        }

        let price = required_number(&self.price, "price")?;
        if price <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: "price",
                reason: format!("must be greater than zero, got {}", price),
            });
        }

        Ok(NewVehicle {
            make,
            model,
            year: year as i64,
            price,
            url: scalar_text(&self.url),
            description: scalar_text(&self.description),
            source: scalar_text(&self.source).unwrap_or_else(|| default_source.to_string()),
            image_url: scalar_text(&self.image_url),
        })
    }
}

/// Extract the first well-formed array of listing objects from `text`.
///
/// Tries every `[` in order and returns the first position from which a
/// complete array parses whose elements are all JSON objects; text after
/// the array is ignored. Arrays holding anything else (footnotes like
/// `[1]`, a field's `["awd", "v10"]`) are skipped. An empty array is a
/// valid zero-candidate payload. Returns `None` when nothing qualifies.
pub fn extract_candidates(text: &str) -> Option<Vec<RawCandidate>> {
    for (start, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Array(items))) if items.iter().all(Value::is_object) => {
                return Some(items.into_iter().map(RawCandidate::from_value).collect());
            }
            _ => continue,
        }
    }
    None
}

/// Render a scalar JSON value as text; empty strings, null and
/// non-scalars are `None`.
fn scalar_text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(value: &Option<Value>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            reason: format!("expected text, got {}", json_kind(other)),
        }),
    }
}

fn required_number(value: &Option<Value>, field: &'static str) -> Result<f64, ValidationError> {
    let n = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | '_') && !c.is_whitespace())
                .collect();
            if cleaned.is_empty() {
                return Err(ValidationError::MissingField(field));
            }
            Some(cleaned.parse::<f64>().map_err(|_| ValidationError::InvalidField {
                field,
                reason: format!("'{}' is not a number", s),
            })?)
        }
        Some(other) => {
            return Err(ValidationError::InvalidField {
                field,
                reason: format!("expected a number, got {}", json_kind(other)),
            })
        }
    };

    match n {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(ValidationError::InvalidField {
            field,
            reason: "not a finite number".to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawCandidate {
        RawCandidate::from_value(value)
    }

    #[test]
    fn test_extract_plain_array() {
        let text = r#"[{"make":"Ferrari","model":"296 GTB","year":2024,"price":321400}]"#;
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].make, Some(json!("Ferrari")));
    }

    #[test]
    fn test_extract_array_wrapped_in_prose() {
        let text = "Here are the cars you asked for:\n```json\n[\n  {\"make\": \"Porsche\", \"model\": \"911\", \"year\": 2025, \"price\": 120000},\n  {\"make\": \"BMW\", \"model\": \"M4\", \"year\": 2024, \"price\": 80000}\n]\n```\nLet me know if you need more [details].";
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[1].model, Some(json!("M4")));
    }

    #[test]
    fn test_extract_skips_bracket_that_is_not_json() {
        let text = "Sources [1] and [see below]: [{\"make\":\"Audi\",\"model\":\"R8\",\"year\":2024,\"price\":160000}]";
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands.len(), 1);
        let v = cands[0].validate("web-search").unwrap();
        assert_eq!(v.make, "Audi");
        assert_eq!(v.price, 160000.0);

        let text = "Prices per dealer data [1]:\n[{\"make\":\"Audi\",\"model\":\"R8\",\"year\":2024,\"price\":160000}]";
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].make, Some(json!("Audi")));

        let text = "See [notes]: [{\"make\":\"Audi\",\"model\":\"R8\",\"year\":2024,\"price\":160000}]";
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands[0].make, Some(json!("Audi")));
    }

    #[test]
    fn test_extract_ignores_nested_field_array_in_truncated_response() {
        let text = "[{\"make\":\"Lamborghini\",\"model\":\"Huracan\",\"tags\":[\"awd\",\"v10\"],\"year\":2024,\"price\":";
        assert!(extract_candidates(text).is_none());
    }

    #[test]
    fn test_extract_empty_array_is_zero_candidates() {
        let cands = extract_candidates("No matches today: []").unwrap();
        assert!(cands.is_empty());
    }

    #[test]
    fn test_extract_none_when_no_array() {
        assert!(extract_candidates("I could not find any cars.").is_none());
        assert!(extract_candidates("[{\"make\": \"Ferrari\"").is_none());
        assert!(extract_candidates("").is_none());
    }

    #[test]
    fn test_arrays_of_non_objects_are_skipped() {
        assert!(extract_candidates("[1, \"two\", null]").is_none());

        let text = "[1, {\"make\": \"Mazda\"}] then [{\"make\": \"Mazda\", \"model\": \"MX-5\"}, {}]";
        let cands = extract_candidates(text).unwrap();
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].model, Some(json!("MX-5")));
        assert_eq!(
            cands[1].validate("web-search"),
            Err(ValidationError::MissingField("make"))
        );
    }

    #[test]
    fn test_validate_full_candidate() {
        let c = raw(json!({
            "make": "Ferrari",
            "model": "296 GTB",
            "year": 2024,
            "price": 321400,
            "url": "https://ferrari.com/296-gtb",
            "description": "Hybrid V6 supercar",
            "image_url": ""
        }));
        let v = c.validate("web-search").unwrap();
        assert_eq!(v.make, "Ferrari");
        assert_eq!(v.year, 2024);
        assert_eq!(v.price, 321400.0);
        assert_eq!(v.url.as_deref(), Some("https://ferrari.com/296-gtb"));
        assert_eq!(v.image_url, None);
        assert_eq!(v.source, "web-search");
    }

    #[test]
    fn test_validate_coerces_strings() {
        let c = raw(json!({
            "make": "Chevrolet",
            "model": "Corvette",
            "year": "2025",
            "price": "$68,300",
            "source": "dealer"
        }));
        let v = c.validate("web-search").unwrap();
        assert_eq!(v.year, 2025);
        assert_eq!(v.price, 68300.0);
        assert_eq!(v.source, "dealer");
    }

    #[test]
    fn test_validate_numeric_model_name() {
        let c = raw(json!({"make": "Porsche", "model": 911, "year": 2024, "price": 115000}));
        assert_eq!(c.validate("manual").unwrap().model, "911");
    }

    #[test]
    fn test_validate_missing_fields_in_order() {
        assert_eq!(
            raw(json!({})).validate("x"),
            Err(ValidationError::MissingField("make"))
        );
        assert_eq!(
            raw(json!({"make": "Lotus", "model": "  "})).validate("x"),
            Err(ValidationError::MissingField("model"))
        );
        assert_eq!(
            raw(json!({"make": "Lotus", "model": "Emira", "price": 99000})).validate("x"),
            Err(ValidationError::MissingField("year"))
        );
        assert_eq!(
            raw(json!({"make": "Lotus", "model": "Emira", "year": 2024, "price": null}))
                .validate("x"),
            Err(ValidationError::MissingField("price"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_numbers() {
        let zero_price = raw(json!({"make": "A", "model": "B", "year": 2024, "price": 0}));
        assert!(matches!(
            zero_price.validate("x"),
            Err(ValidationError::InvalidField { field: "price", .. })
        ));

        let fractional_year = raw(json!({"make": "A", "model": "B", "year": 2024.5, "price": 1}));
        assert!(matches!(
            fractional_year.validate("x"),
            Err(ValidationError::InvalidField { field: "year", .. })
        ));

        for year in [json!(0), json!(-1), json!("0")] {
            let bad_year = raw(json!({"make": "A", "model": "B", "year": year, "price": 1}));
            assert!(matches!(
                bad_year.validate("x"),
                Err(ValidationError::InvalidField { field: "year", .. })
            ));
        }
        let first_year = raw(json!({"make": "A", "model": "B", "year": 1, "price": 1}));
        assert_eq!(first_year.validate("x").unwrap().year, 1);

        let text_price = raw(json!({"make": "A", "model": "B", "year": 2024, "price": "call us"}));
        assert!(matches!(
            text_price.validate("x"),
            Err(ValidationError::InvalidField { field: "price", .. })
        ));

        let object_make = raw(json!({"make": {"name": "A"}, "model": "B", "year": 2024, "price": 1}));
        assert!(matches!(
            object_make.validate("x"),
            Err(ValidationError::InvalidField { field: "make", .. })
        ));
    }

    #[test]
    fn test_identity_not_normalized() {
        let v = raw(json!({"make": "ferrari ", "model": "296gtb", "year": 2024, "price": 1}))
            .validate("x")
            .unwrap();
        assert_eq!(v.make, "ferrari ");
    }

    #[test]
    fn test_describe() {
        let c = raw(json!({"make": "Mazda", "year": 2024}));
        assert_eq!(c.describe(), "2024 Mazda ?");
    }
}
