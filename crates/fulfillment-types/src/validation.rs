//! Schema validation for pluggable implementation config tables.
//!
//! Each storage backend and integration declares the shape of its TOML table
//! as a [`Schema`]; the factories validate the raw table against it before
//! constructing anything so that misconfiguration fails at startup.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path, used when reporting errors from nested tables.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An http(s) URL.
	Url,
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	/// A float; integers are accepted and widened.
	Float {
		min: Option<f64>,
	},
	Boolean,
	Array(Box<FieldType>),
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema, recursing into nested
	/// tables. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn out_of_range(field: &str, message: String) -> ValidationError {
	ValidationError::InvalidValue {
		field: field.to_string(),
		message,
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "string", value))?;
		},
		FieldType::Url => {
			let url = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "url", value))?;
			if !(url.starts_with("http://") || url.starts_with("https://")) {
				return Err(out_of_range(
					field_name,
					format!("'{}' is not an http(s) URL", url),
				));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if let Some(min_val) = min.filter(|m| int_val < *m) {
				return Err(out_of_range(
					field_name,
					format!("Value {} is less than minimum {}", int_val, min_val),
				));
			}
			if let Some(max_val) = max.filter(|m| int_val > *m) {
				return Err(out_of_range(
					field_name,
					format!("Value {} is greater than maximum {}", int_val, max_val),
				));
			}
		},
		FieldType::Float { min } => {
			let float_val = value
				.as_float()
				.or_else(|| value.as_integer().map(|i| i as f64))
				.ok_or_else(|| mismatch(field_name, "float", value))?;
			if let Some(min_val) = min.filter(|m| float_val < *m) {
				return Err(out_of_range(
					field_name,
					format!("Value {} is less than minimum {}", float_val, min_val),
				));
			}
		},
		FieldType::Boolean => {
			value
				.as_bool()
				.ok_or_else(|| mismatch(field_name, "boolean", value))?;
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema
				.validate(value)
				.map_err(|e| e.nested_in(field_name))?;
		},
	}

	Ok(())
}

/// Implemented by every pluggable implementation to validate its own table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	fn fedex_like() -> Schema {
		Schema::new(
			vec![
				Field::new("api_url", FieldType::Url),
				Field::new("client_id", FieldType::String),
			],
			vec![
				Field::new("timeout_seconds", FieldType::Integer { min: Some(1), max: Some(300) }),
				Field::new("rate", FieldType::Float { min: Some(0.0) }),
			],
		)
	}

	#[test]
	fn test_valid_table_passes() {
		let config = parse(
			r#"
api_url = "https://apis-sandbox.fedex.com"
client_id = "abc"
timeout_seconds = 30
rate = 2
"#,
		);
		assert!(fedex_like().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_and_invalid_fields() {
		let missing = parse(r#"api_url = "https://x""#);
		assert!(matches!(
			fedex_like().validate(&missing),
			Err(ValidationError::MissingField(f)) if f == "client_id"
		));

		let bad_url = parse(
			r#"
api_url = "ftp://x"
client_id = "abc"
"#,
		);
		assert!(matches!(
			fedex_like().validate(&bad_url),
			Err(ValidationError::InvalidValue { field, .. }) if field == "api_url"
		));

		let bad_range = parse(
			r#"
api_url = "https://x"
client_id = "abc"
timeout_seconds = 0
"#,
		);
		assert!(fedex_like().validate(&bad_range).is_err());
	}

	#[test]
	fn test_nested_errors_carry_path() {
		let schema = Schema::new(
			vec![Field::new(
				"fedex",
				FieldType::Table(Schema::new(vec![Field::new("client_id", FieldType::String)], vec![])),
			)],
			vec![],
		);
		let config = parse("[fedex]\nclient_id = 5\n");
		match schema.validate(&config) {
			Err(ValidationError::TypeMismatch { field, .. }) => assert_eq!(field, "fedex.client_id"),
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn test_custom_validator() {
		let schema = Schema::new(
			vec![Field::new("page_size", FieldType::Integer { min: None, max: None })
				.with_validator(|v| match v.as_integer() {
					Some(n) if n % 10 == 0 => Ok(()),
					_ => Err("must be a multiple of 10".to_string()),
				})],
			vec![],
		);
		assert!(schema.validate(&parse("page_size = 100")).is_ok());
		assert!(schema.validate(&parse("page_size = 15")).is_err());
	}
}
