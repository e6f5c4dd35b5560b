//! Structural request validation
//!
//! Payloads are checked field by field against a schema before any handler
//! logic runs. Validation never fails outright: it always yields either the
//! typed value or the full list of field errors.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles");
}

/// A single failed check, addressed by field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating a payload
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Vec<FieldError>),
}

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn into_result(self) -> Result<T, Vec<FieldError>> {
        match self {
            Validation::Valid(value) => Ok(value),
            Validation::Invalid(errors) => Err(errors),
        }
    }
}

/// A typed payload that can be built from untrusted JSON
pub trait Schema: Sized {
    fn parse(fields: &mut Fields<'_>) -> Option<Self>;
}

/// Validate a JSON payload against a schema
pub fn validate<T: Schema>(payload: &Value) -> Validation<T> {
    let Some(object) = payload.as_object() else {
        return Validation::Invalid(vec![FieldError::new("", "Expected an object")]);
    };

    let mut fields = Fields {
        object,
        errors: Vec::new(),
    };
    let parsed = T::parse(&mut fields);

    match (parsed, fields.errors.is_empty()) {
        (Some(value), true) => Validation::Valid(value),
        (_, false) => Validation::Invalid(fields.errors),
        (None, true) => Validation::Invalid(vec![FieldError::new("", "Invalid payload")]),
    }
}

/// Validate a raw request body; bodies that are not JSON fail at path `""`
pub fn validate_body<T: Schema>(body: &[u8]) -> Validation<T> {
    match serde_json::from_slice::<Value>(body) {
        Ok(payload) => validate(&payload),
        Err(e) => Validation::Invalid(vec![FieldError::new("", format!("Malformed JSON: {}", e))]),
    }
}

/// Field accessor that records every failure it sees
pub struct Fields<'a> {
    object: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    /// Start a rule chain on a required string field
    pub fn string(&mut self, name: &'a str) -> StringRule<'_, 'a> {
        let value = match self.object.get(name) {
            None | Some(Value::Null) => {
                self.errors.push(FieldError::new(name, "Required"));
                None
            }
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.errors.push(FieldError::new(name, "Expected string"));
                None
            }
        };

        StringRule {
            fields: self,
            name,
            value,
        }
    }

    /// Start a rule chain on an optional string field
    pub fn optional_string(&mut self, name: &'a str) -> Option<StringRule<'_, 'a>> {
        match self.object.get(name) {
            None | Some(Value::Null) => None,
            Some(_) => Some(self.string(name)),
        }
    }

    fn fail(&mut self, name: &str, message: String) {
        self.errors.push(FieldError::new(name, message));
    }
}

/// Checks applied to one string field; the first failure per field wins
pub struct StringRule<'f, 'a> {
    fields: &'f mut Fields<'a>,
    name: &'a str,
    value: Option<&'a str>,
}

impl<'f, 'a> StringRule<'f, 'a> {
    pub fn trim(mut self) -> Self {
        self.value = self.value.map(str::trim);
        self
    }

    pub fn min_chars(self, min: usize) -> Self {
        let message = if min == 1 {
            "Must not be empty".to_string()
        } else {
            format!("Must be at least {} characters", min)
        };
        self.check(|s| s.chars().count() >= min, message)
    }

    pub fn max_chars(self, max: usize) -> Self {
        self.check(
            |s| s.chars().count() <= max,
            format!("Must be at most {} characters", max),
        )
    }

    pub fn max_bytes(self, max: usize) -> Self {
        self.check(|s| s.len() <= max, format!("Must be at most {} bytes", max))
    }

    pub fn email(self) -> Self {
        self.check(|s| EMAIL_RE.is_match(s), "Invalid email".to_string())
    }

    pub fn one_of(self, allowed: &[&str]) -> Self {
        let message = format!("Must be one of: {}", allowed.join(", "));
        self.check(|s| allowed.iter().any(|a| *a == s), message)
    }

    pub fn get(self) -> Option<&'a str> {
        self.value
    }

    fn check(mut self, ok: impl FnOnce(&str) -> bool, message: String) -> Self {
        if let Some(value) = self.value {
            if !ok(value) {
                self.fields.fail(self.name, message);
                self.value = None;
            }
        }
        self
    }
}
