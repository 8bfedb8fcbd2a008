use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// First message for a field — the one a template shows inline.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|msgs| msgs.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, msgs) in &self.0 {
            for msg in msgs {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {msg}")?;
                first = false;
            }
        }
        Ok(())
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email pattern"))
}

/// Validation collaborator for booking forms. The presentation layer hands
/// over raw field values, rules run here, messages come back per field.
#[derive(Debug, Default)]
pub struct Form {
    values: BTreeMap<String, String>,
    pub errors: FieldErrors,
}

impl Form {
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            errors: FieldErrors::default(),
        }
    }

    /// Raw value for a field, empty string when absent.
    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        !self.value(field).is_empty()
    }

    /// Every listed field must be present and non-blank.
    pub fn required(&mut self, fields: &[&str]) {
        for &field in fields {
            if self.value(field).trim().is_empty() {
                self.errors.add(field, "This field cannot be blank");
            }
        }
    }

    /// Minimum length in characters.
    pub fn min_length(&mut self, field: &str, len: usize) -> bool {
        if self.value(field).chars().count() < len {
            self.errors.add(
                field,
                format!("This field must be at least {len} characters long"),
            );
            return false;
        }
        true
    }

    /// Maximum length in characters.
    pub fn max_length(&mut self, field: &str, len: usize) -> bool {
        if self.value(field).chars().count() > len {
            self.errors.add(
                field,
                format!("This field must be at most {len} characters long"),
            );
            return false;
        }
        true
    }

    /// Syntactic email check only; deliverability is not our problem.
    pub fn is_email(&mut self, field: &str) {
        if !email_re().is_match(self.value(field)) {
            self.errors.add(field, "Invalid email address");
        }
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}
