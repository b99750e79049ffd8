use std::collections::BTreeMap;

use crate::errors::AppError;

/// Collects per-field validation failures. Only the first failure for a
/// field is kept, formatted as `field: message`.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) -> &mut Self {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_insert_with(|| format!("{}: {}", field, message));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

pub fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

pub fn is_latitude(value: f64) -> bool {
    (-90.0..=90.0).contains(&value)
}

pub fn is_longitude(value: f64) -> bool {
    (-180.0..=180.0).contains(&value)
}

/// Letters, digits and spaces only.
pub fn is_plain_name(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
}

/// An address the mailer will accept, with a dotted domain so bare hosts
/// like `a@b` are refused before a code is stored.
pub fn is_valid_email(value: &str) -> bool {
    let Ok(address) = value.parse::<lettre::Address>() else {
        return false;
    };
    match address.domain().rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}
