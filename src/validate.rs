use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, FieldError};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Collects field errors so a request reports every problem at once.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when the field is missing or blank.
    pub fn required(&mut self, param: &str, value: Option<&str>, msg: &str) -> &mut Self {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.errors.push(FieldError::new(param, msg));
        }
        self
    }

    pub fn email(&mut self, param: &str, value: Option<&str>, msg: &str) -> &mut Self {
        if !value.map_or(false, is_valid_email) {
            self.errors.push(FieldError::new(param, msg));
        }
        self
    }

    /// Length in characters, not bytes.
    pub fn min_len(&mut self, param: &str, value: Option<&str>, min: usize, msg: &str) -> &mut Self {
        if value.map_or(0, |v| v.chars().count()) < min {
            self.errors.push(FieldError::new(param, msg));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// `"rust, go ,,sql"` → `["rust", "go", "sql"]`.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Treats blank strings as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn checks_collect_every_failure() {
        let err = Checks::new()
            .required("name", Some("  "), "Name is required")
            .email("email", None, "Please include a valid email")
            .min_len("password", Some("abc"), 6, "too short")
            .finish()
            .unwrap_err();
        match err {
            AppError::Validation(errors) => {
                let params: Vec<_> = errors.iter().filter_map(|e| e.param.clone()).collect();
                assert_eq!(params, ["name", "email", "password"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn checks_pass_on_good_input() {
        assert!(Checks::new()
            .required("name", Some("Alice"), "Name is required")
            .email("email", Some("a@x.com"), "bad")
            .min_len("password", Some("secret1"), 6, "short")
            .finish()
            .is_ok());
    }

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(split_list("rust, go ,,sql"), ["rust", "go", "sql"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn non_blank_filters() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
