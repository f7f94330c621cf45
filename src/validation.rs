//! Body checks shared by the route validators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,30}$").expect("valid username regex"));

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_username(value: &str) -> bool {
    USERNAME.is_match(value)
}

/// Collects error lines for one request body.
pub struct BodyCheck<'a> {
    body: &'a Value,
    errors: Vec<String>,
}

impl<'a> BodyCheck<'a> {
    pub fn new(body: &'a Value) -> Self {
        let mut errors = Vec::new();
        if !body.is_object() {
            errors.push("Request body must be a JSON object".to_string());
        }
        Self { body, errors }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        self.body.get(name).filter(|v| !v.is_null())
    }

    /// Non-empty string field.
    pub fn required_string(mut self, name: &str) -> Self {
        match self.field(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) | None => self.errors.push(format!("{} is required", name)),
            Some(_) => self.errors.push(format!("{} must be a string", name)),
        }
        self
    }

    pub fn optional_string(mut self, name: &str) -> Self {
        if let Some(value) = self.field(name) {
            if !value.is_string() {
                self.errors.push(format!("{} must be a string", name));
            }
        }
        self
    }

    pub fn optional_bool(mut self, name: &str) -> Self {
        if let Some(value) = self.field(name) {
            if !value.is_boolean() {
                self.errors.push(format!("{} must be a boolean", name));
            }
        }
        self
    }

    /// Applies to the field only when it is a present string.
    pub fn string_format(mut self, name: &str, check: fn(&str) -> bool, message: &str) -> Self {
        if let Some(Value::String(s)) = self.field(name) {
            if !s.trim().is_empty() && !check(s.trim()) {
                self.errors.push(message.to_string());
            }
        }
        self
    }

    pub fn max_len(mut self, name: &str, max: usize) -> Self {
        if let Some(Value::String(s)) = self.field(name) {
            if s.chars().count() > max {
                self.errors.push(format!("{} must be at most {} characters", name, max));
            }
        }
        self
    }

    pub fn min_len(mut self, name: &str, min: usize) -> Self {
        if let Some(Value::String(s)) = self.field(name) {
            if !s.is_empty() && s.chars().count() < min {
                self.errors.push(format!("{} must be at least {} characters", name, min));
            }
        }
        self
    }

    pub fn one_of(mut self, name: &str, allowed: &[&str]) -> Self {
        if let Some(Value::String(s)) = self.field(name) {
            if !allowed.contains(&s.as_str()) {
                self.errors
                    .push(format!("{} must be one of: {}", name, allowed.join(", ")));
            }
        }
        self
    }

    pub fn finish(self) -> Vec<String> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_and_username_formats() {
        assert!(is_email("a@example.com"));
        assert!(!is_email("not-an-email"));
        assert!(!is_email("a b@example.com"));
        assert!(is_username("jane_doe.1"));
        assert!(!is_username("jd"));
        assert!(!is_username("has space"));
    }

    #[test]
    fn collects_errors_in_order() {
        let body = json!({"name": "", "email": "nope", "active": "yes"});
        let errors = BodyCheck::new(&body)
            .required_string("name")
            .string_format("email", is_email, "email must be a valid email address")
            .optional_bool("active")
            .finish();
        assert_eq!(
            errors,
            vec![
                "name is required".to_string(),
                "email must be a valid email address".to_string(),
                "active must be a boolean".to_string(),
            ]
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        let body = json!([1, 2]);
        let errors = BodyCheck::new(&body).finish();
        assert_eq!(errors, vec!["Request body must be a JSON object".to_string()]);
    }

    #[test]
    fn length_and_choice_checks() {
        let body = json!({"password": "short", "status": "deleted"});
        let errors = BodyCheck::new(&body)
            .min_len("password", 8)
            .one_of("status", &["active", "archived"])
            .finish();
        assert_eq!(errors.len(), 2);
    }
}
