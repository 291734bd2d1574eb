//! Payload validation against the table's columns and per-column rules.

use crate::config::{TableInfo, ValidationRule};
use crate::error::AppError;
use crate::middleware::{DatabaseRequestInterceptor, Operation, Phase, RequestContext};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// Rule engine. Each distinct `pattern` is compiled once and reused across requests.
#[derive(Debug, Default)]
pub struct RequestValidator {
    patterns: RwLock<HashMap<String, Regex>>,
}

impl RequestValidator {
    /// Validate body against per-column rules. All required fields must be present.
    pub fn validate(
        &self,
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in rules {
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                self.validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required is not enforced for missing fields.
    pub fn validate_partial(
        &self,
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, v) in body {
            if let Some(rule) = rules.get(col) {
                self.validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    fn pattern(&self, col: &str, pattern: &str) -> Result<Regex, AppError> {
        if let Some(re) = self.patterns.read().ok().and_then(|cache| cache.get(pattern).cloned()) {
            return Ok(re);
        }
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Ok(mut cache) = self.patterns.write() {
            cache.insert(pattern.to_string(), re.clone());
        }
        Ok(re)
    }

    #[cfg(test)]
    fn cached_patterns(&self) -> usize {
        self.patterns.read().map(|cache| cache.len()).unwrap_or(0)
    }

    fn validate_field(&self, col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
        if v.is_null() {
            return Ok(());
        }
        if let Some(format) = &rule.format {
            validate_format(col, v, format)?;
        }
        let chars = v.as_str().map(|s| s.chars().count());
        if let (Some(max), Some(n)) = (rule.max_length, chars) {
            if n > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
        if let (Some(min), Some(n)) = (rule.min_length, chars) {
            if n < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
        if let Some(ref pattern) = rule.pattern {
            let re = self.pattern(col, pattern)?;
            if let Some(s) = v.as_str() {
                if !re.is_match(s) {
                    return Err(AppError::Validation(format!("{} does not match required pattern", col)));
                }
            }
        }
        if let Some(ref allowed) = rule.allowed {
            if !allowed.iter().any(|a| value_eq(v, a)) {
                return Err(AppError::Validation(format!(
                    "{} must be one of: {:?}",
                    col,
                    allowed.iter().take(5).collect::<Vec<_>>()
                )));
            }
        }
        if let Some(min) = rule.minimum {
            if let Some(n) = v.as_f64() {
                if n < min {
                    return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
                }
            }
        }
        if let Some(max) = rule.maximum {
            if let Some(n) = v.as_f64() {
                if n > max {
                    return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
                }
            }
        }
        Ok(())
    }
}

/// Reject attributes the table does not expose.
fn check_known_attributes(table: &TableInfo, body: &Map<String, Value>) -> Result<(), AppError> {
    let exposed = |k: &str| table.column(k).is_some_and(|c| c.include_in_api);
    match body.keys().find(|k| !exposed(k.as_str())) {
        Some(unknown) => Err(AppError::Validation(format!(
            "{} has no attribute {}",
            table.table_name, unknown
        ))),
        None => Ok(()),
    }
}

/// Runs in before-create (full rules) and before-update (only the attributes sent).
#[derive(Debug, Default)]
pub struct DataValidationMiddleware {
    validator: RequestValidator,
}

#[async_trait]
impl DatabaseRequestInterceptor for DataValidationMiddleware {
    fn name(&self) -> &'static str {
        "data_validation_middleware"
    }

    async fn intercept(&self, ctx: &RequestContext<'_>, rows: Vec<Value>) -> Result<Vec<Value>, AppError> {
        if ctx.phase != Phase::Before {
            return Ok(rows);
        }
        for row in &rows {
            let body = row
                .as_object()
                .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))?;
            check_known_attributes(ctx.table, body)?;
            match ctx.operation {
                Operation::Create => self.validator.validate(body, &ctx.table.validations)?,
                Operation::Update => self.validator.validate_partial(body, &ctx.table.validations)?,
                _ => {}
            }
        }
        Ok(rows)
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnInfo;
    use crate::permission::Actor;
    use serde_json::json;

    fn table() -> TableInfo {
        let mut validations = HashMap::new();
        validations.insert(
            "title".to_string(),
            ValidationRule {
                required: Some(true),
                max_length: Some(5),
                ..Default::default()
            },
        );
        validations.insert(
            "contact".to_string(),
            ValidationRule {
                format: Some("email".into()),
                ..Default::default()
            },
        );
        TableInfo {
            table_name: "widgets".into(),
            columns: ["title", "contact"]
                .iter()
                .map(|n| ColumnInfo {
                    name: n.to_string(),
                    column_name: n.to_string(),
                    include_in_api: true,
                    ..Default::default()
                })
                .collect(),
            validations,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_required_fields() {
        let t = table();
        let actor = Actor::guest();
        let ctx = RequestContext::new(&t, &actor, Operation::Create, Phase::Before);
        let err = DataValidationMiddleware::default()
            .intercept(&ctx, vec![json!({ "contact": "a@b.c" })])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("title")));
    }

    #[tokio::test]
    async fn update_checks_only_sent_fields() {
        let t = table();
        let actor = Actor::guest();
        let ctx = RequestContext::new(&t, &actor, Operation::Update, Phase::Before);
        assert!(DataValidationMiddleware::default()
            .intercept(&ctx, vec![json!({ "contact": "a@b.c" })])
            .await
            .is_ok());
        assert!(DataValidationMiddleware::default()
            .intercept(&ctx, vec![json!({ "contact": "nope" })])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_attributes_are_rejected() {
        let t = table();
        let actor = Actor::guest();
        let ctx = RequestContext::new(&t, &actor, Operation::Update, Phase::Before);
        let err = DataValidationMiddleware::default()
            .intercept(&ctx, vec![json!({ "colour": "red" })])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("colour")));
    }

    #[test]
    fn length_and_allowed_rules() {
        let rule = ValidationRule {
            max_length: Some(3),
            allowed: Some(vec![json!("abc"), json!("xy")]),
            ..Default::default()
        };
        let validator = RequestValidator::default();
        assert!(validator.validate_field("code", &json!("xy"), &rule).is_ok());
        assert!(validator.validate_field("code", &json!("abcd"), &rule).is_err());
        assert!(validator.validate_field("code", &json!("zz"), &rule).is_err());
        assert!(validator.validate_field("code", &Value::Null, &rule).is_ok());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let rule = ValidationRule {
            min_length: Some(3),
            max_length: Some(3),
            ..Default::default()
        };
        let validator = RequestValidator::default();
        assert!(validator.validate_field("name", &json!("日本語"), &rule).is_ok());
        assert!(validator.validate_field("name", &json!("éé"), &rule).is_err());
    }

    #[test]
    fn patterns_compile_once() {
        let rule = ValidationRule {
            pattern: Some("^[a-z]+$".into()),
            ..Default::default()
        };
        let validator = RequestValidator::default();
        assert!(validator.validate_field("slug", &json!("abc"), &rule).is_ok());
        assert!(validator.validate_field("slug", &json!("ABC"), &rule).is_err());
        assert_eq!(validator.cached_patterns(), 1);

        let broken = ValidationRule {
            pattern: Some("(".into()),
            ..Default::default()
        };
        assert!(validator.validate_field("slug", &json!("abc"), &broken).is_err());
        assert_eq!(validator.cached_patterns(), 1);
    }
}
