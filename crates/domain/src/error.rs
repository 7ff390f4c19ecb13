//! Validation error types.

use thiserror::Error;

/// The constraint a field failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Field must be present and non-blank (non-zero for ids).
    Required,
    /// Numeric field must be at least `min`.
    Min { min: i64 },
    /// Numeric field must be at most `max`.
    Max { max: i64 },
    /// Text field must be exactly `len` characters long.
    Length { len: usize },
    /// Text field must match a named format (`e164`, `email`, `iso4217`).
    Format { format: &'static str },
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Required => write!(f, "is required"),
            Rule::Min { min } => write!(f, "must be >= {min}"),
            Rule::Max { max } => write!(f, "must be <= {max}"),
            Rule::Length { len } => write!(f, "must be exactly {len} characters"),
            Rule::Format { format } => write!(f, "must be a valid {format} value"),
        }
    }
}

/// A single violated constraint, addressed by its path in the order
/// (`payment.currency`, `items[2].sale`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub rule: Rule,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: Rule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.rule)
    }
}

/// An order failed validation. Lists every violation, not only the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("order validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Returns true if the given field path has at least one violation.
    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Returns the rules violated by the given field path.
    pub fn rules_for(&self, field: &str) -> Vec<&Rule> {
        self.violations
            .iter()
            .filter(|v| v.field == field)
            .map(|v| &v.rule)
            .collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_every_violation() {
        let err = ValidationError {
            violations: vec![
                FieldViolation::new("entry", Rule::Required),
                FieldViolation::new("items[0].sale", Rule::Max { max: 100 }),
            ],
        };
        assert_eq!(
            err.to_string(),
            "order validation failed: entry is required; items[0].sale must be <= 100"
        );
    }

    #[test]
    fn test_rules_for_filters_by_path() {
        let err = ValidationError {
            violations: vec![
                FieldViolation::new("delivery.phone", Rule::Required),
                FieldViolation::new("delivery.zip", Rule::Length { len: 7 }),
            ],
        };
        assert_eq!(err.rules_for("delivery.zip"), vec![&Rule::Length { len: 7 }]);
        assert!(!err.has_violation("delivery.email"));
    }
}
