//! Filter conditions over single user fields

use crate::models::{User, UserField};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The operator compares against a value but none was given
    #[error("Please provide a value (or choose is empty/is not empty)")]
    MissingValue,
}

/// Comparison applied by a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOp {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::IsEmpty => "is empty",
            Self::IsNotEmpty => "is not empty",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Contains => Self::Equals,
            Self::Equals => Self::StartsWith,
            Self::StartsWith => Self::EndsWith,
            Self::EndsWith => Self::IsEmpty,
            Self::IsEmpty => Self::IsNotEmpty,
            Self::IsNotEmpty => Self::Contains,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Self::Contains => Self::IsNotEmpty,
            Self::Equals => Self::Contains,
            Self::StartsWith => Self::Equals,
            Self::EndsWith => Self::StartsWith,
            Self::IsEmpty => Self::EndsWith,
            Self::IsNotEmpty => Self::IsEmpty,
        }
    }

    pub fn needs_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: UserField,
    pub op: FilterOp,
    pub value: String,
}

impl FilterCondition {
    /// Build a condition from operator input, trimming the value
    pub fn new(
        field: UserField,
        op: FilterOp,
        value: impl AsRef<str>,
    ) -> Result<Self, FilterError> {
        let value = value.as_ref().trim().to_string();
        if op.needs_value() && value.is_empty() {
            return Err(FilterError::MissingValue);
        }
        Ok(Self { field, op, value })
    }

    /// Case-insensitive test of the condition against one user
    pub fn matches(&self, user: &User) -> bool {
        let val = self.field.text(user).to_lowercase();
        let needle = self.value.to_lowercase();
        match self.op {
            FilterOp::Contains => val.contains(&needle),
            FilterOp::Equals => val == needle,
            FilterOp::StartsWith => val.starts_with(&needle),
            FilterOp::EndsWith => val.ends_with(&needle),
            FilterOp::IsEmpty => val.is_empty(),
            FilterOp::IsNotEmpty => !val.is_empty(),
        }
    }

    /// Short chip text, e.g. `Department contains "sales"`
    pub fn describe(&self) -> String {
        if self.op.needs_value() {
            format!("{} {} \"{}\"", self.field.label(), self.op.label(), self.value)
        } else {
            format!("{} {}", self.field.label(), self.op.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            display_name: Some("Alice Anderson".into()),
            department: Some("Sales".into()),
            account_enabled: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_operators_are_case_insensitive() {
        let u = user();
        let check = |op, value: &str| {
            FilterCondition::new(UserField::DisplayName, op, value)
                .unwrap()
                .matches(&u)
        };

        assert!(check(FilterOp::Contains, "ANDER"));
        assert!(check(FilterOp::Equals, "alice anderson"));
        assert!(!check(FilterOp::Equals, "alice"));
        assert!(check(FilterOp::StartsWith, "ALI"));
        assert!(check(FilterOp::EndsWith, "SON"));
    }

    #[test]
    fn test_empty_tests_ignore_value() {
        let u = user();
        let empty = FilterCondition::new(UserField::Mail, FilterOp::IsEmpty, "ignored").unwrap();
        let not_empty =
            FilterCondition::new(UserField::Department, FilterOp::IsNotEmpty, "").unwrap();
        assert!(empty.matches(&u));
        assert!(not_empty.matches(&u));
    }

    #[test]
    fn test_blank_value_is_rejected() {
        assert_eq!(
            FilterCondition::new(UserField::Mail, FilterOp::Contains, "   "),
            Err(FilterError::MissingValue)
        );
        assert!(FilterCondition::new(UserField::Mail, FilterOp::IsEmpty, "").is_ok());
    }

    #[test]
    fn test_boolean_field_uses_string_form() {
        let cond =
            FilterCondition::new(UserField::AccountEnabled, FilterOp::Equals, "TRUE").unwrap();
        assert!(cond.matches(&user()));
    }

    #[test]
    fn test_describe() {
        let cond =
            FilterCondition::new(UserField::Department, FilterOp::Contains, " sales ").unwrap();
        assert_eq!(cond.describe(), "Department contains \"sales\"");
        let cond = FilterCondition::new(UserField::Mail, FilterOp::IsEmpty, "").unwrap();
        assert_eq!(cond.describe(), "Email is empty");
    }

    #[test]
    fn test_op_cycle_round_trips() {
        let mut op = FilterOp::Contains;
        for _ in 0..6 {
            assert_eq!(op.next().prev(), op);
            op = op.next();
        }
        assert_eq!(op, FilterOp::Contains);
    }
}
