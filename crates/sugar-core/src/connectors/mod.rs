//! Warehouse access.
//!
//! The documentation run only needs two things from a database: the column
//! names of a model's table and the result of an ad hoc data assertion.

pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use crate::errors::{SugarError, SugarResult};
use crate::models::{NOT_NULL_TEST, UNIQUE_TEST};

/// Data assertions a connector can evaluate directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssertionKind {
    /// No non-null value appears more than once.
    Unique,
    NotNull,
}

impl AssertionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unique => UNIQUE_TEST,
            Self::NotNull => NOT_NULL_TEST,
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssertionKind {
    type Err = SugarError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            UNIQUE_TEST => Ok(Self::Unique),
            NOT_NULL_TEST => Ok(Self::NotNull),
            other => Err(SugarError::Connector(format!(
                "unsupported assertion '{other}'; expected '{UNIQUE_TEST}' or '{NOT_NULL_TEST}'"
            ))),
        }
    }
}

pub trait Connector {
    /// Column names of `schema.table` in table order. An empty list means
    /// the table does not exist.
    fn list_columns(&self, table: &str, schema: &str) -> SugarResult<Vec<String>>;

    /// True when the assertion holds for every row.
    fn run_assertion(
        &self,
        kind: AssertionKind,
        schema: &str,
        table: &str,
        column: &str,
    ) -> SugarResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_kind_parsing() {
        assert_eq!("unique".parse::<AssertionKind>().unwrap(), AssertionKind::Unique);
        assert_eq!("not_null".parse::<AssertionKind>().unwrap(), AssertionKind::NotNull);
        assert!(matches!(
            "accepted_values".parse::<AssertionKind>(),
            Err(SugarError::Connector(_))
        ));
        assert_eq!(AssertionKind::NotNull.to_string(), "not_null");
    }
}
