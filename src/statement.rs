//! Parameterized SQL statements handed to the storage layer.

use std::fmt;

use rusqlite::types::Value as SqlValue;

/// Ordered parameter list using numbered `?N` placeholders, so fragments can be
/// emitted in any order and a placeholder may appear more than once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    values: Vec<SqlValue>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value and returns its placeholder.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.values.push(value.into());
        format!("?{}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// A complete statement: SQL text plus the values bound to its placeholders.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: ParamList) -> Self {
        Self {
            sql: sql.into(),
            params: params.into_values(),
        }
    }

    pub fn without_params(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            write!(f, " -- params: {:?}", self.params)?;
        }
        Ok(())
    }
}
