//! Typed INSERT / UPDATE builders.
//!
//! Columns keep the order they were added in. Table and column names are
//! validated as plain identifiers (optionally `schema.name`) since they are
//! spliced into the statement text; values always travel as bound params.

use crate::db::context::ExecutionContext;
use crate::error::{DbError, DbResult};
use crate::models::Value;

/// `INSERT INTO table (c1, c2, ...) VALUES (?, ?, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    columns: Vec<(String, Value)>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// Render the `?`-templated statement and its params.
    pub fn build(&self) -> DbResult<(String, Vec<Value>)> {
        validate_identifier(&self.table)?;
        if self.columns.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Insert into '{}' has no columns",
                self.table
            )));
        }

        let mut names = Vec::with_capacity(self.columns.len());
        let mut params = Vec::with_capacity(self.columns.len());
        for (column, value) in &self.columns {
            validate_identifier(column)?;
            names.push(column.as_str());
            params.push(value.clone());
        }

        let markers = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            markers
        );
        Ok((sql, params))
    }
}

/// `UPDATE table SET c1 = ?, ... WHERE <filter>`.
///
/// The filter is a `?`-templated condition whose params follow the SET
/// values. It is required; pass `"1 = 1"` to touch every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    columns: Vec<(String, Value)>,
    filter: Option<(String, Vec<Value>)>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn filter(mut self, condition: impl Into<String>, params: Vec<Value>) -> Self {
        self.filter = Some((condition.into(), params));
        self
    }

    pub fn build(&self) -> DbResult<(String, Vec<Value>)> {
        validate_identifier(&self.table)?;
        if self.columns.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Update of '{}' sets no columns",
                self.table
            )));
        }
        let Some((condition, filter_params)) = &self.filter else {
            return Err(DbError::invalid_input(format!(
                "Update of '{}' has no filter",
                self.table
            )));
        };
        if condition.trim().is_empty() {
            return Err(DbError::invalid_input("Update filter is empty"));
        }

        let mut assignments = Vec::with_capacity(self.columns.len());
        let mut params = Vec::with_capacity(self.columns.len() + filter_params.len());
        for (column, value) in &self.columns {
            validate_identifier(column)?;
            assignments.push(format!("{} = ?", column));
            params.push(value.clone());
        }
        params.extend(filter_params.iter().cloned());

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(", "),
            condition
        );
        Ok((sql, params))
    }
}

fn validate_identifier(name: &str) -> DbResult<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "Invalid identifier '{}'",
            name
        )))
    }
}

impl ExecutionContext {
    /// Execute an [`Insert`]; auto-commits outside a transaction.
    pub fn insert(&mut self, insert: &Insert) -> DbResult<u64> {
        let (sql, params) = insert.build()?;
        self.execute(&sql, &params)
    }

    /// Execute an [`Update`]; auto-commits outside a transaction.
    pub fn update(&mut self, update: &Update) -> DbResult<u64> {
        let (sql, params) = update.build()?;
        self.execute(&sql, &params)
    }
}
