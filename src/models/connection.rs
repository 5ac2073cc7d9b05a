//! Connection-related data models.
//!
//! This module defines the supported backends and the parameter placeholder
//! syntax each of them expects.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Placeholder syntax the backend's driver expects.
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Self::PostgreSQL => PlaceholderStyle::Numbered,
            Self::MySQL | Self::SQLite => PlaceholderStyle::QuestionMark,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Parameter placeholder syntax.
///
/// Statement templates are always written with `?`; before execution they are
/// rewritten into the active style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?` (SQLite, MySQL)
    #[default]
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
    /// `%s` (format-style drivers)
    Format,
}

impl PlaceholderStyle {
    /// Parse a style name as used in connection URLs (`?placeholder=numbered`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "qmark" | "question_mark" | "?" => Some(Self::QuestionMark),
            "numbered" | "numeric" | "dollar" | "$" => Some(Self::Numbered),
            "format" | "%s" => Some(Self::Format),
            _ => None,
        }
    }

    /// The literal marker for this style (the first one, for numbered).
    pub fn marker(&self) -> &'static str {
        match self {
            Self::QuestionMark => "?",
            Self::Numbered => "$1",
            Self::Format => "%s",
        }
    }

    /// Rewrite `?` placeholders in a template into this style.
    ///
    /// A `?` inside a single-quoted string literal is left alone.
    pub fn rewrite<'a>(&self, template: &'a str) -> Cow<'a, str> {
        if *self == Self::QuestionMark || !template.contains('?') {
            return Cow::Borrowed(template);
        }

        let mut out = String::with_capacity(template.len() + 8);
        let mut in_literal = false;
        let mut index = 0;
        for ch in template.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    index += 1;
                    match self {
                        Self::Numbered => {
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        Self::Format => out.push_str("%s"),
                        Self::QuestionMark => out.push('?'),
                    }
                }
                _ => out.push(ch),
            }
        }
        Cow::Owned(out)
    }
}
