//! Database-agnostic type mappings.
//!
//! This module decodes database-specific rows into [`Value`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its rows are classified by the storage
//! class of each value rather than the declared column type.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Null,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower == "null" {
        return TypeCategory::Null;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Temporal types
    if lower.contains("timestamp")
        || lower.contains("datetime")
        || lower == "date"
        || lower == "time"
        || lower == "timetz"
    {
        return TypeCategory::Temporal;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Boolean
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Decoding Trait
// =============================================================================

/// Trait for converting database rows into column names and values.
pub trait RowToValues {
    fn column_names(&self) -> Vec<String>;
    fn to_values(&self) -> DbResult<Vec<Value>>;
}

impl RowToValues for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DbResult<Vec<Value>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowToValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DbResult<Vec<Value>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowToValues for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DbResult<Vec<Value>> {
        (0..self.columns().len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

/// Split decoded rows into the column list (from the first row) and value rows.
///
/// A value that cannot be decoded fails the whole result set.
pub fn decode_rows<R: RowToValues>(rows: &[R]) -> DbResult<(Vec<String>, Vec<Vec<Value>>)> {
    let columns = rows.first().map(R::column_names).unwrap_or_default();
    let values = rows.iter().map(R::to_values).collect::<DbResult<Vec<_>>>()?;
    Ok((columns, values))
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================
//
// Decoders that try several Rust types only move on when the column type is
// incompatible; the last candidate's error is returned as is.

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> DbResult<Value> {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(value.map_or(Value::Null, |v| Value::Text(v.0)))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(v.map_or(Value::Null, Value::Int));
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        Ok(match row.try_get::<Option<u64>, _>(idx)? {
            // Beyond i64 range the exact digits are kept as text
            Some(v) => i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(v.to_string())),
            None => Value::Null,
        })
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<bool>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Bool))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map_or(Value::Null, Value::Float));
        }
        let value = row.try_get::<Option<f32>, _>(idx)?;
        Ok(value.map_or(Value::Null, |v| Value::Float(v.into())))
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Bytes))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<serde_json::Value>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Json))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_rfc3339())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        decode_text(row, idx)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return Ok(v.map_or(Value::Null, Value::Text));
        }
        // VARBINARY-backed text columns
        decode_binary(row, idx)
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::types::PgTimeTz;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> DbResult<Value> {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<RawDecimal>, _>(idx)?;
        Ok(value.map_or(Value::Null, |v| Value::Text(v.0)))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Int(v.into())));
        }
        let value = row.try_get::<Option<i64>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Int))
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<bool>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Bool))
    }

    fn decode_float(row: &PgRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map_or(Value::Null, Value::Float));
        }
        let value = row.try_get::<Option<f32>, _>(idx)?;
        Ok(value.map_or(Value::Null, |v| Value::Float(v.into())))
    }

    fn decode_binary(row: &PgRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Bytes))
    }

    fn decode_json(row: &PgRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<serde_json::Value>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Json))
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> DbResult<Value> {
        // Binary protocol delivers the 16 raw bytes
        let Some(bytes) = row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)? else {
            return Ok(Value::Null);
        };
        let id = uuid::Uuid::from_slice(&bytes).map_err(|e| {
            DbError::internal(format!("Failed to decode column {}: {}", idx, e))
        })?;
        Ok(Value::Text(id.to_string()))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> DbResult<Value> {
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_rfc3339())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(idx) {
            return Ok(v.map_or(Value::Null, |v| Value::Text(v.to_string())));
        }
        let value =
            row.try_get::<Option<PgTimeTz<chrono::NaiveTime, chrono::FixedOffset>>, _>(idx)?;
        Ok(value.map_or(Value::Null, |v| {
            Value::Text(format!("{}{}", v.time, v.offset))
        }))
    }

    fn decode_text(row: &PgRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<String>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Text))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match categorize_type(raw.type_info().name(), DatabaseType::SQLite) {
            TypeCategory::Integer | TypeCategory::Boolean => decode_integer(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<i64>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Int))
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<f64>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Float))
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<Vec<u8>>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Bytes))
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> DbResult<Value> {
        let value = row.try_get::<Option<String>, _>(idx)?;
        Ok(value.map_or(Value::Null, Value::Text))
    }
}
