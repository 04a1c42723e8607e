//! Column decoding helpers shared by the repositories.

use core::fmt::Display;
use core::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use crate::error::{ServiceResult, corrupt_row, map_sqlx_error};

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> ServiceResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| map_sqlx_error("decode_row", e))
}

/// Decode a TEXT column through the domain type's `FromStr`.
pub(crate) fn parsed<T>(row: &SqliteRow, name: &str) -> ServiceResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = column(row, name)?;
    raw.parse().map_err(|e| corrupt_row(name, e))
}

pub(crate) fn parsed_opt<T>(row: &SqliteRow, name: &str) -> ServiceResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = column(row, name)?;
    raw.map(|r| r.parse().map_err(|e| corrupt_row(name, e)))
        .transpose()
}
