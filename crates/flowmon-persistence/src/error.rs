//! Errores de persistencia.
//! Mapea errores de rusqlite a variantes semánticas del dominio de persistencia.

use rusqlite::ffi;
use rusqlite::Error as SqliteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not null violation: {0}")]
    NotNullViolation(String),
    #[error("not found")]
    NotFound,
    #[error("transient IO / connection error: {0}")]
    TransientIo(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

impl From<SqliteError> for PersistenceError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::QueryReturnedNoRows => Self::NotFound,
            SqliteError::SqliteFailure(e, msg) => {
                let text = msg.unwrap_or_else(|| e.to_string());
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    | ffi::SQLITE_CONSTRAINT_UNIQUE
                    | ffi::SQLITE_CONSTRAINT_ROWID => Self::UniqueViolation(text),
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::ForeignKeyViolation(text),
                    ffi::SQLITE_CONSTRAINT_CHECK => Self::CheckViolation(text),
                    ffi::SQLITE_CONSTRAINT_NOTNULL => Self::NotNullViolation(text),
                    _ => match e.code {
                        rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::CannotOpen => Self::TransientIo(text),
                        other => Self::Unknown(format!("sqlite error code {other:?}: {text}")),
                    },
                }
            }
            other => Self::Unknown(format!("unhandled rusqlite error: {other}")),
        }
    }
}
