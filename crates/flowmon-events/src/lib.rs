//! flowmon-events: contrato de telemetría del framework de ejecución.
//!
//! Rol en el flujo:
//! - El framework productor emite registros planos (campo → valor) por cada
//!   transición de workflow/task y por cada muestreo de recursos.
//! - Este crate define el tipo `TelemetryRecord` (campos opcionales con
//!   semántica "ausente = no aplica"), la validación en el borde de ingesta
//!   y la serialización del historial de fallos.
//! - El motor de persistencia (`flowmon-persistence`) consume estos
//!   registros uno a uno; aquí no hay estado ni IO.
pub mod error;
pub mod record;

pub use error::RecordError;
pub use record::{RecordKind, TelemetryRecord, UNSET_SENTINEL};
