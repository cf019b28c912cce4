//! Errores del contrato de telemetría.
//! Violaciones del borde de ingesta, previas a cualquier contacto con el store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    /// `task_run_id` ausente o vacío: violación dura del contrato de entrada.
    #[error("registro sin task_run_id")]
    MissingRunId,
    #[error("registro inválido: {0}")]
    Malformed(String),
}
