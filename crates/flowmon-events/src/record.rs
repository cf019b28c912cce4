//! Registro plano de telemetría y su clasificación.
//!
//! Contrato observable (estable, compartido con el productor):
//! - `task_run_id` y `timestamp` siempre presentes.
//! - Todo lo demás es opcional; un campo ausente significa "no aplica a este
//!   evento", nunca "valor desconocido".
//! - `time_completed` usa el centinela textual `"None"` para "aún sin
//!   completar" (herencia del productor; se compara literal).
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RecordError;

/// Centinela que el productor envía en `time_completed` mientras el workflow
/// sigue corriendo.
pub const UNSET_SENTINEL: &str = "None";

/// Clasificación gruesa de un registro, derivada de qué campos trae.
///
/// Se usa para logging/diagnóstico; el ruteo real del motor evalúa presencia
/// de campos regla por regla (first-match-wins) y no depende de este enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `time_completed` presente y distinto del centinela.
    WorkflowCompletion,
    /// `task_time_completed` presente.
    TaskCompletion,
    /// `task_id` + muestra psutil (cpu_percent presente).
    ResourceSample,
    /// `task_id` + `task_status` presente.
    StatusUpdate,
    /// Trae `task_id` pero ninguna de las señales anteriores.
    TaskSummary,
    /// Registro de resumen de workflow (sin `task_id`).
    WorkflowSummary,
}

/// Acepta timestamps como texto o como número (el productor histórico envía
/// segundos epoch en punto flotante).
fn timestamp_text<'de, D>(de: D) -> Result<String, D::Error>
    where D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Num(f64),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Text(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

/// Registro plano de telemetría, un evento por instancia.
///
/// Mapea 1:1 los campos del contrato de entrada; los opcionales se
/// deserializan a `None` cuando faltan en el mapping JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryRecord {
    /// Identificador estable de una ejecución de workflow; también es la base
    /// de varios nombres de tabla en el store.
    pub task_run_id: String,
    /// Discriminador por evento dentro de una task; texto opaco para el store.
    #[serde(deserialize_with = "timestamp_text")]
    pub timestamp: String,

    // --- resumen de workflow ---
    pub time_began: Option<String>,
    /// Puede traer el centinela `"None"` (ver `UNSET_SENTINEL`).
    pub time_completed: Option<String>,
    pub rundir: Option<String>,
    pub tasks_failed_count: Option<i64>,
    pub tasks_completed_count: Option<i64>,

    // --- ciclo de vida de task ---
    pub task_id: Option<i64>,
    pub task_executor: Option<String>,
    pub task_fn_hash: Option<String>,
    pub task_time_started: Option<String>,
    pub task_time_completed: Option<String>,
    pub task_memoize: Option<bool>,

    // --- evento de estado ---
    pub task_status: Option<i64>,
    pub task_status_name: Option<String>,
    pub task_fail_count: Option<i64>,
    pub task_fail_history: Option<Vec<String>>,

    // --- muestra de recursos (psutil) ---
    pub psutil_process_pid: Option<i64>,
    pub psutil_process_cpu_percent: Option<f64>,
    pub psutil_process_memory_percent: Option<f64>,
    pub psutil_process_children_count: Option<i64>,
    pub psutil_process_time_user: Option<f64>,
    pub psutil_process_time_system: Option<f64>,
    pub psutil_process_memory_virtual: Option<f64>,
    pub psutil_process_memory_resident: Option<f64>,
    pub psutil_process_disk_read: Option<f64>,
    pub psutil_process_disk_write: Option<f64>,
    pub psutil_process_status: Option<String>,
}

impl TelemetryRecord {
    /// Registro mínimo válido; el resto de campos queda en `None`.
    pub fn new(task_run_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self { task_run_id: task_run_id.into(),
               timestamp: timestamp.into(),
               ..Self::default() }
    }

    /// Conveniencia para productores in-process: timestamp RFC3339 actual.
    pub fn now(task_run_id: impl Into<String>) -> Self {
        Self::new(task_run_id, Utc::now().to_rfc3339())
    }

    /// Validación del borde de ingesta: un registro sin `task_run_id` no debe
    /// llegar nunca a operaciones de tabla que se nombran con él.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.task_run_id.is_empty() {
            return Err(RecordError::MissingRunId);
        }
        Ok(())
    }

    /// Deserializa un mapping JSON plano y valida el contrato de entrada.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, RecordError> {
        let rec: Self = serde_json::from_value(value).map_err(|e| RecordError::Malformed(e.to_string()))?;
        rec.validate()?;
        Ok(rec)
    }

    /// `true` si `time_completed` viene con valor real (no el centinela).
    pub fn workflow_completed(&self) -> bool {
        matches!(self.time_completed.as_deref(), Some(v) if v != UNSET_SENTINEL)
    }

    /// Render del historial de fallos a un único texto (`", "` como
    /// separador). Unidireccional: el motor nunca lo vuelve a parsear.
    pub fn fail_history_text(&self) -> Option<String> {
        self.task_fail_history.as_ref().map(|h| h.join(", "))
    }

    /// Clasificación en el mismo orden de precedencia que el despacho.
    pub fn kind(&self) -> RecordKind {
        if self.workflow_completed() {
            return RecordKind::WorkflowCompletion;
        }
        if self.task_time_completed.is_some() {
            return RecordKind::TaskCompletion;
        }
        match self.task_id {
            Some(_) if self.psutil_process_cpu_percent.is_some() => RecordKind::ResourceSample,
            Some(_) if self.task_status.is_some() => RecordKind::StatusUpdate,
            Some(_) => RecordKind::TaskSummary,
            None => RecordKind::WorkflowSummary,
        }
    }
}
