//! Motor de persistencia de telemetría (ruteo + reconciliación + DML).
//!
//! Rol en el flujo:
//! - `MonitorStore::process` recibe un registro por vez y lo lleva a
//!   completitud (incluida la creación de tablas) antes de devolver.
//! - El despacho evalúa reglas de arriba hacia abajo, first-match-wins,
//!   con retorno temprano tras cada rama que cierra el evento.
//! - Postura best-effort: perder un evento de monitoreo jamás debe
//!   desestabilizar el workload observado. Ningún error documentado escapa
//!   al llamador; los descartes quedan en `dropped_events` y en el log.
//!
//! Estado entre eventos: únicamente el catálogo de esquema cacheado (se
//! actualiza cuando este motor crea tablas) y los contadores.

use flowmon_events::TelemetryRecord;
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ToSql};

use crate::catalog::{ensure_table, SchemaCatalog, REFLECT_ATTEMPTS};
use crate::error::PersistenceError;
use crate::sqlite::ConnectionProvider;
use crate::tables::{self, quote_ident, run_index_name, WORKFLOWS_TABLE};

/// Motor de persistencia: la unidad que el resto del sistema invoca una vez
/// por evento.
pub struct MonitorStore<P: ConnectionProvider> {
    provider: P,
    catalog: Option<SchemaCatalog>,
    processed: u64,
    dropped: u64,
}

impl<P: ConnectionProvider> MonitorStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider,
               catalog: None,
               processed: 0,
               dropped: 0 }
    }

    /// Eventos recibidos (persistidos o no).
    pub fn processed_events(&self) -> u64 {
        self.processed
    }

    /// Eventos descartados bajo las rutas de falla documentadas. El llamador
    /// no puede distinguir "persistido" de "descartado" por el retorno;
    /// este contador es la señal operable de pérdida sistémica.
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Invalida el catálogo cacheado (para escritores externos que agreguen
    /// tablas por fuera de este motor).
    pub fn invalidate_catalog(&mut self) {
        self.catalog = None;
    }

    /// Procesa un registro a completitud. Nunca propaga errores: los caminos
    /// de falla documentados terminan en descarte silencioso con log.
    pub fn process(&mut self, rec: &TelemetryRecord) {
        self.processed += 1;
        if let Err(e) = rec.validate() {
            error!("registro rechazado en el borde: {e}");
            self.dropped += 1;
            return;
        }
        let Some(conn) = self.open_session() else {
            // la causa puntual (conexión o reflect) ya quedó logueada por intento
            warn!("conexión/descubrimiento de esquema agotados tras {REFLECT_ATTEMPTS} intentos; \
                   evento descartado run={}",
                  rec.task_run_id);
            self.dropped += 1;
            return;
        };
        // El catálogo sale del motor durante el despacho y vuelve con las
        // tablas que el evento haya creado.
        let mut catalog = self.catalog.take().unwrap_or_default();
        let result = dispatch(&conn, &mut catalog, rec);
        self.catalog = Some(catalog);
        match result {
            Ok(()) => debug!("evento {:?} persistido run={} ts={}",
                             rec.kind(),
                             rec.task_run_id,
                             rec.timestamp),
            Err(e) => {
                warn!("evento {:?} descartado run={} err={e}", rec.kind(), rec.task_run_id);
                self.dropped += 1;
            }
        }
    }

    /// Conexión por evento + descubrimiento de esquema si el catálogo está
    /// frío. Reintento acotado e inmediato (backoff mínimo); al agotar, el
    /// evento se pierde sin propagar.
    fn open_session(&mut self) -> Option<Connection> {
        for attempt in 1..=REFLECT_ATTEMPTS {
            match self.provider.connection() {
                Ok(conn) => {
                    if self.catalog.is_some() {
                        return Some(conn);
                    }
                    match SchemaCatalog::reflect(&conn) {
                        Ok(cat) => {
                            self.catalog = Some(cat);
                            return Some(conn);
                        }
                        Err(e) => warn!("reflect falló (intento {attempt}/{REFLECT_ATTEMPTS}): {e}"),
                    }
                }
                Err(e) => warn!("conexión falló (intento {attempt}/{REFLECT_ATTEMPTS}): {e}"),
            }
            std::thread::sleep(std::time::Duration::from_millis(15 * u64::from(attempt)));
        }
        None
    }
}

/// Reglas de despacho, evaluadas de arriba hacia abajo; cada rama que
/// cierra el evento retorna de inmediato.
fn dispatch(conn: &Connection,
            catalog: &mut SchemaCatalog,
            rec: &TelemetryRecord)
            -> Result<(), PersistenceError> {
    let run_id = rec.task_run_id.as_str();

    // 1. Cierre de workflow: update in-place de time_completed.
    if rec.workflow_completed() {
        let sql = format!("UPDATE {} SET time_completed = ?1 WHERE task_run_id = ?2",
                          quote_ident(WORKFLOWS_TABLE));
        conn.execute(&sql, params![rec.time_completed, run_id])?;
        debug!("workflow {run_id} marcado como completado");
        return Ok(());
    }

    // 2. Cierre de task: update in-place de task_time_completed en el índice.
    if let Some(done) = rec.task_time_completed.as_deref() {
        let task_id = rec.task_id
                         .ok_or_else(|| PersistenceError::Unknown("cierre de task sin task_id".into()))?;
        let sql = format!("UPDATE {} SET task_time_completed = ?1 WHERE task_id = ?2",
                          quote_ident(&run_index_name(run_id)));
        conn.execute(&sql, params![done, task_id])?;
        debug!("task {task_id} de {run_id} marcada como completada");
        return Ok(());
    }

    // 3. Bootstrap de la tabla workflows + first-sight del run.
    ensure_table(conn, catalog, &tables::workflows_table())?;
    if first_sight(conn, WORKFLOWS_TABLE, "task_run_id", &run_id)? {
        match insert_present(conn, WORKFLOWS_TABLE, workflow_columns(rec)) {
            // Violación de integridad en first-sight (carrera de duplicados,
            // o un evento de task que llegó antes que el resumen del run y
            // no trae las columnas NOT NULL): se loguea y la rama termina.
            Err(e) if is_integrity_violation(&e) => {
                warn!("first-sight de workflow {run_id} rechazado: {e}");
            }
            other => {
                other?;
                debug!("workflow {run_id} agregado a la tabla workflows");
            }
        }
    }

    // 4. Totales acumulados; ambos pueden aplicar al mismo evento.
    if let Some(n) = rec.tasks_completed_count {
        let sql = format!("UPDATE {} SET tasks_completed_count = ?1 WHERE task_run_id = ?2",
                          quote_ident(WORKFLOWS_TABLE));
        conn.execute(&sql, params![n, run_id])?;
    }
    if let Some(n) = rec.tasks_failed_count {
        let sql = format!("UPDATE {} SET tasks_failed_count = ?1 WHERE task_run_id = ?2",
                          quote_ident(WORKFLOWS_TABLE));
        conn.execute(&sql, params![n, run_id])?;
    }

    // 5. Tabla índice del run.
    ensure_table(conn, catalog, &tables::run_index_table(run_id))?;

    // 6. De acá en adelante sólo eventos de task; un resumen puro de
    //    workflow termina acá.
    let Some(task_id) = rec.task_id else {
        return Ok(());
    };

    // 6a. Muestra de recursos: crear la tabla si hace falta e insertar en el
    //     mismo paso.
    if rec.psutil_process_cpu_percent.is_some() {
        let spec = tables::resource_table(run_id, task_id);
        let created = ensure_table(conn, catalog, &spec)?;
        insert_present(conn, &spec.name, resource_columns(rec, task_id))?;
        debug!("muestra de recursos de ({run_id}, {task_id}) insertada (tabla nueva: {created})");
        return Ok(());
    }

    // 6b. First-sight de la task en el índice del run.
    if first_sight(conn, &run_index_name(run_id), "task_id", &task_id)? {
        match insert_present(conn, &run_index_name(run_id), run_index_columns(rec, task_id)) {
            Err(e) if is_integrity_violation(&e) => {
                warn!("first-sight de task ({run_id}, {task_id}) rechazado: {e}");
            }
            other => {
                other?;
                debug!("task {task_id} agregada al índice de {run_id}");
            }
        }
    }

    // 6c. Evento de estado: historial append-only.
    if rec.task_status.is_some() {
        let spec = tables::status_table(run_id, task_id);
        let created = ensure_table(conn, catalog, &spec)?;
        insert_present(conn, &spec.name, status_columns(rec, task_id))?;
        debug!("status de ({run_id}, {task_id}) insertado (tabla nueva: {created})");
        return Ok(());
    }

    Ok(())
}

/// Violaciones de constraint que un first-sight tolera (equivalen al
/// IntegrityError del store: duplicado por carrera o columnas NOT NULL
/// ausentes en el registro).
fn is_integrity_violation(e: &PersistenceError) -> bool {
    matches!(e,
             PersistenceError::UniqueViolation(_)
             | PersistenceError::NotNullViolation(_)
             | PersistenceError::CheckViolation(_)
             | PersistenceError::ForeignKeyViolation(_))
}

/// `true` si todavía no hay fila para esta clave (first-sight).
fn first_sight<T: ToSql>(conn: &Connection,
                         table: &str,
                         key_col: &str,
                         key: &T)
                         -> Result<bool, PersistenceError> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", quote_ident(table), quote_ident(key_col));
    let n: i64 = conn.query_row(&sql, params![key], |row| row.get(0))?;
    Ok(n == 0)
}

/// INSERT dinámico con sólo las columnas presentes en el registro; las
/// ausentes quedan en el default del store (NULL).
fn insert_present(conn: &Connection,
                  table: &str,
                  cols: Vec<(&'static str, Value)>)
                  -> Result<(), PersistenceError> {
    let names: Vec<String> = cols.iter().map(|(n, _)| quote_ident(n)).collect();
    let marks: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
    let sql = format!("INSERT INTO {} ({}) VALUES ({})",
                      quote_ident(table),
                      names.join(", "),
                      marks.join(", "));
    conn.execute(&sql, params_from_iter(cols.into_iter().map(|(_, v)| v)))?;
    Ok(())
}

fn push_present<T: Into<Value>>(cols: &mut Vec<(&'static str, Value)>, name: &'static str, value: Option<T>) {
    if let Some(v) = value {
        cols.push((name, v.into()));
    }
}

/// Columnas de la familia workflows presentes en el registro.
fn workflow_columns(rec: &TelemetryRecord) -> Vec<(&'static str, Value)> {
    let mut cols = vec![("task_run_id", Value::from(rec.task_run_id.clone()))];
    push_present(&mut cols, "time_began", rec.time_began.clone());
    // El centinela "None" se inserta literal si el productor lo mandó.
    push_present(&mut cols, "time_completed", rec.time_completed.clone());
    push_present(&mut cols, "rundir", rec.rundir.clone());
    push_present(&mut cols, "tasks_failed_count", rec.tasks_failed_count);
    push_present(&mut cols, "tasks_completed_count", rec.tasks_completed_count);
    cols
}

/// Columnas del índice de tasks presentes en el registro.
fn run_index_columns(rec: &TelemetryRecord, task_id: i64) -> Vec<(&'static str, Value)> {
    let mut cols = vec![("task_id", Value::from(task_id)),
                        ("task_run_id", Value::from(rec.task_run_id.clone()))];
    push_present(&mut cols, "task_executor", rec.task_executor.clone());
    push_present(&mut cols, "task_fn_hash", rec.task_fn_hash.clone());
    push_present(&mut cols, "task_time_started", rec.task_time_started.clone());
    push_present(&mut cols, "task_time_completed", rec.task_time_completed.clone());
    push_present(&mut cols, "task_memoize", rec.task_memoize);
    cols
}

/// Columnas del historial de estados presentes en el registro.
fn status_columns(rec: &TelemetryRecord, task_id: i64) -> Vec<(&'static str, Value)> {
    let mut cols = vec![("task_id", Value::from(task_id)),
                        ("timestamp", Value::from(rec.timestamp.clone())),
                        ("task_run_id", Value::from(rec.task_run_id.clone()))];
    push_present(&mut cols, "task_status", rec.task_status);
    push_present(&mut cols, "task_status_name", rec.task_status_name.clone());
    push_present(&mut cols, "task_fail_count", rec.task_fail_count);
    push_present(&mut cols, "task_fail_history", rec.fail_history_text());
    cols
}

/// Columnas del historial de recursos presentes en el registro.
fn resource_columns(rec: &TelemetryRecord, task_id: i64) -> Vec<(&'static str, Value)> {
    let mut cols = vec![("task_id", Value::from(task_id)),
                        ("timestamp", Value::from(rec.timestamp.clone())),
                        ("task_run_id", Value::from(rec.task_run_id.clone()))];
    push_present(&mut cols, "psutil_process_pid", rec.psutil_process_pid);
    push_present(&mut cols, "psutil_process_cpu_percent", rec.psutil_process_cpu_percent);
    push_present(&mut cols, "psutil_process_memory_percent", rec.psutil_process_memory_percent);
    push_present(&mut cols, "psutil_process_children_count", rec.psutil_process_children_count);
    push_present(&mut cols, "psutil_process_time_user", rec.psutil_process_time_user);
    push_present(&mut cols, "psutil_process_time_system", rec.psutil_process_time_system);
    push_present(&mut cols, "psutil_process_memory_virtual", rec.psutil_process_memory_virtual);
    push_present(&mut cols, "psutil_process_memory_resident", rec.psutil_process_memory_resident);
    push_present(&mut cols, "psutil_process_disk_read", rec.psutil_process_disk_read);
    push_present(&mut cols, "psutil_process_disk_write", rec.psutil_process_disk_write);
    push_present(&mut cols, "psutil_process_status", rec.psutil_process_status.clone());
    cols
}
