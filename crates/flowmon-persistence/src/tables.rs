//! Definiciones de tabla para las cuatro familias del esquema de monitoreo.
//!
//! Contrato observable (estable, compartido con stores ya desplegados):
//! - `workflows`: tabla singleton de resúmenes de ejecución.
//! - `<run_id>`: índice de tasks de un run (el nombre ES el run_id).
//! - `<run_id><task_id>`: historial de estados de una task.
//! - `<run_id><task_id>_resources`: historial de muestras de recursos.
//!
//! El builder es puro y determinista: misma entrada, misma definición. El
//! DDL emite `CREATE TABLE IF NOT EXISTS` para que la creación concurrente
//! sea idempotente del lado del store.

/// Nombre de la tabla singleton de workflows.
pub const WORKFLOWS_TABLE: &str = "workflows";

/// Nombre de la tabla índice de un run.
pub fn run_index_name(run_id: &str) -> String {
    run_id.to_string()
}

/// Nombre de la tabla de historial de estados de `(run_id, task_id)`.
pub fn status_table_name(run_id: &str, task_id: i64) -> String {
    format!("{run_id}{task_id}")
}

/// Nombre de la tabla de historial de recursos de `(run_id, task_id)`.
pub fn resource_table_name(run_id: &str, task_id: i64) -> String {
    format!("{}_resources", status_table_name(run_id, task_id))
}

/// Cita un identificador SQL (los nombres derivados de `run_id` son texto
/// arbitrario del productor).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Afinidad de columna en el store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

/// Especificación de una columna: tipo, nulabilidad, PK y FK opcional.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    /// (tabla referida, columna referida); la tabla puede ser dinámica.
    pub references: Option<(String, &'static str)>,
}

impl ColumnSpec {
    fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name,
               ty,
               nullable: false,
               primary_key: false,
               references: None }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    fn references(mut self, table: impl Into<String>, column: &'static str) -> Self {
        self.references = Some((table.into(), column));
        self
    }

    fn def_sql(&self) -> String {
        let mut def = format!("{} {}", quote_ident(self.name), self.ty.sql());
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some((table, column)) = &self.references {
            def.push_str(&format!(" REFERENCES {} ({})", quote_ident(table), quote_ident(column)));
        }
        def
    }
}

/// Definición completa de una tabla lista para emitir DDL.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// DDL idempotente de creación.
    pub fn create_sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(ColumnSpec::def_sql).collect();
        format!("CREATE TABLE IF NOT EXISTS {} ({});", quote_ident(&self.name), cols.join(", "))
    }
}

/// Tabla singleton de resúmenes de workflow (una fila por `run_id`).
pub fn workflows_table() -> TableSpec {
    TableSpec { name: WORKFLOWS_TABLE.to_string(),
                columns: vec![ColumnSpec::new("task_run_id", ColumnType::Text).primary_key(),
                              ColumnSpec::new("time_began", ColumnType::Text),
                              ColumnSpec::new("time_completed", ColumnType::Text).nullable(),
                              ColumnSpec::new("rundir", ColumnType::Text),
                              ColumnSpec::new("tasks_failed_count", ColumnType::Integer),
                              ColumnSpec::new("tasks_completed_count", ColumnType::Integer),] }
}

/// Índice de tasks de un run; el nombre de la tabla es el `run_id` mismo.
pub fn run_index_table(run_id: &str) -> TableSpec {
    TableSpec { name: run_index_name(run_id),
                columns: vec![ColumnSpec::new("task_id", ColumnType::Integer).primary_key(),
                              ColumnSpec::new("task_run_id", ColumnType::Text).references(WORKFLOWS_TABLE,
                                                                                          "task_run_id"),
                              ColumnSpec::new("task_executor", ColumnType::Text),
                              ColumnSpec::new("task_fn_hash", ColumnType::Text),
                              ColumnSpec::new("task_time_started", ColumnType::Text),
                              ColumnSpec::new("task_time_completed", ColumnType::Text).nullable(),
                              ColumnSpec::new("task_memoize", ColumnType::Boolean),] }
}

/// Historial de estados de una task; append-only, PK por `timestamp`.
pub fn status_table(run_id: &str, task_id: i64) -> TableSpec {
    TableSpec { name: status_table_name(run_id, task_id),
                columns: vec![ColumnSpec::new("task_id", ColumnType::Integer).references(run_index_name(run_id),
                                                                                         "task_id"),
                              ColumnSpec::new("task_status", ColumnType::Integer),
                              // Integer en el esquema desplegado aunque el
                              // productor envíe etiquetas; SQLite no lo exige.
                              ColumnSpec::new("task_status_name", ColumnType::Integer),
                              ColumnSpec::new("timestamp", ColumnType::Text).primary_key(),
                              ColumnSpec::new("task_run_id", ColumnType::Text).references(WORKFLOWS_TABLE,
                                                                                          "task_run_id"),
                              ColumnSpec::new("task_fail_count", ColumnType::Integer),
                              ColumnSpec::new("task_fail_history", ColumnType::Text).nullable(),] }
}

/// Historial de muestras de recursos de una task; append-only, PK por
/// `timestamp`, atributos psutil todos anulables.
pub fn resource_table(run_id: &str, task_id: i64) -> TableSpec {
    TableSpec { name: resource_table_name(run_id, task_id),
                columns: vec![ColumnSpec::new("task_id", ColumnType::Integer).references(run_index_name(run_id),
                                                                                         "task_id"),
                              ColumnSpec::new("timestamp", ColumnType::Text).primary_key(),
                              ColumnSpec::new("task_run_id", ColumnType::Text).references(WORKFLOWS_TABLE,
                                                                                          "task_run_id"),
                              ColumnSpec::new("psutil_process_pid", ColumnType::Integer).nullable(),
                              ColumnSpec::new("psutil_process_cpu_percent", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_memory_percent", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_children_count", ColumnType::Integer).nullable(),
                              ColumnSpec::new("psutil_process_time_user", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_time_system", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_memory_virtual", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_memory_resident", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_disk_read", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_disk_write", ColumnType::Real).nullable(),
                              ColumnSpec::new("psutil_process_status", ColumnType::Text).nullable(),] }
}
