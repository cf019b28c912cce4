//! Acceso a la base SQLite de monitoreo.
//!
//! Decisiones de diseño:
//! - El store handle entra como dependencia explícita (`ConnectionProvider`),
//!   nunca como estado ambiente; eso habilita dobles de test y reuso.
//! - Una conexión por evento: se abre, se usa, se suelta. No hay pool ni
//!   reuso entre eventos (el motor procesa de a un evento y no suspende).
//! - `PRAGMA foreign_keys` se apaga explícitamente en cada conexión: el
//!   orden de reglas del despacho permite que una muestra de recursos
//!   llegue antes del first-sight de su task, y las FK declaradas en el
//!   DDL son documentales en ese escenario. (El SQLite embebido puede
//!   venir compilado con enforcement por defecto; no se confía en eso.)

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DbConfig;
use crate::error::PersistenceError;

/// Proveedor abstracto de conexiones.
///
/// Contrato:
/// - Debe devolver una conexión lista para ejecutar consultas, o
///   `PersistenceError::TransientIo`/equivalente en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para operar sobre el store.
    fn connection(&self) -> Result<Connection, PersistenceError>;
}

/// Proveedor concreto respaldado por un archivo SQLite.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
    busy_timeout: Duration,
}

impl FileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(),
               busy_timeout: Duration::from_millis(250) }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Helper de desarrollo: carga `.env` y lee `MONITORING_DB_PATH`.
    pub fn from_env() -> Self {
        crate::config::init_dotenv();
        let cfg = DbConfig::from_env();
        Self { path: cfg.path,
               busy_timeout: Duration::from_millis(cfg.busy_timeout_ms) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for FileProvider {
    fn connection(&self) -> Result<Connection, PersistenceError> {
        let conn = Connection::open(&self.path).map_err(|e| {
                       PersistenceError::TransientIo(format!("open {}: {e}", self.path.display()))
                   })?;
        // Contención store-side (writer concurrente) se espera acotada.
        conn.busy_timeout(self.busy_timeout)?;
        // Las FK del esquema son documentales; el default de compilación del
        // SQLite embebido no decide esto.
        conn.pragma_update(None, "foreign_keys", false)?;
        Ok(conn)
    }
}
