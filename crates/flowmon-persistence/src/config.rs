//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `MONITORING_DB_PATH` y un busy-timeout opcional.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl DbConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let path = env::var("MONITORING_DB_PATH").map(PathBuf::from)
                                                 .unwrap_or_else(|_| PathBuf::from("monitoring.db"));
        let busy_timeout_ms = env::var("MONITORING_BUSY_TIMEOUT_MS").ok()
                                                                    .and_then(|v| v.parse().ok())
                                                                    .unwrap_or(250);
        Self { path, busy_timeout_ms }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
