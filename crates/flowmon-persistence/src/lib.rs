//! flowmon-persistence
//!
//! Persistencia de telemetría de ejecución con esquema dinámico: cada run de
//! workflow y cada task dentro de él reciben su propio juego de tablas,
//! creado on-demand al primer evento que lo necesita.
//!
//! Módulos:
//! - `sqlite`: proveedor de conexiones (una conexión por evento).
//! - `tables`: builder puro de definiciones de tabla (las cuatro familias).
//! - `catalog`: catálogo de esquema reflejado del store + reconciliación.
//! - `engine`: ruteo de eventos y DML insert-or-update (`MonitorStore`).
//! - `config`: carga de configuración desde .env.
//! - `error`: taxonomía de errores de persistencia.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod sqlite;
pub mod tables;

pub use catalog::SchemaCatalog;
pub use config::init_dotenv;
pub use engine::MonitorStore;
pub use error::PersistenceError;
pub use sqlite::{ConnectionProvider, FileProvider};
