//! Catálogo de esquema y reconciliación contra el store.
//!
//! Responsabilidad:
//! - Saber, antes de procesar un evento, qué tablas requeridas ya existen.
//! - Crear las que falten (DDL idempotente) y registrar la creación en el
//!   catálogo, que es la única invalidación necesaria: el catálogo se
//!   cachea entre eventos y sólo cambia cuando este motor agrega tablas.
//!
//! La reflexión contra el store puede fallar de forma transitoria
//! (contención de conexión, lock store-side); el motor la reintenta de
//! forma acotada y, si agota los intentos, descarta el evento sin propagar.

use log::debug;
use rusqlite::Connection;
use std::collections::HashSet;

use crate::error::PersistenceError;
use crate::tables::TableSpec;

/// Intentos de descubrimiento de esquema antes de descartar un evento.
pub const REFLECT_ATTEMPTS: u32 = 3;

/// Vista en memoria de las tablas existentes en el store.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: HashSet<String>,
}

impl SchemaCatalog {
    /// Descubre el conjunto de tablas actual consultando `sqlite_master`.
    pub fn reflect(conn: &Connection) -> Result<Self, PersistenceError> {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let tables = stmt.query_map([], |row| row.get::<_, String>(0))?
                         .collect::<Result<HashSet<_>, _>>()?;
        debug!("reflect: {} tablas descubiertas", tables.len());
        Ok(Self { tables })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains(name)
    }

    pub fn note_created(&mut self, name: String) {
        self.tables.insert(name);
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// Crea la tabla si el catálogo no la conoce y registra la creación.
///
/// Devuelve `true` si emitió DDL (tabla recién vista). El `IF NOT EXISTS`
/// del DDL absorbe la carrera de dos procesos creando la misma tabla.
pub fn ensure_table(conn: &Connection,
                    catalog: &mut SchemaCatalog,
                    spec: &TableSpec)
                    -> Result<bool, PersistenceError> {
    if catalog.contains(&spec.name) {
        return Ok(false);
    }
    conn.execute_batch(&spec.create_sql())?;
    catalog.note_created(spec.name.clone());
    debug!("tabla {} creada", spec.name);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn reflect_ve_lo_creado_y_ensure_es_idempotente() {
        let conn = Connection::open_in_memory().expect("db en memoria");
        let mut catalog = SchemaCatalog::reflect(&conn).expect("reflect");
        assert_eq!(catalog.table_count(), 0);

        assert!(ensure_table(&conn, &mut catalog, &tables::workflows_table()).expect("create"));
        assert!(catalog.contains("workflows"));
        // segunda pasada: el catálogo ya la conoce, no se emite DDL
        assert!(!ensure_table(&conn, &mut catalog, &tables::workflows_table()).expect("noop"));

        let fresh = SchemaCatalog::reflect(&conn).expect("reflect");
        assert!(fresh.contains("workflows"));
    }

    #[test]
    fn ensure_con_catalogo_frio_absorbe_tabla_preexistente() {
        let conn = Connection::open_in_memory().expect("db en memoria");
        let spec = tables::run_index_table("r1");
        conn.execute_batch(&spec.create_sql()).expect("pre-crear");

        // catálogo vacío (otro escritor creó la tabla): IF NOT EXISTS absorbe
        let mut catalog = SchemaCatalog::default();
        assert!(ensure_table(&conn, &mut catalog, &spec).expect("idempotente"));
        assert!(catalog.contains("r1"));
    }
}
