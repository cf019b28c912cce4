//! Bootstrap de la tabla workflows y first-sight idempotente de runs.


use test_support::*;

#[test]
fn primer_evento_crea_workflows_e_inserta_el_run() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));

    assert!(db.table_names().contains(&"workflows".to_string()));
    assert_eq!(db.count_rows("workflows"), 1);
    // el centinela del productor se guarda literal en el first-sight
    assert_eq!(db.text_cell("workflows", "time_completed", "task_run_id", "run-a").as_deref(),
               Some("None"));
    assert_eq!(store.dropped_events(), 0);
}

#[test]
fn doble_arranque_del_mismo_run_deja_una_sola_fila() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&workflow_start("run-a", "t1"));

    assert_eq!(db.count_rows("workflows"), 1);
    // el segundo arranque no es un error: se procesó y no se descartó
    assert_eq!(store.processed_events(), 2);
    assert_eq!(store.dropped_events(), 0);
}

#[test]
fn runs_distintos_conviven_en_workflows() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&workflow_start("run-b", "t0"));

    assert_eq!(db.count_rows("workflows"), 2);
    // cada run tiene además su tabla índice propia
    let names = db.table_names();
    assert!(names.contains(&"run-a".to_string()));
    assert!(names.contains(&"run-b".to_string()));
}

#[test]
fn totales_acumulados_se_actualizan_sobre_la_misma_fila() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&counts_update("run-a", "t1", 3, 1));
    store.process(&counts_update("run-a", "t2", 5, 2));

    assert_eq!(db.count_rows("workflows"), 1);
    let conn = db.conn();
    let (completed, failed): (i64, i64) =
        conn.query_row("SELECT tasks_completed_count, tasks_failed_count FROM workflows \
                        WHERE task_run_id = ?1",
                       ["run-a"],
                       |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("fila del run");
    assert_eq!((completed, failed), (5, 2));
}

#[test]
fn resumen_puro_de_workflow_no_crea_tablas_de_task() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));

    let names = db.table_names();
    assert!(names.iter().all(|n| !n.ends_with("_resources")));
    assert_eq!(db.count_rows("run-a"), 0);
}
