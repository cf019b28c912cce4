//! Historiales append-only (estados y recursos) y esquema on-demand.


use test_support::*;

#[test]
fn esquema_on_demand_para_run_y_task() {
    let db = test_db();
    assert!(!db.table_names().contains(&"R1".to_string()));

    let mut store = db.store();
    store.process(&task_status_event("R1", 5, "t0", 1));

    let names = db.table_names();
    assert!(names.contains(&"R1".to_string()), "índice del run: {names:?}");
    assert!(names.contains(&"R15".to_string()), "historial de estados: {names:?}");
    // sin muestras psutil no hay tabla de recursos
    assert!(!names.contains(&"R15_resources".to_string()));
}

#[test]
fn n_eventos_de_estado_dejan_n_filas() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    for (i, ts) in ["t1", "t2", "t3", "t4"].iter().enumerate() {
        store.process(&task_status_event("run-a", 5, ts, i as i64));
    }

    assert_eq!(db.count_rows("run-a5"), 4);
    assert_eq!(store.dropped_events(), 0);
    // la primera fila sigue intacta (append-only, sin mutaciones)
    let status: i64 = db.conn()
                        .query_row("SELECT task_status FROM \"run-a5\" WHERE timestamp = 't1'",
                                   [],
                                   |row| row.get(0))
                        .expect("primera fila");
    assert_eq!(status, 0);
}

#[test]
fn fail_history_se_guarda_como_texto_unido() {
    let db = test_db();
    let mut store = db.store();

    let mut rec = task_status_event("run-a", 5, "t1", 3);
    rec.task_fail_count = Some(2);
    rec.task_fail_history = Some(vec!["MemoryError".to_string(), "TimeoutError".to_string()]);
    store.process(&rec);

    assert_eq!(db.text_cell("run-a5", "task_fail_history", "timestamp", "t1").as_deref(),
               Some("MemoryError, TimeoutError"));
}

#[test]
fn muestras_de_recursos_se_acumulan_y_la_tabla_nace_con_la_primera() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    assert!(!db.table_names().contains(&"run-a7_resources".to_string()));

    store.process(&resource_sample("run-a", 7, "t1", 10.0));
    assert!(db.table_names().contains(&"run-a7_resources".to_string()));

    store.process(&resource_sample("run-a", 7, "t2", 20.0));
    store.process(&resource_sample("run-a", 7, "t3", 30.0));

    assert_eq!(db.count_rows("run-a7_resources"), 3);
    assert_eq!(store.dropped_events(), 0);

    let cpu: f64 = db.conn()
                     .query_row("SELECT psutil_process_cpu_percent FROM \"run-a7_resources\" \
                                 WHERE timestamp = 't2'",
                                [],
                                |row| row.get(0))
                     .expect("muestra t2");
    assert_eq!(cpu, 20.0);
}

#[test]
fn una_muestra_de_recursos_no_hace_first_sight_de_la_task() {
    let db = test_db();
    let mut store = db.store();

    // la regla de recursos retorna antes del first-sight del índice
    store.process(&resource_sample("run-a", 7, "t1", 10.0));

    assert_eq!(db.count_rows("run-a"), 0);
    assert_eq!(db.count_rows("run-a7_resources"), 1);
}

#[test]
fn las_fk_declaradas_no_bloquean_llegadas_fuera_de_orden() {
    let db = test_db();
    let mut store = db.store();

    // muestra de recursos antes de que exista la fila de la task en el
    // índice, y antes de que el run tenga fila en workflows: las FK del DDL
    // son documentales y no deben rechazar estas llegadas
    store.process(&workflow_start("run-a", "t0"));
    store.process(&resource_sample("run-a", 7, "t1", 10.0));
    assert_eq!(store.dropped_events(), 0);
    assert_eq!(db.count_rows("run-a7_resources"), 1);

    // status para un run cuyo first-sight en workflows fue rechazado
    // (evento de task sin las columnas NOT NULL del resumen)
    store.process(&task_status_event("run-b", 3, "t2", 1));
    assert_eq!(store.dropped_events(), 0);
    assert_eq!(db.count_rows("run-b3"), 1);
}

#[test]
fn timestamps_duplicados_en_el_historial_se_descartan_como_evento() {
    let db = test_db();
    let mut store = db.store();

    store.process(&task_status_event("run-a", 5, "t1", 1));
    // mismo timestamp: viola la PK del historial; el evento se pierde, el
    // motor continúa
    store.process(&task_status_event("run-a", 5, "t1", 2));

    assert_eq!(db.count_rows("run-a5"), 1);
    assert_eq!(store.dropped_events(), 1);

    store.process(&task_status_event("run-a", 5, "t2", 2));
    assert_eq!(db.count_rows("run-a5"), 2);
}
