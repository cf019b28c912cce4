//! Ciclo de vida de tasks y cierres in-place de run/task.


use test_support::*;

#[test]
fn first_sight_de_task_inserta_una_sola_fila_en_el_indice() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&task_status_event("run-a", 5, "t1", 1));
    store.process(&task_status_event("run-a", 5, "t2", 2));

    assert_eq!(db.count_rows("run-a"), 1);
    assert_eq!(db.text_cell("run-a", "task_executor", "task_id", "5").as_deref(), Some("threads"));
}

#[test]
fn cierre_de_task_actualiza_in_place() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&task_status_event("run-a", 5, "t1", 1));
    assert_eq!(db.text_cell("run-a", "task_time_completed", "task_id", "5"), None);

    store.process(&task_done("run-a", 5, "t9"));

    assert_eq!(db.count_rows("run-a"), 1);
    assert_eq!(db.text_cell("run-a", "task_time_completed", "task_id", "5").as_deref(), Some("t9"));
    assert_eq!(store.dropped_events(), 0);
}

#[test]
fn cierre_de_workflow_actualiza_in_place() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    store.process(&workflow_done("run-a", "t9"));

    assert_eq!(db.count_rows("workflows"), 1);
    assert_eq!(db.text_cell("workflows", "time_completed", "task_run_id", "run-a").as_deref(),
               Some("t9"));
}

#[test]
fn centinela_none_no_cuenta_como_cierre() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    // un segundo resumen con el centinela no debe pisar time_completed
    let mut rec = counts_update("run-a", "t1", 1, 0);
    rec.time_completed = Some("None".to_string());
    store.process(&rec);

    assert_eq!(db.text_cell("workflows", "time_completed", "task_run_id", "run-a").as_deref(),
               Some("None"));
    assert_eq!(store.dropped_events(), 0);
}

#[test]
fn cierre_para_run_nunca_visto_se_descarta_sin_propagar() {
    let db = test_db();
    let mut store = db.store();

    // no existe la tabla workflows todavía: fatal para este evento, no para el motor
    store.process(&workflow_done("run-x", "t0"));
    assert_eq!(store.dropped_events(), 1);

    // el motor sigue procesando con normalidad
    store.process(&workflow_start("run-a", "t1"));
    assert_eq!(db.count_rows("workflows"), 1);
    assert_eq!(store.dropped_events(), 1);
}

#[test]
fn cierre_de_task_sin_task_id_se_descarta() {
    let db = test_db();
    let mut store = db.store();

    store.process(&workflow_start("run-a", "t0"));
    let mut rec = flowmon_events::TelemetryRecord::new("run-a", "t1");
    rec.task_time_completed = Some("t1".to_string());
    store.process(&rec);

    assert_eq!(store.dropped_events(), 1);
}
