mod common;

use common::{Trace, sum_operation};
use std::any::Any;
use std::sync::Arc;
use weave_api::{JoinPoint, JoinPointKind, MethodMeta, Throwable, Value, WeaveError, WeaveResult};
use weave_core::metadata::StaticTypeSource;
use weave_core::pattern::PatternKind;
use weave_core::{
    AdviceSlot, JoinPointSnapshot, MethodJoinPoint, Operation, Pointcut, PointcutDefinition,
    PointcutKind, SystemConfig, SystemTable, Target,
};

fn add() -> MethodMeta {
    MethodMeta::new("add", ["long", "long"], "long")
}

/// A table whose "calc" system advises `foo.Math.add` with `outer`, `inner`.
fn table(trace: &Trace) -> SystemTable {
    let table = SystemTable::new(SystemConfig::default())
        .with_type_source(Arc::new(StaticTypeSource::new().add_class("foo.Math", None, &[])));
    let system = table.get_system("calc");
    for name in ["outer", "inner"] {
        system
            .registry()
            .register_advice(name, Arc::new(trace.around(name)))
            .unwrap();
    }
    let pointcut = Pointcut::new("math", "add", PointcutKind::Execution, "p").unwrap();
    pointcut
        .add_pointcut_def(PointcutDefinition::new("p", PatternKind::Method, "* foo.Math.add(..)").unwrap())
        .unwrap();
    pointcut
        .add_advices(AdviceSlot::Around, &["outer", "inner"], system.registry())
        .unwrap();
    system.add_pointcut(pointcut).unwrap();
    table
}

#[test]
fn join_point_survives_a_json_round_trip() {
    let trace = Trace::new();
    let table = table(&trace);
    let system = table.get_system("calc");
    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let jp = MethodJoinPoint::new(system, Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();

    let json = jp.snapshot().unwrap().to_json().unwrap();
    let snapshot = JoinPointSnapshot::from_json(&json).unwrap();
    assert_eq!(snapshot.kind, JoinPointKind::MethodExecution);
    assert_eq!(snapshot.system, "calc");
    assert_eq!(snapshot.controller, "default");
    assert_eq!(snapshot.groups.len(), 1);
    assert_eq!(snapshot.groups[0].pointcut.as_deref(), Some("math/add"));
    assert_eq!(snapshot.advice().len(), 2);

    let restored = MethodJoinPoint::restore(&snapshot, &table, sum_operation(trace.clone())).unwrap();
    assert!(Arc::ptr_eq(restored.system(), &table.get_system("calc")));
    assert!(restored.is_resolved());

    let value = restored.proceed(vec![Value::new(1_i64), Value::new(2_i64)]).unwrap();
    assert_eq!(value.downcast_ref::<i64>(), Some(&3));
    assert_eq!(
        trace.entries(),
        ["outer:before", "inner:before", "op", "inner:after", "outer:after"]
    );
}

#[test]
fn invocation_snapshot_records_the_cursor() {
    let trace = Trace::new();
    let table = table(&trace);
    let system = table.get_system("calc");

    let captured = Arc::new(std::sync::Mutex::new(None));
    let capture = {
        let captured = captured.clone();
        move |jp: &mut dyn JoinPoint| -> WeaveResult<Value> {
            let detached = jp.detach().expect("detachable");
            *captured.lock().unwrap() = Some(detached.signature());
            jp.proceed()
        }
    };
    system.registry().register_advice("capture", Arc::new(capture)).unwrap();
    let pointcut = system.pointcut("math/add").unwrap();
    pointcut.add_advice(AdviceSlot::Around, "capture", system.registry()).unwrap();
    pointcut.move_advice(AdviceSlot::Around, "capture", 1).unwrap();

    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let jp = MethodJoinPoint::new(system, Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();
    let mut detached = jp.detach_at(2, vec![Value::new(4_i64), Value::new(4_i64)]).unwrap();
    let snapshot = detached.snapshot().unwrap();
    assert_eq!(snapshot.cursor, 2);
    let names: Vec<_> = snapshot.advice().into_iter().map(|t| t.name).collect();
    assert_eq!(names, ["outer", "capture", "inner"]);
    assert!(snapshot.groups.iter().all(|g| g.pointcut.is_none()));

    // Resuming at position 2 skips `outer` and `capture`.
    let value = detached.proceed().unwrap();
    assert_eq!(value.downcast_ref::<i64>(), Some(&8));
    assert_eq!(trace.entries(), ["inner:before", "op", "inner:after"]);
    assert!(captured.lock().unwrap().is_none());

    jp.proceed(vec![Value::new(1_i64)]).unwrap();
    assert_eq!(
        captured.lock().unwrap().as_deref(),
        Some("foo.Math.add(long,long)")
    );
}

#[test]
fn restoring_with_unknown_controller_fails() {
    let trace = Trace::new();
    let table = table(&trace);
    let system = table.get_system("calc");
    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let jp = MethodJoinPoint::new(system, Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();

    let mut snapshot = jp.snapshot().unwrap();
    snapshot.controller = "gone".into();
    let err = MethodJoinPoint::restore(&snapshot, &table, sum_operation(trace)).err().unwrap();
    assert!(matches!(err, WeaveError::Definition(_)));
}

#[test]
fn restore_needs_the_pointcuts_it_recorded() {
    let trace = Trace::new();
    let source_table = table(&trace);
    let system = source_table.get_system("calc");
    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let jp = MethodJoinPoint::new(system, Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();
    let snapshot = jp.snapshot().unwrap();

    let fresh = SystemTable::default();
    assert!(!fresh.contains("calc"));
    let err = MethodJoinPoint::restore(&snapshot, &fresh, sum_operation(trace)).err().unwrap();
    assert!(matches!(err, WeaveError::Definition(_)));
    assert!(fresh.contains("calc"));
}

#[test]
fn fixed_chain_with_unknown_advice_fails_at_dispatch() {
    let trace = Trace::new();
    let source_table = table(&trace);
    let system = source_table.get_system("calc");
    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let jp = MethodJoinPoint::new(system, Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();
    let snapshot = jp.detach_at(0, Vec::new()).unwrap().snapshot().unwrap();

    // The advice is not registered there, so the cached indices are stale.
    let fresh = SystemTable::default();
    let restored = MethodJoinPoint::restore(&snapshot, &fresh, sum_operation(trace)).unwrap();
    assert!(restored.proceed(Vec::new()).unwrap_err().is_fatal());
}

#[test]
fn restored_cflow_pointcut_still_waits_for_the_flow() {
    let trace = Trace::new();
    let table = SystemTable::default();
    let system = table.get_system("calc");
    system
        .registry()
        .register_advice("audit", Arc::new(trace.around("audit")))
        .unwrap();
    let pointcut = Pointcut::new("math", "add-in-tx", PointcutKind::Execution, "p && inTx").unwrap();
    pointcut
        .add_pointcut_def(PointcutDefinition::new("p", PatternKind::Method, "* foo.Math.add(..)").unwrap())
        .unwrap();
    pointcut
        .add_pointcut_def(PointcutDefinition::cflow("inTx", "* foo.Tx.run(..)").unwrap())
        .unwrap();
    pointcut
        .add_advice(AdviceSlot::Around, "audit", system.registry())
        .unwrap();
    system.add_pointcut(pointcut).unwrap();

    let class = system.metadata().create_class_meta("foo.Math").unwrap();
    let live = MethodJoinPoint::new(system.clone(), Target::of_class(class), add(), sum_operation(trace.clone())).unwrap();
    live.proceed(vec![Value::new(1_i64)]).unwrap();
    assert_eq!(trace.count("audit:before"), 0);

    let json = live.snapshot().unwrap().to_json().unwrap();
    let snapshot = JoinPointSnapshot::from_json(&json).unwrap();
    let restored = MethodJoinPoint::restore(&snapshot, &table, sum_operation(trace.clone())).unwrap();
    restored.proceed(vec![Value::new(1_i64)]).unwrap();
    assert_eq!(trace.count("audit:before"), 0);

    let tx_class = system.metadata().create_class_meta("foo.Tx").unwrap();
    let inner = restored.clone();
    let run: Operation = Arc::new(
        move |_: Option<&Arc<dyn Any + Send + Sync>>, _: &[Value]| -> Result<Value, Throwable> {
            inner
                .proceed(vec![Value::new(2_i64)])
                .map_err(|e| e.thrown().cloned().unwrap_or_else(|| Throwable::new("weave.Fatal", e.to_string())))
        },
    );
    let tx = MethodJoinPoint::new(
        system,
        Target::of_class(tx_class),
        MethodMeta::new("run", Vec::<String>::new(), "long"),
        run,
    )
    .unwrap();
    let value = tx.proceed(Vec::new()).unwrap();
    assert_eq!(value.downcast_ref::<i64>(), Some(&2));
    assert_eq!(trace.count("audit:before"), 1);
}
