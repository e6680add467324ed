use std::sync::Arc;

use herd::interpreter::{BinaryOp, Expr, LoopStatement, Sequence, Statement, Value};
use herd::runtime::agent::Species;
use herd::runtime::error::ExecError;
use herd::runtime::flow::FlowStatus;
use herd::runtime::scope::Scope;
use herd::runtime::world::{Simulation, World};
use herd::runtime::{Runtime, RuntimeConfig};
use proptest::prelude::*;

fn scope() -> Scope {
    let world = Arc::new(World::new(Species::new("world")));
    let runtime = Runtime::new(RuntimeConfig::default(), world.clone()).unwrap();
    runtime.scope_for(world.root(), "loops")
}

fn let_(name: &str, value: Expr) -> Statement {
    Statement::Let {
        name: name.into(),
        value: Some(value),
    }
}

fn set(name: &str, value: Expr) -> Statement {
    Statement::Set {
        target: None,
        name: name.into(),
        value,
    }
}

fn add(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, left, right)
}

/// `s <- s + var` for every iteration of `range`
fn summing(var: &str, from: Expr, to: Expr, step: Option<Expr>) -> Sequence {
    Sequence::new(vec![
        let_("s", Expr::Int(0)),
        Statement::Loop(LoopStatement::range(
            var,
            from,
            to,
            step,
            Sequence::new(vec![set("s", add(Expr::var("s"), Expr::var(var)))]),
        )),
    ])
}

fn counting(from: i64, to: i64, step: Option<i64>) -> Sequence {
    Sequence::new(vec![
        let_("n", Expr::Int(0)),
        Statement::Loop(LoopStatement::range(
            "i",
            Expr::Int(from),
            Expr::Int(to),
            step.map(Expr::Int),
            Sequence::new(vec![set("n", add(Expr::var("n"), Expr::Int(1)))]),
        )),
    ])
}

#[test]
fn times_loop_doubles() {
    let mut scope = scope();
    let program = Sequence::new(vec![
        let_("s", Expr::Int(1)),
        Statement::Loop(LoopStatement::times(
            Expr::Int(3),
            Sequence::new(vec![set("s", add(Expr::var("s"), Expr::var("s")))]),
        )),
    ]);
    program.execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("s"), Some(Value::Int(8)));
}

#[test]
fn range_with_step_sums_bounds() {
    let mut scope = scope();
    summing("i", Expr::Int(10), Expr::Int(30), Some(Expr::Int(10)))
        .execute(&mut scope)
        .unwrap();
    assert_eq!(scope.get_var("s"), Some(Value::Int(60)));
}

#[test]
fn while_loop_checks_before_each_iteration() {
    let mut scope = scope();
    let program = Sequence::new(vec![
        let_("s", Expr::Int(1)),
        Statement::Loop(LoopStatement::repeat_while(
            Expr::binary(BinaryOp::Lt, Expr::var("s"), Expr::Int(5)),
            Sequence::new(vec![set("s", add(Expr::var("s"), Expr::var("s")))]),
        )),
    ]);
    program.execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("s"), Some(Value::Int(8)));
}

#[test]
fn over_binds_each_element() {
    let mut scope = scope();
    scope.declare("l", Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(4)]));
    let program = Sequence::new(vec![
        let_("s", Expr::Int(0)),
        Statement::Loop(LoopStatement::over(
            "x",
            Expr::var("l"),
            Sequence::new(vec![set("s", add(Expr::var("s"), Expr::var("x")))]),
        )),
    ]);
    program.execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("s"), Some(Value::Int(9)));
}

#[test]
fn descending_bounds_without_step_count_down() {
    let mut scope = scope();
    counting(5, 1, None).execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("n"), Some(Value::Int(5)));
}

#[test]
fn step_pointing_away_runs_zero_times() {
    let mut scope = scope();
    counting(5, 1, Some(1)).execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("n"), Some(Value::Int(0)));
}

#[test]
fn equal_bounds_run_once() {
    let mut scope = scope();
    counting(3, 3, Some(-2)).execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("n"), Some(Value::Int(1)));
}

#[test]
fn zero_step_is_an_error() {
    let mut scope = scope();
    let err = counting(0, 3, Some(0)).execute(&mut scope).unwrap_err();
    assert!(matches!(err, ExecError::ZeroStep));
}

#[test]
fn float_bounds_iterate_as_floats() {
    let mut scope = scope();
    summing("x", Expr::Float(0.5), Expr::Float(2.0), Some(Expr::Float(0.5)))
        .execute(&mut scope)
        .unwrap();
    assert_eq!(scope.get_var("s").and_then(|s| s.as_float()), Some(5.0));
}

#[test]
fn break_stops_loop_and_is_cleared() {
    let mut scope = scope();
    let program = Sequence::new(vec![
        let_("n", Expr::Int(0)),
        Statement::Loop(LoopStatement::times(
            Expr::Int(10),
            Sequence::new(vec![
                set("n", add(Expr::var("n"), Expr::Int(1))),
                Statement::If {
                    condition: Expr::binary(BinaryOp::Eq, Expr::var("n"), Expr::Int(3)),
                    then: Sequence::new(vec![Statement::Break]),
                    otherwise: None,
                },
            ]),
        )),
        set("n", add(Expr::var("n"), Expr::Int(100))),
    ]);
    program.execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("n"), Some(Value::Int(103)));
    assert_eq!(scope.flow_status(), FlowStatus::Normal);
}

#[test]
fn continue_skips_rest_of_iteration() {
    let mut scope = scope();
    let program = Sequence::new(vec![
        let_("odd", Expr::Int(0)),
        Statement::Loop(LoopStatement::range(
            "i",
            Expr::Int(1),
            Expr::Int(6),
            None,
            Sequence::new(vec![
                Statement::If {
                    condition: Expr::binary(
                        BinaryOp::Eq,
                        Expr::binary(BinaryOp::Mod, Expr::var("i"), Expr::Int(2)),
                        Expr::Int(0),
                    ),
                    then: Sequence::new(vec![Statement::Continue]),
                    otherwise: None,
                },
                set("odd", add(Expr::var("odd"), Expr::Int(1))),
            ]),
        )),
    ]);
    program.execute(&mut scope).unwrap();
    assert_eq!(scope.get_var("odd"), Some(Value::Int(3)));
}

#[test]
fn frames_are_balanced_after_nested_loops() {
    let mut scope = scope();
    let inner = Statement::Loop(LoopStatement::times(
        Expr::Int(3),
        Sequence::new(vec![let_("t", Expr::Int(0))]),
    ));
    let program = Sequence::new(vec![Statement::Loop(LoopStatement::times(
        Expr::Int(4),
        Sequence::new(vec![inner]),
    ))]);
    let depth = scope.depth();
    program.execute(&mut scope).unwrap();
    let stats = scope.stats();
    assert_eq!(scope.depth(), depth);
    assert_eq!(stats.pushes, stats.pops);
    assert!(stats.pushes >= 16);
    assert!(!scope.has_var("t"));
}

#[test]
fn frames_are_balanced_when_body_fails() {
    let mut scope = scope();
    let program = Sequence::new(vec![Statement::Loop(LoopStatement::times(
        Expr::Int(2),
        Sequence::new(vec![Statement::Raise(Expr::str("boom"))]),
    ))]);
    let depth = scope.depth();
    assert!(program.execute(&mut scope).is_err());
    assert_eq!(scope.depth(), depth);
    assert_eq!(scope.stats().pushes, scope.stats().pops);
}

#[test]
fn cancel_stops_endless_while_loop() {
    let mut scope = scope();
    let root = scope.agent().cloned().unwrap();
    root.set_attribute("ticks", Value::Int(0));
    let ticks = |agent: &herd::runtime::agent::AgentRef| {
        agent.attribute("ticks").and_then(|value| value.as_int()).unwrap_or(0)
    };

    let engine = scope.engine().clone();
    let watched = root.clone();
    let canceller = std::thread::spawn(move || {
        while ticks(&watched) < 3 {
            std::thread::yield_now();
        }
        engine.cancel();
    });
    let endless = LoopStatement::repeat_while(
        Expr::Bool(true),
        Sequence::new(vec![set("ticks", add(Expr::var("ticks"), Expr::Int(1)))]),
    );
    endless.execute(&mut scope).unwrap();
    canceller.join().unwrap();

    assert!(ticks(&root) >= 3);
    assert_eq!(scope.depth(), 1);
    assert_eq!(scope.flow_status(), FlowStatus::Normal);
    scope.engine().reset_cancel();
}

proptest! {
    #[test]
    fn range_iteration_count(from in -20i64..20, to in -20i64..20, step in prop::option::of(-5i64..=5)) {
        prop_assume!(step != Some(0));
        let mut scope = scope();
        counting(from, to, step).execute(&mut scope).unwrap();
        let expected = match step {
            _ if from == to => 1,
            None => (to - from).abs() + 1,
            Some(step) if (to > from) != (step > 0) => 0,
            Some(step) => (to - from).abs() / step.abs() + 1,
        };
        prop_assert_eq!(scope.get_var("n"), Some(Value::Int(expected)));
    }
}
