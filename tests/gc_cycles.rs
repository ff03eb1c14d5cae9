//! Cycle reclamation through the generational collector, driven from
//! script code.

mod common;

use common::*;

use asteria::value::ops::Operator;
use asteria::{AirNode, EngineOptions, Script, Value};

/// `var o = {}; o.f = func() { return o; };` — a closure capturing the
/// variable that holds it.
fn cyclic_closure_code() -> Vec<AirNode> {
    let closure_body = stmt_return(3, vec![push_local(3, 1, "o")]);
    flatten(vec![
        stmt_var(1, "o", vec![push_value(Value::Object(Default::default()))]),
        stmt(vec![
            push_local(2, 0, "o"),
            push_str("f"),
            apply(2, Operator::Index),
            AirNode::DefineFunction {
                sloc: sloc(2),
                name: "anon".to_string(),
                params: Vec::new(),
                code_body: closure_body,
            },
            apply(2, Operator::Assign),
        ]),
    ])
}

#[test]
fn cyclic_closure_is_reclaimed_after_the_scope_dies() {
    let script = Script::new();
    script.execute("scenario", &cyclic_closure_code()).unwrap();

    // The script scope is gone; only the cycle keeps the variable alive.
    assert_eq!(script.global().gc_total_tracked(), 1);
    script.global().collect_garbage(0);
    assert_eq!(script.global().gc_total_tracked(), 0);
}

#[test]
fn cyclic_closure_works_while_the_scope_is_live() {
    // ... return typeof o.f();
    let mut code = cyclic_closure_code();
    code.extend(stmt_return(
        4,
        vec![
            push_local(4, 0, "o"),
            push_str("f"),
            apply(4, Operator::Index),
            call(4, 0),
            apply(4, Operator::Typeof),
        ],
    ));
    let script = Script::new();
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("object"));
}

#[test]
fn dead_variables_are_collected_opportunistically() {
    // for (var i = 0; i < 64; i += 1) { var t = [i]; }
    // Tight thresholds keep the tracked population bounded while the loop
    // allocates.
    let init = stmt_var(1, "i", vec![push_int(0)]);
    let cond = stmt(vec![push_local(1, 0, "i"), push_int(64), apply(1, Operator::CmpLt)]);
    let step = stmt(vec![push_local(1, 0, "i"), push_int(1), apply_assign(1, Operator::Add)]);
    let body = {
        let mut code = vec![
            clear(),
            AirNode::DeclareVariable {
                sloc: sloc(2),
                name: "t".to_string(),
            },
            push_local(2, 1, "i"),
            AirNode::PushUnnamedArray {
                sloc: sloc(2),
                nelems: 1,
            },
            AirNode::InitializeVariable {
                sloc: sloc(2),
                immutable: false,
            },
        ];
        code.push(clear());
        code
    };
    let code = flatten(vec![vec![
        clear(),
        AirNode::ForStatement {
            code_init: init,
            code_cond: cond,
            code_step: step,
            code_body: body,
        },
    ]]);

    let script = Script::with_options(
        EngineOptions::default().with_gc_thresholds([8, 16, 32]),
    );
    script.execute("scenario", &code).unwrap();
    assert!(script.global().gc_total_tracked() < 65);

    script.global().collect_all_garbage();
    assert_eq!(script.global().gc_total_tracked(), 0);
}

#[test]
fn survivors_are_promoted_out_of_the_nursery() {
    let script = Script::new();
    script.execute("scenario", &cyclic_closure_code()).unwrap();
    assert_eq!(script.global().gc_tracked_count(0), 1);

    // Keep the cycle alive by reaching it from a global binding first.
    let code = flatten(vec![
        cyclic_closure_code(),
        stmt_return(5, vec![push_local(5, 0, "o")]),
    ]);
    let script = Script::new();
    let kept = script.execute("scenario", &code).unwrap();
    script.global().collect_garbage(0);
    // The value snapshot holds the closure, so its captured variable
    // survived and moved into the young generation.
    assert_eq!(script.global().gc_tracked_count(0), 0);
    assert_eq!(script.global().gc_tracked_count(1), 1);
    drop(kept);
    script.global().collect_garbage(1);
    assert_eq!(script.global().gc_total_tracked(), 0);
}
