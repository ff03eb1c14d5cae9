//! Proper tail calls: bounded resolution, hook ordering and backtraces.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;

use asteria::value::ops::Operator;
use asteria::{
    AirNode, EngineOptions, FrameKind, FunctionValue, Hooks, PtcMode, Script, SourceLocation,
    Value,
};

#[test]
fn tail_call_chain_resolves_with_bounded_call_depth() {
    // func countdown(n) { return (n == 0) ? "done" : countdown(n - 1); }
    // return countdown(50000);
    //
    // The chain is far longer than the recursion limit; only the
    // trampoline keeps this from failing.
    let recurse = vec![
        push_local(2, 1, "countdown"),
        push_local(2, 0, "n"),
        push_int(1),
        apply(2, Operator::Sub),
        call_ptc(2, 1, PtcMode::ByVal),
    ];
    let body = {
        let mut code = stmt(vec![
            push_local(2, 0, "n"),
            push_int(0),
            apply(2, Operator::CmpEq),
            AirNode::BranchExpression {
                sloc: sloc(2),
                assign: false,
                coalescence: false,
                code_true: vec![push_str("done")],
                code_false: recurse,
            },
        ]);
        code.push(ret_val(2));
        code
    };
    let code = flatten(vec![
        stmt_func(1, "countdown", &["n"], body),
        stmt_return(
            3,
            vec![push_local(3, 0, "countdown"), push_int(50_000), call(3, 1)],
        ),
    ]);

    let script = Script::with_options(EngineOptions::default().with_recursion_limit(64));
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("done"));
}

#[derive(Default)]
struct TraceHooks {
    events: RefCell<Vec<String>>,
}

impl Hooks for TraceHooks {
    fn on_function_call(&self, sloc: &SourceLocation, _target: &FunctionValue) {
        self.events.borrow_mut().push(format!("call {}", sloc.line));
    }

    fn on_function_except(
        &self,
        sloc: &SourceLocation,
        _target: &FunctionValue,
        _error: &asteria::RuntimeError,
    ) {
        self.events
            .borrow_mut()
            .push(format!("except {}", sloc.line));
    }
}

/// `one -> two -> three -> throw "boom"`, with every inner call either in
/// tail position (`ptc` true) or not.
fn throwing_chain(ptc: bool) -> Vec<AirNode> {
    let mode = |m: PtcMode| if ptc { m } else { PtcMode::None };

    let throw_body = {
        let mut code = stmt(vec![push_str("boom")]);
        code.push(throw_stmt(46));
        code
    };
    let three_body = {
        let mut code = stmt(vec![
            push_local(49, 1, "thrower"),
            call_ptc(49, 0, mode(PtcMode::ByVal)),
        ]);
        code.push(ret_val(49));
        code
    };
    let two_body = {
        let mut code = stmt(vec![
            push_local(53, 1, "three"),
            call_ptc(53, 0, mode(PtcMode::ByRef)),
        ]);
        code.push(ret_ref(53));
        code
    };
    let one_body = {
        let mut code = stmt(vec![
            push_local(57, 1, "two"),
            call_ptc(57, 0, mode(PtcMode::ByVal)),
        ]);
        code.push(ret_val(57));
        code
    };
    flatten(vec![
        stmt_func(45, "thrower", &[], throw_body),
        stmt_func(48, "three", &[], three_body),
        stmt_func(52, "two", &[], two_body),
        stmt_func(56, "one", &[], one_body),
        stmt(vec![push_local(60, 0, "one"), call(60, 0)]),
    ])
}

fn call_frame_lines(err: &asteria::RuntimeError) -> Vec<u32> {
    err.frames()
        .iter()
        .filter(|frame| frame.kind == FrameKind::Call)
        .map(|frame| frame.sloc.line)
        .collect()
}

#[test]
fn hook_ordering_is_identical_for_plain_and_tail_chains() {
    let expected: Vec<String> = [
        "call 60", "call 57", "call 53", "call 49", "except 49", "except 53", "except 57",
        "except 60",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for ptc in [false, true] {
        let script = Script::new();
        let hooks = Rc::new(TraceHooks::default());
        script.global().set_hooks(Some(hooks.clone()));
        let err = script
            .execute("scenario", &throwing_chain(ptc))
            .unwrap_err();
        assert_eq!(*hooks.events.borrow(), expected, "ptc = {ptc}");
        // One `call` frame per call site, innermost first, in both shapes.
        assert_eq!(call_frame_lines(&err), vec![49, 53, 57, 60], "ptc = {ptc}");
    }
}

#[test]
fn tail_chain_keeps_only_the_faulting_function_frame() {
    let plain = Script::new()
        .execute("scenario", &throwing_chain(false))
        .unwrap_err();
    let tail = Script::new()
        .execute("scenario", &throwing_chain(true))
        .unwrap_err();

    let function_frames = |err: &asteria::RuntimeError| {
        err.frames()
            .iter()
            .filter(|frame| frame.kind == FrameKind::Function)
            .count()
    };
    // The plain chain unwinds through four live activations; the tail
    // chain has already left all but the faulting one.
    assert_eq!(function_frames(&plain), 5);
    assert_eq!(function_frames(&tail), 2);
    assert_eq!(plain.value(), &Value::string("boom"));
    assert_eq!(tail.value(), &Value::string("boom"));
}

#[test]
fn deferred_code_runs_after_the_tail_call_completes() {
    // func inner() { return "x"; }
    // func outer() { defer -> log += "d"; return inner(); }
    // outer(); return log;
    let inner_body = stmt_return(2, vec![push_str("x")]);
    let outer_body = flatten(vec![
        vec![
            clear(),
            AirNode::DeferExpression {
                sloc: sloc(3),
                // `log` lives in the file scope; it is captured as a bound
                // reference when `outer` is instantiated.
                code_body: vec![
                    push_local(3, 1, "log"),
                    push_str("d"),
                    apply_assign(3, Operator::Add),
                ],
            },
        ],
        {
            let mut code = stmt(vec![
                push_local(4, 1, "inner"),
                call_ptc(4, 0, PtcMode::ByVal),
            ]);
            code.push(ret_val(4));
            code
        },
    ]);
    let code = flatten(vec![
        stmt_var(1, "log", vec![push_str("")]),
        stmt_func(2, "inner", &[], inner_body),
        stmt_func(3, "outer", &[], outer_body),
        stmt(vec![push_local(5, 0, "outer"), call(5, 0)]),
        stmt_return(6, vec![push_local(6, 0, "log")]),
    ]);

    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("d"));
}
