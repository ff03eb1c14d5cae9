//! Host hook dispatch.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;

use asteria::{FunctionValue, Hooks, Reference, Script, SourceLocation, Value};

#[derive(Default)]
struct RecordingHooks {
    declares: RefCell<Vec<String>>,
    steps: RefCell<usize>,
    returns: RefCell<Vec<Value>>,
}

impl Hooks for RecordingHooks {
    fn on_variable_declare(&self, _sloc: &SourceLocation, name: &str) {
        self.declares.borrow_mut().push(name.to_string());
    }

    fn on_single_step_trap(&self, _sloc: &SourceLocation) {
        *self.steps.borrow_mut() += 1;
    }

    fn on_function_return(
        &self,
        _sloc: &SourceLocation,
        _target: &FunctionValue,
        result: &Reference,
    ) {
        let value = result.dereference_readonly().unwrap_or(Value::Null);
        self.returns.borrow_mut().push(value);
    }
}

#[test]
fn hooks_observe_declarations_calls_and_returns() {
    // var x = 1; func id(a) { return a; } id(x);
    let id_body = stmt_return(2, vec![push_local(2, 0, "a")]);
    let code = flatten(vec![
        stmt_var(1, "x", vec![push_int(1)]),
        stmt_func(2, "id", &["a"], id_body),
        stmt(vec![push_local(3, 0, "id"), push_local(3, 0, "x"), call(3, 1)]),
    ]);

    let script = Script::new();
    let hooks = Rc::new(RecordingHooks::default());
    script.global().set_hooks(Some(hooks.clone()));
    script.execute("scenario", &code).unwrap();

    assert_eq!(*hooks.declares.borrow(), vec!["x".to_string(), "id".to_string()]);
    // One trap per function call record.
    assert_eq!(*hooks.steps.borrow(), 1);
    assert_eq!(*hooks.returns.borrow(), vec![Value::Integer(1)]);
}

#[test]
fn hooks_can_be_removed() {
    let script = Script::new();
    let hooks = Rc::new(RecordingHooks::default());
    script.global().set_hooks(Some(hooks.clone()));
    script.global().set_hooks(None);

    let code = flatten(vec![stmt_var(1, "x", vec![push_int(1)])]);
    script.execute("scenario", &code).unwrap();
    assert!(hooks.declares.borrow().is_empty());
}
