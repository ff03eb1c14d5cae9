//! Optional host instrumentation.
//!
//! The global context holds at most one hook object; emitters skip the
//! call when none is installed. Hook methods are infallible by signature,
//! so a hook can never throw across the interpreter. A host that wants to
//! interrupt execution throws from a native callable instead.

use crate::reference::Reference;
use crate::runtime::error::RuntimeError;
use crate::runtime::function::FunctionValue;
use crate::source::SourceLocation;

pub trait Hooks {
    /// Called when a variable or function is declared, before its
    /// initializer is evaluated.
    fn on_variable_declare(&self, _sloc: &SourceLocation, _name: &str) {}

    /// Called before every function call, including each hop of a resolved
    /// tail-call chain.
    fn on_function_call(&self, _sloc: &SourceLocation, _target: &FunctionValue) {}

    /// Called after a function call completes by returning normally.
    fn on_function_return(
        &self,
        _sloc: &SourceLocation,
        _target: &FunctionValue,
        _result: &Reference,
    ) {
    }

    /// Called after a function call completes by raising an error. The
    /// error propagates after the hook returns.
    fn on_function_except(
        &self,
        _sloc: &SourceLocation,
        _target: &FunctionValue,
        _error: &RuntimeError,
    ) {
    }

    /// Called on every single-step trap record.
    fn on_single_step_trap(&self, _sloc: &SourceLocation) {}
}
