//! Convenience driver for hosts: owns a global context and runs AIR
//! modules as `[file scope]` functions.

use crate::air::AirNode;
use crate::reference::Reference;
use crate::runtime::context::Scope;
use crate::runtime::error::RuntimeError;
use crate::runtime::function::Callable;
use crate::runtime::global::{EngineOptions, GlobalContext};
use crate::runtime::optimizer::AirOptimizer;
use crate::runtime::ptc::check_function_result;
use crate::source::SourceLocation;
use crate::value::Value;

pub struct Script {
    global: GlobalContext,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    pub fn new() -> Self {
        Self {
            global: GlobalContext::new(),
        }
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            global: GlobalContext::with_options(options),
        }
    }

    pub fn global(&self) -> &GlobalContext {
        &self.global
    }

    /// Instantiate the module body as a variadic `[file scope]` function
    /// and run it with `this` bound to `null`. The result is forced
    /// through the tail-call barrier and read out as a plain value (`null`
    /// for void).
    pub fn execute(&self, file: &str, code: &[AirNode]) -> Result<Value, RuntimeError> {
        self.execute_with_args(file, code, Vec::new())
    }

    pub fn execute_with_args(
        &self,
        file: &str,
        code: &[AirNode],
        args: Vec<Reference>,
    ) -> Result<Value, RuntimeError> {
        let optimizer = AirOptimizer::rebind(
            Some(&self.global as &dyn Scope),
            vec!["...".to_string()],
            code,
        );
        let target = optimizer.create_function(SourceLocation::new(file, 0, 0), "[file scope]");
        let mut result =
            target.invoke(Reference::temporary(Value::Null), &self.global, args)?;
        check_function_result(&mut result, &self.global)?;
        if result.is_void() {
            return Ok(Value::Null);
        }
        result.dereference_readonly()
    }
}
