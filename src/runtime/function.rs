//! Callables: instantiated script functions, native host functions and the
//! variadic arguer behind `__varg`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::air::{AirNode, AirStatus};
use crate::avmc::AvmcQueue;
use crate::gc::VarVisitor;
use crate::reference::Reference;
use crate::runtime::context::ExecutiveContext;
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::global::GlobalContext;
use crate::runtime::stack::RefStack;
use crate::source::SourceLocation;
use crate::value::Value;

/// Anything invocable from script code. Host bindings implement this
/// directly; script functions are instantiated from AIR.
pub trait Callable {
    fn name(&self) -> &str;

    fn source_location(&self) -> SourceLocation {
        SourceLocation::default()
    }

    /// Invoke with a `this` reference and positional arguments in source
    /// order. The result reference may be a pending tail call; callers
    /// resolve it at the next barrier.
    fn invoke(
        &self,
        self_ref: Reference,
        global: &GlobalContext,
        args: Vec<Reference>,
    ) -> Result<Reference, RuntimeError>;

    /// Enumerate captured variables, for garbage collection.
    fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        let _ = visitor;
    }
}

/// The opaque callable stored in a `function` value.
#[derive(Clone)]
pub struct FunctionValue(Rc<dyn Callable>);

impl FunctionValue {
    pub fn new(callable: Rc<dyn Callable>) -> Self {
        Self(callable)
    }

    pub fn from_callable<C: Callable + 'static>(callable: C) -> Self {
        Self(Rc::new(callable))
    }

    /// Wrap a plain closure as a host function.
    pub fn native<F>(name: &str, body: F) -> Self
    where
        F: Fn(Reference, &GlobalContext, Vec<Reference>) -> Result<Reference, RuntimeError>
            + 'static,
    {
        Self::from_callable(NativeFunction {
            name: name.to_string(),
            body: Box::new(body),
        })
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn source_location(&self) -> SourceLocation {
        self.0.source_location()
    }

    pub fn invoke(
        &self,
        self_ref: Reference,
        global: &GlobalContext,
        args: Vec<Reference>,
    ) -> Result<Reference, RuntimeError> {
        self.0.invoke(self_ref, global, args)
    }

    pub fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        self.0.collect_variables(visitor);
    }

    pub fn ptr_eq(&self, other: &FunctionValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn rc_key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn rc_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

/// A script function: a solidified AVMC queue plus its parameter list.
pub struct InstantiatedFunction {
    sloc: SourceLocation,
    name: String,
    params: Vec<String>,
    queue: AvmcQueue,
}

impl InstantiatedFunction {
    pub fn new(
        sloc: SourceLocation,
        name: impl Into<String>,
        params: Vec<String>,
        code: &[AirNode],
    ) -> Self {
        let mut queue = AvmcQueue::new();
        for node in code {
            node.solidify(&mut queue);
        }
        Self {
            sloc,
            name: name.into(),
            params,
            queue,
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}

impl Callable for InstantiatedFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_location(&self) -> SourceLocation {
        self.sloc.clone()
    }

    fn invoke(
        &self,
        self_ref: Reference,
        global: &GlobalContext,
        args: Vec<Reference>,
    ) -> Result<Reference, RuntimeError> {
        let stack = RefCell::new(RefStack::new());
        let alt_stack = RefCell::new(RefStack::new());
        let ctx = ExecutiveContext::new_function(
            global,
            &stack,
            &alt_stack,
            &self.name,
            &self.sloc,
            &self.params,
            self_ref,
            args,
        )?;

        let status = match self.queue.execute(&ctx) {
            Ok(status) => match ctx.on_scope_exit_normal(status) {
                Ok(status) => status,
                Err(mut err) => {
                    err.push_frame_function(self.sloc.clone(), &self.name);
                    return Err(err);
                }
            },
            Err(mut err) => {
                ctx.on_scope_exit_exceptional(&mut err);
                err.push_frame_function(self.sloc.clone(), &self.name);
                return Err(err);
            }
        };
        drop(ctx);

        match status {
            AirStatus::Next | AirStatus::ReturnVoid => Ok(Reference::void()),
            AirStatus::ReturnRef => stack.borrow_mut().pop(),
            AirStatus::BreakUnspec
            | AirStatus::BreakSwitch
            | AirStatus::BreakWhile
            | AirStatus::BreakFor => Err(RuntimeError::native_at(
                ErrorKind::StrayBreak,
                "stray `break` statement",
                &self.sloc,
            )),
            AirStatus::ContinueUnspec | AirStatus::ContinueWhile | AirStatus::ContinueFor => {
                Err(RuntimeError::native_at(
                    ErrorKind::StrayContinue,
                    "stray `continue` statement",
                    &self.sloc,
                ))
            }
        }
    }

    fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        self.queue.collect_variables(visitor);
    }
}

type NativeBody =
    Box<dyn Fn(Reference, &GlobalContext, Vec<Reference>) -> Result<Reference, RuntimeError>>;

/// A host-provided callable.
pub struct NativeFunction {
    name: String,
    body: NativeBody,
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        self_ref: Reference,
        global: &GlobalContext,
        args: Vec<Reference>,
    ) -> Result<Reference, RuntimeError> {
        (self.body)(self_ref, global, args)
    }
}

/// The callable bound to `__varg`: with no arguments it yields the number
/// of trailing arguments, with one integer argument the argument at that
/// index (a void reference when out of range).
pub struct VariadicArguer {
    sloc: SourceLocation,
    vargs: Vec<Reference>,
}

impl VariadicArguer {
    pub fn new(sloc: SourceLocation, vargs: Vec<Reference>) -> Self {
        Self { sloc, vargs }
    }
}

impl Callable for VariadicArguer {
    fn name(&self) -> &str {
        "__varg"
    }

    fn source_location(&self) -> SourceLocation {
        self.sloc.clone()
    }

    fn invoke(
        &self,
        _self_ref: Reference,
        _global: &GlobalContext,
        args: Vec<Reference>,
    ) -> Result<Reference, RuntimeError> {
        match args.len() {
            0 => Ok(Reference::temporary(Value::Integer(self.vargs.len() as i64))),
            1 => {
                let index = args[0].dereference_readonly()?.as_integer()?;
                if (0..self.vargs.len() as i64).contains(&index) {
                    Ok(self.vargs[index as usize].clone())
                } else {
                    Ok(Reference::void())
                }
            }
            count => Err(RuntimeError::native(
                ErrorKind::TypeMismatch,
                format!("`__varg` accepts at most one argument (got `{count}`)"),
            )),
        }
    }

    fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        for arg in &self.vargs {
            arg.for_each_variable(visitor);
        }
    }
}
