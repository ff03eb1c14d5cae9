//! Lexical contexts.
//!
//! Executive contexts are frames on the call stack: they own live name
//! bindings and a defer list, and share the evaluation stacks of their
//! enclosing function scope. Analytic contexts mirror the same nesting at
//! rebind time and carry only placeholders.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::air::AirStatus;
use crate::avmc::AvmcQueue;
use crate::reference::Reference;
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::function::{FunctionValue, VariadicArguer};
use crate::runtime::global::GlobalContext;
use crate::runtime::ptc::check_function_result;
use crate::runtime::stack::RefStack;
use crate::source::SourceLocation;
use crate::value::Value;

/// A lexical scope as seen by the rebinder: analytic and executive
/// contexts and the global context all take part in the same chain.
pub trait Scope {
    fn is_analytic(&self) -> bool;
    fn parent_scope(&self) -> Option<&dyn Scope>;
    fn lookup_for_rebind(&self, name: &str) -> Option<Reference>;
}

/// Compile-time scope used by the rebinder only.
pub struct AnalyticContext<'a> {
    parent: Option<&'a dyn Scope>,
    names: RefCell<HashSet<String>>,
}

impl<'a> AnalyticContext<'a> {
    pub fn new_plain(parent: &'a dyn Scope) -> Self {
        Self {
            parent: Some(parent),
            names: RefCell::new(HashSet::new()),
        }
    }

    pub fn new_function(parent: Option<&'a dyn Scope>, params: &[String]) -> Self {
        let ctx = Self {
            parent,
            names: RefCell::new(HashSet::new()),
        };
        for name in params {
            if name.is_empty() || name == "..." {
                continue;
            }
            ctx.insert_name(name);
        }
        ctx
    }

    pub fn insert_name(&self, name: &str) {
        self.names.borrow_mut().insert(name.to_string());
    }
}

impl Scope for AnalyticContext<'_> {
    fn is_analytic(&self) -> bool {
        true
    }

    fn parent_scope(&self) -> Option<&dyn Scope> {
        self.parent
    }

    fn lookup_for_rebind(&self, _name: &str) -> Option<Reference> {
        // Placeholders only; nothing is bindable here.
        None
    }
}

struct FunctionScope {
    name: String,
    sloc: SourceLocation,
    self_ref: RefCell<Option<Reference>>,
    vargs: RefCell<Option<Vec<Reference>>>,
}

/// A frame on the call stack, or a plain block scope chained to one.
pub struct ExecutiveContext<'a> {
    global: &'a GlobalContext,
    parent: Option<&'a ExecutiveContext<'a>>,
    stack: &'a RefCell<RefStack>,
    alt_stack: &'a RefCell<RefStack>,
    named: RefCell<HashMap<String, Reference>>,
    defers: RefCell<Vec<(SourceLocation, AvmcQueue)>>,
    fscope: Option<FunctionScope>,
}

impl<'a> ExecutiveContext<'a> {
    pub fn new_plain<'b>(parent: &'b ExecutiveContext<'b>) -> ExecutiveContext<'b> {
        ExecutiveContext {
            global: parent.global,
            parent: Some(parent),
            stack: parent.stack,
            alt_stack: parent.alt_stack,
            named: RefCell::new(HashMap::new()),
            defers: RefCell::new(Vec::new()),
            fscope: None,
        }
    }

    /// The frame constructor: binds positional parameters left to right,
    /// stashes trailing arguments for `__varg` when the parameter list ends
    /// in `...`, and rejects excess arguments otherwise.
    #[allow(clippy::too_many_arguments)]
    pub fn new_function(
        global: &'a GlobalContext,
        stack: &'a RefCell<RefStack>,
        alt_stack: &'a RefCell<RefStack>,
        name: &str,
        sloc: &SourceLocation,
        params: &[String],
        self_ref: Reference,
        mut args: Vec<Reference>,
    ) -> Result<ExecutiveContext<'a>, RuntimeError> {
        let mut named = HashMap::new();
        let mut ellipsis = None;
        for (index, param) in params.iter().enumerate() {
            if param.is_empty() {
                continue;
            }
            if param == "..." {
                ellipsis = Some(index);
                break;
            }
            if param.starts_with("__") {
                return Err(RuntimeError::native_at(
                    ErrorKind::TypeMismatch,
                    format!("reserved name not declarable as parameter (name `{param}`)"),
                    sloc,
                ));
            }
            let reference = if index < args.len() {
                std::mem::take(&mut args[index])
            } else {
                Reference::void()
            };
            named.insert(param.clone(), reference);
        }
        match ellipsis {
            Some(index) => {
                args.drain(..usize::min(index, args.len()));
            }
            None => {
                if args.len() > params.len() {
                    return Err(RuntimeError::native_at(
                        ErrorKind::TypeMismatch,
                        format!("too many arguments (`{}` > `{}`)", args.len(), params.len()),
                        sloc,
                    ));
                }
                args.clear();
            }
        }
        Ok(ExecutiveContext {
            global,
            parent: None,
            stack,
            alt_stack,
            named: RefCell::new(named),
            defers: RefCell::new(Vec::new()),
            fscope: Some(FunctionScope {
                name: name.to_string(),
                sloc: sloc.clone(),
                self_ref: RefCell::new(Some(self_ref)),
                vargs: RefCell::new(Some(args)),
            }),
        })
    }

    pub fn global(&self) -> &'a GlobalContext {
        self.global
    }

    pub fn stack(&self) -> &RefCell<RefStack> {
        self.stack
    }

    pub fn alt_stack(&self) -> &RefCell<RefStack> {
        self.alt_stack
    }

    pub fn parent(&self) -> Option<&ExecutiveContext<'a>> {
        self.parent
    }

    pub fn is_function_scope(&self) -> bool {
        self.fscope.is_some()
    }

    /// Walk `depth` parents up the executive chain.
    pub fn context_at_depth(&self, depth: u32) -> Result<&ExecutiveContext<'a>, RuntimeError> {
        let mut cur = self;
        for _ in 0..depth {
            cur = cur.parent.ok_or_else(|| {
                RuntimeError::native(ErrorKind::UnreachableTarget, "scope depth out of range")
            })?;
        }
        Ok(cur)
    }

    pub fn insert_named_reference(&self, name: impl Into<String>, reference: Reference) {
        self.named.borrow_mut().insert(name.into(), reference);
    }

    /// Look the name up in this scope only. Function scopes lazily
    /// materialize the predefined `__func`, `__this` and `__varg` names on
    /// first access.
    pub fn get_named_reference_opt(&self, name: &str) -> Option<Reference> {
        if let Some(found) = self.named.borrow().get(name) {
            return Some(found.clone());
        }
        let fscope = self.fscope.as_ref()?;
        let reference = match name {
            "__func" => Reference::constant(Value::string(fscope.name.clone())),
            "__this" => fscope.self_ref.borrow_mut().take().unwrap_or_default(),
            "__varg" => {
                let vargs = fscope.vargs.borrow_mut().take().unwrap_or_default();
                Reference::constant(Value::Function(FunctionValue::from_callable(
                    VariadicArguer::new(fscope.sloc.clone(), vargs),
                )))
            }
            _ => return None,
        };
        self.named
            .borrow_mut()
            .insert(name.to_string(), reference.clone());
        Some(reference)
    }

    /// Queue a solidified expression to run when this scope exits.
    pub fn defer_expression(&self, sloc: SourceLocation, queue: AvmcQueue) {
        self.defers.borrow_mut().push((sloc, queue));
    }

    /// Normal exit: run deferred expressions in reverse insertion order.
    /// A pending tail-call result is forced first, so deferred code runs
    /// after the tail call completes. An error raised by deferred code
    /// becomes the propagating error; further deferred failures chain onto
    /// it as `catch` frames.
    pub fn on_scope_exit_normal(&self, status: AirStatus) -> Result<AirStatus, RuntimeError> {
        if self.defers.borrow().is_empty() {
            return Ok(status);
        }
        if status == AirStatus::ReturnRef {
            let mut stack = self.stack.borrow_mut();
            let top = stack.top_mut()?;
            check_function_result(top, self.global)?;
        }
        let mut pending: Option<RuntimeError> = None;
        while let Some((sloc, queue)) = self.pop_defer() {
            if let Err(failure) = self.execute_defer(&queue) {
                match pending.as_mut() {
                    Some(err) => err.push_frame_catch(sloc, failure.into_value()),
                    None => pending = Some(failure),
                }
            }
        }
        match pending {
            Some(err) => Err(err),
            None => Ok(status),
        }
    }

    /// Exceptional exit: run deferred expressions while the in-flight
    /// error stays live; secondary failures chain onto it.
    pub fn on_scope_exit_exceptional(&self, err: &mut RuntimeError) {
        while let Some((sloc, queue)) = self.pop_defer() {
            if let Err(failure) = self.execute_defer(&queue) {
                err.push_frame_catch(sloc, failure.into_value());
            }
        }
    }

    fn pop_defer(&self) -> Option<(SourceLocation, AvmcQueue)> {
        self.defers.borrow_mut().pop()
    }

    fn execute_defer(&self, queue: &AvmcQueue) -> Result<(), RuntimeError> {
        let height = self.stack.borrow().len();
        let result = do_execute_block(queue, self);
        self.stack.borrow_mut().truncate(height);
        result.map(|_| ())
    }
}

impl Scope for ExecutiveContext<'_> {
    fn is_analytic(&self) -> bool {
        false
    }

    fn parent_scope(&self) -> Option<&dyn Scope> {
        self.parent.map(|parent| parent as &dyn Scope)
    }

    fn lookup_for_rebind(&self, name: &str) -> Option<Reference> {
        self.get_named_reference_opt(name)
    }
}

/// Execute a queue as a block: a fresh plain scope whose deferred
/// expressions run on every exit path, with control statuses forwarded
/// verbatim.
pub fn do_execute_block(
    queue: &AvmcQueue,
    ctx: &ExecutiveContext<'_>,
) -> Result<AirStatus, RuntimeError> {
    let ctx_next = ExecutiveContext::new_plain(ctx);
    match queue.execute(&ctx_next) {
        Ok(status) => ctx_next.on_scope_exit_normal(status),
        Err(mut err) => {
            ctx_next.on_scope_exit_exceptional(&mut err);
            Err(err)
        }
    }
}
