//! Pending tail calls and the trampoline that resolves them.
//!
//! A call in tail position does not recurse into the callee. Instead the
//! caller's result becomes a reference whose root is a pending-tail-call
//! thunk capturing the call site, the target and the stashed arguments.
//! The thunk is forced at the next barrier by walking the chain
//! iteratively, which bounds native stack growth regardless of the
//! source-level recursion depth.

use std::cell::RefCell;

use crate::air::PtcMode;
use crate::gc::VarVisitor;
use crate::reference::Reference;
use crate::runtime::error::RuntimeError;
use crate::runtime::function::FunctionValue;
use crate::runtime::global::GlobalContext;
use crate::source::SourceLocation;

#[derive(Debug)]
pub struct PtcArguments {
    pub sloc: SourceLocation,
    pub ptc_mode: PtcMode,
    pub target: FunctionValue,
    pub self_ref: Reference,
    pub args: Vec<Reference>,
}

/// Shared slot holding a pending tail call until a barrier drains it.
#[derive(Debug)]
pub struct PtcSlot(RefCell<Option<PtcArguments>>);

impl PtcSlot {
    pub fn new(arguments: Option<PtcArguments>) -> Self {
        Self(RefCell::new(arguments))
    }

    pub fn take(&self) -> Option<PtcArguments> {
        self.0.borrow_mut().take()
    }

    pub fn for_each_variable(&self, visitor: &mut dyn VarVisitor) {
        if let Some(ptc) = &*self.0.borrow() {
            ptc.self_ref.for_each_variable(visitor);
            for arg in &ptc.args {
                arg.for_each_variable(visitor);
            }
            ptc.target.collect_variables(visitor);
        }
    }
}

/// The barrier: force any chain of pending tail calls rooted at this
/// reference. Each hop is invoked iteratively, never recursively; each hop
/// fires the call hooks, and on failure each recorded hop contributes one
/// `call` frame so the backtrace lists the call sites in their original
/// order. The final result is projected through each hop's mode in
/// unwinding order.
pub fn check_function_result(
    reference: &mut Reference,
    global: &GlobalContext,
) -> Result<(), RuntimeError> {
    if !reference.is_ptc() {
        return Ok(());
    }
    let mut hops: Vec<(SourceLocation, PtcMode, FunctionValue)> = Vec::new();
    while reference.is_ptc() {
        let Some(ptc) = reference.take_ptc() else {
            return Err(RuntimeError::native(
                crate::runtime::error::ErrorKind::TypeMismatch,
                "pending tail call resolved twice",
            ));
        };
        let PtcArguments {
            sloc,
            ptc_mode,
            target,
            self_ref,
            args,
        } = ptc;
        global.with_hooks(|h| h.on_function_call(&sloc, &target));
        hops.push((sloc, ptc_mode, target.clone()));
        match target.invoke(self_ref, global, args) {
            Ok(next) => *reference = next,
            Err(mut err) => {
                for (hop_sloc, _, hop_target) in hops.iter().rev() {
                    err.push_frame_call(hop_sloc.clone());
                    global.with_hooks(|h| h.on_function_except(hop_sloc, hop_target, &err));
                }
                return Err(err);
            }
        }
    }
    for (hop_sloc, mode, hop_target) in hops.iter().rev() {
        match mode {
            PtcMode::ByVal => {
                reference.dereference_copy()?;
            }
            PtcMode::Void => reference.set_void(),
            PtcMode::ByRef | PtcMode::None => {}
        }
        global.with_hooks(|h| h.on_function_return(hop_sloc, hop_target, reference));
    }
    Ok(())
}
