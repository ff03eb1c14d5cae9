//! Asteria runtime engine.
//!
//! The crate consumes AIR trees produced by an external parser, lowers them
//! into packed AVMC instruction queues and executes those queues while
//! managing reference semantics, proper tail calls, structured exceptions
//! with backtraces, and a generational cycle collector.

pub mod air;
pub mod avmc;
pub mod gc;
pub mod reference;
pub mod runtime;
pub mod source;
pub mod value;
pub mod variable;

pub use crate::air::{AirNode, AirStatus, PtcMode};
pub use crate::reference::{RefModifier, Reference};
pub use crate::runtime::context::{AnalyticContext, ExecutiveContext, Scope};
pub use crate::runtime::error::{ErrorKind, Frame, FrameKind, RuntimeError};
pub use crate::runtime::function::{Callable, FunctionValue, InstantiatedFunction, NativeFunction};
pub use crate::runtime::global::{EngineOptions, GlobalContext};
pub use crate::runtime::hooks::Hooks;
pub use crate::runtime::loader::{ModuleLoader, ScriptCompiler};
pub use crate::runtime::script::Script;
pub use crate::source::SourceLocation;
pub use crate::value::{ByteString, Compare, Value};
pub use crate::variable::{VarPtr, Variable};

/// Result alias used throughout the runtime.
pub type AsteriaResult<T> = Result<T, RuntimeError>;
