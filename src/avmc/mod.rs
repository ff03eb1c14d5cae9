//! The packed instruction queue.
//!
//! Each record pairs a handler function pointer with one word of inline
//! bits (`uparam`), an owned payload (`sparam`, whose `Drop` takes the
//! place of the original destructor pointers) and optional metadata (the
//! source location used by hooks and backtraces). Records are appended
//! once, never cloned, and walked linearly by the execution driver.

use crate::air::{AirNode, AirStatus};
use crate::gc::VarVisitor;
use crate::reference::Reference;
use crate::runtime::context::ExecutiveContext;
use crate::runtime::error::RuntimeError;
use crate::source::SourceLocation;
use crate::value::{ByteString, Value};

/// Per-record handler. Receives the executive context and the record
/// header it was appended with.
pub type Handler = fn(&ExecutiveContext<'_>, &AvmcRecord) -> Result<AirStatus, RuntimeError>;

/// One machine word of packed small fields: flags, an operator or status
/// selector, a lookup depth or element count, and a 48-bit immediate
/// integer split into `i01` (high, signed) and `u2345` (low).
#[derive(Clone, Copy, Debug, Default)]
pub struct Uparam {
    pub b0: bool,
    pub b1: bool,
    pub u0: u8,
    pub u1: u8,
    pub i01: i16,
    pub u2345: u32,
}

impl Uparam {
    /// Recombine the split 48-bit immediate, sign-extended.
    pub fn immediate48(self) -> i64 {
        (self.i01 as i64) * 0x1_0000_0000 + self.u2345 as i64
    }

    /// Split a 48-bit immediate into the high and low fields. The caller
    /// guarantees the value fits in 48 bits.
    pub fn with_immediate48(mut self, value: i64) -> Self {
        self.i01 = (value >> 32) as i16;
        self.u2345 = value as u32;
        self
    }
}

#[derive(Debug)]
pub struct AvmcMeta {
    pub sloc: SourceLocation,
}

/// Typed record payload. Larger state (nested queues, key vectors, AIR
/// bodies for late rebinding) lives here; `Drop` destroys it
/// deterministically when the queue goes away.
#[derive(Debug, Default)]
pub enum Sparam {
    #[default]
    None,
    Name(String),
    Text(String),
    Keys(Vec<ByteString>),
    Ref(Reference),
    Value(Value),
    Queue(AvmcQueue),
    TwoQueues(AvmcQueue, AvmcQueue),
    Switch {
        labels: Vec<AvmcQueue>,
        clauses: Vec<AvmcQueue>,
        names_added: Vec<Vec<String>>,
    },
    ForEach {
        name_key: String,
        name_mapped: String,
        sloc_init: SourceLocation,
        queue_init: AvmcQueue,
        queue_body: AvmcQueue,
    },
    For {
        queue_init: AvmcQueue,
        queue_cond: AvmcQueue,
        queue_step: AvmcQueue,
        queue_body: AvmcQueue,
    },
    Try {
        queue_try: AvmcQueue,
        sloc_catch: SourceLocation,
        name_except: String,
        queue_catch: AvmcQueue,
    },
    FuncDef {
        name: String,
        params: Vec<String>,
        body: Vec<AirNode>,
    },
    AirBody(Vec<AirNode>),
}

impl Sparam {
    fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        match self {
            Sparam::Ref(reference) => reference.for_each_variable(visitor),
            Sparam::Value(value) => value.for_each_variable(visitor),
            Sparam::Queue(queue) => queue.collect_variables(visitor),
            Sparam::TwoQueues(first, second) => {
                first.collect_variables(visitor);
                second.collect_variables(visitor);
            }
            Sparam::Switch {
                labels, clauses, ..
            } => {
                for queue in labels.iter().chain(clauses) {
                    queue.collect_variables(visitor);
                }
            }
            Sparam::ForEach {
                queue_init,
                queue_body,
                ..
            } => {
                queue_init.collect_variables(visitor);
                queue_body.collect_variables(visitor);
            }
            Sparam::For {
                queue_init,
                queue_cond,
                queue_step,
                queue_body,
            } => {
                queue_init.collect_variables(visitor);
                queue_cond.collect_variables(visitor);
                queue_step.collect_variables(visitor);
                queue_body.collect_variables(visitor);
            }
            Sparam::Try {
                queue_try,
                queue_catch,
                ..
            } => {
                queue_try.collect_variables(visitor);
                queue_catch.collect_variables(visitor);
            }
            Sparam::FuncDef { body, .. } | Sparam::AirBody(body) => {
                for node in body {
                    node.collect_variables(visitor);
                }
            }
            _ => {}
        }
    }
}

/// A packed record. Move-only: once appended it stays in its queue until
/// the queue is destroyed.
pub struct AvmcRecord {
    handler: Handler,
    uparam: Uparam,
    sparam: Sparam,
    meta: Option<Box<AvmcMeta>>,
}

impl std::fmt::Debug for AvmcRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvmcRecord")
            .field("uparam", &self.uparam)
            .field("sparam", &self.sparam)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl AvmcRecord {
    pub fn new(
        handler: Handler,
        uparam: Uparam,
        sparam: Sparam,
        sloc: Option<&SourceLocation>,
    ) -> Self {
        Self {
            handler,
            uparam,
            sparam,
            meta: sloc.map(|sloc| Box::new(AvmcMeta { sloc: sloc.clone() })),
        }
    }

    pub fn uparam(&self) -> Uparam {
        self.uparam
    }

    pub fn sparam(&self) -> &Sparam {
        &self.sparam
    }

    pub fn sloc(&self) -> Option<&SourceLocation> {
        self.meta.as_deref().map(|meta| &meta.sloc)
    }

    /// The record's location, or an empty one for records without
    /// metadata.
    pub fn sloc_or_default(&self) -> SourceLocation {
        self.sloc().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct AvmcQueue {
    records: Vec<AvmcRecord>,
}

impl AvmcQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn append(&mut self, record: AvmcRecord) {
        self.records.push(record);
    }

    /// Walk the queue linearly, invoking each record's handler. The first
    /// non-`Next` status short-circuits; loop and block handlers upstream
    /// interpret it. An error leaving the value layer without a frame gets
    /// the faulting record's location attached.
    pub fn execute(&self, ctx: &ExecutiveContext<'_>) -> Result<AirStatus, RuntimeError> {
        for record in &self.records {
            match (record.handler)(ctx, record) {
                Ok(AirStatus::Next) => {}
                Ok(status) => return Ok(status),
                Err(mut err) => {
                    err.ensure_frame(&record.sloc_or_default());
                    return Err(err);
                }
            }
        }
        Ok(AirStatus::Next)
    }

    /// Enumerate variables captured anywhere in this queue, for garbage
    /// collection of closure environments.
    pub fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        for record in &self.records {
            record.sparam.collect_variables(visitor);
        }
    }
}
