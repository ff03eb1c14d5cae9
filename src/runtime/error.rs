//! Structured runtime errors with value payloads and backtraces.

use std::fmt;

use thiserror::Error;

use crate::source::SourceLocation;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    TypeMismatch,
    ArithmeticOverflow,
    DivisionByZero,
    IndexOutOfRange,
    KeyNotFound,
    ImmutableViolation,
    AssertionFailed,
    UserThrown,
    StrayBreak,
    StrayContinue,
    UnreachableTarget,
    Io,
    RecursionLimit,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::ArithmeticOverflow => "arithmetic_overflow",
            ErrorKind::DivisionByZero => "division_by_zero",
            ErrorKind::IndexOutOfRange => "index_out_of_range",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::ImmutableViolation => "immutable_violation",
            ErrorKind::AssertionFailed => "assertion_failed",
            ErrorKind::UserThrown => "user_thrown",
            ErrorKind::StrayBreak => "stray_break",
            ErrorKind::StrayContinue => "stray_continue",
            ErrorKind::UnreachableTarget => "unreachable_target",
            ErrorKind::Io => "io",
            ErrorKind::RecursionLimit => "recursion_limit",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Native,
    Throw,
    Assert,
    Call,
    Try,
    Catch,
    Function,
    File,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Native => "native",
            FrameKind::Throw => "throw",
            FrameKind::Assert => "assert",
            FrameKind::Call => "call",
            FrameKind::Try => "try",
            FrameKind::Catch => "catch",
            FrameKind::Function => "function",
            FrameKind::File => "file",
        }
    }
}

/// One backtrace entry. Frames are appended as the error propagates
/// outwards, so the first frame is where the error originated.
#[derive(Clone, Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub sloc: SourceLocation,
    pub value: Value,
}

#[derive(Clone, Debug, Error)]
#[error("{kind}: {value}")]
pub struct RuntimeError {
    kind: ErrorKind,
    value: Value,
    frames: Vec<Frame>,
}

impl RuntimeError {
    /// An error raised by the engine itself. The payload is the formatted
    /// message; the first frame is attached later, at the faulting AVMC
    /// record, where the source location is known.
    pub fn native(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            value: Value::string(message.into()),
            frames: Vec::new(),
        }
    }

    pub fn native_at(
        kind: ErrorKind,
        message: impl Into<String>,
        sloc: &SourceLocation,
    ) -> Self {
        let mut err = Self::native(kind, message);
        err.push_frame(FrameKind::Native, sloc.clone(), err.value.clone());
        err
    }

    /// A `throw` statement with a user payload.
    pub fn user_thrown(value: Value, sloc: &SourceLocation) -> Self {
        let mut err = Self {
            kind: ErrorKind::UserThrown,
            value: value.clone(),
            frames: Vec::new(),
        };
        err.push_frame(FrameKind::Throw, sloc.clone(), value);
        err
    }

    pub fn assertion(message: impl Into<String>, sloc: &SourceLocation) -> Self {
        let text = message.into();
        let mut err = Self {
            kind: ErrorKind::AssertionFailed,
            value: Value::string(format!("assertion failure: {text}")),
            frames: Vec::new(),
        };
        let payload = err.value.clone();
        err.push_frame(FrameKind::Assert, sloc.clone(), payload);
        err
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The thrown payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn push_frame(&mut self, kind: FrameKind, sloc: SourceLocation, value: Value) {
        self.frames.push(Frame { kind, sloc, value });
    }

    pub fn push_frame_try(&mut self, sloc: SourceLocation) {
        self.push_frame(FrameKind::Try, sloc, Value::Null);
    }

    pub fn push_frame_catch(&mut self, sloc: SourceLocation, original: Value) {
        self.push_frame(FrameKind::Catch, sloc, original);
    }

    pub fn push_frame_call(&mut self, sloc: SourceLocation) {
        self.push_frame(FrameKind::Call, sloc, Value::Null);
    }

    pub fn push_frame_function(&mut self, sloc: SourceLocation, name: &str) {
        self.push_frame(FrameKind::Function, sloc, Value::string(name));
    }

    pub fn push_frame_file(&mut self, sloc: SourceLocation) {
        let path = Value::string(sloc.file.clone());
        self.push_frame(FrameKind::File, sloc, path);
    }

    /// Attach the faulting record's location when the error left the value
    /// layer without any frame of its own.
    pub(crate) fn ensure_frame(&mut self, sloc: &SourceLocation) {
        if self.frames.is_empty() {
            self.push_frame(FrameKind::Native, sloc.clone(), self.value.clone());
        }
    }

    /// Render the backtrace the way the top-level driver prints it.
    pub fn format_backtrace(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "{self}");
        for (index, frame) in self.frames.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{index} <{}> at {}: {}",
                frame.kind.as_str(),
                frame.sloc,
                frame.value
            );
        }
        out
    }
}
