//! The dynamic value model: a closed tagged union over nine alternatives.

pub mod ops;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::gc::VarVisitor;
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::function::FunctionValue;

/// Strings are immutable byte sequences; the engine performs no Unicode
/// normalization. Object keys use the same representation.
pub type ByteString = Vec<u8>;

/// Insertion-ordered mapping with unique keys.
pub type Object = IndexMap<ByteString, Value>;

/// Host-defined opaque object. The host decides how it prints and which
/// variables it keeps alive.
pub trait Opaque: fmt::Debug {
    fn opaque_type(&self) -> &str;

    /// Enumerate variables held by this object, for garbage collection.
    fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        let _ = visitor;
    }
}

#[derive(Clone)]
pub struct OpaqueValue(pub Rc<dyn Opaque>);

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<opaque {}>", self.0.opaque_type())
    }
}

/// Result of the builtin three-way comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compare {
    Less,
    Equal,
    Greater,
    Unordered,
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(ByteString),
    Array(Vec<Value>),
    Object(Object),
    Function(FunctionValue),
    Opaque(OpaqueValue),
}

impl Value {
    pub fn string(text: impl AsRef<[u8]>) -> Self {
        Value::String(text.as_ref().to_vec())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Opaque(_) => "opaque",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Real(_) | Value::String(_)
        )
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    fn type_error(&self, expected: &str) -> RuntimeError {
        RuntimeError::native(
            ErrorKind::TypeMismatch,
            format!("expecting {expected}, but got `{}`", self.type_name()),
        )
    }

    pub fn as_boolean(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.type_error("a `boolean`")),
        }
    }

    pub fn as_integer(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(other.type_error("an `integer`")),
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }

    /// The only place an integer is promoted to a real.
    pub fn as_real(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Real(r) => Ok(*r),
            other => Err(other.type_error("an `integer` or `real`")),
        }
    }

    pub fn as_string(&self) -> Result<&ByteString, RuntimeError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.type_error("a `string`")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Value>, RuntimeError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.type_error("an `array`")),
        }
    }

    pub fn open_array(&mut self) -> Result<&mut Vec<Value>, RuntimeError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.type_error("an `array`")),
        }
    }

    pub fn as_object(&self) -> Result<&Object, RuntimeError> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(other.type_error("an `object`")),
        }
    }

    pub fn open_object(&mut self) -> Result<&mut Object, RuntimeError> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(other.type_error("an `object`")),
        }
    }

    pub fn as_function(&self) -> Result<&FunctionValue, RuntimeError> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(other.type_error("a `function`")),
        }
    }

    /// The builtin conversion to boolean.
    pub fn test(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Opaque(_) => true,
        }
    }

    /// The builtin comparison. Total on scalars of identical category,
    /// partial across categories and on NaNs; integers and reals compare
    /// numerically with each other.
    pub fn compare(&self, other: &Value) -> Compare {
        match (self, other) {
            (Value::Null, Value::Null) => Compare::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => ord_to_compare(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => ord_to_compare(a.cmp(b)),
            (a, b) if a.is_real() && b.is_real() => {
                // Only reachable with at least one real operand.
                let (x, y) = match (a.as_real(), b.as_real()) {
                    (Ok(x), Ok(y)) => (x, y),
                    _ => return Compare::Unordered,
                };
                match x.partial_cmp(&y) {
                    Some(ord) => ord_to_compare(ord),
                    None => Compare::Unordered,
                }
            }
            (Value::String(a), Value::String(b)) => ord_to_compare(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Compare::Equal => continue,
                        other => return other,
                    }
                }
                ord_to_compare(a.len().cmp(&b.len()))
            }
            _ => Compare::Unordered,
        }
    }

    /// Render the value the way the top-level driver prints results:
    /// strings are quoted and escaped, containers single-line.
    pub fn print_to_string(&self) -> String {
        let mut out = String::new();
        self.do_print(&mut out);
        out
    }

    fn do_print(&self, out: &mut String) {
        use std::fmt::Write;
        match self {
            Value::String(bytes) => {
                out.push('"');
                for &byte in bytes {
                    match byte {
                        b'"' => out.push_str("\\\""),
                        b'\\' => out.push_str("\\\\"),
                        b'\n' => out.push_str("\\n"),
                        b'\r' => out.push_str("\\r"),
                        b'\t' => out.push_str("\\t"),
                        0x20..=0x7e => out.push(byte as char),
                        other => {
                            let _ = write!(out, "\\x{other:02X}");
                        }
                    }
                }
                out.push('"');
            }
            Value::Array(arr) => {
                out.push('[');
                for (index, elem) in arr.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    elem.do_print(out);
                }
                out.push(']');
            }
            Value::Object(obj) => {
                out.push('{');
                for (index, (key, elem)) in obj.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    Value::String(key.clone()).do_print(out);
                    out.push_str(": ");
                    elem.do_print(out);
                }
                out.push('}');
            }
            other => {
                let _ = write!(out, "{other}");
            }
        }
    }

    /// Render the value across multiple lines with the given indent,
    /// for diagnostics.
    pub fn dump_to_string(&self, indent: usize) -> String {
        let mut out = String::new();
        self.do_dump(&mut out, indent, 0);
        out
    }

    fn do_dump(&self, out: &mut String, indent: usize, hanging: usize) {
        use std::fmt::Write;
        match self {
            Value::Array(arr) if !arr.is_empty() => {
                let _ = writeln!(out, "array({}) [", arr.len());
                for (index, elem) in arr.iter().enumerate() {
                    let _ = write!(out, "{:width$}{index} = ", "", width = hanging + indent);
                    elem.do_dump(out, indent, hanging + indent);
                }
                let _ = writeln!(out, "{:width$}]", "", width = hanging);
            }
            Value::Object(obj) if !obj.is_empty() => {
                let _ = writeln!(out, "object({}) {{", obj.len());
                for (key, elem) in obj.iter() {
                    let _ = write!(
                        out,
                        "{:width$}{} = ",
                        "",
                        String::from_utf8_lossy(key),
                        width = hanging + indent
                    );
                    elem.do_dump(out, indent, hanging + indent);
                }
                let _ = writeln!(out, "{:width$}}}", "", width = hanging);
            }
            other => {
                let _ = writeln!(out, "{}({})", other.type_name(), other.print_to_string());
            }
        }
    }

    /// Enumerate variables reachable from this value, for garbage
    /// collection. Scalars enumerate nothing. Functions and opaques are
    /// refcounted boundaries: the visitor is consulted before the walk
    /// crosses into them, so the collector can account for aliasing.
    pub fn for_each_variable(&self, visitor: &mut dyn VarVisitor) {
        match self {
            Value::Array(arr) => {
                for elem in arr {
                    elem.for_each_variable(visitor);
                }
            }
            Value::Object(obj) => {
                for elem in obj.values() {
                    elem.for_each_variable(visitor);
                }
            }
            Value::Function(func) => {
                if visitor.visit_shared(SharedHandle::Function(func)) {
                    func.collect_variables(visitor);
                }
            }
            Value::Opaque(opaque) => {
                if visitor.visit_shared(SharedHandle::Opaque(opaque)) {
                    opaque.0.collect_variables(visitor);
                }
            }
            _ => {}
        }
    }
}

/// A refcounted boundary inside a value graph. Variables are only ever
/// held behind one of these, so edge accounting happens per handle.
pub enum SharedHandle<'a> {
    Function(&'a FunctionValue),
    Opaque(&'a OpaqueValue),
}

impl SharedHandle<'_> {
    /// Identity of the shared allocation.
    pub fn key(&self) -> usize {
        match self {
            SharedHandle::Function(func) => func.rc_key(),
            SharedHandle::Opaque(opaque) => Rc::as_ptr(&opaque.0) as *const () as usize,
        }
    }

    /// Live strong count of the shared allocation.
    pub fn strong_count(&self) -> usize {
        match self {
            SharedHandle::Function(func) => func.rc_count(),
            SharedHandle::Opaque(opaque) => Rc::strong_count(&opaque.0),
        }
    }

    pub fn to_owned(&self) -> SharedOwned {
        match self {
            SharedHandle::Function(func) => SharedOwned::Function((*func).clone()),
            SharedHandle::Opaque(opaque) => SharedOwned::Opaque((*opaque).clone()),
        }
    }

    /// Walk the handle's own contents, yielding variable edges and nested
    /// shared handles to the visitor.
    pub fn walk(&self, visitor: &mut dyn VarVisitor) {
        match self {
            SharedHandle::Function(func) => func.collect_variables(visitor),
            SharedHandle::Opaque(opaque) => opaque.0.collect_variables(visitor),
        }
    }
}

#[derive(Clone)]
pub enum SharedOwned {
    Function(FunctionValue),
    Opaque(OpaqueValue),
}

impl SharedOwned {
    pub fn as_handle(&self) -> SharedHandle<'_> {
        match self {
            SharedOwned::Function(func) => SharedHandle::Function(func),
            SharedOwned::Opaque(opaque) => SharedHandle::Opaque(opaque),
        }
    }
}

fn ord_to_compare(ord: std::cmp::Ordering) -> Compare {
    match ord {
        std::cmp::Ordering::Less => Compare::Less,
        std::cmp::Ordering::Equal => Compare::Equal,
        std::cmp::Ordering::Greater => Compare::Greater,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::String(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (idx, elem) in arr.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => {
                write!(f, "{{")?;
                for (idx, (key, elem)) in obj.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {elem}", String::from_utf8_lossy(key))?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Opaque(opaque) => write!(f, "<opaque {}>", opaque.0.opaque_type()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.as_bytes().to_vec())
    }
}
