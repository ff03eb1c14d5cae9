//! References: a root plus an ordered chain of modifiers addressing a
//! sub-value. References are what evaluation stacks hold; values are only
//! materialized when a reference is dereferenced.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::gc::{visit_variable, VarVisitor};
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::ptc::{PtcArguments, PtcSlot};
use crate::value::{ByteString, Value};
use crate::variable::VarPtr;

#[derive(Clone, Debug, Default)]
pub enum RefRoot {
    /// No value yet. Also the state of a declared-but-uninitialized `ref`
    /// binding and of analytic placeholders.
    #[default]
    Void,
    Constant(Value),
    Temporary(Value),
    Variable(VarPtr),
    /// A pending tail call, resolved at the next barrier.
    PtcPending(Rc<PtcSlot>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefModifier {
    ArrayIndex(i64),
    ArrayHead,
    ArrayTail,
    ArrayRandom(u32),
    ObjectKey(ByteString),
}

#[derive(Clone, Debug, Default)]
pub struct Reference {
    root: RefRoot,
    modifiers: SmallVec<[RefModifier; 2]>,
}

fn void_error() -> RuntimeError {
    RuntimeError::native(
        ErrorKind::TypeMismatch,
        "attempt to use the result of a function call which returned no value",
    )
}

fn unresolved_ptc_error() -> RuntimeError {
    RuntimeError::native(
        ErrorKind::TypeMismatch,
        "pending tail call used before resolution",
    )
}

impl Reference {
    pub fn void() -> Self {
        Self::default()
    }

    pub fn constant(value: Value) -> Self {
        Self {
            root: RefRoot::Constant(value),
            modifiers: SmallVec::new(),
        }
    }

    pub fn temporary(value: Value) -> Self {
        Self {
            root: RefRoot::Temporary(value),
            modifiers: SmallVec::new(),
        }
    }

    pub fn variable(var: VarPtr) -> Self {
        Self {
            root: RefRoot::Variable(var),
            modifiers: SmallVec::new(),
        }
    }

    pub fn ptc(arguments: PtcArguments) -> Self {
        Self {
            root: RefRoot::PtcPending(Rc::new(PtcSlot::new(Some(arguments)))),
            modifiers: SmallVec::new(),
        }
    }

    pub fn root(&self) -> &RefRoot {
        &self.root
    }

    pub fn modifiers(&self) -> &[RefModifier] {
        &self.modifiers
    }

    pub fn is_void(&self) -> bool {
        matches!(self.root, RefRoot::Void)
    }

    pub fn is_ptc(&self) -> bool {
        matches!(self.root, RefRoot::PtcPending(_))
    }

    pub fn set_void(&mut self) {
        *self = Self::void();
    }

    pub fn set_temporary(&mut self, value: Value) {
        *self = Self::temporary(value);
    }

    pub fn set_variable(&mut self, var: VarPtr) {
        *self = Self::variable(var);
    }

    /// Take the pending tail call out of a PTC root, leaving the slot
    /// empty. Returns `None` for other roots or an already-drained slot.
    pub(crate) fn take_ptc(&self) -> Option<PtcArguments> {
        match &self.root {
            RefRoot::PtcPending(slot) => slot.take(),
            _ => None,
        }
    }

    /// Once the root is a pending tail call, no further modifiers may be
    /// pushed; the thunk must be resolved first.
    pub fn push_modifier(&mut self, modifier: RefModifier) -> Result<(), RuntimeError> {
        if self.is_ptc() {
            return Err(unresolved_ptc_error());
        }
        self.modifiers.push(modifier);
        Ok(())
    }

    /// Drop the last modifier, leaving the reference to the parent. With no
    /// modifiers left to pop, the reference decays to void; this is how a
    /// plain call gets its void `this`.
    pub fn pop_modifier(&mut self) {
        if self.modifiers.pop().is_none() {
            self.root = RefRoot::Void;
        }
    }

    /// The referenced variable, iff the reference has no modifiers and its
    /// root is a variable.
    pub fn unphase_variable_opt(&self) -> Option<VarPtr> {
        if !self.modifiers.is_empty() {
            return None;
        }
        match &self.root {
            RefRoot::Variable(var) => Some(var.clone()),
            _ => None,
        }
    }

    /// Read the addressed value. Reads are lenient about missing slots
    /// (out-of-range indices and absent keys read as `null`), but a
    /// modifier applied to a value of the wrong type is an error.
    pub fn dereference_readonly(&self) -> Result<Value, RuntimeError> {
        match &self.root {
            RefRoot::Void => Err(void_error()),
            RefRoot::PtcPending(_) => Err(unresolved_ptc_error()),
            RefRoot::Constant(value) | RefRoot::Temporary(value) => {
                read_chain(value, &self.modifiers)
            }
            RefRoot::Variable(var) => {
                if !var.is_initialized() {
                    return Err(RuntimeError::native(
                        ErrorKind::TypeMismatch,
                        "use of uninitialized variable",
                    ));
                }
                read_chain(&var.value(), &self.modifiers)
            }
        }
    }

    /// Run `f` over the addressed lvalue. Missing array and object slots
    /// are created on the way; constants, temporaries and immutable
    /// variables refuse mutation.
    pub fn modify_value<R>(
        &self,
        f: impl FnOnce(&mut Value) -> Result<R, RuntimeError>,
    ) -> Result<R, RuntimeError> {
        match &self.root {
            RefRoot::Void => Err(void_error()),
            RefRoot::PtcPending(_) => Err(unresolved_ptc_error()),
            RefRoot::Constant(_) => Err(RuntimeError::native(
                ErrorKind::ImmutableViolation,
                "attempt to modify a constant",
            )),
            RefRoot::Temporary(_) => Err(RuntimeError::native(
                ErrorKind::ImmutableViolation,
                "attempt to modify a temporary value",
            )),
            RefRoot::Variable(var) => {
                if var.is_immutable() {
                    return Err(RuntimeError::native(
                        ErrorKind::ImmutableViolation,
                        "attempt to modify an immutable variable",
                    ));
                }
                if !var.is_initialized() {
                    return Err(RuntimeError::native(
                        ErrorKind::TypeMismatch,
                        "use of uninitialized variable",
                    ));
                }
                let mut guard = var.value_mut();
                let slot = open_chain(&mut guard, &self.modifiers)?;
                f(slot)
            }
        }
    }

    /// Remove the addressed slot, returning the previous value (`null`
    /// when there was nothing to remove).
    pub fn dereference_unset(&self) -> Result<Value, RuntimeError> {
        let Some((last, front)) = self.modifiers.split_last() else {
            return Err(RuntimeError::native(
                ErrorKind::TypeMismatch,
                "only array elements or object members may be unset",
            ));
        };
        match &self.root {
            RefRoot::Void => Err(void_error()),
            RefRoot::PtcPending(_) => Err(unresolved_ptc_error()),
            RefRoot::Constant(_) | RefRoot::Temporary(_) => Err(RuntimeError::native(
                ErrorKind::ImmutableViolation,
                "attempt to modify a temporary value",
            )),
            RefRoot::Variable(var) => {
                if var.is_immutable() {
                    return Err(RuntimeError::native(
                        ErrorKind::ImmutableViolation,
                        "attempt to modify an immutable variable",
                    ));
                }
                let mut guard = var.value_mut();
                match walk_existing(&mut guard, front)? {
                    None => Ok(Value::Null),
                    Some(parent) => remove_slot(parent, last),
                }
            }
        }
    }

    /// Materialize the read value into this reference as a temporary root
    /// and return a copy of it.
    pub fn dereference_copy(&mut self) -> Result<Value, RuntimeError> {
        let value = self.dereference_readonly()?;
        *self = Self::temporary(value.clone());
        Ok(value)
    }

    /// Enumerate variables reachable from this reference, for garbage
    /// collection.
    pub fn for_each_variable(&self, visitor: &mut dyn VarVisitor) {
        match &self.root {
            RefRoot::Void => {}
            RefRoot::Constant(value) | RefRoot::Temporary(value) => {
                value.for_each_variable(visitor);
            }
            RefRoot::Variable(var) => visit_variable(var, visitor),
            RefRoot::PtcPending(slot) => slot.for_each_variable(visitor),
        }
    }
}

fn subscript_mismatch(modifier: &RefModifier, target: &Value) -> RuntimeError {
    let wanted = match modifier {
        RefModifier::ObjectKey(_) => "object member access",
        _ => "integer subscript",
    };
    RuntimeError::native(
        ErrorKind::TypeMismatch,
        format!("{wanted} applied to a value of type `{}`", target.type_name()),
    )
}

fn wrap_index(index: i64, len: usize) -> i64 {
    if index < 0 {
        index + len as i64
    } else {
        index
    }
}

fn apply_read<'a>(
    cur: &'a Value,
    modifier: &RefModifier,
) -> Result<Option<&'a Value>, RuntimeError> {
    match (cur, modifier) {
        (Value::Null, _) => Ok(None),
        (Value::Array(arr), RefModifier::ArrayIndex(i)) => {
            let idx = wrap_index(*i, arr.len());
            if (0..arr.len() as i64).contains(&idx) {
                Ok(Some(&arr[idx as usize]))
            } else {
                Ok(None)
            }
        }
        (Value::Array(arr), RefModifier::ArrayHead) => Ok(arr.first()),
        (Value::Array(arr), RefModifier::ArrayTail) => Ok(arr.last()),
        (Value::Array(arr), RefModifier::ArrayRandom(seed)) => {
            if arr.is_empty() {
                Ok(None)
            } else {
                Ok(Some(&arr[*seed as usize % arr.len()]))
            }
        }
        (Value::Object(obj), RefModifier::ObjectKey(key)) => Ok(obj.get(key)),
        (other, m) => Err(subscript_mismatch(m, other)),
    }
}

fn read_chain(base: &Value, modifiers: &[RefModifier]) -> Result<Value, RuntimeError> {
    let mut cur = base;
    for modifier in modifiers {
        match apply_read(cur, modifier)? {
            Some(next) => cur = next,
            None => return Ok(Value::Null),
        }
    }
    Ok(cur.clone())
}

/// Walk modifiers over an lvalue, creating missing slots. A `null` slot is
/// reshaped into an array or object as the next modifier requires.
fn open_chain<'a>(
    base: &'a mut Value,
    modifiers: &[RefModifier],
) -> Result<&'a mut Value, RuntimeError> {
    let mut cur = base;
    for modifier in modifiers {
        if cur.is_null() {
            *cur = match modifier {
                RefModifier::ObjectKey(_) => Value::Object(Default::default()),
                _ => Value::Array(Vec::new()),
            };
        }
        cur = match modifier {
            RefModifier::ArrayIndex(i) => {
                let arr = cur.open_array()?;
                let mut idx = wrap_index(*i, arr.len());
                if idx < 0 {
                    // Prepend slots so the subscript lands on the first.
                    let grow = (-idx) as usize;
                    arr.splice(..0, std::iter::repeat(Value::Null).take(grow));
                    idx = 0;
                } else if idx >= arr.len() as i64 {
                    arr.resize(idx as usize + 1, Value::Null);
                }
                &mut arr[idx as usize]
            }
            RefModifier::ArrayHead => {
                let arr = cur.open_array()?;
                if arr.is_empty() {
                    arr.push(Value::Null);
                }
                &mut arr[0]
            }
            RefModifier::ArrayTail => {
                let arr = cur.open_array()?;
                if arr.is_empty() {
                    arr.push(Value::Null);
                }
                let last = arr.len() - 1;
                &mut arr[last]
            }
            RefModifier::ArrayRandom(seed) => {
                let arr = cur.open_array()?;
                if arr.is_empty() {
                    arr.push(Value::Null);
                }
                let idx = *seed as usize % arr.len();
                &mut arr[idx]
            }
            RefModifier::ObjectKey(key) => {
                let obj = cur.open_object()?;
                obj.entry(key.clone()).or_insert(Value::Null)
            }
        };
    }
    Ok(cur)
}

/// Walk modifiers over an lvalue without creating anything; `None` when the
/// chain runs into a missing slot.
fn walk_existing<'a>(
    base: &'a mut Value,
    modifiers: &[RefModifier],
) -> Result<Option<&'a mut Value>, RuntimeError> {
    let mut cur = base;
    for modifier in modifiers {
        if cur.is_null() {
            return Ok(None);
        }
        let next = match modifier {
            RefModifier::ArrayIndex(i) => {
                let arr = cur.open_array()?;
                let idx = wrap_index(*i, arr.len());
                if (0..arr.len() as i64).contains(&idx) {
                    Some(&mut arr[idx as usize])
                } else {
                    None
                }
            }
            RefModifier::ArrayHead => cur.open_array()?.first_mut(),
            RefModifier::ArrayTail => cur.open_array()?.last_mut(),
            RefModifier::ArrayRandom(seed) => {
                let arr = cur.open_array()?;
                if arr.is_empty() {
                    None
                } else {
                    let idx = *seed as usize % arr.len();
                    Some(&mut arr[idx])
                }
            }
            RefModifier::ObjectKey(key) => cur.open_object()?.get_mut(key),
        };
        match next {
            Some(value) => cur = value,
            None => return Ok(None),
        }
    }
    Ok(Some(cur))
}

fn remove_slot(parent: &mut Value, modifier: &RefModifier) -> Result<Value, RuntimeError> {
    match (parent, modifier) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Array(arr), RefModifier::ArrayIndex(i)) => {
            let idx = wrap_index(*i, arr.len());
            if (0..arr.len() as i64).contains(&idx) {
                Ok(arr.remove(idx as usize))
            } else {
                Ok(Value::Null)
            }
        }
        (Value::Array(arr), RefModifier::ArrayHead) => {
            if arr.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(arr.remove(0))
            }
        }
        (Value::Array(arr), RefModifier::ArrayTail) => Ok(arr.pop().unwrap_or(Value::Null)),
        (Value::Array(arr), RefModifier::ArrayRandom(seed)) => {
            if arr.is_empty() {
                Ok(Value::Null)
            } else {
                let idx = *seed as usize % arr.len();
                Ok(arr.remove(idx))
            }
        }
        (Value::Object(obj), RefModifier::ObjectKey(key)) => {
            Ok(obj.shift_remove(key).unwrap_or(Value::Null))
        }
        (other, m) => Err(subscript_mismatch(m, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::GarbageCollector;
    use crate::runtime::error::ErrorKind;

    fn variable_with(value: Value) -> (GarbageCollector, Reference) {
        let mut gc = GarbageCollector::new([100, 100, 100]);
        let var = gc.create_variable();
        var.initialize(value);
        (gc, Reference::variable(var))
    }

    #[test]
    fn reads_are_lenient_about_missing_slots() {
        let (_gc, mut r) = variable_with(Value::Array(vec![Value::Integer(5)]));
        r.push_modifier(RefModifier::ArrayIndex(7)).unwrap();
        assert_eq!(r.dereference_readonly().unwrap(), Value::Null);
        r.pop_modifier();
        r.push_modifier(RefModifier::ArrayIndex(-1)).unwrap();
        assert_eq!(r.dereference_readonly().unwrap(), Value::Integer(5));
    }

    #[test]
    fn reads_reject_type_mismatches() {
        let (_gc, mut r) = variable_with(Value::Object(Default::default()));
        r.push_modifier(RefModifier::ArrayIndex(1)).unwrap();
        let err = r.dereference_readonly().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn mutable_access_creates_missing_slots() {
        let (_gc, mut r) = variable_with(Value::Null);
        r.push_modifier(RefModifier::ObjectKey(b"a".to_vec())).unwrap();
        r.push_modifier(RefModifier::ArrayIndex(2)).unwrap();
        r.modify_value(|slot| {
            *slot = Value::Integer(9);
            Ok(())
        })
        .unwrap();
        r.pop_modifier();
        r.pop_modifier();
        let whole = r.dereference_readonly().unwrap();
        let obj = whole.as_object().unwrap();
        assert_eq!(
            obj.get(b"a".as_slice()).unwrap(),
            &Value::Array(vec![Value::Null, Value::Null, Value::Integer(9)])
        );
    }

    #[test]
    fn negative_write_index_prepends() {
        let (_gc, mut r) = variable_with(Value::Array(vec![Value::Integer(1)]));
        r.push_modifier(RefModifier::ArrayIndex(-3)).unwrap();
        r.modify_value(|slot| {
            *slot = Value::Integer(0);
            Ok(())
        })
        .unwrap();
        r.pop_modifier();
        assert_eq!(
            r.dereference_readonly().unwrap(),
            Value::Array(vec![Value::Integer(0), Value::Null, Value::Integer(1)])
        );
    }

    #[test]
    fn unset_removes_and_returns_previous() {
        let mut obj = crate::value::Object::default();
        obj.insert(b"k".to_vec(), Value::Integer(3));
        let (_gc, mut r) = variable_with(Value::Object(obj));
        r.push_modifier(RefModifier::ObjectKey(b"k".to_vec())).unwrap();
        assert_eq!(r.dereference_unset().unwrap(), Value::Integer(3));
        assert_eq!(r.dereference_unset().unwrap(), Value::Null);
    }

    #[test]
    fn immutable_variable_refuses_mutation() {
        let (_gc, r) = variable_with(Value::Integer(1));
        match &r.root {
            RefRoot::Variable(var) => var.set_immutable(true),
            _ => unreachable!(),
        }
        let err = r.modify_value(|_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImmutableViolation);
    }

    #[test]
    fn temporaries_are_not_lvalues() {
        let r = Reference::temporary(Value::Integer(1));
        assert_eq!(
            r.modify_value(|_| Ok(())).unwrap_err().kind(),
            ErrorKind::ImmutableViolation
        );
    }

    #[test]
    fn dereference_copy_materializes_a_temporary() {
        let (_gc, mut r) = variable_with(Value::Array(vec![Value::Integer(7)]));
        r.push_modifier(RefModifier::ArrayHead).unwrap();
        assert_eq!(r.dereference_copy().unwrap(), Value::Integer(7));
        assert!(matches!(r.root(), RefRoot::Temporary(_)));
        assert!(r.modifiers().is_empty());
    }

    #[test]
    fn pop_modifier_decays_to_void() {
        let mut r = Reference::temporary(Value::Integer(1));
        r.pop_modifier();
        assert!(r.is_void());
        assert!(r.dereference_readonly().is_err());
    }

    #[test]
    fn unphase_requires_bare_variable_root() {
        let (_gc, mut r) = variable_with(Value::Integer(1));
        assert!(r.unphase_variable_opt().is_some());
        r.push_modifier(RefModifier::ArrayHead).unwrap();
        assert!(r.unphase_variable_opt().is_none());
        assert!(Reference::temporary(Value::Null).unphase_variable_opt().is_none());
    }
}
