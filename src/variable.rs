//! Mutable, collector-tracked value cells.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::value::Value;

pub type VarPtr = Rc<Variable>;

/// A heap cell holding a value. Variables are created only through the
/// garbage collector's factory so that every cell is tracked, and destroyed
/// only by the collector (or by the final handle drop after untracking).
#[derive(Debug)]
pub struct Variable {
    value: RefCell<Value>,
    immutable: Cell<bool>,
    initialized: Cell<bool>,
    gc_ref: Cell<i64>,
}

impl Variable {
    pub(crate) fn new_untracked() -> VarPtr {
        Rc::new(Self {
            value: RefCell::new(Value::Null),
            immutable: Cell::new(false),
            initialized: Cell::new(false),
            gc_ref: Cell::new(0),
        })
    }

    pub fn initialize(&self, value: Value) {
        *self.value.borrow_mut() = value;
        self.initialized.set(true);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn set_immutable(&self, immutable: bool) {
        self.immutable.set(immutable);
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable.get()
    }

    pub fn value(&self) -> Ref<'_, Value> {
        self.value.borrow()
    }

    pub fn value_mut(&self) -> RefMut<'_, Value> {
        self.value.borrow_mut()
    }

    /// Overwrite the value with a scalar sentinel, breaking any reference
    /// cycles before the cell itself is dropped.
    pub(crate) fn wipe(&self, sentinel: Value) {
        *self.value.borrow_mut() = sentinel;
        self.initialized.set(false);
        self.immutable.set(false);
    }

    pub(crate) fn gc_ref(&self) -> i64 {
        self.gc_ref.get()
    }

    pub(crate) fn reset_gc_ref(&self, value: i64) {
        self.gc_ref.set(value);
    }

    pub(crate) fn add_gc_ref(&self, delta: i64) {
        self.gc_ref.set(self.gc_ref.get() + delta);
    }
}
