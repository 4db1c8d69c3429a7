//! Graph variables with shared value storage

use crate::{Error, Result};
use ndarray::Array1;
use rand::Rng;
use std::cell::RefCell;
use std::rc::Rc;

/// How a variable obtains its value when a session initializes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initializer {
    Zeros,
    Ones,
    Constant(f32),
    RandomUniform { low: f32, high: f32 },
}

impl Initializer {
    /// Produce an initial value of the given size.
    pub fn materialize(&self, size: usize) -> Array1<f32> {
        match self {
            Initializer::Zeros => Array1::zeros(size),
            Initializer::Ones => Array1::ones(size),
            Initializer::Constant(c) => Array1::from_elem(size, *c),
            Initializer::RandomUniform { low, high } => {
                let mut rng = rand::thread_rng();
                Array1::from_iter((0..size).map(|_| rng.gen_range(*low..*high)))
            }
        }
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Initializer::Zeros
    }
}

/// A named, persistable variable in a computation graph.
///
/// Variables are shared handles: cloning a `Variable` clones the handle, not
/// the storage, so an assignment through one handle is visible through every
/// other handle to the same variable. A value of `None` means the variable
/// has not been initialized yet.
#[derive(Clone)]
pub struct Variable {
    name: String,
    size: usize,
    initializer: Initializer,
    value: Rc<RefCell<Option<Array1<f32>>>>,
}

impl Variable {
    pub(crate) fn new(name: String, size: usize, initializer: Initializer) -> Self {
        Self {
            name,
            size,
            initializer,
            value: Rc::new(RefCell::new(None)),
        }
    }

    /// Full hierarchical name, e.g. `"abc123/w/w"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn initializer(&self) -> Initializer {
        self.initializer
    }

    /// Whether a value has been assigned or initialized.
    pub fn is_initialized(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Read the current value.
    pub fn read(&self) -> Result<Array1<f32>> {
        self.value
            .borrow()
            .clone()
            .ok_or_else(|| Error::Uninitialized(self.name.clone()))
    }

    /// Assign a new value. The value must match the variable's size.
    pub fn assign(&self, value: Array1<f32>) -> Result<()> {
        if value.len() != self.size {
            return Err(Error::SizeMismatch {
                name: self.name.clone(),
                expected: self.size,
                got: value.len(),
            });
        }
        *self.value.borrow_mut() = Some(value);
        Ok(())
    }

    /// Reset the value from the variable's initializer.
    pub fn initialize(&self) {
        *self.value.borrow_mut() = Some(self.initializer.materialize(self.size));
    }

    /// Identity comparison: true when both handles share the same storage.
    pub fn same_storage(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
