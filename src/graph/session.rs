//! Execution session

use super::{Node, TrainStep, Variable};
use crate::Result;
use ndarray::Array1;

/// An execution session over a graph's variables.
///
/// A session is the handle through which variables are initialized and
/// expressions evaluated. One is acquired for the lifetime of each
/// [`SessionScope`](crate::SessionScope).
#[derive(Debug)]
pub struct Session {
    _private: (),
}

impl Session {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Initialize every listed variable from its initializer, unconditionally.
    pub fn initialize(&self, variables: &[Variable]) {
        for var in variables {
            var.initialize();
        }
    }

    /// Evaluate an expression.
    pub fn eval(&self, node: &Node) -> Result<Array1<f32>> {
        node.eval()
    }

    /// Read a variable's current value.
    pub fn read(&self, var: &Variable) -> Result<Array1<f32>> {
        var.read()
    }

    /// Assign a value to a variable.
    pub fn assign(&self, var: &Variable, value: Array1<f32>) -> Result<()> {
        var.assign(value)
    }

    /// Run one training step. Returns the loss before the update.
    pub fn run(&self, step: &TrainStep) -> Result<f32> {
        step.apply()
    }
}
