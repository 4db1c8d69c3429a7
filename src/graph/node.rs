//! Expression nodes over graph variables

use super::Variable;
use crate::{Error, Result};
use ndarray::Array1;
use std::collections::HashMap;

/// A computed expression over variables.
///
/// Nodes form a small tree evaluated on demand by a [`Session`]. Every
/// elementwise node requires its operands to have matching sizes; `Sum`
/// reduces to a single element.
///
/// [`Session`]: super::Session
#[derive(Clone)]
pub enum Node {
    Var(Variable),
    Add(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Scale(Box<Node>, f32),
    Sum(Box<Node>),
}

impl Node {
    pub fn add(a: Node, b: Node) -> Node {
        Node::Add(Box::new(a), Box::new(b))
    }

    pub fn mul(a: Node, b: Node) -> Node {
        Node::Mul(Box::new(a), Box::new(b))
    }

    pub fn scale(a: Node, factor: f32) -> Node {
        Node::Scale(Box::new(a), factor)
    }

    pub fn sum(a: Node) -> Node {
        Node::Sum(Box::new(a))
    }

    /// Element count this expression evaluates to.
    ///
    /// Fails with [`Error::SizeMismatch`] if any elementwise node has
    /// operands of different sizes. No variable values are read, so this
    /// also validates expressions over uninitialized variables.
    pub fn size(&self) -> Result<usize> {
        match self {
            Node::Var(v) => Ok(v.size()),
            Node::Add(a, b) | Node::Mul(a, b) => {
                let left = a.size()?;
                let right = b.size()?;
                if left != right {
                    return Err(Error::SizeMismatch {
                        name: self.op_name().to_string(),
                        expected: left,
                        got: right,
                    });
                }
                Ok(left)
            }
            Node::Scale(a, _) => a.size(),
            Node::Sum(a) => {
                a.size()?;
                Ok(1)
            }
        }
    }

    fn op_name(&self) -> &'static str {
        match self {
            Node::Var(_) => "var",
            Node::Add(..) => "add",
            Node::Mul(..) => "mul",
            Node::Scale(..) => "scale",
            Node::Sum(_) => "sum",
        }
    }

    pub(crate) fn eval(&self) -> Result<Array1<f32>> {
        self.size()?;
        match self {
            Node::Var(v) => v.read(),
            Node::Add(a, b) => Ok(a.eval()? + b.eval()?),
            Node::Mul(a, b) => Ok(a.eval()? * b.eval()?),
            Node::Scale(a, factor) => Ok(a.eval()? * *factor),
            Node::Sum(a) => {
                let value = a.eval()?;
                Ok(Array1::from_elem(1, value.sum()))
            }
        }
    }

    /// All distinct variables this expression reads, in first-use order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out: Vec<Variable> = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Node::Var(v) => {
                if !out.iter().any(|seen| seen.same_storage(v)) {
                    out.push(v.clone());
                }
            }
            Node::Add(a, b) | Node::Mul(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Node::Scale(a, _) | Node::Sum(a) => a.collect_variables(out),
        }
    }

    /// Reverse-mode gradients of this expression with respect to each
    /// variable it reads, keyed by variable name. The upstream gradient is
    /// seeded with ones.
    pub(crate) fn gradients(&self) -> Result<HashMap<String, Array1<f32>>> {
        let upstream = Array1::ones(self.eval()?.len());
        let mut grads = HashMap::new();
        self.accumulate(&upstream, &mut grads)?;
        Ok(grads)
    }

    fn accumulate(
        &self,
        upstream: &Array1<f32>,
        grads: &mut HashMap<String, Array1<f32>>,
    ) -> Result<()> {
        match self {
            Node::Var(v) => {
                match grads.entry(v.name().to_string()) {
                    std::collections::hash_map::Entry::Occupied(mut e) => {
                        let updated = e.get() + upstream;
                        e.insert(updated);
                    }
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(upstream.clone());
                    }
                }
                Ok(())
            }
            Node::Add(a, b) => {
                a.accumulate(upstream, grads)?;
                b.accumulate(upstream, grads)
            }
            Node::Mul(a, b) => {
                // d(a*b)/da = b, d(a*b)/db = a
                let grad_a = upstream * &b.eval()?;
                let grad_b = upstream * &a.eval()?;
                a.accumulate(&grad_a, grads)?;
                b.accumulate(&grad_b, grads)
            }
            Node::Scale(a, factor) => {
                let grad = upstream * *factor;
                a.accumulate(&grad, grads)
            }
            Node::Sum(a) => {
                let size = a.eval()?.len();
                let grad = Array1::from_elem(size, upstream[0]);
                a.accumulate(&grad, grads)
            }
        }
    }
}

impl From<Variable> for Node {
    fn from(v: Variable) -> Self {
        Node::Var(v)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Var(v) => write!(f, "Var({})", v.name()),
            Node::Add(a, b) => write!(f, "Add({a:?}, {b:?})"),
            Node::Mul(a, b) => write!(f, "Mul({a:?}, {b:?})"),
            Node::Scale(a, factor) => write!(f, "Scale({a:?}, {factor})"),
            Node::Sum(a) => write!(f, "Sum({a:?})"),
        }
    }
}

/// One gradient-descent update of a loss expression's variables.
#[derive(Clone, Debug)]
pub struct TrainStep {
    loss: Node,
    learning_rate: f32,
}

impl TrainStep {
    pub fn new(loss: Node, learning_rate: f32) -> Self {
        Self {
            loss,
            learning_rate,
        }
    }

    pub fn loss(&self) -> &Node {
        &self.loss
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Apply one update: `v -= lr * dL/dv` for every variable in the loss.
    /// Returns the loss value before the update.
    pub(crate) fn apply(&self) -> Result<f32> {
        let loss_value = self.loss.eval()?.sum();
        let grads = self.loss.gradients()?;
        for var in self.loss.variables() {
            if let Some(grad) = grads.get(var.name()) {
                let updated = var.read()? - &(grad * self.learning_rate);
                var.assign(updated)?;
            }
        }
        Ok(loss_value)
    }
}
