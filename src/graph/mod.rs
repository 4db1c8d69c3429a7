//! Minimal computation-graph substrate
//!
//! Provides the graph capabilities the registry coordinates: scoped variable
//! creation, name introspection, initialization tracking, a queryable table
//! of all known variables, and an execution session.

mod node;
mod session;
mod variable;


pub use node::{Node, TrainStep};
pub use session::Session;
pub use variable::{Initializer, Variable};

use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

struct GraphInner {
    /// Insertion-ordered variable table.
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    /// Active name-scope segments, outermost first.
    scope: Vec<String>,
}

/// A computation graph: an ordered table of named variables plus a name-scope
/// stack.
///
/// `Graph` is a shared handle; clones refer to the same underlying graph.
/// Two registries may share one graph, in which case their identifiers must
/// not collide.
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(GraphInner {
                variables: Vec::new(),
                index: HashMap::new(),
                scope: Vec::new(),
            })),
        }
    }

    /// Enter a name scope. The scope is popped when the guard drops.
    pub fn enter_scope(&self, segment: &str) -> ScopeGuard {
        self.inner.borrow_mut().scope.push(segment.to_string());
        ScopeGuard {
            graph: self.clone(),
        }
    }

    /// The full name `local` would receive under the current scope.
    pub fn scoped_name(&self, local: &str) -> String {
        let inner = self.inner.borrow();
        if inner.scope.is_empty() {
            local.to_string()
        } else {
            format!("{}/{}", inner.scope.join("/"), local)
        }
    }

    /// Create a variable named `local` under the current scope.
    ///
    /// Fails with [`Error::VariableExists`] if the scoped name is taken.
    pub fn create_variable(
        &self,
        local: &str,
        size: usize,
        initializer: Initializer,
    ) -> Result<Variable> {
        let name = self.scoped_name(local);
        let mut inner = self.inner.borrow_mut();
        if inner.index.contains_key(&name) {
            return Err(Error::VariableExists(name));
        }
        let var = Variable::new(name.clone(), size, initializer);
        inner.variables.push(var.clone());
        let idx = inner.variables.len() - 1;
        inner.index.insert(name, idx);
        Ok(var)
    }

    /// Look up a variable by its full name.
    pub fn variable(&self, full_name: &str) -> Option<Variable> {
        let inner = self.inner.borrow();
        inner
            .index
            .get(full_name)
            .map(|&idx| inner.variables[idx].clone())
    }

    /// All variables, in creation order.
    pub fn all_variables(&self) -> Vec<Variable> {
        self.inner.borrow().variables.clone()
    }

    /// The set of all variable names, for before/after diffing.
    pub fn variable_names(&self) -> HashSet<String> {
        self.inner.borrow().index.keys().cloned().collect()
    }

    /// Remove the named variables from the table. Used to roll back a failed
    /// registration; handles already held by callers keep working but the
    /// names become available again.
    pub(crate) fn remove_variables(&self, names: &HashSet<String>) {
        let mut inner = self.inner.borrow_mut();
        inner.variables.retain(|v| !names.contains(v.name()));
        let rebuilt: HashMap<String, usize> = inner
            .variables
            .iter()
            .enumerate()
            .map(|(idx, v)| (v.name().to_string(), idx))
            .collect();
        inner.index = rebuilt;
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Graph")
            .field("variables", &inner.variables.len())
            .field("scope", &inner.scope)
            .finish()
    }
}

/// Pops one scope segment on drop.
pub struct ScopeGuard {
    graph: Graph,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.graph.inner.borrow_mut().scope.pop();
    }
}
