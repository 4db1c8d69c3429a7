//! Registered components and their method descriptors

use super::args::Args;
use crate::factory::BuildContext;
use crate::graph::{Node, TrainStep, Variable};
use crate::{Error, Result};
use std::rc::Rc;

/// The kinds of object a registration can produce.
///
/// Replaces attribute-style duck typing with a tagged variant: lookups return
/// a typed handle, and objects that expose further operations declare them in
/// an explicit method table.
#[derive(Clone)]
pub enum ComponentKind {
    /// A single persistable variable.
    Var(Variable),
    /// A computed expression.
    Op(Node),
    /// An opaque object exposing named methods (e.g. an optimizer).
    Object(Rc<dyn ComponentObject>),
    /// A runnable training step.
    Step(TrainStep),
}

/// An object registered as a component that exposes callable methods.
///
/// Implementors declare their methods up front so that bound-method
/// sanitization is a table lookup rather than a reflective scan.
pub trait ComponentObject {
    fn type_name(&self) -> &str;

    /// Names of the methods this object exposes.
    fn methods(&self) -> &[&str];

    /// Invoke a declared method. `ctx` carries the scoped graph of the
    /// registration being built.
    fn invoke(&self, method: &str, ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind>;
}

/// A named component owned by a registry.
#[derive(Clone)]
pub struct Component {
    name: String,
    kind: ComponentKind,
}

impl Component {
    pub(crate) fn new(name: String, kind: ComponentKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// The underlying variable, if this component is one.
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            ComponentKind::Var(v) => Some(v),
            _ => None,
        }
    }

    /// View this component as an expression, if it evaluates to one.
    pub fn as_node(&self) -> Option<Node> {
        match &self.kind {
            ComponentKind::Var(v) => Some(Node::Var(v.clone())),
            ComponentKind::Op(node) => Some(node.clone()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Rc<dyn ComponentObject>> {
        match &self.kind {
            ComponentKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_step(&self) -> Option<&TrainStep> {
        match &self.kind {
            ComponentKind::Step(step) => Some(step),
            _ => None,
        }
    }

    /// Bind one of this component's declared methods.
    pub fn method(&self, method: &str) -> Result<BoundMethod> {
        match &self.kind {
            ComponentKind::Object(obj) if obj.methods().contains(&method) => Ok(BoundMethod {
                owner: self.clone(),
                method: method.to_string(),
            }),
            _ => Err(Error::UnresolvableReference(format!(
                "{}.{}",
                self.name, method
            ))),
        }
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            ComponentKind::Var(v) => format!("Var({})", v.name()),
            ComponentKind::Op(_) => "Op".to_string(),
            ComponentKind::Object(obj) => format!("Object({})", obj.type_name()),
            ComponentKind::Step(_) => "Step".to_string(),
        };
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// A method bound to the component that owns it.
#[derive(Clone, Debug)]
pub struct BoundMethod {
    owner: Component,
    method: String,
}

impl BoundMethod {
    pub fn owner(&self) -> &Component {
        &self.owner
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn invoke(&self, ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let obj = self.owner.as_object().ok_or_else(|| {
            Error::UnresolvableReference(format!("{}.{}", self.owner.name(), self.method))
        })?;
        obj.invoke(&self.method, ctx, args)
    }
}
