//! Named, re-lookupable component factories
//!
//! Recipes must survive process boundaries, so registrations name their
//! factory instead of capturing a closure: a [`FactoryRegistry`] maps names
//! to [`Factory`] implementations, and replaying a recipe looks each one up
//! again in the destination process.

use crate::graph::{Graph, Initializer, Node, TrainStep, Variable};
use crate::registry::{Args, ComponentKind, ComponentObject};
use crate::{Error, Result};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Build-time context handed to factories and component methods.
///
/// The graph already has the `{identifier}/{component}` scope entered, so
/// variables created here receive globally unique hierarchical names.
pub struct BuildContext<'a> {
    graph: &'a Graph,
    component: &'a str,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(graph: &'a Graph, component: &'a str) -> Self {
        Self { graph, component }
    }

    /// Name of the component being registered.
    pub fn component_name(&self) -> &str {
        self.component
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Create a variable under the registration's scope.
    pub fn create_variable(
        &self,
        local: &str,
        size: usize,
        initializer: Initializer,
    ) -> Result<Variable> {
        self.graph.create_variable(local, size, initializer)
    }
}

/// A named constructor for components.
pub trait Factory {
    /// The name recipes refer to this factory by.
    fn name(&self) -> &str;

    /// Build a component from resolved arguments.
    fn build(&self, ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind>;
}

/// A table of factories, shared by a registry and every replay of its
/// recipes.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn Factory>>,
}

impl FactoryRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in factories: `variable`, `add`,
    /// `mul`, `scale`, `sum`, and `sgd`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(VariableFactory))
            .register(Arc::new(AddFactory))
            .register(Arc::new(MulFactory))
            .register(Arc::new(ScaleFactory))
            .register(Arc::new(SumFactory))
            .register(Arc::new(SgdFactory));
        registry
    }

    /// Register a factory under its own name. A factory registered under an
    /// existing name replaces the previous one.
    pub fn register(&mut self, factory: Arc<dyn Factory>) -> &mut Self {
        self.factories.insert(factory.name().to_string(), factory);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Factory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFactory(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FactoryRegistry")
            .field("factories", &names)
            .finish()
    }
}

/// `variable`: create one persistable variable.
///
/// Keyword arguments: `shape` (integer list; the variable is flat, so the
/// product of the entries is its size) or `size` (integer); optionally
/// `init` (`"zeros"`, `"ones"`, `"uniform"`), `value` (constant fill), and
/// `name` (local name, defaults to the component name).
struct VariableFactory;

impl Factory for VariableFactory {
    fn name(&self) -> &str {
        "variable"
    }

    fn build(&self, ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let size = match (args.ints_kw("shape")?, args.int_kw("size")?) {
            (Some(shape), _) => shape.iter().product::<i64>(),
            (None, Some(size)) => size,
            (None, None) => {
                return Err(Error::InvalidArgument(
                    "variable requires a shape or size".to_string(),
                ))
            }
        };
        if size <= 0 {
            return Err(Error::InvalidArgument(format!(
                "variable size must be positive, got {size}"
            )));
        }

        let initializer = match (args.str_kw("init")?, args.float_kw("value")?) {
            (_, Some(value)) => Initializer::Constant(value as f32),
            (Some("zeros") | None, None) => Initializer::Zeros,
            (Some("ones"), None) => Initializer::Ones,
            (Some("uniform"), None) => {
                let low = args.float_kw("low")?.unwrap_or(-1.0) as f32;
                let high = args.float_kw("high")?.unwrap_or(1.0) as f32;
                if low >= high {
                    return Err(Error::InvalidArgument(format!(
                        "uniform range is empty: low {low}, high {high}"
                    )));
                }
                Initializer::RandomUniform { low, high }
            }
            (Some(other), None) => {
                return Err(Error::InvalidArgument(format!(
                    "unknown initializer {other:?}"
                )))
            }
        };

        let local = args.str_kw("name")?.unwrap_or(ctx.component_name());
        let var = ctx.create_variable(local, size as usize, initializer)?;
        Ok(ComponentKind::Var(var))
    }
}

/// `add`: elementwise sum of two expressions.
struct AddFactory;

impl Factory for AddFactory {
    fn name(&self) -> &str {
        "add"
    }

    fn build(&self, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let node = Node::add(args.node_at(0)?, args.node_at(1)?);
        node.size()?;
        Ok(ComponentKind::Op(node))
    }
}

/// `mul`: elementwise product of two expressions.
struct MulFactory;

impl Factory for MulFactory {
    fn name(&self) -> &str {
        "mul"
    }

    fn build(&self, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let node = Node::mul(args.node_at(0)?, args.node_at(1)?);
        node.size()?;
        Ok(ComponentKind::Op(node))
    }
}

/// `scale`: multiply an expression by a scalar `factor`.
struct ScaleFactory;

impl Factory for ScaleFactory {
    fn name(&self) -> &str {
        "scale"
    }

    fn build(&self, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let factor = args
            .float_kw("factor")?
            .ok_or_else(|| Error::InvalidArgument("scale requires a factor".to_string()))?;
        Ok(ComponentKind::Op(Node::scale(
            args.node_at(0)?,
            factor as f32,
        )))
    }
}

/// `sum`: reduce an expression to a single element.
struct SumFactory;

impl Factory for SumFactory {
    fn name(&self) -> &str {
        "sum"
    }

    fn build(&self, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        Ok(ComponentKind::Op(Node::sum(args.node_at(0)?)))
    }
}

/// `sgd`: a gradient-descent optimizer exposing `minimize`.
struct SgdFactory;

impl Factory for SgdFactory {
    fn name(&self) -> &str {
        "sgd"
    }

    fn build(&self, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        let learning_rate = args.float_kw("lr")?.unwrap_or(0.01) as f32;
        Ok(ComponentKind::Object(Rc::new(GradientDescent {
            learning_rate,
        })))
    }
}

/// Gradient-descent optimizer component.
///
/// `minimize(loss)` binds a loss expression into a [`TrainStep`] that updates
/// every variable the loss reads.
pub struct GradientDescent {
    learning_rate: f32,
}

impl ComponentObject for GradientDescent {
    fn type_name(&self) -> &str {
        "sgd"
    }

    fn methods(&self) -> &[&str] {
        &["minimize"]
    }

    fn invoke(&self, method: &str, _ctx: &BuildContext<'_>, args: &Args) -> Result<ComponentKind> {
        match method {
            "minimize" => {
                let loss = args.node_at(0)?;
                Ok(ComponentKind::Step(TrainStep::new(
                    loss,
                    self.learning_rate,
                )))
            }
            other => Err(Error::UnresolvableReference(format!("sgd.{other}"))),
        }
    }
}
