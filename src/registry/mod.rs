//! The stateful registration-and-persistence core
//!
//! A [`Registry`] maps declared component names to constructed objects,
//! tracks the graph variables each registration creates, and keeps an
//! append-only construction recipe so the whole object graph can be rebuilt
//! in a fresh process. Persistence of variable values lives in
//! [`snapshot`](crate::snapshot); session lifetimes in
//! [`scope`](crate::scope).

mod args;
mod component;
mod sanitize;


pub use args::{Arg, Args, Literal};
pub use component::{BoundMethod, Component, ComponentKind, ComponentObject};
pub use sanitize::{CallToken, Token};

use crate::factory::{BuildContext, FactoryRegistry};
use crate::graph::{Graph, Initializer, Variable};
use crate::recipe::RecipeEntry;
use crate::{Error, Result};
use sanitize::ResolvedCall;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What to invoke for a registration: a named factory, or a bound method of
/// a previously registered component.
#[derive(Clone, Debug)]
pub enum Call {
    Factory(String),
    Method(BoundMethod),
}

impl From<&str> for Call {
    fn from(name: &str) -> Self {
        Call::Factory(name.to_string())
    }
}

impl From<String> for Call {
    fn from(name: String) -> Self {
        Call::Factory(name)
    }
}

impl From<BoundMethod> for Call {
    fn from(method: BoundMethod) -> Self {
        Call::Method(method)
    }
}

/// Registers named components, tracks the variables they create, and records
/// the recipe needed to rebuild them.
///
/// # Example
///
/// ```
/// use crucero::{Args, FactoryRegistry, Registry};
///
/// let mut registry = Registry::new("model.safetensors", FactoryRegistry::standard()).unwrap();
/// registry
///     .add("w", "variable", Args::new().kw("shape", vec![3i64]))
///     .unwrap();
/// assert_eq!(registry.last_added().unwrap().name(), "w");
/// ```
pub struct Registry {
    identifier: String,
    snapshot_path: PathBuf,
    graph: Graph,
    factories: FactoryRegistry,
    components: HashMap<String, Component>,
    /// Owned variables in creation order, deduplicated by name.
    owned: Vec<Variable>,
    owned_names: HashSet<String>,
    /// Append-only construction log, one entry per successful `add`.
    recipe: Vec<RecipeEntry>,
    scope_open: Cell<bool>,
}

impl Registry {
    /// Create a registry with a generated identifier and a fresh graph.
    pub fn new(snapshot_path: impl Into<PathBuf>, factories: FactoryRegistry) -> Result<Self> {
        let identifier = Uuid::new_v4().simple().to_string();
        Self::build(snapshot_path.into(), identifier, factories, Graph::new())
    }

    /// Create a registry with a caller-supplied identifier.
    pub fn with_identifier(
        snapshot_path: impl Into<PathBuf>,
        identifier: impl Into<String>,
        factories: FactoryRegistry,
    ) -> Result<Self> {
        Self::build(
            snapshot_path.into(),
            identifier.into(),
            factories,
            Graph::new(),
        )
    }

    /// Create a registry inside an existing graph. Identifier collisions with
    /// other registries in the same graph fail fast.
    pub fn with_graph(
        snapshot_path: impl Into<PathBuf>,
        identifier: impl Into<String>,
        factories: FactoryRegistry,
        graph: Graph,
    ) -> Result<Self> {
        Self::build(snapshot_path.into(), identifier.into(), factories, graph)
    }

    fn build(
        snapshot_path: PathBuf,
        identifier: String,
        factories: FactoryRegistry,
        graph: Graph,
    ) -> Result<Self> {
        if identifier.is_empty() || identifier.contains('/') {
            return Err(Error::InvalidIdentifier(identifier));
        }
        // Self-check variable: its name is unique per identifier, so a
        // collision here means another registry already claimed this
        // namespace in the shared graph.
        {
            let _id = graph.enter_scope(&identifier);
            let _id_again = graph.enter_scope(&identifier);
            graph
                .create_variable("initialized", 1, Initializer::Zeros)
                .map_err(|_| Error::InvalidIdentifier(identifier.clone()))?;
        }
        Ok(Self {
            identifier,
            snapshot_path,
            graph,
            factories,
            components: HashMap::new(),
            owned: Vec::new(),
            owned_names: HashSet::new(),
            recipe: Vec::new(),
            scope_open: Cell::new(false),
        })
    }

    /// Register a component under `name` by invoking `call` with `args`.
    ///
    /// Arguments may be literals, variables owned by this registry, handles
    /// to previously registered components, or bound methods of those
    /// components. Anything else fails sanitization before the registry is
    /// touched; a failing invocation rolls back every variable it created.
    /// Returns `&mut Self` for chaining.
    pub fn add(&mut self, name: &str, call: impl Into<Call>, args: Args) -> Result<&mut Self> {
        let call = call.into();
        self.check_name(name)?;
        let call_token = self.sanitize_call(&call)?;
        let arg_tokens: Vec<Token> = args
            .positional()
            .iter()
            .map(|arg| self.sanitize(arg))
            .collect::<Result<_>>()?;
        let kwarg_tokens: BTreeMap<String, Token> = args
            .keywords()
            .iter()
            .map(|(key, arg)| Ok((key.clone(), self.sanitize(arg)?)))
            .collect::<Result<_>>()?;
        self.add_entry(RecipeEntry {
            name: name.to_string(),
            call: call_token,
            args: arg_tokens,
            kwargs: kwarg_tokens,
        })?;
        Ok(self)
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "{name:?} is not a valid component name"
            )));
        }
        if self.components.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Run one recipe entry: resolve its tokens, invoke inside the two-level
    /// `{identifier}/{name}` scope, diff the variable table, and append to
    /// the log. All-or-nothing. This is the shared path for `add` and replay.
    pub(crate) fn add_entry(&mut self, entry: RecipeEntry) -> Result<()> {
        self.check_name(&entry.name)?;
        let resolved_call = self.unsanitize_call(&entry.call)?;
        let positional = entry
            .args
            .iter()
            .map(|token| self.unsanitize(token))
            .collect::<Result<Vec<_>>>()?;
        let keyword = entry
            .kwargs
            .iter()
            .map(|(key, token)| Ok((key.clone(), self.unsanitize(token)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let args = Args::from_parts(positional, keyword);

        let before = self.graph.variable_names();
        let built = {
            let _id_scope = self.graph.enter_scope(&self.identifier);
            let _name_scope = self.graph.enter_scope(&entry.name);
            let ctx = BuildContext::new(&self.graph, &entry.name);
            match &resolved_call {
                ResolvedCall::Factory(factory) => factory.build(&ctx, &args),
                ResolvedCall::Method(method) => method.invoke(&ctx, &args),
            }
        };
        let kind = match built {
            Ok(kind) => kind,
            Err(err) => {
                let after = self.graph.variable_names();
                let created: HashSet<String> = after.difference(&before).cloned().collect();
                self.graph.remove_variables(&created);
                return Err(err);
            }
        };

        for var in self.graph.all_variables() {
            if !before.contains(var.name()) && !self.owned_names.contains(var.name()) {
                self.owned_names.insert(var.name().to_string());
                self.owned.push(var);
            }
        }
        self.components.insert(
            entry.name.clone(),
            Component::new(entry.name.clone(), kind),
        );
        self.recipe.push(entry);
        Ok(())
    }

    /// The most recently added component, or `None` if nothing has been
    /// added yet.
    pub fn last_added(&self) -> Option<&Component> {
        let entry = self.recipe.last()?;
        self.components.get(&entry.name)
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Component names in registration order.
    pub fn component_names(&self) -> Vec<&str> {
        self.recipe.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Bind a method of a registered component, e.g.
    /// `registry.method("optimizer", "minimize")`.
    pub fn method(&self, component: &str, method: &str) -> Result<BoundMethod> {
        let component = self
            .components
            .get(component)
            .ok_or_else(|| Error::UnresolvableReference(component.to_string()))?;
        component.method(method)
    }

    /// Look up an owned variable by its identifier-relative path.
    pub fn variable(&self, relative: &str) -> Option<Variable> {
        self.graph
            .variable(&format!("{}/{}", self.identifier, relative))
    }

    /// Variables this registry owns, in creation order.
    pub fn owned_variables(&self) -> &[Variable] {
        &self.owned
    }

    /// Identifier-relative names of owned variables, in creation order.
    pub fn owned_variable_names(&self) -> Vec<String> {
        self.owned
            .iter()
            .filter_map(|var| self.relative_name(var.name()).map(str::to_string))
            .collect()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Point subsequent saves and loads at a different snapshot file.
    pub fn set_snapshot_path(&mut self, path: impl Into<PathBuf>) {
        self.snapshot_path = path.into();
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub(crate) fn recipe_entries(&self) -> &[RecipeEntry] {
        &self.recipe
    }

    /// Strip the identifier segment from a full variable name.
    pub(crate) fn relative_name<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.identifier.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    pub(crate) fn scope_is_open(&self) -> bool {
        self.scope_open.get()
    }

    pub(crate) fn set_scope_open(&self, open: bool) {
        self.scope_open.set(open);
    }

    fn sanitize_call(&self, call: &Call) -> Result<CallToken> {
        match call {
            Call::Factory(name) => {
                // Fail before any mutation if the factory is unknown.
                self.factories.get(name)?;
                Ok(CallToken::Factory(name.clone()))
            }
            Call::Method(method) => {
                if self.components.contains_key(method.owner().name()) {
                    Ok(CallToken::Method {
                        owner: method.owner().name().to_string(),
                        method: method.method().to_string(),
                    })
                } else {
                    Err(Error::Sanitize(format!(
                        "bound method {}.{}",
                        method.owner().name(),
                        method.method()
                    )))
                }
            }
        }
    }

    fn unsanitize_call(&self, token: &CallToken) -> Result<ResolvedCall> {
        match token {
            CallToken::Factory(name) => Ok(ResolvedCall::Factory(self.factories.get(name)?)),
            CallToken::Method { owner, method } => {
                let component = self
                    .components
                    .get(owner)
                    .ok_or_else(|| Error::UnresolvableReference(owner.clone()))?;
                Ok(ResolvedCall::Method(component.method(method)?))
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("identifier", &self.identifier)
            .field("snapshot_path", &self.snapshot_path)
            .field("components", &self.recipe.len())
            .field("owned_variables", &self.owned.len())
            .finish()
    }
}
