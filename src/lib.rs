//! # Crucero: session lifecycle & variable persistence for computation graphs
//!
//! Crucero lets you declaratively register named sub-computations on a
//! computation graph, tracks which variables each registration creates, and
//! transparently saves/restores those variables' values across process runs
//! by wrapping a training session as a scoped resource.
//!
//! ## Architecture
//!
//! - **graph**: minimal computation-graph substrate (variables, expression
//!   nodes, execution sessions)
//! - **registry**: the stateful core: name-to-component table, owned-variable
//!   tracking, construction recipe log, reference sanitization
//! - **factory**: named, re-lookupable component factories
//! - **recipe**: versioned recipe serialization and replay
//! - **snapshot**: SafeTensors persistence of variable values with
//!   per-item failure reporting
//! - **scope**: session scopes with auto-initialize/load on entry and
//!   auto-save on exit
//! - **config**: declarative YAML/JSON registry configuration
//!
//! ## Example
//!
//! ```no_run
//! use crucero::{Args, FactoryRegistry, Registry};
//!
//! let mut registry = Registry::new("model.safetensors", FactoryRegistry::standard())?;
//! registry
//!     .add("w", "variable", Args::new().kw("shape", vec![3i64]))?
//!     .add("b", "variable", Args::new().kw("shape", vec![3i64]))?;
//! let w = registry.component("w").unwrap().clone();
//! let b = registry.component("b").unwrap().clone();
//! registry.add("y", "add", Args::new().with(&w).with(&b))?;
//!
//! // Entering the scope initializes variables and loads the last snapshot;
//! // dropping (or closing) it saves the current values.
//! let scope = registry.open_session()?;
//! let y = registry.component("y").unwrap().as_node().unwrap();
//! println!("{:?}", scope.eval(&y)?);
//! scope.close()?;
//! # Ok::<(), crucero::Error>(())
//! ```

pub mod config;
pub mod factory;
pub mod graph;
pub mod recipe;
pub mod registry;
pub mod scope;
pub mod snapshot;

pub mod error;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use factory::{BuildContext, Factory, FactoryRegistry};
pub use graph::{Graph, Initializer, Node, Session, TrainStep, Variable};
pub use recipe::{Recipe, RecipeEntry, RecipeFormat};
pub use registry::{
    Arg, Args, BoundMethod, Call, CallToken, Component, ComponentKind, ComponentObject, Literal,
    Registry, Token,
};
pub use scope::SessionScope;
pub use snapshot::{LoadReport, SaveReport, SkipReason};
