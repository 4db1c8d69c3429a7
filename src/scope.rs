//! Scoped training sessions
//!
//! A [`SessionScope`] bounds the lifetime of one execution session: opening
//! it initializes every owned variable and loads the last snapshot; closing
//! it (explicitly or on drop) saves the current values. A registry admits at
//! most one open scope at a time, and a closed scope is terminal: re-entry
//! means opening a fresh scope.

use crate::graph::{Node, Session, TrainStep, Variable};
use crate::registry::Registry;
use crate::snapshot::{LoadReport, SaveReport};
use crate::{Error, Result};
use ndarray::Array1;

enum ScopeState {
    Open,
    Closed,
}

/// An open session over a registry's variables.
///
/// # Example
///
/// ```no_run
/// use crucero::{Args, FactoryRegistry, Registry};
///
/// let mut registry = Registry::new("model.safetensors", FactoryRegistry::standard())?;
/// registry.add("w", "variable", Args::new().kw("shape", vec![3i64]))?;
///
/// let scope = registry.open_session()?;
/// let w = registry.component("w").unwrap().as_node().unwrap();
/// let value = scope.eval(&w)?;
/// scope.close()?; // saves the snapshot
/// # Ok::<(), crucero::Error>(())
/// ```
pub struct SessionScope<'r> {
    registry: &'r Registry,
    session: Session,
    entry_report: LoadReport,
    state: ScopeState,
}

impl Registry {
    /// Open a session scope: acquire a session, initialize all owned
    /// variables from their initializers, then load the snapshot over them.
    ///
    /// Fails with [`Error::InvalidState`] if a scope is already open on this
    /// registry. Entry failures leave the registry unopened.
    pub fn open_session(&self) -> Result<SessionScope<'_>> {
        if self.scope_is_open() {
            return Err(Error::InvalidState(
                "a session scope is already open on this registry".to_string(),
            ));
        }
        self.set_scope_open(true);
        let session = Session::new();
        session.initialize(self.owned_variables());
        let entry_report = match self.load() {
            Ok(report) => report,
            Err(err) => {
                self.set_scope_open(false);
                return Err(err);
            }
        };
        Ok(SessionScope {
            registry: self,
            session,
            entry_report,
            state: ScopeState::Open,
        })
    }
}

impl<'r> SessionScope<'r> {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// What the entry-time load restored, skipped, or failed.
    pub fn load_report(&self) -> &LoadReport {
        &self.entry_report
    }

    /// Evaluate an expression in this session.
    pub fn eval(&self, node: &Node) -> Result<Array1<f32>> {
        self.session.eval(node)
    }

    /// Read a variable's current value.
    pub fn read(&self, var: &Variable) -> Result<Array1<f32>> {
        self.session.read(var)
    }

    /// Assign a value to a variable.
    pub fn assign(&self, var: &Variable, value: Array1<f32>) -> Result<()> {
        self.session.assign(var, value)
    }

    /// Run one training step. Returns the loss before the update.
    pub fn run(&self, step: &TrainStep) -> Result<f32> {
        self.session.run(step)
    }

    /// Save the snapshot and release the session.
    pub fn close(mut self) -> Result<SaveReport> {
        self.state = ScopeState::Closed;
        self.registry.set_scope_open(false);
        self.registry.save()
    }
}

impl std::fmt::Debug for SessionScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionScope")
            .field("registry", &self.registry.identifier())
            .field("closed", &matches!(self.state, ScopeState::Closed))
            .finish()
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        if matches!(self.state, ScopeState::Open) {
            self.registry.set_scope_open(false);
            // Exit always saves, including on unwind. Drop cannot surface the
            // error, so it is logged; call `close` to observe it.
            if let Err(err) = self.registry.save() {
                tracing::warn!(error = %err, "snapshot save on scope exit failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FactoryRegistry;
    use crate::registry::Args;
    use tempfile::tempdir;

    fn registry_at(path: &std::path::Path) -> Registry {
        let mut registry = Registry::new(path, FactoryRegistry::standard()).unwrap();
        registry
            .add("w", "variable", Args::new().kw("shape", vec![2i64]))
            .unwrap();
        registry
    }

    #[test]
    fn open_initializes_owned_variables() {
        let dir = tempdir().unwrap();
        let registry = registry_at(&dir.path().join("model.safetensors"));
        assert!(!registry.variable("w/w").unwrap().is_initialized());

        let scope = registry.open_session().unwrap();
        assert!(registry.variable("w/w").unwrap().is_initialized());
        assert!(scope.load_report().missing_file);
    }

    #[test]
    fn second_open_fails_fast() {
        let dir = tempdir().unwrap();
        let registry = registry_at(&dir.path().join("model.safetensors"));

        let _scope = registry.open_session().unwrap();
        let err = registry.open_session().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn scope_is_reopenable_after_close() {
        let dir = tempdir().unwrap();
        let registry = registry_at(&dir.path().join("model.safetensors"));

        let scope = registry.open_session().unwrap();
        scope.close().unwrap();
        let scope = registry.open_session().unwrap();
        assert!(!scope.load_report().missing_file);
    }

    #[test]
    fn close_saves_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let registry = registry_at(&path);

        let scope = registry.open_session().unwrap();
        let report = scope.close().unwrap();
        assert_eq!(report.written, 1);
        assert!(path.exists());
    }

    #[test]
    fn drop_saves_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let registry = registry_at(&path);

        {
            let _scope = registry.open_session().unwrap();
        }
        assert!(path.exists());
    }

    #[test]
    fn entry_restores_saved_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let registry = registry_at(&path);

        let scope = registry.open_session().unwrap();
        let w = registry.variable("w/w").unwrap();
        scope
            .assign(&w, ndarray::Array1::from_vec(vec![4.0, 5.0]))
            .unwrap();
        scope.close().unwrap();

        // Re-entry initializes to zeros, then the load restores the save.
        let scope = registry.open_session().unwrap();
        assert_eq!(scope.load_report().restored, 1);
        assert_eq!(
            scope.read(&w).unwrap(),
            ndarray::Array1::from_vec(vec![4.0, 5.0])
        );
    }
}
