//! End-to-end scenarios: build, train, persist, rebuild.

use approx::assert_abs_diff_eq;
use crucero::{Args, FactoryRegistry, Registry};
use ndarray::Array1;
use tempfile::tempdir;

/// w + b: scope entry initializes both, the op evaluates to their
/// elementwise sum, and a rebuilt registry restores the saved values.
#[test]
fn elementwise_sum_persists_across_instances() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    let mut registry = Registry::new(&path, FactoryRegistry::standard()).unwrap();
    registry
        .add("w", "variable", Args::new().kw("shape", vec![3i64]).kw("value", 2.0))
        .unwrap()
        .add("b", "variable", Args::new().kw("shape", vec![3i64]).kw("value", 0.5))
        .unwrap();
    let w = registry.component("w").unwrap().clone();
    let b = registry.component("b").unwrap().clone();
    registry
        .add("y", "add", Args::new().with(&w).with(&b))
        .unwrap();

    {
        let scope = registry.open_session().unwrap();
        let y = registry.component("y").unwrap().as_node().unwrap();
        assert_eq!(
            scope.eval(&y).unwrap(),
            Array1::from_vec(vec![2.5, 2.5, 2.5])
        );

        // Nudge the values so the restore is observable.
        let w = registry.variable("w/w").unwrap();
        scope
            .assign(&w, Array1::from_vec(vec![10.0, 20.0, 30.0]))
            .unwrap();
        scope.close().unwrap();
    }

    // A different instance with the same two variable adds (but not the op)
    // restores w and b exactly.
    let mut rebuilt = Registry::new(&path, FactoryRegistry::standard()).unwrap();
    rebuilt
        .add("w", "variable", Args::new().kw("shape", vec![3i64]).kw("value", 2.0))
        .unwrap()
        .add("b", "variable", Args::new().kw("shape", vec![3i64]).kw("value", 0.5))
        .unwrap();

    let scope = rebuilt.open_session().unwrap();
    assert_eq!(scope.load_report().restored, 2);
    assert_eq!(
        rebuilt.variable("w/w").unwrap().read().unwrap(),
        Array1::from_vec(vec![10.0, 20.0, 30.0])
    );
    assert_eq!(
        rebuilt.variable("b/b").unwrap().read().unwrap(),
        Array1::from_vec(vec![0.5, 0.5, 0.5])
    );
}

/// Recipe round-trip: replaying the log into a differently-identified
/// registry yields the same relative variable names and component names.
#[test]
fn recipe_replay_reproduces_structure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    let mut registry =
        Registry::with_identifier(&path, "origin", FactoryRegistry::standard()).unwrap();
    registry
        .add("w", "variable", Args::new().kw("shape", vec![2i64]))
        .unwrap()
        .add("b", "variable", Args::new().kw("shape", vec![2i64]))
        .unwrap();
    let w = registry.component("w").unwrap().clone();
    let b = registry.component("b").unwrap().clone();
    registry
        .add("y", "add", Args::new().with(&w).with(&b))
        .unwrap();

    let recipe_path = dir.path().join("model.recipe.json");
    registry.recipe().save(&recipe_path).unwrap();

    let recipe = crucero::Recipe::load(&recipe_path).unwrap();
    let rebuilt =
        Registry::replay_with_identifier(&recipe, "elsewhere", FactoryRegistry::standard())
            .unwrap();

    assert_eq!(registry.component_names(), rebuilt.component_names());
    assert_eq!(
        registry.owned_variable_names(),
        rebuilt.owned_variable_names()
    );
    assert!(rebuilt.component("y").unwrap().as_node().is_some());
}

/// The bound-method scenario: `opt_step` is registered through
/// `optimizer.minimize(loss)`, survives sanitization, and the replayed
/// recipe reproduces an equivalent step against the rebuilt optimizer.
#[test]
fn optimizer_minimize_round_trips_through_recipe() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    let mut registry = Registry::new(&path, FactoryRegistry::standard()).unwrap();
    registry
        .add("w", "variable", Args::new().kw("shape", vec![2i64]).kw("value", 3.0))
        .unwrap();
    let w = registry.component("w").unwrap().clone();
    registry
        .add("sq", "mul", Args::new().with(&w).with(&w))
        .unwrap();
    let sq = registry.component("sq").unwrap().clone();
    registry.add("loss", "sum", Args::new().with(&sq)).unwrap();
    registry
        .add("optimizer", "sgd", Args::new().kw("lr", 0.1))
        .unwrap();

    let minimize = registry.method("optimizer", "minimize").unwrap();
    let loss = registry.component("loss").unwrap().clone();
    registry
        .add("opt_step", minimize, Args::new().with(&loss))
        .unwrap();

    // Run a few steps: loss = sum(w^2) must shrink.
    {
        let scope = registry.open_session().unwrap();
        let step = registry.component("opt_step").unwrap().as_step().unwrap().clone();
        let first = scope.run(&step).unwrap();
        let mut last = first;
        for _ in 0..5 {
            last = scope.run(&step).unwrap();
        }
        assert!(last < first);
        assert_abs_diff_eq!(first, 18.0, epsilon = 1e-5);
    }

    // Replay reproduces an equivalent bound-method call.
    let recipe = registry.recipe();
    let rebuilt = Registry::replay(&recipe, FactoryRegistry::standard()).unwrap();
    let step = rebuilt.component("opt_step").unwrap().as_step().unwrap().clone();
    assert_abs_diff_eq!(step.learning_rate(), 0.1, epsilon = 1e-6);

    let scope = rebuilt.open_session().unwrap();
    // Values restored from the trained snapshot: loss is already below its
    // untrained starting point.
    let loss = rebuilt.component("loss").unwrap().as_node().unwrap();
    assert!(scope.eval(&loss).unwrap()[0] < 18.0);
    let before = scope.eval(&loss).unwrap()[0];
    scope.run(&step).unwrap();
    assert!(scope.eval(&loss).unwrap()[0] < before);
}

/// A scope dropped by a panic still saves, so the next entry restores the
/// values from the moment of the unwind.
#[test]
fn unwind_still_saves_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.safetensors");

    let mut registry = Registry::new(&path, FactoryRegistry::standard()).unwrap();
    registry
        .add("w", "variable", Args::new().kw("shape", vec![1i64]))
        .unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let scope = registry.open_session().unwrap();
        let w = registry.variable("w/w").unwrap();
        scope.assign(&w, Array1::from_elem(1, 42.0)).unwrap();
        panic!("training exploded");
    }));
    assert!(outcome.is_err());

    let scope = registry.open_session().unwrap();
    assert_eq!(scope.load_report().restored, 1);
    let w = registry.variable("w/w").unwrap();
    assert_eq!(scope.read(&w).unwrap()[0], 42.0);
}
