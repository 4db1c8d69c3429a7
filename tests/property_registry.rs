use crucero::{Args, Error, FactoryRegistry, Registry};
use proptest::collection::vec;
use proptest::prelude::*;

fn build(identifier: &str, sizes: &[i64]) -> Registry {
    let mut registry =
        Registry::with_identifier("model.safetensors", identifier, FactoryRegistry::standard())
            .unwrap();
    for (i, size) in sizes.iter().enumerate() {
        registry
            .add(&format!("c{i}"), "variable", Args::new().kw("size", *size))
            .unwrap();
    }
    registry
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // last_added after N successful adds names the Nth component; None at 0.
    #[test]
    fn prop_last_added_is_nth(sizes in vec(1i64..16, 0..12)) {
        let registry = build("alpha", &sizes);
        match sizes.len() {
            0 => prop_assert!(registry.last_added().is_none()),
            n => prop_assert_eq!(
                registry.last_added().unwrap().name(),
                format!("c{}", n - 1)
            ),
        }
    }

    // A duplicate add fails with DuplicateName and alters neither the recipe
    // log nor the owned-variable set.
    #[test]
    fn prop_duplicate_add_changes_nothing(
        sizes in vec(1i64..16, 1..12),
        dup in 0usize..12,
    ) {
        let mut registry = build("alpha", &sizes);
        let dup = dup % sizes.len();
        let log_before = registry.recipe().entries.len();
        let owned_before = registry.owned_variable_names();

        let err = registry
            .add(&format!("c{dup}"), "variable", Args::new().kw("size", 1i64))
            .unwrap_err();
        prop_assert!(matches!(err, Error::DuplicateName(_)));
        prop_assert_eq!(registry.recipe().entries.len(), log_before);
        prop_assert_eq!(registry.owned_variable_names(), owned_before);
    }

    // Replaying any recipe into a differently-identified registry yields the
    // same relative variable names and component names.
    #[test]
    fn prop_replay_is_identifier_independent(sizes in vec(1i64..16, 0..12)) {
        let original = build("alpha", &sizes);
        let rebuilt = Registry::replay_with_identifier(
            &original.recipe(),
            "beta",
            FactoryRegistry::standard(),
        )
        .unwrap();
        prop_assert_eq!(original.component_names(), rebuilt.component_names());
        prop_assert_eq!(original.owned_variable_names(), rebuilt.owned_variable_names());
    }

    // Sanitize/unsanitize is an identity for owned variables.
    #[test]
    fn prop_variable_tokens_round_trip(sizes in vec(1i64..16, 1..8), pick in 0usize..8) {
        let registry = build("alpha", &sizes);
        let pick = pick % sizes.len();
        let var = registry.variable(&format!("c{pick}/c{pick}")).unwrap();

        let token = registry.sanitize(&crucero::Arg::from(&var)).unwrap();
        match registry.unsanitize(&token).unwrap() {
            crucero::Arg::Var(resolved) => prop_assert!(resolved.same_storage(&var)),
            other => prop_assert!(false, "expected a variable, got {:?}", other),
        }
    }
}
