//! Integration tests for version registration, defaulting, and migration analysis.

use chrono::NaiveDate;
use resource_schema::{
    ApiSchema, MigrationEffort, PropertyBag, PropertyDefinition, PropertyType, RegistryError,
    SchemaMapper, SupportLevel, ValidationRule, VersionDescriptor, VersionRegistry,
};
use serde_json::{json, Value};

const THING: &str = "X/thing";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn bag(value: Value) -> PropertyBag {
    value.as_object().cloned().unwrap()
}

fn version(v: &str, level: SupportLevel) -> VersionDescriptor {
    VersionDescriptor::new(ApiSchema::new(THING, v), level, date(v))
}

// === Registration ===

mod registration {
    use super::*;

    #[test]
    fn identical_reregistration_is_noop() {
        let registry = VersionRegistry::new();
        let versions = vec![
            version("2023-01-01", SupportLevel::Active),
            version("2024-01-01", SupportLevel::Active),
        ];

        registry.register_resource_type(THING, versions.clone()).unwrap();
        let before = registry.supported_versions(THING);
        registry.register_resource_type(THING, versions).unwrap();

        assert_eq!(registry.supported_versions(THING), before);
    }

    #[test]
    fn identical_set_in_other_order_is_noop() {
        let registry = VersionRegistry::new();
        registry
            .register_resource_type(
                THING,
                vec![
                    version("2023-01-01", SupportLevel::Active),
                    version("2024-01-01", SupportLevel::Active),
                ],
            )
            .unwrap();
        registry
            .register_resource_type(
                THING,
                vec![
                    version("2024-01-01", SupportLevel::Active),
                    version("2023-01-01", SupportLevel::Active),
                ],
            )
            .unwrap();
    }

    #[test]
    fn conflicting_reregistration_fails() {
        let registry = VersionRegistry::new();
        registry
            .register_resource_type(THING, vec![version("2023-01-01", SupportLevel::Active)])
            .unwrap();

        let err = registry
            .register_resource_type(
                THING,
                vec![
                    version("2023-01-01", SupportLevel::Active),
                    version("2024-01-01", SupportLevel::Active),
                ],
            )
            .unwrap_err();

        match err {
            RegistryError::DuplicateRegistration {
                existing, attempted, ..
            } => {
                assert_eq!(existing, vec!["2023-01-01"]);
                assert_eq!(attempted, vec!["2023-01-01", "2024-01-01"]);
            }
            other => panic!("expected DuplicateRegistration, got {:?}", other),
        }
        assert_eq!(registry.supported_versions(THING), vec!["2023-01-01"]);
    }

    #[test]
    fn changed_support_level_conflicts() {
        let registry = VersionRegistry::new();
        registry
            .register_resource_type(THING, vec![version("2023-01-01", SupportLevel::Active)])
            .unwrap();
        let err = registry
            .register_resource_type(THING, vec![version("2023-01-01", SupportLevel::Deprecated)])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration { .. }));
    }

    #[test]
    fn version_support_includes_sunset() {
        let registry = VersionRegistry::new();
        registry
            .register_resource_type(
                THING,
                vec![
                    version("2020-01-01", SupportLevel::Sunset),
                    version("2023-01-01", SupportLevel::Active),
                ],
            )
            .unwrap();

        assert!(registry.validate_version_support(THING, "2020-01-01"));
        assert!(!registry.validate_version_support(THING, "2099-01-01"));
        assert!(!registry.validate_version_support("Y/other", "2023-01-01"));
        assert!(registry.version_config(THING, "2020-01-01").is_some());
    }
}

// === Latest Resolution ===

mod latest_resolution {
    use super::*;

    #[test]
    fn latest_is_newest_active() {
        let registry = VersionRegistry::new();
        registry
            .register_resource_type(
                THING,
                vec![
                    version("2023-01-01", SupportLevel::Active),
                    version("2024-01-01", SupportLevel::Active),
                ],
            )
            .unwrap();
        assert_eq!(registry.latest_version(THING).as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn latest_independent_of_registration_order() {
        let levels = [
            ("2021-06-01", SupportLevel::Active),
            ("2022-03-15", SupportLevel::Deprecated),
            ("2023-09-30", SupportLevel::Active),
            ("2024-02-01", SupportLevel::Preview),
            ("2020-01-01", SupportLevel::Sunset),
        ];

        // Every rotation of the input yields the same answer.
        for shift in 0..levels.len() {
            let mut rotated = levels.to_vec();
            rotated.rotate_left(shift);
            let registry = VersionRegistry::new();
            registry
                .register_resource_type(
                    THING,
                    rotated.iter().map(|(v, l)| version(v, *l)).collect(),
                )
                .unwrap();
            assert_eq!(registry.latest_version(THING).as_deref(), Some("2023-09-30"));
            assert_eq!(
                registry.supported_versions(THING),
                vec!["2020-01-01", "2021-06-01", "2022-03-15", "2023-09-30", "2024-02-01"]
            );
        }
    }

    #[test]
    fn version_names_need_not_be_dates() {
        let registry = VersionRegistry::new();
        let v = |name: &str, released: &str| {
            VersionDescriptor::new(ApiSchema::new(THING, name), SupportLevel::Active, date(released))
        };
        registry
            .register_resource_type(THING, vec![v("beta", "2024-05-01"), v("alpha", "2023-05-01")])
            .unwrap();
        assert_eq!(registry.latest_version(THING).as_deref(), Some("beta"));
    }
}

// === Defaults and Validation ===

mod defaults_and_validation {
    use super::*;

    fn schema() -> ApiSchema {
        ApiSchema::new(THING, "2023-01-01")
            .with_property("name", PropertyDefinition::new(PropertyType::String).required(true))
            .with_property(
                "enabled",
                PropertyDefinition::new(PropertyType::Boolean).with_default(json!(true)),
            )
            .with_property(
                "replicas",
                PropertyDefinition::new(PropertyType::Integer).with_default(json!(3)),
            )
            .with_property(
                "label",
                PropertyDefinition::new(PropertyType::String).with_default(json!("default")),
            )
    }

    #[test]
    fn defaults_are_idempotent() {
        let schema = schema();
        let mapper = SchemaMapper::new(&schema).unwrap();

        for input in [
            json!({}),
            json!({ "name": "foo" }),
            json!({ "enabled": null, "label": "x" }),
            json!({ "replicas": 0, "extra": [1, 2] }),
        ] {
            let once = mapper.apply_defaults(&bag(input));
            let twice = mapper.apply_defaults(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn falsy_values_survive_defaults() {
        let schema = schema();
        let mapper = SchemaMapper::new(&schema).unwrap();

        let out = mapper.apply_defaults(&bag(json!({
            "enabled": false,
            "replicas": 0,
            "label": ""
        })));
        assert_eq!(out["enabled"], json!(false));
        assert_eq!(out["replicas"], json!(0));
        assert_eq!(out["label"], json!(""));
    }

    #[test]
    fn every_violation_reported() {
        let schema = ApiSchema::new(THING, "2023-01-01")
            .with_property("name", PropertyDefinition::new(PropertyType::String).required(true))
            .with_property(
                "size",
                PropertyDefinition::new(PropertyType::Integer)
                    .with_rule(ValidationRule::range(Some(1.0), Some(100.0))),
            )
            .with_property(
                "code",
                PropertyDefinition::new(PropertyType::String)
                    .with_rule(ValidationRule::pattern("^[A-Z]{3}$")),
            )
            .with_property(
                "tier",
                PropertyDefinition::new(PropertyType::String)
                    .with_rule(ValidationRule::one_of([json!("free"), json!("paid")])),
            )
            .with_property(
                "alias",
                PropertyDefinition::new(PropertyType::String)
                    .with_rule(ValidationRule::length(Some(2), Some(5))),
            )
            .with_property("flag", PropertyDefinition::new(PropertyType::Boolean));
        let mapper = SchemaMapper::new(&schema).unwrap();

        let result = mapper.validate_properties(&bag(json!({
            "size": 500,
            "code": "abc",
            "tier": "gold",
            "alias": "x",
            "flag": "yes"
        })));

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 6, "{:?}", result.errors);
        assert!(result.errors.contains(&"name is required".to_string()));
        assert!(result.errors.contains(&"flag must be a boolean, got string".to_string()));
    }

    #[test]
    fn valid_bag_has_no_errors() {
        let schema = schema();
        let mapper = SchemaMapper::new(&schema).unwrap();
        let result = mapper.validate_properties(&bag(json!({ "name": "foo" })));
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
}

// === Migration Analysis ===

mod migration_analysis {
    use super::*;

    fn registry_with_changes(counts: &[usize]) -> VersionRegistry {
        let registry = VersionRegistry::new();
        let versions = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let v = format!("{}-01-01", 2020 + i);
                let mut d = VersionDescriptor::new(
                    ApiSchema::new(THING, v.clone()),
                    SupportLevel::Active,
                    date(&v),
                );
                for c in 0..n {
                    d = d.with_breaking_change(format!("change {} in {}", c, v).as_str());
                }
                d
            })
            .collect();
        registry.register_resource_type(THING, versions).unwrap();
        registry
    }

    #[test]
    fn same_version_is_compatible() {
        let registry = registry_with_changes(&[2, 4, 1]);
        for v in registry.supported_versions(THING) {
            let analysis = registry.analyze_migration(THING, &v, &v).unwrap();
            assert!(analysis.compatible);
            assert!(analysis.breaking_changes.is_empty());
            assert_eq!(analysis.estimated_effort, MigrationEffort::None);
        }
    }

    #[test]
    fn source_changes_excluded_target_changes_included() {
        let registry = registry_with_changes(&[2, 1, 1]);
        let analysis = registry
            .analyze_migration(THING, "2020-01-01", "2021-01-01")
            .unwrap();
        assert_eq!(analysis.breaking_changes.len(), 1);
        assert_eq!(analysis.breaking_changes[0].description, "change 0 in 2021-01-01");
        assert_eq!(analysis.estimated_effort, MigrationEffort::Low);
    }

    #[test]
    fn effort_grows_with_change_count() {
        let registry = registry_with_changes(&[0, 0, 3, 3]);

        let analysis = registry
            .analyze_migration(THING, "2020-01-01", "2021-01-01")
            .unwrap();
        assert_eq!(analysis.estimated_effort, MigrationEffort::None);
        assert!(analysis.compatible);

        let analysis = registry
            .analyze_migration(THING, "2020-01-01", "2022-01-01")
            .unwrap();
        assert_eq!(analysis.estimated_effort, MigrationEffort::Medium);

        let analysis = registry
            .analyze_migration(THING, "2020-01-01", "2023-01-01")
            .unwrap();
        assert_eq!(analysis.breaking_changes.len(), 6);
        assert_eq!(analysis.estimated_effort, MigrationEffort::High);
    }

    #[test]
    fn unknown_version_fails() {
        let registry = registry_with_changes(&[0, 1]);
        let err = registry
            .analyze_migration(THING, "1999-01-01", "2021-01-01")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownVersion { ref version, .. } if version == "1999-01-01"));
        assert_eq!(err.exit_code(), 1);
    }
}
