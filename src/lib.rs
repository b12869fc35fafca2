//! Resource Schema
//!
//! Version-aware schemas for provider resource types.
//!
//! Each resource type registers its API versions, and each version carries
//! a property schema, a support level, and the breaking changes it
//! introduced. The library resolves which version to use, validates and
//! defaults caller properties against that version, and reports migration
//! effort when a caller sits on a deprecated or sunset version.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::NaiveDate;
//! use resource_schema::{
//!     ApiSchema, ConstructRequest, PropertyDefinition, PropertyType, ResourceController,
//!     ResourceDefinition, SupportLevel, VersionDescriptor, VersionRegistry,
//! };
//! use serde_json::json;
//!
//! struct Widget;
//!
//! impl ResourceDefinition for Widget {
//!     fn resource_type(&self) -> &str {
//!         "Provider.Service/widgets"
//!     }
//!
//!     fn default_version(&self) -> &str {
//!         "2024-01-01"
//!     }
//! }
//!
//! let schema = ApiSchema::new("Provider.Service/widgets", "2024-01-01")
//!     .with_property("name", PropertyDefinition::new(PropertyType::String).required(true))
//!     .with_property(
//!         "enabled",
//!         PropertyDefinition::new(PropertyType::Boolean).with_default(json!(true)),
//!     );
//!
//! let registry = Arc::new(VersionRegistry::new());
//! registry
//!     .register_resource_type(
//!         "Provider.Service/widgets",
//!         vec![VersionDescriptor::new(
//!             schema,
//!             SupportLevel::Active,
//!             NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         )],
//!     )
//!     .unwrap();
//!
//! let controller = ResourceController::new(registry, Widget).unwrap();
//! let props = json!({ "name": "foo" }).as_object().unwrap().clone();
//! let built = controller
//!     .construct(ConstructRequest::new("foo", "/parent", props))
//!     .unwrap();
//!
//! assert_eq!(built.version, "2024-01-01");
//! assert_eq!(built.body, json!({ "name": "foo", "enabled": true }));
//! ```
//!
//! # Support Levels
//!
//! | Level | Chosen as latest | Migration analysis | Diagnostic |
//! |-------|------------------|--------------------|------------|
//! | `preview` | no | no | info `I001` |
//! | `active` | yes | no | none |
//! | `maintenance` | no | no | none |
//! | `deprecated` | no | yes | warning `W002` |
//! | `sunset` | no | yes | critical `C001` |
//!
//! # Catalog Format
//!
//! Versions can be loaded from JSON, one document per resource type:
//! ```json
//! {
//!   "resource_type": "Provider.Service/widgets",
//!   "versions": [
//!     {
//!       "version": "2024-01-01",
//!       "support_level": "active",
//!       "release_date": "2024-01-01",
//!       "breaking_changes": ["renamed sku to tier"],
//!       "schema": { "properties": { "name": { "type": "string", "required": true } } }
//!     }
//!   ]
//! }
//! ```

mod backend;
mod error;
mod lifecycle;
mod linter;
mod loader;
mod mapper;
mod registry;
mod types;

pub use backend::{
    Deployer, Deployment, MonitoringConfig, MonitoringProvisioner, PostDeploy, ProvisioningBackend,
    ResourceRequest, RoleAssigner, RoleAssignment,
};
pub use error::{
    BackendError, DeployError, LifecycleError, LoadError, MapperError, RegistryError, TransformError,
};
pub use lifecycle::{
    ConstructOptions, ConstructRequest, Construction, Diagnostic, ResourceController,
    ResourceDefinition,
};
pub use linter::{lint, lint_file, FileResult, FileStatus, LintDiagnostic, LintResult};
pub use loader::{
    is_url, load_catalog_auto, load_catalog_dir, load_catalog_file, load_catalog_str, load_json,
    load_properties, parse_catalog, register_catalog, CatalogEntry,
};
pub use mapper::{MapperOptions, SchemaMapper};
pub use registry::VersionRegistry;
pub use types::{
    is_present, json_type_name, ApiSchema, BreakingChange, ChangeKind, CrossPropertyRule,
    MigrationAnalysis, MigrationEffort, PropertyBag, PropertyDefinition, PropertyTransformation,
    PropertyType, RuleCheck, Severity, SupportLevel, ValidationResult, ValidationRule,
    VersionConstraints, VersionDescriptor, VersionLifecycle, LOW_EFFORT_MAX, MEDIUM_EFFORT_MAX,
};

#[cfg(feature = "remote")]
pub use loader::load_catalog_url;
