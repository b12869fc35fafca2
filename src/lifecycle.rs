//! Resource construction: version resolution, validation, and diagnostics.
//!
//! Each concrete resource type implements [`ResourceDefinition`] and is
//! driven by a [`ResourceController`]. The controller runs a fixed
//! sequence for every construction:
//!
//! 1. resolve the API version (explicit pin, latest ACTIVE, or default)
//! 2. load the version descriptor
//! 3. apply schema defaults
//! 4. validate properties (fatal on any error)
//! 5. analyze migration if the version is deprecated or sunset
//! 6. build the resource body
//! 7. return the body with severity-tagged diagnostics
//!
//! Steps 1, 2 and 4 abort construction; the others only add diagnostics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LifecycleError;
use crate::mapper::{MapperOptions, SchemaMapper};
use crate::registry::VersionRegistry;
use crate::types::{
    MigrationAnalysis, PropertyBag, Severity, SupportLevel, ValidationResult, VersionDescriptor,
};

/// Hooks a concrete resource type supplies to the controller.
pub trait ResourceDefinition {
    /// Provider resource type id, e.g. `Microsoft.Storage/storageAccounts`.
    fn resource_type(&self) -> &str;

    /// Version used when nothing ACTIVE is registered.
    fn default_version(&self) -> &str;

    /// Descriptors registered on first use when the type is not yet known.
    fn versions(&self) -> Vec<VersionDescriptor> {
        Vec::new()
    }

    /// Shape the validated, defaulted properties into the backend body.
    fn build_body(&self, props: &PropertyBag, _descriptor: &VersionDescriptor) -> Value {
        Value::Object(props.clone())
    }

    fn default_location(&self) -> Option<String> {
        None
    }

    fn requires_location(&self) -> bool {
        false
    }
}

/// A structured, severity-tagged note attached to a construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.message)
    }
}

/// Per-construction switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructOptions {
    /// Pin a specific API version instead of resolving the latest.
    pub api_version: Option<String>,
    pub validate: bool,
    pub analyze_migration: bool,
    /// Reject properties not declared in the schema.
    pub strict: bool,
}

impl Default for ConstructOptions {
    fn default() -> Self {
        Self {
            api_version: None,
            validate: true,
            analyze_migration: true,
            strict: false,
        }
    }
}

impl ConstructOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn analyze_migration(mut self, analyze: bool) -> Self {
        self.analyze_migration = analyze;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Caller input for one resource construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructRequest {
    pub name: String,
    pub parent_id: String,
    pub location: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: PropertyBag,
    pub options: ConstructOptions,
}

impl ConstructRequest {
    pub fn new(name: impl Into<String>, parent_id: impl Into<String>, properties: PropertyBag) -> Self {
        Self {
            name: name.into(),
            parent_id: parent_id.into(),
            location: None,
            tags: BTreeMap::new(),
            properties,
            options: ConstructOptions::default(),
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.options.api_version = Some(version.into());
        self
    }

    pub fn options(mut self, options: ConstructOptions) -> Self {
        self.options = options;
        self
    }
}

/// A successfully constructed resource, ready for the provisioning backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Construction {
    pub resource_type: String,
    pub version: String,
    pub support_level: SupportLevel,
    pub name: String,
    pub parent_id: String,
    pub location: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Caller properties with schema defaults applied.
    pub properties: PropertyBag,
    /// `None` when validation was switched off.
    pub validation: Option<ValidationResult>,
    pub migration: Option<MigrationAnalysis>,
    pub body: Value,
    pub diagnostics: Vec<Diagnostic>,
}

impl Construction {
    pub fn has_diagnostic(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Highest severity among the diagnostics, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }
}

/// Drives construction of one resource type against a registry.
pub struct ResourceController<D> {
    registry: Arc<VersionRegistry>,
    definition: D,
}

impl<D: ResourceDefinition> ResourceController<D> {
    /// Bind `definition` to `registry`, registering its versions if the
    /// type is not yet known.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Registry` if the definition's descriptors
    /// are malformed or conflict with a set already registered for the type.
    pub fn new(registry: Arc<VersionRegistry>, definition: D) -> Result<Self, LifecycleError> {
        let versions = definition.versions();
        if !versions.is_empty() {
            registry.ensure_registered(definition.resource_type(), move || versions)?;
        }
        Ok(Self {
            registry,
            definition,
        })
    }

    pub fn resource_type(&self) -> &str {
        self.definition.resource_type()
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    pub fn latest_version(&self) -> Option<String> {
        self.registry.latest_version(self.resource_type())
    }

    pub fn supported_versions(&self) -> Vec<String> {
        self.registry.supported_versions(self.resource_type())
    }

    /// Analyze moving from `from_version` to `target`, or to the latest
    /// version (falling back to the default) when no target is given.
    pub fn analyze_migration_to(
        &self,
        from_version: &str,
        target: Option<&str>,
    ) -> Result<MigrationAnalysis, LifecycleError> {
        let target = match target {
            Some(t) => t.to_string(),
            None => self
                .latest_version()
                .unwrap_or_else(|| self.definition.default_version().to_string()),
        };
        Ok(self
            .registry
            .analyze_migration(self.resource_type(), from_version, &target)?)
    }

    /// Run the full construction sequence for `request`.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name is blank
    /// - `MissingLocation` if a location is required and none is known
    /// - `UnsupportedVersion` if a pinned version is not registered
    /// - `MissingVersionConfig` if the resolved version has no descriptor
    /// - `PropertyValidation` with every violation if validation fails
    pub fn construct(&self, request: ConstructRequest) -> Result<Construction, LifecycleError> {
        let resource_type = self.resource_type().to_string();
        let mut diagnostics = Vec::new();

        if request.name.trim().is_empty() {
            return Err(LifecycleError::InvalidName {
                name: request.name,
                message: "name must not be blank".into(),
            });
        }

        let location = request
            .location
            .clone()
            .or_else(|| self.definition.default_location());
        if location.is_none() && self.definition.requires_location() {
            return Err(LifecycleError::MissingLocation { resource_type });
        }

        let version = self.resolve_version(request.options.api_version.as_deref(), &mut diagnostics)?;
        debug!(resource_type = %resource_type, version = %version, "version resolved");

        let descriptor = self
            .registry
            .version_config(&resource_type, &version)
            .ok_or_else(|| LifecycleError::MissingVersionConfig {
                resource_type: resource_type.clone(),
                version: version.clone(),
            })?;
        if let Some(diagnostic) = support_level_diagnostic(&descriptor) {
            push(&mut diagnostics, diagnostic);
        }

        let mapper = SchemaMapper::with_options(
            &descriptor.schema,
            MapperOptions::new().strict(request.options.strict),
        )?;
        let properties = mapper.apply_defaults(&request.properties);
        debug!(resource_type = %resource_type, count = properties.len(), "defaults applied");

        let validation = if request.options.validate {
            let result = mapper.validate_properties(&properties);
            if !result.valid {
                return Err(LifecycleError::PropertyValidation {
                    resource_type,
                    version,
                    result,
                });
            }
            for warning in &result.warnings {
                push(
                    &mut diagnostics,
                    Diagnostic::new(Severity::Warning, "W004", warning.clone()),
                );
            }
            Some(result)
        } else {
            None
        };

        let migration = if request.options.analyze_migration && descriptor.support_level.is_deprecated() {
            self.migration_for(&descriptor, &mut diagnostics)
        } else {
            None
        };

        let body = self.definition.build_body(&properties, &descriptor);
        debug!(resource_type = %resource_type, version = %version, "body built");

        Ok(Construction {
            resource_type,
            version,
            support_level: descriptor.support_level,
            name: request.name,
            parent_id: request.parent_id,
            location,
            tags: request.tags,
            properties,
            validation,
            migration,
            body,
            diagnostics,
        })
    }

    fn resolve_version(
        &self,
        explicit: Option<&str>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<String, LifecycleError> {
        let resource_type = self.resource_type();

        if let Some(requested) = explicit {
            if !self.registry.validate_version_support(resource_type, requested) {
                return Err(LifecycleError::UnsupportedVersion {
                    resource_type: resource_type.to_string(),
                    requested: requested.to_string(),
                    supported: self.supported_versions(),
                });
            }
            return Ok(requested.to_string());
        }

        if let Some(latest) = self.latest_version() {
            return Ok(latest);
        }

        let fallback = self.definition.default_version().to_string();
        push(
            diagnostics,
            Diagnostic::new(
                Severity::Warning,
                "W001",
                format!(
                    "no active version registered for {}; falling back to default version {}",
                    resource_type, fallback
                ),
            ),
        );
        Ok(fallback)
    }

    fn migration_for(
        &self,
        descriptor: &VersionDescriptor,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<MigrationAnalysis> {
        let resource_type = self.resource_type();
        let Some(latest) = self.latest_version() else {
            push(
                diagnostics,
                Diagnostic::new(
                    Severity::Warning,
                    "W005",
                    format!("no active version of {} to migrate to", resource_type),
                ),
            );
            return None;
        };

        match self
            .registry
            .analyze_migration(resource_type, &descriptor.version, &latest)
        {
            Ok(analysis) => {
                if !analysis.compatible {
                    push(
                        diagnostics,
                        Diagnostic::new(
                            Severity::Warning,
                            "W003",
                            format!(
                                "migrating {} from {} to {} involves {} breaking change(s), estimated effort {}",
                                resource_type,
                                analysis.from_version,
                                analysis.to_version,
                                analysis.breaking_changes.len(),
                                analysis.estimated_effort
                            ),
                        ),
                    );
                }
                Some(analysis)
            }
            Err(e) => {
                push(
                    diagnostics,
                    Diagnostic::new(
                        Severity::Warning,
                        "W005",
                        format!("migration analysis unavailable: {}", e),
                    ),
                );
                None
            }
        }
    }
}

fn support_level_diagnostic(descriptor: &VersionDescriptor) -> Option<Diagnostic> {
    let id = format!("{}@{}", descriptor.schema.resource_type, descriptor.version);
    match descriptor.support_level {
        SupportLevel::Preview => Some(Diagnostic::new(
            Severity::Info,
            "I001",
            format!("{} is a preview version and may change without notice", id),
        )),
        SupportLevel::Deprecated => {
            let mut message = format!("{} is deprecated", id);
            if let Some(sunset) = descriptor.sunset_date {
                message.push_str(&format!(" and will be sunset on {}", sunset));
            }
            if let Some(guide) = &descriptor.migration_guide {
                message.push_str(&format!("; migration guide: {}", guide));
            }
            Some(Diagnostic::new(Severity::Warning, "W002", message))
        }
        SupportLevel::Sunset => Some(Diagnostic::new(
            Severity::Critical,
            "C001",
            format!("{} has been sunset and may stop working at any time", id),
        )),
        SupportLevel::Active | SupportLevel::Maintenance => None,
    }
}

fn push(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if diagnostic.severity >= Severity::Warning {
        warn!(code = diagnostic.code, severity = %diagnostic.severity, "{}", diagnostic.message);
    }
    diagnostics.push(diagnostic);
}
