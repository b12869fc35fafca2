//! Per-resource-type version registry.
//!
//! The registry maps a resource type id to its registered
//! [`VersionDescriptor`]s, kept sorted by release date. Entries are
//! immutable once inserted: readers clone an `Arc` to the sorted slice and
//! drop the lock before doing any work, so a late registration for one
//! type never blocks or disturbs analysis of another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::mapper::SchemaMapper;
use crate::types::{
    BreakingChange, MigrationAnalysis, MigrationEffort, PropertyBag, SupportLevel, VersionConstraints,
    VersionDescriptor, VersionLifecycle,
};

type VersionList = Arc<[VersionDescriptor]>;

static SHARED: OnceLock<Arc<VersionRegistry>> = OnceLock::new();

/// Thread-safe store of version descriptors keyed by resource type.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    entries: RwLock<HashMap<String, VersionList>>,
}

impl VersionRegistry {
    /// Create an empty registry owned by the caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first call.
    ///
    /// Prefer passing an explicit registry to controllers; this accessor
    /// exists for call sites that have no composition root to hand.
    pub fn shared() -> Arc<VersionRegistry> {
        SHARED.get_or_init(|| Arc::new(VersionRegistry::new())).clone()
    }

    // Stored lists are never mutated in place, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, VersionList>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, VersionList>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register every version of `resource_type`.
    ///
    /// Registering the identical set again is a no-op. Registering a
    /// different set for a type that is already present fails.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidDescriptor` if the input is malformed
    /// and `RegistryError::DuplicateRegistration` on a conflicting set.
    pub fn register_resource_type(
        &self,
        resource_type: &str,
        versions: Vec<VersionDescriptor>,
    ) -> Result<(), RegistryError> {
        let sorted = prepare(resource_type, versions)?;
        let mut entries = self.write();

        if let Some(existing) = entries.get(resource_type) {
            return same_registration(resource_type, existing, &sorted);
        }

        info!(
            resource_type,
            versions = sorted.len(),
            "registered resource type"
        );
        entries.insert(resource_type.to_string(), sorted);
        Ok(())
    }

    /// Register `resource_type` from `versions` unless it is already present.
    ///
    /// The closure runs exactly once per call. For an unknown type it runs
    /// under the write lock, so concurrent first uses cannot race. For a
    /// known type its result is compared with the stored set under the
    /// same rule as [`register_resource_type`](Self::register_resource_type).
    /// Returns true if this call performed the registration.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidDescriptor` if the closure yields a
    /// malformed set and `RegistryError::DuplicateRegistration` if it
    /// differs from the set already registered.
    pub fn ensure_registered<F>(&self, resource_type: &str, versions: F) -> Result<bool, RegistryError>
    where
        F: FnOnce() -> Vec<VersionDescriptor>,
    {
        if let Some(existing) = self.versions(resource_type) {
            let sorted = prepare(resource_type, versions())?;
            return same_registration(resource_type, &existing, &sorted).map(|()| false);
        }

        let mut entries = self.write();
        let sorted = prepare(resource_type, versions())?;
        if let Some(existing) = entries.get(resource_type) {
            return same_registration(resource_type, existing, &sorted).map(|()| false);
        }
        info!(
            resource_type,
            versions = sorted.len(),
            "registered resource type on first use"
        );
        entries.insert(resource_type.to_string(), sorted);
        Ok(true)
    }

    /// True once any version set has been registered for `resource_type`.
    pub fn is_registered(&self, resource_type: &str) -> bool {
        self.read().contains_key(resource_type)
    }

    /// Sorted ids of every registered resource type.
    pub fn registered_resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// All descriptors of `resource_type`, oldest first.
    pub fn versions(&self, resource_type: &str) -> Option<Arc<[VersionDescriptor]>> {
        self.read().get(resource_type).cloned()
    }

    /// A copy of the descriptor for `version`, if registered.
    pub fn version_config(&self, resource_type: &str, version: &str) -> Option<VersionDescriptor> {
        let versions = self.versions(resource_type)?;
        versions.iter().find(|d| d.version == version).cloned()
    }

    /// The ACTIVE version with the latest release date.
    pub fn latest_version(&self, resource_type: &str) -> Option<String> {
        let versions = self.versions(resource_type)?;
        versions
            .iter()
            .rev()
            .find(|d| d.support_level == SupportLevel::Active)
            .map(|d| d.version.clone())
    }

    /// Every registered version, oldest first, at any support level.
    pub fn supported_versions(&self, resource_type: &str) -> Vec<String> {
        self.versions(resource_type)
            .map(|versions| version_names(&versions))
            .unwrap_or_default()
    }

    /// True if `version` is registered for `resource_type`, sunset included.
    pub fn validate_version_support(&self, resource_type: &str, version: &str) -> bool {
        self.versions(resource_type)
            .is_some_and(|versions| versions.iter().any(|d| d.version == version))
    }

    /// Phase, dates, and the phase that follows for one version.
    pub fn version_lifecycle(&self, resource_type: &str, version: &str) -> Option<VersionLifecycle> {
        let descriptor = self.version_config(resource_type, version)?;
        Some(VersionLifecycle {
            version: descriptor.version,
            phase: descriptor.support_level,
            release_date: descriptor.release_date,
            next_phase: descriptor.support_level.next_phase(),
            sunset_date: descriptor.sunset_date,
        })
    }

    /// The newest version satisfying `constraints`.
    pub fn find_version(&self, resource_type: &str, constraints: &VersionConstraints) -> Option<String> {
        let versions = self.versions(resource_type)?;
        versions
            .iter()
            .rev()
            .find(|d| constraints.matches(d))
            .map(|d| d.version.clone())
    }

    /// Compare two versions of `resource_type`.
    ///
    /// Breaking changes are collected in release order from the versions
    /// between the two endpoints, counting `to_version` and not
    /// `from_version`. The same bounds hold for a downgrade, which also
    /// gets a warning.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownVersion` if either version is not
    /// registered for the type.
    pub fn analyze_migration(
        &self,
        resource_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> Result<MigrationAnalysis, RegistryError> {
        let versions = self.versions(resource_type).unwrap_or_else(|| Arc::from(Vec::new()));
        let from_idx = position(&versions, resource_type, from_version)?;
        let to_idx = position(&versions, resource_type, to_version)?;

        let span = if from_idx <= to_idx {
            &versions[from_idx + 1..=to_idx]
        } else {
            &versions[to_idx..from_idx]
        };
        let breaking_changes: Vec<BreakingChange> = span
            .iter()
            .flat_map(|d| d.breaking_changes.iter().cloned())
            .collect();

        let from = &versions[from_idx];
        let to = &versions[to_idx];
        let mut warnings = Vec::new();
        if from_idx > to_idx {
            warnings.push(format!(
                "{} is a downgrade from {}",
                to.version, from.version
            ));
        }
        if from.support_level.is_deprecated() {
            warnings.push(format!(
                "source version {} is {}",
                from.version, from.support_level
            ));
        }
        if from_idx != to_idx && to.support_level.is_deprecated() {
            warnings.push(format!(
                "target version {} is {}",
                to.version, to.support_level
            ));
        }
        let today = Utc::now().date_naive();
        if let Some(sunset) = from.sunset_date {
            if sunset <= today {
                warnings.push(format!(
                    "source version {} passed its sunset date {}",
                    from.version, sunset
                ));
            }
        }

        let estimated_effort = MigrationEffort::from_change_count(breaking_changes.len());
        let automatic_upgrade_possible = !breaking_changes
            .iter()
            .any(BreakingChange::blocks_automatic_upgrade);

        debug!(
            resource_type,
            from = from_version,
            to = to_version,
            changes = breaking_changes.len(),
            effort = %estimated_effort,
            "migration analyzed"
        );

        Ok(MigrationAnalysis {
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            compatible: breaking_changes.is_empty(),
            breaking_changes,
            warnings,
            estimated_effort,
            automatic_upgrade_possible,
        })
    }

    /// Carry `props` forward from `from_version` to `to_version`.
    ///
    /// Each newer schema's transformations run in release order.
    ///
    /// # Errors
    ///
    /// Fails with `UnknownVersion` for unregistered endpoints, `Downgrade`
    /// if `to_version` is older, and `Transform` if a value cannot be
    /// coerced.
    pub fn migrate_properties(
        &self,
        resource_type: &str,
        from_version: &str,
        to_version: &str,
        props: &PropertyBag,
    ) -> Result<PropertyBag, RegistryError> {
        let versions = self.versions(resource_type).unwrap_or_else(|| Arc::from(Vec::new()));
        let from_idx = position(&versions, resource_type, from_version)?;
        let to_idx = position(&versions, resource_type, to_version)?;
        if from_idx > to_idx {
            return Err(RegistryError::Downgrade {
                resource_type: resource_type.to_string(),
                from: from_version.to_string(),
                to: to_version.to_string(),
            });
        }

        let mut bag = props.clone();
        for descriptor in &versions[from_idx + 1..=to_idx] {
            let mapper = SchemaMapper::new(&descriptor.schema)?;
            bag = mapper.transform_properties(&bag)?;
        }
        Ok(bag)
    }
}

fn same_registration(
    resource_type: &str,
    existing: &[VersionDescriptor],
    attempted: &[VersionDescriptor],
) -> Result<(), RegistryError> {
    if existing == attempted {
        debug!(resource_type, "identical re-registration ignored");
        return Ok(());
    }
    Err(RegistryError::DuplicateRegistration {
        resource_type: resource_type.to_string(),
        existing: version_names(existing),
        attempted: version_names(attempted),
    })
}

fn version_names(versions: &[VersionDescriptor]) -> Vec<String> {
    versions.iter().map(|d| d.version.clone()).collect()
}

fn position(versions: &[VersionDescriptor], resource_type: &str, version: &str) -> Result<usize, RegistryError> {
    versions
        .iter()
        .position(|d| d.version == version)
        .ok_or_else(|| RegistryError::UnknownVersion {
            resource_type: resource_type.to_string(),
            version: version.to_string(),
        })
}

/// Validate a registration and sort it by (release date, version).
fn prepare(resource_type: &str, mut versions: Vec<VersionDescriptor>) -> Result<VersionList, RegistryError> {
    let invalid = |message: String| RegistryError::InvalidDescriptor {
        resource_type: resource_type.to_string(),
        message,
    };

    if resource_type.trim().is_empty() {
        return Err(invalid("resource type id is blank".into()));
    }
    if versions.is_empty() {
        return Err(invalid("no versions given".into()));
    }

    let mut seen = HashSet::new();
    for d in &versions {
        if d.version.trim().is_empty() {
            return Err(invalid("version string is blank".into()));
        }
        if !seen.insert(d.version.as_str()) {
            return Err(invalid(format!("version {} listed more than once", d.version)));
        }
        if d.schema.resource_type != resource_type {
            return Err(invalid(format!(
                "schema for version {} declares resource type '{}'",
                d.version, d.schema.resource_type
            )));
        }
        if d.schema.version != d.version {
            return Err(invalid(format!(
                "schema for version {} declares version '{}'",
                d.version, d.schema.version
            )));
        }
    }

    versions.sort_by(|a, b| {
        a.release_date
            .cmp(&b.release_date)
            .then_with(|| a.version.cmp(&b.version))
    });
    Ok(versions.into())
}
