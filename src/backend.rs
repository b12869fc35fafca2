//! Boundary to the external provisioning backend and its companions.
//!
//! Nothing here talks to a cloud. The embedding system supplies
//! implementations of [`ProvisioningBackend`], [`RoleAssigner`], and
//! [`MonitoringProvisioner`]; [`Deployer`] sequences them around a
//! successful construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BackendError, DeployError};
use crate::lifecycle::{ConstructRequest, Construction, Diagnostic, ResourceController, ResourceDefinition};

/// Envelope handed to a [`ProvisioningBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRequest {
    pub resource_type: String,
    pub api_version: String,
    pub parent_id: String,
    pub name: String,
    pub location: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub body: Value,
}

impl ResourceRequest {
    /// `type@version`, the form the backend addresses resources by.
    pub fn type_ref(&self) -> String {
        format!("{}@{}", self.resource_type, self.api_version)
    }

    /// Child types (`Provider/parent/child`) inherit their parent's location.
    pub fn is_child_resource(&self) -> bool {
        is_child_type(&self.resource_type)
    }
}

fn is_child_type(resource_type: &str) -> bool {
    resource_type.split('/').count() > 2
}

impl From<Construction> for ResourceRequest {
    fn from(construction: Construction) -> Self {
        let mut body = construction.body;
        let mut tags = BTreeMap::new();

        if let Value::Object(map) = &mut body {
            if let Some(Value::Object(body_tags)) = map.remove("tags") {
                for (key, value) in body_tags {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    tags.insert(key, value);
                }
            }
        }
        // Explicit request tags win over tags found in the body.
        tags.extend(construction.tags);

        let body_has_location = body.get("location").is_some_and(|v| !v.is_null());
        let location = if is_child_type(&construction.resource_type) || body_has_location {
            None
        } else {
            construction.location
        };

        Self {
            resource_type: construction.resource_type,
            api_version: construction.version,
            parent_id: construction.parent_id,
            name: construction.name,
            location,
            tags,
            body,
        }
    }
}

/// Creates or updates a remote resource, returning its id.
pub trait ProvisioningBackend {
    fn apply(&self, request: &ResourceRequest) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal_id: String,
    pub role_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RoleAssignment {
    pub fn new(principal_id: impl Into<String>, role_definition_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            role_definition_id: role_definition_id.into(),
            principal_type: None,
            description: None,
        }
    }
}

/// Grants roles scoped to a provisioned resource.
pub trait RoleAssigner {
    fn assign(&self, scope_id: &str, assignment: &RoleAssignment) -> Result<(), BackendError>;
}

fn default_enabled() -> bool {
    true
}

/// Monitoring resources to attach after provisioning.
///
/// Diagnostic settings and alerts are opaque to this crate and passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostic_settings: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<Value>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            diagnostic_settings: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

pub trait MonitoringProvisioner {
    fn attach(&self, resource_id: &str, config: &MonitoringConfig) -> Result<(), BackendError>;
}

/// Follow-up work after the resource itself is provisioned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDeploy {
    pub role_assignments: Vec<RoleAssignment>,
    pub monitoring: Option<MonitoringConfig>,
}

impl PostDeploy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, assignment: RoleAssignment) -> Self {
        self.role_assignments.push(assignment);
        self
    }

    pub fn monitoring(mut self, config: MonitoringConfig) -> Self {
        self.monitoring = Some(config);
        self
    }
}

/// Result of a successful [`Deployer::deploy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub resource_id: String,
    pub request: ResourceRequest,
    pub roles_assigned: usize,
    pub monitoring_attached: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Sequences construction, provisioning, role assignment, and monitoring.
pub struct Deployer<'a> {
    backend: &'a dyn ProvisioningBackend,
    roles: Option<&'a dyn RoleAssigner>,
    monitoring: Option<&'a dyn MonitoringProvisioner>,
}

impl<'a> Deployer<'a> {
    pub fn new(backend: &'a dyn ProvisioningBackend) -> Self {
        Self {
            backend,
            roles: None,
            monitoring: None,
        }
    }

    pub fn with_roles(mut self, roles: &'a dyn RoleAssigner) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn with_monitoring(mut self, monitoring: &'a dyn MonitoringProvisioner) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Construct `request` through `controller`, provision it, then run
    /// role assignments and monitoring in that order.
    ///
    /// Missing collaborators are detected before anything is provisioned.
    /// Disabled monitoring is skipped. A failure after provisioning is
    /// reported as `DeployError::PostDeploy` carrying the new resource id.
    pub fn deploy<D: ResourceDefinition>(
        &self,
        controller: &ResourceController<D>,
        request: ConstructRequest,
        post: PostDeploy,
    ) -> Result<Deployment, DeployError> {
        let roles = if post.role_assignments.is_empty() {
            None
        } else {
            Some(self.roles.ok_or(DeployError::MissingCollaborator {
                what: "role assignment",
            })?)
        };
        let monitoring = match &post.monitoring {
            Some(config) if config.enabled => Some((
                self.monitoring.ok_or(DeployError::MissingCollaborator { what: "monitoring" })?,
                config,
            )),
            Some(_) => {
                debug!("monitoring disabled, skipping");
                None
            }
            None => None,
        };

        let construction = controller.construct(request)?;
        let diagnostics = construction.diagnostics.clone();
        let request = ResourceRequest::from(construction);

        info!(resource = %request.type_ref(), name = %request.name, "provisioning resource");
        let resource_id = self.backend.apply(&request)?;

        let post_deploy = |source: BackendError| DeployError::PostDeploy {
            resource_id: resource_id.clone(),
            source,
        };

        let mut roles_assigned = 0;
        if let Some(roles) = roles {
            for assignment in &post.role_assignments {
                roles.assign(&resource_id, assignment).map_err(post_deploy)?;
                roles_assigned += 1;
            }
        }

        let monitoring_attached = match monitoring {
            Some((provisioner, config)) => {
                provisioner.attach(&resource_id, config).map_err(post_deploy)?;
                true
            }
            None => false,
        };

        Ok(Deployment {
            resource_id,
            request,
            roles_assigned,
            monitoring_attached,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SupportLevel;
    use serde_json::json;

    fn construction(resource_type: &str, body: Value) -> Construction {
        Construction {
            resource_type: resource_type.into(),
            version: "2023-01-01".into(),
            support_level: SupportLevel::Active,
            name: "res".into(),
            parent_id: "/subscriptions/s/resourceGroups/rg".into(),
            location: Some("westeurope".into()),
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            properties: Default::default(),
            validation: None,
            migration: None,
            body,
            diagnostics: vec![],
        }
    }

    #[test]
    fn tags_lifted_out_of_body() {
        let request = ResourceRequest::from(construction(
            "Microsoft.Storage/storageAccounts",
            json!({ "sku": "Standard_LRS", "tags": { "env": "dev", "team": "core" } }),
        ));
        assert_eq!(request.body, json!({ "sku": "Standard_LRS" }));
        assert_eq!(request.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(request.tags.get("team").map(String::as_str), Some("core"));
        assert_eq!(request.type_ref(), "Microsoft.Storage/storageAccounts@2023-01-01");
    }

    #[test]
    fn location_only_for_top_level_types() {
        let top = ResourceRequest::from(construction("Microsoft.Storage/storageAccounts", json!({})));
        assert_eq!(top.location.as_deref(), Some("westeurope"));

        let child = ResourceRequest::from(construction(
            "Microsoft.Storage/storageAccounts/blobServices",
            json!({}),
        ));
        assert!(child.is_child_resource());
        assert_eq!(child.location, None);

        let carried = ResourceRequest::from(construction(
            "Microsoft.Storage/storageAccounts",
            json!({ "location": "eastus" }),
        ));
        assert_eq!(carried.location, None);
    }

    #[test]
    fn monitoring_config_defaults_enabled() {
        let config: MonitoringConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.enabled);
    }
}
