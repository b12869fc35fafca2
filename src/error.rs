//! Error types for schema registration, validation, and resource construction.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ValidationResult;

/// Errors raised by [`crate::VersionRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(
        "resource type '{resource_type}' is already registered with versions [{}], refusing [{}]",
        existing.join(", "),
        attempted.join(", ")
    )]
    DuplicateRegistration {
        resource_type: String,
        existing: Vec<String>,
        attempted: Vec<String>,
    },

    #[error("invalid version descriptor for '{resource_type}': {message}")]
    InvalidDescriptor {
        resource_type: String,
        message: String,
    },

    #[error("unknown version '{version}' for resource type '{resource_type}'")]
    UnknownVersion {
        resource_type: String,
        version: String,
    },

    #[error("cannot migrate '{resource_type}' properties from {from} down to {to}")]
    Downgrade {
        resource_type: String,
        from: String,
        to: String,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

impl RegistryError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RegistryError::UnknownVersion { .. } | RegistryError::Downgrade { .. } => 1,
            RegistryError::Transform(_) => 1,
            _ => 2,
        }
    }
}

/// Errors building a [`crate::SchemaMapper`].
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("invalid schema for {resource_type}@{version}: {message}")]
    InvalidSchema {
        resource_type: String,
        version: String,
        message: String,
    },

    #[error("invalid rule on property '{property}': {message}")]
    InvalidRule { property: String, message: String },
}

/// A property value that could not be carried into another version.
#[derive(Debug, Clone, Error)]
#[error("cannot transform property '{property}': {message}")]
pub struct TransformError {
    pub property: String,
    pub message: String,
}

/// Errors raised while constructing a resource.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(
        "unsupported API version '{requested}' for {resource_type}; supported versions: {}",
        supported.join(", ")
    )]
    UnsupportedVersion {
        resource_type: String,
        requested: String,
        supported: Vec<String>,
    },

    #[error("no version configuration for {resource_type}@{version}")]
    MissingVersionConfig {
        resource_type: String,
        version: String,
    },

    #[error(
        "property validation failed for {resource_type}@{version}: {}",
        result.errors.join("; ")
    )]
    PropertyValidation {
        resource_type: String,
        version: String,
        result: ValidationResult,
    },

    #[error("no location given for top-level resource {resource_type}")]
    MissingLocation { resource_type: String },

    #[error("invalid resource name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

impl LifecycleError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::UnsupportedVersion { .. }
            | LifecycleError::PropertyValidation { .. }
            | LifecycleError::MissingLocation { .. }
            | LifecycleError::InvalidName { .. } => 1,
            LifecycleError::Registry(e) => e.exit_code(),
            _ => 2,
        }
    }

    /// Validation errors carried by this error, if any.
    pub fn validation_errors(&self) -> &[String] {
        match self {
            LifecycleError::PropertyValidation { result, .. } => &result.errors,
            _ => &[],
        }
    }
}

/// Errors loading catalogs and property files.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid catalog: {message}")]
    InvalidCatalog { message: String },

    #[error("invalid property file: expected a JSON object, got {actual}")]
    InvalidProperties { actual: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Failures reported by deployment collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("provisioning {resource_type} '{name}' failed: {message}")]
    Provision {
        resource_type: String,
        name: String,
        message: String,
    },

    #[error("role assignment for '{principal_id}' failed: {message}")]
    RoleAssignment {
        principal_id: String,
        message: String,
    },

    #[error("monitoring setup for '{resource_id}' failed: {message}")]
    Monitoring {
        resource_id: String,
        message: String,
    },
}

/// Errors from [`crate::backend::Deployer::deploy`].
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Construct(#[from] LifecycleError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{what} requested but no {what} collaborator is configured")]
    MissingCollaborator { what: &'static str },

    /// The resource exists remotely; a follow-up step failed.
    #[error("{resource_id} was provisioned but post-deploy failed: {source}")]
    PostDeploy {
        resource_id: String,
        source: BackendError,
    },
}

impl DeployError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Construct(e) => e.exit_code(),
            DeployError::Backend(_) | DeployError::PostDeploy { .. } => 3,
            DeployError::MissingCollaborator { .. } => 2,
        }
    }

    /// Id of the remote resource left behind when a later step failed.
    pub fn provisioned_resource_id(&self) -> Option<&str> {
        match self {
            DeployError::PostDeploy { resource_id, .. } => Some(resource_id.as_str()),
            _ => None,
        }
    }
}
