//! Catalog loading from various sources.
//!
//! A catalog describes every version of one or more resource types as
//! JSON. Catalogs load from files, strings, directories, and HTTP URLs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{LoadError, RegistryError};
use crate::registry::VersionRegistry;
use crate::types::{json_type_name, PropertyBag, VersionDescriptor};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// All versions of one resource type, as stored in a catalog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub resource_type: String,
    pub versions: Vec<VersionDescriptor>,
}

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a property bag (a JSON object) from a file path.
pub fn load_properties(path: &Path) -> Result<PropertyBag, LoadError> {
    match load_json(path)? {
        Value::Object(map) => Ok(map),
        other => Err(LoadError::InvalidProperties {
            actual: json_type_name(&other).to_string(),
        }),
    }
}

/// Interpret a parsed JSON document as catalog entries.
///
/// Accepts a single entry object or an array of entries. Schemas that
/// leave `resource_type` or `version` blank inherit them from the entry
/// and descriptor.
///
/// # Errors
///
/// Returns `LoadError::InvalidCatalog` if the document does not have the
/// catalog shape.
pub fn parse_catalog(doc: Value) -> Result<Vec<CatalogEntry>, LoadError> {
    let docs = match doc {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(LoadError::InvalidCatalog {
                message: format!("expected object or array, got {}", json_type_name(&other)),
            })
        }
    };

    let mut entries = Vec::with_capacity(docs.len());
    for (i, doc) in docs.into_iter().enumerate() {
        let mut entry: CatalogEntry =
            serde_json::from_value(doc).map_err(|e| LoadError::InvalidCatalog {
                message: format!("entry {}: {}", i, e),
            })?;
        for descriptor in &mut entry.versions {
            if descriptor.schema.resource_type.is_empty() {
                descriptor.schema.resource_type = entry.resource_type.clone();
            }
            if descriptor.schema.version.is_empty() {
                descriptor.schema.version = descriptor.version.clone();
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Load a catalog from a JSON string.
pub fn load_catalog_str(content: &str) -> Result<Vec<CatalogEntry>, LoadError> {
    let doc = serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    parse_catalog(doc)
}

/// Load a catalog from a file path.
pub fn load_catalog_file(path: &Path) -> Result<Vec<CatalogEntry>, LoadError> {
    parse_catalog(load_json(path)?)
}

/// Load every `*.json` catalog under `dir`, in sorted path order.
///
/// # Errors
///
/// Fails on the first file that cannot be loaded.
pub fn load_catalog_dir(dir: &Path) -> Result<Vec<CatalogEntry>, LoadError> {
    if !dir.exists() {
        return Err(LoadError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for file in collect_catalog_files(dir) {
        debug!(file = %file.display(), "loading catalog file");
        entries.extend(load_catalog_file(&file)?);
    }
    Ok(entries)
}

/// Load a catalog from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or `LoadError::InvalidCatalog` if the response isn't a catalog.
#[cfg(feature = "remote")]
pub fn load_catalog_url(url: &str) -> Result<Vec<CatalogEntry>, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let doc: Value = response.json().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;
    parse_catalog(doc)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a catalog from a URL, a directory, or a file.
///
/// URL loading requires the `remote` feature.
pub fn load_catalog_auto(source: &str) -> Result<Vec<CatalogEntry>, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_catalog_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        let path = Path::new(source);
        if path.is_dir() {
            load_catalog_dir(path)
        } else {
            load_catalog_file(path)
        }
    }
}

/// Register every entry with `registry`, returning how many were added
/// or confirmed.
///
/// # Errors
///
/// Stops at the first entry the registry rejects.
pub fn register_catalog(registry: &VersionRegistry, entries: Vec<CatalogEntry>) -> Result<usize, RegistryError> {
    let count = entries.len();
    for entry in entries {
        registry.register_resource_type(&entry.resource_type, entry.versions)?;
    }
    Ok(count)
}

/// Collect all .json files in a path (file or directory).
pub(crate) fn collect_catalog_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
}
