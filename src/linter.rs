//! Catalog linting - static analysis of version catalog files.
//!
//! Checks catalog files for:
//! - JSON syntax and catalog shape errors
//! - Registrations the registry would reject
//! - Rules that cannot be compiled
//! - Suspicious but legal declarations (no ACTIVE version, required
//!   properties with defaults, cross-property rules naming unknown
//!   properties)

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::loader::{collect_catalog_files, load_catalog_file, CatalogEntry};
use crate::mapper::SchemaMapper;
use crate::registry::VersionRegistry;
use crate::types::{Severity, SupportLevel, VersionDescriptor};

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct LintDiagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Location of the issue (e.g., "Microsoft.Storage/storageAccounts@2023-01-01/properties/sku")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<LintDiagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

impl FileStatus {
    fn from_counts(errors: usize, warnings: usize) -> Self {
        match (errors, warnings) {
            (0, 0) => FileStatus::Ok,
            (0, _) => FileStatus::Warning,
            _ => FileStatus::Error,
        }
    }

    /// Whether a file with this status fails the run.
    fn fails(self, strict: bool) -> bool {
        match self {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        }
    }
}

/// `(errors, warnings)` among `diagnostics`; critical counts as an error.
fn severity_counts(diagnostics: &[LintDiagnostic]) -> (usize, usize) {
    diagnostics.iter().fold((0, 0), |(errors, warnings), d| match d.severity {
        Severity::Error | Severity::Critical => (errors + 1, warnings),
        Severity::Warning => (errors, warnings + 1),
        Severity::Info => (errors, warnings),
    })
}

/// Aggregate over every catalog file under one path.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// No file produced an error-level diagnostic.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a catalog file, or every `*.json` file below a directory.
///
/// With `strict`, a file carrying only warnings also counts as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let mut summary = LintResult {
        path: path.to_path_buf(),
        files_checked: 0,
        passed: 0,
        failed: 0,
        errors: 0,
        warnings: 0,
        results: Vec::new(),
    };

    for file in collect_catalog_files(path) {
        let file_result = lint_file(&file, path);
        let (errors, warnings) = severity_counts(&file_result.diagnostics);
        summary.errors += errors;
        summary.warnings += warnings;
        summary.files_checked += 1;
        if file_result.status.fails(strict) {
            summary.failed += 1;
        } else {
            summary.passed += 1;
        }
        summary.results.push(file_result);
    }
    summary
}

/// Lint a single catalog file; `base_path` is stripped from the reported name.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let mut diagnostics = Vec::new();

    match load_catalog_file(file) {
        Ok(entries) => {
            for entry in &entries {
                check_entry(entry, file, &mut diagnostics);
            }
        }
        Err(e) => diagnostics.push(LintDiagnostic {
            severity: Severity::Error,
            code: "E001".to_string(),
            file: file.to_path_buf(),
            path: "/".to_string(),
            message: format!("cannot load catalog: {}", e),
        }),
    }

    let (errors, warnings) = severity_counts(&diagnostics);
    FileResult {
        file: display,
        status: FileStatus::from_counts(errors, warnings),
        diagnostics,
    }
}

fn check_entry(entry: &CatalogEntry, file: &Path, diagnostics: &mut Vec<LintDiagnostic>) {
    let mut push = |severity: Severity, code: &str, path: String, message: String| {
        diagnostics.push(LintDiagnostic {
            severity,
            code: code.to_string(),
            file: file.to_path_buf(),
            path,
            message,
        });
    };

    // Dry-run registration against a scratch registry.
    let scratch = VersionRegistry::new();
    if let Err(e) = scratch.register_resource_type(&entry.resource_type, entry.versions.clone()) {
        push(
            Severity::Error,
            "E002",
            entry.resource_type.clone(),
            format!("registration rejected: {}", e),
        );
    }

    if !entry
        .versions
        .iter()
        .any(|d| d.support_level == SupportLevel::Active)
    {
        push(
            Severity::Warning,
            "W001",
            entry.resource_type.clone(),
            "no active version; latest resolution will fall back to a default".to_string(),
        );
    }

    for descriptor in &entry.versions {
        for (code, path, message) in check_descriptor(descriptor) {
            let severity = if code.starts_with('E') {
                Severity::Error
            } else {
                Severity::Warning
            };
            push(severity, code, path, message);
        }
    }
}

fn check_descriptor(descriptor: &VersionDescriptor) -> Vec<(&'static str, String, String)> {
    let schema = &descriptor.schema;
    let base = format!("{}@{}", schema.resource_type, descriptor.version);
    let mut found = Vec::new();

    if let Err(e) = SchemaMapper::new(schema) {
        found.push(("E003", base.clone(), e.to_string()));
    }

    for (name, def) in &schema.properties {
        if def.required && def.default.is_some() {
            found.push((
                "W002",
                format!("{}/properties/{}", base, name),
                format!("{} is both required and defaulted; the default always satisfies it", name),
            ));
        }
    }

    for (i, rule) in schema.validation_rules.iter().enumerate() {
        for property in rule.referenced_properties() {
            if !schema.properties.contains_key(property) {
                found.push((
                    "W003",
                    format!("{}/validation_rules/{}", base, i),
                    format!("rule references undeclared property {}", property),
                ));
            }
        }
    }

    found
}
