//! Resource Schema CLI
//!
//! Command-line interface for inspecting version catalogs, validating
//! property files, and analyzing migrations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use resource_schema::{
    lint, load_catalog_auto, load_properties, register_catalog, ConstructOptions, ConstructRequest,
    FileStatus, LifecycleError, PropertyBag, ResourceController, ResourceDefinition, Severity,
    VersionRegistry,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resource-schema")]
#[command(about = "Inspect, validate, and migrate versioned resource schemas")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered resource types, or the versions of one type
    Versions {
        /// Catalog source: file, directory, or URL (http:// or https://)
        catalog: String,

        /// Resource type to describe
        #[arg(long = "type", short = 't')]
        resource_type: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Validate a property file against a resource type's schema
    Validate {
        /// Catalog source: file, directory, or URL (http:// or https://)
        catalog: String,

        /// Resource type to validate against
        #[arg(long = "type", short = 't')]
        resource_type: String,

        /// JSON file holding the property bag
        #[arg(long)]
        props: PathBuf,

        /// Pin an API version (default: latest active)
        #[arg(long)]
        api_version: Option<String>,

        /// Resource name (default: the "name" property, then the type name)
        #[arg(long)]
        name: Option<String>,

        /// Reject properties not declared in the schema
        #[arg(long)]
        strict: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Analyze migrating between two versions of a resource type
    Migrate {
        /// Catalog source: file, directory, or URL (http:// or https://)
        catalog: String,

        /// Resource type to analyze
        #[arg(long = "type", short = 't')]
        resource_type: String,

        /// Version migrating from
        #[arg(long)]
        from: String,

        /// Version migrating to (default: latest active)
        #[arg(long)]
        to: Option<String>,

        /// Property file to carry forward to the target version
        #[arg(long)]
        props: Option<PathBuf>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint catalog files for errors
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

/// Resource definition backed purely by catalog data.
struct CatalogDefinition {
    resource_type: String,
    default_version: String,
}

impl ResourceDefinition for CatalogDefinition {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn default_version(&self) -> &str {
        &self.default_version
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Versions {
            catalog,
            resource_type,
            json,
        } => run_versions(&catalog, resource_type.as_deref(), json),

        Commands::Validate {
            catalog,
            resource_type,
            props,
            api_version,
            name,
            strict,
            json,
        } => run_validate(ValidateArgs {
            catalog,
            resource_type,
            props,
            api_version,
            name,
            strict,
            json_output: json,
        }),

        Commands::Migrate {
            catalog,
            resource_type,
            from,
            to,
            props,
            json,
        } => run_migrate(&catalog, &resource_type, &from, to.as_deref(), props.as_deref(), json),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// `RUST_LOG` wins; otherwise the `-v` count picks the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_registry(catalog: &str, json_output: bool) -> Result<Arc<VersionRegistry>, u8> {
    let entries = load_catalog_auto(catalog).map_err(|e| {
        report_error(json_output, &format!("loading catalog: {}", e));
        e.exit_code() as u8
    })?;
    let registry = VersionRegistry::new();
    let count = register_catalog(&registry, entries).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;
    debug!(catalog, resource_types = count, "catalog registered");
    Ok(Arc::new(registry))
}

fn controller_for(
    registry: Arc<VersionRegistry>,
    resource_type: &str,
    json_output: bool,
) -> Result<ResourceController<CatalogDefinition>, u8> {
    let supported = registry.supported_versions(resource_type);
    let Some(default_version) = supported.last().cloned() else {
        report_error(
            json_output,
            &format!("resource type {} is not in the catalog", resource_type),
        );
        return Err(2);
    };
    ResourceController::new(
        registry,
        CatalogDefinition {
            resource_type: resource_type.to_string(),
            default_version,
        },
    )
    .map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })
}

fn run_versions(catalog: &str, resource_type: Option<&str>, json_output: bool) -> Result<(), u8> {
    let registry = load_registry(catalog, json_output)?;

    let Some(resource_type) = resource_type else {
        let types = registry.registered_resource_types();
        if json_output {
            println!("{}", serde_json::json!({ "resource_types": types }));
        } else {
            for t in types {
                println!("{}", t);
            }
        }
        return Ok(());
    };

    let Some(versions) = registry.versions(resource_type) else {
        report_error(
            json_output,
            &format!("resource type {} is not in the catalog", resource_type),
        );
        return Err(2);
    };
    let latest = registry.latest_version(resource_type);

    if json_output {
        let listed: Vec<_> = versions
            .iter()
            .map(|d| {
                serde_json::json!({
                    "version": d.version,
                    "support_level": d.support_level,
                    "release_date": d.release_date,
                    "breaking_changes": d.breaking_changes.len(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "resource_type": resource_type,
            "latest": latest,
            "versions": listed,
        });
        println!("{}", output);
    } else {
        println!("{}", resource_type);
        for d in versions.iter() {
            let marker = if latest.as_deref() == Some(d.version.as_str()) {
                " (latest)"
            } else {
                ""
            };
            println!(
                "  {}  {:<11} released {}{}",
                d.version, d.support_level, d.release_date, marker
            );
        }
    }
    Ok(())
}

struct ValidateArgs {
    catalog: String,
    resource_type: String,
    props: PathBuf,
    api_version: Option<String>,
    name: Option<String>,
    strict: bool,
    json_output: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        catalog,
        resource_type,
        props: props_path,
        api_version,
        name,
        strict,
        json_output,
    } = args;

    let props = load_properties(&props_path).map_err(|e| {
        report_error(json_output, &format!("loading properties: {}", e));
        e.exit_code() as u8
    })?;
    let registry = load_registry(&catalog, json_output)?;
    let controller = controller_for(registry, &resource_type, json_output)?;

    let name = name.unwrap_or_else(|| resource_name(&props, &resource_type));
    let mut options = ConstructOptions::new().strict(strict);
    if let Some(version) = api_version {
        options = options.api_version(version);
    }
    let request = ConstructRequest::new(name, "", props).options(options);

    match controller.construct(request) {
        Ok(built) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": true,
                    "version": built.version,
                    "support_level": built.support_level,
                    "properties": built.properties,
                    "warnings": built.validation.as_ref().map(|v| v.warnings.clone()).unwrap_or_default(),
                    "migration": built.migration,
                    "diagnostics": built.diagnostics,
                });
                println!("{}", output);
            } else {
                println!("Valid ({}@{})", built.resource_type, built.version);
                for diagnostic in &built.diagnostics {
                    println!("  {}", diagnostic);
                }
            }
            Ok(())
        }
        Err(LifecycleError::PropertyValidation { version, result, .. }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "version": version,
                    "errors": result.errors,
                    "warnings": result.warnings,
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed ({}@{}):", resource_type, version);
                for error in &result.errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn resource_name(props: &PropertyBag, resource_type: &str) -> String {
    props
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            resource_type
                .rsplit('/')
                .next()
                .unwrap_or(resource_type)
                .to_string()
        })
}

fn run_migrate(
    catalog: &str,
    resource_type: &str,
    from: &str,
    to: Option<&str>,
    props_path: Option<&Path>,
    json_output: bool,
) -> Result<(), u8> {
    let props = match props_path {
        Some(path) => Some(load_properties(path).map_err(|e| {
            report_error(json_output, &format!("loading properties: {}", e));
            e.exit_code() as u8
        })?),
        None => None,
    };
    let registry = load_registry(catalog, json_output)?;
    let controller = controller_for(registry.clone(), resource_type, json_output)?;

    let analysis = controller.analyze_migration_to(from, to).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    let migrated = match &props {
        Some(props) => Some(
            registry
                .migrate_properties(resource_type, &analysis.from_version, &analysis.to_version, props)
                .map_err(|e| {
                    report_error(json_output, &e.to_string());
                    e.exit_code() as u8
                })?,
        ),
        None => None,
    };

    if json_output {
        let mut output = serde_json::to_value(&analysis).map_err(|e| {
            report_error(true, &format!("serializing output: {}", e));
            2u8
        })?;
        if let (Some(migrated), Some(map)) = (migrated, output.as_object_mut()) {
            map.insert("migrated_properties".to_string(), migrated.into());
        }
        println!("{}", output);
    } else {
        println!(
            "{} {} -> {}",
            resource_type, analysis.from_version, analysis.to_version
        );
        println!("  compatible: {}", analysis.compatible);
        println!("  estimated effort: {}", analysis.estimated_effort);
        println!(
            "  automatic upgrade possible: {}",
            analysis.automatic_upgrade_possible
        );
        if !analysis.breaking_changes.is_empty() {
            println!("  breaking changes:");
            for change in &analysis.breaking_changes {
                println!("    - {}", change);
            }
        }
        for warning in &analysis.warnings {
            println!("  warning: {}", warning);
        }
        if let Some(migrated) = migrated {
            println!("  migrated properties: {}", serde_json::Value::Object(migrated));
        }
    }
    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        // Text output
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let is_error = diag.severity >= Severity::Error;
                let color = if is_error { "\x1b[31m" } else { "\x1b[33m" };
                if !quiet || is_error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, diag.severity, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
