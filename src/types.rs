//! Core types for version-aware resource schemas.
//!
//! Everything here is plain data. The mapper, registry, and lifecycle
//! modules operate on these shapes; none of them carry behavior beyond
//! small predicates and message helpers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Open, dynamically keyed property map supplied by callers.
pub type PropertyBag = Map<String, Value>;

/// Highest breaking-change count still rated [`MigrationEffort::Low`].
pub const LOW_EFFORT_MAX: usize = 2;

/// Highest breaking-change count still rated [`MigrationEffort::Medium`].
pub const MEDIUM_EFFORT_MAX: usize = 5;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Returns true when `key` is present in `props` with a non-null value.
///
/// A JSON `null` counts as "explicitly undefined".
pub fn is_present(props: &PropertyBag, key: &str) -> bool {
    props.get(key).is_some_and(|value| !value.is_null())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Declared data type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// No type check.
    #[default]
    Any,
}

impl PropertyType {
    /// Returns true if `value` has this type. `null` never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (PropertyType::Any, _) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Number, Value::Number(_)) => true,
            (PropertyType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (PropertyType::Object, Value::Object(_)) => true,
            (PropertyType::Array, Value::Array(_)) => true,
            _ => false,
        }
    }

    /// Type name with an indefinite article, for messages.
    pub fn describe(&self) -> &'static str {
        match self {
            PropertyType::String => "a string",
            PropertyType::Number => "a number",
            PropertyType::Integer => "an integer",
            PropertyType::Boolean => "a boolean",
            PropertyType::Object => "an object",
            PropertyType::Array => "an array",
            PropertyType::Any => "any value",
        }
    }
}

/// The check performed by a [`ValidationRule`].
///
/// The serialized `rule` tag is the validation rule type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum RuleCheck {
    /// String value must match a regular expression (search semantics).
    Pattern { pattern: String },
    /// Numeric value must fall within inclusive bounds.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// String length or array item count must fall within inclusive bounds.
    Length {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u64>,
    },
    /// Value must equal one of the listed values.
    OneOf { values: Vec<Value> },
}

impl RuleCheck {
    /// JSON Schema fragment equivalent to this check.
    ///
    /// Keywords only constrain values of their own type, so a pattern
    /// never rejects a number and a range never rejects a string.
    pub fn to_json_schema(&self) -> Value {
        match self {
            RuleCheck::Pattern { pattern } => json!({ "pattern": pattern }),
            RuleCheck::Range { min, max } => {
                let mut schema = Map::new();
                if let Some(min) = min {
                    schema.insert("minimum".to_string(), json!(min));
                }
                if let Some(max) = max {
                    schema.insert("maximum".to_string(), json!(max));
                }
                Value::Object(schema)
            }
            RuleCheck::Length { min, max } => {
                let mut schema = Map::new();
                if let Some(min) = min {
                    schema.insert("minLength".to_string(), json!(min));
                    schema.insert("minItems".to_string(), json!(min));
                }
                if let Some(max) = max {
                    schema.insert("maxLength".to_string(), json!(max));
                    schema.insert("maxItems".to_string(), json!(max));
                }
                Value::Object(schema)
            }
            RuleCheck::OneOf { values } => json!({ "enum": values }),
        }
    }

    /// Default failure message for `property`.
    pub fn describe(&self, property: &str) -> String {
        match self {
            RuleCheck::Pattern { pattern } => {
                format!("{} must match pattern {}", property, pattern)
            }
            RuleCheck::Range { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    format!("{} must be between {} and {}", property, min, max)
                }
                (Some(min), None) => format!("{} must be at least {}", property, min),
                (None, Some(max)) => format!("{} must be at most {}", property, max),
                (None, None) => format!("{} is out of range", property),
            },
            RuleCheck::Length { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    format!("{} length must be between {} and {}", property, min, max)
                }
                (Some(min), None) => format!("{} length must be at least {}", property, min),
                (None, Some(max)) => format!("{} length must be at most {}", property, max),
                (None, None) => format!("{} has an invalid length", property),
            },
            RuleCheck::OneOf { values } => {
                let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("{} must be one of: {}", property, allowed.join(", "))
            }
        }
    }
}

/// A single value rule attached to a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(flatten)]
    pub check: RuleCheck,
    /// Replaces the generated message when the rule fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new(check: RuleCheck) -> Self {
        Self {
            check,
            message: None,
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::new(RuleCheck::Pattern {
            pattern: pattern.into(),
        })
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(RuleCheck::Range { min, max })
    }

    pub fn length(min: Option<u64>, max: Option<u64>) -> Self {
        Self::new(RuleCheck::Length { min, max })
    }

    pub fn one_of(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(RuleCheck::OneOf {
            values: values.into_iter().collect(),
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Message reported when this rule fails for `property`.
    pub fn failure_message(&self, property: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.check.describe(property))
    }
}

/// A rule spanning several properties of one bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CrossPropertyRule {
    /// `property` must be present whenever `when` is present.
    RequiredWith {
        property: String,
        when: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// At least one of `properties` must be present.
    AtLeastOneOf {
        properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// At most one of `properties` may be present.
    MutuallyExclusive {
        properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl CrossPropertyRule {
    /// Property names this rule reads.
    pub fn referenced_properties(&self) -> Vec<&str> {
        match self {
            CrossPropertyRule::RequiredWith { property, when, .. } => {
                vec![property.as_str(), when.as_str()]
            }
            CrossPropertyRule::AtLeastOneOf { properties, .. }
            | CrossPropertyRule::MutuallyExclusive { properties, .. } => {
                properties.iter().map(String::as_str).collect()
            }
        }
    }

    /// Evaluates the rule, returning the failure message if it is violated.
    pub fn check(&self, props: &PropertyBag) -> Option<String> {
        match self {
            CrossPropertyRule::RequiredWith {
                property,
                when,
                message,
            } => {
                if is_present(props, when) && !is_present(props, property) {
                    Some(message.clone().unwrap_or_else(|| {
                        format!("{} is required when {} is set", property, when)
                    }))
                } else {
                    None
                }
            }
            CrossPropertyRule::AtLeastOneOf {
                properties,
                message,
            } => {
                if properties.iter().any(|p| is_present(props, p)) {
                    None
                } else {
                    Some(message.clone().unwrap_or_else(|| {
                        format!("at least one of {} must be set", properties.join(", "))
                    }))
                }
            }
            CrossPropertyRule::MutuallyExclusive {
                properties,
                message,
            } => {
                let set: Vec<&str> = properties
                    .iter()
                    .filter(|p| is_present(props, p))
                    .map(String::as_str)
                    .collect();
                if set.len() > 1 {
                    Some(message.clone().unwrap_or_else(|| {
                        format!(
                            "only one of {} may be set (found {})",
                            properties.join(", "),
                            set.join(", ")
                        )
                    }))
                } else {
                    None
                }
            }
        }
    }
}

/// How a property changed relative to the previous version.
///
/// Only consulted when migrating a bag between versions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyTransformation {
    /// Key this property carried in the previous version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    /// Old string values mapped to their replacements.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub value_map: Map<String, Value>,
}

/// Definition of one property in an [`ApiSchema`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyDefinition {
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<PropertyTransformation>,
}

impl PropertyDefinition {
    pub fn new(property_type: PropertyType) -> Self {
        Self {
            property_type,
            ..Self::default()
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_transformation(mut self, transformation: PropertyTransformation) -> Self {
        self.transformation = Some(transformation);
        self
    }
}

/// Property schema for one API version of one resource type.
///
/// `resource_type` and `version` may be left empty in catalog files; the
/// loader fills them from the enclosing document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiSchema {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<CrossPropertyRule>,
}

impl ApiSchema {
    pub fn new(resource_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, def: PropertyDefinition) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    pub fn with_rule(mut self, rule: CrossPropertyRule) -> Self {
        self.validation_rules.push(rule);
        self
    }
}

/// Lifecycle stage of an API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Preview,
    Active,
    /// Bug fixes only. Pinnable, never chosen as latest.
    Maintenance,
    Deprecated,
    Sunset,
}

impl SupportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportLevel::Preview => "preview",
            SupportLevel::Active => "active",
            SupportLevel::Maintenance => "maintenance",
            SupportLevel::Deprecated => "deprecated",
            SupportLevel::Sunset => "sunset",
        }
    }

    /// Deprecated and sunset versions both call for migration.
    pub fn is_deprecated(&self) -> bool {
        matches!(self, SupportLevel::Deprecated | SupportLevel::Sunset)
    }

    /// The phase a version normally moves to next.
    pub fn next_phase(&self) -> Option<SupportLevel> {
        match self {
            SupportLevel::Active => Some(SupportLevel::Maintenance),
            SupportLevel::Maintenance => Some(SupportLevel::Deprecated),
            SupportLevel::Deprecated => Some(SupportLevel::Sunset),
            SupportLevel::Preview | SupportLevel::Sunset => None,
        }
    }

    /// Parse a support level from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(SupportLevel::Preview),
            "active" => Some(SupportLevel::Active),
            "maintenance" => Some(SupportLevel::Maintenance),
            "deprecated" => Some(SupportLevel::Deprecated),
            "sunset" => Some(SupportLevel::Sunset),
            _ => None,
        }
    }
}

impl fmt::Display for SupportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Category of a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    PropertyRemoved,
    PropertyRenamed,
    PropertyTypeChanged,
    PropertyRequired,
    SchemaRestructured,
}

/// A breaking change introduced by a version, relative to its predecessor.
///
/// Catalog files may give a bare string, which becomes the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BreakingChangeRepr")]
pub struct BreakingChange {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChangeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_path: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BreakingChangeRepr {
    Text(String),
    Full {
        description: String,
        #[serde(default)]
        kind: Option<ChangeKind>,
        #[serde(default)]
        property: Option<String>,
        #[serde(default)]
        migration_path: Option<String>,
    },
}

impl From<BreakingChangeRepr> for BreakingChange {
    fn from(repr: BreakingChangeRepr) -> Self {
        match repr {
            BreakingChangeRepr::Text(description) => BreakingChange::new(description),
            BreakingChangeRepr::Full {
                description,
                kind,
                property,
                migration_path,
            } => BreakingChange {
                description,
                kind,
                property,
                migration_path,
            },
        }
    }
}

impl BreakingChange {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind: None,
            property: None,
            migration_path: None,
        }
    }

    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn on_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_migration_path(mut self, path: impl Into<String>) -> Self {
        self.migration_path = Some(path.into());
        self
    }

    /// Removals, type changes, and restructurings need a human.
    pub fn blocks_automatic_upgrade(&self) -> bool {
        matches!(
            self.kind,
            Some(ChangeKind::PropertyRemoved)
                | Some(ChangeKind::PropertyTypeChanged)
                | Some(ChangeKind::SchemaRestructured)
        )
    }
}

impl From<&str> for BreakingChange {
    fn from(description: &str) -> Self {
        BreakingChange::new(description)
    }
}

impl fmt::Display for BreakingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// One registered API revision of a resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
    pub support_level: SupportLevel,
    pub release_date: NaiveDate,
    #[serde(default)]
    pub schema: ApiSchema,
    /// Changes relative to the previous version, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breaking_changes: Vec<BreakingChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide: Option<String>,
}

impl VersionDescriptor {
    /// The version string is taken from the schema.
    pub fn new(schema: ApiSchema, support_level: SupportLevel, release_date: NaiveDate) -> Self {
        Self {
            version: schema.version.clone(),
            support_level,
            release_date,
            schema,
            breaking_changes: Vec::new(),
            deprecation_date: None,
            sunset_date: None,
            migration_guide: None,
        }
    }

    pub fn with_breaking_change(mut self, change: impl Into<BreakingChange>) -> Self {
        self.breaking_changes.push(change.into());
        self
    }

    pub fn with_sunset_date(mut self, date: NaiveDate) -> Self {
        self.sunset_date = Some(date);
        self
    }

    pub fn with_deprecation_date(mut self, date: NaiveDate) -> Self {
        self.deprecation_date = Some(date);
        self
    }

    pub fn with_migration_guide(mut self, guide: impl Into<String>) -> Self {
        self.migration_guide = Some(guide.into());
        self
    }
}

/// Outcome of validating one property bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// `valid` is derived from `errors`.
    pub fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Rough size of a migration, derived from the breaking-change count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationEffort {
    None,
    Low,
    Medium,
    High,
}

impl MigrationEffort {
    /// 0 → none, 1..=2 → low, 3..=5 → medium, more → high.
    pub fn from_change_count(count: usize) -> Self {
        match count {
            0 => MigrationEffort::None,
            n if n <= LOW_EFFORT_MAX => MigrationEffort::Low,
            n if n <= MEDIUM_EFFORT_MAX => MigrationEffort::Medium,
            _ => MigrationEffort::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationEffort::None => "none",
            MigrationEffort::Low => "low",
            MigrationEffort::Medium => "medium",
            MigrationEffort::High => "high",
        }
    }
}

impl fmt::Display for MigrationEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison of two versions of the same resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationAnalysis {
    pub from_version: String,
    pub to_version: String,
    /// True iff `breaking_changes` is empty.
    pub compatible: bool,
    pub breaking_changes: Vec<BreakingChange>,
    pub warnings: Vec<String>,
    pub estimated_effort: MigrationEffort,
    pub automatic_upgrade_possible: bool,
}

/// Filters for [`crate::VersionRegistry::find_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraints {
    pub support_level: Option<SupportLevel>,
    /// Skip deprecated and sunset versions. Defaults to true.
    pub exclude_deprecated: bool,
    pub not_older_than: Option<NaiveDate>,
}

impl Default for VersionConstraints {
    fn default() -> Self {
        Self {
            support_level: None,
            exclude_deprecated: true,
            not_older_than: None,
        }
    }
}

impl VersionConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn support_level(mut self, level: SupportLevel) -> Self {
        self.support_level = Some(level);
        self
    }

    pub fn exclude_deprecated(mut self, exclude: bool) -> Self {
        self.exclude_deprecated = exclude;
        self
    }

    pub fn not_older_than(mut self, date: NaiveDate) -> Self {
        self.not_older_than = Some(date);
        self
    }

    pub fn matches(&self, descriptor: &VersionDescriptor) -> bool {
        if let Some(level) = self.support_level {
            if descriptor.support_level != level {
                return false;
            }
        }
        if self.exclude_deprecated && descriptor.support_level.is_deprecated() {
            return false;
        }
        if let Some(cutoff) = self.not_older_than {
            if descriptor.release_date < cutoff {
                return false;
            }
        }
        true
    }
}

/// Lifecycle snapshot of a registered version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionLifecycle {
    pub version: String,
    pub phase: SupportLevel,
    pub release_date: NaiveDate,
    pub next_phase: Option<SupportLevel>,
    pub sunset_date: Option<NaiveDate>,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
