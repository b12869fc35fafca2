//! Property-bag validation and defaulting against one version's schema.
//!
//! A [`SchemaMapper`] binds to a single [`ApiSchema`] snapshot. Each value
//! rule is compiled once into a JSON Schema validator at construction, so
//! validating many bags against the same schema does no recompilation.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{MapperError, TransformError};
use crate::types::{json_type_name, ApiSchema, PropertyBag, PropertyType, ValidationResult, ValidationRule};

/// Options controlling how a [`SchemaMapper`] validates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// Reject properties not declared in the schema.
    pub strict: bool,
}

impl MapperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

struct CompiledRule<'a> {
    rule: &'a ValidationRule,
    validator: jsonschema::Validator,
}

/// Validator and defaulter bound to one schema.
pub struct SchemaMapper<'a> {
    schema: &'a ApiSchema,
    options: MapperOptions,
    rules: BTreeMap<&'a str, Vec<CompiledRule<'a>>>,
}

impl<'a> SchemaMapper<'a> {
    /// Build a mapper with default options.
    ///
    /// # Errors
    ///
    /// Returns `MapperError::InvalidSchema` if the schema has no resource
    /// type or version, and `MapperError::InvalidRule` if a rule cannot be
    /// compiled (for example a malformed regular expression).
    pub fn new(schema: &'a ApiSchema) -> Result<Self, MapperError> {
        Self::with_options(schema, MapperOptions::default())
    }

    pub fn with_options(schema: &'a ApiSchema, options: MapperOptions) -> Result<Self, MapperError> {
        if schema.resource_type.trim().is_empty() || schema.version.trim().is_empty() {
            return Err(MapperError::InvalidSchema {
                resource_type: schema.resource_type.clone(),
                version: schema.version.clone(),
                message: "resource type and version must be set".into(),
            });
        }

        let mut rules = BTreeMap::new();
        for (name, def) in &schema.properties {
            let mut compiled = Vec::with_capacity(def.rules.len());
            for rule in &def.rules {
                let validator = jsonschema::validator_for(&rule.check.to_json_schema()).map_err(|e| {
                    MapperError::InvalidRule {
                        property: name.clone(),
                        message: e.to_string(),
                    }
                })?;
                compiled.push(CompiledRule { rule, validator });
            }
            if !compiled.is_empty() {
                rules.insert(name.as_str(), compiled);
            }
        }

        Ok(Self {
            schema,
            options,
            rules,
        })
    }

    pub fn schema(&self) -> &ApiSchema {
        self.schema
    }

    pub fn options(&self) -> MapperOptions {
        self.options
    }

    /// Names of required properties, in schema order.
    pub fn required_properties(&self) -> Vec<&str> {
        self.schema
            .properties
            .iter()
            .filter(|(_, def)| def.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn deprecated_properties(&self) -> Vec<&str> {
        self.schema
            .properties
            .iter()
            .filter(|(_, def)| def.deprecated)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Return a copy of `props` with schema defaults filled in.
    ///
    /// A default is inserted only where the key is absent or `null`.
    /// Present values, including `false`, `0`, and `""`, are kept.
    pub fn apply_defaults(&self, props: &PropertyBag) -> PropertyBag {
        let mut out = props.clone();
        for (name, def) in &self.schema.properties {
            let Some(default) = &def.default else {
                continue;
            };
            let missing = out.get(name).map_or(true, Value::is_null);
            if missing {
                out.insert(name.clone(), default.clone());
            }
        }
        out
    }

    /// Validate `props` against the schema, collecting every violation.
    ///
    /// Defaults are applied first, so a required property with a default
    /// never fails the required check.
    pub fn validate_properties(&self, props: &PropertyBag) -> ValidationResult {
        let props = self.apply_defaults(props);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (name, def) in &self.schema.properties {
            if def.required && props.get(name).map_or(true, Value::is_null) {
                errors.push(format!("{} is required", name));
            }
        }

        for (name, value) in &props {
            let Some(def) = self.schema.properties.get(name) else {
                if self.options.strict {
                    errors.push(format!("{} is not defined in schema", name));
                } else {
                    warnings.push(format!(
                        "{} is not defined in schema {}@{}",
                        name, self.schema.resource_type, self.schema.version
                    ));
                }
                continue;
            };

            if value.is_null() {
                continue;
            }

            if def.deprecated {
                warnings.push(format!("{} is deprecated", name));
            }

            if !def.property_type.matches(value) {
                errors.push(format!(
                    "{} must be {}, got {}",
                    name,
                    def.property_type.describe(),
                    json_type_name(value)
                ));
                continue;
            }

            if let Some(compiled) = self.rules.get(name.as_str()) {
                for c in compiled {
                    if !c.validator.is_valid(value) {
                        errors.push(c.rule.failure_message(name));
                    }
                }
            }
        }

        for rule in &self.schema.validation_rules {
            if let Some(message) = rule.check(&props) {
                errors.push(message);
            }
        }

        ValidationResult::from_parts(errors, warnings)
    }

    /// Carry `props` from the previous version into this schema's shape.
    ///
    /// Renames keys, maps old enum values, then coerces primitive values
    /// toward their declared types.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` if a value cannot be coerced to its
    /// declared type.
    pub fn transform_properties(&self, props: &PropertyBag) -> Result<PropertyBag, TransformError> {
        let mut out = props.clone();

        for (name, def) in &self.schema.properties {
            let Some(transformation) = &def.transformation else {
                continue;
            };
            if let Some(old) = &transformation.renamed_from {
                if !out.contains_key(name) {
                    if let Some(value) = out.remove(old) {
                        out.insert(name.clone(), value);
                    }
                }
            }
            if let Some(Value::String(current)) = out.get(name) {
                if let Some(mapped) = transformation.value_map.get(current) {
                    let mapped = mapped.clone();
                    out.insert(name.clone(), mapped);
                }
            }
        }

        for (name, def) in &self.schema.properties {
            if let Some(value) = out.get_mut(name) {
                if !value.is_null() && !def.property_type.matches(value) {
                    *value = coerce(name, value, def.property_type)?;
                }
            }
        }

        Ok(out)
    }
}

fn coerce(name: &str, value: &Value, target: PropertyType) -> Result<Value, TransformError> {
    let fail = || TransformError {
        property: name.to_string(),
        message: format!("cannot convert {} to {}", json_type_name(value), target.describe()),
    };

    match (target, value) {
        (PropertyType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (PropertyType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (PropertyType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| fail()),
        (PropertyType::Integer, Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
            _ => Err(fail()),
        },
        (PropertyType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(fail),
        (PropertyType::Boolean, Value::String(s)) => match s.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        _ => Err(fail()),
    }
}
