//! Generator options and the naming templates.
//!
//! `file_name` placeholders: `{path}` (proto path without `.proto`), `{dir}`,
//! `{name}` (file stem) and `{package}`. An empty `file_name` puts every type
//! into one artifact named after the descriptor set.
//!
//! `type_prefix` placeholders: `{package}` (dots become `_`), `{type}`
//! (nested names joined by `_`) and `{name}` (innermost name). The rendered
//! prefix is snake_cased; an empty prefix gives bare routine names.

use tracing::debug;

use crate::error::{CodegenError, Result};
use crate::naming::{relative_name, snake_case};

pub const DEFAULT_FILE_NAME: &str = "{path}.sql";
pub const DEFAULT_TYPE_PREFIX: &str = "{type}";

const FILE_PLACEHOLDERS: &[&str] = &["path", "dir", "name", "package"];
const TYPE_PLACEHOLDERS: &[&str] = &["package", "type", "name"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    /// Header identifier, and the registry handle the converters pass to
    /// the runtime.
    pub descriptor_set_name: String,
    /// Per-field accessors; without them only `new`, `to_protobuf`,
    /// `from_protobuf` (and the JSON converters) are emitted.
    pub generate_methods: bool,
    /// Also emit well-known types reachable from the input files.
    pub include_wkt: bool,
    pub file_name: String,
    pub type_prefix: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            descriptor_set_name: "protosql".to_string(),
            generate_methods: true,
            include_wkt: false,
            file_name: DEFAULT_FILE_NAME.to_string(),
            type_prefix: DEFAULT_TYPE_PREFIX.to_string(),
        }
    }
}

impl GenerateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptor_set_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor_set_name = name.into();
        self
    }

    pub fn with_generate_methods(mut self, on: bool) -> Self {
        self.generate_methods = on;
        self
    }

    pub fn with_include_wkt(mut self, on: bool) -> Self {
        self.include_wkt = on;
        self
    }

    pub fn with_file_name(mut self, template: impl Into<String>) -> Self {
        self.file_name = template.into();
        self
    }

    pub fn with_type_prefix(mut self, template: impl Into<String>) -> Self {
        self.type_prefix = template.into();
        self
    }

    /// Parses a protoc plugin parameter string:
    /// `descriptor_set_name=shop,generate_methods=false,type_prefix={name}`.
    pub fn from_parameter(parameter: &str) -> Result<Self> {
        let mut config = Self::default();
        for item in parameter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item.split_once('=').unwrap_or((item, ""));
            let (key, value) = (key.trim(), value.trim());
            debug!(key, value, "generator parameter");
            match key {
                "descriptor_set_name" => {
                    if value.is_empty() {
                        return Err(invalid(key, "must not be empty"));
                    }
                    config.descriptor_set_name = value.to_string();
                }
                "generate_methods" => config.generate_methods = parse_bool(key, value)?,
                "include_wkt" => config.include_wkt = parse_bool(key, value)?,
                "file_name" => config.file_name = value.to_string(),
                "type_prefix" => config.type_prefix = value.to_string(),
                other => return Err(CodegenError::UnknownParameter(other.to_string())),
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks both templates for unknown placeholders.
    pub fn validate(&self) -> Result<()> {
        check_placeholders(&self.file_name, FILE_PLACEHOLDERS)?;
        check_placeholders(&self.type_prefix, TYPE_PLACEHOLDERS)
    }

    /// Output path for a source file; `None` when everything collapses into
    /// one artifact.
    pub fn file_name_for(&self, proto_path: &str, package: &str) -> Result<Option<String>> {
        if self.file_name.is_empty() {
            return Ok(None);
        }
        let path = proto_path.strip_suffix(".proto").unwrap_or(proto_path);
        let (dir, name) = match path.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", path),
        };
        render(
            &self.file_name,
            &[("path", path), ("dir", dir), ("name", name), ("package", package)],
        )
        .map(Some)
    }

    /// Artifact name used when `file_name` is empty.
    pub fn single_file_name(&self) -> String {
        format!("{}.sql", snake_case(&self.descriptor_set_name))
    }

    /// Routine prefix for the message or enum `full_name` of `package`.
    pub fn type_prefix_for(&self, package: &str, full_name: &str) -> Result<String> {
        let relative = relative_name(package, full_name);
        let name = relative.rsplit('.').next().unwrap_or(relative);
        let package = package.replace('.', "_");
        let ty = relative.replace('.', "_");
        let rendered = render(
            &self.type_prefix,
            &[("package", &package), ("type", &ty), ("name", name)],
        )?;
        Ok(snake_case(&rendered))
    }
}

fn invalid(key: &str, reason: &str) -> CodegenError {
    CodegenError::InvalidParameter {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "yes" | "" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, "expected true or false")),
    }
}

/// Placeholders of `template` in order.
fn placeholders(template: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        out.push(&after[..end]);
        rest = &after[end + 1..];
    }
    out
}

fn check_placeholders(template: &str, allowed: &[&str]) -> Result<()> {
    match placeholders(template).into_iter().find(|p| !allowed.contains(p)) {
        Some(p) => Err(CodegenError::Template {
            template: template.to_string(),
            placeholder: p.to_string(),
        }),
        None => Ok(()),
    }
}

fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        out.push_str(&rest[..start]);
        let key = &after[..end];
        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| CodegenError::Template {
                template: template.to_string(),
                placeholder: key.to_string(),
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_override_defaults() {
        let config = GenerateConfig::from_parameter(
            "descriptor_set_name=shop, generate_methods=false,include_wkt=true,type_prefix={package}_{name}",
        )
        .unwrap();
        assert_eq!(config.descriptor_set_name, "shop");
        assert!(!config.generate_methods);
        assert!(config.include_wkt);
        assert_eq!(config.type_prefix_for("acme.v1", "acme.v1.Order.Item").unwrap(), "acme_v1_item");
        assert_eq!(GenerateConfig::from_parameter("").unwrap(), GenerateConfig::default());
    }

    #[test]
    fn unknown_parameters_and_placeholders_fail() {
        assert!(matches!(
            GenerateConfig::from_parameter("frobnicate=1"),
            Err(CodegenError::UnknownParameter(p)) if p == "frobnicate"
        ));
        assert!(matches!(
            GenerateConfig::from_parameter("generate_methods=maybe"),
            Err(CodegenError::InvalidParameter { .. })
        ));
        assert!(matches!(
            GenerateConfig::from_parameter("file_name={stem}.sql"),
            Err(CodegenError::Template { .. })
        ));
    }

    #[test]
    fn file_names_render_from_the_proto_path() {
        let config = GenerateConfig::new();
        assert_eq!(
            config.file_name_for("acme/shop.proto", "acme").unwrap().as_deref(),
            Some("acme/shop.sql")
        );
        let config = config.with_file_name("{dir}/{package}_{name}.mysql");
        assert_eq!(
            config.file_name_for("acme/shop.proto", "acme").unwrap().as_deref(),
            Some("acme/acme_shop.mysql")
        );
        assert_eq!(config.with_file_name("").file_name_for("x.proto", "").unwrap(), None);
    }

    #[test]
    fn type_prefixes_are_snake_cased() {
        let config = GenerateConfig::new();
        assert_eq!(config.type_prefix_for("acme", "acme.OrderItem").unwrap(), "order_item");
        assert_eq!(config.type_prefix_for("acme", "acme.Order.Item").unwrap(), "order_item");
        let bare = config.with_type_prefix("");
        assert_eq!(bare.type_prefix_for("acme", "acme.Order").unwrap(), "");
    }
}
