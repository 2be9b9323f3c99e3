//! Template specification parser.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::parameters::ParameterSet;
use super::schema::ResultSchema;
use super::substitute::check_references;
use super::types::WorkflowTemplate;
use crate::error::{Error, Result};

/// Serialization format of a specification file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
}

impl SpecFormat {
    /// Format for a file, from its suffix.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Some(SpecFormat::Yaml),
            Some("json") => Some(SpecFormat::Json),
            _ => None,
        }
    }
}

/// Parse a specification string into a document tree.
pub fn parse_document(content: &str, format: SpecFormat) -> Result<Value> {
    if content.trim().is_empty() {
        return Err(Error::InvalidTemplate(
            "empty template specification".to_string(),
        ));
    }
    let doc = match format {
        SpecFormat::Yaml => serde_yaml::from_str::<Value>(content)
            .map_err(|e| Error::InvalidTemplate(format!("invalid YAML: {}", e)))?,
        SpecFormat::Json => serde_json::from_str::<Value>(content)
            .map_err(|e| Error::InvalidTemplate(format!("invalid JSON: {}", e)))?,
    };
    Ok(doc)
}

/// Build a template from a parsed specification document.
///
/// Any `id` element in the document is ignored in favor of `identifier`.
pub fn from_document(doc: &Value, identifier: &str) -> Result<WorkflowTemplate> {
    let obj = doc.as_object().ok_or_else(|| {
        Error::InvalidTemplate("template specification must be a mapping".to_string())
    })?;

    let workflow_spec = match obj.get("workflow") {
        Some(Value::Null) | None => {
            return Err(Error::InvalidTemplate(
                "missing element 'workflow'".to_string(),
            ))
        }
        Some(spec) => spec.clone(),
    };

    let parameters = match obj.get("parameters") {
        None | Some(Value::Null) => ParameterSet::default(),
        Some(Value::Array(decls)) => ParameterSet::from_declarations(decls)?,
        Some(_) => {
            return Err(Error::InvalidTemplate(
                "'parameters' must be a list".to_string(),
            ))
        }
    };

    let result_schema = match obj.get("results") {
        None | Some(Value::Null) => None,
        Some(results) => Some(ResultSchema::from_value(results)?),
    };

    check_references(&workflow_spec, &parameters)?;

    debug!(
        identifier,
        parameters = parameters.len(),
        has_results = result_schema.is_some(),
        "Parsed workflow template"
    );

    Ok(WorkflowTemplate {
        identifier: identifier.to_string(),
        workflow_spec,
        parameters,
        result_schema,
    })
}

/// Parse a specification string.
pub fn parse_template(content: &str, format: SpecFormat, identifier: &str) -> Result<WorkflowTemplate> {
    let doc = parse_document(content, format)?;
    from_document(&doc, identifier)
}

/// Parse a specification file; the format follows the file suffix.
pub fn parse_template_file(path: &Path, identifier: &str) -> Result<WorkflowTemplate> {
    let format = SpecFormat::from_path(path).ok_or_else(|| {
        Error::InvalidTemplate(format!(
            "unsupported specification file '{}'",
            path.display()
        ))
    })?;
    let content = std::fs::read_to_string(path)?;
    parse_template(&content, format, identifier)
}
