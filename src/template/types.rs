//! Workflow template type.

use serde_json::{Map, Value};

use super::parameters::{Arguments, ParameterSet};
use super::schema::ResultSchema;
use super::substitute;
use crate::error::Result;

/// A parameterized workflow: the engine document, its parameter
/// declarations and an optional result schema.
///
/// # Example YAML
///
/// ```yaml
/// workflow:
///   version: 0.3.0
///   inputs:
///     files:
///       - code/helloworld.py
///       - $[[names]]
///     parameters:
///       inputfile: $[[names]]
///       sleeptime: $[[sleeptime]]
/// parameters:
///   - id: names
///     datatype: file
///     as: data/names.txt
///   - id: sleeptime
///     datatype: int
///     defaultValue: 10
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    /// Repository-assigned identifier.
    pub identifier: String,

    /// Engine document with embedded `$[[id]]` tokens.
    pub workflow_spec: Value,

    pub parameters: ParameterSet,

    pub result_schema: Option<ResultSchema>,
}

impl WorkflowTemplate {
    /// Produce the ready-to-run engine document for the given arguments.
    pub fn instantiate(&self, args: &Arguments) -> Result<Value> {
        substitute::substitute(&self.workflow_spec, &self.parameters, args)
    }

    /// Normalized specification document, as persisted by the repository.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("id".to_string(), Value::String(self.identifier.clone()));
        doc.insert("workflow".to_string(), self.workflow_spec.clone());
        doc.insert(
            "parameters".to_string(),
            Value::Array(self.parameters.to_declarations()),
        );
        if let Some(schema) = &self.result_schema {
            doc.insert(
                "results".to_string(),
                serde_json::to_value(schema).unwrap_or(Value::Null),
            );
        }
        Value::Object(doc)
    }
}
