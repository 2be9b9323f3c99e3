//! Workflow template definition, parsing, and substitution.
//!
//! A template specification has three top-level elements:
//! - `workflow`: the engine document, with `$[[id]]` placeholder tokens
//! - `parameters`: typed declarations for the tokens
//! - `results`: optional result schema for benchmark leaderboards

mod parameters;
mod parser;
mod schema;
mod substitute;
pub mod token;
mod types;

pub use parameters::{coerce, Arguments, DataType, ParameterSet, ParameterValue, TemplateParameter};
pub use parser::{from_document, parse_document, parse_template, parse_template_file, SpecFormat};
pub use schema::{ColumnType, ResultColumn, ResultRow, ResultSchema, ResultValue, SortColumn};
pub use substitute::{check_references, references, substitute};
pub use types::WorkflowTemplate;
