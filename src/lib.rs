//! flowtmpl - parameterized workflow templates
//!
//! A template is a workflow document in which selected values are replaced
//! by typed `$[[id]]` placeholders. Callers declare the parameters, supply
//! arguments, and get back a ready-to-run document. An optional result
//! schema describes the benchmark output file and how runs are ranked.
//!
//! ## Example
//!
//! ```yaml
//! workflow:
//!   version: 0.3.0
//!   inputs:
//!     files:
//!       - code/helloworld.py
//!       - $[[names]]
//!     parameters:
//!       inputfile: $[[names]]
//!       sleeptime: $[[sleeptime]]
//!   workflow:
//!     type: serial
//!     specification:
//!       steps:
//!         - environment: 'python:3.7'
//!           commands:
//!             - python code/helloworld.py --inputfile "${inputfile}" --sleeptime ${sleeptime}
//! parameters:
//!   - id: names
//!     name: 'Input file'
//!     datatype: file
//!     as: data/names.txt
//!   - id: sleeptime
//!     datatype: int
//!     defaultValue: 10
//! results:
//!   file: results/analytics.json
//!   schema:
//!     - id: avg_count
//!       type: decimal
//!     - id: max_len
//!       type: int
//!   orderBy:
//!     - id: avg_count
//!       sortDesc: true
//! ```
//!
//! Templates are stored in a [`TemplateRepository`], which ingests them
//! from a local directory or a remote repository.

pub mod config;
pub mod error;
pub mod repository;
pub mod telemetry;
pub mod template;

pub use config::{Config, RepositoryConfig};
pub use error::{Error, Result};
pub use repository::{GitCloner, SourceCloner, TemplateRepository, TemplateSource};
pub use template::{Arguments, ParameterValue, ResultSchema, WorkflowTemplate};
