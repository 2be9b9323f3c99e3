//! Result schema and leaderboard ordering.
//!
//! A benchmark template may declare the file its runs write results to and
//! the typed columns of that document. The schema validates each result
//! document and ranks rows by the declared `orderBy` columns.
//!
//! ```yaml
//! results:
//!   file: results/analytics.json
//!   schema:
//!     - id: avg_count
//!       name: Avg. Chars per Line
//!       type: decimal
//!     - id: max_len
//!       name: Max. Output Line Length
//!       type: int
//!   orderBy:
//!     - id: avg_count
//!       sortDesc: true
//!     - id: max_len
//!       sortDesc: false
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Decimal,
    String,
}

impl ColumnType {
    /// Storage type used for the column in a relational store.
    pub fn storage_type(&self) -> &'static str {
        match self {
            ColumnType::Int => "INTEGER",
            ColumnType::Decimal => "DOUBLE",
            ColumnType::String => "TEXT",
        }
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" => Ok(ColumnType::Int),
            "decimal" => Ok(ColumnType::Decimal),
            "string" => Ok(ColumnType::String),
            other => Err(Error::InvalidTemplate(format!(
                "unknown column type '{}'",
                other
            ))),
        }
    }
}

/// A typed value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Int(i64),
    Decimal(f64),
    Text(String),
}

impl ResultValue {
    fn compare(&self, other: &ResultValue) -> Ordering {
        match (self, other) {
            (ResultValue::Int(a), ResultValue::Int(b)) => a.cmp(b),
            (ResultValue::Text(a), ResultValue::Text(b)) => a.cmp(b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            ResultValue::Int(n) => *n as f64,
            ResultValue::Decimal(x) => *x,
            ResultValue::Text(_) => f64::NAN,
        }
    }
}

/// A validated result document, keyed by column id.
pub type ResultRow = IndexMap<String, ResultValue>;

#[derive(Debug, Deserialize)]
struct RawColumn {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    column_type: Option<String>,
    #[serde(default)]
    required: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawSortColumn {
    id: String,
    #[serde(default, rename = "sortDesc")]
    sort_desc: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    schema: Option<Vec<RawColumn>>,
    #[serde(default)]
    order_by: Vec<RawSortColumn>,
}

/// A column of the result document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultColumn {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub required: bool,
}

impl ResultColumn {
    fn value(&self, raw: &Value) -> Result<ResultValue> {
        let value = match (self.column_type, raw) {
            (ColumnType::Int, Value::Number(n)) => n.as_i64().map(ResultValue::Int),
            (ColumnType::Decimal, Value::Number(n)) => n.as_f64().map(ResultValue::Decimal),
            (ColumnType::String, Value::String(s)) => Some(ResultValue::Text(s.clone())),
            _ => None,
        };
        value.ok_or_else(|| {
            Error::invalid_value(
                &self.id,
                format!("expected {} but got {}", self.column_type.storage_type(), raw),
            )
        })
    }
}

/// One `orderBy` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortColumn {
    pub id: String,
    #[serde(rename = "sortDesc")]
    pub sort_desc: bool,
}

/// Result schema of a benchmark template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSchema {
    /// Path of the result document, relative to the run output.
    #[serde(rename = "file")]
    pub result_file: String,
    #[serde(rename = "schema")]
    pub columns: Vec<ResultColumn>,
    #[serde(rename = "orderBy")]
    pub order_by: Vec<SortColumn>,
}

impl ResultSchema {
    /// Parse the `results` section of a template document.
    pub fn from_value(doc: &Value) -> Result<Self> {
        if !doc.is_object() {
            return Err(Error::InvalidTemplate(
                "'results' must be an object".to_string(),
            ));
        }
        let raw: RawSchema = serde_json::from_value(doc.clone())
            .map_err(|e| Error::InvalidTemplate(format!("invalid result schema: {}", e)))?;

        let result_file = raw
            .file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::InvalidTemplate("result schema has no 'file'".to_string()))?;
        let raw_columns = raw
            .schema
            .ok_or_else(|| Error::InvalidTemplate("result schema has no 'schema'".to_string()))?;
        if raw_columns.is_empty() {
            return Err(Error::InvalidTemplate(
                "result schema declares no columns".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut columns = Vec::with_capacity(raw_columns.len());
        for (position, col) in raw_columns.into_iter().enumerate() {
            let id = col.id.filter(|id| !id.is_empty()).ok_or_else(|| {
                Error::InvalidTemplate(format!("column at position {} has no id", position))
            })?;
            let column_type: ColumnType = col
                .column_type
                .as_deref()
                .ok_or_else(|| Error::InvalidTemplate(format!("column '{}' has no type", id)))?
                .parse()?;
            let name = col.name.unwrap_or_else(|| id.clone());
            if !ids.insert(id.clone()) {
                return Err(Error::InvalidTemplate(format!(
                    "duplicate column id '{}'",
                    id
                )));
            }
            if !names.insert(name.clone()) {
                return Err(Error::InvalidTemplate(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
            columns.push(ResultColumn {
                id,
                name,
                column_type,
                required: col.required.unwrap_or(true),
            });
        }

        let mut order_by = Vec::with_capacity(raw.order_by.len());
        for sort in raw.order_by {
            if !ids.contains(&sort.id) {
                return Err(Error::InvalidTemplate(format!(
                    "orderBy references unknown column '{}'",
                    sort.id
                )));
            }
            order_by.push(SortColumn {
                id: sort.id,
                sort_desc: sort.sort_desc.unwrap_or(true),
            });
        }

        Ok(Self {
            result_file,
            columns,
            order_by,
        })
    }

    pub fn column(&self, id: &str) -> Option<&ResultColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Sort order used for ranking; the first column descending when none is declared.
    pub fn effective_order(&self) -> Vec<SortColumn> {
        if !self.order_by.is_empty() {
            return self.order_by.clone();
        }
        self.columns
            .first()
            .map(|c| SortColumn {
                id: c.id.clone(),
                sort_desc: true,
            })
            .into_iter()
            .collect()
    }

    /// Validate a result document and convert it into a typed row.
    ///
    /// Unknown keys are ignored. Absent or null optional columns are left out.
    pub fn validate(&self, doc: &Map<String, Value>) -> Result<ResultRow> {
        let mut row = ResultRow::new();
        for col in &self.columns {
            match doc.get(&col.id) {
                None | Some(Value::Null) => {
                    if col.required {
                        return Err(Error::missing_value(&col.id));
                    }
                }
                Some(raw) => {
                    row.insert(col.id.clone(), col.value(raw)?);
                }
            }
        }
        Ok(row)
    }

    /// Read and validate the result document produced by a run.
    pub fn read_result_file(&self, run_dir: &Path) -> Result<ResultRow> {
        let path = run_dir.join(&self.result_file);
        let content = std::fs::read_to_string(&path)?;
        let doc: Value = serde_json::from_str(&content)?;
        match doc {
            Value::Object(map) => self.validate(&map),
            _ => Err(Error::InvalidValue {
                id: self.result_file.clone(),
                message: "result document is not an object".to_string(),
            }),
        }
    }

    /// Compare two rows for the leaderboard. `Less` ranks first.
    ///
    /// Missing values rank after present ones regardless of direction.
    pub fn compare(&self, a: &ResultRow, b: &ResultRow) -> Ordering {
        for sort in self.effective_order() {
            let ord = match (a.get(&sort.id), b.get(&sort.id)) {
                (Some(x), Some(y)) => {
                    let ord = x.compare(y);
                    if sort.sort_desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sort rows into leaderboard order. Ties keep their input order.
    pub fn rank(&self, rows: &mut [ResultRow]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}
