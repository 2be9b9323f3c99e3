//! Template parameter declarations and argument value coercion.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// User-supplied argument values, keyed by parameter id.
pub type Arguments = HashMap<String, Value>;

/// Parameter data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    File,
    Int,
    Decimal,
    Bool,
    String,
}

impl DataType {
    fn label(&self) -> &'static str {
        match self {
            DataType::File => "file",
            DataType::Int => "integer",
            DataType::Decimal => "decimal",
            DataType::Bool => "bool",
            DataType::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::File => write!(f, "file"),
            DataType::Int => write!(f, "int"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::Bool => write!(f, "bool"),
            DataType::String => write!(f, "string"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(DataType::File),
            "int" => Ok(DataType::Int),
            "decimal" => Ok(DataType::Decimal),
            "bool" => Ok(DataType::Bool),
            "string" => Ok(DataType::String),
            other => Err(Error::InvalidTemplate(format!(
                "unknown datatype '{}'",
                other
            ))),
        }
    }
}

/// A typed value resolved for a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    Decimal(f64),
    Bool(bool),
    String(String),
    /// Path of a supplied file.
    File(String),
}

impl ParameterValue {
    /// Native JSON scalar for whole-value substitution.
    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::Int(n) => Value::from(*n),
            // Non-finite decimals are rejected during coercion.
            ParameterValue::Decimal(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParameterValue::Bool(b) => Value::Bool(*b),
            ParameterValue::String(s) | ParameterValue::File(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(n) => write!(f, "{}", n),
            ParameterValue::Decimal(_) => write!(f, "{}", self.to_json()),
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::String(s) | ParameterValue::File(s) => f.write_str(s),
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ParameterValue::Int(n) => serializer.serialize_i64(*n),
            ParameterValue::Decimal(x) => serializer.serialize_f64(*x),
            ParameterValue::Bool(b) => serializer.serialize_bool(*b),
            ParameterValue::String(s) | ParameterValue::File(s) => serializer.serialize_str(s),
        }
    }
}

const TRUE_LITERALS: &[&str] = &["true", "yes", "y", "t", "1"];
const FALSE_LITERALS: &[&str] = &["false", "no", "n", "f", "0"];

/// Coerce a raw value into the typed value for `datatype`.
///
/// `id` is only used to label the error.
pub fn coerce(id: &str, datatype: DataType, raw: &Value) -> Result<ParameterValue> {
    let invalid = |what: &str| {
        Error::invalid_value(
            id,
            format!("expected {} but got {}", what, describe(raw)),
        )
    };

    match datatype {
        DataType::Int => match raw {
            Value::Number(n) => n.as_i64().map(ParameterValue::Int).ok_or_else(|| invalid("integer")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(ParameterValue::Int)
                .map_err(|_| invalid("integer")),
            _ => Err(invalid("integer")),
        },
        DataType::Decimal => {
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match parsed {
                Some(x) if x.is_finite() => Ok(ParameterValue::Decimal(x)),
                _ => Err(invalid("decimal")),
            }
        }
        DataType::Bool => match raw {
            Value::Bool(b) => Ok(ParameterValue::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(ParameterValue::Bool(true)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(ParameterValue::Bool(false)),
            Value::String(s) => {
                let lower = s.trim().to_lowercase();
                if TRUE_LITERALS.contains(&lower.as_str()) {
                    Ok(ParameterValue::Bool(true))
                } else if FALSE_LITERALS.contains(&lower.as_str()) {
                    Ok(ParameterValue::Bool(false))
                } else {
                    Err(invalid("bool"))
                }
            }
            _ => Err(invalid("bool")),
        },
        DataType::String => match raw {
            Value::String(s) => Ok(ParameterValue::String(s.clone())),
            Value::Number(n) => Ok(ParameterValue::String(n.to_string())),
            Value::Bool(b) => Ok(ParameterValue::String(b.to_string())),
            _ => Err(invalid("string")),
        },
        DataType::File => match raw {
            Value::String(s) if !s.is_empty() => Ok(ParameterValue::File(s.clone())),
            _ => Err(invalid("file path")),
        },
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        other => format!("'{}'", other.to_string().trim_matches('"')),
    }
}

/// Parameter declaration as written in a template document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameter {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    datatype: Option<String>,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default, rename = "as")]
    as_path: Option<String>,
    #[serde(default)]
    index: Option<i64>,
}

/// A declared template parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameter {
    /// Unique id, also the token name.
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub datatype: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParameterValue>,
    pub required: bool,
    /// Target path for file parameters.
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_path: Option<String>,
    pub index: i64,
}

impl TemplateParameter {
    fn from_raw(raw: RawParameter, position: usize) -> Result<Self> {
        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(Error::InvalidTemplate(format!(
                    "parameter at position {} has no id",
                    position
                )))
            }
        };
        let datatype: DataType = raw
            .datatype
            .as_deref()
            .ok_or_else(|| Error::InvalidTemplate(format!("parameter '{}' has no datatype", id)))?
            .parse()?;

        let default_value = match raw.default_value {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce(&id, datatype, &v)?),
        };

        Ok(Self {
            name: raw.name.unwrap_or_else(|| id.clone()),
            description: raw.description,
            datatype,
            required: raw.required.unwrap_or(true) && default_value.is_none(),
            default_value,
            as_path: raw.as_path,
            index: raw.index.unwrap_or(position as i64),
            id,
        })
    }

    /// Resolve the value to substitute for this parameter.
    ///
    /// Returns `Ok(None)` only for an optional parameter with neither a supplied
    /// value nor a default.
    pub fn resolve(&self, supplied: Option<&Value>) -> Result<Option<ParameterValue>> {
        match supplied {
            Some(raw) if !raw.is_null() => coerce(&self.id, self.datatype, raw).map(Some),
            _ => match &self.default_value {
                Some(default) => Ok(Some(default.clone())),
                None if self.required => Err(Error::missing_value(&self.id)),
                None => Ok(None),
            },
        }
    }

    /// Text used where the value is embedded in a larger string.
    ///
    /// File parameters render their target path when one is declared.
    pub fn render(&self, value: &ParameterValue) -> String {
        match (self.datatype, &self.as_path) {
            (DataType::File, Some(target)) => target.clone(),
            _ => value.to_string(),
        }
    }

    /// Value placed where a token is the whole scalar.
    pub fn native(&self, value: &ParameterValue) -> Value {
        match (self.datatype, &self.as_path) {
            (DataType::File, Some(target)) => Value::String(target.clone()),
            _ => value.to_json(),
        }
    }

    /// Input prompt showing name, type and default.
    pub fn prompt(&self) -> String {
        let mut prompt = format!("{} ({})", self.name, self.datatype.label());
        match &self.default_value {
            Some(v @ (ParameterValue::String(_) | ParameterValue::File(_))) => {
                prompt.push_str(&format!(" [default '{}']", v));
            }
            Some(v) => prompt.push_str(&format!(" [default {}]", v)),
            None => {}
        }
        prompt.push_str(": ");
        prompt
    }
}

/// Ordered set of parameter declarations for one template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    parameters: IndexMap<String, TemplateParameter>,
}

impl ParameterSet {
    /// Build the set from raw declarations, keeping declaration order.
    pub fn from_declarations(declarations: &[Value]) -> Result<Self> {
        let mut parameters = IndexMap::new();
        for (position, decl) in declarations.iter().enumerate() {
            if !decl.is_object() {
                return Err(Error::InvalidTemplate(format!(
                    "parameter at position {} is not an object",
                    position
                )));
            }
            let raw: RawParameter = serde_json::from_value(decl.clone()).map_err(|e| {
                Error::InvalidTemplate(format!("parameter at position {}: {}", position, e))
            })?;
            let param = TemplateParameter::from_raw(raw, position)?;
            if parameters.contains_key(&param.id) {
                return Err(Error::InvalidTemplate(format!(
                    "duplicate parameter id '{}'",
                    param.id
                )));
            }
            parameters.insert(param.id.clone(), param);
        }
        Ok(Self { parameters })
    }

    /// Look up a parameter by id.
    pub fn get(&self, id: &str) -> Result<&TemplateParameter> {
        self.parameters
            .get(id)
            .ok_or_else(|| Error::unknown_parameter(id, "parameter lookup"))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parameters.contains_key(id)
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateParameter> {
        self.parameters.values()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.parameters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Parameters ordered by `(index, id)`, for input forms.
    pub fn sorted(&self) -> Vec<&TemplateParameter> {
        let mut list: Vec<_> = self.parameters.values().collect();
        list.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Resolve the value for `id` against the supplied arguments.
    pub fn resolve(&self, id: &str, args: &Arguments) -> Result<Option<ParameterValue>> {
        self.get(id)?.resolve(args.get(id))
    }

    /// Check a full argument map before execution.
    ///
    /// Every key must name a declared parameter, every value must coerce, and
    /// every required parameter must be present.
    pub fn validate_arguments(&self, args: &Arguments) -> Result<()> {
        let mut keys: Vec<&String> = args.keys().collect();
        keys.sort();
        for key in keys {
            let param = self
                .parameters
                .get(key)
                .ok_or_else(|| Error::unknown_parameter(key.as_str(), "arguments"))?;
            param.resolve(args.get(key))?;
        }
        for param in self.parameters.values() {
            if param.required && args.get(&param.id).map_or(true, Value::is_null) {
                return Err(Error::missing_value(&param.id));
            }
        }
        Ok(())
    }

    /// Serialized declarations, in declaration order.
    pub fn to_declarations(&self) -> Vec<Value> {
        self.parameters
            .values()
            .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
            .collect()
    }
}
