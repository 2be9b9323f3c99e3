//! Placeholder substitution over workflow documents.
//!
//! The walk rebuilds mappings and sequences with the same keys and order.
//! String scalars that are exactly one token take the typed value of the
//! parameter; strings with embedded tokens get the textual form spliced in.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use super::parameters::{Arguments, ParameterSet, ParameterValue, TemplateParameter};
use super::token::{self, Reference, Segment};
use crate::error::{Error, Result};

/// Resolve every token in `doc` against `params` and `args`.
///
/// Pure: the inputs are not modified and nothing is returned on failure.
/// Arguments for parameters the document never references are ignored.
pub fn substitute(doc: &Value, params: &ParameterSet, args: &Arguments) -> Result<Value> {
    let mut path = String::from("$");
    walk(doc, params, args, &mut path)
}

fn walk(node: &Value, params: &ParameterSet, args: &Arguments, path: &mut String) -> Result<Value> {
    match node {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                let resolved = walk(value, params, args, path);
                path.truncate(len);
                out.insert(key.clone(), resolved?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", i));
                let resolved = walk(item, params, args, path);
                path.truncate(len);
                out.push(resolved?);
            }
            Ok(Value::Array(out))
        }
        Value::String(text) => substitute_str(text, params, args, path),
        scalar => Ok(scalar.clone()),
    }
}

fn substitute_str(text: &str, params: &ParameterSet, args: &Arguments, path: &str) -> Result<Value> {
    match token::classify(text) {
        Reference::None => Ok(Value::String(text.to_string())),
        Reference::Whole(id) => {
            let (param, value) = lookup(id, params, args, path)?;
            Ok(param.native(&value))
        }
        Reference::Embedded(segments) => {
            let mut out = String::with_capacity(text.len());
            for segment in segments {
                match segment {
                    Segment::Literal(lit) => out.push_str(lit),
                    Segment::Token(id) => {
                        let (param, value) = lookup(id, params, args, path)?;
                        out.push_str(&param.render(&value));
                    }
                }
            }
            Ok(Value::String(out))
        }
    }
}

fn lookup<'p>(
    id: &str,
    params: &'p ParameterSet,
    args: &Arguments,
    path: &str,
) -> Result<(&'p TemplateParameter, ParameterValue)> {
    let param = params
        .get(id)
        .map_err(|_| Error::unknown_parameter(id, path))?;
    // An optional parameter without a value cannot fill a token site.
    let value = param
        .resolve(args.get(id))?
        .ok_or_else(|| Error::missing_value(id))?;
    Ok((param, value))
}

/// Parameter ids referenced anywhere in `doc`, in order of first appearance.
pub fn references(doc: &Value) -> IndexSet<String> {
    let mut ids = IndexSet::new();
    collect(doc, &mut ids);
    ids
}

fn collect(node: &Value, ids: &mut IndexSet<String>) {
    match node {
        Value::Object(map) => map.values().for_each(|v| collect(v, ids)),
        Value::Array(items) => items.iter().for_each(|v| collect(v, ids)),
        Value::String(text) => {
            for id in token::token_ids(text) {
                ids.insert(id.to_string());
            }
        }
        _ => {}
    }
}

/// Check that every token in `doc` names a declared parameter.
pub fn check_references(doc: &Value, params: &ParameterSet) -> Result<()> {
    let mut path = String::from("$");
    check(doc, params, &mut path)
}

fn check(node: &Value, params: &ParameterSet, path: &mut String) -> Result<()> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                let result = check(value, params, path);
                path.truncate(len);
                result?;
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", i));
                let result = check(item, params, path);
                path.truncate(len);
                result?;
            }
        }
        Value::String(text) => {
            if let Some(id) = token::token_ids(text).find(|id| !params.contains(id)) {
                return Err(Error::unknown_parameter(id, path.as_str()));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(decls: Value) -> ParameterSet {
        ParameterSet::from_declarations(decls.as_array().unwrap()).unwrap()
    }

    fn args(values: Value) -> Arguments {
        values
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn helloworld() -> Value {
        json!({
            "version": "0.3.0",
            "inputs": {
                "files": ["code/helloworld.py", "$[[names]]"],
                "parameters": {
                    "helloworld": "code/helloworld.py",
                    "inputfile": "$[[names]]",
                    "outputfile": "results/greetings.txt",
                    "sleeptime": "$[[sleeptime]]",
                    "greeting": "$[[greeting]]"
                }
            },
            "workflow": {
                "type": "serial",
                "specification": {
                    "steps": [{
                        "environment": "python:3.7",
                        "commands": [
                            "python \"${helloworld}\" --inputfile \"${inputfile}\" --sleeptime $[[sleeptime]]"
                        ]
                    }]
                }
            },
            "outputs": {"files": ["results/greetings.txt"]}
        })
    }

    fn helloworld_params() -> ParameterSet {
        params(json!([
            {"id": "names", "datatype": "file", "as": "data/names.txt"},
            {"id": "sleeptime", "datatype": "int", "defaultValue": 10},
            {"id": "greeting", "datatype": "string", "defaultValue": "Hello"}
        ]))
    }

    #[test]
    fn test_identity_without_tokens() {
        let doc = json!({
            "a": [1, 2.5, true, null, "text"],
            "b": {"c": "no tokens $[ here"},
        });
        let set = params(json!([{"id": "x", "datatype": "int"}]));
        let out = substitute(&doc, &set, &args(json!({"x": "5"}))).unwrap();
        assert_eq!(out, doc);
        let out = substitute(&doc, &ParameterSet::default(), &Arguments::new()).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_whole_value_default() {
        let set = params(json!([{"id": "sleeptime", "datatype": "int", "defaultValue": 10}]));
        let doc = json!({"sleeptime": "$[[sleeptime]]"});
        let out = substitute(&doc, &set, &Arguments::new()).unwrap();
        assert_eq!(out, json!({"sleeptime": 10}));
    }

    #[test]
    fn test_whole_value_typed() {
        let set = params(json!([{"id": "sleeptime", "datatype": "int", "defaultValue": 10}]));
        let doc = json!({"sleeptime": "$[[sleeptime]]"});
        let out = substitute(&doc, &set, &args(json!({"sleeptime": "30"}))).unwrap();
        assert_eq!(out, json!({"sleeptime": 30}));
        assert!(out["sleeptime"].is_i64());

        let out = substitute(&doc, &set, &args(json!({"sleeptime": "7"}))).unwrap();
        assert_eq!(out["sleeptime"], json!(7));
        assert!(!out["sleeptime"].is_string());
    }

    #[test]
    fn test_whole_value_bool_and_decimal() {
        let set = params(json!([
            {"id": "verbose", "datatype": "bool"},
            {"id": "ratio", "datatype": "decimal"}
        ]));
        let doc = json!(["$[[verbose]]", "$[[ratio]]"]);
        let out = substitute(&doc, &set, &args(json!({"verbose": "yes", "ratio": "0.5"}))).unwrap();
        assert_eq!(out, json!([true, 0.5]));
    }

    #[test]
    fn test_embedded_reference_preserves_literal_text() {
        let set = params(json!([
            {"id": "sleeptime", "datatype": "int"},
            {"id": "ratio", "datatype": "decimal"}
        ]));
        let doc = json!("run  --sleep=$[[sleeptime]]s \"q\" --r $[[ratio]]");
        let out = substitute(&doc, &set, &args(json!({"sleeptime": 5, "ratio": 2}))).unwrap();
        assert_eq!(out, json!("run  --sleep=5s \"q\" --r 2.0"));
    }

    #[test]
    fn test_file_parameter_uses_target_path() {
        let set = helloworld_params();
        let out = substitute(
            &helloworld(),
            &set,
            &args(json!({"names": "/uploads/f81d4fae.txt", "sleeptime": "3"})),
        )
        .unwrap();
        assert_eq!(out["inputs"]["files"], json!(["code/helloworld.py", "data/names.txt"]));
        assert_eq!(out["inputs"]["parameters"]["inputfile"], json!("data/names.txt"));
        assert_eq!(out["inputs"]["parameters"]["sleeptime"], json!(3));
        assert_eq!(out["inputs"]["parameters"]["greeting"], json!("Hello"));
        assert_eq!(
            out["workflow"]["specification"]["steps"][0]["commands"][0],
            json!("python \"${helloworld}\" --inputfile \"${inputfile}\" --sleeptime 3")
        );
    }

    #[test]
    fn test_file_without_target_uses_supplied_path() {
        let set = params(json!([{"id": "data", "datatype": "file"}]));
        let doc = json!({"cmd": "cat $[[data]]", "path": "$[[data]]"});
        let out = substitute(&doc, &set, &args(json!({"data": "in/x.csv"}))).unwrap();
        assert_eq!(out, json!({"cmd": "cat in/x.csv", "path": "in/x.csv"}));
    }

    #[test]
    fn test_key_order_preserved() {
        let set = params(json!([{"id": "n", "datatype": "int", "defaultValue": 1}]));
        let doc: Value = serde_json::from_str(r#"{"z": 1, "a": "$[[n]]", "m": [3]}"#).unwrap();
        let out = substitute(&doc, &set, &Arguments::new()).unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_unused_argument_is_ignored() {
        let set = helloworld_params();
        let base = args(json!({"names": "n.txt"}));
        let mut extra = base.clone();
        extra.insert("unrelated".into(), json!("whatever"));
        let doc = json!({"s": "$[[sleeptime]]"});
        assert_eq!(
            substitute(&doc, &set, &base).unwrap(),
            substitute(&doc, &set, &extra).unwrap()
        );
    }

    #[test]
    fn test_unknown_parameter_reports_location() {
        let set = helloworld_params();
        let doc = json!({"steps": [{"cmd": "echo $[[missing]]"}]});
        match substitute(&doc, &set, &Arguments::new()) {
            Err(Error::UnknownParameter { id, location }) => {
                assert_eq!(id, "missing");
                assert_eq!(location, "$.steps[0].cmd");
            }
            other => panic!("expected UnknownParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_value() {
        let set = helloworld_params();
        let doc = json!({"input": "$[[names]]"});
        assert!(matches!(
            substitute(&doc, &set, &Arguments::new()),
            Err(Error::MissingValue { id }) if id == "names"
        ));
    }

    #[test]
    fn test_optional_without_value_is_an_error_when_referenced() {
        let set = params(json!([{"id": "note", "datatype": "string", "required": false}]));
        let doc = json!({"msg": "note: $[[note]]"});
        assert!(matches!(
            substitute(&doc, &set, &Arguments::new()),
            Err(Error::MissingValue { .. })
        ));
        // Not referenced: nothing to fill, no error
        let doc = json!({"msg": "static"});
        assert!(substitute(&doc, &set, &Arguments::new()).is_ok());
    }

    #[test]
    fn test_invalid_value() {
        let set = params(json!([{"id": "n", "datatype": "int"}]));
        let doc = json!(["$[[n]]"]);
        assert!(matches!(
            substitute(&doc, &set, &args(json!({"n": "4.5"}))),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_substitution_is_deterministic() {
        let set = helloworld_params();
        let values = args(json!({"names": "names.txt", "greeting": "Hey"}));
        let doc = helloworld();
        let first = substitute(&doc, &set, &values).unwrap();
        let second = substitute(&doc, &set, &values).unwrap();
        assert_eq!(first, second);
        assert_eq!(doc, helloworld());
    }

    #[test]
    fn test_references() {
        let refs = references(&helloworld());
        let ids: Vec<_> = refs.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["names", "sleeptime", "greeting"]);
    }

    #[test]
    fn test_check_references() {
        let set = helloworld_params();
        assert!(check_references(&helloworld(), &set).is_ok());
        let doc = json!({"a": ["$[[names]]", "$[[nope]]"]});
        match check_references(&doc, &set) {
            Err(Error::UnknownParameter { id, location }) => {
                assert_eq!(id, "nope");
                assert_eq!(location, "$.a[1]");
            }
            other => panic!("expected UnknownParameter, got {:?}", other),
        }
    }
}
