//! Positional-argument coercion shared by the function families.

use std::collections::BTreeMap;

use miette::miette;
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Positional argument, with omitted trailing arguments read as `null`.
pub fn get(args: &[Value], idx: usize) -> &Value {
    args.get(idx).unwrap_or(&NULL)
}

pub fn string(func: &str, args: &[Value], idx: usize, name: &str) -> miette::Result<String> {
    match get(args, idx) {
        Value::String(s) => Ok(s.clone()),
        _ => Err(miette!("{func}: {name} must be a string")),
    }
}

pub fn number(func: &str, args: &[Value], idx: usize, name: &str) -> miette::Result<f64> {
    get(args, idx)
        .as_f64()
        .ok_or_else(|| miette!("{func}: {name} must be a number"))
}

pub fn opt_string(
    func: &str,
    args: &[Value],
    idx: usize,
    name: &str,
) -> miette::Result<Option<String>> {
    match get(args, idx) {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(miette!("{func}: {name} must be a string or null")),
    }
}

/// `null` reads as an empty list.
pub fn opt_string_array(
    func: &str,
    args: &[Value],
    idx: usize,
    name: &str,
) -> miette::Result<Vec<String>> {
    match get(args, idx) {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(miette!("{func}: {name} must be an array of strings")),
            })
            .collect(),
        _ => Err(miette!("{func}: {name} must be an array of strings")),
    }
}

pub fn opt_object(
    func: &str,
    args: &[Value],
    idx: usize,
    name: &str,
) -> miette::Result<Option<Map<String, Value>>> {
    match get(args, idx) {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.clone())),
        _ => Err(miette!("{func}: {name} must be an object or null")),
    }
}

/// `null` reads as no extra variables.
pub fn opt_string_map(
    func: &str,
    args: &[Value],
    idx: usize,
    name: &str,
) -> miette::Result<Option<BTreeMap<String, String>>> {
    match opt_object(func, args, idx, name)? {
        None => Ok(None),
        Some(map) => {
            let mut out = BTreeMap::new();
            for (key, value) in map {
                match value {
                    Value::String(s) => {
                        out.insert(key, s);
                    }
                    _ => return Err(miette!("{func}: {name} values must be strings")),
                }
            }
            Ok(Some(out))
        }
    }
}
