//! Regular-expression helpers.

use std::collections::BTreeMap;

use miette::miette;
use regex::Regex;
use serde_json::Value;
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

fn compile(pattern: &str) -> miette::Result<Regex> {
    Regex::new(pattern).map_err(|e| miette!("invalid regex pattern: {e}"))
}

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "regex_match",
        sync_cap(|argv| {
            let pattern = args::string("regex_match", argv, 0, "pattern")?;
            let text = args::string("regex_match", argv, 1, "text")?;
            Ok(Value::Bool(compile(&pattern)?.is_match(&text)))
        }),
    );
    funcs.insert(
        "regex_find",
        sync_cap(|argv| {
            let pattern = args::string("regex_find", argv, 0, "pattern")?;
            let text = args::string("regex_find", argv, 1, "text")?;
            let found = match compile(&pattern)?.find(&text) {
                Some(found) if !found.as_str().is_empty() => {
                    Value::String(found.as_str().to_string())
                }
                _ => Value::Null,
            };
            Ok(found)
        }),
    );
    funcs.insert(
        "regex_find_all",
        sync_cap(|argv| {
            let pattern = args::string("regex_find_all", argv, 0, "pattern")?;
            let text = args::string("regex_find_all", argv, 1, "text")?;
            let matches = compile(&pattern)?
                .find_iter(&text)
                .map(|m| Value::String(m.as_str().to_string()))
                .collect();
            Ok(Value::Array(matches))
        }),
    );
    funcs.insert(
        "regex_replace",
        sync_cap(|argv| {
            let pattern = args::string("regex_replace", argv, 0, "pattern")?;
            let replacement = args::string("regex_replace", argv, 1, "replacement")?;
            let text = args::string("regex_replace", argv, 2, "text")?;
            let replaced = compile(&pattern)?
                .replace_all(&text, replacement.as_str())
                .into_owned();
            Ok(Value::String(replaced))
        }),
    );
    funcs.insert(
        "regex_split",
        sync_cap(|argv| {
            let pattern = args::string("regex_split", argv, 0, "pattern")?;
            let text = args::string("regex_split", argv, 1, "text")?;
            let pieces = compile(&pattern)?
                .split(&text)
                .map(|piece| Value::String(piece.to_string()))
                .collect();
            Ok(Value::Array(pieces))
        }),
    );
}
