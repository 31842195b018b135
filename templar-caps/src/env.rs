//! Environment-variable access.

use std::collections::BTreeMap;

use miette::miette;
use serde_json::Value;
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "env",
        sync_cap(|argv| {
            let name = args::string("env", argv, 0, "name")?;
            let default = args::get(argv, 1).clone();
            // Unset and set-but-empty both fall back to the default.
            match std::env::var(&name) {
                Ok(value) if !value.is_empty() => Ok(Value::String(value)),
                _ => Ok(default),
            }
        }),
    );
    funcs.insert(
        "must_env",
        sync_cap(|argv| {
            let name = args::string("must_env", argv, 0, "name")?;
            match std::env::var(&name) {
                Ok(value) => Ok(Value::String(value)),
                Err(_) => Err(miette!("must_env: {name} is not set")),
            }
        }),
    );
    funcs.insert(
        "env_parse",
        sync_cap(|argv| {
            let content = args::string("env_parse", argv, 0, "content")?;
            let mut parsed = serde_json::Map::new();
            for item in dotenvy::from_read_iter(content.as_bytes()) {
                let (key, value) =
                    item.map_err(|e| miette!("env_parse: failed to parse: {e}"))?;
                parsed.insert(key, Value::String(value));
            }
            Ok(Value::Object(parsed))
        }),
    );
}
