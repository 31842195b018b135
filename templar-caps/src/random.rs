//! Identifier generation.

use std::collections::BTreeMap;

use serde_json::Value;
use templar_core::caps::{CapabilityFn, sync_cap};
use uuid::Uuid;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "uuid_v4",
        sync_cap(|_argv| Ok(Value::String(Uuid::new_v4().to_string()))),
    );
    funcs.insert(
        "uuid_v7",
        sync_cap(|_argv| Ok(Value::String(Uuid::now_v7().to_string()))),
    );
}
