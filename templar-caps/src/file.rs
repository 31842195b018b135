//! File inspection helpers.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use miette::miette;
use serde_json::{Value, json};
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "file_content",
        sync_cap(|argv| {
            let path = args::string("file_content", argv, 0, "path")?;
            std::fs::read_to_string(&path)
                .map(Value::String)
                .map_err(|e| miette!("file_content: failed to read file {path}: {e}"))
        }),
    );
    funcs.insert(
        "file_stat",
        sync_cap(|argv| {
            let path_arg = args::string("file_stat", argv, 0, "path")?;
            let path = Path::new(&path_arg);
            let metadata = std::fs::metadata(path)
                .map_err(|e| miette!("file_stat: failed to stat {path_arg}: {e}"))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path_arg.clone());
            let mod_time = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            Ok(json!({
                "name": name,
                "size": metadata.len(),
                "mode": format!("{:o}", metadata.permissions().mode() & 0o7777),
                "mod_time": mod_time,
                "is_dir": metadata.is_dir(),
            }))
        }),
    );
    funcs.insert(
        "file_exists",
        sync_cap(|argv| {
            let path = args::string("file_exists", argv, 0, "path")?;
            Ok(Value::Bool(Path::new(&path).exists()))
        }),
    );
}
