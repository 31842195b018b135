//! Lexical path helpers. No filesystem access.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "basename",
        sync_cap(|argv| {
            let path = args::string("basename", argv, 0, "path")?;
            let base = Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            Ok(Value::String(base))
        }),
    );
    funcs.insert(
        "dirname",
        sync_cap(|argv| {
            let path = args::string("dirname", argv, 0, "path")?;
            let dir = match Path::new(&path).parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.to_string_lossy().into_owned()
                }
                Some(_) => ".".to_string(),
                None if path.is_empty() => ".".to_string(),
                None => path.clone(),
            };
            Ok(Value::String(dir))
        }),
    );
    funcs.insert(
        "extname",
        sync_cap(|argv| {
            let path = args::string("extname", argv, 0, "path")?;
            let ext = match Path::new(&path).extension() {
                Some(ext) => format!(".{}", ext.to_string_lossy()),
                None => String::new(),
            };
            Ok(Value::String(ext))
        }),
    );
    funcs.insert(
        "path_join",
        sync_cap(|argv| {
            let elements = args::opt_string_array("path_join", argv, 0, "elements")?;
            let mut joined = PathBuf::new();
            for element in elements.iter().filter(|e| !e.is_empty()) {
                joined.push(element);
            }
            Ok(Value::String(joined.to_string_lossy().into_owned()))
        }),
    );
}
