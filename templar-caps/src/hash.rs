//! Digest functions over strings and files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use miette::miette;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "md5",
        sync_cap(|argv| {
            let data = args::string("md5", argv, 0, "data")?;
            Ok(Value::String(format!("{:x}", md5::compute(data.as_bytes()))))
        }),
    );
    funcs.insert(
        "sha256",
        sync_cap(|argv| {
            let data = args::string("sha256", argv, 0, "data")?;
            Ok(Value::String(hex::encode(Sha256::digest(data.as_bytes()))))
        }),
    );
    funcs.insert(
        "sha512",
        sync_cap(|argv| {
            let data = args::string("sha512", argv, 0, "data")?;
            Ok(Value::String(hex::encode(Sha512::digest(data.as_bytes()))))
        }),
    );
    funcs.insert(
        "md5_file",
        sync_cap(|argv| {
            let path = args::string("md5_file", argv, 0, "path")?;
            let data = std::fs::read(&path)
                .map_err(|e| miette!("md5_file: failed to open file {path}: {e}"))?;
            Ok(Value::String(format!("{:x}", md5::compute(&data))))
        }),
    );
    funcs.insert(
        "sha256_file",
        sync_cap(|argv| {
            let path = args::string("sha256_file", argv, 0, "path")?;
            digest_file::<Sha256>("sha256_file", Path::new(&path)).map(Value::String)
        }),
    );
    funcs.insert(
        "sha512_file",
        sync_cap(|argv| {
            let path = args::string("sha512_file", argv, 0, "path")?;
            digest_file::<Sha512>("sha512_file", Path::new(&path)).map(Value::String)
        }),
    );
}

fn digest_file<D: Digest>(func: &str, path: &Path) -> miette::Result<String> {
    let mut file = File::open(path)
        .map_err(|e| miette!("{func}: failed to open file {}: {e}", path.display()))?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| miette!("{func}: failed to read file {}: {e}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
