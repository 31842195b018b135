//! All-or-nothing file writes.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Writes `contents` to `path` atomically.
///
/// The data lands in a uniquely named temporary file in the target's
/// directory, is flushed to disk, gets its permission bits set to `mode`,
/// and is renamed over the target. Readers observe either the old content
/// or the new content in full, never a mix. If anything fails before the
/// rename, the temporary file is removed and the target is left untouched.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a writable path: {}", path.display()),
        )
    })?;
    // The temp file must live in the target directory so the final rename
    // stays on one filesystem.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(file_name)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))?;
    // persist is rename(2); on failure the temp file drops and is removed
    // with it.
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
