//! Caption sidecar writes.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Writes `caption` to `path` without ever exposing a half-written file:
/// the text lands in a sibling temp file first and is renamed over the
/// destination. An existing caption is overwritten.
pub fn write_caption(path: &Path, caption: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(caption.as_bytes())?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
