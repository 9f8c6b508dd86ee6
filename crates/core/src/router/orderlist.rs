//! The per-folder order list consumed by automation executables.

use std::io;
use std::path::{Path, PathBuf};

/// File name of the order list inside a brand folder.
pub const ORDERLIST_FILE: &str = "orderlist.txt";

const ORDERLIST_TMP: &str = ".orderlist.txt.tmp";

/// One token per line with a trailing newline.
pub fn render(tokens: &[String]) -> String {
    let mut content = tokens.join("\n");
    content.push('\n');
    content
}

pub fn orderlist_path(folder: &Path) -> PathBuf {
    folder.join(ORDERLIST_FILE)
}

/// Write the order list only if its bytes differ from what is on disk.
///
/// The new content is written to a temporary file in the same folder and
/// renamed into place, so a job starting concurrently never reads a partial
/// list. Returns whether a write happened.
pub fn write_if_changed(folder: &Path, content: &str) -> io::Result<bool> {
    let path = orderlist_path(folder);

    match std::fs::read(&path) {
        Ok(existing) if existing == content.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    write_atomic(&folder.join(ORDERLIST_TMP), &path, content.as_bytes())?;
    Ok(true)
}

/// Write `bytes` to `tmp` and rename it over `dest`.
pub(crate) fn write_atomic(tmp: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    std::fs::write(tmp, bytes)?;
    if let Err(e) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(e);
    }
    Ok(())
}
