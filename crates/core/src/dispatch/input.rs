//! The canonical `input_orders.txt` shared by check and run.

use std::io;
use std::path::{Path, PathBuf};

use crate::router::write_atomic;

/// File name of the canonical multi-marketplace input.
pub const INPUT_FILE: &str = "input_orders.txt";

const INPUT_TMP: &str = ".input_orders.txt.tmp";

pub fn input_path(work_dir: &Path) -> PathBuf {
    work_dir.join(INPUT_FILE)
}

/// Split `text` into lines with CRLF and lone CR treated as LF, dropping
/// trailing blank lines.
pub fn normalize_lines(text: &str) -> Vec<String> {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = unified.split('\n').map(str::to_string).collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}

/// Replace the input file with `text`, CRLF-terminated, via temp + rename.
/// Returns the number of non-blank lines saved.
pub fn persist(work_dir: &Path, text: &str) -> io::Result<usize> {
    std::fs::create_dir_all(work_dir)?;
    let lines = normalize_lines(text);

    let mut content = lines.join("\r\n");
    if !lines.is_empty() {
        content.push_str("\r\n");
    }

    write_atomic(
        &work_dir.join(INPUT_TMP),
        &input_path(work_dir),
        content.as_bytes(),
    )?;
    Ok(lines.iter().filter(|l| !l.trim().is_empty()).count())
}

/// Read the input file, decoding as Latin-1 if it is not valid UTF-8.
/// Returns `None` when the file does not exist.
pub fn read(work_dir: &Path) -> io::Result<Option<String>> {
    let bytes = match std::fs::read(input_path(work_dir)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    Ok(Some(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }))
}
