//! Capability-scoped file access for the values and inventory files.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Reads `path` as UTF-8 text.
pub(crate) fn read_utf8(path: &Utf8Path) -> io::Result<String> {
    let (dir, file_name) = open_parent(path)?;
    dir.read_to_string(file_name)
}

/// Replaces the contents of `path`, creating the file when it is absent.
pub(crate) fn write_utf8(path: &Utf8Path, contents: &str) -> io::Result<()> {
    let (dir, file_name) = open_parent(path)?;
    dir.write(file_name, contents)
}

fn open_parent(path: &Utf8Path) -> io::Result<(Dir, &str)> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path is missing a file name")
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}
