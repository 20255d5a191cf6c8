//! Text file helpers shared by the layer store and document session.

use crate::error::PechaError;
use std::fs;
use std::path::Path;

const BOM: char = '\u{feff}';

/// Read a UTF-8 file, dropping a leading byte-order marker.
pub(crate) fn read_text(path: &Path) -> Result<String, PechaError> {
    let text = fs::read_to_string(path).map_err(|err| PechaError::io(path, err))?;
    Ok(match text.strip_prefix(BOM) {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Write `contents` through a temporary sibling renamed into place.
///
/// Readers see either the previous file or the complete new one.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), PechaError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PechaError::io(parent, err))?;
    }
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents).map_err(|err| PechaError::io(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| {
        let _ = fs::remove_file(&tmp_path);
        PechaError::io(path, err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn read_text_strips_bom() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bom.txt");
        fs::write(&path, "\u{feff}ཀ་ཁ").expect("write");
        assert_eq!(read_text(&path).expect("read"), "ཀ་ཁ");
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("a.layer");
        write_atomic(&path, "first").expect("write first");
        write_atomic(&path, "second").expect("write second");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        let names: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.layer")]);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = TempDir::new().expect("temp dir");
        let err = read_text(&dir.path().join("absent.txt")).expect_err("missing");
        assert!(err.to_string().contains("absent.txt"));
    }
}
