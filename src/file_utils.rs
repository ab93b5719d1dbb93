use crate::error::{Result, TriageError};
use anyhow::{Context, bail};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect every `.xml` report at `path`.
///
/// A directory is walked recursively in lexical order; a file is returned
/// as-is whatever its extension.
///
/// # Returns
/// - `Ok(files)` if successful.
/// - `Err` if `path` does not exist or traversal fails.
pub fn collect_xml_reports(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Provided path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut out_files = Vec::new();
    for entry_result in WalkDir::new(path).sort_by_file_name() {
        let entry = entry_result
            .with_context(|| format!("Error walking directory entry in '{}'", path.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "xml")
        {
            out_files.push(entry.into_path());
        }
    }
    Ok(out_files)
}

/// Open an output destination.
///
/// An empty target disables the output and yields `None`; `-` writes to
/// stdout; anything else is created (or truncated) as a file.
pub fn open_output(target: &str) -> Result<Option<Box<dyn Write>>> {
    match target {
        "" => Ok(None),
        "-" => Ok(Some(Box::new(io::stdout().lock()))),
        path => {
            let file = File::create(path).map_err(|e| {
                TriageError::io_error_with_source("create output file", PathBuf::from(path), e)
            })?;
            Ok(Some(Box::new(BufWriter::new(file))))
        }
    }
}

/// Write `contents` to `target` (see [`open_output`]). Returns whether
/// anything was written.
pub fn write_output(target: &str, contents: &[u8]) -> Result<bool> {
    let Some(mut out) = open_output(target)? else {
        return Ok(false);
    };
    out.write_all(contents)?;
    out.flush()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_xml_reports_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.xml"), "").unwrap();
        fs::write(dir.path().join("a.xml"), "").unwrap();
        fs::write(dir.path().join("sub").join("c.xml"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        let files = collect_xml_reports(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml", "sub/c.xml"]);
    }

    #[test]
    fn test_collect_xml_reports_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let err = collect_xml_reports(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_open_output_empty_target_is_disabled() {
        assert!(open_output("").unwrap().is_none());
        assert!(!write_output("", b"ignored").unwrap());
    }

    #[test]
    fn test_write_output_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let target = path.to_string_lossy().into_owned();
        assert!(write_output(&target, b"{}").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_open_output_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("out.csv");
        let err = open_output(&target.to_string_lossy()).err().unwrap();
        assert_eq!(err.name(), "IoError");
    }
}
