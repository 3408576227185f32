use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidProject(String),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {e}"),
            ProjectError::Json(e) => write!(f, "JSON error: {e}"),
            ProjectError::InvalidProject(msg) => write!(f, "Invalid project: {msg}"),
        }
    }
}

impl std::error::Error for ProjectError {}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        ProjectError::Json(e)
    }
}

impl Serialize for ProjectError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ── Atomic writes ───────────────────────────────────────────────────

/// Write bytes to `path` through a `.tmp` sibling that is synced and then
/// renamed over the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ProjectError> {
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

// ── Sources ─────────────────────────────────────────────────────────

/// One source unit handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub location: PathBuf,
    /// File stem, e.g. `quests` for `quests.rs2`.
    pub name: String,
    pub extension: String,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(location: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        let location = location.into();
        let name = location
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = location
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            location,
            name,
            extension,
            content: content.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, ProjectError> {
        Ok(Self::new(path, fs::read(path)?))
    }
}

fn collect_files(dir: &Path, accept: &dyn Fn(&str) -> bool, out: &mut Vec<PathBuf>) -> Result<(), ProjectError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, accept, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(accept)
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Load every file under `root` whose extension `accept`s, sorted by path so
/// script ids are stable between runs. A file `root` is loaded on its own.
pub fn load_sources(root: &Path, accept: impl Fn(&str) -> bool) -> Result<Vec<SourceFile>, ProjectError> {
    if root.is_file() {
        return Ok(vec![SourceFile::read(root)?]);
    }
    if !root.is_dir() {
        return Err(ProjectError::InvalidProject(format!("{} does not exist", root.display())));
    }
    let mut paths = Vec::new();
    collect_files(root, &accept, &mut paths)?;
    paths.sort();
    debug!(root = %root.display(), files = paths.len(), "sources found");
    paths.iter().map(|p| SourceFile::read(p)).collect()
}

/// Write each `(file name, bytes)` pair into `dir`, creating it if needed.
pub fn write_outputs<'a>(
    dir: &Path,
    outputs: impl IntoIterator<Item = (String, &'a [u8])>,
) -> Result<usize, ProjectError> {
    fs::create_dir_all(dir)?;
    let mut written = 0;
    for (name, bytes) in outputs {
        atomic_write(&dir.join(name), bytes)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_sources_sorted_and_filtered() {
        let dir = temp_dir("rsc_test_load_sources");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("b.rs2"), "[proc,b]").unwrap();
        fs::write(dir.join("sub").join("a.rs2"), "[proc,a]").unwrap();
        fs::write(dir.join("a.param"), "[p]").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let sources = load_sources(&dir, |ext| ext == "rs2" || ext == "param").unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "a"]);
        assert_eq!(sources[0].extension, "param");
        assert_eq!(sources[2].content, b"[proc,a]");

        let single = load_sources(&dir.join("b.rs2"), |_| false).unwrap();
        assert_eq!(single.len(), 1);
        assert!(load_sources(&dir.join("missing"), |_| true).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_outputs_overwrites() {
        let dir = temp_dir("rsc_test_write_outputs");
        let out = dir.join("out");
        let written = write_outputs(&out, vec![("a.bin".to_string(), &b"one"[..])]).unwrap();
        assert_eq!(written, 1);
        write_outputs(&out, vec![("a.bin".to_string(), &b"two"[..])]).unwrap();
        assert_eq!(fs::read(out.join("a.bin")).unwrap(), b"two");
        assert!(!out.join("a.bin.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_atomic_write_leaves_only_targets() {
        let dir = temp_dir("rsc_test_atomic_write");
        for i in 0..20 {
            atomic_write(&dir.join(format!("{i}.bin")), &[i]).unwrap();
        }
        atomic_write(&dir.join("3.bin"), b"again").unwrap();
        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 20);
        assert!(names.iter().all(|n| n.ends_with(".bin")));
        assert_eq!(fs::read(dir.join("3.bin")).unwrap(), b"again");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = temp_dir("rsc_test_json");
        let path = dir.join("v.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, [1, 2, 3]);
        fs::write(&path, "{").unwrap();
        assert!(matches!(read_json::<Vec<i32>>(&path), Err(ProjectError::Json(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
