//! Environment sources for adapter configuration.
//!
//! Business logic never reads `std::env` directly. It asks an [`EnvSource`], which lets tests
//! supply a [`MapEnv`] instead of mutating process state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to read override file '{path}': {message}")]
    OverrideFile { path: PathBuf, message: String },
}

/// A read-only view of named parameters.
pub trait EnvSource: Send + Sync {
    /// Raw value for `key`, if set (may be empty).
    fn get(&self, key: &str) -> Option<String>;

    /// Trimmed value for `key`; unset and blank values are both `None`.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// A primary source layered over values loaded from a `.env`-style override file.
///
/// The primary source always wins; the file only fills gaps. A key that the primary source sets
/// to an empty string counts as unset, so the file value is used instead.
pub struct LayeredEnv<P> {
    primary: P,
    overrides: MapEnv,
}

impl<P: EnvSource> LayeredEnv<P> {
    #[must_use]
    pub fn new(primary: P, overrides: MapEnv) -> Self {
        Self { primary, overrides }
    }

    /// Layer `primary` over the contents of `path`.
    ///
    /// The file is parsed without touching the process environment, so loading it twice is
    /// harmless. A missing file yields an empty override layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn with_override_file(primary: P, path: &Path) -> Result<Self, EnvError> {
        let overrides = load_override_file(path)?;
        Ok(Self::new(primary, overrides))
    }
}

impl<P: EnvSource> EnvSource for LayeredEnv<P> {
    fn get(&self, key: &str) -> Option<String> {
        self.primary
            .non_empty(key)
            .or_else(|| self.overrides.get(key))
    }
}

/// Parse a `.env` file into a [`MapEnv`].
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or contains a malformed line.
pub fn load_override_file(path: &Path) -> Result<MapEnv, EnvError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            tracing::debug!(path = %path.display(), "no override file");
            return Ok(MapEnv::new());
        }
        Err(e) => {
            return Err(EnvError::OverrideFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    let mut vars = MapEnv::new();
    for item in iter {
        let (key, value) = item.map_err(|e| EnvError::OverrideFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        vars = vars.with(key, value);
    }
    tracing::debug!(path = %path.display(), count = vars.len(), "loaded override file");
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims_and_drops_blank_values() {
        let env = MapEnv::new().with("A", "  x  ").with("B", "   ");
        assert_eq!(env.non_empty("A").as_deref(), Some("x"));
        assert_eq!(env.non_empty("B"), None);
        assert_eq!(env.non_empty("C"), None);
    }

    #[test]
    fn missing_override_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vars = load_override_file(&dir.path().join("absent.env")).expect("missing is ok");
        assert!(vars.is_empty());
    }

    #[test]
    fn primary_source_wins_over_override_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_TOKEN=from-file\nAPI_PAGE_SIZE=25\nEMPTY=x\n").expect("write");

        let primary = MapEnv::new().with("API_TOKEN", "from-env").with("EMPTY", "");
        let env = LayeredEnv::with_override_file(primary, &path).expect("layered");

        assert_eq!(env.get("API_TOKEN").as_deref(), Some("from-env"));
        assert_eq!(env.get("API_PAGE_SIZE").as_deref(), Some("25"));
        assert_eq!(env.get("EMPTY").as_deref(), Some("x"));
        assert_eq!(env.get("UNSET"), None);
    }

    #[test]
    fn loading_override_file_twice_is_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "K=v\n").expect("write");

        let a = load_override_file(&path).expect("first");
        let b = load_override_file(&path).expect("second");
        assert_eq!(a.get("K"), b.get("K"));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn malformed_override_file_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.env");
        std::fs::write(&path, "NOT A VALID LINE\n").expect("write");

        let err = load_override_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.env"));
    }
}
