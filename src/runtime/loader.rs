//! Module loading seams.
//!
//! The core never parses source text: a loader turns a canonical path into
//! a byte stream, and a host-provided compiler turns that stream into AIR.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::air::AirNode;
use crate::runtime::error::{ErrorKind, RuntimeError};

pub trait ModuleLoader {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The parser seam: compiles a loaded byte stream into AIR.
pub trait ScriptCompiler {
    fn compile(&self, path: &Path, source: &[u8]) -> Result<Vec<AirNode>, RuntimeError>;
}

/// Loads modules from the local filesystem.
pub struct FileLoader;

impl ModuleLoader for FileLoader {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("import path was empty")]
    EmptyPath,
    #[error("no module loader installed")]
    NoLoader,
    #[error("no script compiler installed")]
    NoCompiler,
    #[error("failed reading module '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<LoadError> for RuntimeError {
    fn from(err: LoadError) -> Self {
        RuntimeError::native(ErrorKind::Io, err.to_string())
    }
}

/// Resolve an import path against the importer's source file and normalize
/// it lexically. The result is the canonical identity used for reentrancy
/// detection, so it must be stable for a given pair of inputs.
pub fn canonicalize_import(importer_file: &str, path: &str) -> Result<PathBuf, LoadError> {
    if path.is_empty() {
        return Err(LoadError::EmptyPath);
    }
    let raw = Path::new(path);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        let importer = Path::new(importer_file);
        match importer.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(raw),
            _ => raw.to_path_buf(),
        }
    };
    let mut normal = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normal.pop() {
                    normal.push(Component::ParentDir);
                }
            }
            other => normal.push(other),
        }
    }
    Ok(normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_imports_resolve_against_the_importer() {
        let resolved = canonicalize_import("/scripts/app/main.ast", "../lib/util.ast").unwrap();
        assert_eq!(resolved, PathBuf::from("/scripts/lib/util.ast"));
    }

    #[test]
    fn absolute_imports_are_normalized_only() {
        let resolved = canonicalize_import("/scripts/main.ast", "/a/./b/../c.ast").unwrap();
        assert_eq!(resolved, PathBuf::from("/a/c.ast"));
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert!(canonicalize_import("/scripts/main.ast", "").is_err());
    }
}
