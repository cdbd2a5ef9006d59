//! File emitters used as agent functions.
//!
//! A [`FileEmitter`] writes report artifacts (plain text, JSON, YAML) underneath a single root
//! directory. Agents hand it file names chosen by a language model, so every name is validated
//! before anything touches the disk: absolute paths and `..` components are rejected.
//!
//! The JSON and YAML writers accept the loosely quoted JSON models tend to produce: single quotes
//! are turned into double quotes before parsing.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::files::FileEmitter;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let emitter = FileEmitter::new("agent_results");
//! emitter.write_json_file("jobs.json", "{'status': 'Completed'}").await?;
//! # Ok(())
//! # }
//! ```

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Errors raised while emitting a file.
#[derive(Debug)]
pub enum FileEmitterError {
    /// The file name escapes the emitter's root.
    PathTraversal(String),
    /// The file name is empty or otherwise unusable.
    InvalidPath(String),
    /// The payload is not valid JSON, even after quote normalisation.
    InvalidJson(String),
    /// The payload could not be rendered as YAML.
    Yaml(String),
    Io(std::io::Error),
}

impl fmt::Display for FileEmitterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileEmitterError::PathTraversal(path) => {
                write!(f, "Path traversal attempt blocked: {}", path)
            }
            FileEmitterError::InvalidPath(path) => write!(f, "Invalid path: {}", path),
            FileEmitterError::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            FileEmitterError::Yaml(msg) => write!(f, "YAML error: {}", msg),
            FileEmitterError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl Error for FileEmitterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileEmitterError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FileEmitterError {
    fn from(e: std::io::Error) -> Self {
        FileEmitterError::Io(e)
    }
}

/// Writes text, JSON and YAML files below a root directory.
#[derive(Debug, Clone)]
pub struct FileEmitter {
    root: PathBuf,
}

impl FileEmitter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `fname` under the root, rejecting anything that could land outside it.
    pub fn resolve(&self, fname: &str) -> Result<PathBuf, FileEmitterError> {
        if fname.trim().is_empty() {
            return Err(FileEmitterError::InvalidPath("empty file name".to_string()));
        }

        let relative = Path::new(fname);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileEmitterError::PathTraversal(fname.to_string()));
                }
            }
        }

        Ok(self.root.join(relative))
    }

    /// Write `content` verbatim to `fname`, replacing any previous file.
    pub async fn write_file(&self, fname: &str, content: &str) -> Result<String, FileEmitterError> {
        let path = self.resolve(fname)?;
        self.write(&path, content.as_bytes())?;
        log::debug!("write_file: {} ({} bytes)", path.display(), content.len());
        Ok(format!("Wrote {} bytes to {}", content.len(), fname))
    }

    /// Parse `json_str` and write it back pretty-printed to `fname`.
    pub async fn write_json_file(
        &self,
        fname: &str,
        json_str: &str,
    ) -> Result<String, FileEmitterError> {
        let path = self.resolve(fname)?;
        let data = parse_loose_json(json_str)?;
        let rendered = serde_json::to_string_pretty(&data)
            .map_err(|e| FileEmitterError::InvalidJson(e.to_string()))?;
        self.write(&path, rendered.as_bytes())?;
        log::debug!("write_json_file: {}", path.display());
        Ok(format!("Wrote JSON to {}", fname))
    }

    /// Parse `json_str` and write it to `fname` as YAML.
    pub async fn write_yaml_file(
        &self,
        fname: &str,
        json_str: &str,
    ) -> Result<String, FileEmitterError> {
        let path = self.resolve(fname)?;
        let data = parse_loose_json(json_str)?;
        let rendered =
            serde_yaml::to_string(&data).map_err(|e| FileEmitterError::Yaml(e.to_string()))?;
        self.write(&path, rendered.as_bytes())?;
        log::debug!("write_yaml_file: {}", path.display());
        Ok(format!("Wrote YAML to {}", fname))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), FileEmitterError> {
        if path.is_dir() {
            return Err(FileEmitterError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

fn parse_loose_json(json_str: &str) -> Result<serde_json::Value, FileEmitterError> {
    let cleaned = json_str.replace('\'', "\"");
    serde_json::from_str(&cleaned).map_err(|e| {
        log::error!("Error decoding JSON: {}", e);
        FileEmitterError::InvalidJson(e.to_string())
    })
}
