use std::path::PathBuf;

use tracing::debug;

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Errors raised while resolving a contract artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid artifact name {0:?}")]
    InvalidName(String),

    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("artifact {} is not a wasm module", .0.display())]
    NotWasm(PathBuf),

    #[error("failed to read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolves a contract name to its compiled bytecode.
pub trait ArtifactSource {
    fn load(&self, name: &str) -> Result<Vec<u8>, ArtifactError>;
}

/// Artifacts laid out as `<dir>/<name>.wasm`.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path the named artifact is expected at.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let name = name.strip_suffix(".wasm").unwrap_or(name);
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(ArtifactError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.wasm")))
    }
}

impl ArtifactSource for ArtifactDir {
    fn load(&self, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(ArtifactError::NotFound(path));
        }

        let bytes = std::fs::read(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        if !bytes.starts_with(WASM_MAGIC) {
            return Err(ArtifactError::NotWasm(path));
        }

        debug!(path = %path.display(), size = bytes.len(), "loaded contract artifact");
        Ok(bytes)
    }
}
