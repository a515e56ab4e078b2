//! Shader sources addressed by logical path.
//!
//! Every stage asks a [`ShaderStore`] for its sources at initialization
//! time. A failed load leaves the stage uninitialized; its draw calls stay
//! silent no-ops until a later `initialize` succeeds.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Problem {
    #[error("No shader registered under {0:?}")]
    NotFound(String),

    #[error("Cannot read shader {path:?}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

pub trait ShaderStore {
    fn load(&self, path: &str) -> Result<String, Problem>;
}

static QUAD_VERT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/quad.vert"));
static DROP_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/drop.frag"));
static UPDATE_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/update.frag"));
static NORMAL_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/normal.frag"));
static CAUSTICS_VERT_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/caustics.vert"));
static CAUSTICS_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/caustics.frag"));
static POOL_VERT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/pool.vert"));
static POOL_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/pool.frag"));
static TEXTURE_FRAG_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/shaders/texture.frag"));

/// The default store: sources baked into the binary at build time, with the
/// GLSL version line injected for the compilation target.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedShaders;

impl ShaderStore for EmbeddedShaders {
    fn load(&self, path: &str) -> Result<String, Problem> {
        let source = match path {
            "shaders/quad.vert" => QUAD_VERT_SHADER,
            "shaders/drop.frag" => DROP_FRAG_SHADER,
            "shaders/update.frag" => UPDATE_FRAG_SHADER,
            "shaders/normal.frag" => NORMAL_FRAG_SHADER,
            "shaders/caustics.vert" => CAUSTICS_VERT_SHADER,
            "shaders/caustics.frag" => CAUSTICS_FRAG_SHADER,
            "shaders/pool.vert" => POOL_VERT_SHADER,
            "shaders/pool.frag" => POOL_FRAG_SHADER,
            "shaders/texture.frag" => TEXTURE_FRAG_SHADER,
            _ => return Err(Problem::NotFound(path.to_owned())),
        };

        Ok(source.to_owned())
    }
}

/// Loads shader text from disk, for hacking on shaders without rebuilding.
/// Sources on disk carry no `#version` line, so one is prepended here the
/// same way the build script does it.
#[derive(Clone, Debug)]
pub struct DirectoryShaderStore {
    root: PathBuf,
    version: &'static str,
}

impl DirectoryShaderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            version: "330 core",
        }
    }
}

impl ShaderStore for DirectoryShaderStore {
    fn load(&self, path: &str) -> Result<String, Problem> {
        let file_path = self.root.join(path);
        let source = fs::read_to_string(&file_path).map_err(|source| Problem::Read {
            path: file_path.display().to_string(),
            source,
        })?;

        Ok(format!("#version {}\n{}", self.version, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_sources_are_complete() {
        let store = EmbeddedShaders;
        for path in [
            "shaders/quad.vert",
            "shaders/drop.frag",
            "shaders/update.frag",
            "shaders/normal.frag",
            "shaders/caustics.vert",
            "shaders/caustics.frag",
            "shaders/pool.vert",
            "shaders/pool.frag",
            "shaders/texture.frag",
        ] {
            let source = store.load(path).unwrap();
            assert!(source.starts_with("#version"), "{} lacks a version", path);
            assert!(source.contains("void main()"), "{} lacks main", path);
        }
    }

    #[test]
    fn unknown_paths_are_rejected() {
        assert!(matches!(
            EmbeddedShaders.load("shaders/goo.frag"),
            Err(Problem::NotFound(_))
        ));
    }

    #[test]
    fn missing_files_surface_the_io_error() {
        let store = DirectoryShaderStore::new("/nonexistent");
        assert!(matches!(
            store.load("shaders/quad.vert"),
            Err(Problem::Read { .. })
        ));
    }
}
