// src/resolve.rs
//! Payload source resolution
//!
//! Authored source paths are abstract until bind time; resolvers map them to
//! on-disk files. The binder consults its resolvers in registration order
//! and the first hit wins.

use std::path::{Path, PathBuf};

/// Maps an authored source path to an on-disk file
pub trait SourceResolver {
    /// Resolved path, or `None` when this resolver cannot locate the source
    fn resolve(&self, source: &str) -> Option<PathBuf>;
}

/// Probes a fixed list of base directories in order
#[derive(Debug, Default)]
pub struct BasePathResolver {
    base_paths: Vec<PathBuf>,
}

impl BasePathResolver {
    pub fn new(base_paths: Vec<PathBuf>) -> Self {
        Self { base_paths }
    }

    pub fn push(&mut self, base: PathBuf) {
        self.base_paths.push(base);
    }
}

impl SourceResolver for BasePathResolver {
    fn resolve(&self, source: &str) -> Option<PathBuf> {
        let authored = Path::new(source);
        if authored.is_absolute() {
            return authored.is_file().then(|| authored.to_path_buf());
        }
        for base in &self.base_paths {
            let candidate = base.join(authored);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

/// Run `source` through `resolvers` in order, returning the first hit
pub fn resolve_source(resolvers: &[Box<dyn SourceResolver>], source: &str) -> Option<PathBuf> {
    resolvers.iter().find_map(|r| r.resolve(source))
}
