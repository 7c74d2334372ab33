//! Application state
//!
//! Immutable per-process state shared by every connection

use std::io;
use std::path::{Path, PathBuf};

use super::types::Config;

/// Application state
///
/// Built once at startup and shared behind an `Arc`; nothing in here is
/// mutated afterwards, so request handling needs no locks.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    /// Images directory, resolved against the working directory at startup
    pub images_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> io::Result<Self> {
        let images_dir = resolve_dir(Path::new(&config.images.dir))?;
        Ok(Self::with_images_dir(config, images_dir))
    }

    /// Create state with an explicit images directory
    pub fn with_images_dir(config: &Config, images_dir: PathBuf) -> Self {
        Self {
            config: config.clone(),
            images_dir,
        }
    }
}

fn resolve_dir(dir: &Path) -> io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_dir_resolves_against_cwd() {
        let cfg = Config::defaults().unwrap();
        let state = AppState::new(&cfg).unwrap();
        assert!(state.images_dir.is_absolute());
        assert!(state.images_dir.ends_with("public/images"));
    }

    #[test]
    fn test_absolute_dir_is_kept() {
        let mut cfg = Config::defaults().unwrap();
        cfg.images.dir = "/srv/images".to_string();
        let state = AppState::new(&cfg).unwrap();
        assert_eq!(state.images_dir, PathBuf::from("/srv/images"));
    }
}
