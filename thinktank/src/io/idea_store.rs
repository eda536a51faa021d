//! Durable idea artifacts (`ideas/idea_<slug>.md`).

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

/// Writer for accepted idea artifacts. One artifact per slug, never overwritten.
pub trait IdeaStore {
    fn exists(&self, slug: &str) -> bool;
    /// Persist `full_text` under `slug`. Fails with [`StoreError::SlugTaken`]
    /// if the slug is already stored; callers disambiguate first.
    fn write(&self, slug: &str, full_text: &str) -> Result<(), StoreError>;
    /// Remove an artifact whose index entry could not be committed.
    fn discard(&self, slug: &str) -> Result<(), StoreError>;
}

/// Directory of markdown files, one per accepted idea.
#[derive(Debug, Clone)]
pub struct IdeaDir {
    dir: PathBuf,
}

impl IdeaDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("idea_{slug}.md"))
    }

    pub fn ensure_exists(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| StoreError::io("create ideas directory", &self.dir, err))
    }
}

impl IdeaStore for IdeaDir {
    fn exists(&self, slug: &str) -> bool {
        self.path_for(slug).exists()
    }

    fn write(&self, slug: &str, full_text: &str) -> Result<(), StoreError> {
        self.ensure_exists()?;
        let path = self.path_for(slug);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::SlugTaken(slug.to_string()));
            }
            Err(err) => return Err(StoreError::io("create idea", &path, err)),
        };
        let written = file
            .write_all(full_text.as_bytes())
            .and_then(|()| file.sync_all());
        if let Err(err) = written {
            // Leave no half-written artifact behind.
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "could not remove partial idea");
            }
            return Err(StoreError::io("write idea", &path, err));
        }
        debug!(path = %path.display(), "idea written");
        Ok(())
    }

    fn discard(&self, slug: &str) -> Result<(), StoreError> {
        let path = self.path_for(slug);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io("remove idea", &path, err)),
        }
    }
}
