//! Profile file discovery
//!
//! The game keeps `PROFSAVE_profile` somewhere below
//! `~/Documents/Battlefield 6/settings/` (the exact subdirectory depends on
//! the account and platform), so the tree is walked recursively.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::constants::game;

/// Finds and caches the profile path for a session
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    settings_root: PathBuf,
    override_path: Option<PathBuf>,
    /// Outcome of the last search; `None` until a search has run
    cached: Option<Option<PathBuf>>,
}

impl ConfigLocator {
    /// Locator rooted at an explicit settings directory
    pub fn new(settings_root: impl Into<PathBuf>) -> Self {
        Self {
            settings_root: settings_root.into(),
            override_path: None,
            cached: None,
        }
    }

    /// Default settings root: `<home>/Documents/Battlefield 6/settings`
    pub fn default_settings_root() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(game::DOCUMENTS_DIR);
        path.push(game::GAME_DIR);
        path.push(game::SETTINGS_DIR);
        path
    }

    /// Locator for the current user's game settings
    pub fn from_home() -> Self {
        Self::new(Self::default_settings_root())
    }

    pub fn settings_root(&self) -> &Path {
        &self.settings_root
    }

    pub fn override_path(&self) -> Option<&Path> {
        self.override_path.as_deref()
    }

    /// Use `path` directly instead of searching. `None` reverts to searching.
    ///
    /// The path is not checked here; a missing file is reported by the engine.
    pub fn set_override(&mut self, path: Option<PathBuf>) {
        match &path {
            Some(p) => info!(path = %p.display(), "Using custom profile path"),
            None => debug!("Custom profile path cleared"),
        }
        self.override_path = path;
        self.cached = None;
    }

    /// Profile path for this session, searching once and caching the result
    pub fn find(&mut self) -> Option<PathBuf> {
        if let Some(path) = &self.override_path {
            return Some(path.clone());
        }
        if let Some(result) = &self.cached {
            return result.clone();
        }
        let result = self.search();
        self.cached = Some(result.clone());
        result
    }

    /// Discard the cached result and search again
    pub fn refresh(&mut self) -> Option<PathBuf> {
        self.cached = None;
        self.find()
    }

    /// All profile files under the settings root, in walk order
    pub fn candidates(&self) -> Vec<PathBuf> {
        if !self.settings_root.is_dir() {
            warn!(path = %self.settings_root.display(), "Game settings path not found");
            return Vec::new();
        }

        WalkDir::new(&self.settings_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| debug!(error = %e, "Skipping unreadable entry during profile search"))
                    .ok()
            })
            .filter(|entry| entry.file_type().is_file() && entry.file_name() == game::PROFILE_FILENAME)
            .map(|entry| entry.into_path())
            .collect()
    }

    fn search(&self) -> Option<PathBuf> {
        let mut candidates = self.candidates().into_iter();
        let first = candidates.next()?;
        let others: Vec<PathBuf> = candidates.collect();
        if !others.is_empty() {
            warn!(
                chosen = %first.display(),
                ignored = others.len(),
                "Multiple profile files found, using the first"
            );
        }
        info!(path = %first.display(), "Found config file");
        Some(first)
    }
}

impl Default for ConfigLocator {
    fn default() -> Self {
        Self::from_home()
    }
}
