//! Profile edit engine
//!
//! Applies a batch of setting values to `PROFSAVE_profile`:
//! backup -> read -> substitute -> atomic write -> optional re-protect.
//! Every failure is folded into an [`ApplyResult`] so callers only ever see a
//! short message plus the backup that was already taken.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::atomic::{self, ReplaceFn};
use crate::backups;
use crate::constants::BOM;
use crate::error::{EditError, EditResult};
use crate::protect;
use crate::settings::SettingRegistry;

pub const MSG_NOT_FOUND: &str = "config file not found";
pub const MSG_NO_CHANGES: &str = "no changes applied";

/// Setting id -> pre-formatted value, in no particular order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyRequest {
    values: BTreeMap<String, String>,
}

impl ApplyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(id.into(), value.into());
        self
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ApplyRequest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut request = Self::new();
        request.extend(iter);
        request
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ApplyRequest {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.values.insert(k.into(), v.into());
        }
    }
}

/// Outcome of [`ConfigEditEngine::apply`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub success: bool,
    pub message: String,
    /// `"<description>: <value>"` for every setting that matched
    pub changed: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

impl ApplyResult {
    fn failure(message: impl Into<String>, backup_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Self {
        Self {
            success: false,
            message: message.into(),
            changed: Vec::new(),
            backup_path,
            config_path,
        }
    }
}

/// Result of substituting a request into profile text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub content: String,
    pub changed: Vec<String>,
    /// Requested ids that are not in the registry
    pub unknown: Vec<String>,
    /// Registered ids whose key was not found in the content
    pub missing: Vec<String>,
}

/// Apply every request entry to `content`, each against the output of the previous one.
pub fn substitute(registry: &SettingRegistry, content: &str, request: &ApplyRequest) -> Substitution {
    let mut working = content.to_string();
    let mut changed = Vec::new();
    let mut unknown = Vec::new();
    let mut missing = Vec::new();

    for (id, value) in request.iter() {
        let Some(setting) = registry.get(id) else {
            warn!(id = id, "Unknown setting");
            unknown.push(id.to_string());
            continue;
        };

        let (replaced, matches) = setting.replace_all(&working, value);
        if matches == 0 {
            warn!(key = setting.key, "Pattern not found");
            missing.push(id.to_string());
            continue;
        }

        let replaced = replaced.into_owned();
        info!(key = setting.key, value = value, occurrences = matches, "Applied");
        changed.push(format!("{}: {}", setting.description, value));
        working = replaced;
    }

    Substitution {
        content: working,
        changed,
        unknown,
        missing,
    }
}

/// Profile text with an optional leading byte-order mark split off
struct ProfileText {
    had_bom: bool,
    body: String,
}

impl ProfileText {
    fn read(path: &Path) -> EditResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EditError::NotFound {
                path: path.to_path_buf(),
            },
            _ => EditError::io("read profile", path, e),
        })?;
        Ok(match raw.strip_prefix(BOM) {
            Some(body) => Self {
                had_bom: true,
                body: body.to_string(),
            },
            None => Self {
                had_bom: false,
                body: raw,
            },
        })
    }

    fn encode(&self, body: &str) -> Vec<u8> {
        let mut out = String::with_capacity(body.len() + BOM.len_utf8());
        if self.had_bom {
            out.push(BOM);
        }
        out.push_str(body);
        out.into_bytes()
    }
}

/// Applies setting batches to a profile file
#[derive(Debug, Clone)]
pub struct ConfigEditEngine {
    registry: Arc<SettingRegistry>,
    replace: ReplaceFn,
}

impl ConfigEditEngine {
    pub fn new(registry: Arc<SettingRegistry>) -> Self {
        Self {
            registry,
            replace: atomic::persist_temp,
        }
    }

    /// Engine whose final rename step is `replace`
    pub fn with_replace(registry: Arc<SettingRegistry>, replace: ReplaceFn) -> Self {
        Self { registry, replace }
    }

    pub fn registry(&self) -> &SettingRegistry {
        &self.registry
    }

    /// Back up `path`, apply `request` to it and write it back atomically.
    pub fn apply(&self, path: &Path, request: &ApplyRequest, protect_after: bool) -> ApplyResult {
        if !path.is_file() {
            warn!(path = %path.display(), "Config file not found");
            return ApplyResult::failure(MSG_NOT_FOUND, None, None);
        }

        let backup_path = match backups::create_backup(path) {
            Ok(p) => p,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to back up config");
                return ApplyResult::failure(format!("backup failed: {e}"), None, Some(path.to_path_buf()));
            }
        };

        match self.edit(path, request, protect_after) {
            Ok(changed) if changed.is_empty() => ApplyResult::failure(
                MSG_NO_CHANGES,
                Some(backup_path),
                Some(path.to_path_buf()),
            ),
            Ok(changed) => ApplyResult {
                success: true,
                message: format!("applied {} setting(s)", changed.len()),
                changed,
                backup_path: Some(backup_path),
                config_path: Some(path.to_path_buf()),
            },
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to apply settings");
                ApplyResult::failure(format!("error: {e}"), Some(backup_path), Some(path.to_path_buf()))
            }
        }
    }

    /// Read, substitute and write. Returns the change descriptions.
    fn edit(&self, path: &Path, request: &ApplyRequest, protect_after: bool) -> EditResult<Vec<String>> {
        let profile = ProfileText::read(path)?;
        let result = substitute(&self.registry, &profile.body, request);

        if result.changed.is_empty() {
            return Ok(Vec::new());
        }

        if result.content == profile.body {
            debug!(path = %path.display(), "Profile already holds the requested values");
        } else {
            atomic::write_atomic_with(path, &profile.encode(&result.content), self.replace)?;
        }

        if protect_after && !protect::set_readonly(path) {
            warn!(path = %path.display(), "Profile written but could not be protected");
        }

        Ok(result.changed)
    }

    /// Current value of every registered setting (`None` when its key is absent).
    pub fn get_current_values(&self, path: &Path) -> EditResult<BTreeMap<String, Option<String>>> {
        let profile = ProfileText::read(path)?;
        Ok(self
            .registry
            .iter()
            .map(|setting| {
                let value = setting.find_value(&profile.body).map(str::to_string);
                (setting.id.to_string(), value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tempfile::{NamedTempFile, TempDir};

    const PROFILE: &str = "\u{FEFF}GstAudio.Volume_Tinnitus 1.000000\n\
                           GstRender.AMDLowLatency 0\n\
                           GstRender.ChromaticAberration 1\n\
                           GstRender.DisplayMappingHdr10PeakLuma 1000.000000\n\
                           GstRender.FilmGrain 1\n\
                           GstRender.FutureFrameRendering 1\n\
                           GstRender.IntelLowLatency 0\n\
                           GstRender.LensDistortion 1\n\
                           GstRender.MotionBlurWeapon 0.500000\n\
                           GstRender.MotionBlurWorld 0.500000\n\
                           GstRender.NvidiaLowLatency 0\n\
                           GstRender.TextureQuality 3\n\
                           GstRender.Vignette 1\n\
                           GstRender.WeaponDOF 1\n";

    fn engine() -> ConfigEditEngine {
        ConfigEditEngine::new(Arc::new(SettingRegistry::builtin()))
    }

    fn profile_in(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("PROFSAVE_profile");
        fs::write(&path, content).unwrap();
        path
    }

    fn failing_replace(_temp: NamedTempFile, _target: &Path) -> io::Result<()> {
        Err(io::Error::other("simulated rename failure"))
    }

    #[test]
    fn test_apply_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);
        let engine = engine();
        let before = engine.get_current_values(&path).unwrap();

        let request: ApplyRequest = [("film_grain", "0"), ("hdr_peak_brightness", "800.000000")]
            .into_iter()
            .collect();
        let result = engine.apply(&path, &request, false);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "applied 2 setting(s)");
        assert_eq!(
            result.changed,
            vec!["Film Grain: 0", "HDR Peak Brightness (nits): 800.000000"]
        );
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));

        let after = engine.get_current_values(&path).unwrap();
        assert_eq!(after["film_grain"].as_deref(), Some("0"));
        assert_eq!(after["hdr_peak_brightness"].as_deref(), Some("800.000000"));
        for (id, value) in &after {
            if id != "film_grain" && id != "hdr_peak_brightness" {
                assert_eq!(value, &before[id], "{id} changed unexpectedly");
            }
        }
    }

    #[test]
    fn test_untouched_lines_are_preserved() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);

        let request: ApplyRequest = [("vignette", "0")].into_iter().collect();
        assert!(engine().apply(&path, &request, false).success);

        let expected = PROFILE.replace("GstRender.Vignette 1", "GstRender.Vignette 0");
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);
        let engine = engine();
        let request: ApplyRequest = [("weapon_dof", "0"), ("tinnitus", "0.000000")].into_iter().collect();

        let first = engine.apply(&path, &request, false);
        let bytes_after_first = fs::read(&path).unwrap();
        let second = engine.apply(&path, &request, false);

        assert!(first.success && second.success);
        assert_eq!(first.changed, second.changed);
        assert_eq!(fs::read(&path).unwrap(), bytes_after_first);
    }

    #[test]
    fn test_failed_replace_leaves_profile_intact() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);
        protect::set_readonly(&path);
        let engine = ConfigEditEngine::with_replace(Arc::new(SettingRegistry::builtin()), failing_replace);

        let request: ApplyRequest = [("film_grain", "0")].into_iter().collect();
        let result = engine.apply(&path, &request, true);

        assert!(!result.success);
        assert!(result.message.contains("simulated rename failure"), "{}", result.message);
        assert!(result.backup_path.is_some());
        assert_eq!(fs::read_to_string(&path).unwrap(), PROFILE);
        assert!(protect::is_readonly(&path));

        // Only the profile and its backup remain
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 2);
        protect::remove_readonly(&path);
    }

    #[test]
    fn test_failed_replace_keeps_writable_profile_writable() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);
        let engine = ConfigEditEngine::with_replace(Arc::new(SettingRegistry::builtin()), failing_replace);

        let request: ApplyRequest = [("film_grain", "0")].into_iter().collect();
        assert!(!engine.apply(&path, &request, true).success);
        assert!(!protect::is_readonly(&path));
    }

    #[test]
    fn test_no_match_still_backs_up() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, "GstRender.TextureQuality 3\n");

        let request: ApplyRequest = [("film_grain", "0")].into_iter().collect();
        let result = engine().apply(&path, &request, true);

        assert!(!result.success);
        assert_eq!(result.message, MSG_NO_CHANGES);
        let backup = result.backup_path.unwrap();
        assert_eq!(fs::read_to_string(backup).unwrap(), "GstRender.TextureQuality 3\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "GstRender.TextureQuality 3\n");
        assert!(!protect::is_readonly(&path));
    }

    #[test]
    fn test_missing_profile_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PROFSAVE_profile");

        let request: ApplyRequest = [("film_grain", "0")].into_iter().collect();
        let result = engine().apply(&path, &request, true);

        assert!(!result.success);
        assert_eq!(result.message, MSG_NOT_FOUND);
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_same_key_on_two_lines() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, "GstRender.FilmGrain 1\nGstRender.Other 5\n  GstRender.FilmGrain 1\n");

        let request: ApplyRequest = [("film_grain", "0")].into_iter().collect();
        let result = engine().apply(&path, &request, false);

        assert!(result.success);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "GstRender.FilmGrain 0\nGstRender.Other 5\n  GstRender.FilmGrain 0\n"
        );
    }

    #[test]
    fn test_unknown_id_does_not_block_batch() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);

        let request: ApplyRequest = [("ray_tracing", "1"), ("vignette", "0")].into_iter().collect();
        let result = engine().apply(&path, &request, false);

        assert!(result.success);
        assert_eq!(result.changed, vec!["Vignette: 0"]);
    }

    #[test]
    fn test_protect_after_sets_readonly() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);

        let request: ApplyRequest = [("vignette", "0")].into_iter().collect();
        assert!(engine().apply(&path, &request, true).success);
        assert!(protect::is_readonly(&path));

        // A protected profile can still be edited, and keeps its protection
        let request: ApplyRequest = [("vignette", "1")].into_iter().collect();
        assert!(engine().apply(&path, &request, false).success);
        assert!(protect::is_readonly(&path));
        assert!(fs::read_to_string(&path).unwrap().contains("GstRender.Vignette 1\n"));
        protect::remove_readonly(&path);
    }

    #[test]
    fn test_bom_is_kept_and_ignored_for_matching() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, PROFILE);
        let engine = engine();

        let values = engine.get_current_values(&path).unwrap();
        assert_eq!(values["tinnitus"].as_deref(), Some("1.000000"));

        let request: ApplyRequest = [("tinnitus", "0.000000")].into_iter().collect();
        assert!(engine.apply(&path, &request, false).success);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("\u{FEFF}GstAudio.Volume_Tinnitus 0.000000\n"));
    }

    #[test]
    fn test_substitute_reports_unknown_and_missing() {
        let registry = SettingRegistry::builtin();
        let request: ApplyRequest = [("nope", "1"), ("vignette", "0"), ("film_grain", "0")]
            .into_iter()
            .collect();

        let out = substitute(&registry, "GstRender.Vignette 1\n", &request);

        assert_eq!(out.content, "GstRender.Vignette 0\n");
        assert_eq!(out.changed, vec!["Vignette: 0"]);
        assert_eq!(out.unknown, vec!["nope"]);
        assert_eq!(out.missing, vec!["film_grain"]);
    }

    #[test]
    fn test_current_values_for_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = profile_in(&dir, "GstRender.WeaponDOF 0\n");

        let values = engine().get_current_values(&path).unwrap();
        assert_eq!(values.len(), 13);
        assert_eq!(values["weapon_dof"].as_deref(), Some("0"));
        assert_eq!(values["film_grain"], None);
    }

    #[test]
    fn test_current_values_of_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = engine().get_current_values(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EditError::NotFound { .. }));
    }
}
