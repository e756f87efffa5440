//! Timestamped profile backups
//!
//! Backups live next to the profile as `<name>.backup_<YYYYMMDD_HHMMSS>`.
//! Two backups within the same second get a `_2`, `_3`, ... suffix instead
//! of overwriting each other.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::atomic;
use crate::constants::backup::{MAX_COLLISION_ATTEMPTS, SUFFIX, TIMESTAMP_FORMAT};
use crate::error::{EditError, EditResult};
use crate::protect;

/// Length of a formatted `YYYYMMDD_HHMMSS` timestamp
const TIMESTAMP_LEN: usize = 15;

/// A backup file found beside a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub path: PathBuf,
    /// Timestamp embedded in the filename, if it parses
    pub timestamp: Option<NaiveDateTime>,
    pub size: u64,
}

impl BackupEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn profile_name(profile: &Path) -> String {
    profile
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn backup_prefix(profile: &Path) -> String {
    format!("{}{}", profile_name(profile), SUFFIX)
}

/// Backup path for `profile` taken at `at` (without collision suffix)
pub fn backup_path_for(profile: &Path, at: NaiveDateTime) -> PathBuf {
    profile.with_file_name(format!("{}{}", backup_prefix(profile), at.format(TIMESTAMP_FORMAT)))
}

fn backup_dir(path: &Path) -> PathBuf {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Whether `backup` is one of `profile`'s backups: named `<profile>.backup_*`
/// and stored in the profile's directory
pub fn is_backup_of(backup: &Path, profile: &Path) -> bool {
    let named = backup
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(&backup_prefix(profile)));
    named && backup_dir(backup) == backup_dir(profile)
}

/// Parse the timestamp out of a backup filename
pub fn parse_backup_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let (_, rest) = file_name.split_once(SUFFIX)?;
    let stamp = rest.get(..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Same-second collision index: 1 for the plain name, N for a `_N` suffix
fn collision_index(file_name: &str) -> u32 {
    file_name
        .split_once(SUFFIX)
        .and_then(|(_, rest)| rest.get(TIMESTAMP_LEN..))
        .and_then(|tail| tail.strip_prefix('_'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

/// Copy `profile` to a new timestamped backup beside it.
pub fn create_backup(profile: &Path) -> EditResult<PathBuf> {
    create_backup_at(profile, Local::now().naive_local())
}

/// Copy `profile` to a backup stamped with `at`.
pub fn create_backup_at(profile: &Path, at: NaiveDateTime) -> EditResult<PathBuf> {
    let mut source = File::open(profile).map_err(|e| match e.kind() {
        ErrorKind::NotFound => EditError::NotFound {
            path: profile.to_path_buf(),
        },
        _ => EditError::io("open profile for backup", profile, e),
    })?;

    let base = backup_path_for(profile, at);
    let (backup_path, mut dest) = reserve_backup_file(&base)?;

    if let Err(e) = io::copy(&mut source, &mut dest).and_then(|_| dest.sync_all()) {
        drop(dest);
        let _ = fs::remove_file(&backup_path);
        return Err(EditError::io("copy backup", &backup_path, e));
    }

    info!(path = %backup_path.display(), "Backup created");
    Ok(backup_path)
}

/// Create the first free backup file: `base`, then `base_2`, `base_3`, ...
fn reserve_backup_file(base: &Path) -> EditResult<(PathBuf, File)> {
    for attempt in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = if attempt == 1 {
            base.to_path_buf()
        } else {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!("_{attempt}"));
            PathBuf::from(name)
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "Backup name taken, trying next suffix");
            }
            Err(e) => return Err(EditError::io("create backup", candidate, e)),
        }
    }

    Err(EditError::io(
        "create backup",
        base,
        io::Error::new(ErrorKind::AlreadyExists, "too many backups within one second"),
    ))
}

/// Backups of `profile`, newest first.
///
/// Ordered by the filename timestamp, falling back to modification time for
/// names that do not parse.
pub fn list(profile: &Path) -> EditResult<Vec<BackupEntry>> {
    let dir = profile
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = backup_prefix(profile);

    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EditError::io("list backups", dir, e)),
    };

    let mut entries: Vec<(NaiveDateTime, u32, BackupEntry)> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|m| m.is_file())?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let timestamp = parse_backup_timestamp(&file_name);
            let sort_key = timestamp.unwrap_or_else(|| {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                DateTime::<Local>::from(modified).naive_local()
            });
            Some((
                sort_key,
                collision_index(&file_name),
                BackupEntry {
                    path,
                    timestamp,
                    size: meta.len(),
                },
            ))
        })
        .collect();

    entries.sort_by(|(a_key, a_idx, a), (b_key, b_idx, b)| {
        b_key
            .cmp(a_key)
            .then_with(|| b_idx.cmp(a_idx))
            .then_with(|| b.path.cmp(&a.path))
    });
    Ok(entries.into_iter().map(|(_, _, entry)| entry).collect())
}

/// Replace `profile` with the contents of `backup`.
///
/// The current profile is backed up first so a restore can itself be undone.
/// Returns that safety backup's path (`None` if there was no profile to save).
pub fn restore(backup: &Path, profile: &Path, protect_after: bool) -> EditResult<Option<PathBuf>> {
    if !is_backup_of(backup, profile) {
        return Err(EditError::NotABackup {
            path: backup.to_path_buf(),
        });
    }

    let contents = fs::read(backup).map_err(|e| match e.kind() {
        ErrorKind::NotFound => EditError::NotFound {
            path: backup.to_path_buf(),
        },
        _ => EditError::io("read backup", backup, e),
    })?;

    let safety = if profile.exists() {
        Some(create_backup(profile)?)
    } else {
        None
    };

    atomic::write_atomic(profile, &contents)?;
    info!(backup = %backup.display(), profile = %profile.display(), "Restored profile from backup");

    if protect_after && !protect::set_readonly(profile) {
        warn!(path = %profile.display(), "Restored profile could not be protected");
    }

    Ok(safety)
}

/// Delete one of `profile`'s backups.
pub fn delete(backup: &Path, profile: &Path) -> EditResult<()> {
    if !is_backup_of(backup, profile) {
        return Err(EditError::NotABackup {
            path: backup.to_path_buf(),
        });
    }
    fs::remove_file(backup).map_err(|e| match e.kind() {
        ErrorKind::NotFound => EditError::NotFound {
            path: backup.to_path_buf(),
        },
        _ => EditError::io("delete backup", backup, e),
    })?;
    info!(path = %backup.display(), "Deleted backup");
    Ok(())
}

/// Delete all but the newest `keep` backups. Returns the removed paths.
pub fn prune(profile: &Path, keep: usize) -> EditResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in list(profile)?.into_iter().skip(keep) {
        delete(&entry.path, profile)?;
        removed.push(entry.path);
    }
    if !removed.is_empty() {
        info!(removed = removed.len(), kept = keep, "Pruned old backups");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn profile_in(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("PROFSAVE_profile");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_backup_name_format() {
        let path = backup_path_for(Path::new("/tmp/PROFSAVE_profile"), at(14, 30, 22));
        assert_eq!(path, PathBuf::from("/tmp/PROFSAVE_profile.backup_20251020_143022"));
    }

    #[test]
    fn test_parse_backup_timestamp() {
        assert_eq!(
            parse_backup_timestamp("PROFSAVE_profile.backup_20251020_143022"),
            Some(at(14, 30, 22))
        );
        assert_eq!(
            parse_backup_timestamp("PROFSAVE_profile.backup_20251020_143022_2"),
            Some(at(14, 30, 22))
        );
        assert_eq!(parse_backup_timestamp("PROFSAVE_profile.backup_garbage"), None);
        assert_eq!(parse_backup_timestamp("PROFSAVE_profile"), None);
    }

    #[test]
    fn test_create_backup_copies_content() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "GstRender.FilmGrain 1\n");

        let backup = create_backup_at(&profile, at(9, 0, 0)).unwrap();

        assert_eq!(backup.file_name().unwrap(), "PROFSAVE_profile.backup_20251020_090000");
        assert_eq!(fs::read_to_string(backup).unwrap(), "GstRender.FilmGrain 1\n");
    }

    #[test]
    fn test_same_second_backups_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "one");

        let first = create_backup_at(&profile, at(9, 0, 0)).unwrap();
        fs::write(&profile, "two").unwrap();
        let second = create_backup_at(&profile, at(9, 0, 0)).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "PROFSAVE_profile.backup_20251020_090000_2");
        assert_eq!(fs::read_to_string(first).unwrap(), "one");
        assert_eq!(fs::read_to_string(second).unwrap(), "two");
    }

    #[test]
    fn test_backup_of_missing_profile() {
        let dir = TempDir::new().unwrap();
        let err = create_backup(&dir.path().join("PROFSAVE_profile")).unwrap_err();
        assert!(matches!(err, EditError::NotFound { .. }));
    }

    #[test]
    fn test_backup_of_readonly_profile_is_deletable() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        protect::set_readonly(&profile);

        let backup = create_backup(&profile).unwrap();
        assert!(!protect::is_readonly(&backup));
        delete(&backup, &profile).unwrap();
        protect::remove_readonly(&profile);
    }

    #[test]
    fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        let older = create_backup_at(&profile, at(8, 0, 0)).unwrap();
        let newest = create_backup_at(&profile, at(10, 0, 0)).unwrap();
        let middle = create_backup_at(&profile, at(9, 0, 0)).unwrap();
        let middle_2 = create_backup_at(&profile, at(9, 0, 0)).unwrap();
        fs::write(dir.path().join("unrelated.backup_20251020_110000"), "y").unwrap();

        let listed: Vec<PathBuf> = list(&profile).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(listed, vec![newest, middle_2, middle, older]);
    }

    #[test]
    fn test_backup_entry_serializes_timestamp() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "abc");
        create_backup_at(&profile, at(14, 30, 22)).unwrap();

        let entries = list(&profile).unwrap();
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["timestamp"], "2025-10-20T14:30:22");
        assert_eq!(json["size"], 3);
    }

    #[test]
    fn test_list_without_backups() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        assert!(list(&profile).unwrap().is_empty());
    }

    #[test]
    fn test_restore_swaps_content_and_keeps_safety_copy() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "original");
        let backup = create_backup_at(&profile, at(8, 0, 0)).unwrap();
        fs::write(&profile, "edited").unwrap();

        let safety = restore(&backup, &profile, true).unwrap().unwrap();

        assert_eq!(fs::read_to_string(&profile).unwrap(), "original");
        assert_eq!(fs::read_to_string(&safety).unwrap(), "edited");
        assert!(protect::is_readonly(&profile));
        protect::remove_readonly(&profile);
    }

    #[test]
    fn test_restore_rejects_non_backup() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        let other = dir.path().join("notes.txt");
        fs::write(&other, "y").unwrap();

        let err = restore(&other, &profile, false).unwrap_err();
        assert!(matches!(err, EditError::NotABackup { .. }));
        assert_eq!(fs::read_to_string(&profile).unwrap(), "x");
    }

    #[test]
    fn test_delete_rejects_profile_itself() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        assert!(matches!(delete(&profile, &profile).unwrap_err(), EditError::NotABackup { .. }));
        assert!(profile.exists());
    }

    #[test]
    fn test_delete_rejects_backups_of_other_files() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");

        let unrelated = dir.path().join("notes.backup_20251020_090000");
        fs::write(&unrelated, "keep").unwrap();
        assert!(matches!(delete(&unrelated, &profile).unwrap_err(), EditError::NotABackup { .. }));
        assert!(unrelated.exists());

        let elsewhere = TempDir::new().unwrap();
        let foreign = elsewhere.path().join("PROFSAVE_profile.backup_20251020_090000");
        fs::write(&foreign, "keep").unwrap();
        assert!(matches!(delete(&foreign, &profile).unwrap_err(), EditError::NotABackup { .. }));
        assert!(foreign.exists());
    }

    #[test]
    fn test_is_backup_of() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        let backup = create_backup_at(&profile, at(9, 0, 0)).unwrap();

        assert!(is_backup_of(&backup, &profile));
        assert!(!is_backup_of(&profile, &profile));
        assert!(!is_backup_of(&dir.path().join("other.backup_1"), &profile));
    }

    #[test]
    fn test_collision_index() {
        assert_eq!(collision_index("PROFSAVE_profile.backup_20251020_090000"), 1);
        assert_eq!(collision_index("PROFSAVE_profile.backup_20251020_090000_2"), 2);
        assert_eq!(collision_index("PROFSAVE_profile.backup_20251020_090000_11"), 11);
        assert_eq!(collision_index("PROFSAVE_profile.backup_garbage"), 1);
    }

    #[test]
    fn test_double_digit_collisions_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        let created: Vec<PathBuf> = (0..11)
            .map(|_| create_backup_at(&profile, at(9, 0, 0)).unwrap())
            .collect();
        let newest = created.last().unwrap().clone();
        assert!(newest.to_string_lossy().ends_with("_090000_11"));

        let listed: Vec<PathBuf> = list(&profile).unwrap().into_iter().map(|e| e.path).collect();
        let expected: Vec<PathBuf> = created.iter().rev().cloned().collect();
        assert_eq!(listed, expected);

        let removed = prune(&profile, 1).unwrap();
        assert_eq!(removed.len(), 10);
        assert!(newest.exists());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let profile = profile_in(&dir, "x");
        let a = create_backup_at(&profile, at(8, 0, 0)).unwrap();
        let b = create_backup_at(&profile, at(9, 0, 0)).unwrap();
        let c = create_backup_at(&profile, at(10, 0, 0)).unwrap();

        let removed = prune(&profile, 2).unwrap();

        assert_eq!(removed, vec![a.clone()]);
        assert!(!a.exists());
        assert!(b.exists());
        assert!(c.exists());
    }
}
