//! The daemon's line-oriented `key = value` config file.
//!
//! [`ConfigDocument`] is the in-memory, format-preserving view: every line is
//! kept verbatim and only `key = value` lines are addressable. [`ConfigStore`]
//! wraps a path and performs one independent read-modify-write per call.
//! There is no locking; a concurrent external writer can lose its edit.
//!
//! Backups live next to the file as `<file>.backup.<timestamp>` and are
//! rotated to the newest `retention` copies.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, CoreError};
use crate::types::ConfigMap;

// ---------------------------------------------------------------------------
// 1. Document
// ---------------------------------------------------------------------------

/// Ordered raw lines of a config file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    lines: Vec<String>,
    crlf: bool,
    trailing_newline: bool,
}

/// Split an addressable line into `(key, value)`; `None` for comments and blanks.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        let crlf = text.contains("\r\n");
        let trailing_newline = text.ends_with('\n');
        let lines = text
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        Self {
            lines,
            crlf,
            trailing_newline,
        }
    }

    pub fn render(&self) -> String {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        let mut out = self.lines.join(eol);
        if !self.lines.is_empty() && self.trailing_newline {
            out.push_str(eol);
        }
        out
    }

    /// Addressable entries; a key repeated later in the file wins.
    pub fn entries(&self) -> ConfigMap {
        self.lines
            .iter()
            .filter_map(|l| parse_line(l))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lines
            .iter()
            .filter_map(|l| parse_line(l))
            .filter(|(k, _)| *k == key)
            .last()
            .map(|(_, v)| v.to_string())
    }

    /// Update the first line holding `key` (dropping later duplicates), or append.
    ///
    /// Returns `false` when the document already held exactly this value.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let rendered = format!("{key} = {value}");
        let mut seen = false;
        let mut changed = false;
        let mut kept = Vec::with_capacity(self.lines.len() + 1);
        for line in self.lines.drain(..) {
            match parse_line(&line) {
                Some((k, v)) if k == key => {
                    if seen {
                        changed = true;
                        continue;
                    }
                    seen = true;
                    if v != value {
                        changed = true;
                        kept.push(rendered.clone());
                    } else {
                        kept.push(line);
                    }
                }
                _ => kept.push(line),
            }
        }
        if !seen {
            kept.push(rendered);
            changed = true;
            self.trailing_newline = true;
        }
        self.lines = kept;
        changed
    }

    /// Remove every line holding exactly `key`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(parse_line(line), Some((k, _)) if k == key));
        self.lines.len() != before
    }
}

// ---------------------------------------------------------------------------
// 2. Store
// ---------------------------------------------------------------------------

/// Filesystem-backed config file with timestamped backups.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    retention: usize,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            path: path.into(),
            retention: retention.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the whole document. `ConfigNotFound` if the file is absent.
    pub fn load(&self) -> Result<ConfigDocument, CoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(ConfigDocument::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CoreError::ConfigNotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(io_err(&self.path, e)),
        }
    }

    /// Atomically replace the file with `doc` (`.tmp` sibling + rename).
    pub fn save(&self, doc: &ConfigDocument) -> Result<(), CoreError> {
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, doc.render()).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }

    /// Addressable `key = value` pairs; comments and blanks are ignored.
    pub fn read(&self) -> Result<ConfigMap, CoreError> {
        Ok(self.load()?.entries())
    }

    /// `read`, degrading to an empty map when the file does not exist.
    pub fn read_or_empty(&self) -> Result<ConfigMap, CoreError> {
        match self.read() {
            Err(CoreError::ConfigNotFound { .. }) => Ok(ConfigMap::new()),
            other => other,
        }
    }

    /// Set `key = value`, preserving every other line verbatim.
    ///
    /// Returns `Ok(false)` without touching the file when the value is unchanged.
    pub fn write(&self, key: &str, value: &str) -> Result<bool, CoreError> {
        let mut doc = self.load().map_err(|e| self.write_failure(key, e))?;
        if !doc.set(key, value) {
            return Ok(false);
        }
        self.save(&doc).map_err(|e| self.write_failure(key, e))?;
        Ok(true)
    }

    /// Remove all lines for `key`. Returns `Ok(false)` if the key was absent.
    pub fn delete(&self, key: &str) -> Result<bool, CoreError> {
        let mut doc = self.load().map_err(|e| self.write_failure(key, e))?;
        if !doc.remove(key) {
            return Ok(false);
        }
        self.save(&doc).map_err(|e| self.write_failure(key, e))?;
        Ok(true)
    }

    fn write_failure(&self, key: &str, source: CoreError) -> CoreError {
        match source {
            // Surface "nothing to write to" and permission problems as-is.
            CoreError::ConfigNotFound { .. } | CoreError::PermissionDenied { .. } => source,
            other => CoreError::WriteFailure {
                key: key.to_string(),
                path: self.path.clone(),
                source: Box::new(other),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// Copy the live file to `<file>.backup.<timestamp>` and prune old copies.
    pub fn backup(&self) -> Result<PathBuf, CoreError> {
        if !self.exists() {
            return Err(CoreError::ConfigNotFound {
                path: self.path.clone(),
            });
        }
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.6fZ").to_string();
        let mut target = self.backup_path(&stamp);
        let mut n = 1;
        while target.exists() {
            target = self.backup_path(&format!("{stamp}-{n:03}"));
            n += 1;
        }
        std::fs::copy(&self.path, &target).map_err(|e| io_err(&target, e))?;
        self.prune_backups()?;
        Ok(target)
    }

    /// Existing backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, CoreError> {
        let Some(dir) = self.path.parent() else {
            return Ok(vec![]);
        };
        let prefix = self.backup_prefix();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(dir, e)),
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| name.starts_with(&prefix) && !name.ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .map(|e| e.path())
            .collect();
        backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(backups)
    }

    /// Copy the newest backup over the live file.
    pub fn restore_latest(&self) -> Result<PathBuf, CoreError> {
        let latest = self
            .list_backups()?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NoBackupFound {
                path: self.path.clone(),
            })?;
        self.restore(&latest)?;
        Ok(latest)
    }

    /// Copy one specific backup over the live file.
    pub fn restore(&self, backup: &Path) -> Result<(), CoreError> {
        if !backup.is_file() {
            return Err(CoreError::NoBackupFound {
                path: self.path.clone(),
            });
        }
        let tmp = tmp_path(&self.path);
        std::fs::copy(backup, &tmp).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        tracing::info!(backup = %backup.display(), "restored daemon config from backup");
        Ok(())
    }

    fn prune_backups(&self) -> Result<(), CoreError> {
        for stale in self.list_backups()?.into_iter().skip(self.retention) {
            if let Err(err) = std::fs::remove_file(&stale) {
                tracing::warn!(path = %stale.display(), error = %err, "failed to prune config backup");
            }
        }
        Ok(())
    }

    fn backup_prefix(&self) -> String {
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("config");
        format!("{name}.backup.")
    }

    fn backup_path(&self, stamp: &str) -> PathBuf {
        self.path
            .with_file_name(format!("{}{stamp}", self.backup_prefix()))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lumen.tmp", path.display()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
