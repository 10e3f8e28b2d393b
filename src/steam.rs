//! Steam installation discovery and the per-user shortcut registration loop.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::ledger;
use crate::vdf::{self, DecodedEntry, IndexPolicy, Shortcut};

pub const SHORTCUTS_FILE: &str = "shortcuts.vdf";

pub fn default_install_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local").join("share").join("Steam"));
        candidates.push(home.join(".steam").join("steam"));
    }
    candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
    candidates.push(PathBuf::from(r"C:\Program Files\Steam"));
    candidates
}

pub fn locate_installation(candidates: &[PathBuf]) -> Result<PathBuf> {
    match candidates.iter().find(|path| path.is_dir()) {
        Some(path) => {
            info!("Steam installation found at: {}", path.display());
            Ok(path.clone())
        }
        None => {
            error!("Steam installation not found.");
            Err(Error::InstallationNotFound {
                searched: candidates.to_vec(),
            })
        }
    }
}

/// Directory names under `<root>/userdata`, sorted.
pub fn list_user_ids(root: &Path) -> Result<Vec<String>> {
    let userdata = root.join("userdata");
    let dir = match fs::read_dir(&userdata) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NoUsers { path: userdata });
        }
        Err(e) => return Err(Error::io(&userdata, e)),
    };

    let mut user_ids = Vec::new();
    for entry in dir {
        let entry = entry.map_err(|e| Error::io(&userdata, e))?;
        if entry.path().is_dir() {
            user_ids.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    if user_ids.is_empty() {
        return Err(Error::NoUsers { path: userdata });
    }
    user_ids.sort();
    info!("Steam user IDs found: {:?}", user_ids);
    Ok(user_ids)
}

pub fn shortcuts_path(root: &Path, user_id: &str) -> PathBuf {
    root.join("userdata")
        .join(user_id)
        .join("config")
        .join(SHORTCUTS_FILE)
}

#[derive(Debug, Clone)]
pub struct Options {
    pub policy: IndexPolicy,
    pub backup: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            policy: IndexPolicy::default(),
            backup: true,
        }
    }
}

#[derive(Debug)]
pub enum StoreOutcome {
    Written {
        index: u32,
        backup: Option<PathBuf>,
    },
    AlreadyPresent,
    Failed(Error),
}

#[derive(Debug)]
pub struct StoreReport {
    pub user_id: String,
    pub path: PathBuf,
    pub outcome: StoreOutcome,
}

impl StoreReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StoreOutcome::Failed(_))
    }
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            StoreOutcome::Written { index, .. } => {
                write!(f, "user {}: added as entry {}", self.user_id, index)
            }
            StoreOutcome::AlreadyPresent => write!(f, "user {}: already present", self.user_id),
            StoreOutcome::Failed(e) => write!(f, "user {}: failed: {}", self.user_id, e),
        }
    }
}

fn update_ledger(path: &Path, shortcut: &Shortcut, options: &Options) -> Result<StoreOutcome> {
    let loaded = ledger::load_or_create(path)?;
    if loaded.created {
        ledger::store(path, &loaded.bytes)?;
    }

    if ledger::duplicate_exists(&loaded.bytes, &shortcut.app_name) {
        return Ok(StoreOutcome::AlreadyPresent);
    }

    let appended = ledger::append_entry(&loaded.bytes, shortcut, options.policy)?;
    let backup = if options.backup && !loaded.created {
        ledger::backup(path)?
    } else {
        None
    };
    ledger::store(path, &appended.bytes)?;

    Ok(StoreOutcome::Written {
        index: appended.index,
        backup,
    })
}

pub fn process_user(
    root: &Path,
    user_id: &str,
    shortcut: &Shortcut,
    options: &Options,
) -> StoreReport {
    let path = shortcuts_path(root, user_id);
    let outcome = match update_ledger(&path, shortcut, options) {
        Ok(StoreOutcome::AlreadyPresent) => {
            info!(
                "The game '{}' already exists for user {}.",
                shortcut.app_name, user_id
            );
            StoreOutcome::AlreadyPresent
        }
        Ok(outcome) => {
            info!(
                "Non-Steam game '{}' added for user {} successfully.",
                shortcut.app_name, user_id
            );
            outcome
        }
        Err(e) => {
            error!("Failed to update {}: {}", path.display(), e);
            StoreOutcome::Failed(e)
        }
    };

    StoreReport {
        user_id: user_id.to_string(),
        path,
        outcome,
    }
}

/// Registers `shortcut` with every user of the installation at `root`.
///
/// Invalid input and a missing `userdata` fail before any file is touched.
/// A failing user store is reported and the remaining stores are still
/// processed.
pub fn add_to_all_users(
    root: &Path,
    shortcut: &Shortcut,
    options: &Options,
) -> Result<Vec<StoreReport>> {
    if shortcut.app_name.is_empty() {
        return Err(Error::InvalidInput(
            "shortcut name must not be empty".to_string(),
        ));
    }
    vdf::encode_entry(0, shortcut)?;

    let user_ids = list_user_ids(root)?;
    let reports: Vec<StoreReport> = user_ids
        .iter()
        .map(|user_id| process_user(root, user_id, shortcut, options))
        .collect();

    let failed = reports.iter().filter(|r| r.is_failure()).count();
    if failed > 0 {
        warn!("{} of {} user stores failed", failed, reports.len());
    }
    Ok(reports)
}

/// Decoded entries of one user's ledger; empty when the file does not exist.
pub fn list_shortcuts(root: &Path, user_id: &str) -> Result<Vec<DecodedEntry>> {
    let path = shortcuts_path(root, user_id);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(&path, e)),
    };
    Ok(vdf::decode(&bytes)?.entries)
}

/// Every user's shortcuts. A store that cannot be read is reported in its
/// own slot and does not stop the others.
pub fn list_all_users(root: &Path) -> Result<Vec<(String, Result<Vec<DecodedEntry>>)>> {
    Ok(list_user_ids(root)?
        .into_iter()
        .map(|user_id| {
            let entries = list_shortcuts(root, &user_id);
            if let Err(e) = &entries {
                warn!("Could not list shortcuts of user {}: {}", user_id, e);
            }
            (user_id, entries)
        })
        .collect())
}
