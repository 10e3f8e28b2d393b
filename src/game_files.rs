use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const APP_ID_FILE: &str = "steam_appid.txt";

/// First `.ini` file under `directory`, walking entries in name order.
pub fn find_ini_file(directory: &Path) -> Option<PathBuf> {
    let found = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().ends_with(".ini"))
        .map(|entry| entry.into_path());

    match &found {
        Some(path) => info!("Found .ini file: {}", path.display()),
        None => warn!("No .ini file found in directory: {}", directory.display()),
    }
    found
}

/// Rewrites every `PlayerID=` or `AccountId=` line as `AccountId=<steam_id>`.
/// Returns the number of lines replaced.
pub fn update_ini_file(file_path: &Path, steam_id: &str) -> Result<usize> {
    let contents = fs::read_to_string(file_path).map_err(|e| Error::io(file_path, e))?;

    let mut updated = String::with_capacity(contents.len());
    let mut replaced = 0;
    for line in contents.split_inclusive('\n') {
        if line.contains("PlayerID=") || line.contains("AccountId=") {
            updated.push_str(&format!("AccountId={steam_id}\n"));
            replaced += 1;
        } else {
            updated.push_str(line);
        }
    }

    if replaced == 0 {
        warn!("No account line found in {}", file_path.display());
        return Ok(0);
    }
    fs::write(file_path, updated).map_err(|e| Error::io(file_path, e))?;
    info!("Updated .ini file at {} with Steam ID.", file_path.display());
    Ok(replaced)
}

pub fn create_steam_appid_file(directory: &Path, app_id: u32) -> Result<PathBuf> {
    let file_path = directory.join(APP_ID_FILE);
    fs::write(&file_path, app_id.to_string()).map_err(|e| Error::io(&file_path, e))?;
    info!(
        "Created {} file at {} with app ID: {}",
        APP_ID_FILE,
        file_path.display(),
        app_id
    );
    Ok(file_path)
}
