//! Detecting, stopping and starting the Steam client.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::{Error, Result};

#[cfg(windows)]
const PROCESS_NAME: &str = "steam.exe";
#[cfg(not(windows))]
const PROCESS_NAME: &str = "steam";

const EXIT_POLL: Duration = Duration::from_millis(500);
const EXIT_POLLS: u32 = 60;

/// Launchers to try, the installation's own first.
pub fn launcher_candidates(root: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(root) = root {
        candidates.push(root.join("steam.sh"));
        candidates.push(root.join("Steam.exe"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/share/Steam/steam.sh"));
    }
    candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam\Steam.exe"));
    candidates.push(PathBuf::from(r"C:\Program Files\Steam\Steam.exe"));
    candidates
}

fn run(program: &str, args: &[&str]) -> Result<std::process::Output> {
    Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::Process(format!("failed to run {program}: {e}")))
}

/// Whether `tasklist` output names the process.
#[cfg_attr(not(windows), allow(dead_code))]
fn listed(stdout: &str, name: &str) -> bool {
    let name = name.to_lowercase();
    stdout
        .lines()
        .any(|line| line.trim_start().to_lowercase().starts_with(&name))
}

#[cfg(windows)]
fn query_process() -> Result<bool> {
    let filter = format!("IMAGENAME eq {PROCESS_NAME}");
    let output = run("tasklist", &["/FI", &filter, "/NH"])?;
    Ok(listed(&String::from_utf8_lossy(&output.stdout), PROCESS_NAME))
}

#[cfg(not(windows))]
fn query_process() -> Result<bool> {
    let output = run("pgrep", &["-x", PROCESS_NAME])?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(Error::Process(format!(
            "pgrep failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

pub fn is_running() -> Result<bool> {
    let running = query_process()?;
    if running {
        info!("Steam is running.");
    } else {
        info!("Steam is not running.");
    }
    Ok(running)
}

#[cfg(windows)]
fn terminate() -> Result<()> {
    let output = run("taskkill", &["/IM", PROCESS_NAME])?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Process(format!(
            "taskkill failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(not(windows))]
fn terminate() -> Result<()> {
    let output = run("pkill", &["-x", PROCESS_NAME])?;
    match output.status.code() {
        // 1 means the process exited on its own in the meantime
        Some(0) | Some(1) => Ok(()),
        _ => Err(Error::Process(format!(
            "pkill failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

fn stop_if_running(
    check: impl FnOnce() -> Result<bool>,
    close: impl FnOnce() -> Result<bool>,
    close_steam: bool,
    skip_check: bool,
) -> Result<()> {
    if skip_check {
        warn!("Skipping the Steam process check.");
        return Ok(());
    }
    match check() {
        Ok(false) => Ok(()),
        Ok(true) if close_steam => close().map(|_| ()),
        Ok(true) => Err(Error::SteamRunning),
        Err(e) => Err(Error::SteamStateUnknown(e.to_string())),
    }
}

/// Makes sure Steam is not running before its files are written.
///
/// A running client is closed only with `close_steam`. When the process
/// state cannot be read the caller has to opt out with `skip_check`.
pub fn ensure_stopped(close_steam: bool, skip_check: bool) -> Result<()> {
    stop_if_running(is_running, close, close_steam, skip_check)
}

/// Terminates Steam and waits for it to exit. Returns `false` when it was
/// not running.
pub fn close() -> Result<bool> {
    if !query_process()? {
        warn!("Steam process not found.");
        return Ok(false);
    }

    info!("Terminating Steam process.");
    terminate()?;
    for _ in 0..EXIT_POLLS {
        if !query_process()? {
            info!("Steam has been terminated.");
            return Ok(true);
        }
        thread::sleep(EXIT_POLL);
    }
    Err(Error::Process("Steam did not exit in time".to_string()))
}

/// Starts the first launcher in `candidates` that exists.
pub fn open(candidates: &[PathBuf]) -> Result<PathBuf> {
    let Some(path) = candidates.iter().find(|path| path.is_file()) else {
        error!("Steam executable not found in any of the specified paths.");
        return Err(Error::Process("Steam executable not found".to_string()));
    };

    info!("Opening Steam from path: {}", path.display());
    Command::new(path).spawn().map_err(|e| Error::io(path, e))?;
    Ok(path.clone())
}
