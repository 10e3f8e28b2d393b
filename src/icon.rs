//! Pulls the first icon out of a Windows executable.

use std::fs;
use std::path::{Path, PathBuf};

use pelite::resources::Resources;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const ICON_FILE: &str = "icon.ico";

fn resources_of(bytes: &[u8]) -> pelite::Result<Resources<'_>> {
    match pelite::pe64::PeFile::from_bytes(bytes) {
        Ok(file) => {
            use pelite::pe64::Pe;
            file.resources()
        }
        Err(_) => {
            use pelite::pe32::Pe;
            pelite::pe32::PeFile::from_bytes(bytes)?.resources()
        }
    }
}

/// The first icon group of a PE image, serialized as an `.ico` file.
pub fn icon_from_exe(bytes: &[u8]) -> Option<Vec<u8>> {
    let resources = match resources_of(bytes) {
        Ok(resources) => resources,
        Err(e) => {
            warn!("Icon extraction failed: {}", e);
            return None;
        }
    };

    let (_, group) = resources.icons().find_map(|icon| icon.ok())?;
    let mut ico = Vec::new();
    if let Err(e) = group.write(&mut ico) {
        warn!("Icon extraction failed: {}", e);
        return None;
    }
    Some(ico)
}

/// Writes the executable's first icon to `icon.ico` next to it.
///
/// `Ok(None)` when the file has no usable icon resource.
pub fn extract_icon(exe: &Path) -> Result<Option<PathBuf>> {
    let bytes = fs::read(exe).map_err(|e| Error::io(exe, e))?;
    let Some(ico) = icon_from_exe(&bytes) else {
        warn!(
            "No icons available in {}, or the resource is malformed",
            exe.display()
        );
        return Ok(None);
    };

    let target = exe.parent().unwrap_or(Path::new("")).join(ICON_FILE);
    fs::write(&target, ico).map_err(|e| Error::io(&target, e))?;
    info!("Icon extracted and saved to: {}", target.display());
    Ok(Some(target))
}
