use anyhow::Result;
use std::path::{Path, PathBuf};

const LOG_FOLDER_NAME: &str = "Install_Log";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> Result<PathBuf> {
    // Prefer the folder where the executable lives
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return Ok(dir.to_path_buf());
        }
    }

    // Fallback: current working directory
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    Ok(cwd)
}

/// Resolve log folder (absolute path), creating it if needed.
///
/// Order: explicit `configured` dir, then `Install_Log/` next to the executable, then the
/// user's local data dir.
pub fn resolve_log_folder(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", dir, e))?;
        return Ok(dir.to_path_buf());
    }

    let beside_exe = resolve_deployment_folder()?.join(LOG_FOLDER_NAME);
    if std::fs::create_dir_all(&beside_exe).is_ok() {
        return Ok(beside_exe);
    }

    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("No writable log folder found"))?
        .join("shop-installer")
        .join("logs");
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", data_dir, e))?;
    Ok(data_dir)
}
