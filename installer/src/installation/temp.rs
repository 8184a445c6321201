// Temp directory clearing

use log::debug;
use std::path::Path;
use std::time::Instant;

use crate::error::{InstallError, Result};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> InstallError + '_ {
    move |source| InstallError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove everything below `dir`, keeping `dir` itself. A missing `dir` is not an error.
///
/// Returns the number of top-level entries removed.
pub async fn clear_dir(dir: &Path) -> Result<usize> {
    let started = Instant::now();
    debug!(
        "[PHASE: install] [STEP: clear_temp] clear_dir entered (dir={:?})",
        dir
    );

    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "[PHASE: install] [STEP: clear_temp] {:?} does not exist; nothing to clear",
                dir
            );
            return Ok(0);
        }
        Err(e) => return Err(io_error(dir)(e)),
    };

    let mut removed = 0;
    while let Some(ent) = rd.next_entry().await.map_err(io_error(dir))? {
        let p = ent.path();
        let file_type = ent.file_type().await.map_err(io_error(&p))?;
        if file_type.is_dir() {
            tokio::fs::remove_dir_all(&p).await.map_err(io_error(&p))?;
        } else {
            tokio::fs::remove_file(&p).await.map_err(io_error(&p))?;
        }
        removed += 1;
    }

    debug!(
        "[PHASE: install] [STEP: clear_temp] clear_dir exit (removed={}, duration_ms={})",
        removed,
        started.elapsed().as_millis()
    );
    Ok(removed)
}
