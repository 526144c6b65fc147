use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::surface::FormSurface;

/// The points in a run where a screenshot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    InitialLoad,
    Filled,
    Submitted,
    Error,
}

impl Checkpoint {
    pub fn file_name(&self) -> &'static str {
        match self {
            Checkpoint::InitialLoad => "initial-page.png",
            Checkpoint::Filled => "form-filled.png",
            Checkpoint::Submitted => "form-submitted.png",
            Checkpoint::Error => "form-error.png",
        }
    }
}

/// Take the checkpoint screenshot into `dir`. Failure to capture is logged,
/// never propagated; returns the written path on success.
pub async fn capture(surface: &dyn FormSurface, dir: &Path, checkpoint: Checkpoint) -> Option<PathBuf> {
    let path = dir.join(checkpoint.file_name());
    match surface.screenshot(&path).await {
        Ok(()) => {
            info!(path = %path.display(), ?checkpoint, "screenshot saved");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), ?checkpoint, error = %e, "screenshot failed");
            None
        }
    }
}
