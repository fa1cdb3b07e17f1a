use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;
use snafu::prelude::*;

use crate::pipeline::*;

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

/// Resolves a path of the configuration file against the directory of that file.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Replaces the file at `path` with the content written by `write`.
///
/// The content goes to a temporary file in the same directory, which is then
/// renamed over `path`: readers see either the previous or the new version.
pub fn replace_atomically<F>(path: &Path, write: F) -> PipelineResult<()>
where
    F: FnOnce(&mut NamedTempFile) -> PipelineResult<()>,
{
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).context(IoSnafu {
        path: display_path(&dir),
    })?;
    let mut tmp = NamedTempFile::new_in(&dir).context(IoSnafu {
        path: display_path(&dir),
    })?;
    debug!("replace_atomically: {:?} via {:?}", path, tmp.path());
    write(&mut tmp)?;
    tmp.flush().context(IoSnafu {
        path: display_path(tmp.path()),
    })?;
    tmp.persist(path).context(PersistSnafu {
        path: display_path(path),
    })?;
    Ok(())
}
