#![forbid(unsafe_code)]

//! The per-channel download directory.

use crate::resolver::sanitize_file_name;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// `<root>/<channel name>`, with the name made safe for a single path
/// component.
pub fn channel_directory(root: &Path, channel_name: &str) -> PathBuf {
    root.join(sanitize_file_name(channel_name))
}

/// Makes sure `dir` exists. With `wipe`, any previous contents are removed
/// first, so the directory is empty when this returns. Only call with `wipe`
/// after the user agreed to it.
pub fn prepare(dir: &Path, wipe: bool) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        bail!("{} exists and is not a directory", dir.display());
    }
    if wipe && dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "removed previous channel directory");
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(())
}

/// Names currently present in `dir`. Missing directories read as empty.
pub fn snapshot(dir: &Path) -> HashSet<OsString> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|entry| entry.file_name()).collect(),
        Err(_) => HashSet::new(),
    }
}

/// Deletes whatever appeared in `dir` since `before` was taken. Used to drop
/// leftovers of a failed download; errors are logged, not returned.
pub fn remove_new_entries(dir: &Path, before: &HashSet<OsString>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if before.contains(&entry.file_name()) {
            continue;
        }
        let path = entry.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match removed {
            Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not remove partial download")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn channel_directory_uses_sanitized_name() {
        let root = Path::new("/downloads");
        assert_eq!(
            channel_directory(root, "AC/DC Live"),
            PathBuf::from("/downloads/AC_DC Live")
        );
    }

    #[test]
    fn prepare_creates_missing_directory() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("Channel");
        prepare(&dir, false)?;
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn prepare_with_wipe_empties_directory() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("Channel");
        fs::create_dir_all(dir.join("nested"))?;
        fs::write(dir.join("old.mp4"), "old")?;

        prepare(&dir, true)?;
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn prepare_without_wipe_keeps_contents() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("Channel");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("old.mp4"), "old")?;

        prepare(&dir, false)?;
        assert!(dir.join("old.mp4").is_file());
        Ok(())
    }

    #[test]
    fn prepare_refuses_to_touch_a_regular_file() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("Channel");
        fs::write(&path, "notes")?;

        let err = prepare(&path, true).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
        assert_eq!(fs::read_to_string(&path)?, "notes");
        Ok(())
    }

    #[test]
    fn remove_new_entries_spares_existing_files() -> Result<()> {
        let temp = tempdir()?;
        let dir = temp.path();
        fs::write(dir.join("keep.mp4"), "keep")?;
        let before = snapshot(dir);

        fs::write(dir.join("partial.mp4.part"), "half")?;
        fs::create_dir_all(dir.join("fragments"))?;
        remove_new_entries(dir, &before);

        let left: Vec<_> = fs::read_dir(dir)?
            .flatten()
            .map(|entry| entry.file_name())
            .collect();
        assert_eq!(left, vec![OsString::from("keep.mp4")]);
        Ok(())
    }

    #[test]
    fn snapshot_of_missing_directory_is_empty() {
        assert!(snapshot(Path::new("/definitely/not/here")).is_empty());
    }
}
