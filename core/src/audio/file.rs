use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{Result, VoxError};

/// Write `wav` to `path` via a temporary file in the same directory plus rename.
///
/// Either the whole payload lands at `path` (created or replaced) or an error is
/// returned and `path` is left as it was.
pub async fn write_wav_atomic(path: &Path, wav: Vec<u8>) -> Result<PathBuf> {
    let target = path.to_path_buf();
    let for_task = target.clone();

    tokio::task::spawn_blocking(move || persist(&for_task, &wav))
        .await
        .map_err(|e| VoxError::FileWrite {
            path: target.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })??;

    info!(target: "file_sink", path = %target.display(), "Saved audio file");
    Ok(target)
}

fn persist(path: &Path, wav: &[u8]) -> Result<()> {
    let wrap = |source: std::io::Error| VoxError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".vvmcp-")
        .suffix(".wav.tmp")
        .tempfile_in(dir)
        .map_err(wrap)?;
    debug!(target: "file_sink", tmp = %tmp.path().display(), bytes = wav.len(), "Writing temporary file");

    tmp.write_all(wav).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    // On failure the NamedTempFile inside the error is dropped and removed
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_exact_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let saved = write_wav_atomic(&path, b"RIFFdata".to_vec()).await.unwrap();
        assert_eq!(saved, path);
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFFdata");
    }

    #[tokio::test]
    async fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        std::fs::write(&path, b"a much longer previous payload").unwrap();

        write_wav_atomic(&path, b"new".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn leaves_no_temporary_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav_atomic(&path, vec![0u8; 4096]).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_a_file_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("out.wav");
        let err = write_wav_atomic(&path, b"RIFF".to_vec()).await.unwrap_err();
        assert_eq!(err.code(), "FILE_WRITE_ERROR");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn directory_target_is_a_file_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken.wav");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let err = write_wav_atomic(&target, b"RIFF".to_vec()).await.unwrap_err();
        assert_eq!(err.code(), "FILE_WRITE_ERROR");
        assert!(target.is_dir());
    }
}
