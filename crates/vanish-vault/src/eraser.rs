use rand::RngCore;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Wipe chunk size: keeps memory use independent of file size.
const WIPE_CHUNK: usize = 8192;

/// Overwrite a file's bytes with fresh random data, `passes` times, before
/// the vault deletes it. Strictly best-effort: a missing, unwritable, or
/// half-wiped file must never block the deletion that follows, so every
/// error is swallowed here. A reader that races between wipe and delete sees
/// only random bytes.
pub async fn wipe(path: &Path, passes: u32) {
    match overwrite(path, passes).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Nothing to wipe at {}", path.display());
        }
        Err(e) => {
            warn!("Best-effort wipe of {} failed: {}", path.display(), e);
        }
    }
}

async fn overwrite(path: &Path, passes: u32) -> std::io::Result<()> {
    let len = tokio::fs::metadata(path).await?.len();
    if len == 0 {
        return Ok(());
    }

    let mut file = OpenOptions::new().write(true).open(path).await?;
    let mut chunk = [0u8; WIPE_CHUNK];

    for _ in 0..passes {
        file.seek(SeekFrom::Start(0)).await?;
        let mut remaining = len;

        while remaining > 0 {
            let n = remaining.min(WIPE_CHUNK as u64) as usize;
            // ThreadRng is !Send; take a fresh handle per chunk so it is
            // dropped before the await and the wipe future stays Send.
            rand::rng().fill_bytes(&mut chunk[..n]);
            file.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
        }
    }

    file.flush().await?;
    // Push the final pass through to durable storage.
    file.sync_all().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wipe_replaces_content_and_keeps_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.webm");
        let plaintext = vec![0x41u8; 20_000]; // spans multiple chunks
        tokio::fs::write(&path, &plaintext).await.unwrap();

        wipe(&path, 1).await;

        let after = tokio::fs::read(&path).await.unwrap();
        assert_eq!(after.len(), plaintext.len());
        assert_ne!(after, plaintext);
        // The original constant-byte plaintext must be gone.
        assert!(after.iter().any(|&b| b != 0x41));
    }

    #[tokio::test]
    async fn wipe_of_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        wipe(&dir.path().join("never-existed.ogg"), 3).await;
    }

    #[tokio::test]
    async fn wipe_of_empty_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        tokio::fs::write(&path, b"").await.unwrap();

        wipe(&path, 2).await;

        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn multiple_passes_still_scrub() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        tokio::fs::write(&path, vec![0x5Au8; 9000]).await.unwrap();

        wipe(&path, 3).await;

        let after = tokio::fs::read(&path).await.unwrap();
        assert_eq!(after.len(), 9000);
        assert!(after.iter().any(|&b| b != 0x5A));
    }
}
