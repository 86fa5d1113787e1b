use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Subdirectory for voice clips inside the vault, mirrored in the reference
/// string so references stay meaningful in logs.
const VOICE_DIR: &str = "chat-voices";

/// On-disk attachment storage. Each clip is stored once under a random
/// uuid name; the returned reference (`chat-voices/{uuid}.{ext}`) is the
/// opaque key the message row carries. Attachments are 1:1 owned by their
/// message, so delete means delete — no reference counting.
pub struct Vault {
    dir: PathBuf,
}

impl Vault {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(VOICE_DIR)).await?;
        info!("Attachment vault at {}", dir.display());
        Ok(Self { dir })
    }

    /// Absolute path for a reference.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.dir.join(reference)
    }

    /// Public URL for a reference, served statically by the server binary.
    pub fn url(reference: &str) -> String {
        format!("/storage/{reference}")
    }

    /// Store a clip, returning its reference.
    pub async fn store(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let reference = format!("{VOICE_DIR}/{}.{extension}", Uuid::new_v4());
        let path = self.resolve(&reference);

        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(reference)
    }

    pub async fn exists(&self, reference: &str) -> bool {
        fs::metadata(self.resolve(reference)).await.is_ok()
    }

    /// Delete a stored clip. A missing file counts as success: the content
    /// is already gone, which is the state we wanted.
    pub async fn delete(&self, reference: &str) -> Result<()> {
        let path = self.resolve(reference);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Attachment {} already gone", reference);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_read_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();

        let reference = vault.store(b"voice bytes", "webm").await.unwrap();
        assert!(reference.starts_with("chat-voices/"));
        assert!(reference.ends_with(".webm"));
        assert!(vault.exists(&reference).await);

        let stored = tokio::fs::read(vault.resolve(&reference)).await.unwrap();
        assert_eq!(stored, b"voice bytes");

        vault.delete(&reference).await.unwrap();
        assert!(!vault.exists(&reference).await);
    }

    #[tokio::test]
    async fn delete_of_missing_reference_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).await.unwrap();

        vault.delete("chat-voices/never-stored.ogg").await.unwrap();
    }

    #[test]
    fn url_resolution() {
        assert_eq!(
            Vault::url("chat-voices/abc.mp3"),
            "/storage/chat-voices/abc.mp3"
        );
    }
}
