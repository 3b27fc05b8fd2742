use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::artifacts::{ARCHIVE_EXTENSION, CHUNK_EXTENSION, FILE_STEM};
use crate::error::Result;

/// Per-run scoped directory holding every chunk and archive of one order.
///
/// Files are named `companies_{order_id}_part{N}` inside `order-{order_id}/`, so two
/// concurrent runs never share a path. The directory is wiped on creation (a previous
/// process may have died mid-run) and removed by [`cleanup`](Self::cleanup); dropping an
/// uncleaned workspace removes it synchronously.
#[derive(Debug)]
pub struct ExportWorkspace {
    order_id: Uuid,
    dir: PathBuf,
    cleaned: bool,
}

impl ExportWorkspace {
    pub async fn create(root: &Path, order_id: Uuid) -> Result<Self> {
        let dir = root.join(format!("order-{order_id}"));
        remove_dir_if_present(&dir).await?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(order_id = %order_id, dir = %dir.display(), "Created export workspace");
        Ok(Self {
            order_id,
            dir,
            cleaned: false,
        })
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chunk_path(&self, part: usize) -> PathBuf {
        self.dir.join(self.file_name(part, CHUNK_EXTENSION))
    }

    pub fn archive_path(&self, part: usize) -> PathBuf {
        self.dir.join(self.file_name(part, ARCHIVE_EXTENSION))
    }

    pub fn file_name(&self, part: usize, extension: &str) -> String {
        format!("{FILE_STEM}_{}_part{part}.{extension}", self.order_id)
    }

    /// Remove the directory and everything in it
    pub async fn cleanup(&mut self) -> Result<()> {
        remove_dir_if_present(&self.dir).await?;
        self.cleaned = true;
        debug!(order_id = %self.order_id, "Removed export workspace");
        Ok(())
    }
}

impl Drop for ExportWorkspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                order_id = %self.order_id,
                dir = %self.dir.display(),
                error = %e,
                "Failed to remove export workspace on drop"
            ),
        }
    }
}

async fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_paths_encode_order_and_part() {
        let root = TempDir::new().unwrap();
        let order_id = Uuid::new_v4();
        let workspace = ExportWorkspace::create(root.path(), order_id).await.unwrap();

        let chunk = workspace.chunk_path(3);
        assert_eq!(
            chunk.file_name().unwrap().to_str().unwrap(),
            format!("companies_{order_id}_part3.csv")
        );
        assert!(workspace
            .archive_path(3)
            .to_str()
            .unwrap()
            .ends_with("_part3.csv.gz"));
        assert!(chunk.starts_with(root.path()));
    }

    #[tokio::test]
    async fn test_create_wipes_stale_files() {
        let root = TempDir::new().unwrap();
        let order_id = Uuid::new_v4();
        let stale = root.path().join(format!("order-{order_id}"));
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover.csv"), b"x").unwrap();

        let workspace = ExportWorkspace::create(root.path(), order_id).await.unwrap();
        assert_eq!(std::fs::read_dir(workspace.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_and_drop_remove_directory() {
        let root = TempDir::new().unwrap();

        let mut cleaned = ExportWorkspace::create(root.path(), Uuid::new_v4())
            .await
            .unwrap();
        std::fs::write(cleaned.chunk_path(1), b"header\n").unwrap();
        cleaned.cleanup().await.unwrap();
        assert!(!cleaned.dir().exists());

        let dropped = ExportWorkspace::create(root.path(), Uuid::new_v4())
            .await
            .unwrap();
        let dir = dropped.dir().to_path_buf();
        std::fs::write(dropped.archive_path(1), b"gz").unwrap();
        drop(dropped);
        assert!(!dir.exists());
    }
}
