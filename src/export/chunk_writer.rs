use futures::StreamExt;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::exporter::RowStream;
use super::workspace::ExportWorkspace;
use crate::error::Result;

/// A finalized chunk on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    /// 1-based part index
    pub part: usize,
    pub path: PathBuf,
    /// Size including the header
    pub bytes: u64,
    pub rows: u64,
}

/// Splits a row stream into self-contained chunk files of bounded size.
///
/// Each chunk starts with the header. A row rolls the chunk over when appending it would
/// exceed `max_chunk_bytes` and the chunk already holds a row; a single oversized row is
/// written alone rather than split.
pub struct ChunkWriter<'a> {
    workspace: &'a ExportWorkspace,
    header: Vec<u8>,
    max_chunk_bytes: u64,
}

struct OpenChunk {
    part: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    bytes: u64,
    rows: u64,
}

impl OpenChunk {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<ChunkFile> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        debug!(
            part = self.part,
            bytes = self.bytes,
            rows = self.rows,
            "Finalized export chunk"
        );
        Ok(ChunkFile {
            part: self.part,
            path: self.path,
            bytes: self.bytes,
            rows: self.rows,
        })
    }
}

impl<'a> ChunkWriter<'a> {
    pub fn new(workspace: &'a ExportWorkspace, header: Vec<u8>, max_chunk_bytes: u64) -> Self {
        Self {
            workspace,
            header,
            max_chunk_bytes,
        }
    }

    /// Drain the stream into chunks; an empty stream yields one header-only chunk
    pub async fn write_all(&self, mut rows: RowStream) -> Result<Vec<ChunkFile>> {
        let mut chunks = Vec::new();
        let mut current = self.open_chunk(1).await?;

        while let Some(row) = rows.next().await {
            let row = row?;
            let would_exceed = current.bytes + row.len() as u64 > self.max_chunk_bytes;
            if would_exceed && current.rows > 0 {
                let next_part = current.part + 1;
                chunks.push(current.finish().await?);
                current = self.open_chunk(next_part).await?;
            }
            current.write(&row).await?;
            current.rows += 1;
        }
        chunks.push(current.finish().await?);

        let rows: u64 = chunks.iter().map(|chunk| chunk.rows).sum();
        info!(
            order_id = %self.workspace.order_id(),
            chunks = chunks.len(),
            rows,
            "Export chunking complete"
        );
        Ok(chunks)
    }

    async fn open_chunk(&self, part: usize) -> Result<OpenChunk> {
        let path = self.workspace.chunk_path(part);
        let file = File::create(&path).await?;
        let mut chunk = OpenChunk {
            part,
            path,
            writer: BufWriter::new(file),
            bytes: 0,
            rows: 0,
        };
        chunk.write(&self.header).await?;
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FulfillmentError;
    use futures::stream;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn rows(lines: Vec<&str>) -> RowStream {
        let owned: Vec<Result<Vec<u8>>> = lines
            .into_iter()
            .map(|line| Ok(format!("{line}\n").into_bytes()))
            .collect();
        Box::pin(stream::iter(owned))
    }

    #[tokio::test]
    async fn test_rolls_over_with_header_in_every_chunk() {
        let root = TempDir::new().unwrap();
        let workspace = ExportWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();
        // header 4 bytes, rows 4 bytes, limit 12: header + 2 rows per chunk
        let writer = ChunkWriter::new(&workspace, b"h,h\n".to_vec(), 12);

        let chunks = writer
            .write_all(rows(vec!["a,1", "b,2", "c,3", "d,4", "e,5"]))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.rows).collect::<Vec<_>>(), vec![2, 2, 1]);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.part, index + 1);
            let content = std::fs::read_to_string(&chunk.path).unwrap();
            assert!(content.starts_with("h,h\n"));
            assert_eq!(content.len() as u64, chunk.bytes);
            assert!(chunk.bytes <= 12);
        }
    }

    #[tokio::test]
    async fn test_oversized_row_is_written_whole() {
        let root = TempDir::new().unwrap();
        let workspace = ExportWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();
        let writer = ChunkWriter::new(&workspace, b"h\n".to_vec(), 6);

        let chunks = writer
            .write_all(rows(vec!["a", "this-row-is-too-long", "b"]))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].rows, 1);
        assert!(chunks[1].bytes > 6);
        let content = std::fs::read_to_string(&chunks[1].path).unwrap();
        assert_eq!(content, "h\nthis-row-is-too-long\n");
    }

    #[tokio::test]
    async fn test_empty_stream_yields_header_only_chunk() {
        let root = TempDir::new().unwrap();
        let workspace = ExportWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();
        let writer = ChunkWriter::new(&workspace, b"h\n".to_vec(), 64);

        let chunks = writer.write_all(rows(vec![])).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rows, 0);
        assert_eq!(chunks[0].bytes, 2);
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let root = TempDir::new().unwrap();
        let workspace = ExportWorkspace::create(root.path(), Uuid::new_v4()).await.unwrap();
        let writer = ChunkWriter::new(&workspace, b"h\n".to_vec(), 64);
        let failing: RowStream = Box::pin(stream::iter(vec![
            Ok(b"a\n".to_vec()),
            Err(FulfillmentError::Database("connection reset".to_string())),
            Ok(b"b\n".to_vec()),
        ]));

        let err = writer.write_all(failing).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::Database(_)));
    }
}
