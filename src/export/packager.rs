use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::chunk_writer::ChunkFile;
use super::workspace::ExportWorkspace;
use crate::constants::artifacts::ARCHIVE_EXTENSION;
use crate::error::{FulfillmentError, Result};

/// One compressed chunk, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryArchive {
    pub part: usize,
    pub total_parts: usize,
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: u64,
}

/// Gzip-compresses each chunk and enforces the transport size limit on the result
pub struct Packager<'a> {
    workspace: &'a ExportWorkspace,
    max_archive_bytes: u64,
}

impl<'a> Packager<'a> {
    pub fn new(workspace: &'a ExportWorkspace, max_archive_bytes: u64) -> Self {
        Self {
            workspace,
            max_archive_bytes,
        }
    }

    /// Archives come back index-aligned with `chunks`. Each chunk file is removed once
    /// its archive exists; any oversized archive fails the whole step.
    pub async fn package(&self, chunks: Vec<ChunkFile>) -> Result<Vec<DeliveryArchive>> {
        let total_parts = chunks.len();
        let mut archives = Vec::with_capacity(total_parts);

        for chunk in chunks {
            let destination = self.workspace.archive_path(chunk.part);
            let source = chunk.path.clone();
            let target = destination.clone();

            let bytes = tokio::task::spawn_blocking(move || compress(&source, &target))
                .await
                .map_err(|e| FulfillmentError::Export(format!("Compression task failed: {e}")))??;

            tokio::fs::remove_file(&chunk.path).await?;

            if bytes > self.max_archive_bytes {
                error!(
                    order_id = %self.workspace.order_id(),
                    part = chunk.part,
                    total_parts,
                    bytes,
                    limit = self.max_archive_bytes,
                    "Archive exceeds transport limit"
                );
                return Err(FulfillmentError::ArchiveTooLarge {
                    path: destination,
                    size_bytes: bytes,
                    limit_bytes: self.max_archive_bytes,
                });
            }

            debug!(
                part = chunk.part,
                total_parts,
                raw_bytes = chunk.bytes,
                bytes,
                "Packaged chunk"
            );
            archives.push(DeliveryArchive {
                part: chunk.part,
                total_parts,
                path: destination,
                file_name: self.workspace.file_name(chunk.part, ARCHIVE_EXTENSION),
                bytes,
            });
        }

        Ok(archives)
    }
}

fn compress(source: &Path, destination: &Path) -> Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(destination)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    drop(output);
    Ok(std::fs::metadata(destination)?.len())
}
