//! # Export Pipeline Stages
//!
//! Streaming exporter, chunk writer and packager, all writing inside one
//! [`ExportWorkspace`] per run.

pub mod chunk_writer;
pub mod exporter;
pub mod packager;
pub mod schema;
pub mod workspace;

pub use chunk_writer::{ChunkFile, ChunkWriter};
pub use exporter::{RowStream, StreamingExporter};
pub use packager::{DeliveryArchive, Packager};
pub use schema::{ExportSchema, FieldSource, FieldSpec};
pub use workspace::ExportWorkspace;
