use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use super::schema::ExportSchema;
use crate::error::Result;
use crate::filter::CompiledFilter;
use crate::store::RecordStore;

/// Encoded data rows, terminator included; lazy, single-pass, consumed once
pub type RowStream = BoxStream<'static, Result<Vec<u8>>>;

/// Projects the distinct records matching a filter through the export schema
pub struct StreamingExporter {
    store: Arc<dyn RecordStore>,
    schema: Arc<ExportSchema>,
    buffer: usize,
}

impl StreamingExporter {
    pub fn new(store: Arc<dyn RecordStore>, schema: ExportSchema, buffer: usize) -> Self {
        Self {
            store,
            schema: Arc::new(schema),
            buffer,
        }
    }

    pub fn schema(&self) -> &ExportSchema {
        &self.schema
    }

    pub fn header_row(&self) -> Result<Vec<u8>> {
        self.schema.header_row()
    }

    /// Open the record cursor and map each record to its encoded row.
    ///
    /// A read failure surfaces as an `Err` item; nothing is retried here.
    pub async fn rows(&self, filter: &CompiledFilter) -> Result<RowStream> {
        debug!(filter = %filter, buffer = self.buffer, "Opening export cursor");
        let records = self.store.stream_distinct(filter, self.buffer).await?;
        let schema = Arc::clone(&self.schema);
        Ok(Box::pin(records.map(move |record| {
            record.and_then(|record| schema.encode_record(&record))
        })))
    }
}
