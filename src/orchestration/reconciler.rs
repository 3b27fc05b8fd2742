use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{FulfillmentError, Result};
use crate::filter::CompiledFilter;
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub promised: u64,
    pub live: u64,
    pub difference: u64,
    pub tolerance: u64,
}

/// Compares the promised record count with a fresh de-duplicated count.
///
/// Fails closed: an empty filter or a difference above the tolerance stops the run
/// before anything is exported.
pub struct CountReconciler {
    store: Arc<dyn RecordStore>,
    tolerance: u64,
}

impl CountReconciler {
    pub fn new(store: Arc<dyn RecordStore>, tolerance: u64) -> Self {
        Self { store, tolerance }
    }

    pub async fn reconcile(
        &self,
        filter: &CompiledFilter,
        promised: u64,
    ) -> Result<ReconciliationReport> {
        if filter.is_empty() {
            return Err(FulfillmentError::EmptyFilter);
        }

        let live = self.store.count_distinct(filter).await?;
        let difference = promised.abs_diff(live);

        if difference > self.tolerance {
            warn!(
                promised,
                live,
                difference,
                tolerance = self.tolerance,
                "Live record count drifted beyond tolerance"
            );
            return Err(FulfillmentError::CountMismatch {
                expected: promised,
                actual: live,
                tolerance: self.tolerance,
            });
        }

        info!(promised, live, difference, "Record count reconciled");
        Ok(ReconciliationReport {
            promised,
            live,
            difference,
            tolerance: self.tolerance,
        })
    }
}
