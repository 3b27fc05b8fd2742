use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::mailer::Mailer;
use super::templates;
use crate::error::{FulfillmentError, Result};
use crate::export::DeliveryArchive;
use crate::models::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub parts_sent: usize,
    pub total_parts: usize,
}

/// Sends archives in ascending part order, one message per archive.
///
/// The first failed send aborts the remaining parts. Each archive is deleted once its
/// send has been attempted.
pub struct DeliveryCoordinator {
    mailer: Arc<dyn Mailer>,
}

impl DeliveryCoordinator {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    #[instrument(skip_all, fields(order_id = %order.order_id, total_parts = archives.len()))]
    pub async fn deliver(
        &self,
        order: &Order,
        archives: &[DeliveryArchive],
        record_count: u64,
    ) -> Result<DeliveryReport> {
        let total_parts = archives.len();

        for archive in archives {
            let message = templates::delivery_part(order, archive, record_count);
            let sent = self.mailer.send(message).await;
            remove_archive(archive).await;

            if let Err(e) = sent {
                error!(
                    part = archive.part,
                    total_parts,
                    error = %e,
                    "Part delivery failed; aborting remaining sends"
                );
                return Err(FulfillmentError::Delivery {
                    part: archive.part,
                    total_parts,
                    message: e.to_string(),
                });
            }
            info!(part = archive.part, total_parts, bytes = archive.bytes, "Part delivered");
        }

        Ok(DeliveryReport {
            parts_sent: total_parts,
            total_parts,
        })
    }
}

async fn remove_archive(archive: &DeliveryArchive) {
    match tokio::fs::remove_file(&archive.path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %archive.path.display(), error = %e, "Failed to remove archive"),
    }
}

/// Days promised for a manually prepared delivery, rounded up
pub fn delivery_estimate_days(records: u64, records_per_day: u64) -> u64 {
    records.div_ceil(records_per_day.max(1))
}
