//! # Fulfillment Orchestrator
//!
//! Drives one order from `processing` to a terminal status:
//!
//! - add-on orders are acknowledged, handed to staff and moved to `pending_delivery`
//! - everything else runs Reconcile → Export → Chunk → Package → Deliver, bounded by the
//!   run deadline and the cancel signal
//!
//! Every error converges on the same three independent attempts: persist `failed`, refund,
//! send a failure notice. The run's scoped workspace is removed on every exit path.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::FulfillmentConfig;
use crate::constants::events as event_names;
use crate::delivery::{delivery_estimate_days, templates, DeliveryCoordinator, Mailer, PaymentGateway};
use crate::error::{ErrorCategory, FulfillmentError, Result};
use crate::events::EventPublisher;
use crate::export::{ChunkWriter, ExportSchema, ExportWorkspace, Packager, StreamingExporter};
use crate::filter::{CompiledFilter, FilterCompiler};
use crate::logging::log_order_operation;
use crate::models::Order;
use crate::orchestration::reconciler::CountReconciler;
use crate::state_machine::{OrderEvent, OrderStateMachine, OrderStatus};
use crate::store::{OrderStore, RecordStore};

/// Receiving side of a per-run cancellation flag
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

/// Sending side of a per-run cancellation flag
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (sender, receiver) = watch::channel(false);
        (
            CancelHandle { sender },
            CancelSignal {
                receiver: Some(receiver),
            },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise
    pub async fn cancelled(&mut self) {
        let Some(receiver) = self.receiver.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

/// Terminal result of one run, as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Completed {
        parts: usize,
        records: u64,
    },
    PendingDelivery {
        delivery_days: u64,
    },
    Failed {
        reason: String,
        category: ErrorCategory,
        status_persisted: bool,
        refunded: bool,
        notified: bool,
    },
    /// The order was not in `processing`; nothing was done
    Skipped {
        status: OrderStatus,
    },
}

impl FulfillmentOutcome {
    pub fn status(&self) -> OrderStatus {
        match self {
            Self::Completed { .. } => OrderStatus::Completed,
            Self::PendingDelivery { .. } => OrderStatus::PendingDelivery,
            Self::Failed { .. } => OrderStatus::Failed,
            Self::Skipped { status } => *status,
        }
    }
}

/// What a successful pipeline run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PipelineReport {
    parts: usize,
    records: u64,
}

pub struct FulfillmentOrchestrator {
    config: Arc<FulfillmentConfig>,
    records: Arc<dyn RecordStore>,
    orders: Arc<dyn OrderStore>,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
    events: EventPublisher,
}

impl FulfillmentOrchestrator {
    pub fn new(
        config: Arc<FulfillmentConfig>,
        records: Arc<dyn RecordStore>,
        orders: Arc<dyn OrderStore>,
        mailer: Arc<dyn Mailer>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            config,
            records,
            orders,
            mailer,
            payments,
            events: EventPublisher::default(),
        }
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    /// Run one order to a terminal status. Never returns an error: failures are folded
    /// into the order's status, a refund and a notice.
    #[instrument(skip_all, fields(order_id = %order.order_id))]
    pub async fn fulfill(&self, order: &Order, mut cancel: CancelSignal) -> FulfillmentOutcome {
        if order.status != OrderStatus::Processing {
            info!(status = %order.status, "Order already settled; skipping run");
            return FulfillmentOutcome::Skipped {
                status: order.status,
            };
        }

        log_order_operation("fulfillment_started", order.order_id, order.status.as_str(), None);
        self.events.publish(
            event_names::FULFILLMENT_STARTED,
            order.order_id,
            json!({ "promised": order.total_count, "add_ons": order.add_ons }),
        );

        if order.requires_manual_delivery() {
            return self.defer_delivery(order).await;
        }

        let deadline = self.config.worker.run_deadline();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FulfillmentError::Cancelled),
            run = tokio::time::timeout(deadline, self.run_pipeline(order)) => {
                run.unwrap_or_else(|_| {
                    Err(FulfillmentError::DeadlineExceeded {
                        seconds: deadline.as_secs(),
                    })
                })
            }
        };

        match result {
            Ok(report) => self.complete(order, report).await,
            Err(e) => self.converge_failure(order, &e).await,
        }
    }

    /// Fold a failure that escaped the run (a panic) into the normal failure path
    pub async fn fail_uncaught(&self, order: &Order, reason: String) -> FulfillmentOutcome {
        self.converge_failure(order, &FulfillmentError::Uncaught(reason))
            .await
    }

    async fn run_pipeline(&self, order: &Order) -> Result<PipelineReport> {
        let filter = FilterCompiler::compile(&order.filters);
        let reconciler = CountReconciler::new(
            Arc::clone(&self.records),
            self.config.reconciliation.count_tolerance,
        );
        reconciler.reconcile(&filter, order.promised_count()).await?;

        let mut workspace =
            ExportWorkspace::create(&self.config.export.temp_dir, order.order_id).await?;
        let delivered = self.export_and_deliver(order, &filter, &workspace).await;

        if let Err(e) = workspace.cleanup().await {
            warn!(error = %e, "Workspace cleanup failed; retrying on drop");
        }
        delivered
    }

    async fn export_and_deliver(
        &self,
        order: &Order,
        filter: &CompiledFilter,
        workspace: &ExportWorkspace,
    ) -> Result<PipelineReport> {
        let export = &self.config.export;
        let schema = ExportSchema::for_addons(&order.add_ons, &export.array_delimiter);
        let exporter = StreamingExporter::new(Arc::clone(&self.records), schema, export.stream_buffer);

        let rows = exporter.rows(filter).await?;
        let chunks = ChunkWriter::new(workspace, exporter.header_row()?, export.max_chunk_bytes)
            .write_all(rows)
            .await?;
        let records: u64 = chunks.iter().map(|chunk| chunk.rows).sum();

        let archives = Packager::new(workspace, export.max_archive_bytes)
            .package(chunks)
            .await?;

        let report = DeliveryCoordinator::new(Arc::clone(&self.mailer))
            .deliver(order, &archives, records)
            .await?;

        Ok(PipelineReport {
            parts: report.parts_sent,
            records,
        })
    }

    async fn complete(&self, order: &Order, report: PipelineReport) -> FulfillmentOutcome {
        let mut machine = self.state_machine(order);
        if let Err(e) = machine.transition(OrderEvent::Complete).await {
            error!(error = %e, "Delivered every part but failed to persist completion");
        }

        let details = format!("{} records in {} part(s)", report.records, report.parts);
        log_order_operation(
            "fulfillment_completed",
            order.order_id,
            OrderStatus::Completed.as_str(),
            Some(&details),
        );
        self.events
            .publish_details(event_names::FULFILLMENT_COMPLETED, order.order_id, &details);

        FulfillmentOutcome::Completed {
            parts: report.parts,
            records: report.records,
        }
    }

    async fn defer_delivery(&self, order: &Order) -> FulfillmentOutcome {
        let delivery = &self.config.delivery;
        let delivery_days =
            delivery_estimate_days(order.promised_count(), delivery.records_per_delivery_day);

        if let Err(e) = self
            .mailer
            .send(templates::acknowledgement(order, delivery_days))
            .await
        {
            warn!(error = %e, "Acknowledgement email failed; order stays accepted");
        }
        if let Err(e) = self
            .mailer
            .send(templates::staff_notice(order, &delivery.staff_email, delivery_days))
            .await
        {
            warn!(error = %e, "Staff notification failed");
        }

        let mut machine = self.state_machine(order);
        if let Err(e) = machine.transition(OrderEvent::DeferDelivery).await {
            error!(error = %e, "Failed to persist pending_delivery");
            return FulfillmentOutcome::Failed {
                reason: e.to_string(),
                category: e.category(),
                status_persisted: false,
                refunded: false,
                notified: false,
            };
        }

        let details = format!("delivery within {delivery_days} day(s)");
        log_order_operation(
            "fulfillment_deferred",
            order.order_id,
            OrderStatus::PendingDelivery.as_str(),
            Some(&details),
        );
        self.events
            .publish_details(event_names::FULFILLMENT_DEFERRED, order.order_id, &details);

        FulfillmentOutcome::PendingDelivery { delivery_days }
    }

    /// Persist `failed`, refund, notify. Each step is attempted even when an earlier one
    /// fails, except when the order turns out to be settled already.
    async fn converge_failure(&self, order: &Order, failure: &FulfillmentError) -> FulfillmentOutcome {
        let reason = failure.to_string();
        let category = failure.category();
        error!(category = ?category, error = %reason, "Fulfillment run failed");

        let mut machine = self.state_machine(order);
        let status_persisted = match machine.transition(OrderEvent::Fail(reason.clone())).await {
            Ok(_) => true,
            Err(e @ FulfillmentError::InvalidTransition { .. }) => {
                warn!(error = %e, "Order already settled; skipping refund and notice");
                return FulfillmentOutcome::Failed {
                    reason,
                    category,
                    status_persisted: false,
                    refunded: false,
                    notified: false,
                };
            }
            Err(e) => {
                error!(error = %e, "Failed to persist failed status");
                false
            }
        };

        let refunded = match self.payments.refund(&order.payment_ref).await {
            Ok(()) => true,
            Err(e) => {
                error!(payment_ref = %order.payment_ref, error = %e, "Refund failed");
                false
            }
        };

        let notice = templates::failure_notice(order, failure, refunded);
        let notified = match self.mailer.send(notice).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failure notice could not be sent");
                false
            }
        };

        debug!(status_persisted, refunded, notified, "Failure convergence finished");
        log_order_operation(
            "fulfillment_failed",
            order.order_id,
            OrderStatus::Failed.as_str(),
            Some(&reason),
        );
        self.events.publish(
            event_names::FULFILLMENT_FAILED,
            order.order_id,
            json!({
                "reason": reason,
                "category": format!("{category:?}"),
                "refunded": refunded,
                "notified": notified,
            }),
        );

        FulfillmentOutcome::Failed {
            reason,
            category,
            status_persisted,
            refunded,
            notified,
        }
    }

    fn state_machine(&self, order: &Order) -> OrderStateMachine {
        OrderStateMachine::new(order.order_id, OrderStatus::Processing, Arc::clone(&self.orders))
    }
}
