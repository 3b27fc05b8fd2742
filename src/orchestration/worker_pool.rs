//! # Fulfillment Worker Pool
//!
//! Supervised replacement for fire-and-forget background runs. Order ids are queued on a
//! bounded channel and drained by a fixed set of workers; each run executes on its own
//! task so a panic surfaces as a `JoinError` and is folded into the failure path instead
//! of being lost.
//!
//! Shutdown stops intake, lets in-flight runs finish within the shutdown timeout and then
//! aborts whatever is left. Orders still queued or aborted stay in `processing` and are
//! picked up again by [`FulfillmentWorkerPool::recover_stalled`] on the next start.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::orchestrator::{CancelHandle, CancelSignal, FulfillmentOrchestrator};
use crate::config::WorkerConfig;
use crate::error::{FulfillmentError, Result};
use crate::state_machine::OrderStatus;
use crate::store::OrderStore;

/// Control handles for one in-flight run
struct RunHandle {
    cancel: CancelHandle,
    abort: AbortHandle,
}

struct WorkerContext {
    orchestrator: Arc<FulfillmentOrchestrator>,
    orders: Arc<dyn OrderStore>,
    in_flight: Arc<DashMap<Uuid, RunHandle>>,
}

pub struct FulfillmentWorkerPool {
    sender: parking_lot::Mutex<Option<mpsc::Sender<Uuid>>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<DashMap<Uuid, RunHandle>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
}

impl FulfillmentWorkerPool {
    /// Spawn the workers; must be called inside a Tokio runtime
    pub fn start(
        orchestrator: Arc<FulfillmentOrchestrator>,
        orders: Arc<dyn OrderStore>,
        config: &WorkerConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Uuid>(config.queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let (shutdown_tx, _) = broadcast::channel(1);
        let in_flight = Arc::new(DashMap::new());

        let context = Arc::new(WorkerContext {
            orchestrator,
            orders,
            in_flight: Arc::clone(&in_flight),
        });

        let worker_count = config.workers.max(1);
        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&context),
                    Arc::clone(&receiver),
                    shutdown_tx.subscribe(),
                ))
            })
            .collect();

        info!(
            workers = worker_count,
            queue_capacity = config.queue_capacity,
            "Fulfillment worker pool started"
        );

        Self {
            sender: parking_lot::Mutex::new(Some(sender)),
            workers: parking_lot::Mutex::new(workers),
            in_flight,
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Queue an order for fulfillment; waits while the queue is full
    pub async fn submit(&self, order_id: Uuid) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(FulfillmentError::QueueClosed)?;
        sender
            .send(order_id)
            .await
            .map_err(|_| FulfillmentError::QueueClosed)?;
        debug!(order_id = %order_id, "Order queued for fulfillment");
        Ok(())
    }

    /// Signal a running order to stop; false when it is not currently running
    pub fn cancel(&self, order_id: Uuid) -> bool {
        match self.in_flight.get(&order_id) {
            Some(run) => {
                run.cancel.cancel();
                info!(order_id = %order_id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Re-queue every order left in `processing`
    pub async fn recover_stalled(&self, orders: &dyn OrderStore) -> Result<usize> {
        let stalled = orders.orders_with_status(OrderStatus::Processing).await?;
        let count = stalled.len();
        for order in stalled {
            self.submit(order.order_id).await?;
        }
        if count > 0 {
            info!(count, "Re-queued stalled orders");
        }
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        self.sender.lock().take();
        // Workers that already exited have dropped their receivers
        let _ = self.shutdown_tx.send(());

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let aborts: Vec<AbortHandle> = workers.iter().map(|worker| worker.abort_handle()).collect();

        match tokio::time::timeout(self.shutdown_timeout, futures::future::join_all(workers)).await
        {
            Ok(_) => info!("Fulfillment worker pool stopped"),
            Err(_) => {
                warn!(
                    in_flight = self.in_flight.len(),
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "Shutdown timed out; aborting remaining runs"
                );
                for abort in aborts {
                    abort.abort();
                }
                for run in self.in_flight.iter() {
                    run.abort.abort();
                }
                self.in_flight.clear();
            }
        }
        Ok(())
    }
}

async fn worker_loop(
    worker_id: usize,
    context: Arc<WorkerContext>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Uuid>>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!(worker_id, "Fulfillment worker started");

    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                order_id = receiver.recv() => order_id,
            }
        };

        let Some(order_id) = next else {
            break;
        };
        context.run_order(worker_id, order_id).await;
    }

    debug!(worker_id, "Fulfillment worker stopped");
}

impl WorkerContext {
    async fn run_order(&self, worker_id: usize, order_id: Uuid) {
        let order = match self.orders.find_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(worker_id, order_id = %order_id, "Queued order no longer exists");
                return;
            }
            Err(e) => {
                error!(worker_id, order_id = %order_id, error = %e, "Failed to load queued order");
                return;
            }
        };

        let run = match self.in_flight.entry(order_id) {
            Entry::Occupied(_) => {
                warn!(worker_id, order_id = %order_id, "Order already running; ignoring duplicate");
                return;
            }
            Entry::Vacant(slot) => {
                let (cancel, signal) = CancelSignal::pair();
                let orchestrator = Arc::clone(&self.orchestrator);
                let run_order = order.clone();
                let run = tokio::spawn(async move { orchestrator.fulfill(&run_order, signal).await });
                slot.insert(RunHandle {
                    cancel,
                    abort: run.abort_handle(),
                });
                run
            }
        };

        let joined = run.await;
        self.in_flight.remove(&order_id);

        match joined {
            Ok(outcome) => info!(
                worker_id,
                order_id = %order_id,
                status = %outcome.status(),
                "Fulfillment run finished"
            ),
            Err(join_error) if join_error.is_panic() => {
                let reason = panic_message(join_error.into_panic());
                error!(worker_id, order_id = %order_id, reason = %reason, "Fulfillment run panicked");
                self.orchestrator.fail_uncaught(&order, reason).await;
            }
            Err(_) => warn!(worker_id, order_id = %order_id, "Fulfillment run aborted"),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
