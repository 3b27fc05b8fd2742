//! Recording and fault-injecting collaborators.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use futures::StreamExt;
use parking_lot::Mutex;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use fulfillment_core::delivery::{EmailMessage, Mailer, PaymentGateway};
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::filter::CompiledFilter;
use fulfillment_core::store::{RecordStore, RecordStream};

use super::builders::restaurant;

/// A message as it was handed to the mailer, attachments read at send time
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<(String, Vec<u8>)>,
}

impl SentMail {
    /// Decompressed contents of the first attachment
    pub fn csv(&self) -> String {
        let (_, bytes) = &self.attachments[0];
        let mut decoded = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        decoded
    }
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    attempts: Mutex<Vec<String>>,
    fail_subject: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message whose subject contains `needle`
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_subject: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    pub fn attempted_subjects(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn with_subject_prefix(&self, prefix: &str) -> Vec<SentMail> {
        self.sent
            .lock()
            .iter()
            .filter(|mail| mail.subject.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        self.attempts.lock().push(message.subject.clone());
        if let Some(needle) = &self.fail_subject {
            if message.subject.contains(needle.as_str()) {
                return Err(FulfillmentError::Mail(format!(
                    "relay rejected '{}'",
                    message.subject
                )));
            }
        }

        let attachments = message
            .attachments
            .iter()
            .map(|attachment| {
                let bytes = std::fs::read(&attachment.path)
                    .map_err(|e| FulfillmentError::Mail(format!("attachment missing: {e}")))?;
                Ok((attachment.filename.clone(), bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        self.sent.lock().push(SentMail {
            to: message.to,
            subject: message.subject,
            text: message.text,
            attachments,
        });
        Ok(())
    }
}

/// Never completes a part delivery; other messages are recorded
#[derive(Debug, Default)]
pub struct StalledMailer {
    pub inner: RecordingMailer,
    stalled: Mutex<Vec<PathBuf>>,
}

impl StalledMailer {
    /// Attachment paths that were on disk when a part delivery stalled
    pub fn stalled_attachments(&self) -> Vec<PathBuf> {
        self.stalled.lock().clone()
    }
}

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        if message.subject.starts_with("Your Purchased Data") {
            self.stalled.lock().extend(
                message
                    .attachments
                    .iter()
                    .map(|attachment| attachment.path.clone())
                    .filter(|path| path.exists()),
            );
            return std::future::pending().await;
        }
        self.inner.send(message).await
    }
}

#[derive(Debug)]
pub struct RecordingPayments {
    refunds: Mutex<Vec<String>>,
    succeeded: bool,
    refund_fails: bool,
}

impl Default for RecordingPayments {
    fn default() -> Self {
        Self {
            refunds: Mutex::new(Vec::new()),
            succeeded: true,
            refund_fails: false,
        }
    }
}

impl RecordingPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unpaid() -> Self {
        Self {
            succeeded: false,
            ..Self::default()
        }
    }

    pub fn refund_failing() -> Self {
        Self {
            refund_fails: true,
            ..Self::default()
        }
    }

    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingPayments {
    async fn refund(&self, payment_ref: &str) -> Result<()> {
        if self.refund_fails {
            return Err(FulfillmentError::Payment("refund endpoint unavailable".to_string()));
        }
        self.refunds.lock().push(payment_ref.to_string());
        Ok(())
    }

    async fn payment_succeeded(&self, _payment_ref: &str) -> Result<bool> {
        Ok(self.succeeded)
    }
}

/// Generates `count` matching records on demand instead of holding them
#[derive(Debug)]
pub struct SyntheticRecordStore {
    pub count: usize,
}

#[async_trait]
impl RecordStore for SyntheticRecordStore {
    async fn count_distinct(&self, filter: &CompiledFilter) -> Result<u64> {
        if filter.matches(&restaurant(0)) {
            Ok(self.count as u64)
        } else {
            Ok(0)
        }
    }

    async fn stream_distinct(&self, filter: &CompiledFilter, _buffer: usize) -> Result<RecordStream> {
        let filter = filter.clone();
        Ok(futures::stream::iter(0..self.count)
            .map(restaurant)
            .filter(move |record| futures::future::ready(filter.matches(record)))
            .map(Ok)
            .boxed())
    }
}

/// Panics when asked for a count
#[derive(Debug)]
pub struct PanickingRecordStore;

#[async_trait]
impl RecordStore for PanickingRecordStore {
    async fn count_distinct(&self, _filter: &CompiledFilter) -> Result<u64> {
        panic!("record index corrupted");
    }

    async fn stream_distinct(&self, _filter: &CompiledFilter, _buffer: usize) -> Result<RecordStream> {
        panic!("record index corrupted");
    }
}

/// Takes `delay` to answer a count
#[derive(Debug)]
pub struct SlowRecordStore {
    pub delay: Duration,
}

#[async_trait]
impl RecordStore for SlowRecordStore {
    async fn count_distinct(&self, _filter: &CompiledFilter) -> Result<u64> {
        tokio::time::sleep(self.delay).await;
        Ok(0)
    }

    async fn stream_distinct(&self, _filter: &CompiledFilter, _buffer: usize) -> Result<RecordStream> {
        Ok(futures::stream::empty().boxed())
    }
}
