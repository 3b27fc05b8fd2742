//! # Delivery
//!
//! Mail and payment collaborators, message templates and the part-by-part delivery
//! coordinator.

pub mod coordinator;
pub mod mailer;
pub mod payment;
pub mod templates;

pub use coordinator::{delivery_estimate_days, DeliveryCoordinator, DeliveryReport};
pub use mailer::{Attachment, EmailMessage, HttpMailer, Mailer};
pub use payment::{PaymentGateway, StripeClient};
