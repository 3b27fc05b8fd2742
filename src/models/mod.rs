//! # Data Models
//!
//! Orders and users are owned by the wider marketplace; records are the read-only
//! directory dataset. The pipeline only ever writes an order's status and error.

pub mod order;
pub mod record;
pub mod user;

pub use order::{FilterSpec, LocationValue, NewOrder, Order};
pub use record::{Record, RecordColumn};
pub use user::User;
