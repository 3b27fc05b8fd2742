//! # Record Query Building
//!
//! The compiled filter is a [`Condition`] tree. In-process stores evaluate it with
//! [`Condition::matches`]; the Postgres store renders it through [`RecordQuery`] with
//! every user-supplied value bound as a parameter.

#[cfg(feature = "postgres")]
pub mod builder;
pub mod conditions;

#[cfg(feature = "postgres")]
pub use builder::RecordQuery;
pub use conditions::Condition;
