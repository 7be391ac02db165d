//! Protocol definitions and errors shared by the envelope service and its clients.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
