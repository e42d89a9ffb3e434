pub mod envelope;
pub mod health;
pub mod metrics;

pub use envelope::{Envelope, Headers};
