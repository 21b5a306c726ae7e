//! Session gate
//!
//! Keeps reconciliation to at most one recorded run per assistant session
//! and project directory. Any `mark_processed` call closes the gate for
//! that session, whether the recorded outcome succeeded or failed.

mod cache;
mod record;

pub use cache::{SessionCache, strip_nulls};
pub use record::{ProcessingOutcome, ProjectEntityCache, SessionRecord, SessionUpdate};
