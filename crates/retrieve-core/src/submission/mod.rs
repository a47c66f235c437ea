//! Submitting rankings to the challenge scoring endpoint.

mod client;
mod results;
pub mod retry;

pub use client::{SubmissionClient, SubmissionReceipt};
pub use results::{ResultsBuilder, Submission};
