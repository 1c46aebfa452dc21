//! Background translation and sentiment tagging of pending comments.
//!
//! `POST /api/comments/analyze` goes through [`EnrichmentHandle::submit`],
//! which records a queued run and hands its id to a single worker task. The
//! worker drives [`EnrichmentPipeline::execute`] one run at a time.

pub mod pipeline;
pub mod runs;
pub mod worker;

pub use pipeline::{Batch, EnrichmentPipeline, PipelineError};
pub use runs::{RunRegistry, RunState, RunStatus};
pub use worker::{EnrichmentHandle, Submission, spawn_enrichment_worker};
