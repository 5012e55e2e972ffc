//! Core pipeline orchestration for sitearchiver.
//!
//! This crate ties together sitemap discovery, pacing, and Save Page Now
//! submission into a single run (see [`pipeline::run`]).

pub mod pipeline;
pub mod report;

pub use pipeline::{
    Collected, ProgressReporter, RunConfig, RunResult, SilentProgress, SubmitTally, collect_urls,
    discover, run, run_with_clock, submit_all,
};
pub use report::report_outcome;
