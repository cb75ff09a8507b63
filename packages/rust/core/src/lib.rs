//! Analysis pipeline for InsightFlow.
//!
//! This crate parses a CSV into a typed [`table::Table`], then runs three
//! stages over a per-run [`session::SessionContext`]: intake/profiling,
//! KPI and chart computation, and narrative synthesis. The
//! [`orchestrator::Orchestrator`] sequences them and returns a
//! [`insightflow_shared::ResultRecord`].

pub mod chart;
pub mod demo;
pub mod intake;
pub mod kpi;
pub mod narrative;
pub mod orchestrator;
pub mod session;
pub mod table;
pub mod textgen;

pub use intake::{CsvSource, IntakeStage};
pub use kpi::KpiStage;
pub use narrative::NarrativeStage;
pub use orchestrator::{Orchestrator, ProgressReporter, SilentProgress};
pub use session::SessionContext;
pub use textgen::{EnvTextGenerator, TextGenError, TextGenerator};
