//! End-to-end analysis pipeline: CSV → intake → KPIs/charts → narrative → result.
//!
//! The [`Orchestrator`] keeps only shared, run-independent collaborators
//! (long-term memory, text generator, options). Every call to
//! [`Orchestrator::run`] opens its own [`SessionContext`], so one orchestrator
//! can serve concurrent runs without them seeing each other's artifacts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use insightflow_shared::{AppConfig, PipelineOptions, Result, ResultRecord};
use insightflow_storage::LongTermMemory;

use crate::chart::ChartWriter;
use crate::intake::{CsvSource, IntakeStage};
use crate::kpi::KpiStage;
use crate::narrative::NarrativeStage;
use crate::session::SessionContext;
use crate::textgen::{EnvTextGenerator, TextGenerator};

/// Long-term memory key holding the summary of the latest run.
pub const LAST_RUN_KEY: &str = "last_run";

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, record: &ResultRecord);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _name: &str) {}
    fn done(&self, _record: &ResultRecord) {}
}

/// Runs the three stages in order for each input.
#[derive(Clone)]
pub struct Orchestrator {
    memory: Arc<LongTermMemory>,
    generator: Option<Arc<dyn TextGenerator>>,
    options: PipelineOptions,
}

impl Orchestrator {
    /// Orchestrator using the narrative template (no text generator).
    pub fn new(memory: Arc<LongTermMemory>, options: PipelineOptions) -> Self {
        Self {
            memory,
            generator: None,
            options,
        }
    }

    /// Delegate narratives to `generator`.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build from application config: opens long-term memory and wires the
    /// env-credential generator when text generation is enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let memory = Arc::new(LongTermMemory::open(&config.memory.path)?);
        let orchestrator = Self::new(memory, PipelineOptions::from(config));

        Ok(if config.text_generation.enabled {
            orchestrator.with_generator(Arc::new(EnvTextGenerator::new(
                config.text_generation.clone(),
            )))
        } else {
            orchestrator
        })
    }

    pub fn memory(&self) -> &Arc<LongTermMemory> {
        &self.memory
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the full pipeline on `source`.
    pub fn run(&self, source: &CsvSource) -> Result<ResultRecord> {
        self.run_with_progress(source, &SilentProgress)
    }

    /// Run the full pipeline on `source`, reporting each stage.
    ///
    /// 1. Intake: parse and profile
    /// 2. KPIs and monthly revenue chart
    /// 3. Narrative
    ///
    /// Any stage error aborts the run; no partial record is returned.
    #[instrument(skip_all, fields(source = %source.label()))]
    pub fn run_with_progress(
        &self,
        source: &CsvSource,
        progress: &dyn ProgressReporter,
    ) -> Result<ResultRecord> {
        let start = Instant::now();
        info!("starting pipeline");

        let intake = IntakeStage::new();
        let kpi = KpiStage::new(
            self.options
                .charts_enabled
                .then(|| ChartWriter::new(&self.options.chart_dir)),
        );
        let narrative = self.narrative_stage();

        progress.stage("Loading and profiling data");
        let mut ctx = intake.profile(source)?;

        progress.stage("Computing KPIs");
        kpi.compute(&mut ctx);

        progress.stage("Writing narrative");
        narrative.compose(&mut ctx)?;

        if self.options.record_runs {
            self.record_run(&ctx);
        }

        let run_id = ctx.run_id();
        let record = ctx.into_record();
        progress.done(&record);

        info!(
            %run_id,
            rows = record.profile.row_count,
            kpis = record.kpis.len(),
            charts = record.charts.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "pipeline complete"
        );

        Ok(record)
    }

    fn narrative_stage(&self) -> NarrativeStage {
        match &self.generator {
            Some(generator) => NarrativeStage::with_generator(
                Arc::clone(generator),
                self.options.fallback,
                self.options.fallback_max_chars,
            ),
            None => NarrativeStage::template(),
        }
    }

    /// Store a short summary of the finished run in long-term memory.
    fn record_run(&self, ctx: &SessionContext) {
        let summary = serde_json::json!({
            "run_id": ctx.run_id(),
            "source": ctx.source(),
            "num_rows": ctx.profile.row_count,
            "kpis": &ctx.kpis,
            "completed_at": Utc::now().to_rfc3339(),
        });
        if let Err(e) = self.memory.set(LAST_RUN_KEY, summary) {
            warn!(error = %e, "failed to record run in long-term memory");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("memory", &self.memory.path())
            .field("generator", &self.generator.is_some())
            .field("options", &self.options)
            .finish()
    }
}
