//! Narrative stage: turns the profile and KPIs into an executive summary.
//!
//! Without a generator the summary is a fixed template. With one, a prompt
//! is built from the same inputs and the generator writes the text; when the
//! generator has no credential the configured deterministic fallback is used.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use insightflow_shared::{FallbackMode, InsightFlowError, KpiSet, Profile, Result};

use crate::session::SessionContext;
use crate::textgen::{TextGenError, TextGenerator, fallback_summary};

/// First line of every templated summary.
pub const SUMMARY_HEADER: &str = "Executive Summary:";

/// Last line of every templated summary.
pub const SUMMARY_CLOSING: &str =
    "This dataset shows consistent patterns suitable for further forecasting or segmentation.";

/// Produces the run's narrative.
#[derive(Clone)]
pub struct NarrativeStage {
    generator: Option<Arc<dyn TextGenerator>>,
    fallback: FallbackMode,
    fallback_max_chars: usize,
}

impl NarrativeStage {
    /// Template-only stage.
    pub fn template() -> Self {
        Self {
            generator: None,
            fallback: FallbackMode::default(),
            fallback_max_chars: 800,
        }
    }

    /// Stage delegating to `generator`, using `fallback` when it has no credential.
    pub fn with_generator(
        generator: Arc<dyn TextGenerator>,
        fallback: FallbackMode,
        fallback_max_chars: usize,
    ) -> Self {
        Self {
            generator: Some(generator),
            fallback,
            fallback_max_chars,
        }
    }

    /// Write the narrative for the context's profile and KPIs.
    ///
    /// Only a fatal generator error fails this stage.
    #[instrument(skip_all, fields(run_id = %ctx.run_id()))]
    pub fn compose(&self, ctx: &mut SessionContext) -> Result<String> {
        let narrative = match &self.generator {
            None => render_template(&ctx.profile, &ctx.kpis),
            Some(generator) => {
                let prompt = build_prompt(&ctx.profile, &ctx.kpis);
                match generator.generate(&prompt) {
                    Ok(text) => text,
                    Err(TextGenError::Unavailable(reason)) => {
                        warn!(%reason, fallback = ?self.fallback, "text generator unavailable");
                        match self.fallback {
                            FallbackMode::PromptEcho => {
                                fallback_summary(&prompt, self.fallback_max_chars)
                            }
                            FallbackMode::Template => render_template(&ctx.profile, &ctx.kpis),
                        }
                    }
                    Err(TextGenError::Fatal(msg)) => {
                        return Err(InsightFlowError::TextGenerationFatal(msg));
                    }
                }
            }
        };

        ctx.narrative = Some(narrative.clone());
        info!(chars = narrative.len(), "narrative generated");
        Ok(narrative)
    }
}

impl Default for NarrativeStage {
    fn default() -> Self {
        Self::template()
    }
}

impl std::fmt::Debug for NarrativeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeStage")
            .field("generator", &self.generator.is_some())
            .field("fallback", &self.fallback)
            .field("fallback_max_chars", &self.fallback_max_chars)
            .finish()
    }
}

/// Fixed-structure summary: header, rows, columns, one line per present KPI
/// in menu order, closing sentence.
pub fn render_template(profile: &Profile, kpis: &KpiSet) -> String {
    let mut lines = vec![
        SUMMARY_HEADER.to_string(),
        format!("- Rows: {}", profile.row_count),
        format!("- Columns: {}", profile.column_count),
    ];
    lines.extend(
        kpis.iter()
            .map(|(kpi, value)| format!("- {}: {value}", kpi.label())),
    );
    lines.push(SUMMARY_CLOSING.to_string());
    lines.join("\n")
}

/// Prompt asking a generator for an executive summary of the dataset.
pub fn build_prompt(profile: &Profile, kpis: &KpiSet) -> String {
    let mut prompt = String::from(
        "You are a business analyst. Write a concise executive summary of the dataset \
         described below, followed by two or three suggested actions.\n",
    );
    prompt.push_str(&format!(
        "Dataset: {} rows, {} columns.\n",
        profile.row_count, profile.column_count
    ));

    if !profile.column_names.is_empty() {
        let columns: Vec<String> = profile
            .column_names
            .iter()
            .map(|name| match profile.column_types.get(name) {
                Some(ty) => format!("{name} ({ty})"),
                None => name.clone(),
            })
            .collect();
        prompt.push_str(&format!("Columns: {}.\n", columns.join(", ")));
    }

    if kpis.is_empty() {
        prompt.push_str("No KPIs could be computed for this dataset.\n");
    } else {
        prompt.push_str("KPIs:\n");
        for (kpi, value) in kpis.iter() {
            prompt.push_str(&format!("- {}: {value}\n", kpi.label()));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{CsvSource, IntakeStage};
    use crate::kpi::KpiStage;
    use crate::textgen::FALLBACK_PREFIX;
    use insightflow_shared::{Kpi, KpiValue};

    struct FixedGenerator(std::result::Result<String, TextGenError>);

    impl TextGenerator for FixedGenerator {
        fn generate(&self, _prompt: &str) -> std::result::Result<String, TextGenError> {
            self.0.clone()
        }
    }

    fn context(csv: &str) -> SessionContext {
        let source = CsvSource::Bytes {
            name: "test.csv".into(),
            data: csv.as_bytes().to_vec(),
        };
        let mut ctx = IntakeStage::new().profile(&source).expect("intake");
        KpiStage::new(None).compute(&mut ctx);
        ctx
    }

    #[test]
    fn template_lists_present_kpis_in_menu_order() {
        let profile = Profile {
            row_count: 90,
            column_count: 4,
            ..Profile::default()
        };
        let mut kpis = KpiSet::new();
        kpis.insert(Kpi::UniqueCustomers, KpiValue::Count(19));
        kpis.insert(Kpi::TotalRevenue, KpiValue::Float(75000.0));

        let text = render_template(&profile, &kpis);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Executive Summary:",
                "- Rows: 90",
                "- Columns: 4",
                "- Total Revenue: 75000.0",
                "- Unique Customers: 19",
                SUMMARY_CLOSING,
            ]
        );
    }

    #[test]
    fn template_with_no_kpis() {
        let text = render_template(&Profile::default(), &KpiSet::new());
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with(SUMMARY_HEADER));
        assert!(text.contains("- Rows: 0"));
    }

    #[test]
    fn prompt_carries_shape_and_kpis() {
        let ctx = context("order_id,revenue\n1,10\n2,20\n");
        let prompt = build_prompt(&ctx.profile, &ctx.kpis);
        assert!(prompt.contains("2 rows, 2 columns"));
        assert!(prompt.contains("order_id (integer)"));
        assert!(prompt.contains("- Total Revenue: 30.0"));
        assert!(prompt.contains("- Total Orders: 2"));
    }

    #[test]
    fn compose_without_generator_uses_template() {
        let mut ctx = context("customer_id\n1\n2\n");
        let text = NarrativeStage::template().compose(&mut ctx).expect("compose");
        assert!(text.starts_with(SUMMARY_HEADER));
        assert!(text.contains("- Unique Customers: 2"));
        assert_eq!(ctx.narrative.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn compose_uses_generated_text() {
        let mut ctx = context("a\n1\n");
        let stage = NarrativeStage::with_generator(
            Arc::new(FixedGenerator(Ok("Revenue is up.".into()))),
            FallbackMode::PromptEcho,
            800,
        );
        assert_eq!(stage.compose(&mut ctx).unwrap(), "Revenue is up.");
    }

    #[test]
    fn unavailable_generator_echoes_prompt() {
        let mut ctx = context("revenue\n5\n");
        let stage = NarrativeStage::with_generator(
            Arc::new(FixedGenerator(Err(TextGenError::Unavailable("no key".into())))),
            FallbackMode::PromptEcho,
            40,
        );
        let text = stage.compose(&mut ctx).unwrap();
        assert!(text.starts_with(FALLBACK_PREFIX));
        assert_eq!(text.chars().count(), FALLBACK_PREFIX.len() + 40);
    }

    #[test]
    fn unavailable_generator_can_fall_back_to_template() {
        let mut ctx = context("revenue\n5\n");
        let stage = NarrativeStage::with_generator(
            Arc::new(FixedGenerator(Err(TextGenError::Unavailable("no key".into())))),
            FallbackMode::Template,
            800,
        );
        let text = stage.compose(&mut ctx).unwrap();
        assert!(text.starts_with(SUMMARY_HEADER));
        assert!(text.contains("- Total Revenue: 5.0"));
    }

    #[test]
    fn fatal_generator_error_propagates() {
        let mut ctx = context("revenue\n5\n");
        let stage = NarrativeStage::with_generator(
            Arc::new(FixedGenerator(Err(TextGenError::Fatal("not implemented".into())))),
            FallbackMode::PromptEcho,
            800,
        );
        let err = stage.compose(&mut ctx).unwrap_err();
        assert!(matches!(err, InsightFlowError::TextGenerationFatal(_)));
        assert!(ctx.narrative.is_none());
    }
}
