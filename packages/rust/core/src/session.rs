//! Per-run session context.
//!
//! A [`SessionContext`] holds every intermediate artifact of one pipeline
//! run. It can only be created by a successful intake, so later stages never
//! have to check whether the table exists. It is neither `Clone` nor shared:
//! each run owns exactly one.

use insightflow_shared::{ChartSet, KpiSet, Profile, ResultRecord, RunId};

use crate::table::Table;

/// Mutable scratch space for one pipeline run.
#[derive(Debug)]
pub struct SessionContext {
    run_id: RunId,
    source: String,
    pub table: Table,
    pub profile: Profile,
    pub kpis: KpiSet,
    pub charts: ChartSet,
    pub narrative: Option<String>,
}

impl SessionContext {
    /// Start a run from a parsed table and its profile.
    pub(crate) fn new(source: impl Into<String>, table: Table, profile: Profile) -> Self {
        Self {
            run_id: RunId::new(),
            source: source.into(),
            table,
            profile,
            kpis: KpiSet::new(),
            charts: ChartSet::new(),
            narrative: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Label of the input this run was started from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Consume the context into the caller-facing result. The table is dropped.
    pub fn into_record(self) -> ResultRecord {
        ResultRecord {
            profile: self.profile,
            kpis: self.kpis,
            charts: self.charts,
            narrative: self.narrative.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::profile_table;

    #[test]
    fn fresh_context_has_empty_outputs() {
        let table = Table::from_csv_bytes(b"a\n1\n").unwrap();
        let profile = profile_table(&table);
        let ctx = SessionContext::new("inline", table, profile);

        assert!(ctx.kpis.is_empty());
        assert!(ctx.charts.is_empty());
        assert!(ctx.narrative.is_none());
        assert_eq!(ctx.source(), "inline");
    }

    #[test]
    fn every_context_gets_its_own_run_id() {
        let table = Table::from_csv_bytes(b"a\n1\n").unwrap();
        let profile = profile_table(&table);
        let first = SessionContext::new("a.csv", table.clone(), profile.clone());
        let second = SessionContext::new("a.csv", table, profile);
        assert_ne!(first.run_id(), second.run_id());
    }

    #[test]
    fn into_record_carries_outputs() {
        let table = Table::from_csv_bytes(b"a\n1\n2\n").unwrap();
        let profile = profile_table(&table);
        let mut ctx = SessionContext::new("inline", table, profile);
        ctx.narrative = Some("Executive Summary:".into());

        let record = ctx.into_record();
        assert_eq!(record.profile.row_count, 2);
        assert_eq!(record.narrative, "Executive Summary:");
    }
}
