//! Intake stage: parse the tabular source and derive its profile.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, instrument};

use insightflow_shared::{Profile, Result};

use crate::session::SessionContext;
use crate::table::Table;

/// Where a run's CSV comes from.
#[derive(Debug, Clone)]
pub enum CsvSource {
    /// A file on disk.
    Path(PathBuf),
    /// An in-memory payload, e.g. an uploaded file.
    Bytes { name: String, data: Vec<u8> },
}

impl CsvSource {
    /// Human-readable label used in logs and run records.
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }
}

impl From<PathBuf> for CsvSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// Parses the input and opens the run's [`SessionContext`].
#[derive(Debug, Default, Clone, Copy)]
pub struct IntakeStage;

impl IntakeStage {
    pub fn new() -> Self {
        Self
    }

    /// Parse `source`, profile it, and return a context holding both.
    ///
    /// On failure no context exists, so no partial state can leak into later stages.
    #[instrument(skip_all, fields(source = %source.label()))]
    pub fn profile(&self, source: &CsvSource) -> Result<SessionContext> {
        info!("loading CSV");

        let table = match source {
            CsvSource::Path(path) => Table::from_csv_path(path)?,
            CsvSource::Bytes { data, .. } => Table::from_csv_bytes(data)?,
        };
        let profile = profile_table(&table);

        info!(
            rows = profile.row_count,
            columns = profile.column_count,
            "dataset profiled"
        );

        Ok(SessionContext::new(source.label(), table, profile))
    }
}

/// Structural profile of a parsed table.
pub fn profile_table(table: &Table) -> Profile {
    Profile {
        row_count: table.row_count(),
        column_count: table.column_count(),
        column_names: table.columns().iter().map(|c| c.name.clone()).collect(),
        column_types: table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.column_type))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insightflow_shared::ColumnType;

    fn bytes(csv: &str) -> CsvSource {
        CsvSource::Bytes {
            name: "upload.csv".into(),
            data: csv.as_bytes().to_vec(),
        }
    }

    #[test]
    fn profiles_normalized_columns_in_order() {
        let ctx = IntakeStage::new()
            .profile(&bytes("Date, Order ID ,Revenue\n2024-01-01,1,10.5\n2024-01-02,2,20\n"))
            .expect("intake");

        let profile = &ctx.profile;
        assert_eq!(profile.row_count, 2);
        assert_eq!(profile.column_count, 3);
        assert_eq!(profile.column_names, vec!["date", "order_id", "revenue"]);
        assert_eq!(profile.column_types["date"], ColumnType::Date);
        assert_eq!(profile.column_types["order_id"], ColumnType::Integer);
        assert_eq!(profile.column_types["revenue"], ColumnType::Float);
        assert!(ctx.table.has_column("order_id"));
    }

    #[test]
    fn header_only_input_profiles_to_zero_rows() {
        let ctx = IntakeStage::new()
            .profile(&bytes("date,order_id,customer_id,revenue\n"))
            .expect("header-only input is valid");
        assert_eq!(ctx.profile.row_count, 0);
        assert_eq!(ctx.profile.column_count, 4);
    }

    #[test]
    fn malformed_input_fails_with_intake_error() {
        let err = IntakeStage::new()
            .profile(&bytes("just some words\nthen, three, fields\n"))
            .unwrap_err();
        assert!(err.is_intake());
    }

    #[test]
    fn missing_file_fails_with_intake_error() {
        let source = CsvSource::Path(PathBuf::from("/nonexistent/insightflow.csv"));
        let err = IntakeStage::new().profile(&source).unwrap_err();
        assert!(err.is_intake());
    }

    #[test]
    fn source_labels() {
        assert_eq!(bytes("a\n").label(), "upload.csv");
        assert_eq!(
            CsvSource::from(PathBuf::from("data/sales.csv")).label(),
            "data/sales.csv"
        );
    }
}
