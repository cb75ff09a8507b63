//! KPI stage: the fixed KPI menu plus the optional monthly revenue chart.
//!
//! Each KPI is computed only when its prerequisite column is present.
//! Missing or extra columns are never an error.

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use insightflow_shared::{ChartSet, Kpi, KpiSet, KpiValue, MONTHLY_REVENUE_CHART};

use crate::chart::{self, ChartWriter};
use crate::session::SessionContext;
use crate::table::{Column, Table};

/// Computes KPIs and charts from the session's table.
#[derive(Debug, Clone, Default)]
pub struct KpiStage {
    /// `None` disables chart rendering.
    charts: Option<ChartWriter>,
}

impl KpiStage {
    pub fn new(charts: Option<ChartWriter>) -> Self {
        Self { charts }
    }

    /// Compute the KPI menu and, when `date` and `revenue` exist, the monthly
    /// revenue chart. Chart failures are logged and leave the chart out.
    #[instrument(skip_all, fields(run_id = %ctx.run_id()))]
    pub fn compute(&self, ctx: &mut SessionContext) -> (KpiSet, ChartSet) {
        info!("computing KPIs");

        let kpis = compute_kpis(&ctx.table);
        let mut charts = ChartSet::new();

        let wants_chart = ctx.table.has_column("date") && ctx.table.has_column("revenue");
        if let (Some(writer), true) = (&self.charts, wants_chart) {
            match chart::monthly_revenue_chart(&ctx.table, writer, ctx.run_id()) {
                Ok(chart) => {
                    charts.insert(MONTHLY_REVENUE_CHART.to_string(), chart);
                }
                Err(e) => warn!(error = %e, "error generating monthly revenue chart"),
            }
        }

        ctx.kpis = kpis.clone();
        ctx.charts = charts.clone();

        info!(kpis = kpis.len(), charts = charts.len(), "KPIs computed");
        (kpis, charts)
    }
}

/// Evaluate every KPI whose prerequisite column exists in `table`.
pub fn compute_kpis(table: &Table) -> KpiSet {
    let mut kpis = KpiSet::new();

    for kpi in Kpi::ALL {
        let Some(column) = table.column(kpi.prerequisite()) else {
            continue;
        };
        let value = match kpi {
            Kpi::TotalRevenue => match column_sum(column) {
                Some(total) => KpiValue::Float(total),
                None => {
                    warn!(column = %column.name, kpi = kpi.key(), "column is not numeric, skipping KPI");
                    continue;
                }
            },
            Kpi::TotalOrders | Kpi::UniqueCustomers => KpiValue::Count(distinct_count(column)),
        };
        kpis.insert(kpi, value);
    }

    kpis
}

/// Floating-point sum of the non-empty cells, or `None` if any of them is not numeric.
pub fn column_sum(column: &Column) -> Option<f64> {
    column
        .present()
        .try_fold(0.0, |acc, value| value.as_f64().map(|v| acc + v))
}

/// Number of distinct non-empty values.
pub fn distinct_count(column: &Column) -> u64 {
    column
        .values
        .iter()
        .filter_map(|v| v.distinct_key())
        .collect::<HashSet<_>>()
        .len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{CsvSource, IntakeStage};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn table(csv: &str) -> Table {
        Table::from_csv_bytes(csv.as_bytes()).expect("parse")
    }

    fn context(csv: &str) -> SessionContext {
        let source = CsvSource::Bytes {
            name: "test.csv".into(),
            data: csv.as_bytes().to_vec(),
        };
        IntakeStage::new().profile(&source).expect("intake")
    }

    fn chart_dir() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("if_kpi_charts_{}", Uuid::now_v7()))
    }

    #[test]
    fn computes_full_menu() {
        let kpis = compute_kpis(&table(
            "order_id,customer_id,revenue\n1,10,100.5\n2,10,200\n2,11,50\n",
        ));
        assert_eq!(kpis.get(Kpi::TotalRevenue), Some(KpiValue::Float(350.5)));
        assert_eq!(kpis.get(Kpi::TotalOrders), Some(KpiValue::Count(2)));
        assert_eq!(kpis.get(Kpi::UniqueCustomers), Some(KpiValue::Count(2)));
    }

    #[test]
    fn missing_prerequisites_leave_kpis_absent() {
        let kpis = compute_kpis(&table("customer_id,region\n1,north\n2,south\n"));
        assert!(!kpis.contains(Kpi::TotalOrders));
        assert!(!kpis.contains(Kpi::TotalRevenue));
        assert_eq!(kpis.get(Kpi::UniqueCustomers), Some(KpiValue::Count(2)));
    }

    #[test]
    fn unrecognized_columns_give_empty_set() {
        let kpis = compute_kpis(&table("sku,qty\nA,1\n"));
        assert!(kpis.is_empty());
    }

    #[test]
    fn zero_rows_still_report_present_kpis() {
        let kpis = compute_kpis(&table("order_id,revenue\n"));
        assert_eq!(kpis.get(Kpi::TotalRevenue), Some(KpiValue::Float(0.0)));
        assert_eq!(kpis.get(Kpi::TotalOrders), Some(KpiValue::Count(0)));
    }

    #[test]
    fn text_revenue_is_skipped() {
        let kpis = compute_kpis(&table("revenue,order_id\nlots,1\n"));
        assert!(!kpis.contains(Kpi::TotalRevenue));
        assert!(kpis.contains(Kpi::TotalOrders));
    }

    #[test]
    fn infinite_revenue_is_skipped() {
        let kpis = compute_kpis(&table("revenue,order_id\n10,1\ninf,2\n"));
        assert!(!kpis.contains(Kpi::TotalRevenue));
        assert_eq!(kpis.get(Kpi::TotalOrders), Some(KpiValue::Count(2)));
    }

    #[test]
    fn distinct_count_ignores_empty_cells() {
        let t = table("customer_id\n1\n\n1\n2\n");
        assert_eq!(distinct_count(t.column("customer_id").unwrap()), 2);
    }

    #[test]
    fn stage_writes_kpis_and_chart_into_context() {
        let mut ctx = context(
            "date,order_id,customer_id,revenue\n\
             2024-01-01,1,1,100\n\
             2024-02-01,2,2,200\n",
        );
        let stage = KpiStage::new(Some(ChartWriter::new(chart_dir())));
        let (kpis, charts) = stage.compute(&mut ctx);

        assert_eq!(kpis.len(), 3);
        assert!(charts.contains_key(MONTHLY_REVENUE_CHART));
        assert_eq!(ctx.kpis, kpis);
        assert_eq!(ctx.charts, charts);
    }

    #[test]
    fn chart_needs_date_and_revenue() {
        let mut ctx = context("revenue,order_id\n100,1\n");
        let stage = KpiStage::new(Some(ChartWriter::new(chart_dir())));
        let (kpis, charts) = stage.compute(&mut ctx);
        assert!(charts.is_empty());
        assert_eq!(kpis.len(), 2);
    }

    #[test]
    fn chart_failure_keeps_kpis() {
        let mut ctx = context("date,revenue\nyesterday,100\n2024-01-01,50\n");
        let stage = KpiStage::new(Some(ChartWriter::new(chart_dir())));
        let (kpis, charts) = stage.compute(&mut ctx);

        assert!(charts.is_empty());
        assert_eq!(kpis.get(Kpi::TotalRevenue), Some(KpiValue::Float(150.0)));
    }

    #[test]
    fn disabled_charts_are_never_rendered() {
        let mut ctx = context("date,revenue\n2024-01-01,50\n");
        let (_, charts) = KpiStage::new(None).compute(&mut ctx);
        assert!(charts.is_empty());
    }

    fn csv_column(name: &str, values: &[i64]) -> String {
        let mut csv = format!("{name}\n");
        for v in values {
            csv.push_str(&format!("{v}\n"));
        }
        csv
    }

    proptest! {
        #[test]
        fn total_revenue_is_exact_sum(values in prop::collection::vec(-1_000_000i64..1_000_000, 0..200)) {
            let kpis = compute_kpis(&table(&csv_column("revenue", &values)));
            let expected: i64 = values.iter().sum();
            prop_assert_eq!(kpis.get(Kpi::TotalRevenue), Some(KpiValue::Float(expected as f64)));
        }

        #[test]
        fn unique_customers_ignores_row_order(
            (values, shuffled) in prop::collection::vec(0i64..50, 0..100)
                .prop_flat_map(|values| (Just(values.clone()), Just(values).prop_shuffle())),
        ) {
            let original = compute_kpis(&table(&csv_column("customer_id", &values)));
            let reordered = compute_kpis(&table(&csv_column("customer_id", &shuffled)));
            let expected = values.iter().collect::<HashSet<_>>().len() as u64;

            prop_assert_eq!(original.get(Kpi::UniqueCustomers), Some(KpiValue::Count(expected)));
            prop_assert_eq!(original, reordered);
        }
    }
}
