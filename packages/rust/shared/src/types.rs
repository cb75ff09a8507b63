//! Core domain types shared by the pipeline, the server and the CLI.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Type tag inferred for a column at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
    /// Every cell in the column is empty (or there are no rows).
    Empty,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Text => "text",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural metadata describing the shape and column types of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Number of data rows (header excluded).
    #[serde(rename = "num_rows")]
    pub row_count: usize,
    /// Number of columns.
    #[serde(rename = "num_cols")]
    pub column_count: usize,
    /// Normalized column names in source order.
    #[serde(rename = "columns")]
    pub column_names: Vec<String>,
    /// Inferred type per column.
    #[serde(rename = "dtypes")]
    pub column_types: BTreeMap<String, ColumnType>,
}

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

/// The fixed KPI menu. Declaration order is the menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    TotalRevenue,
    TotalOrders,
    UniqueCustomers,
}

impl Kpi {
    /// Every KPI, in menu order.
    pub const ALL: [Kpi; 3] = [Kpi::TotalRevenue, Kpi::TotalOrders, Kpi::UniqueCustomers];

    /// Key used in the serialized KPI map.
    pub fn key(&self) -> &'static str {
        match self {
            Self::TotalRevenue => "total_revenue",
            Self::TotalOrders => "total_orders",
            Self::UniqueCustomers => "unique_customers",
        }
    }

    /// Human-readable label used in narratives.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TotalRevenue => "Total Revenue",
            Self::TotalOrders => "Total Orders",
            Self::UniqueCustomers => "Unique Customers",
        }
    }

    /// Normalized column name that must be present for this KPI to be computed.
    pub fn prerequisite(&self) -> &'static str {
        match self {
            Self::TotalRevenue => "revenue",
            Self::TotalOrders => "order_id",
            Self::UniqueCustomers => "customer_id",
        }
    }
}

/// A single KPI value: a floating-point total or an exact count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KpiValue {
    Count(u64),
    Float(f64),
}

impl std::fmt::Display for KpiValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            // Whole totals keep one decimal so they still read as money amounts.
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// KPIs computed for one run. Keys are present only when their prerequisite
/// column exists; an empty set is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KpiSet(BTreeMap<Kpi, KpiValue>);

impl KpiSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kpi: Kpi, value: KpiValue) {
        self.0.insert(kpi, value);
    }

    pub fn get(&self, kpi: Kpi) -> Option<KpiValue> {
        self.0.get(&kpi).copied()
    }

    pub fn contains(&self, kpi: Kpi) -> bool {
        self.0.contains_key(&kpi)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Present KPIs in menu order.
    pub fn iter(&self) -> impl Iterator<Item = (Kpi, KpiValue)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// Name of the monthly revenue trend chart.
pub const MONTHLY_REVENUE_CHART: &str = "monthly_revenue";

/// Reference to a rendered chart artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartRef {
    pub path: PathBuf,
}

/// Rendered charts keyed by chart name. Empty when nothing could be drawn.
pub type ChartSet = BTreeMap<String, ChartRef>;

// ---------------------------------------------------------------------------
// ResultRecord
// ---------------------------------------------------------------------------

/// Everything one pipeline run produces, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub profile: Profile,
    pub kpis: KpiSet,
    #[serde(default)]
    pub charts: ChartSet,
    pub narrative: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn kpi_menu_order() {
        let mut kpis = KpiSet::new();
        kpis.insert(Kpi::UniqueCustomers, KpiValue::Count(4));
        kpis.insert(Kpi::TotalRevenue, KpiValue::Float(10.5));
        let order: Vec<Kpi> = kpis.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec![Kpi::TotalRevenue, Kpi::UniqueCustomers]);
    }

    #[test]
    fn kpi_set_serializes_as_flat_map() {
        let mut kpis = KpiSet::new();
        kpis.insert(Kpi::TotalRevenue, KpiValue::Float(1500.0));
        kpis.insert(Kpi::TotalOrders, KpiValue::Count(3));

        let json = serde_json::to_value(&kpis).expect("serialize");
        assert_eq!(json["total_revenue"], serde_json::json!(1500.0));
        assert_eq!(json["total_orders"], serde_json::json!(3));
        assert!(json.get("unique_customers").is_none());

        let parsed: KpiSet = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, kpis);
    }

    #[test]
    fn kpi_keys_match_serialized_names() {
        for kpi in Kpi::ALL {
            assert_eq!(serde_json::to_value(kpi).unwrap(), kpi.key());
        }
    }

    #[test]
    fn kpi_value_display() {
        assert_eq!(KpiValue::Float(1500.0).to_string(), "1500.0");
        assert_eq!(KpiValue::Float(12.25).to_string(), "12.25");
        assert_eq!(KpiValue::Count(90).to_string(), "90");
    }

    #[test]
    fn result_record_shape() {
        let mut charts = ChartSet::new();
        charts.insert(
            MONTHLY_REVENUE_CHART.into(),
            ChartRef {
                path: PathBuf::from("out/monthly_revenue.svg"),
            },
        );
        let record = ResultRecord {
            profile: Profile {
                row_count: 2,
                column_count: 1,
                column_names: vec!["revenue".into()],
                column_types: BTreeMap::from([("revenue".into(), ColumnType::Integer)]),
            },
            kpis: KpiSet::new(),
            charts,
            narrative: "Executive Summary:".into(),
        };

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["profile"]["num_rows"], 2);
        assert_eq!(json["profile"]["num_cols"], 1);
        assert_eq!(json["profile"]["columns"][0], "revenue");
        assert_eq!(json["profile"]["dtypes"]["revenue"], "integer");
        assert_eq!(json["charts"]["monthly_revenue"], "out/monthly_revenue.svg");
        assert_eq!(json["kpis"], serde_json::json!({}));
    }
}
