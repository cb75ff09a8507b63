//! Small e-commerce style dataset for demos and smoke tests.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Days, NaiveDate};

use insightflow_shared::{InsightFlowError, Result};

/// First order date of the demo dataset.
const DEMO_START: (i32, u32, u32) = (2024, 1, 1);

const DEMO_SEED: u64 = 0x1F2E_3D4C_5B6A_7988;

/// One order per day starting 2024-01-01: `date,order_id,customer_id,revenue`.
///
/// Values come from a fixed-seed generator so every call yields the same table.
pub fn demo_csv(days: u32) -> String {
    let (y, m, d) = DEMO_START;
    let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
    let mut rng = fastrand::Rng::with_seed(DEMO_SEED);

    let mut csv = String::from("date,order_id,customer_id,revenue\n");
    for i in 0..days {
        let date = start
            .checked_add_days(Days::new(u64::from(i)))
            .unwrap_or(start);
        let customer_id = rng.u64(1..=19);
        let revenue = rng.u64(200..1500);
        let _ = writeln!(csv, "{date},{},{customer_id},{revenue}", 1000 + i);
    }
    csv
}

/// Write [`demo_csv`] to `path`, creating parent directories.
pub fn write_demo_csv(path: &Path, days: u32) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| InsightFlowError::io(parent, e))?;
    }
    std::fs::write(path, demo_csv(days)).map_err(|e| InsightFlowError::io(path, e))
}
