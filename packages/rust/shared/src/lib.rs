//! Shared types, error model, and configuration for InsightFlow.
//!
//! This crate is the foundation depended on by all other InsightFlow crates.
//! It provides:
//! - [`InsightFlowError`]: the unified error type
//! - Domain types ([`Profile`], [`KpiSet`], [`ChartSet`], [`ResultRecord`], [`RunId`])
//! - Configuration ([`AppConfig`], [`PipelineOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FallbackMode, MemoryConfig, OutputConfig, PipelineOptions, ServerConfig,
    TextGenerationConfig, config_dir, config_file_path, env_lookup, find_api_key_with,
    init_config, load_config, load_config_from,
};
pub use error::{InsightFlowError, Result};
pub use types::{
    ChartRef, ChartSet, ColumnType, Kpi, KpiSet, KpiValue, MONTHLY_REVENUE_CHART, Profile,
    ResultRecord, RunId,
};
