//! Command-line arguments.

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(version, about = "Single-origin gateway for a legacy storefront and its edge frontend")]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::default())]
    pub tracing: TracingFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable, compact lines
    Pretty,
    /// One JSON object per event
    Json,
}

impl Default for TracingFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            TracingFormat::Pretty
        } else {
            TracingFormat::Json
        }
    }
}
