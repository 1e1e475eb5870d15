use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cliprelay::config::{CaptureSourceKind, SinkKind};

#[derive(Parser)]
#[command(name = "cliprelay")]
#[command(author, version, about = "Continuous video segment relay")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture segments and serve them to consumers
    Produce {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Recording length per segment, in milliseconds
        #[arg(long)]
        segment_ms: Option<u64>,

        /// Capture source
        #[arg(long, value_enum)]
        source: Option<SourceArg>,
    },

    /// Download segments from a producer and play them back
    Consume {
        /// Producer address as host:port
        #[arg(short, long)]
        server: Option<String>,

        /// Render sink
        #[arg(long, value_enum)]
        sink: Option<SinkArg>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Synthetic,
    Command,
}

impl From<SourceArg> for CaptureSourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Synthetic => CaptureSourceKind::Synthetic,
            SourceArg::Command => CaptureSourceKind::Command,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SinkArg {
    Clock,
    Command,
}

impl From<SinkArg> for SinkKind {
    fn from(arg: SinkArg) -> Self {
        match arg {
            SinkArg::Clock => SinkKind::Clock,
            SinkArg::Command => SinkKind::Command,
        }
    }
}
