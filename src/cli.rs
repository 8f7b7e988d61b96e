use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tubeshift")]
#[command(author, version, about = "Fetch online videos and convert them for playback")]
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
    /// Read `<origin> [mp3] <url>` and `<origin> cancel` lines from stdin
    Serve,

    /// Fetch and convert a single URL, waiting until it finishes
    Fetch {
        /// Video page URL
        #[arg(required = true)]
        url: String,

        /// Extract the audio as mp3 instead of keeping the video
        #[arg(long)]
        mp3: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
