//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pinbridge - pinball emulation core driver
///
/// Streams emulator audio into a small ring of playback buffers and renders
/// the machine's displays as text
#[derive(Parser, Debug)]
#[command(name = "pinbridge")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Settings file (default: search next to the executable, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output to file
    #[arg(long, global = true)]
    pub log: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the synthetic core through the audio bridge
    Demo {
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<f64>,

        /// Stall periodically, then deliver frames back-to-back
        #[arg(long)]
        burst: bool,

        /// Print display updates
        #[arg(long)]
        show_displays: bool,

        /// Play through the default output device (requires the `playback` feature)
        #[arg(long)]
        audio: bool,
    },

    /// Render 16-segment cells given as hex masks
    Segments {
        /// Cell masks, e.g. 0x3F 7f
        #[arg(required = true)]
        cells: Vec<String>,

        /// Use the split top/bottom template
        #[arg(long)]
        split: bool,
    },

    /// Print the dot-matrix intensity table
    Shades {
        /// Display bit depth
        #[arg(short, long, default_value = "2")]
        depth: u8,

        /// Use the SAM/SPA hardware table
        #[arg(long)]
        sam: bool,
    },

    /// Print the sample settings file, or write it to a path
    Config {
        /// Write the sample settings to this path
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
}

impl Args {
    /// Get the log level based on verbose/quiet flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Demo {
            seconds: None,
            burst: false,
            show_displays: false,
            audio: false,
        }
    }
}
