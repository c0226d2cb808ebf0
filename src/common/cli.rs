//! CLI argument parsing for the pixie16 tool
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Command line values override the config file, which overrides defaults

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::emulator::EmulatorConfig;
use crate::reader::ReaderConfig;

/// Common arguments shared across all subcommands
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short = 'f', long = "config", global = true)]
    pub config_file: Option<PathBuf>,
}

/// Top-level arguments
#[derive(Parser, Debug)]
#[command(name = "pixie16")]
#[command(about = "Decode and generate Pixie16 list-mode data")]
#[command(version)]
pub struct Pixie16Args {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Pixie16Command,
}

#[derive(Subcommand, Debug)]
pub enum Pixie16Command {
    /// Decode list-mode files and print one JSON event per line
    Decode {
        #[command(flatten)]
        read: ReadArgs,
    },

    /// Print per-channel event counts and energy ranges
    Summary {
        #[command(flatten)]
        read: ReadArgs,

        /// Only include this channel (can specify multiple times)
        #[arg(short = 'c', long = "channel", action = clap::ArgAction::Append)]
        channels: Vec<u8>,
    },

    /// Write an emulated list-mode file
    Generate {
        /// Output file
        output: PathBuf,

        /// Number of events
        #[arg(short = 'n', long)]
        num_events: Option<usize>,

        /// Header length in words (4, 6, 8, 10, 12, 14, 16, 18)
        #[arg(long)]
        header_length: Option<u32>,

        /// Trace samples per event
        #[arg(long)]
        trace_length: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Arguments for subcommands that read list-mode files
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// List-mode files, read in the given order as one stream
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Stop after this many events
    #[arg(short = 'n', long)]
    pub max_events: Option<usize>,

    /// Bytes read per chunk
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Directory for debug dumps on corrupt data
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,
}

impl ReadArgs {
    /// Override reader settings given on the command line
    pub fn apply(&self, config: &mut ReaderConfig) {
        if let Some(n) = self.max_events {
            config.max_events = Some(n);
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(dir) = &self.dump_dir {
            config.dump_dir = Some(dir.clone());
        }
    }
}

impl Pixie16Command {
    /// Override emulator settings given on the command line
    pub fn apply_emulator(&self, config: &mut EmulatorConfig) {
        if let Pixie16Command::Generate {
            num_events,
            header_length,
            trace_length,
            seed,
            ..
        } = self
        {
            if let Some(n) = num_events {
                config.num_events = *n;
            }
            if let Some(h) = header_length {
                config.header_length = *h;
            }
            if let Some(t) = trace_length {
                config.trace_length = *t;
            }
            if let Some(s) = seed {
                config.seed = *s;
            }
        }
    }
}
