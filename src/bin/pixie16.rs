//! pixie16 - list-mode data tool for Pixie16 digitizers
//!
//! Usage:
//!   pixie16 decode <files..> [-n <max>]        - Print events as JSON lines
//!   pixie16 summary <files..> [-c <channel>]   - Per-channel counts and energy range
//!   pixie16 generate <output> [-n <events>]    - Write an emulated list-mode file
//!
//! All subcommands accept `-f <config.toml>`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use pixie16_rs::common::cli::{Pixie16Args, Pixie16Command};
use pixie16_rs::config::Config;
use pixie16_rs::emulator::ListModeEmulator;
use pixie16_rs::reader::{events_from_files, sort_events_by_channel, Event, StreamEnd};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging), kept on stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("pixie16_rs=info".parse()?))
        .init();

    let args = Pixie16Args::parse();

    let mut config = match &args.common.config_file {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };
    args.command.apply_emulator(&mut config.emulator);

    match &args.command {
        Pixie16Command::Decode { read } => {
            read.apply(&mut config.reader);
            config.validate()?;
            decode(&read.files, &config)
        }
        Pixie16Command::Summary { read, channels } => {
            read.apply(&mut config.reader);
            if !channels.is_empty() {
                config.reader.channels = Some(channels.clone());
            }
            config.validate()?;
            summary(&read.files, &config)
        }
        Pixie16Command::Generate { output, .. } => {
            config.validate()?;
            generate(output, &config)
        }
    }
}

fn describe_end(end: Option<StreamEnd>) -> String {
    match end {
        Some(StreamEnd::Clean) => "clean".to_string(),
        Some(StreamEnd::Truncated { leftover_bytes }) => {
            format!("truncated ({} leftover bytes)", leftover_bytes)
        }
        None => "not reached".to_string(),
    }
}

fn decode(files: &[PathBuf], config: &Config) -> anyhow::Result<()> {
    let mut stream = events_from_files(files.iter().cloned(), &config.reader);
    let limit = config.reader.max_events.unwrap_or(usize::MAX);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0usize;
    for event in stream.by_ref().take(limit) {
        let event = event?;
        serde_json::to_writer(&mut out, &event)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;

    info!(
        events = count,
        end = %describe_end(stream.end_of_stream()),
        "Decode finished"
    );
    Ok(())
}

fn summary(files: &[PathBuf], config: &Config) -> anyhow::Result<()> {
    let mut stream = events_from_files(files.iter().cloned(), &config.reader);
    let limit = config.reader.max_events.unwrap_or(usize::MAX);
    let events: Vec<Event> = stream.by_ref().take(limit).collect::<Result<_, _>>()?;
    let total = events.len();

    let sorted = sort_events_by_channel(events, config.reader.channels.as_deref());

    println!("=== List-mode Summary ===");
    println!("  Files:          {}", files.len());
    println!("  Total events:   {}", total);
    println!("  Bytes read:     {}", stream.stats().bytes_read);
    println!("  Stream end:     {}", describe_end(stream.end_of_stream()));
    println!();
    println!("  Ch     Events   E min   E max  Pileup  CFD err  Traces");
    for (channel, events) in &sorted {
        let e_min = events.iter().map(|e| e.energy).min().unwrap_or(0);
        let e_max = events.iter().map(|e| e.energy).max().unwrap_or(0);
        let pileup = events.iter().filter(|e| e.pileup).count();
        let cfd_errors = events.iter().filter(|e| e.cfd_error).count();
        let traces = events.iter().filter(|e| e.has_trace()).count();
        println!(
            "  {:2} {:10} {:7} {:7} {:7} {:8} {:7}",
            channel,
            events.len(),
            e_min,
            e_max,
            pileup,
            cfd_errors,
            traces
        );
    }

    Ok(())
}

fn generate(output: &Path, config: &Config) -> anyhow::Result<()> {
    let mut emulator = ListModeEmulator::new(config.emulator.clone())?;
    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = emulator.write_stream(&mut writer)?;
    writer.flush()?;

    info!(
        path = %output.display(),
        events = config.emulator.num_events,
        bytes,
        header_length = config.emulator.header_length,
        "Emulated list-mode file written"
    );
    Ok(())
}
