//! List-mode emulator - generates synthetic Pixie16 data for testing
//!
//! This module provides the inverse of the decoder: `encode_event` writes
//! header fields and a trace as list-mode words, and `ListModeEmulator`
//! produces a reproducible stream of random events in any header variant.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use thiserror::Error;
use tracing::{debug, info};

use crate::common::WORD_SIZE;
use crate::reader::decoder::layout::{self, EnergySums, ExtTime, HeaderFields, HeaderVariant};
use crate::reader::decoder::Event;

/// Largest event length the 14-bit field holds, in words
pub const MAX_EVENT_LENGTH: usize = (1 << 14) - 1;

/// Largest trace the 15-bit trace length field holds, in samples
pub const MAX_TRACE_LENGTH_FIELD: usize = (1 << 15) - 1;

/// Largest trace that fits next to the longest header
pub const MAX_TRACE_SAMPLES: usize = (MAX_EVENT_LENGTH - 18) * 2;

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Unsupported header length: {0} words")]
    UnsupportedHeaderLength(u32),

    #[error("Channel count must be 1..=16, got {0}")]
    InvalidChannelCount(u8),

    #[error("Trace of {0} samples does not fit the event length field")]
    TraceTooLong(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode one event as list-mode bytes
///
/// Header and event length fields are filled in from `variant` and the
/// trace; an odd trace is padded with a zero sample to fill the last word.
/// A trace whose event length or trace length does not fit its field is
/// rejected.
pub fn encode_event(
    header: &HeaderFields,
    variant: HeaderVariant,
    trace: &[u16],
) -> Result<Vec<u8>, EmulatorError> {
    let trace_words = trace.len().div_ceil(2);
    let event_length = variant.header_length() as usize + trace_words;
    if event_length > MAX_EVENT_LENGTH || trace_words * 2 > MAX_TRACE_LENGTH_FIELD {
        return Err(EmulatorError::TraceTooLong(trace.len()));
    }

    let mut fields = header.clone();
    fields.header_length = variant.header_length();
    fields.event_length = event_length as u32;
    fields.trace_length = (trace_words * 2) as u16;

    let mut bytes = layout::pack(&fields, variant.groups());
    bytes.reserve(trace_words * WORD_SIZE);
    for sample in trace {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    if trace.len() % 2 == 1 {
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(bytes)
}

/// Emulator configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// RNG seed, same seed gives the same stream
    pub seed: u64,
    /// Number of events to generate
    pub num_events: usize,
    /// Header length in words (4, 6, 8, 10, 12, 14, 16 or 18)
    pub header_length: u32,
    /// Crate number written into every event
    pub crate_id: u8,
    /// Slot number written into every event
    pub slot: u8,
    /// Number of channels to spread events over (1-16)
    pub channels: u8,
    /// Trace samples per event (0 = no trace)
    pub trace_length: usize,
    /// Mean spacing between events in timestamp ticks
    pub mean_interval_ticks: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_events: 1000,
            header_length: 4,
            crate_id: 0,
            slot: 2,
            channels: 16,
            trace_length: 0,
            mean_interval_ticks: 100,
        }
    }
}

/// One generated event together with its wire encoding inputs
#[derive(Debug, Clone)]
pub struct EmulatedEvent {
    pub variant: HeaderVariant,
    pub header: HeaderFields,
    pub trace: Vec<u16>,
}

impl EmulatedEvent {
    /// List-mode bytes for this event
    pub fn to_bytes(&self) -> Result<Vec<u8>, EmulatorError> {
        encode_event(&self.header, self.variant, &self.trace)
    }

    /// The event a decoder should produce from `to_bytes()`
    pub fn expected(&self) -> Event {
        let mut trace = self.trace.clone();
        if trace.len() % 2 == 1 {
            trace.push(0);
        }
        Event::from_header(self.header.clone(), trace)
    }
}

/// Random list-mode event generator
pub struct ListModeEmulator {
    config: EmulatorConfig,
    variant: HeaderVariant,
    rng: StdRng,
    ticks: u64,
}

impl ListModeEmulator {
    /// Create a new emulator, validating the configuration
    pub fn new(config: EmulatorConfig) -> Result<Self, EmulatorError> {
        let variant = HeaderVariant::from_header_length(config.header_length)
            .ok_or(EmulatorError::UnsupportedHeaderLength(config.header_length))?;
        if config.channels == 0 || config.channels > 16 {
            return Err(EmulatorError::InvalidChannelCount(config.channels));
        }
        if config.trace_length > MAX_TRACE_SAMPLES {
            return Err(EmulatorError::TraceTooLong(config.trace_length));
        }

        info!(
            seed = config.seed,
            header_length = config.header_length,
            trace_length = config.trace_length,
            "Emulator created"
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            variant,
            ticks: 0,
        })
    }

    pub fn variant(&self) -> HeaderVariant {
        self.variant
    }

    /// Generate the next event
    ///
    /// Energy distribution:
    /// - 70% Gaussian peak: mean = channel * 50 + 500, sigma = 50
    /// - 30% Uniform background: 0 to 4095
    pub fn next_event(&mut self) -> EmulatedEvent {
        const BACKGROUND_RATIO: f64 = 0.3;
        const SIGMA: f64 = 50.0;

        let channel = self.rng.gen_range(0..self.config.channels);

        let energy: u16 = if self.rng.gen_bool(BACKGROUND_RATIO) {
            self.rng.gen_range(0..4096)
        } else {
            let mean = f64::from(channel) * 50.0 + 500.0;
            let sample = Normal::new(mean, SIGMA).map_or(mean, |n| n.sample(&mut self.rng));
            sample.clamp(0.0, 65535.0) as u16
        };

        let max_step = self.config.mean_interval_ticks.max(1) * 2;
        self.ticks = (self.ticks + self.rng.gen_range(1..=max_step)) & 0xFFFF_FFFF_FFFF;

        // 1% of events carry the CFD error pattern
        let cfd_trigger_source_bits = if self.rng.gen_ratio(1, 100) {
            7
        } else {
            self.rng.gen_range(0..7)
        };

        let mut header = HeaderFields {
            pileup: self.rng.gen_ratio(1, 100),
            crate_id: self.config.crate_id & 0xF,
            slot: self.config.slot & 0xF,
            channel,
            evttime_lo: self.ticks as u32,
            evttime_hi: (self.ticks >> 32) as u16,
            cfd_trigger_source_bits,
            cfd_fractional_time: self.rng.gen_range(0..8192),
            trace_flag: u8::from(self.rng.gen_ratio(1, 1000)),
            energy,
            ..Default::default()
        };

        if self.variant.has_energy_sums() {
            let baseline = Normal::new(100.0f32, 2.0).map_or(100.0, |n| n.sample(&mut self.rng));
            header.energy_sums = Some(EnergySums {
                trailing: u32::from(energy) * 4,
                leading: u32::from(energy) * 5,
                gap: u32::from(energy) * 2,
                baseline,
            });
        }
        if self.variant.has_qdc_sums() {
            let mut sums = [0u32; 8];
            for sum in sums.iter_mut() {
                *sum = u32::from(energy) * self.rng.gen_range(1..16);
            }
            header.qdc_sums = Some(sums);
        }
        if self.variant.has_ext_time() {
            let ext = self.ticks / 8;
            header.ext_time = Some(ExtTime {
                lo: ext as u32,
                hi: (ext >> 32) as u16,
            });
        }

        let trace = self.generate_trace(energy);

        EmulatedEvent {
            variant: self.variant,
            header,
            trace,
        }
    }

    /// Generate `n` events
    pub fn generate(&mut self, n: usize) -> Vec<EmulatedEvent> {
        (0..n).map(|_| self.next_event()).collect()
    }

    /// Write `num_events` encoded events to `writer`, returning bytes written
    pub fn write_stream<W: Write>(&mut self, writer: &mut W) -> Result<usize, EmulatorError> {
        let mut written = 0;
        for _ in 0..self.config.num_events {
            let bytes = self.next_event().to_bytes()?;
            writer.write_all(&bytes)?;
            written += bytes.len();
        }
        debug!(events = self.config.num_events, bytes = written, "Stream written");
        Ok(written)
    }

    /// Generate a simulated trace
    ///
    /// Baseline -> fast rise -> exponential decay, with the trigger position
    /// randomized within the window.
    fn generate_trace(&mut self, energy: u16) -> Vec<u16> {
        let n = self.config.trace_length;
        if n == 0 {
            return Vec::new();
        }

        let baseline: f64 = 400.0 + self.rng.gen_range(-20.0..20.0);
        let amplitude = f64::from(energy) / 4.0;
        let rise_time = 5;
        let decay_tau = 50.0;
        let pulse_start = if n >= 4 {
            self.rng.gen_range(n / 4..n / 2 + 1)
        } else {
            0
        };

        (0..n)
            .map(|i| {
                let value = if i < pulse_start {
                    baseline
                } else if i < pulse_start + rise_time {
                    let frac = (i - pulse_start) as f64 / rise_time as f64;
                    baseline + amplitude * frac
                } else {
                    let t = (i - pulse_start - rise_time) as f64;
                    baseline + amplitude * (-t / decay_tau).exp()
                };
                value.clamp(0.0, 65535.0) as u16
            })
            .collect()
    }
}
