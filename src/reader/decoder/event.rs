//! Decoded list-mode event

use serde::{Deserialize, Serialize};

use super::layout::HeaderFields;

/// CFD trigger source value the firmware uses to flag a failed CFD
pub const CFD_ERROR_BITS: u8 = 7;

/// Full scale of the 13-bit CFD fractional time
pub const CFD_FRACTION_SCALE: f64 = 8192.0;

/// Timestamp ticks to output units
pub const TIMESTAMP_SCALE: u64 = 10;

/// Sentinel for integer sums missing from the header variant
pub const MISSING: i64 = -1;

/// Sentinel for the baseline when energy sums are missing
pub const MISSING_BASELINE: f32 = -1.0;

/// One event as delivered to consumers
///
/// Every header variant maps onto this single shape; sub-block fields that
/// the variant does not carry hold the `-1` sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub channel: u8,
    #[serde(rename = "crate")]
    pub crate_id: u8,
    pub slot: u8,
    /// `(EVTTIME_LO + EVTTIME_HI * 2^32) * 10`
    pub timestamp: u64,
    #[serde(rename = "CFD_fraction")]
    pub cfd_fraction: f64,
    pub energy: u16,
    /// Waveform samples, empty when no trace was recorded
    pub trace: Vec<u16>,
    #[serde(rename = "CFD_error")]
    pub cfd_error: bool,
    pub pileup: bool,
    pub trace_flag: u8,
    #[serde(rename = "Esum_trailing")]
    pub esum_trailing: i64,
    #[serde(rename = "Esum_leading")]
    pub esum_leading: i64,
    #[serde(rename = "Esum_gap")]
    pub esum_gap: i64,
    pub baseline: f32,
    /// Serialized as the flat columns `QDCSum0` .. `QDCSum7`
    #[serde(flatten, with = "qdc_columns")]
    pub qdc_sums: [i64; 8],
    /// `Ext_TS_Lo + Ext_TS_Hi * 2^32`, only for variants with an external timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_timestamp: Option<u64>,
    /// Unix time (s) at which the chunk holding this event was read; not a wire field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_timestamp: Option<f64>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            channel: 0,
            crate_id: 0,
            slot: 0,
            timestamp: 0,
            cfd_fraction: 0.0,
            energy: 0,
            trace: Vec::new(),
            cfd_error: false,
            pileup: false,
            trace_flag: 0,
            esum_trailing: MISSING,
            esum_leading: MISSING,
            esum_gap: MISSING,
            baseline: MISSING_BASELINE,
            qdc_sums: [MISSING; 8],
            ext_timestamp: None,
            chunk_timestamp: None,
        }
    }
}

/// True when the trigger source bits flag a CFD error
pub fn cfd_error(cfd_trigger_source_bits: u8) -> bool {
    cfd_trigger_source_bits == CFD_ERROR_BITS
}

/// CFD fraction derived from the trigger source bits and fractional time
///
/// Zero when the CFD reported an error.
pub fn cfd_fraction(cfd_trigger_source_bits: u8, cfd_fractional_time: u16) -> f64 {
    if cfd_error(cfd_trigger_source_bits) {
        return 0.0;
    }
    ((f64::from(cfd_trigger_source_bits) - 1.0)
        + f64::from(cfd_fractional_time) / CFD_FRACTION_SCALE)
        * 2.0
}

impl Event {
    /// Build an event from unpacked header fields and a decoded trace
    ///
    /// Length bookkeeping fields of the header are dropped here.
    pub fn from_header(fields: HeaderFields, trace: Vec<u16>) -> Self {
        let raw_time = u64::from(fields.evttime_lo) | (u64::from(fields.evttime_hi) << 32);
        let mut event = Self {
            channel: fields.channel,
            crate_id: fields.crate_id,
            slot: fields.slot,
            timestamp: raw_time * TIMESTAMP_SCALE,
            cfd_fraction: cfd_fraction(
                fields.cfd_trigger_source_bits,
                fields.cfd_fractional_time,
            ),
            energy: fields.energy,
            trace,
            cfd_error: cfd_error(fields.cfd_trigger_source_bits),
            pileup: fields.pileup,
            trace_flag: fields.trace_flag,
            ..Default::default()
        };

        if let Some(sums) = fields.energy_sums {
            event.esum_trailing = i64::from(sums.trailing);
            event.esum_leading = i64::from(sums.leading);
            event.esum_gap = i64::from(sums.gap);
            event.baseline = sums.baseline;
        }
        if let Some(qdc) = fields.qdc_sums {
            event.qdc_sums = qdc.map(i64::from);
        }
        if let Some(ext) = fields.ext_time {
            event.ext_timestamp = Some(u64::from(ext.lo) | (u64::from(ext.hi) << 32));
        }

        event
    }

    pub fn has_energy_sums(&self) -> bool {
        self.esum_trailing != MISSING
    }

    pub fn has_qdc_sums(&self) -> bool {
        self.qdc_sums[0] != MISSING
    }

    pub fn has_trace(&self) -> bool {
        !self.trace.is_empty()
    }

    /// Format event data for display
    pub fn display(&self) -> String {
        format!(
            "Cr:{:2} Sl:{:2} Ch:{:2} T:{:16} E:{:5} CFD:{:6.3}{}{}{}",
            self.crate_id,
            self.slot,
            self.channel,
            self.timestamp,
            self.energy,
            self.cfd_fraction,
            if self.cfd_error { " [CFD-ERR]" } else { "" },
            if self.pileup { " [PU]" } else { "" },
            if self.has_trace() { " [TR]" } else { "" }
        )
    }
}

/// Maps the QDC sum array onto one column per sum
mod qdc_columns {
    use std::fmt;

    use serde::de::{IgnoredAny, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::MISSING;

    const COLUMNS: [&str; 8] = [
        "QDCSum0", "QDCSum1", "QDCSum2", "QDCSum3", "QDCSum4", "QDCSum5", "QDCSum6", "QDCSum7",
    ];

    pub fn serialize<S: Serializer>(sums: &[i64; 8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMNS.len()))?;
        for (column, sum) in COLUMNS.iter().zip(sums) {
            map.serialize_entry(column, sum)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[i64; 8], D::Error> {
        deserializer.deserialize_map(ColumnsVisitor)
    }

    struct ColumnsVisitor;

    impl<'de> Visitor<'de> for ColumnsVisitor {
        type Value = [i64; 8];

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("QDCSum0..QDCSum7 columns")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut sums = [MISSING; 8];
            while let Some(key) = map.next_key::<String>()? {
                match COLUMNS.iter().position(|c| *c == key) {
                    Some(i) => sums[i] = map.next_value()?,
                    None => {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
            }
            Ok(sums)
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
