//! Pixie16 list-mode header layouts
//!
//! Every event starts with a 4-word header, optionally followed by energy
//! sums (4 words), QDC sums (8 words) and an external timestamp (2 words).
//! The header length field in the first word says which of these groups
//! are present, so the layout is selected per event.
//!
//! Fields are listed most significant bit first within each word, after the
//! word has been byte-swapped (see `words::byteswap_words`).
//!
//! ```text
//! word 0: pileup:1 | event length:14 | header length:5 | crate:4 | slot:4 | channel:4
//! word 1: EVTTIME_LO:32
//! word 2: CFD trigger source:3 | CFD fractional time:13 | EVTTIME_HI:16
//! word 3: trace flag:1 | trace length:15 | energy:16
//! ```

use crate::common::{DecodeError, DecodeResult, WORD_SIZE};

/// A named field of the list-mode header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Pileup,
    EventLength,
    HeaderLength,
    Crate,
    Slot,
    Channel,
    EvtTimeLo,
    CfdTriggerSourceBits,
    CfdFractionalTime,
    EvtTimeHi,
    TraceFlag,
    TraceLength,
    Energy,
    EsumTrailing,
    EsumLeading,
    EsumGap,
    /// IEEE 754 single precision, stored bit-for-bit
    Baseline,
    QdcSum(usize),
    ExtTsLo,
    ExtTsHi,
    /// Unused bits, skipped on read and zeroed on write
    Padding,
}

/// Bit width and meaning of one header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub bits: u32,
    pub field: Field,
}

const fn spec(bits: u32, field: Field) -> FieldSpec {
    FieldSpec { bits, field }
}

/// First word only: enough to learn the header and event lengths
pub const FIRST_ROW: &[FieldSpec] = &[
    spec(1, Field::Pileup),
    spec(14, Field::EventLength),
    spec(5, Field::HeaderLength),
    spec(4, Field::Crate),
    spec(4, Field::Slot),
    spec(4, Field::Channel),
];

/// Mandatory 4-word header
pub const HEADER: &[FieldSpec] = &[
    spec(1, Field::Pileup),
    spec(14, Field::EventLength),
    spec(5, Field::HeaderLength),
    spec(4, Field::Crate),
    spec(4, Field::Slot),
    spec(4, Field::Channel),
    spec(32, Field::EvtTimeLo),
    spec(3, Field::CfdTriggerSourceBits),
    spec(13, Field::CfdFractionalTime),
    spec(16, Field::EvtTimeHi),
    spec(1, Field::TraceFlag),
    spec(15, Field::TraceLength),
    spec(16, Field::Energy),
];

/// Energy sums and baseline (4 words)
pub const ENERGY: &[FieldSpec] = &[
    spec(32, Field::EsumTrailing),
    spec(32, Field::EsumLeading),
    spec(32, Field::EsumGap),
    spec(32, Field::Baseline),
];

/// QDC sums (8 words)
pub const QSUMS: &[FieldSpec] = &[
    spec(32, Field::QdcSum(0)),
    spec(32, Field::QdcSum(1)),
    spec(32, Field::QdcSum(2)),
    spec(32, Field::QdcSum(3)),
    spec(32, Field::QdcSum(4)),
    spec(32, Field::QdcSum(5)),
    spec(32, Field::QdcSum(6)),
    spec(32, Field::QdcSum(7)),
];

/// External timestamp (2 words)
pub const EXT_TIME: &[FieldSpec] = &[
    spec(32, Field::ExtTsLo),
    spec(16, Field::Padding),
    spec(16, Field::ExtTsHi),
];

/// Supported header layouts, one per valid header length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderVariant {
    /// 4 words
    Basic,
    /// 6 words
    ExtTime,
    /// 8 words
    EnergySums,
    /// 10 words
    EnergySumsExtTime,
    /// 12 words
    QdcSums,
    /// 14 words
    QdcSumsExtTime,
    /// 16 words
    EnergyQdcSums,
    /// 18 words
    EnergyQdcSumsExtTime,
}

impl HeaderVariant {
    pub const ALL: [HeaderVariant; 8] = [
        HeaderVariant::Basic,
        HeaderVariant::ExtTime,
        HeaderVariant::EnergySums,
        HeaderVariant::EnergySumsExtTime,
        HeaderVariant::QdcSums,
        HeaderVariant::QdcSumsExtTime,
        HeaderVariant::EnergyQdcSums,
        HeaderVariant::EnergyQdcSumsExtTime,
    ];

    /// Look up the layout for a header length in words
    pub fn from_header_length(words: u32) -> Option<Self> {
        match words {
            4 => Some(Self::Basic),
            6 => Some(Self::ExtTime),
            8 => Some(Self::EnergySums),
            10 => Some(Self::EnergySumsExtTime),
            12 => Some(Self::QdcSums),
            14 => Some(Self::QdcSumsExtTime),
            16 => Some(Self::EnergyQdcSums),
            18 => Some(Self::EnergyQdcSumsExtTime),
            _ => None,
        }
    }

    /// Header length in words
    pub fn header_length(self) -> u32 {
        match self {
            Self::Basic => 4,
            Self::ExtTime => 6,
            Self::EnergySums => 8,
            Self::EnergySumsExtTime => 10,
            Self::QdcSums => 12,
            Self::QdcSumsExtTime => 14,
            Self::EnergyQdcSums => 16,
            Self::EnergyQdcSumsExtTime => 18,
        }
    }

    /// Field groups in wire order
    pub fn groups(self) -> &'static [&'static [FieldSpec]] {
        match self {
            Self::Basic => &[HEADER],
            Self::ExtTime => &[HEADER, EXT_TIME],
            Self::EnergySums => &[HEADER, ENERGY],
            Self::EnergySumsExtTime => &[HEADER, ENERGY, EXT_TIME],
            Self::QdcSums => &[HEADER, QSUMS],
            Self::QdcSumsExtTime => &[HEADER, QSUMS, EXT_TIME],
            Self::EnergyQdcSums => &[HEADER, ENERGY, QSUMS],
            Self::EnergyQdcSumsExtTime => &[HEADER, ENERGY, QSUMS, EXT_TIME],
        }
    }

    pub fn has_energy_sums(self) -> bool {
        self.groups().contains(&ENERGY)
    }

    pub fn has_qdc_sums(self) -> bool {
        self.groups().contains(&QSUMS)
    }

    pub fn has_ext_time(self) -> bool {
        self.groups().contains(&EXT_TIME)
    }

    /// Total width of the composed layout in bits
    pub fn bit_width(self) -> u32 {
        layout_bits(self.groups())
    }
}

/// Energy sum block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergySums {
    pub trailing: u32,
    pub leading: u32,
    pub gap: u32,
    pub baseline: f32,
}

/// External timestamp block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtTime {
    pub lo: u32,
    pub hi: u16,
}

/// Raw header values as unpacked from the wire
///
/// Optional groups are `None` when the layout did not contain them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    pub pileup: bool,
    pub event_length: u32,
    pub header_length: u32,
    pub crate_id: u8,
    pub slot: u8,
    pub channel: u8,
    pub evttime_lo: u32,
    pub cfd_trigger_source_bits: u8,
    pub cfd_fractional_time: u16,
    pub evttime_hi: u16,
    pub trace_flag: u8,
    pub trace_length: u16,
    pub energy: u16,
    pub energy_sums: Option<EnergySums>,
    pub qdc_sums: Option<[u32; 8]>,
    pub ext_time: Option<ExtTime>,
}

impl HeaderFields {
    // Values arrive already masked to the field width, so the narrowing
    // casts below never truncate.
    fn set(&mut self, field: Field, value: u32) {
        match field {
            Field::Pileup => self.pileup = value != 0,
            Field::EventLength => self.event_length = value,
            Field::HeaderLength => self.header_length = value,
            Field::Crate => self.crate_id = value as u8,
            Field::Slot => self.slot = value as u8,
            Field::Channel => self.channel = value as u8,
            Field::EvtTimeLo => self.evttime_lo = value,
            Field::CfdTriggerSourceBits => self.cfd_trigger_source_bits = value as u8,
            Field::CfdFractionalTime => self.cfd_fractional_time = value as u16,
            Field::EvtTimeHi => self.evttime_hi = value as u16,
            Field::TraceFlag => self.trace_flag = value as u8,
            Field::TraceLength => self.trace_length = value as u16,
            Field::Energy => self.energy = value as u16,
            Field::EsumTrailing => self.energy_sums.get_or_insert_with(Default::default).trailing = value,
            Field::EsumLeading => self.energy_sums.get_or_insert_with(Default::default).leading = value,
            Field::EsumGap => self.energy_sums.get_or_insert_with(Default::default).gap = value,
            Field::Baseline => {
                self.energy_sums.get_or_insert_with(Default::default).baseline = f32::from_bits(value)
            }
            Field::QdcSum(i) => self.qdc_sums.get_or_insert([0; 8])[i] = value,
            Field::ExtTsLo => self.ext_time.get_or_insert_with(Default::default).lo = value,
            Field::ExtTsHi => self.ext_time.get_or_insert_with(Default::default).hi = value as u16,
            Field::Padding => {}
        }
    }

    fn get(&self, field: Field) -> u32 {
        let sums = self.energy_sums.unwrap_or_default();
        let ext = self.ext_time.unwrap_or_default();
        match field {
            Field::Pileup => u32::from(self.pileup),
            Field::EventLength => self.event_length,
            Field::HeaderLength => self.header_length,
            Field::Crate => u32::from(self.crate_id),
            Field::Slot => u32::from(self.slot),
            Field::Channel => u32::from(self.channel),
            Field::EvtTimeLo => self.evttime_lo,
            Field::CfdTriggerSourceBits => u32::from(self.cfd_trigger_source_bits),
            Field::CfdFractionalTime => u32::from(self.cfd_fractional_time),
            Field::EvtTimeHi => u32::from(self.evttime_hi),
            Field::TraceFlag => u32::from(self.trace_flag),
            Field::TraceLength => u32::from(self.trace_length),
            Field::Energy => u32::from(self.energy),
            Field::EsumTrailing => sums.trailing,
            Field::EsumLeading => sums.leading,
            Field::EsumGap => sums.gap,
            Field::Baseline => sums.baseline.to_bits(),
            Field::QdcSum(i) => self.qdc_sums.map_or(0, |q| q[i]),
            Field::ExtTsLo => ext.lo,
            Field::ExtTsHi => u32::from(ext.hi),
            Field::Padding => 0,
        }
    }
}

/// Total width of a sequence of field groups in bits
pub fn layout_bits(groups: &[&[FieldSpec]]) -> u32 {
    groups.iter().flat_map(|g| g.iter()).map(|f| f.bits).sum()
}

/// MSB-first reader over byte-swapped words
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn word(&self, index: usize) -> u32 {
        let offset = index * WORD_SIZE;
        u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Read `bits` (at most 32) bits; may straddle a word boundary
    fn take(&mut self, bits: u32) -> u32 {
        let mut value: u64 = 0;
        let mut remaining = bits;
        while remaining > 0 {
            let word = u64::from(self.word(self.pos / 32));
            let offset = (self.pos % 32) as u32;
            let n = remaining.min(32 - offset);
            let chunk = (word >> (32 - offset - n)) & ((1u64 << n) - 1);
            value = (value << n) | chunk;
            self.pos += n as usize;
            remaining -= n;
        }
        value as u32
    }
}

/// MSB-first writer producing byte-swapped words
struct BitWriter {
    words: Vec<u32>,
    pos: usize,
}

impl BitWriter {
    fn with_bits(bits: u32) -> Self {
        Self {
            words: vec![0; (bits as usize).div_ceil(32)],
            pos: 0,
        }
    }

    fn put(&mut self, bits: u32, value: u32) {
        let mut remaining = bits;
        while remaining > 0 {
            let offset = (self.pos % 32) as u32;
            let n = remaining.min(32 - offset);
            let chunk = (u64::from(value) >> (remaining - n)) & ((1u64 << n) - 1);
            self.words[self.pos / 32] |= (chunk << (32 - offset - n)) as u32;
            self.pos += n as usize;
            remaining -= n;
        }
    }
}

/// Unpack byte-swapped words into header fields following `groups`
pub fn unpack(data: &[u8], groups: &[&[FieldSpec]]) -> DecodeResult<HeaderFields> {
    let needed = (layout_bits(groups) as usize).div_ceil(32) * WORD_SIZE;
    if data.len() < needed {
        return Err(DecodeError::insufficient(needed, data.len()));
    }

    let mut reader = BitReader::new(data);
    let mut fields = HeaderFields::default();
    for spec in groups.iter().flat_map(|g| g.iter()) {
        let value = reader.take(spec.bits);
        fields.set(spec.field, value);
    }
    Ok(fields)
}

/// Unpack only the first word
pub fn unpack_first_row(data: &[u8]) -> DecodeResult<HeaderFields> {
    unpack(data, &[FIRST_ROW])
}

/// Pack header fields into wire-order (Little Endian) words following `groups`
///
/// Values wider than their field are truncated to the field width.
pub fn pack(fields: &HeaderFields, groups: &[&[FieldSpec]]) -> Vec<u8> {
    let mut writer = BitWriter::with_bits(layout_bits(groups));
    for spec in groups.iter().flat_map(|g| g.iter()) {
        let mask = if spec.bits >= 32 {
            u32::MAX
        } else {
            (1u32 << spec.bits) - 1
        };
        writer.put(spec.bits, fields.get(spec.field) & mask);
    }
    writer
        .words
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::decoder::words::byteswap_words;

    #[test]
    fn test_layout_width_matches_header_length() {
        for variant in HeaderVariant::ALL {
            assert_eq!(
                variant.bit_width(),
                variant.header_length() * 32,
                "{:?}",
                variant
            );
        }
    }

    #[test]
    fn test_group_widths() {
        assert_eq!(layout_bits(&[FIRST_ROW]), 32);
        assert_eq!(layout_bits(&[HEADER]), 4 * 32);
        assert_eq!(layout_bits(&[ENERGY]), 4 * 32);
        assert_eq!(layout_bits(&[QSUMS]), 8 * 32);
        assert_eq!(layout_bits(&[EXT_TIME]), 2 * 32);
    }

    #[test]
    fn test_header_starts_with_first_row() {
        assert_eq!(&HEADER[..FIRST_ROW.len()], FIRST_ROW);
    }

    #[test]
    fn test_header_length_lookup_roundtrip() {
        for variant in HeaderVariant::ALL {
            assert_eq!(
                HeaderVariant::from_header_length(variant.header_length()),
                Some(variant)
            );
        }
        for invalid in [0, 1, 2, 3, 5, 7, 9, 11, 13, 15, 17, 19, 20, 31] {
            assert_eq!(HeaderVariant::from_header_length(invalid), None);
        }
    }

    #[test]
    fn test_variant_groups() {
        assert!(!HeaderVariant::Basic.has_energy_sums());
        assert!(!HeaderVariant::Basic.has_qdc_sums());
        assert!(!HeaderVariant::Basic.has_ext_time());

        assert!(HeaderVariant::ExtTime.has_ext_time());
        assert!(HeaderVariant::EnergySumsExtTime.has_energy_sums());
        assert!(HeaderVariant::QdcSumsExtTime.has_qdc_sums());
        assert!(!HeaderVariant::EnergyQdcSums.has_ext_time());

        let full = HeaderVariant::EnergyQdcSumsExtTime;
        assert!(full.has_energy_sums() && full.has_qdc_sums() && full.has_ext_time());
    }

    #[test]
    fn test_first_row_bit_positions() {
        // pileup=1, event length=4, header length=4, crate=1, slot=2, channel=3
        let word: u32 = (1 << 31) | (4 << 17) | (4 << 12) | (1 << 8) | (2 << 4) | 3;
        let fields = unpack_first_row(&word.to_be_bytes()).unwrap();
        assert!(fields.pileup);
        assert_eq!(fields.event_length, 4);
        assert_eq!(fields.header_length, 4);
        assert_eq!(fields.crate_id, 1);
        assert_eq!(fields.slot, 2);
        assert_eq!(fields.channel, 3);
        assert!(fields.energy_sums.is_none());
    }

    #[test]
    fn test_header_word_fields() {
        let words: [u32; 4] = [
            (6 << 17) | (4 << 12) | 5,
            0xDEAD_BEEF,
            (3 << 29) | (4096 << 16) | 0x1234,
            (1 << 31) | (4 << 16) | 42,
        ];
        let data: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let fields = unpack(&data, HeaderVariant::Basic.groups()).unwrap();
        assert_eq!(fields.event_length, 6);
        assert_eq!(fields.channel, 5);
        assert_eq!(fields.evttime_lo, 0xDEAD_BEEF);
        assert_eq!(fields.cfd_trigger_source_bits, 3);
        assert_eq!(fields.cfd_fractional_time, 4096);
        assert_eq!(fields.evttime_hi, 0x1234);
        assert_eq!(fields.trace_flag, 1);
        assert_eq!(fields.trace_length, 4);
        assert_eq!(fields.energy, 42);
    }

    #[test]
    fn test_ext_time_skips_padding() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&0x0102_0304u32.to_be_bytes());
        data.extend_from_slice(&0xFFFF_00ABu32.to_be_bytes());
        let fields = unpack(&data, HeaderVariant::ExtTime.groups()).unwrap();
        let ext = fields.ext_time.unwrap();
        assert_eq!(ext.lo, 0x0102_0304);
        assert_eq!(ext.hi, 0x00AB);
    }

    #[test]
    fn test_baseline_is_ieee_float() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&10u32.to_be_bytes());
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend_from_slice(&30u32.to_be_bytes());
        data.extend_from_slice(&(-12.5f32).to_bits().to_be_bytes());
        let fields = unpack(&data, HeaderVariant::EnergySums.groups()).unwrap();
        let sums = fields.energy_sums.unwrap();
        assert_eq!(sums.trailing, 10);
        assert_eq!(sums.leading, 20);
        assert_eq!(sums.gap, 30);
        assert_eq!(sums.baseline, -12.5);
    }

    #[test]
    fn test_unpack_short_data_is_insufficient() {
        let err = unpack(&[0u8; 8], HeaderVariant::Basic.groups()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InsufficientData {
                requested_bytes: 16,
                available_bytes: 8
            }
        );
    }

    #[test]
    fn test_bit_reader_straddles_words() {
        let data = [0x00, 0x00, 0x00, 0x0F, 0xF0, 0x00, 0x00, 0x00];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.take(28), 0);
        assert_eq!(reader.take(8), 0xFF);
    }

    #[test]
    fn test_pack_then_unpack_all_variants() {
        for variant in HeaderVariant::ALL {
            let mut fields = HeaderFields {
                pileup: true,
                event_length: variant.header_length() + 3,
                header_length: variant.header_length(),
                crate_id: 7,
                slot: 12,
                channel: 15,
                evttime_lo: 0x8000_0001,
                cfd_trigger_source_bits: 6,
                cfd_fractional_time: 8191,
                evttime_hi: 0xFFFF,
                trace_flag: 1,
                trace_length: 6,
                energy: 65535,
                ..Default::default()
            };
            if variant.has_energy_sums() {
                fields.energy_sums = Some(EnergySums {
                    trailing: 1,
                    leading: 2,
                    gap: 3,
                    baseline: 1.5,
                });
            }
            if variant.has_qdc_sums() {
                fields.qdc_sums = Some([10, 11, 12, 13, 14, 15, 16, u32::MAX]);
            }
            if variant.has_ext_time() {
                fields.ext_time = Some(ExtTime { lo: 99, hi: 0xBEEF });
            }

            let wire = pack(&fields, variant.groups());
            assert_eq!(wire.len(), variant.header_length() as usize * WORD_SIZE);
            let decoded = unpack(&byteswap_words(&wire), variant.groups()).unwrap();
            assert_eq!(decoded, fields, "{:?}", variant);
        }
    }
}
