//! Binary capture records.
//!
//! Streams pairs of samples to a host logger over a serial link. Each record
//! is 12 bytes:
//!
//! ```text
//! FF FF FF FF | timestamp_us: u32 LE | v1: u16 LE | v2: u16 LE
//! ```
//!
//! The receiver resynchronises on the start sequence, so records can be
//! dropped or cut without confusing it for longer than one record.

use core::fmt::Write as _;

pub const START_SEQ: [u8; 4] = [0xFF; 4];
pub const PAYLOAD_LEN: usize = 8;
pub const RECORD_LEN: usize = START_SEQ.len() + PAYLOAD_LEN;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleRecord {
    pub timestamp_us: u32,
    pub values: [u16; 2],
}

impl SampleRecord {
    pub fn new(timestamp_us: u32, v1: u16, v2: u16) -> Self {
        Self {
            timestamp_us,
            values: [v1, v2],
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..4].copy_from_slice(&START_SEQ);
        out[4..8].copy_from_slice(&self.timestamp_us.to_le_bytes());
        out[8..10].copy_from_slice(&self.values[0].to_le_bytes());
        out[10..12].copy_from_slice(&self.values[1].to_le_bytes());
        out
    }

    fn decode_payload(p: &[u8; PAYLOAD_LEN]) -> Self {
        Self {
            timestamp_us: u32::from_le_bytes([p[0], p[1], p[2], p[3]]),
            values: [
                u16::from_le_bytes([p[4], p[5]]),
                u16::from_le_bytes([p[6], p[7]]),
            ],
        }
    }

    /// `time,v1,v2`, as the host logger writes it.
    pub fn to_csv(&self) -> heapless::String<32> {
        let mut s = heapless::String::new();
        // 10 + 5 + 5 digits and two commas always fit
        let _ = write!(s, "{},{},{}", self.timestamp_us, self.values[0], self.values[1]);
        s
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// Number of start bytes matched so far
    Sync(usize),
    /// Number of payload bytes collected so far
    Payload(usize),
}

/// Byte-at-a-time record decoder for the receiving end.
#[derive(Debug)]
pub struct RecordScanner {
    state: ScanState,
    payload: [u8; PAYLOAD_LEN],
}

impl RecordScanner {
    pub const fn new() -> Self {
        Self {
            state: ScanState::Sync(0),
            payload: [0; PAYLOAD_LEN],
        }
    }

    /// Feed one byte. Returns a record when its last payload byte arrives.
    pub fn push(&mut self, byte: u8) -> Option<SampleRecord> {
        match self.state {
            ScanState::Sync(matched) => {
                if byte != START_SEQ[matched] {
                    self.state = ScanState::Sync(0);
                } else if matched + 1 == START_SEQ.len() {
                    self.state = ScanState::Payload(0);
                } else {
                    self.state = ScanState::Sync(matched + 1);
                }
                None
            }
            ScanState::Payload(filled) => {
                self.payload[filled] = byte;
                if filled + 1 < PAYLOAD_LEN {
                    self.state = ScanState::Payload(filled + 1);
                    return None;
                }
                self.state = ScanState::Sync(0);
                Some(SampleRecord::decode_payload(&self.payload))
            }
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self.state, ScanState::Payload(_))
    }
}

impl Default for RecordScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(bytes: &[u8]) -> std::vec::Vec<SampleRecord> {
        let mut scanner = RecordScanner::new();
        bytes.iter().filter_map(|&b| scanner.push(b)).collect()
    }

    #[test]
    fn encodes_little_endian_layout() {
        let bytes = SampleRecord::new(0x0102_0304, 0x0506, 0x0708).encode();
        assert_eq!(
            bytes,
            [0xFF, 0xFF, 0xFF, 0xFF, 0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07]
        );
    }

    #[test]
    fn scanner_skips_garbage_before_start() {
        let rec = SampleRecord::new(1_000_000, 512, 1023);
        let mut stream = std::vec![0x00, 0x12, 0xFF, 0xFF, 0x34];
        stream.extend_from_slice(&rec.encode());
        assert_eq!(scan(&stream), [rec]);
    }

    #[test]
    fn scanner_reads_back_to_back_records() {
        let a = SampleRecord::new(10, 1, 2);
        let b = SampleRecord::new(20, 3, 4);
        let mut stream = std::vec::Vec::new();
        stream.extend_from_slice(&a.encode());
        stream.extend_from_slice(&b.encode());
        assert_eq!(scan(&stream), [a, b]);
    }

    #[test]
    fn truncated_record_yields_nothing() {
        let bytes = SampleRecord::new(5, 6, 7).encode();
        let mut scanner = RecordScanner::new();
        for &b in &bytes[..RECORD_LEN - 1] {
            assert_eq!(scanner.push(b), None);
        }
        assert!(scanner.is_synced());
    }

    #[test]
    fn csv_matches_logger_format() {
        let rec = SampleRecord::new(123456, 7, 4095);
        assert_eq!(rec.to_csv().as_str(), "123456,7,4095");
    }
}
