use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use lazy_static::lazy_static;
use regex::Regex;
use crate::error::TraceError;

lazy_static! {
    // " M 0421c7f0,4", the leading space is only present for data accesses. Leading zeros are
    // dropped before the 16 digit limit applies
    static ref RECORD_PATTERN: Regex =
        Regex::new(r"^\s*(?P<kind>[ILSM])\s+(?:0[xX])?0*(?P<address>[0-9a-fA-F]{1,16})\s*,\s*(?P<size>\d+)\s*$")
            .expect("record pattern is valid");
}

/// The operation recorded on a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Instruction fetch, never simulated
    Instruction,
    Load,
    Store,
    /// A load immediately followed by a store to the same address
    Modify,
}

impl AccessKind {
    /// How many cache accesses a record of this kind stands for
    pub fn access_count(&self) -> usize {
        match self {
            AccessKind::Instruction => 0,
            AccessKind::Load | AccessKind::Store => 1,
            AccessKind::Modify => 2,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(AccessKind::Instruction),
            'L' => Some(AccessKind::Load),
            'S' => Some(AccessKind::Store),
            'M' => Some(AccessKind::Modify),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            AccessKind::Instruction => 'I',
            AccessKind::Load => 'L',
            AccessKind::Store => 'S',
            AccessKind::Modify => 'M',
        }
    }
}

/// One line of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub address: u64,
    /// Bytes accessed. Carried through for reporting only, blocks aren't modelled
    pub size: u32,
}

/// Returned by [`TraceRecord::from_str`], the reader attaches the line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRecordError;

impl fmt::Display for ParseRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected `<I|L|S|M> <hex address>,<size>`")
    }
}

impl std::error::Error for ParseRecordError {}

/// Parses a single record in the valgrind lackey format
///
/// # Examples
///
/// ```
/// use csimlib::trace::{AccessKind, TraceRecord};
/// let record: TraceRecord = " M 7ff000398,8".parse().unwrap();
/// assert_eq!(record.kind, AccessKind::Modify);
/// assert_eq!(record.address, 0x7ff000398);
/// assert_eq!(record.size, 8);
/// ```
impl FromStr for TraceRecord {
    type Err = ParseRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = RECORD_PATTERN.captures(s).ok_or(ParseRecordError)?;
        let kind = captures
            .name("kind")
            .and_then(|m| m.as_str().chars().next())
            .and_then(AccessKind::from_char)
            .ok_or(ParseRecordError)?;
        let address = captures
            .name("address")
            .and_then(|m| u64::from_str_radix(m.as_str(), 16).ok())
            .ok_or(ParseRecordError)?;
        let size = captures
            .name("size")
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or(ParseRecordError)?;
        Ok(TraceRecord { kind, address, size })
    }
}

/// Same layout as the input, without the leading space: `L 10,1`
impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:x},{}", self.kind.as_char(), self.address, self.size)
    }
}

/// Iterates over the records of a trace, skipping blank lines
///
/// Iteration stops after the first error
pub struct TraceReader<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line: usize,
    failed: bool,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line: 0,
            failed: false,
        }
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(TraceError::Io(e)));
                }
            }
            self.line += 1;
            // Invalid UTF-8 is just another malformed line
            let parsed = match std::str::from_utf8(&self.buffer) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => text.parse::<TraceRecord>().ok(),
                Err(_) => None,
            };
            return Some(parsed.ok_or_else(|| {
                self.failed = true;
                TraceError::Malformed {
                    line: self.line,
                    content: String::from_utf8_lossy(&self.buffer).trim_end().to_string(),
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: AccessKind, address: u64, size: u32) -> TraceRecord {
        TraceRecord { kind, address, size }
    }

    #[test]
    fn parses_every_kind() {
        assert_eq!("I 0400d7d4,8".parse::<TraceRecord>(), Ok(record(AccessKind::Instruction, 0x0400d7d4, 8)));
        assert_eq!(" L 10,1".parse::<TraceRecord>(), Ok(record(AccessKind::Load, 0x10, 1)));
        assert_eq!(" S 18,4".parse::<TraceRecord>(), Ok(record(AccessKind::Store, 0x18, 4)));
        assert_eq!(" M 0421c7f0,4".parse::<TraceRecord>(), Ok(record(AccessKind::Modify, 0x0421c7f0, 4)));
    }

    #[test]
    fn tolerates_spacing_and_prefix() {
        assert_eq!("\tL   0x7FF0,  16\r\n".parse::<TraceRecord>(), Ok(record(AccessKind::Load, 0x7ff0, 16)));
    }

    #[test]
    fn rejects_garbage() {
        for line in ["", "X 10,1", "L 10", "L zz,1", "L 10,-1", "L 10,1 extra", "L 11112222333344445,1"] {
            assert_eq!(line.parse::<TraceRecord>(), Err(ParseRecordError), "{line:?}");
        }
    }

    #[test]
    fn zero_padding_does_not_count_towards_the_digit_limit() {
        assert_eq!(
            " L 00000000000000000000ffffffffffffffff,4".parse::<TraceRecord>(),
            Ok(record(AccessKind::Load, u64::MAX, 4))
        );
        assert_eq!(" S 0x000000000000000000010,1".parse::<TraceRecord>(), Ok(record(AccessKind::Store, 0x10, 1)));
        assert_eq!(" L 0,1".parse::<TraceRecord>(), Ok(record(AccessKind::Load, 0, 1)));
        assert_eq!(" L 000,1".parse::<TraceRecord>(), Ok(record(AccessKind::Load, 0, 1)));
    }

    #[test]
    fn displays_without_padding() {
        assert_eq!(record(AccessKind::Modify, 0x20, 1).to_string(), "M 20,1");
        assert_eq!(record(AccessKind::Instruction, 0x400d7d4, 8).to_string(), "I 400d7d4,8");
    }

    #[test]
    fn access_counts() {
        assert_eq!(AccessKind::Instruction.access_count(), 0);
        assert_eq!(AccessKind::Load.access_count(), 1);
        assert_eq!(AccessKind::Store.access_count(), 1);
        assert_eq!(AccessKind::Modify.access_count(), 2);
    }

    #[test]
    fn reader_skips_blank_lines() {
        let input = "I 0400d7d4,8\n\n L 10,1\n   \n M 20,1\n";
        let records: Vec<_> = TraceReader::new(input.as_bytes()).collect::<Result<_, _>>().unwrap();
        assert_eq!(
            records,
            vec![
                record(AccessKind::Instruction, 0x0400d7d4, 8),
                record(AccessKind::Load, 0x10, 1),
                record(AccessKind::Modify, 0x20, 1),
            ]
        );
    }

    #[test]
    fn reader_reports_the_malformed_line() {
        let input = " L 10,1\n\n L what,1\n L 20,1\n";
        let mut reader = TraceReader::new(input.as_bytes());
        assert!(matches!(reader.next(), Some(Ok(_))));
        match reader.next() {
            Some(Err(TraceError::Malformed { line, content })) => {
                assert_eq!(line, 3);
                assert_eq!(content, " L what,1");
            }
            other => panic!("expected a malformed record, got {other:?}"),
        }
        assert!(reader.next().is_none());
        assert_eq!(reader.line_number(), 3);
    }

    #[test]
    fn reader_reports_invalid_utf8_as_malformed() {
        let input: &[u8] = b" L 0,1\n L \xff\xfe,1\n L 4,1\n";
        let mut reader = TraceReader::new(input);
        assert!(matches!(reader.next(), Some(Ok(_))));
        match reader.next() {
            Some(Err(TraceError::Malformed { line, content })) => {
                assert_eq!(line, 2);
                assert_eq!(content, " L \u{fffd}\u{fffd},1");
            }
            other => panic!("expected a malformed record, got {other:?}"),
        }
        assert!(reader.next().is_none());
        assert_eq!(reader.line_number(), 2);
    }
}
