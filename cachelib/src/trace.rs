use std::io::{BufRead, Lines};
use crate::error::{SimError, TraceFormatError};

/// Whether a trace record reads or writes memory. The caches treat both the same
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// One memory access from a trace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Access {
    pub address: u64,
    /// Size of the access in bytes, always positive
    pub size: u64,
    pub mode: AccessMode,
}

/// Parses one trace record
///
/// A record is four whitespace separated fields: the program counter, the address in hexadecimal,
/// `R` or `W`, and the size in decimal bytes. Only the address, mode, and size are kept. Blank
/// lines parse to `None`
///
/// # Examples
///
/// ```
/// use cachelib::trace::{parse_record, Access, AccessMode};
/// let access = parse_record("0000000000401000 00007ffd3c8e9a48 W 008", 1).unwrap();
/// assert_eq!(access, Some(Access { address: 0x7ffd3c8e9a48, size: 8, mode: AccessMode::Write }));
/// ```
pub fn parse_record(text: &str, line: usize) -> Result<Option<Access>, TraceFormatError> {
    let error = |reason| TraceFormatError {
        line,
        text: text.to_string(),
        reason,
    };
    let mut fields = text.split_whitespace();
    let Some(_program_counter) = fields.next() else {
        return Ok(None);
    };
    let (Some(address), Some(mode), Some(size)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(error("expected a program counter, address, mode, and size"));
    };
    let address = address.strip_prefix("0x").unwrap_or(address);
    let address = u64::from_str_radix(address, 16).map_err(|_| error("address is not hexadecimal"))?;
    let mode = match mode {
        "R" | "r" => AccessMode::Read,
        "W" | "w" => AccessMode::Write,
        _ => return Err(error("mode must be R or W")),
    };
    let size: u64 = size.parse().map_err(|_| error("size is not a decimal integer"))?;
    if size == 0 {
        return Err(error("size must be positive"));
    }
    Ok(Some(Access { address, size, mode }))
}

/// Iterator over the accesses in a trace, skipping blank lines
///
/// Reads are strictly sequential
pub struct TraceReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Access, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            match parse_record(&text, self.line) {
                Ok(Some(access)) => return Some(Ok(access)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
