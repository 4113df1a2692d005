//! NORAD modulo-10 line checksum.

use crate::tle::error::TleError;

pub const LINE_LENGTH: usize = 69;

/// Checksum over the first 68 characters: digits count their value, `-` counts
/// as 1, everything else as 0.
pub fn compute(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .take(LINE_LENGTH - 1)
        .map(|b| match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Validate the length, leading line number and trailing checksum digit.
pub fn validate_line(line: &str, line_number: u8) -> Result<(), TleError> {
    if !line.is_ascii() {
        return Err(TleError::malformed(line_number, "non-ASCII characters"));
    }
    if line.len() != LINE_LENGTH {
        return Err(TleError::malformed(
            line_number,
            format!("expected {} characters, got {}", LINE_LENGTH, line.len()),
        ));
    }
    let prefix = format!("{} ", line_number);
    if !line.starts_with(&prefix) {
        return Err(TleError::malformed(
            line_number,
            format!("line must start with {:?}", prefix),
        ));
    }

    let found = line.as_bytes()[LINE_LENGTH - 1] as char;
    let expected = compute(line);
    match found.to_digit(10) {
        Some(d) if d as u8 == expected => Ok(()),
        _ => Err(TleError::Checksum {
            line: line_number,
            expected,
            found,
        }),
    }
}

/// Replace the trailing checksum digit with the correct one.
pub fn with_checksum(line: &str) -> String {
    let body: String = line.chars().take(LINE_LENGTH - 1).collect();
    let digit = compute(&body);
    format!("{}{}", body, digit)
}
