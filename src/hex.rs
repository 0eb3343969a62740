use std::fmt;

/// Formats a byte slice as contiguous lowercase hex, for logging raw datagrams.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl<'a> fmt::Display for Hex<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parses a hex dump into bytes. Whitespace is ignored, so captured packets can be laid out one
/// field per line.
#[cfg(test)]
pub(crate) fn parse(s: &str) -> Vec<u8> {
    let digits = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    assert!(digits.is_ascii());
    assert_eq!(digits.len() % 2, 0, "odd number of hex digits");

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse("00abff"), &[0x00, 0xab, 0xff]);
        assert_eq!(parse("00 ab\n  ff"), &[0x00, 0xab, 0xff]);
    }

    #[test]
    fn display() {
        assert_eq!(Hex(&[0x01, 0xfe]).to_string(), "01fe");
        assert_eq!(Hex(&[]).to_string(), "");
    }
}
