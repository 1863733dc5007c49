//! Small typed-token parsers shared by the config loader, in the same style
//! as the `hex_value`/`dec_value` combinators used to decode `/proc` text.

use std::io::{Error, ErrorKind, Result};

use combine::error::ParseError;
use combine::parser::char::{digit, letter};
use combine::{many, many1, Parser, Stream};

/// `MaxSize`/`BufferSize` grammar: digits followed by an optional
/// case-insensitive `K`/`KB`/`M`/`MB` unit suffix.
fn size_value<I>() -> impl Parser<Input = I, Output = (u64, String)>
where
    I: Stream<Item = char>,
    // Necessary due to rust-lang/rust#24159
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (many1::<String, _>(digit()), many::<String, _>(letter()))
        .map(|(digits, suffix): (String, String)| (digits.parse::<u64>().unwrap_or(0), suffix))
}

pub fn parse_size(s: &str) -> Result<u64> {
    match size_value().easy_parse(s) {
        Ok(((base, suffix), rest)) if rest.is_empty() => match suffix.to_uppercase().as_str() {
            "" => Ok(base),
            "K" | "KB" => Ok(base.saturating_mul(1024)),
            "M" | "MB" => Ok(base.saturating_mul(1024 * 1024)),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("unknown size suffix '{}' in '{}'", other, s),
            )),
        },
        Ok((_, rest)) => Err(Error::new(
            ErrorKind::InvalidData,
            format!("trailing garbage '{}' in size '{}'", rest, s),
        )),
        Err(parse_error) => Err(Error::new(
            ErrorKind::InvalidData,
            format!("invalid size '{}': {}", s, parse_error),
        )),
    }
}

pub fn clamp_max_size(value: u64) -> (u64, bool) {
    const MIN: u64 = 4 * 1024;
    const MAX: u64 = 64 * 1024 * 1024;
    if value < MIN {
        (MIN, true)
    } else if value > MAX {
        (MAX, true)
    } else {
        (value, false)
    }
}

pub fn clamp_rotations(value: i64) -> (u32, bool) {
    const MIN: i64 = 1;
    const MAX: i64 = 9;
    if value < MIN {
        (MIN as u32, true)
    } else if value > MAX {
        (MAX as u32, true)
    } else {
        (value as u32, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_digits() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
    }

    #[test]
    fn parses_kilo_and_mega_suffixes() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1m").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage_suffix() {
        assert!(parse_size("10Q").is_err());
    }

    #[test]
    fn clamps_max_size_bounds() {
        assert_eq!(clamp_max_size(10), (4 * 1024, true));
        assert_eq!(clamp_max_size(1024 * 1024 * 1024), (64 * 1024 * 1024, true));
        assert_eq!(clamp_max_size(1024 * 1024), (1024 * 1024, false));
    }

    #[test]
    fn clamps_rotations_bounds() {
        assert_eq!(clamp_rotations(0), (1, true));
        assert_eq!(clamp_rotations(20), (9, true));
        assert_eq!(clamp_rotations(3), (3, false));
    }
}
