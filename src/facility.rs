//! Syslog facility and severity codes, and the name tables used to parse
//! them out of a configuration file.

/// A filter's facility field: either a concrete syslog facility code or the
/// `*` sentinel meaning "any facility matches".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facility {
    Any,
    Code(u8),
}

/// A filter's level field: either a concrete syslog severity code or the
/// `*` sentinel meaning "any severity matches".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Any,
    Code(u8),
}

pub const FACILITY_TABLE: &[(&str, u8)] = &[
    ("kern", 0),
    ("user", 1),
    ("mail", 2),
    ("daemon", 3),
    ("auth", 4),
    ("syslog", 5),
    ("lpr", 6),
    ("news", 7),
    ("uucp", 8),
    ("cron", 9),
    ("authpriv", 10),
    ("ftp", 11),
    ("local0", 16),
    ("local1", 17),
    ("local2", 18),
    ("local3", 19),
    ("local4", 20),
    ("local5", 21),
    ("local6", 22),
    ("local7", 23),
];

pub const LEVEL_TABLE: &[(&str, u8)] = &[
    ("emerg", 0),
    ("alert", 1),
    ("crit", 2),
    ("err", 3),
    ("warning", 4),
    ("notice", 5),
    ("info", 6),
    ("debug", 7),
];

/// Parse a bare facility token (`kern`, `local3`, `*`, ...).
pub fn parse_facility(token: &str) -> Option<Facility> {
    if token == "*" {
        return Some(Facility::Any);
    }
    FACILITY_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, code)| Facility::Code(*code))
}

/// Parse a bare level token (`err`, `warning`, `*`, ...).
pub fn parse_level(token: &str) -> Option<Level> {
    if token == "*" {
        return Some(Level::Any);
    }
    LEVEL_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, code)| Level::Code(*code))
}

/// Parse a `FlushLevel` value, which (unlike a rule's level filter) must
/// always name a concrete severity, never `*`.
pub fn parse_flush_level(token: &str) -> Option<u8> {
    LEVEL_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, code)| *code)
}

pub fn level_name(code: u8) -> &'static str {
    LEVEL_TABLE
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_facility() {
        assert_eq!(parse_facility("kern"), Some(Facility::Code(0)));
        assert_eq!(parse_facility("LOCAL7"), Some(Facility::Code(23)));
        assert_eq!(parse_facility("*"), Some(Facility::Any));
        assert_eq!(parse_facility("bogus"), None);
    }

    #[test]
    fn parses_named_level() {
        assert_eq!(parse_level("err"), Some(Level::Code(3)));
        assert_eq!(parse_level("*"), Some(Level::Any));
        assert_eq!(parse_flush_level("warning"), Some(4));
        assert_eq!(parse_flush_level("*"), None);
    }
}
