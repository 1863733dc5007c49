//! Line formatting, conceptually owned by the receiver (see spec §4.4):
//! `<timestamp> <host> <program>[<pid>]: <message>`, RFC 3339 UTC with
//! microsecond precision. The core only ever sees the resulting bytes.

use chrono::{DateTime, SecondsFormat, Utc};

pub fn format_line(now: DateTime<Utc>, host: &str, program: &str, pid: u32, message: &str) -> Vec<u8> {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    format!("{} {} {}[{}]: {}", timestamp, host, program, pid, message).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_rfc3339_microsecond_line() {
        let ts = Utc.ymd(2026, 7, 31).and_hms_micro(12, 0, 0, 500_000);
        let line = format_line(ts, "myhost", "myprog", 42, "hello world");
        let text = String::from_utf8(line).unwrap();
        assert_eq!(text, "2026-07-31T12:00:00.500000Z myhost myprog[42]: hello world");
    }
}
