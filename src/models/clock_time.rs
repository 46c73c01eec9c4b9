//! `"HH:MM"` serde format for wall-clock times.
//!
//! Used with `#[serde(with = "crate::models::clock_time")]`. Parsing also
//! accepts `"HH:MM:SS"` so payloads produced by other tools load cleanly.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%H:%M";

/// Formats a time as `HH:MM`.
pub fn format(time: &NaiveTime) -> String {
    time.format(FORMAT).to_string()
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid time '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        let t = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        assert_eq!(parse("19:00"), Some(t));
        assert_eq!(parse(" 19:00:00 "), Some(t));
        assert_eq!(parse("7pm"), None);
        assert_eq!(format(&t), "19:00");
    }
}
