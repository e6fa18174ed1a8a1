//! INI-like text codec for driver configurations
//!
//! The same grammar serves two purposes: diff comparison between a
//! freshly computed configuration and the on-disk file, and the file
//! format consumed by the device-polling drivers.
//!
//! Grammar, one line at a time:
//! - section header: `[name]`
//! - quoted assignment: `key = "value"`
//! - unquoted assignment: `key = value`
//!
//! Lines matching none of the three are skipped.

use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

use super::types::DeviceConfiguration;

static SECTION_RE: OnceLock<Regex> = OnceLock::new();
static QUOTED_RE: OnceLock<Regex> = OnceLock::new();
static UNQUOTED_RE: OnceLock<Regex> = OnceLock::new();

fn section_re() -> &'static Regex {
    SECTION_RE.get_or_init(|| Regex::new(r"^[ \t]*\[([0-9A-Za-z_-]+)\][ \t]*$").unwrap())
}

fn quoted_re() -> &'static Regex {
    QUOTED_RE.get_or_init(|| {
        Regex::new(r#"^[ \t]*([A-Za-z_][0-9A-Za-z_.-]*)[ \t]*=[ \t]*"([^"]*)"[ \t]*$"#).unwrap()
    })
}

fn unquoted_re() -> &'static Regex {
    UNQUOTED_RE.get_or_init(|| {
        Regex::new(r#"^[ \t]*([A-Za-z_][0-9A-Za-z_.-]*)[ \t]*=[ \t]*([^"\s].*?)[ \t]*$"#).unwrap()
    })
}

/// Serialize a configuration into its textual section form.
///
/// An empty `name` suppresses the section header. Attribute lines are
/// emitted in the configuration's iteration order.
pub fn serialize_config(name: &str, config: &DeviceConfiguration) -> String {
    let mut out = String::new();
    if !name.is_empty() {
        out.push('[');
        out.push_str(name);
        out.push_str("]\n");
    }
    for (key, value) in config.iter() {
        out.push_str(key);
        out.push_str(" = \"");
        out.push_str(value);
        out.push_str("\"\n");
    }
    out
}

/// Parse a configuration from its textual form.
///
/// Section headers are recognized but contribute no attribute; malformed
/// lines are skipped so a partially damaged file still yields every
/// readable attribute.
pub fn parse_config(text: &str) -> DeviceConfiguration {
    let mut config = DeviceConfiguration::new();
    for line in text.lines() {
        if section_re().is_match(line) {
            continue;
        }
        if let Some(caps) = quoted_re()
            .captures(line)
            .or_else(|| unquoted_re().captures(line))
        {
            config.set(&caps[1], &caps[2]);
        } else if !line.trim().is_empty() {
            trace!(line, "skipping unparsable configuration line");
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_with_header() {
        let config = DeviceConfiguration::from_pairs([
            ("community", "public"),
            ("driver", "snmp-ups"),
            ("port", "10.0.0.5"),
        ]);
        let text = serialize_config("ups-1", &config);
        assert_eq!(
            text,
            "[ups-1]\ncommunity = \"public\"\ndriver = \"snmp-ups\"\nport = \"10.0.0.5\"\n"
        );
    }

    #[test]
    fn test_serialize_without_header() {
        let config = DeviceConfiguration::from_pairs([("driver", "usbhid-ups")]);
        assert_eq!(serialize_config("", &config), "driver = \"usbhid-ups\"\n");
    }

    #[test]
    fn test_round_trip() {
        let config = DeviceConfiguration::from_pairs([
            ("driver", "snmp-ups"),
            ("port", "10.0.0.5"),
            ("community", "public"),
            ("desc", "rack A UPS"),
        ]);
        let parsed = parse_config(&serialize_config("ups-1", &config));
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_unquoted_values() {
        let parsed = parse_config("[ups-1]\ndriver = snmp-ups\nport=10.0.0.5\n");
        assert_eq!(parsed.get("driver"), Some("snmp-ups"));
        assert_eq!(parsed.get("port"), Some("10.0.0.5"));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let parsed = parse_config("driver = \"snmp-ups\"\n%%garbage%%\n= nokey\nport = \"x\"\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("driver"), Some("snmp-ups"));
        assert_eq!(parsed.get("port"), Some("x"));
    }

    #[test]
    fn test_parse_is_key_order_independent() {
        let a = parse_config("a = \"1\"\nb = \"2\"\n");
        let b = parse_config("b = \"2\"\na = \"1\"\n");
        assert_eq!(a, b);
    }
}
