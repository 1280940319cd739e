//! Package identity parsers: APK tools, Info.plist and PID lookup output
//!
//! All parsers return `None` on unrecognised input so callers can try the
//! next strategy.

use std::sync::LazyLock;

use regex::Regex;

static AAPT_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"package:\s*name='([^']+)'").expect("Invalid aapt package regex")
});

static AAPT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^application-label:'([^']*)'").expect("Invalid aapt label regex")
});

/// `apkanalyzer manifest application-id`: the first line, trimmed
pub fn parse_apkanalyzer_package(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

/// `aapt dump badging`: the quoted `name` following `package:`
pub fn parse_aapt_package(output: &str) -> Option<String> {
    AAPT_PACKAGE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `aapt dump badging`: the default `application-label`
pub fn parse_aapt_label(output: &str) -> Option<String> {
    AAPT_LABEL
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

/// `pidof` output: the first whitespace-separated token
///
/// Some apps report several PIDs; the first is the main process.
pub fn parse_primary_pid(output: &str) -> Option<String> {
    output.split_whitespace().next().map(str::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Info.plist
// ─────────────────────────────────────────────────────────────────────────────

/// Keys read from an app's Info.plist
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlistInfo {
    pub bundle_identifier: Option<String>,
    pub executable: Option<String>,
    pub display_name: Option<String>,
    pub bundle_name: Option<String>,
}

impl PlistInfo {
    /// `CFBundleDisplayName`, else `CFBundleName`
    pub fn represented_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.bundle_name.as_deref())
    }
}

const KEY_IDENTIFIER: &str = "CFBundleIdentifier";
const KEY_EXECUTABLE: &str = "CFBundleExecutable";
const KEY_DISPLAY_NAME: &str = "CFBundleDisplayName";
const KEY_BUNDLE_NAME: &str = "CFBundleName";

/// Whether the bytes look like an XML property list (binary plists start with `bplist`)
pub fn is_xml_plist(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(64)];
    let head = String::from_utf8_lossy(head);
    head.trim_start_matches('\u{feff}').trim_start().starts_with("<?xml")
        || head.contains("<plist")
}

/// Read the string values of the bundle keys from an XML plist
pub fn parse_xml_plist(xml: &str) -> PlistInfo {
    PlistInfo {
        bundle_identifier: xml_string_value(xml, KEY_IDENTIFIER),
        executable: xml_string_value(xml, KEY_EXECUTABLE),
        display_name: xml_string_value(xml, KEY_DISPLAY_NAME),
        bundle_name: xml_string_value(xml, KEY_BUNDLE_NAME),
    }
}

fn xml_string_value(xml: &str, key: &str) -> Option<String> {
    let pattern = format!(
        r"<key>\s*{}\s*</key>\s*<string>([^<]*)</string>",
        regex::escape(key)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
        .filter(|value| !value.is_empty())
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Read the bundle keys from `plutil -convert json` output
pub fn parse_json_plist(json: &str) -> Option<PlistInfo> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let object = value.as_object()?;
    let get = |key: &str| {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };
    Some(PlistInfo {
        bundle_identifier: get(KEY_IDENTIFIER),
        executable: get(KEY_EXECUTABLE),
        display_name: get(KEY_DISPLAY_NAME),
        bundle_name: get(KEY_BUNDLE_NAME),
    })
}
