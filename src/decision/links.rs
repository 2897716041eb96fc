//! Part number to purchase link lookup.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::LinkTableError;

/// Maps a part number to a purchase URL.
pub trait PartLinkResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, part_number: &str) -> Option<String>;
}

const BUILTIN_LINKS: &[(&str, &str)] = &[
    // Halogen H-series
    ("H1", "https://www.xenon.bg/product/led-krushki-h1-raytech-turbo-130w-6000k"),
    ("H3", "https://www.xenon.bg/product/led-krushki-h3-raytech-90w-6000k-canbus"),
    ("H4", "https://www.xenon.bg/product/led-krushki-h4-raytech-90w-6000k"),
    ("H7", "https://www.xenon.bg/product/led-krushki-h7-raytech-turbo-130w-6000k"),
    ("H8", "https://www.xenon.bg/product/led-krushki-h8-raytech-turbo-130w-6000k-1"),
    ("H9", "https://www.xenon.bg/product/led-krushki-h9-raytech-turbo-130w-6000k-1"),
    ("H11", "https://www.xenon.bg/product/led-krushki-h11-raytech-turbo-130w-6000k"),
    ("H16", "https://www.xenon.bg/product/led-krushki-h16-raytech-turbo-130w-6000k-1"),
    // HB series, combined codes and single-code aliases
    ("HB3/9005", "https://www.xenon.bg/product/led-krushki-hb3-raytech-turbo-130w-6000k"),
    ("HB4/9006", "https://www.xenon.bg/product/led-krushki-hb4-raytech-turbo-130w-6000k"),
    ("HB3", "https://www.xenon.bg/product/led-krushki-hb3-raytech-turbo-130w-6000k"),
    ("9005", "https://www.xenon.bg/product/led-krushki-hb3-raytech-turbo-130w-6000k"),
    ("HB4", "https://www.xenon.bg/product/led-krushki-hb4-raytech-turbo-130w-6000k"),
    ("9006", "https://www.xenon.bg/product/led-krushki-hb4-raytech-turbo-130w-6000k"),
    // D-series
    ("D1S", "https://www.xenon.bg/product/led-krushki-d1s-raytech-70w-5500k"),
    ("D2S", "https://www.xenon.bg/product/led-krushki-d2s-raytech-70w-5500k-canbus"),
    ("D3S", "https://www.xenon.bg/product/led-krushki-d3s-raytech-70w-5500k"),
    ("D4S", "https://www.xenon.bg/product/led-krushki-d4s-raytech-70w-5500k"),
    ("D5S", "https://www.xenon.bg/product/led-krushki-d5s-raytech-50w-5500k"),
    ("D8S", "https://www.xenon.bg/product/led-krushki-d8s-raytech-50w-5500k"),
];

/// Uppercase with all whitespace removed: `" hb3 / 9005"` becomes `"HB3/9005"`.
pub fn normalize_part_key(part_number: &str) -> String {
    part_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Static link table keyed by normalized part number.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    entries: HashMap<String, String>,
}

impl LinkTable {
    /// Table with the built-in product links.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (part, url) in BUILTIN_LINKS {
            table.insert(part, url);
        }
        table
    }

    pub fn insert(&mut self, part_number: &str, url: &str) {
        self.entries
            .insert(normalize_part_key(part_number), url.to_string());
    }

    /// Merge a YAML map of `part: url` over this table.
    pub fn extend_from_yaml_file(&mut self, path: impl AsRef<Path>) -> Result<usize, LinkTableError> {
        let text = std::fs::read_to_string(path)?;
        let extra: HashMap<String, String> = serde_yaml::from_str(&text)?;
        let count = extra.len();
        for (part, url) in extra {
            self.insert(&part, &url);
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartLinkResolver for LinkTable {
    /// Direct lookup, then the left and right halves of a `A/B` alias.
    fn resolve(&self, part_number: &str) -> Option<String> {
        let key = normalize_part_key(part_number);
        if let Some(url) = self.entries.get(&key) {
            return Some(url.clone());
        }

        let (left, right) = key.split_once('/')?;
        [left, right]
            .into_iter()
            .filter(|half| !half.is_empty())
            .find_map(|half| self.entries.get(half).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_normalizes_case_and_whitespace() {
        let table = LinkTable::builtin();
        assert_eq!(
            table.resolve(" hb3 / 9005 "),
            table.resolve("HB3/9005")
        );
        assert!(table.resolve("h7").is_some());
    }

    #[test]
    fn test_resolve_retries_alias_halves() {
        let table = LinkTable::builtin();
        assert_eq!(table.resolve("H7/XYZ"), table.resolve("H7"));
        assert_eq!(table.resolve("XYZ/D2S"), table.resolve("D2S"));
        assert_eq!(table.resolve("XYZ/QQQ"), None);
        assert_eq!(table.resolve("/"), None);
    }

    #[test]
    fn test_unknown_part_has_no_link() {
        assert_eq!(LinkTable::builtin().resolve("PY21W"), None);
    }

    #[test]
    fn test_extend_from_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "h7: https://example.test/h7\nW5W: https://example.test/w5w").unwrap();

        let mut table = LinkTable::builtin();
        let added = table.extend_from_yaml_file(file.path()).unwrap();
        assert_eq!(added, 2);
        assert_eq!(table.resolve("H7").as_deref(), Some("https://example.test/h7"));
        assert_eq!(table.resolve("w5w").as_deref(), Some("https://example.test/w5w"));
    }
}
