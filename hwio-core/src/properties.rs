//! Property store
//!
//! An ordered map of dot-path keys to raw string values. Configuration for
//! an I/O instance `pump` lives under `pump.*` and is inherited through
//! [`Properties::sub_properties`]. Values are never coerced here; typed
//! parsing happens in the settings builders.
//!
//! # Loaders
//!
//! - programmatic pairs ([`Properties::from_pairs`])
//! - `.properties` text ([`Properties::parse_properties`])
//! - TOML documents, tables flattened into dot paths ([`Properties::parse_toml`])
//! - files of either kind ([`Properties::load_file`])
//!
//! Every loader result can be narrowed to one namespace with
//! [`Properties::sub_properties`].

use std::collections::btree_map::{self, BTreeMap};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Ordered dot-path property map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs; later duplicates win
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut props = Self::new();
        for (key, value) in pairs {
            props.insert(key, value);
        }
        props
    }

    /// Insert a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Merge `other` into `self`; keys in `other` win
    pub fn extend(&mut self, other: Properties) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Properties under `prefix.`, with the prefix stripped
    ///
    /// A trailing `.` on `prefix` is optional. An empty prefix selects
    /// nothing.
    pub fn sub_properties(&self, prefix: &str) -> Properties {
        let prefix = prefix.strip_suffix('.').unwrap_or(prefix);
        if prefix.is_empty() {
            return Properties::new();
        }
        let pfx = format!("{prefix}.");
        let entries = self
            .entries
            .range(pfx.clone()..)
            .take_while(|(key, _)| key.starts_with(&pfx))
            .map(|(key, value)| (key[pfx.len()..].to_string(), value.clone()))
            .collect();
        Properties { entries }
    }

    /// Properties whose key ends with `.suffix`, keyed by the part before it
    ///
    /// `pump.inject=true` matches suffix `inject` as `pump -> true`. A
    /// leading `.` on `suffix` is optional. An empty suffix selects nothing.
    pub fn keys_ending_with(&self, suffix: &str) -> Properties {
        let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
        if suffix.is_empty() {
            return Properties::new();
        }
        let sfx = format!(".{suffix}");
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_suffix(&sfx)
                    .map(|head| (head.to_string(), value.clone()))
            })
            .collect();
        Properties { entries }
    }

    /// Parse `.properties` text
    ///
    /// Supports `=`, `:` or whitespace separators, `#`/`!` comment lines,
    /// blank lines, backslash line continuation and the usual escapes
    /// (`\t`, `\n`, `\uXXXX`, ...).
    pub fn parse_properties(text: &str) -> Result<Properties> {
        let mut props = Properties::new();
        let mut lines = text.lines().enumerate();

        while let Some((number, raw)) = lines.next() {
            let first = raw.trim_start();
            if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
                continue;
            }

            let mut logical = String::from(first);
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some((_, next)) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let key = unescape(key).map_err(|msg| {
                Error::properties("properties text", format!("line {}: {msg}", number + 1))
            })?;
            let value = unescape(value).map_err(|msg| {
                Error::properties("properties text", format!("line {}: {msg}", number + 1))
            })?;
            props.insert(key, value);
        }

        Ok(props)
    }

    /// Parse a TOML document, flattening tables into dot paths
    ///
    /// ```toml
    /// [pump]
    /// platform = "mock"
    /// address = 4
    /// ```
    ///
    /// yields `pump.platform=mock` and `pump.address=4`. Arrays of scalars
    /// become comma-separated values; other arrays are indexed
    /// (`key.0.field`).
    pub fn parse_toml(text: &str) -> Result<Properties> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| Error::properties("TOML document", e.to_string()))?;
        let mut props = Properties::new();
        flatten_table(&mut props, "", &table);
        Ok(props)
    }

    /// Load a file, choosing the format by extension (`.toml` or anything
    /// else as `.properties`)
    pub fn load_file(path: impl AsRef<Path>) -> Result<Properties> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::read_file(path, e))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let parsed = if is_toml {
            Properties::parse_toml(&text)
        } else {
            Properties::parse_properties(&text)
        };
        parsed.map_err(|err| match err {
            Error::Properties { message, .. } => {
                Error::properties(path.display().to_string(), message)
            }
            other => other,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties::from_pairs(iter)
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Odd number of trailing backslashes means the line continues
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line into raw (still escaped) key and value
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\u{c}']);
    }
    (key, rest)
}

fn unescape(raw: &str) -> core::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("malformed \\u escape '\\u{hex}'"))?;
                out.push(code);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn flatten_table(props: &mut Properties, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        flatten_value(props, path, value);
    }
}

fn flatten_value(props: &mut Properties, path: String, value: &toml::Value) {
    match value {
        toml::Value::Table(table) => flatten_table(props, &path, table),
        toml::Value::Array(items) => {
            let scalars: Option<Vec<String>> = items.iter().map(scalar_string).collect();
            match scalars {
                Some(values) => {
                    props.insert(path, values.join(","));
                }
                None => {
                    for (i, item) in items.iter().enumerate() {
                        flatten_value(props, format!("{path}.{i}"), item);
                    }
                }
            }
        }
        scalar => {
            if let Some(s) = scalar_string(scalar) {
                props.insert(path, s);
            }
        }
    }
}

fn scalar_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(dt) => Some(dt.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Properties {
        Properties::from_pairs([
            ("pump.platform", "mock"),
            ("pump.address", "4"),
            ("pump.inject", "true"),
            ("pumpkin.address", "9"),
            ("led.inject", "false"),
            ("hwio.i2c.fair", "true"),
        ])
    }

    #[test]
    fn test_sub_properties_strips_prefix() {
        let props = sample();
        let pump = props.sub_properties("pump");
        assert_eq!(pump.len(), 3);
        assert_eq!(pump.get("address"), Some("4"));
        assert_eq!(pump.get("platform"), Some("mock"));
        // pumpkin.* is not under pump.*
        assert!(!pump.contains_key("kin.address"));

        assert_eq!(props.sub_properties("pump."), pump);
        assert_eq!(props.sub_properties("hwio").get("i2c.fair"), Some("true"));
        assert!(props.sub_properties("").is_empty());
    }

    #[test]
    fn test_keys_ending_with() {
        let props = sample();
        let inject = props.keys_ending_with("inject");
        assert_eq!(inject.len(), 2);
        assert_eq!(inject.get("pump"), Some("true"));
        assert_eq!(inject.get("led"), Some("false"));
        assert_eq!(props.keys_ending_with(".inject"), inject);
        assert!(props.keys_ending_with("").is_empty());
    }

    #[test]
    fn test_parse_properties_text() {
        let text = "\
# comment
! also a comment

pump.platform = mock
pump.address:4
pump.name   Water pump
long.value = one, \\
             two
escaped\\=key = tab\\there
unicode = \\u00e9t\\u00e9
";
        let props = Properties::parse_properties(text).unwrap();
        assert_eq!(props.get("pump.platform"), Some("mock"));
        assert_eq!(props.get("pump.address"), Some("4"));
        assert_eq!(props.get("pump.name"), Some("Water pump"));
        assert_eq!(props.get("long.value"), Some("one, two"));
        assert_eq!(props.get("escaped=key"), Some("tab\there"));
        assert_eq!(props.get("unicode"), Some("été"));
        assert_eq!(props.len(), 6);
    }

    #[test]
    fn test_parse_properties_bad_escape() {
        let err = Properties::parse_properties("a = \\uZZZZ").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_toml_flattens() {
        let text = r#"
[pump]
platform = "mock"
address = 4
duty = 12.5

[hwio.i2c]
lock-timeout = 250
fair = true

[bus]
ids = [1, 3]
"#;
        let props = Properties::parse_toml(text).unwrap();
        assert_eq!(props.get("pump.platform"), Some("mock"));
        assert_eq!(props.get("pump.address"), Some("4"));
        assert_eq!(props.get("pump.duty"), Some("12.5"));
        assert_eq!(props.get("hwio.i2c.lock-timeout"), Some("250"));
        assert_eq!(props.get("hwio.i2c.fair"), Some("true"));
        assert_eq!(props.get("bus.ids"), Some("1,3"));
    }

    #[test]
    fn test_parse_toml_error() {
        let err = Properties::parse_toml("[pump\naddress = 4").unwrap_err();
        assert!(matches!(err, Error::Properties { .. }));
    }

    #[test]
    fn test_load_file_by_extension() {
        let dir = std::env::temp_dir().join(format!("hwio-props-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("board.toml");
        fs::write(&toml_path, "[led]\naddress = 17\n").unwrap();
        let props = Properties::load_file(&toml_path).unwrap();
        assert_eq!(props.get("led.address"), Some("17"));

        let text_path = dir.join("board.properties");
        fs::write(&text_path, "led.address=18\n").unwrap();
        let props = Properties::load_file(&text_path).unwrap();
        assert_eq!(props.get("led.address"), Some("18"));

        let missing = Properties::load_file(dir.join("missing.properties")).unwrap_err();
        assert!(matches!(missing, Error::ReadFile { .. }));

        let _ = fs::remove_dir_all(&dir);
    }
}
