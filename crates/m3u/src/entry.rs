use memchr::memchr2;
use std::fmt;

/// Tag that carries the duration, display attributes and title of an entry.
pub const EXTINF_TAG: &str = "#EXTINF";

/// One playlist record: descriptive tag lines, player option lines and the stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Opaque descriptive tags (`#EXTINF`, `#EXTGRP`, ...), passed through untouched.
    pub metadata_lines: Vec<String>,
    /// Player options such as `#EXTVLCOPT:http-referrer=...`.
    pub directive_lines: Vec<String>,
    /// Absolute stream locator.
    pub url: String,
}

/// A `key="value"` attribute on an `#EXTINF` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value)
    }
}

impl StreamEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            metadata_lines: Vec::new(),
            directive_lines: Vec::new(),
            url: url.into(),
        }
    }

    pub fn with_metadata(mut self, line: impl Into<String>) -> Self {
        self.metadata_lines.push(line.into());
        self
    }

    pub fn with_directive(mut self, line: impl Into<String>) -> Self {
        self.directive_lines.push(line.into());
        self
    }

    /// The `#EXTINF` line of this entry, if it has one.
    pub fn extinf(&self) -> Option<&str> {
        self.metadata_lines
            .iter()
            .map(String::as_str)
            .find(|line| line.starts_with(EXTINF_TAG))
    }

    /// Display title: the text after the first unquoted comma of the `#EXTINF` line.
    ///
    /// Anonymous entries (no `#EXTINF`, or no comma) have an empty title.
    pub fn title(&self) -> &str {
        self.extinf()
            .and_then(|line| split_extinf(line).1)
            .map(str::trim)
            .unwrap_or("")
    }

    /// Returns a copy whose `#EXTINF` line carries `attribute`.
    ///
    /// An attribute with the same key is overwritten rather than duplicated.
    /// Entries without an `#EXTINF` line are returned unchanged.
    pub fn annotated(&self, attribute: &Attribute) -> StreamEntry {
        let mut entry = self.clone();
        if let Some(line) = entry
            .metadata_lines
            .iter_mut()
            .find(|line| line.starts_with(EXTINF_TAG))
        {
            *line = annotate_extinf(line, attribute);
        }
        entry
    }
}

/// Splits an `#EXTINF` line into its tag/attribute part and its title.
///
/// Commas inside double-quoted attribute values do not count as separators.
pub fn split_extinf(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut in_quotes = false;
    let mut pos = 0;
    while let Some(offset) = memchr2(b',', b'"', &bytes[pos..]) {
        let idx = pos + offset;
        match bytes[idx] {
            b'"' => in_quotes = !in_quotes,
            _ if !in_quotes => return (&line[..idx], Some(&line[idx + 1..])),
            _ => {}
        }
        pos = idx + 1;
    }
    (line, None)
}

fn annotate_extinf(line: &str, attribute: &Attribute) -> String {
    let (head, title) = split_extinf(line);
    let head = set_attribute(head, attribute);
    match title {
        Some(title) => format!("{head},{title}"),
        None => head,
    }
}

fn set_attribute(head: &str, attribute: &Attribute) -> String {
    let needle = format!("{}=\"", attribute.key);
    let existing = head.match_indices(&needle).find(|(idx, _)| {
        head[..*idx]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace)
    });

    if let Some((idx, _)) = existing {
        let value_start = idx + needle.len();
        if let Some(len) = head[value_start..].find('"') {
            return format!(
                "{}{}{}",
                &head[..value_start],
                attribute.value,
                &head[value_start + len..]
            );
        }
    }

    format!("{} {attribute}", head.trim_end())
}
