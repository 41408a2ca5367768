//! Statement classification and argument escaping.
//!
//! Both helpers are pure. The classifier feeds the type hint sent to the engine and
//! guards the `select`/`insert`/`update_delete` convenience calls; the escaper
//! protects text arguments crossing a string-serialized transport.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::SqlValue;

/// Statement kind derived from the leading keywords of a SQL string.
///
/// Serialized as its numeric code, which is what the native bridge expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StatementType {
    #[default]
    Default,
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementType {
    /// `true` for the kinds accepted by `update_delete`.
    #[must_use]
    pub fn is_update_or_delete(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "DEFAULT",
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl From<StatementType> for u8 {
    fn from(kind: StatementType) -> Self {
        match kind {
            StatementType::Default => 0,
            StatementType::Select => 1,
            StatementType::Insert => 2,
            StatementType::Update => 3,
            StatementType::Delete => 4,
        }
    }
}

impl TryFrom<u8> for StatementType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Default),
            1 => Ok(Self::Select),
            2 => Ok(Self::Insert),
            3 => Ok(Self::Update),
            4 => Ok(Self::Delete),
            other => Err(format!("unknown statement type code {other}")),
        }
    }
}

static PREFIXES: LazyLock<[(StatementType, Regex); 4]> = LazyLock::new(|| {
    let compile = |pattern: &str| Regex::new(pattern).expect("statement prefix pattern");
    [
        (StatementType::Select, compile(r"(?i)^\s*SELECT\s")),
        (StatementType::Insert, compile(r"(?i)^\s*INSERT\s+INTO\s")),
        (StatementType::Update, compile(r"(?i)^\s*UPDATE\s")),
        (StatementType::Delete, compile(r"(?i)^\s*DELETE\s+FROM\s")),
    ]
});

/// Classify a SQL string by its leading keywords.
///
/// Keywords must be followed by whitespace, so `INSERT INTO` with nothing after it
/// is not an insert. Everything unrecognized is [`StatementType::Default`].
#[must_use]
pub fn classify(sql: &str) -> StatementType {
    PREFIXES
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map_or(StatementType::Default, |(kind, _)| *kind)
}

/// Escape the sentinel bytes 0x00, 0x01 and 0x02 inside a string.
///
/// 0x02 becomes 0x02 0x02, 0x01 becomes 0x01 0x02 and 0x00 becomes 0x01 0x01.
/// Apply exactly once per argument per submission.
#[must_use]
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['\u{0}', '\u{1}', '\u{2}']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\u{2}' => out.push_str("\u{2}\u{2}"),
            '\u{1}' => out.push_str("\u{1}\u{2}"),
            '\u{0}' => out.push_str("\u{1}\u{1}"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape_text`]. Unpaired sentinel bytes are kept as they are.
#[must_use]
pub fn unescape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['\u{1}', '\u{2}']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let decoded = match (ch, chars.peek()) {
            ('\u{1}', Some('\u{1}')) => Some('\u{0}'),
            ('\u{1}', Some('\u{2}')) => Some('\u{1}'),
            ('\u{2}', Some('\u{2}')) => Some('\u{2}'),
            _ => None,
        };
        match decoded {
            Some(byte) => {
                chars.next();
                out.push(byte);
            }
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Escape a statement argument; non-text values pass through unchanged.
#[must_use]
pub fn escape_blob(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Text(text) => match escape_text(&text) {
            Cow::Borrowed(_) => SqlValue::Text(text),
            Cow::Owned(escaped) => SqlValue::Text(escaped),
        },
        other => other,
    }
}
