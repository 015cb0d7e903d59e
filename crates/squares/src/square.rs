//! Core record types for squares.
//!
//! A square is a small document with five data fields and an opaque
//! identifier assigned by the store when the document is created.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Text color stored when none is given.
pub const DEFAULT_TEXT_COLOR: &str = "black";

/// Number of raw bytes in an identifier.
const ID_BYTES: usize = 12;

/// Low 24 bits of the per-process counter end up in the identifier.
const COUNTER_MASK: u32 = 0x00FF_FFFF;

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_TAG: OnceLock<[u8; 5]> = OnceLock::new();

/// Opaque, store-assigned identifier of a square.
///
/// Rendered as 24 lowercase hex characters: a 4 byte timestamp, a 5 byte
/// per-process tag and a 3 byte counter, so identifiers generated by one
/// process are unique and roughly ordered by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SquareId(String);

impl SquareId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];

        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process_tag());

        let count = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The identifier as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Five bytes that distinguish this process from others writing to the store.
fn process_tag() -> &'static [u8; 5] {
    PROCESS_TAG.get_or_init(|| {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&std::process::id().to_le_bytes());
        hasher.update(
            &Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_le_bytes(),
        );
        let digest = hasher.finalize();
        let mut tag = [0u8; 5];
        tag.copy_from_slice(&digest.as_bytes()[..5]);
        tag
    })
}

impl fmt::Display for SquareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SquareId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == ID_BYTES * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidId(s.to_string()))
        }
    }
}

impl TryFrom<String> for SquareId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SquareId> for String {
    fn from(id: SquareId) -> Self {
        id.0
    }
}

/// The five data fields of a square.
///
/// Serialized with the document field names `length`, `color`, `isFilled`,
/// `text` and `textColor`. Missing `isFilled`, `text` and `textColor` decode
/// to their defaults; `length` and `color` are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquareFields {
    /// Side length.
    pub length: i64,
    /// Fill or outline color.
    pub color: String,
    /// Whether the square is drawn filled.
    #[serde(default)]
    pub is_filled: bool,
    /// Label drawn inside the square.
    #[serde(default)]
    pub text: String,
    /// Color of the label.
    #[serde(default = "default_text_color")]
    pub text_color: String,
}

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

impl SquareFields {
    /// Create fields with the given length and color and defaults elsewhere.
    #[must_use]
    pub fn new(length: i64, color: impl Into<String>) -> Self {
        Self {
            length,
            color: color.into(),
            is_filled: false,
            text: String::new(),
            text_color: default_text_color(),
        }
    }

    /// Set the filled flag.
    #[must_use]
    pub fn filled(mut self, is_filled: bool) -> Self {
        self.is_filled = is_filled;
        self
    }

    /// Set the label text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the label color.
    #[must_use]
    pub fn text_color(mut self, text_color: impl Into<String>) -> Self {
        self.text_color = text_color.into();
        self
    }

    /// Check that every required field is populated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first field that is blank.
    pub fn validate(&self) -> Result<()> {
        if self.color.trim().is_empty() {
            return Err(Error::validation("color", "is required"));
        }
        if self.text_color.trim().is_empty() {
            return Err(Error::validation("textColor", "is required"));
        }
        Ok(())
    }
}

/// A persisted square: its identifier plus its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    /// Store-assigned identifier.
    #[serde(rename = "_id")]
    pub id: SquareId,
    /// Data fields.
    #[serde(flatten)]
    pub fields: SquareFields,
}

impl Square {
    /// Pair an identifier with its fields.
    #[must_use]
    pub fn new(id: SquareId, fields: SquareFields) -> Self {
        Self { id, fields }
    }
}
