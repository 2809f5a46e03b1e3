//! Identifier coercion: typed primary keys and their textual forms.
//!
//! Every entity type declares one [`KeyKind`]. Opaque tokens are UUIDs; codes
//! are short human-assigned strings such as ISO country codes (`AT`) or
//! compound city codes (`AT-VIENNA`). The two textual forms are disjoint: a
//! code is at most [`MAX_CODE_LEN`] characters of `[A-Za-z0-9_-]`, which no
//! accepted UUID spelling satisfies.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, registry::EntityType};

/// Longest accepted code identifier.
pub const MAX_CODE_LEN: usize = 24;

// ─── Key kind ────────────────────────────────────────────────────────────────

/// The primary-key representation an entity type uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
  /// An opaque UUID.
  Token,
  /// A short textual code.
  Code,
}

impl KeyKind {
  /// Interpret `raw` as a key of this kind. Surrounding whitespace is ignored.
  pub fn parse(self, raw: &str) -> Option<Identifier> {
    let raw = raw.trim();
    match self {
      Self::Token => Uuid::parse_str(raw).ok().map(Identifier::Token),
      Self::Code => is_code(raw).then(|| Identifier::Code(raw.to_owned())),
    }
  }
}

impl fmt::Display for KeyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Token => f.write_str("UUID token"),
      Self::Code => f.write_str("short code"),
    }
  }
}

fn is_code(raw: &str) -> bool {
  !raw.is_empty()
    && raw.len() <= MAX_CODE_LEN
    && raw
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// ─── Identifier ──────────────────────────────────────────────────────────────

/// A typed primary key.
///
/// Serialises as its plain textual form; deserialisation picks the variant
/// from the text, which is unambiguous because the two forms are disjoint.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Identifier {
  Token(Uuid),
  Code(String),
}

impl Identifier {
  pub fn kind(&self) -> KeyKind {
    match self {
      Self::Token(_) => KeyKind::Token,
      Self::Code(_) => KeyKind::Code,
    }
  }

  /// Reinterpret this identifier as a key of `kind`, going through the
  /// textual form. `None` when the text is not a valid key of that kind.
  pub fn coerce_to(&self, kind: KeyKind) -> Option<Identifier> {
    if self.kind() == kind {
      return Some(self.clone());
    }
    kind.parse(&self.to_string())
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Token(id) => id.hyphenated().fmt(f),
      Self::Code(code) => f.write_str(code),
    }
  }
}

impl From<Identifier> for String {
  fn from(id: Identifier) -> Self { id.to_string() }
}

impl TryFrom<String> for Identifier {
  type Error = String;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    KeyKind::Token
      .parse(&raw)
      .or_else(|| KeyKind::Code.parse(&raw))
      .ok_or_else(|| format!("not a token or code identifier: {raw:?}"))
  }
}

// ─── Coercion against an entity type ─────────────────────────────────────────

/// Parse caller-supplied identifier text for `entity`.
pub fn parse(entity: &EntityType, raw: &str) -> Result<Identifier> {
  entity
    .key
    .parse(raw)
    .ok_or_else(|| Error::InvalidIdentifierFormat {
      entity:   entity.name,
      raw:      raw.to_owned(),
      expected: entity.key,
    })
}

/// Interpret a stored foreign-key value as an identifier of `entity`.
///
/// Returns `None` instead of failing so that a malformed or foreign-typed
/// value can be skipped by the cascade.
pub fn coerce(entity: &EntityType, raw: &str) -> Option<Identifier> {
  entity.key.parse(raw)
}
