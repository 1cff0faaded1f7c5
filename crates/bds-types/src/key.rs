use std::fmt;
use std::str::{Chars, FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between the digest and the byte-count suffix.
pub const SIZE_SEPARATOR: char = '_';

/// How a [`Key`] is rendered from a digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFormat {
    /// `"{digest}_{size:x}"`: the digest followed by the hexadecimal byte count.
    #[default]
    SizeSuffixed,
    /// The bare hexadecimal digest.
    Bare,
}

/// Content-derived identifier of a stored entry.
///
/// A `Key` is both the lookup handle and the literal file or directory name
/// of the entry on disk. Its characters are consumed one at a time as the
/// shard directory names leading to the entry, so a key is restricted to
/// ASCII alphanumerics and `_`: it can never contain a path separator or a
/// dot, and therefore never names anything outside its parent directory.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Build the key for a hex digest of `size` bytes of content.
    pub fn from_digest(hex_digest: &str, size: u64, format: KeyFormat) -> Self {
        match format {
            KeyFormat::SizeSuffixed => Self(format!("{hex_digest}{SIZE_SEPARATOR}{size:x}")),
            KeyFormat::Bare => Self(hex_digest.to_owned()),
        }
    }

    /// Parse and validate a key supplied from outside (CLI argument, listing).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidKey {
                key: s.to_owned(),
                reason: "key is empty".into(),
            });
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == SIZE_SEPARATOR))
        {
            return Err(TypeError::InvalidKey {
                key: s.to_owned(),
                reason: format!("character {bad:?} is not allowed"),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key's characters in path-segment order.
    pub fn chars(&self) -> Chars<'_> {
        self.0.chars()
    }

    /// Number of characters, which bounds the depth of the shard tree.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a validated key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Key {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn size_suffixed_is_default() {
        assert_eq!(KeyFormat::default(), KeyFormat::SizeSuffixed);
    }

    #[test]
    fn size_suffix_is_lowercase_hex() {
        let key = Key::from_digest(DIGEST, 301, KeyFormat::SizeSuffixed);
        assert_eq!(key.as_str(), format!("{DIGEST}_12d"));
    }

    #[test]
    fn bare_key_is_the_digest() {
        let key = Key::from_digest(DIGEST, 3, KeyFormat::Bare);
        assert_eq!(key.as_str(), DIGEST);
    }

    #[test]
    fn chars_follow_key_order() {
        let key = Key::parse("a1b_2").unwrap();
        let segments: Vec<char> = key.chars().collect();
        assert_eq!(segments, vec!['a', '1', 'b', '_', '2']);
        assert_eq!(key.len(), 5);
    }

    #[test]
    fn parse_accepts_unknown_but_safe_keys() {
        assert!(Key::parse("azgabash").is_ok());
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(matches!(
            Key::parse(""),
            Err(TypeError::InvalidKey { .. })
        ));
    }

    #[test]
    fn parse_rejects_path_characters() {
        for bad in ["..", "a/b", "a\\b", ".hidden", "abc def", "ключ"] {
            assert!(Key::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn display_is_raw_key() {
        let key = Key::parse("abc_1").unwrap();
        assert_eq!(format!("{key}"), "abc_1");
        assert_eq!(format!("{key:?}"), "Key(abc_1)");
    }

    #[test]
    fn serde_roundtrip_validates() {
        let key = Key::parse("abc_1").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"abc_1\"");
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
        assert!(serde_json::from_str::<Key>("\"../etc\"").is_err());
    }

    #[test]
    fn key_format_serde_names() {
        let json = serde_json::to_string(&KeyFormat::SizeSuffixed).unwrap();
        assert_eq!(json, "\"size-suffixed\"");
        let parsed: KeyFormat = serde_json::from_str("\"bare\"").unwrap();
        assert_eq!(parsed, KeyFormat::Bare);
    }
}
