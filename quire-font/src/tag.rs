//! Four-byte OpenType tags.

use std::fmt;

/// A four-byte tag, as used for scripts, language systems and features.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// A tag from its raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// A tag from a string of at most four ASCII bytes, padded with spaces.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();

        if bytes.is_empty() || bytes.len() > 4 || !bytes.is_ascii() {
            return None;
        }

        let mut tag = [b' '; 4];
        tag[..bytes.len()].copy_from_slice(bytes);

        Some(Self(tag))
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Whether every byte is one a registered tag could contain.
    ///
    /// Used to distinguish genuinely garbled table data from tags that are
    /// merely declared out of order.
    pub fn is_plausible(&self) -> bool {
        self.0
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b' ')
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii() && !b.is_ascii_control() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        Self::parse(other).is_some_and(|t| t == *self)
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

#[cfg(test)]
mod tests {
    use super::Tag;

    #[test]
    fn parse_pads_short_tags() {
        assert_eq!(Tag::parse("DFLT").unwrap().as_bytes(), *b"DFLT");
        assert_eq!(Tag::parse("kn").unwrap().as_bytes(), *b"kn  ");
        assert!(Tag::parse("").is_none());
        assert!(Tag::parse("toolong").is_none());
    }

    #[test]
    fn tags_compare_against_strings() {
        let tag = Tag::new(*b"vrt2");
        assert_eq!(tag, "vrt2");
        assert_ne!(tag, "vert");
        assert_eq!(Tag::new(*b"kn  "), "kn");
    }

    #[test]
    fn plausibility() {
        assert!(Tag::new(*b"latn").is_plausible());
        assert!(Tag::new(*b"vrt2").is_plausible());
        assert!(Tag::new(*b"kn  ").is_plausible());
        assert!(!Tag::new([0x00, 0x12, 0xff, b'a']).is_plausible());
    }
}
