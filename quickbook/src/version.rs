use std::fmt;

/// A quickbook language version, stored as `major * 100 + minor` (1.5 is 105).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuickbookVersion(pub u32);

impl QuickbookVersion {
    /// Version assumed for a doc info block without `[quickbook x.y]`.
    pub const IMPLICIT: QuickbookVersion = QuickbookVersion(101);
    pub const V1_5: QuickbookVersion = QuickbookVersion(105);
    /// Newest version this compiler understands.
    pub const LATEST: QuickbookVersion = QuickbookVersion::V1_5;

    pub fn new(major: u32, minor: u32) -> Self {
        QuickbookVersion(major * 100 + minor)
    }

    /// Parse `1.5` style text. Minor versions are at most two digits.
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.trim().split_once('.')?;
        if major.is_empty() || minor.is_empty() || minor.len() > 2 {
            return None;
        }
        let major = major.parse().ok()?;
        let minor = minor.parse().ok()?;
        Some(QuickbookVersion::new(major, minor))
    }

    pub fn major(self) -> u32 {
        self.0 / 100
    }

    pub fn minor(self) -> u32 {
        self.0 % 100
    }

    pub fn epoch(self) -> Epoch {
        if self < QuickbookVersion::V1_5 {
            Epoch::V1_4
        } else {
            Epoch::V1_5
        }
    }
}

impl fmt::Display for QuickbookVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Version-dependent grammar behaviour, decided once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Epoch {
    /// Template arguments keep backslashes literally; `[$ ...]` is just a
    /// file name.
    V1_4,
    /// Backslash escapes inside arguments, image attributes.
    V1_5,
}
