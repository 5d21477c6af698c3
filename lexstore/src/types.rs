//! Common types used throughout the lexstore engine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of a lexical database, as declared in file headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Controls whether sources are made fully memory-resident after open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Sources stay file-backed; nothing is pre-loaded.
    #[default]
    NoLoad,
    /// A single background thread loads sources after open.
    Background,
    /// Open blocks until every source is memory-resident.
    Immediate,
}

/// Character set used to decode file bytes into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
}

impl Charset {
    /// Decode a raw line. Undecodable UTF-8 bytes are replaced rather than
    /// surfaced as errors; lookups on such lines resolve to "not found".
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}
