use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?\s*$").expect("Invalid version regex")
});

/// Four-part build version (`major.minor.build.revision`).
///
/// Missing trailing components parse as zero, so `"1.2"` equals `"1.2.0.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version string: {0:?}")]
pub struct VersionParseError(pub String);

impl Version {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse leniently, returning `None` for anything malformed.
    pub fn parse_lenient(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = VERSION_PATTERN
            .captures(s)
            .ok_or_else(|| VersionParseError(s.to_string()))?;

        let part = |index: usize| -> Result<u32, VersionParseError> {
            match captures.get(index) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| VersionParseError(s.to_string())),
                None => Ok(0),
            }
        };

        Ok(Self {
            major: part(1)?,
            minor: part(2)?,
            build: part(3)?,
            revision: part(4)?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
