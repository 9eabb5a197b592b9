//! Common types used across fsxport
//!
//! This module provides shared type definitions used by multiple crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Model GUID as entered by the user
///
/// Accepts 32 hex digits in 8-4-4-4-12 groups, with each hyphen optional and
/// case ignored. The text is kept exactly as given since the compiler
/// matches it against the placement library entry verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(String);

impl Guid {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    /// Validate and wrap a GUID string
    pub fn parse(text: &str) -> Result<Self> {
        if Self::is_valid(text) {
            Ok(Self(text.to_string()))
        } else {
            Err(Error::InvalidGuid {
                guid: text.to_string(),
            })
        }
    }

    /// Check the 8-4-4-4-12 layout without allocating
    pub fn is_valid(text: &str) -> bool {
        let bytes = text.as_bytes();
        let mut pos = 0;

        for (group, &len) in Self::GROUPS.iter().enumerate() {
            if group > 0 && bytes.get(pos) == Some(&b'-') {
                pos += 1;
            }
            let end = pos + len;
            if end > bytes.len() || !bytes[pos..end].iter().all(u8::is_ascii_hexdigit) {
                return false;
            }
            pos = end;
        }

        pos == bytes.len()
    }

    /// The GUID text as entered
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Guid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

/// Validate a model friendly name and return the form written to the file
///
/// The name must be non-empty ASCII. Spaces become underscores.
pub fn friendly_name_for_output(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidFriendlyName {
            name: name.to_string(),
            reason: "friendly name is not set".to_string(),
        });
    }
    if !name.is_ascii() {
        return Err(Error::InvalidFriendlyName {
            name: name.to_string(),
            reason: "friendly name must only contain ASCII characters".to_string(),
        });
    }
    Ok(name.replace(' ', "_"))
}

/// 3D vector (bounding box corners, positions)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    /// Components as an array
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Create a new bounding box
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check that every min component is at most the matching max component
    pub fn is_ordered(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }
}
