//! Animation keys and the `.xanim` document
//!
//! Generators sample tagged nodes into [`Animation`] records, the writer
//! groups them by tag under the definitions of the ModelDef dictionary.

pub mod generator;
pub mod writer;

use nalgebra::{Quaternion, Vector3};
use std::collections::BTreeMap;

pub use generator::{animation_tags, generate_all, generate_bone, generate_object};
pub use writer::{render_xanim, write_xanim};

/// Sampled keys of one node
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    /// Part name the streams refer to
    pub safe_name: String,
    /// Dictionary tag
    pub tag: String,
    /// Rotation key per frame
    pub rotation_keys: BTreeMap<i32, Quaternion<f32>>,
    /// Position key per frame
    pub position_keys: BTreeMap<i32, Vector3<f32>>,
    /// Last animated frame
    pub key_range: f32,
}

impl Animation {
    /// Empty animation of `safe_name` under `tag`
    pub fn new(safe_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            safe_name: safe_name.into(),
            tag: tag.into(),
            rotation_keys: BTreeMap::new(),
            position_keys: BTreeMap::new(),
            key_range: 0.0,
        }
    }

    /// Record both keys of `frame`
    pub fn insert(&mut self, frame: i32, rotation: Quaternion<f32>, position: Vector3<f32>) {
        self.rotation_keys.insert(frame, rotation);
        self.position_keys.insert(frame, position);
    }

    /// Whether `frame` was already sampled
    pub fn has_frame(&self, frame: i32) -> bool {
        self.rotation_keys.contains_key(&frame)
    }

    /// Only animations with a positive range are written
    pub fn is_exportable(&self) -> bool {
        self.key_range > 0.0
    }
}
