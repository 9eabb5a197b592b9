//! Keyframe curves attached to objects and pose bones

use serde::{Deserialize, Serialize};

/// One keyframe point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Frame number, may be fractional
    pub frame: f32,
    /// Curve value at that frame
    pub value: f32,
}

/// Animated channel of one property component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FCurve {
    /// Property path, e.g. `location` or `pose.bones["Arm"].rotation_quaternion`
    pub data_path: String,
    /// Component of the property this curve drives
    #[serde(default)]
    pub array_index: usize,
    /// Points in ascending frame order
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl FCurve {
    /// First and last keyframe frames, `(0, 0)` for an empty curve
    pub fn range(&self) -> (f32, f32) {
        let mut frames = self.keyframes.iter().map(|k| k.frame);
        match frames.next() {
            Some(first) => frames.fold((first, first), |(lo, hi), f| (lo.min(f), hi.max(f))),
            None => (0.0, 0.0),
        }
    }

    /// Put the keyframes in ascending frame order
    pub fn sort_keyframes(&mut self) {
        self.keyframes.sort_by(|a, b| a.frame.total_cmp(&b.frame));
    }

    /// Whether every frame is finite and not smaller than the one before
    pub fn is_ordered(&self) -> bool {
        self.keyframes.iter().all(|k| k.frame.is_finite())
            && self.keyframes.windows(2).all(|pair| pair[0].frame <= pair[1].frame)
    }

    /// Value at `frame`
    ///
    /// Linear between keys, constant before the first key and after the
    /// last one.
    pub fn evaluate(&self, frame: f32) -> Option<f32> {
        let first = self.keyframes.first()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        for pair in self.keyframes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if frame <= b.frame {
                let span = b.frame - a.frame;
                if span <= f32::EPSILON {
                    return Some(b.value);
                }
                let t = (frame - a.frame) / span;
                return Some(a.value + (b.value - a.value) * t);
            }
        }
        self.keyframes.last().map(|k| k.value)
    }
}

/// Action data of an object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationData {
    /// All curves of the assigned action
    #[serde(default)]
    pub fcurves: Vec<FCurve>,
}

impl AnimationData {
    /// Curves whose data path equals `path`
    pub fn curves_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FCurve> + 'a {
        self.fcurves.iter().filter(move |c| c.data_path == path)
    }

    /// Largest keyframe frame over all curves
    pub fn max_frame(&self) -> Option<f32> {
        self.fcurves
            .iter()
            .filter(|c| !c.keyframes.is_empty())
            .map(|c| c.range().1)
            .reduce(f32::max)
    }

    /// Evaluate component `index` of property `path`, if animated
    pub fn sample(&self, path: &str, index: usize, frame: f32) -> Option<f32> {
        self.curves_for(path)
            .find(|c| c.array_index == index)
            .and_then(|c| c.evaluate(frame))
    }
}

/// Action placed on an NLA track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlaStrip {
    /// Strip name
    #[serde(default)]
    pub name: String,
    /// Curves of the strip's action
    #[serde(default)]
    pub action: AnimationData,
}

/// Non-linear animation track of an object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NlaTrack {
    /// Track name
    #[serde(default)]
    pub name: String,
    /// Muted tracks do not contribute
    #[serde(default)]
    pub mute: bool,
    /// Strips in track order
    #[serde(default)]
    pub strips: Vec<NlaStrip>,
}

impl NlaTrack {
    /// Curves of every strip, none for a muted track
    pub fn active_curves(&self) -> impl Iterator<Item = &FCurve> {
        let strips = if self.mute { &[][..] } else { &self.strips[..] };
        strips.iter().flat_map(|strip| strip.action.fcurves.iter())
    }
}

/// Curve data path of a pose bone property
pub fn pose_bone_path(bone: &str, property: &str) -> String {
    format!("pose.bones[\"{bone}\"].{property}")
}
