//! fsxport Scene Library
//!
//! Read-only scene snapshots, frame evaluation, and the export forest that
//! mirrors the scene hierarchy.
//!
//! # Example
//!
//! ```ignore
//! use fsxport_scene::{SceneDescription, SceneForest, prune, flatten_armatures};
//!
//! let scene = SceneDescription::from_json_file("scene.json")?;
//! let mut forest = SceneForest::build(&scene, true)?;
//! prune(&mut forest, |name| scene.object(name).is_some_and(|o| o.selected));
//! flatten_armatures(&mut forest);
//! ```

pub mod evaluator;
pub mod flatten;
pub mod index;
pub mod math;
pub mod selection;
pub mod snapshot;

pub use evaluator::{FrameEvaluator, FrameGuard, SnapshotEvaluator};
pub use flatten::flatten_armatures;
pub use index::{NodeId, NodeKind, SceneForest, SceneNode, SourceRef};
pub use selection::prune;
pub use snapshot::{
    ArmatureData, Material, MaterialMode, MeshData, ObjectKind, PosePosition, SceneDescription, SceneObject,
};
