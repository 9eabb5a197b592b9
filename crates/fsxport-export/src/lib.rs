//! fsxport Export Pipeline
//!
//! Writes an export forest as a DirectX .X text scene for the FSX/Prepar3D
//! model compilers:
//! - scene file (frames, meshes, skin weights, materials)
//! - `.xanim` animation library keyed by the ModelDef dictionary
//! - scenery placement XML
//! - XToMdl and BglComp invocation

pub mod animation;
pub mod compiler;
pub mod exporter;
pub mod format;
pub mod frame;
pub mod material;
pub mod mesh;
pub mod modeldef;
pub mod placement;
pub mod scene_file;
pub mod templates;
pub mod writer;

pub use animation::Animation;
pub use compiler::{CompileOutcome, CompileRequest, ModelCompiler, XToMdl};
pub use exporter::{
    AnimationSummary, ExportPhase, ExportProgress, ExportReport, PreparedScene, ProgressCallback, XExporter,
};
pub use frame::FrameWriter;
pub use material::{MaterialAnalyzer, MaterialChannelData};
pub use mesh::{MeshSnapshot, SkinBindings};
pub use modeldef::ModelDef;
pub use placement::BglComp;
pub use writer::{XFile, XWriter};
