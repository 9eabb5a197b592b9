//! Material analysis and material records

pub mod analyzer;
pub mod writer;

pub use analyzer::{find_node_by_label, find_texture_nodes, MaterialAnalyzer, MaterialChannelData};
pub use writer::write_material;
