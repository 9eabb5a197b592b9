//! Materials, their simulator parameters and shader node graphs

use serde::{Deserialize, Serialize};

/// Material workflow selected for the simulator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaterialMode {
    /// Legacy specular workflow
    #[default]
    #[serde(rename = "FSX")]
    Specular,
    /// Physically based workflow
    #[serde(rename = "PBR")]
    Pbr,
    /// Anything else the host allows; rejected on export
    #[serde(untagged)]
    Other(String),
}

impl MaterialMode {
    /// Host-side spelling
    pub fn as_str(&self) -> &str {
        match self {
            MaterialMode::Specular => "FSX",
            MaterialMode::Pbr => "PBR",
            MaterialMode::Other(mode) => mode,
        }
    }
}

/// Image references assigned directly to the material's texture slots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSlots {
    pub diffuse: Option<String>,
    pub specular: Option<String>,
    pub bump: Option<String>,
    pub emissive: Option<String>,
    pub environment: Option<String>,
    pub detail: Option<String>,
    pub fresnel: Option<String>,
    pub metallic: Option<String>,
    pub clearcoat: Option<String>,
}

/// Link arriving at a node input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLink {
    /// Name of the node the link comes from
    pub from_node: String,
    /// Output socket on that node
    #[serde(default)]
    pub from_socket: String,
}

/// Input or output socket of a shader node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSocket {
    /// Socket name
    pub name: String,
    /// Unlinked value, scalar or color components
    #[serde(default)]
    pub default_value: Vec<f32>,
    /// Incoming links, inputs only
    #[serde(default)]
    pub links: Vec<NodeLink>,
}

impl NodeSocket {
    /// First component of the default value
    pub fn scalar(&self) -> Option<f32> {
        self.default_value.first().copied()
    }

    /// Component `i` of the default value, 0 when absent
    pub fn component(&self, i: usize) -> f32 {
        self.default_value.get(i).copied().unwrap_or(0.0)
    }
}

/// Node type tag of image texture nodes
pub const TEX_IMAGE: &str = "TEX_IMAGE";

/// Shader graph node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderNode {
    /// Unique node name
    pub name: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Node type, e.g. `TEX_IMAGE`, `BSDF_PRINCIPLED`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Image of a texture node
    #[serde(default)]
    pub image: Option<String>,
    /// Input sockets
    #[serde(default)]
    pub inputs: Vec<NodeSocket>,
    /// Output sockets
    #[serde(default)]
    pub outputs: Vec<NodeSocket>,
}

impl ShaderNode {
    /// Check whether this is an image texture node
    pub fn is_image_texture(&self) -> bool {
        self.kind == TEX_IMAGE
    }

    /// Input socket by name
    pub fn input(&self, name: &str) -> Option<&NodeSocket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    /// Output socket by name
    pub fn output(&self, name: &str) -> Option<&NodeSocket> {
        self.outputs.iter().find(|s| s.name == name)
    }
}

/// Shader node graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    /// All nodes of the material
    #[serde(default)]
    pub nodes: Vec<ShaderNode>,
}

impl NodeTree {
    /// Node by unique name
    pub fn get(&self, name: &str) -> Option<&ShaderNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Node by display label
    pub fn by_label(&self, label: &str) -> Option<&ShaderNode> {
        self.nodes.iter().find(|n| n.label == label)
    }
}

/// Simulator-specific material parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    // ==================== Specular workflow ====================
    pub detail_scale: f32,
    pub bump_scale: f32,
    pub reflection_scale: f32,
    pub use_global_env: bool,
    pub blend_env_by_inv_diffuse_alpha: bool,
    pub blend_env_by_specular_alpha: bool,
    pub fresnel_diffuse: bool,
    pub fresnel_specular: bool,
    pub fresnel_reflection: bool,
    pub precip_use_precipitation: bool,
    pub precip_apply_offset: bool,
    pub precip_offset: f32,
    pub specular_map_power_scale: f32,
    pub src_blend: String,
    pub dest_blend: String,
    pub blend_diffuse_by_base_alpha: bool,
    pub blend_diffuse_by_inv_specular_alpha: bool,
    pub nnumber_texture: bool,
    pub allow_bloom: bool,
    pub emissive_bloom: bool,
    pub ambient_light_scale: f32,
    pub bloom_material_copy: bool,
    pub bloom_material_modulating_alpha: bool,
    pub no_specular_bloom: bool,
    pub specular_bloom_floor: f32,
    pub emissive_mode: String,
    pub z_test_alpha: bool,
    pub alpha_test_level: f32,
    pub alpha_test_function: String,
    pub final_alpha_write: bool,
    pub final_alpha_multiply: f32,
    pub assume_vertical_normal: bool,
    pub z_write_alpha: bool,
    pub no_z_write: bool,
    pub volume_shadow: bool,
    pub no_shadow: bool,
    pub prelit_vertices: bool,
    pub skinned: bool,
    pub double_sided: bool,
    pub blend_constant: bool,
    pub force_texture_wrap: bool,
    pub force_texture_clamp: bool,
    pub z_bias: f32,
    pub no_base_specular: bool,
    pub mask_diffuse_blends_by_detail_mask: bool,
    pub mask_final_alpha_by_detail_mask: bool,
    pub emissive_alpha_as_heat_map: bool,
    pub temperature_scale: f32,
    pub detail_color: [f32; 4],
    pub detail_offset_u: f32,
    pub detail_offset_v: f32,
    pub detail_rotation: f32,
    pub detail_scale_v: f32,
    pub detail_blend_mode: String,
    pub detail_blend_weight: f32,
    pub detail_alpha_as_blend_mask: bool,

    // ==================== UV channels ====================
    pub diffuse_uv_channel: u32,
    pub specular_uv_channel: u32,
    pub bump_uv_channel: u32,
    pub detail_uv_channel: u32,
    pub emissive_uv_channel: u32,
    pub albedo_uv_channel: u32,
    pub metallic_uv_channel: u32,
    pub clearcoat_uv_channel: u32,

    // ==================== PBR workflow ====================
    pub render_mode: String,
    pub masked_threshold: f32,
    pub alpha_to_coverage: bool,
    pub metallic_has_occlusion: bool,
    pub metallic_has_reflection: bool,
    pub metallic_source: String,
    pub emissive_mode_pbr: String,
    pub decal_order: i32,
    pub clearcoat_contains_normals: bool,
    pub normal_scale: [f32; 2],
    pub detail_scale_xy: [f32; 2],

    // ==================== Shared ====================
    pub material_script: String,
    pub vc_panel_texture: bool,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            detail_scale: 1.0,
            bump_scale: 1.0,
            reflection_scale: 0.0,
            use_global_env: true,
            blend_env_by_inv_diffuse_alpha: false,
            blend_env_by_specular_alpha: false,
            fresnel_diffuse: false,
            fresnel_specular: false,
            fresnel_reflection: false,
            precip_use_precipitation: false,
            precip_apply_offset: false,
            precip_offset: 0.0,
            specular_map_power_scale: 64.0,
            src_blend: "One".to_string(),
            dest_blend: "Zero".to_string(),
            blend_diffuse_by_base_alpha: false,
            blend_diffuse_by_inv_specular_alpha: false,
            nnumber_texture: false,
            allow_bloom: false,
            emissive_bloom: false,
            ambient_light_scale: 0.5,
            bloom_material_copy: false,
            bloom_material_modulating_alpha: false,
            no_specular_bloom: false,
            specular_bloom_floor: 0.9,
            emissive_mode: "AdditiveNightOnly".to_string(),
            z_test_alpha: false,
            alpha_test_level: 0.0,
            alpha_test_function: "Never".to_string(),
            final_alpha_write: false,
            final_alpha_multiply: 1.0,
            assume_vertical_normal: false,
            z_write_alpha: false,
            no_z_write: false,
            volume_shadow: false,
            no_shadow: false,
            prelit_vertices: false,
            skinned: false,
            double_sided: false,
            blend_constant: false,
            force_texture_wrap: false,
            force_texture_clamp: false,
            z_bias: 0.0,
            no_base_specular: false,
            mask_diffuse_blends_by_detail_mask: false,
            mask_final_alpha_by_detail_mask: false,
            emissive_alpha_as_heat_map: false,
            temperature_scale: 1.0,
            detail_color: [1.0; 4],
            detail_offset_u: 0.0,
            detail_offset_v: 0.0,
            detail_rotation: 0.0,
            detail_scale_v: 1.0,
            detail_blend_mode: "Multiply".to_string(),
            detail_blend_weight: 0.0,
            detail_alpha_as_blend_mask: false,
            diffuse_uv_channel: 1,
            specular_uv_channel: 1,
            bump_uv_channel: 1,
            detail_uv_channel: 1,
            emissive_uv_channel: 1,
            albedo_uv_channel: 1,
            metallic_uv_channel: 1,
            clearcoat_uv_channel: 1,
            render_mode: "Opaque".to_string(),
            masked_threshold: 0.0,
            alpha_to_coverage: false,
            metallic_has_occlusion: true,
            metallic_has_reflection: false,
            metallic_source: "MetallicAlpha".to_string(),
            emissive_mode_pbr: "AdditiveNightOnly".to_string(),
            decal_order: 0,
            clearcoat_contains_normals: false,
            normal_scale: [1.0, 1.0],
            detail_scale_xy: [1.0, 1.0],
            material_script: String::new(),
            vc_panel_texture: false,
        }
    }
}

/// Material data block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Workflow
    #[serde(default)]
    pub mode: MaterialMode,
    /// Directly assigned textures
    #[serde(default)]
    pub slots: TextureSlots,
    /// Simulator parameters
    #[serde(default)]
    pub params: MaterialParams,
    /// Shader graph
    #[serde(default)]
    pub node_tree: NodeTree,
}
