//! Channel recovery from material node graphs
//!
//! Materials carry explicit texture slots, but artists often wire textures
//! straight into the shader instead. When a slot is empty the graph is
//! searched, first along the links feeding the main shader input, then by
//! node name and label.

use std::collections::HashSet;

use fsxport_core::naming::{file_stem, texture_file_name};
use fsxport_core::{Error, Result};
use fsxport_scene::snapshot::{NodeSocket, NodeTree, ShaderNode};
use fsxport_scene::{Material, MaterialMode};

/// Values and texture names recovered from one material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialChannelData {
    /// Diffuse or albedo color, RGBA
    pub diffuse_color: [f32; 4],
    /// Diffuse or albedo texture
    pub diffuse_texture: Option<String>,
    /// Specular color
    pub specular_color: [f32; 3],
    /// Specular texture
    pub specular_texture: Option<String>,
    /// Emissive color
    pub emissive_color: [f32; 3],
    /// Emissive texture
    pub emissive_texture: Option<String>,
    /// Normal map
    pub normal_texture: Option<String>,
    /// Normal map strength
    pub normal_scale: f32,
    /// Detail texture
    pub detail_texture: Option<String>,
    /// Environment map
    pub environment_texture: Option<String>,
    /// Fresnel ramp
    pub fresnel_texture: Option<String>,
    /// Specular power
    pub power: f32,
    /// Metallic factor
    pub metallic: f32,
    /// Smoothness factor
    pub smoothness: f32,
    /// Metallic/smoothness map
    pub metallic_texture: Option<String>,
    /// Clear coat map
    pub clearcoat_texture: Option<String>,
    /// Clear coat factor
    pub clearcoat: f32,
    /// Clear coat smoothness
    pub clearcoat_smoothness: f32,
}

impl Default for MaterialChannelData {
    fn default() -> Self {
        Self {
            diffuse_color: [0.0; 4],
            diffuse_texture: None,
            specular_color: [0.0; 3],
            specular_texture: None,
            emissive_color: [0.0; 3],
            emissive_texture: None,
            normal_texture: None,
            normal_scale: 0.3,
            detail_texture: None,
            environment_texture: None,
            fresnel_texture: None,
            power: 1.0,
            metallic: 0.0,
            smoothness: 1.0,
            metallic_texture: None,
            clearcoat_texture: None,
            clearcoat: 0.0,
            clearcoat_smoothness: 1.0,
        }
    }
}

/// Main shader node of a workflow
fn main_node<'t>(tree: &'t NodeTree, mode: &MaterialMode) -> Option<&'t ShaderNode> {
    match mode {
        MaterialMode::Specular => tree.get("Specular").or_else(|| tree.get("Specular BSDF")),
        MaterialMode::Pbr => tree.get("Principled BSDF"),
        MaterialMode::Other(_) => None,
    }
}

/// Image nodes reachable through the links of `input` on `start`
///
/// Only the first link of each input is followed. Image nodes end a branch;
/// every other node is searched through all of its inputs.
pub fn find_texture_nodes<'t>(tree: &'t NodeTree, start: &ShaderNode, input: &str) -> Vec<&'t ShaderNode> {
    let mut found = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut worklist: Vec<&'t ShaderNode> = Vec::new();

    let first_link = |socket: &NodeSocket| {
        socket.links.first().and_then(|link| tree.get(&link.from_node))
    };

    if let Some(node) = start.input(input).and_then(first_link) {
        worklist.push(node);
    }
    while let Some(node) = worklist.pop() {
        if !visited.insert(node.name.as_str()) {
            continue;
        }
        if node.is_image_texture() {
            found.push(node);
            continue;
        }
        // reversed so the first input is searched first
        worklist.extend(node.inputs.iter().rev().filter_map(first_link));
    }
    found
}

/// Node with `name`, or failing that with `label`
pub fn find_node_by_label<'t>(tree: &'t NodeTree, label: &str) -> Option<&'t ShaderNode> {
    tree.get(label).or_else(|| tree.by_label(label))
}

/// Material analysis for one export
#[derive(Debug, Clone, Copy)]
pub struct MaterialAnalyzer {
    use_bmp: bool,
}

impl MaterialAnalyzer {
    /// Analyzer writing `.bmp` texture names when `use_bmp` is set
    pub fn new(use_bmp: bool) -> Self {
        Self { use_bmp }
    }

    fn texture(&self, image: &str) -> String {
        texture_file_name(image, self.use_bmp)
    }

    fn slot(&self, slot: Option<&String>) -> Option<String> {
        slot.filter(|s| !s.is_empty()).map(|s| self.texture(s))
    }

    fn node_texture(&self, material: &Material, node: Option<&ShaderNode>, channel: &str) -> Option<String> {
        match node.and_then(|n| n.image.as_deref()).filter(|i| !i.is_empty()) {
            Some(image) => Some(self.texture(image)),
            None => {
                tracing::info!(material = %material.name, channel, "no texture set");
                None
            }
        }
    }

    /// Search the graph for the texture of a channel
    fn search(&self, material: &Material, main: &ShaderNode, input: &str, channel: &str) -> Option<String> {
        let tree = &material.node_tree;
        let candidates = find_texture_nodes(tree, main, input);
        let texture = match candidates.as_slice() {
            [only] => self.node_texture(material, Some(only), channel),
            many => many
                .iter()
                .find(|n| n.name == channel)
                .and_then(|n| self.node_texture(material, Some(n), channel)),
        };
        let texture = texture.or_else(|| self.node_texture(material, find_node_by_label(tree, channel), channel));
        if let Some(found) = &texture {
            tracing::debug!(material = %material.name, channel, texture = %found, "texture found in node graph");
        }
        texture
    }

    /// Recover the channel data of `material`
    pub fn analyze(&self, material: &Material) -> Result<MaterialChannelData> {
        if matches!(material.mode, MaterialMode::Other(_)) {
            return Err(Error::UnsupportedMaterialMode {
                material: material.name.clone(),
                mode: material.mode.as_str().to_string(),
            });
        }
        let tree = &material.node_tree;
        let main = main_node(tree, &material.mode).ok_or_else(|| Error::MissingShaderNode {
            material: material.name.clone(),
            node: match material.mode {
                MaterialMode::Pbr => "Principled BSDF".to_string(),
                _ => "Specular BSDF".to_string(),
            },
        })?;

        let slots = &material.slots;
        let params = &material.params;
        let mut data = MaterialChannelData::default();

        // color and scalar utility nodes
        let utility = |name: &str| {
            let node = tree.get(name);
            if node.is_none() {
                tracing::info!(material = %material.name, node = name, "utility node missing, keeping default");
            }
            node
        };
        match material.mode {
            MaterialMode::Specular => {
                if let Some(color) = utility("Diffuse Color").and_then(|n| n.output("Color")) {
                    data.diffuse_color = std::array::from_fn(|i| color.component(i));
                }
                if let Some(color) = utility("Specular Color").and_then(|n| n.output("Color")) {
                    data.specular_color = std::array::from_fn(|i| color.component(i));
                }
                if let Some(power) = utility("Power Factor").and_then(|n| n.output("Value")).and_then(|s| s.scalar()) {
                    data.power = power;
                }
            }
            _ => {
                if let Some(color) = utility("Base Color").and_then(|n| n.output("Color")) {
                    data.diffuse_color = std::array::from_fn(|i| color.component(i));
                }
            }
        }

        // diffuse / albedo
        data.diffuse_texture = self
            .slot(slots.diffuse.as_ref())
            .or_else(|| self.search(material, main, "Base Color", "diffuse"));
        if params.vc_panel_texture {
            data.diffuse_texture = data.diffuse_texture.map(|t| file_stem(&t));
        }

        // normal
        data.normal_texture = self.slot(slots.bump.as_ref());
        data.normal_scale = params.normal_scale[0];
        if data.normal_texture.is_none() && tree.get("Normal Map").is_some() {
            data.normal_texture = self.search(material, main, "Normal", "normal");
        }

        data.environment_texture = self.slot(slots.environment.as_ref());
        data.detail_texture = self.slot(slots.detail.as_ref());
        data.fresnel_texture = self.slot(slots.fresnel.as_ref());

        match material.mode {
            MaterialMode::Specular => {
                data.specular_texture = self
                    .slot(slots.specular.as_ref())
                    .or_else(|| self.search(material, main, "Specular", "specular"));

                if let Some(emissive) = main.input("Emissive Color") {
                    data.emissive_color = std::array::from_fn(|i| emissive.component(i));
                }
                data.emissive_texture = self
                    .slot(slots.emissive.as_ref())
                    .or_else(|| self.search(material, main, "Emissive Color", "emissive"));
                if params.vc_panel_texture {
                    data.emissive_texture = data.emissive_texture.map(|t| file_stem(&t));
                }
            }
            _ => {
                data.metallic_texture = self.slot(slots.metallic.as_ref());
                if let Some(v) = utility("Metallic Factor").and_then(|n| n.outputs.first()).and_then(|s| s.scalar()) {
                    data.metallic = v;
                }
                if let Some(v) = utility("Smoothness Factor").and_then(|n| n.outputs.first()).and_then(|s| s.scalar()) {
                    data.smoothness = v;
                }

                data.clearcoat_texture = self.slot(slots.clearcoat.as_ref());
                if data.clearcoat_texture.is_none() {
                    data.clearcoat_texture = self.search(material, main, "Clearcoat", "clearcoat");
                    if let Some(v) = main.input("Clearcoat").and_then(|s| s.scalar()) {
                        data.clearcoat = v;
                    }
                    if let Some(r) = main.input("Clearcoat Roughness").and_then(|s| s.scalar()) {
                        data.clearcoat_smoothness = 1.0 - r;
                    }
                }
            }
        }

        Ok(data)
    }
}
