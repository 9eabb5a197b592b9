//! `Material`/`FS10Material`/`P3DMaterial` and `PBRMaterial` records

use std::io::Write;

use fsxport_core::naming::{file_name, safe_name};
use fsxport_core::{ExportConfig, Result, SdkVersion};
use fsxport_scene::snapshot::MaterialParams;
use fsxport_scene::{Material, MaterialMode};

use super::analyzer::{MaterialAnalyzer, MaterialChannelData};
use crate::format::float;
use crate::writer::XWriter;

fn flag(value: bool) -> u8 {
    u8::from(value)
}

fn rgba(c: [f32; 4]) -> String {
    format!("{};{};{};{};;\n", float(c[0]), float(c[1]), float(c[2]), float(c[3]))
}

fn rgb(c: [f32; 3]) -> String {
    format!("{};{};{};;\n", float(c[0]), float(c[1]), float(c[2]))
}

/// `Name {"file";}` when a texture is set
fn texture_line<W: Write>(out: &mut XWriter<W>, record: &str, texture: Option<&String>) -> Result<()> {
    match texture.filter(|t| !t.is_empty()) {
        Some(t) => out.write(&format!("{record} {{\"{t}\";}}\n")),
        None => Ok(()),
    }
}

/// Record with one line per entry in `body`
fn block<W: Write>(out: &mut XWriter<W>, record: &str, body: &[String]) -> Result<()> {
    out.write(&format!("{record} {{\n"))?;
    for line in body {
        out.write(line)?;
    }
    out.write("}\n")
}

/// `Name {\n    n;    // comment\n}`
fn flag_block<W: Write>(out: &mut XWriter<W>, record: &str, value: bool, comment: &str) -> Result<()> {
    block(out, record, &[format!("    {};    // {comment}\n", flag(value))])
}

fn material_script<W: Write>(out: &mut XWriter<W>, script: &str) -> Result<()> {
    block(out, "MaterialScript", &[format!("    \"{}\"; // MaterialScript\n", file_name(script))])
}

/// Write one material of a mesh's material list
pub fn write_material<W: Write>(out: &mut XWriter<W>, material: &Material, config: &ExportConfig) -> Result<()> {
    let data = MaterialAnalyzer::new(config.use_bmp).analyze(material)?;
    tracing::debug!(material = %material.name, mode = material.mode.as_str(), "writing material");
    match material.mode {
        MaterialMode::Pbr => write_pbr(out, material, &data, config.sdk),
        _ => write_specular(out, material, &data, config.sdk),
    }
}

fn write_specular<W: Write>(
    out: &mut XWriter<W>,
    material: &Material,
    data: &MaterialChannelData,
    sdk: SdkVersion,
) -> Result<()> {
    let p = &material.params;
    out.write(&format!("Material {} {{\n", safe_name(&material.name)))?;
    out.indent();
    out.write(&rgba(data.diffuse_color))?;
    out.write(&format!("{};\n", float(data.power)))?;
    out.write(&rgb(data.specular_color))?;
    out.write(&rgb(data.emissive_color))?;
    if data.diffuse_texture.as_ref().is_some_and(|t| !t.is_empty()) {
        texture_line(out, "TextureFilename", data.diffuse_texture.as_ref())?;
        texture_line(out, "DiffuseTextureFilename", data.diffuse_texture.as_ref())?;
    }
    texture_line(out, "EmissiveTextureFilename", data.emissive_texture.as_ref())?;
    texture_line(out, "BumpTextureFilename", data.normal_texture.as_ref())?;
    texture_line(out, "ReflectionTextureFilename", data.environment_texture.as_ref())?;
    texture_line(out, "TextureFilename", data.specular_texture.as_ref())?;

    let record = if sdk.uses_fs10_material() { "FS10Material" } else { "P3DMaterial" };
    out.write(&format!("{record} {{\n"))?;
    out.indent();

    out.write(&rgba(data.diffuse_color))?;
    out.write(&rgb(data.specular_color))?;
    out.write(&format!("{};\n", float(data.power)))?;
    out.write(&format!(
        "{};{};  // Detail and bump scales\n",
        float(p.detail_scale),
        float(p.bump_scale)
    ))?;
    out.write(&format!("{};   // Reflection scale\n", float(p.reflection_scale)))?;
    out.write(&format!("{};            // Use global env\n", flag(p.use_global_env)))?;
    out.write(&format!(
        "{};            // Blend env by invdifalpha\n",
        flag(p.blend_env_by_inv_diffuse_alpha)
    ))?;
    out.write(&format!("{};            // Blend env by specalpha\n", flag(p.blend_env_by_specular_alpha)))?;
    out.write(&format!(
        "{}; {}; {};      // Fresnel affects dif - spec - env\n",
        flag(p.fresnel_diffuse),
        flag(p.fresnel_specular),
        flag(p.fresnel_reflection)
    ))?;
    out.write(&format!("{}; {}; ", flag(p.precip_use_precipitation), flag(p.precip_apply_offset)))?;
    out.write_raw(&format!("{};  // Precipitation...\n", float(p.precip_offset)))?;
    out.write(&format!("{};     // Specular Map Power Scale\n", float(p.specular_map_power_scale)))?;
    out.write(&format!("\"{}\"; \"{}\";  // Src/Dest blend\n", p.src_blend, p.dest_blend))?;
    out.write(&format!("BlendDiffuseByBaseAlpha {{ {}; }}\n", flag(p.blend_diffuse_by_base_alpha)))?;
    out.write(&format!(
        "BlendDiffuseByInverseSpecularMapAlpha {{ {}; }}\n",
        flag(p.blend_diffuse_by_inv_specular_alpha)
    ))?;
    flag_block(out, "NNumberTexture", p.nnumber_texture, "Material is an N-Number")?;
    out.write(&format!("AllowBloom {{ {}; }}\n", flag(p.allow_bloom)))?;
    flag_block(out, "EmissiveBloom", p.emissive_bloom, "Allow emissive bloom")?;
    block(out, "AmbientLightScale", &[format!("    {};\n", float(p.ambient_light_scale))])?;
    block(
        out,
        "BloomData",
        &[format!(
            "    {}; {};    // Bloom material by copying/Bloom material modulating by alpha\n",
            flag(p.bloom_material_copy),
            flag(p.bloom_material_modulating_alpha)
        )],
    )?;
    flag_block(out, "NoSpecularBloom", p.no_specular_bloom, "Allow specular bloom")?;
    block(out, "SpecularBloomFloor", &[format!("    {};\n", float(p.specular_bloom_floor))])?;
    block(out, "EmissiveData", &[format!("    \"{}\";\n", p.emissive_mode)])?;
    block(
        out,
        "AlphaData",
        &[
            format!("    {};    // ZTest Alpha\n", flag(p.z_test_alpha)),
            format!("    {}; // Alpha test threshold\n", float(p.alpha_test_level)),
            format!("    \"{}\"; // Alpha test function\n", p.alpha_test_function),
            format!("    {};    // Perform final alpha write\n", flag(p.final_alpha_write)),
            format!("    {}; // Final alpha value\n", float(p.final_alpha_multiply)),
        ],
    )?;
    block(
        out,
        "EnhancedParameters",
        &[
            format!("    {};    // Assume vertical normal\n", flag(p.assume_vertical_normal)),
            format!("    {};    // Z-Write alpha\n", flag(p.z_write_alpha)),
            format!("    {};    // No Z-Write\n", flag(p.no_z_write)),
            format!("    {};    // Volume shadow\n", flag(p.volume_shadow)),
            format!("    {};    // No shadow\n", flag(p.no_shadow)),
            format!("    {};    // Prelit vertices\n", flag(p.prelit_vertices)),
        ],
    )?;
    flag_block(out, "BaseMaterialSkin", p.skinned, "Skinned")?;
    flag_block(out, "DoubleSidedMaterial", p.double_sided, "Double sided")?;
    flag_block(out, "BlendConstantSetting", p.blend_constant, "Blend constant")?;
    flag_block(out, "ForceTextureAddressWrapSetting", p.force_texture_wrap, "Force texture adress wrap")?;
    flag_block(out, "ForceTextureAddressClampSetting", p.force_texture_clamp, "Force texture adress clamp")?;
    if p.no_z_write {
        block(out, "ZBiasValue", &[format!("    {}; // ZBiasValue\n", float(p.z_bias))])?;
    }
    flag_block(out, "BaseMaterialSpecular", !p.no_base_specular, "Allow Base Material Specular")?;
    flag_block(
        out,
        "MaskDiffuseBlendsByDetailBlendMask",
        p.mask_diffuse_blends_by_detail_mask,
        "Mask Diffuse Blends By Detail Blend Mask",
    )?;
    flag_block(
        out,
        "MaskFinalAlphaBlendByDetailBlendMask",
        p.mask_final_alpha_by_detail_mask,
        "Mask Final Alpha Blend By Detail Blend Mask",
    )?;
    flag_block(
        out,
        "UseEmissiveAlphaAsHeatMap",
        p.emissive_alpha_as_heat_map,
        "Use Emissive Map as Alpha Heat Map",
    )?;
    write_specular_uv_channels(out, p)?;

    if sdk.supports_specular_material_script() && !p.material_script.is_empty() {
        material_script(out, &p.material_script)?;
    }

    block(out, "TemperatureScale", &[format!("    {}; // Temperature Scale\n", float(p.temperature_scale))])?;
    let c = p.detail_color;
    block(
        out,
        "DetailColor",
        &[format!("{};{};{};{};\n", float(c[0]), float(c[1]), float(c[2]), float(c[3]))],
    )?;
    block(
        out,
        "DetailTextureParameters",
        &[
            format!("    {}; // Detail Offset U\n", float(p.detail_offset_u)),
            format!("    {}; // Detail Offset V\n", float(p.detail_offset_v)),
            format!("    {}; // Detail Rotation\n", float(p.detail_rotation)),
            format!("    {}; // Detail Scale V\n", float(p.detail_scale_v)),
            format!("    \"{}\"; // Detail Blend Mode\n", p.detail_blend_mode),
            format!("    {}; // Detail Blend Weight\n", float(p.detail_blend_weight)),
            format!("    {}; // Use Detail Alpha As Blend Mask\n", flag(p.detail_alpha_as_blend_mask)),
        ],
    )?;

    texture_line(out, "DiffuseTextureFilename", data.diffuse_texture.as_ref())?;
    texture_line(out, "SpecularTextureFilename", data.specular_texture.as_ref())?;
    texture_line(out, "EmissiveTextureFilename", data.emissive_texture.as_ref())?;
    texture_line(out, "BumpTextureFilename", data.normal_texture.as_ref())?;
    texture_line(out, "ReflectionTextureFileName", data.environment_texture.as_ref())?;
    texture_line(out, "FresnelTextureFileName", data.fresnel_texture.as_ref())?;
    texture_line(out, "DetailTextureFileName", data.detail_texture.as_ref())?;

    out.unindent();
    out.write(&format!("}} // End of {record}\n"))?;
    out.unindent();
    out.write("} // End of Material\n")
}

fn write_specular_uv_channels<W: Write>(out: &mut XWriter<W>, p: &MaterialParams) -> Result<()> {
    for (record, channel) in [
        ("DiffuseTextureUVChannel", p.diffuse_uv_channel),
        ("SpecularTextureUVChannel", p.specular_uv_channel),
        ("BumpTextureUVChannel", p.bump_uv_channel),
        ("DetailTextureUVChannel", p.detail_uv_channel),
        ("EmissiveTextureUVChannel", p.emissive_uv_channel),
    ] {
        block(out, record, &[format!("   {channel};\n")])?;
    }
    Ok(())
}

fn write_pbr<W: Write>(out: &mut XWriter<W>, material: &Material, data: &MaterialChannelData, sdk: SdkVersion) -> Result<()> {
    let p = &material.params;
    out.write(&format!("PBRMaterial {} {{\n", safe_name(&material.name)))?;
    out.indent();
    out.write(&rgba(data.diffuse_color))?;
    out.write(&format!("{};\n", float(data.metallic)))?;
    out.write(&format!("{};\n", float(data.smoothness)))?;
    out.write(&format!("\"{}\";\n", p.render_mode))?;
    out.write(&format!("{};\n", float(p.masked_threshold)))?;
    out.write(&format!("{};\n", flag(p.alpha_to_coverage)))?;
    out.write(&format!("{};\n", flag(p.metallic_has_occlusion)))?;
    out.write(&format!("\"{}\";\n", p.metallic_source))?;
    out.write(&format!("\"{}\";\n", p.emissive_mode_pbr))?;
    out.write(&format!("{};\n", flag(p.assume_vertical_normal)))?;
    out.write(&format!("{};\n", flag(p.prelit_vertices)))?;
    out.write(&format!("{};\n", flag(p.double_sided)))?;
    out.write(&format!("{};\n", p.decal_order))?;

    texture_line(out, "AlbedoTextureFileName", data.diffuse_texture.as_ref())?;
    texture_line(out, "MetallicTextureFileName", data.metallic_texture.as_ref())?;
    texture_line(out, "NormalTextureFileName", data.normal_texture.as_ref())?;
    texture_line(out, "EmissiveTextureFileName", data.emissive_texture.as_ref())?;
    texture_line(out, "DetailTextureFileName", data.detail_texture.as_ref())?;
    texture_line(out, "ClearcoatTextureFileName", data.clearcoat_texture.as_ref())?;

    for (record, channel) in [
        ("AlbedoTextureUVChannel", p.albedo_uv_channel),
        ("MetallicTextureUVChannel", p.metallic_uv_channel),
        ("NormalTextureUVChannel", p.bump_uv_channel),
        ("EmissiveTextureUVChannel", p.emissive_uv_channel),
        ("DetailTextureUVChannel", p.detail_uv_channel),
        ("ClearcoatTextureUVChannel", p.clearcoat_uv_channel),
    ] {
        out.write(&format!("{record} {{ {channel}; }}\n"))?;
    }

    if sdk.supports_clear_coat() && p.metallic_has_reflection {
        out.write("MetallicHasReflectance { 1; }\n")?;
    }
    if sdk.supports_clear_coat() && p.clearcoat_contains_normals {
        out.write("ClearCoatContainsNormals { 1; }\n")?;
    }

    for (record, [x, y]) in [("NormalTextureScale", p.normal_scale), ("DetailTextureScale", p.detail_scale_xy)] {
        out.write(&format!("{record} {{\n"))?;
        out.indent();
        out.write(&format!("{};\n", float(x)))?;
        out.write(&format!("{};\n", float(y)))?;
        out.unindent();
        out.write("}\n")?;
    }

    if !p.material_script.is_empty() {
        material_script(out, &p.material_script)?;
    }

    out.unindent();
    out.write("} // End of PBRMaterial\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsxport_scene::snapshot::{NodeTree, ShaderNode};

    fn make_material(mode: MaterialMode, main: &str) -> Material {
        Material {
            name: "Hull.001".to_string(),
            mode,
            node_tree: NodeTree {
                nodes: vec![ShaderNode {
                    name: main.to_string(),
                    ..Default::default()
                }],
            },
            ..Default::default()
        }
    }

    fn render(material: &Material, config: &ExportConfig) -> String {
        let mut out = XWriter::new(Vec::new());
        write_material(&mut out, material, config).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_specular_record_layout() {
        let mut material = make_material(MaterialMode::Specular, "Specular BSDF");
        material.slots.diffuse = Some("hull.png".to_string());
        let text = render(&material, &ExportConfig::default());

        assert!(text.starts_with(
            "Material Hull_001 {\n   0.000000; 0.000000; 0.000000; 0.000000;;\n   1.000000;\n"
        ));
        assert!(text.contains("  TextureFilename {\"hull.dds\";}\n  DiffuseTextureFilename {\"hull.dds\";}\n  FS10Material {\n"));
        assert!(text.contains("    1;            // Use global env\n"));
        assert!(text.contains("    0; 0;  0.000000;  // Precipitation...\n"));
        assert!(text.contains("    \"One\"; \"Zero\";  // Src/Dest blend\n"));
        assert!(text.contains("    AlphaData {\n        0;    // ZTest Alpha\n"));
        assert!(text.contains("    BaseMaterialSpecular {\n        1;    // Allow Base Material Specular\n    }\n"));
        assert!(text.contains("    DiffuseTextureUVChannel {\n       1;\n    }\n"));
        assert!(!text.contains("ZBiasValue"));
        assert!(!text.contains("MaterialScript"));
        assert!(text.ends_with("    DiffuseTextureFilename {\"hull.dds\";}\n  } // End of FS10Material\n} // End of Material\n"));
    }

    #[test]
    fn test_specular_p3d_record_and_script() {
        let mut material = make_material(MaterialMode::Specular, "Specular");
        material.params.no_z_write = true;
        material.params.z_bias = 2.0;
        material.params.material_script = "C:\\scripts\\beacon.fx".to_string();

        let config = ExportConfig {
            sdk: SdkVersion::P3dv5,
            ..Default::default()
        };
        let text = render(&material, &config);
        assert!(text.contains("  P3DMaterial {\n"));
        assert!(text.contains("    ZBiasValue {\n         2.000000; // ZBiasValue\n    }\n"));
        assert!(text.contains("    MaterialScript {\n        \"beacon.fx\"; // MaterialScript\n    }\n"));
        assert!(text.contains("} // End of P3DMaterial\n"));

        let config = ExportConfig {
            sdk: SdkVersion::P3dv3,
            ..Default::default()
        };
        assert!(!render(&material, &config).contains("MaterialScript"));
    }

    #[test]
    fn test_pbr_record() {
        let mut material = make_material(MaterialMode::Pbr, "Principled BSDF");
        material.params.metallic_has_reflection = true;
        material.params.material_script = "glow.fx".to_string();
        let config = ExportConfig {
            sdk: SdkVersion::P3dv4,
            ..Default::default()
        };
        let text = render(&material, &config);
        assert!(text.starts_with("PBRMaterial Hull_001 {\n"));
        assert!(text.contains("  \"Opaque\";\n"));
        assert!(text.contains("  NormalTextureUVChannel { 1; }\n"));
        assert!(!text.contains("MetallicHasReflectance"));
        assert!(text.contains("  NormalTextureScale {\n     1.000000;\n     1.000000;\n  }\n"));
        assert!(text.contains("  MaterialScript {\n      \"glow.fx\"; // MaterialScript\n  }\n"));
        assert!(text.ends_with("} // End of PBRMaterial\n"));

        let config = ExportConfig {
            sdk: SdkVersion::P3dv6,
            ..Default::default()
        };
        assert!(render(&material, &config).contains("  MetallicHasReflectance { 1; }\n"));
    }
}
