//! File-level records: header, GUID, hierarchy outline and wrapper frames

use chrono::{DateTime, Local};
use std::io::Write;

use fsxport_core::types::friendly_name_for_output;
use fsxport_core::{Guid, ModelIdentity, Result};
use fsxport_scene::SceneForest;

use crate::format::float;
use crate::writer::XWriter;

/// Exporter version written into the header comment
pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic line, comments and generator stamp
pub fn write_header<W: Write>(out: &mut XWriter<W>, application: &str, timestamp: &DateTime<Local>) -> Result<()> {
    let application = if application.is_empty() { "unknown host" } else { application };
    out.write("xof 0302txt 0032\n\n")?;
    out.write("// Direct3D .x file translation of context.scene\n")?;
    out.write(&format!(
        "// Generated by {application}, fsxport Version {EXPORTER_VERSION}\n"
    ))?;
    out.write(&format!("// {}\n\n\n", timestamp.format("%Y-%m-%d  %H:%M:%S")))
}

/// GUID record, optional bounds overrides and the shadow map flag
pub fn write_guid<W: Write>(out: &mut XWriter<W>, identity: &ModelIdentity) -> Result<()> {
    let friendly = friendly_name_for_output(&identity.friendly_name)?;
    let guid = Guid::parse(&identity.guid)?;

    out.write(&format!("\nGuidToName {{\n    \"{{{guid}}}\";\n    \"{friendly}\";\n}}\n\n"))?;

    if let Some(bounds) = &identity.bounding_box {
        out.write("OverrideBoundingBox {\n1;\n")?;
        for corner in [bounds.min, bounds.max] {
            out.write(&format!("{};{};{};\n", float(corner.x), float(corner.y), float(corner.z)))?;
        }
        out.write("}\n\n")?;
    }
    if let Some(radius) = identity.radius {
        out.write(&format!("OverrideRadius {{\n1;\n{};\n}}\n\n", float(radius)))?;
    }
    out.write("ShadowMapReady {\n    0;\n}\n\n\n")
}

/// Comment block listing the export hierarchy
pub fn write_hierarchy<W: Write>(out: &mut XWriter<W>, forest: &SceneForest) -> Result<()> {
    out.write("//=====================\n// FILE NODE HIERARCHY\n//=====================\n")?;
    out.write("// Scene_Root\n")?;
    for (depth, id) in forest.depth_first() {
        if let Some(node) = forest.get(id) {
            out.write(&format!("// {}{}\n", "  ".repeat(depth + 1), node.safe_name))?;
        }
    }
    out.write("\n")
}

/// Open the scale, unit and axis frames wrapping the whole scene
pub fn open_root_frames<W: Write>(out: &mut XWriter<W>) -> Result<()> {
    out.write("Frame frm-MasterScale {\n")?;
    out.write(
        "FrameTransformMatrix {\n   0.000977, 0.0, 0.0, 0.0,\n   0.0, 0.000977, 0.0, 0.0,\n   \
         0.0, 0.0, 0.000977, 0.0,\n   0.0, 0.0, 0.0, 1.0;;\n}  // End frm-MasterScale FrameTransformMatrix\n",
    )?;
    out.write("Frame frm-MasterUnitConversion {\n")?;
    out.write(
        "FrameTransformMatrix {\n   1024.000000, 0.0, 0.0, 0.0,\n   0.0, 1024.000000, 0.0, 0.0,\n   \
         0.0, 0.0, 1024.000000, 0.0,\n   0.0, 0.0, 0.0, 1.0;;\n}  // End frm-MasterUnitConversion FrameTransformMatrix\n",
    )?;
    out.write("Frame RotateAroundX {\n")?;
    // swaps Y and Z
    out.write(
        "FrameTransformMatrix {\n   1.0, 0.0, 0.0, 0.0,\n   0.0, 0.0, 1.0, 0.0,\n   \
         0.0, 1.0, 0.0, 0.0,\n   0.0, 0.0, 0.0, 1.0;;\n}  // End Frame RotateAroundX FrameTransformMatrix\n",
    )?;
    out.indent();
    Ok(())
}

/// Close the frames opened by [`open_root_frames`]
pub fn close_root_frames<W: Write>(out: &mut XWriter<W>) -> Result<()> {
    out.unindent();
    out.write("} // End of frm-RotateAroundX\n")?;
    out.write("} // End of frm-MasterUnitConversion\n")?;
    out.write("} // End of frm-Masterscale\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fsxport_core::{BoundingBox, Error, Vec3};

    fn render(f: impl FnOnce(&mut XWriter<Vec<u8>>) -> Result<()>) -> Result<String> {
        let mut out = XWriter::new(Vec::new());
        f(&mut out)?;
        Ok(String::from_utf8(out.into_inner()).unwrap())
    }

    fn make_identity() -> ModelIdentity {
        ModelIdentity {
            guid: "0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9".to_string(),
            friendly_name: "My Hangar".to_string(),
            bounding_box: None,
            radius: None,
        }
    }

    #[test]
    fn test_header_lines() {
        let stamp = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let text = render(|out| write_header(out, "Blender 3.6.2", &stamp)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "xof 0302txt 0032");
        assert_eq!(lines[1], "");
        assert_eq!(lines[3], format!("// Generated by Blender 3.6.2, fsxport Version {EXPORTER_VERSION}"));
        assert_eq!(lines[4], "// 2024-03-09  07:05:01");
    }

    #[test]
    fn test_guid_record() {
        let text = render(|out| write_guid(out, &make_identity())).unwrap();
        assert!(text.starts_with(
            "\nGuidToName {\n    \"{0A1B2C3D-4E5F-6071-8293-A4B5C6D7E8F9}\";\n    \"My_Hangar\";\n}\n\n"
        ));
        assert!(text.ends_with("ShadowMapReady {\n    0;\n}\n\n\n"));
        assert!(!text.contains("Override"));
    }

    #[test]
    fn test_overrides() {
        let mut identity = make_identity();
        identity.bounding_box = Some(BoundingBox::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0)));
        identity.radius = Some(12.5);
        let text = render(|out| write_guid(out, &identity)).unwrap();
        assert!(text.contains("OverrideBoundingBox {\n1;\n-1.000000;-2.000000;-3.000000;\n 1.000000; 2.000000; 3.000000;\n}\n\n"));
        assert!(text.contains("OverrideRadius {\n1;\n12.500000;\n}\n\n"));
    }

    #[test]
    fn test_invalid_guid_writes_nothing() {
        let mut identity = make_identity();
        identity.guid = "not-a-guid".to_string();
        let mut out = XWriter::new(Vec::new());
        let err = write_guid(&mut out, &identity).unwrap_err();
        assert!(matches!(err, Error::InvalidGuid { .. }));
        assert!(out.into_inner().is_empty());
    }

    #[test]
    fn test_root_frames_balance() {
        let text = render(|out| {
            open_root_frames(out)?;
            out.write("Frame frm-x {\n")?;
            close_root_frames(out)
        })
        .unwrap();
        assert!(text.contains("\n  Frame frm-x {\n"));
        assert!(text.ends_with("} // End of frm-Masterscale\n"));
    }
}
