//! `MeshTextureCoords` blocks

use std::io::Write;

use fsxport_core::Result;

use crate::format::{float, write_list};
use crate::writer::XWriter;

/// Which texture coordinate block to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvChannel {
    /// First UV layer
    Primary,
    /// Second UV layer, Prepar3D v4 and later
    Secondary,
}

/// Write one UV layer, one entry per corner, with V flipped
pub fn write_uv_block<W: Write>(out: &mut XWriter<W>, safe_name: &str, uvs: &[[f32; 2]], channel: UvChannel) -> Result<()> {
    let (open, close) = match channel {
        UvChannel::Primary => (
            format!("MeshTextureCoords {{ // {safe_name} UV coordinates\n"),
            format!("}} // End of {safe_name} UV coordinates\n"),
        ),
        UvChannel::Secondary => (
            format!("MeshTextureCoords2 {{ // {safe_name} UV coordinates, channel 2\n"),
            format!("}} // End of {safe_name} UV 2 coordinates\n"),
        ),
    };

    out.write(&open)?;
    out.indent();
    out.write(&format!("{};\n", uvs.len()))?;
    write_list(out, uvs.iter().map(|[u, v]| format!("{};{};", float(*u), float(1.0 - v))))?;
    out.unindent();
    out.write(&close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(channel: UvChannel) -> String {
        let mut out = XWriter::new(Vec::new());
        write_uv_block(&mut out, "Wing", &[[0.25, 0.0], [1.0, 0.75]], channel).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_primary_flips_v() {
        assert_eq!(
            render(UvChannel::Primary),
            "MeshTextureCoords { // Wing UV coordinates\n  2;\n   0.250000; 1.000000;,\n   1.000000; 0.250000;;\n\
             } // End of Wing UV coordinates\n"
        );
    }

    #[test]
    fn test_secondary_headers() {
        let text = render(UvChannel::Secondary);
        assert!(text.starts_with("MeshTextureCoords2 { // Wing UV coordinates, channel 2\n"));
        assert!(text.ends_with("} // End of Wing UV 2 coordinates\n"));
    }
}
