//! Number and list formatting shared by the block writers

use nalgebra::Matrix4;
use std::io::Write;

use fsxport_core::Result;

use crate::writer::XWriter;

/// Scene file float, width 9 with six decimals
pub fn float(v: f32) -> String {
    format!("{v:9.6}")
}

/// Animation XML float, width 8 with six decimals
pub fn xml_float(v: f32) -> String {
    format!("{v:8.6}")
}

/// `x;y;z;` with scene file floats
pub fn vector3(v: [f32; 3]) -> String {
    format!("{:9.6};{:9.6};{:9.6};", v[0], v[1], v[2])
}

/// Write a transform as four lines, one column per line
///
/// The translation ends up on the last line, which closes with `;;`.
pub fn write_matrix<W: Write>(out: &mut XWriter<W>, m: &Matrix4<f32>) -> Result<()> {
    for col in 0..4 {
        let end = if col == 3 { ";;" } else { "," };
        out.write(&format!(
            "{:9.6},{:9.6},{:9.6},{:9.6}{end}\n",
            m[(0, col)],
            m[(1, col)],
            m[(2, col)],
            m[(3, col)]
        ))?;
    }
    Ok(())
}

/// Write one item per line, separated by `,` and closed by `;`
///
/// Items are indented, separators are not.
pub fn write_list<W, I>(out: &mut XWriter<W>, items: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = String>,
    I::IntoIter: ExactSizeIterator,
{
    let items = items.into_iter();
    let last = items.len().saturating_sub(1);
    for (i, item) in items.enumerate() {
        out.write(&item)?;
        out.write_raw(if i == last { ";\n" } else { ",\n" })?;
    }
    Ok(())
}
