//! `.xanim` animation library writer

use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use fsxport_core::{Error, Result, ResultExt};

use super::Animation;
use crate::format::xml_float;
use crate::modeldef::ModelDef;

/// Library version understood by the model compiler
pub const ANIMLIB_VERSION: &str = "9.1";

/// Build the animation document
///
/// One `<Anim>` per tag, carrying the dictionary attributes, holding a
/// rotation and a location stream for each animation with that tag.
pub fn render_xanim(tags: &[String], animations: &[Animation], modeldef: &ModelDef) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("ISO-8859-1"), None)))
        .map_err(Error::xml)?;

    let mut root = BytesStart::new("AnimLib");
    root.push_attribute(("version", ANIMLIB_VERSION));
    writer.write_event(Event::Start(root)).map_err(Error::xml)?;

    for tag in tags {
        let def = modeldef
            .animation(tag)
            .ok_or_else(|| Error::MissingAnimationTag { tag: tag.clone() })?;
        let matching: Vec<&Animation> = animations.iter().filter(|a| &a.tag == tag).collect();

        let mut anim = BytesStart::new("Anim");
        for (key, value) in &def.attributes {
            anim.push_attribute((key.as_str(), value.as_str()));
        }
        if let (None, Some(first)) = (def.attribute("length"), matching.first()) {
            anim.push_attribute(("length", xml_float(first.key_range).as_str()));
        }

        if matching.is_empty() {
            writer.write_event(Event::Empty(anim)).map_err(Error::xml)?;
            continue;
        }
        writer.write_event(Event::Start(anim)).map_err(Error::xml)?;
        for animation in matching {
            tracing::debug!(part = %animation.safe_name, tag = %tag, "writing animation streams");
            write_rotation_stream(&mut writer, animation)?;
            write_location_stream(&mut writer, animation)?;
        }
        writer.write_event(Event::End(BytesEnd::new("Anim"))).map_err(Error::xml)?;
    }

    writer.write_event(Event::End(BytesEnd::new("AnimLib"))).map_err(Error::xml)?;
    Ok(to_latin1(&String::from_utf8_lossy(&writer.into_inner().into_inner())))
}

/// Render and store the document at `path`
pub fn write_xanim(path: &Path, tags: &[String], animations: &[Animation], modeldef: &ModelDef) -> Result<()> {
    let bytes = render_xanim(tags, animations, modeldef)?;
    std::fs::write(path, bytes)
        .map_err(Error::from)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), tags = tags.len(), "animation file complete");
    Ok(())
}

fn stream_start<'a>(name: &'a str, id: &'a str, animation: &'a Animation) -> BytesStart<'a> {
    let mut stream = BytesStart::new("AnimStream");
    stream.push_attribute(("name", name));
    stream.push_attribute(("id", id));
    stream.push_attribute(("partName", animation.safe_name.as_str()));
    stream.push_attribute(("length", xml_float(animation.key_range).as_str()));
    stream
}

fn write_keyframe<W: std::io::Write>(writer: &mut Writer<W>, frame: i32, data: &str, kind: &str) -> Result<()> {
    let mut key = BytesStart::new("Keyframe");
    key.push_attribute(("time", xml_float(frame as f32).as_str()));
    key.push_attribute(("data", data));
    key.push_attribute(("type", kind));
    writer.write_event(Event::Empty(key)).map_err(Error::xml)?;
    Ok(())
}

fn write_rotation_stream<W: std::io::Write>(writer: &mut Writer<W>, animation: &Animation) -> Result<()> {
    writer
        .write_event(Event::Start(stream_start("Rotation", "0", animation)))
        .map_err(Error::xml)?;
    for (&frame, q) in &animation.rotation_keys {
        let data = format!(
            "{};{};{};{}",
            xml_float(-q.i),
            xml_float(-q.j),
            xml_float(-q.k),
            xml_float(q.w)
        );
        write_keyframe(writer, frame, &data, "Quaternion")?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("AnimStream")))
        .map_err(Error::xml)?;
    Ok(())
}

fn write_location_stream<W: std::io::Write>(writer: &mut Writer<W>, animation: &Animation) -> Result<()> {
    writer
        .write_event(Event::Start(stream_start("Location", "2", animation)))
        .map_err(Error::xml)?;
    for (&frame, p) in &animation.position_keys {
        let data = format!("{};{};{};0.0", xml_float(p.x), xml_float(p.y), xml_float(p.z));
        write_keyframe(writer, frame, &data, "Vector")?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("AnimStream")))
        .map_err(Error::xml)?;
    Ok(())
}

/// Encode as ISO-8859-1, characters outside it become `?`
fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
