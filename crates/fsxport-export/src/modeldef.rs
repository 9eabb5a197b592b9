//! ModelDef dictionary reader
//!
//! Only the root-level `<Animation>` elements matter here. Their attributes
//! are kept in document order so they can be copied verbatim onto the
//! `<Anim>` elements of the animation file.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use fsxport_core::{Error, Result};

/// One `<Animation>` definition
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDef {
    /// Attributes in document order, `name` included
    pub attributes: Vec<(String, String)>,
}

impl AnimationDef {
    /// Value of attribute `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Tag name
    pub fn name(&self) -> &str {
        self.attribute("name").unwrap_or_default()
    }

    /// Declared length in frames, fractional part dropped
    ///
    /// `None` when the attribute is absent or not a number.
    pub fn length(&self) -> Option<u32> {
        let value: f64 = self.attribute("length")?.trim().parse().ok()?;
        (value >= 0.0).then(|| value.trunc() as u32)
    }
}

/// Parsed dictionary
#[derive(Debug, Clone, Default)]
pub struct ModelDef {
    animations: Vec<AnimationDef>,
}

impl ModelDef {
    /// Read a dictionary file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| Error::ModelDef {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse dictionary text
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut animations = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            match reader.read_event().map_err(Error::xml)? {
                Event::Start(e) => {
                    if depth == 1 && e.name().as_ref() == b"Animation" {
                        animations.push(read_definition(&e)?);
                    }
                    seen_root = true;
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 1 && e.name().as_ref() == b"Animation" {
                        animations.push(read_definition(&e)?);
                    }
                    seen_root = true;
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(Error::xml("document has no root element"));
        }
        tracing::debug!(animations = animations.len(), "parsed modeldef");
        Ok(Self { animations })
    }

    /// Definition of tag `name`, first match wins
    pub fn animation(&self, name: &str) -> Option<&AnimationDef> {
        self.animations.iter().find(|a| a.name() == name)
    }

    /// All definitions in document order
    pub fn animations(&self) -> &[AnimationDef] {
        &self.animations
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// Check whether no animation is defined
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

fn read_definition(element: &BytesStart<'_>) -> Result<AnimationDef> {
    let mut attributes = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(Error::xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(Error::xml)?.into_owned();
        attributes.push((key, value));
    }
    Ok(AnimationDef { attributes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DICT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ModelInfo>
    <Animation name="l_aileron_percent_key" guid="a4b5f5c1-0d6b-4d8b-8a6d-3a5fd8ec1b41" length="100" type="Sim" typeParam2="l_aileron_percent_key" typeParam="AutoPlay" />
    <Animation name="ambient_spin" guid="1c2d3e4f-0000-0000-0000-000000000001" type="Standard" typeParam="Ambient" />
    <Animation name="gear_half" length="50.9" type="Sim">
        <Animation name="nested_is_ignored" length="3" />
    </Animation>
    <PartInfo><Name>x</Name></PartInfo>
</ModelInfo>"#;

    #[test]
    fn test_root_level_animations_in_order() {
        let def = ModelDef::parse(DICT).unwrap();
        let names: Vec<&str> = def.animations().iter().map(AnimationDef::name).collect();
        assert_eq!(names, vec!["l_aileron_percent_key", "ambient_spin", "gear_half"]);
        assert!(def.animation("nested_is_ignored").is_none());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let def = ModelDef::parse(DICT).unwrap();
        let keys: Vec<&str> = def
            .animation("l_aileron_percent_key")
            .unwrap()
            .attributes
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["name", "guid", "length", "type", "typeParam2", "typeParam"]);
    }

    #[test]
    fn test_length_truncated() {
        let def = ModelDef::parse(DICT).unwrap();
        assert_eq!(def.animation("l_aileron_percent_key").unwrap().length(), Some(100));
        assert_eq!(def.animation("gear_half").unwrap().length(), Some(50));
        assert_eq!(def.animation("ambient_spin").unwrap().length(), None);
    }

    #[test]
    fn test_malformed_document() {
        assert!(ModelDef::parse("<ModelInfo><Animation name=\"a\"></ModelInfo>").is_err());
        assert!(ModelDef::parse("").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        assert!(matches!(
            ModelDef::load("/nonexistent/modeldef.xml"),
            Err(Error::FileNotFound(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<ModelInfo><Animation name=\"a\"></Other></ModelInfo>").unwrap();
        let err = ModelDef::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::ModelDef { .. }));
        assert!(err.is_configuration_error());
    }
}
