//! Scenery placement XML and BGL compilation

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use fsxport_core::naming::replace_extension;
use fsxport_core::{Error, ExportConfig, Guid, PlacementOptions, Result, ResultExt};

use crate::compiler::{CompileOutcome, ToolProcess};

/// Placement document for the compiled model
///
/// One `SceneryObject` referencing the model by GUID, followed by the
/// `ModelData` entry that embeds the `.MDL` into the BGL.
pub fn render_placement(config: &ExportConfig, placement: &PlacementOptions) -> Result<Vec<u8>> {
    let guid = Guid::parse(&config.model.guid)?;
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("ISO-8859-1"), None)))
        .map_err(Error::xml)?;

    let mut root = BytesStart::new("FSData");
    root.push_attribute(("version", "9.0"));
    root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
    root.push_attribute(("xsi:noNamespaceSchemaLocation", "bglcomp.xsd"));
    writer.write_event(Event::Start(root)).map_err(Error::xml)?;

    let mut scenery = BytesStart::new("SceneryObject");
    let altitude = format!("{}{}", placement.altitude, placement.altitude_unit.suffix());
    let pitch = placement.pitch.to_string();
    let bank = placement.bank.to_string();
    let heading = placement.heading.to_string();
    scenery.push_attribute(("lat", placement.latitude.as_str()));
    scenery.push_attribute(("lon", placement.longitude.as_str()));
    scenery.push_attribute(("alt", altitude.as_str()));
    scenery.push_attribute(("pitch", pitch.as_str()));
    scenery.push_attribute(("bank", bank.as_str()));
    scenery.push_attribute(("heading", heading.as_str()));
    scenery.push_attribute(("altitudeIsAgl", if placement.altitude_is_agl { "TRUE" } else { "FALSE" }));
    scenery.push_attribute(("imageComplexity", placement.image_complexity.as_str()));
    writer.write_event(Event::Start(scenery)).map_err(Error::xml)?;

    if placement.no_autogen_suppression {
        writer
            .write_event(Event::Empty(BytesStart::new("NoAutogenSuppression")))
            .map_err(Error::xml)?;
    }
    let mut library = BytesStart::new("LibraryObject");
    let name = format!("{{{guid}}}");
    library.push_attribute(("name", name.as_str()));
    library.push_attribute(("scale", "1.0"));
    writer.write_event(Event::Empty(library)).map_err(Error::xml)?;
    writer
        .write_event(Event::End(BytesEnd::new("SceneryObject")))
        .map_err(Error::xml)?;

    let mut model = BytesStart::new("ModelData");
    let source = config.mdl_path().display().to_string();
    model.push_attribute(("sourceFile", source.as_str()));
    writer.write_event(Event::Empty(model)).map_err(Error::xml)?;

    writer.write_event(Event::End(BytesEnd::new("FSData"))).map_err(Error::xml)?;
    Ok(writer.into_inner().into_inner())
}

/// Write `<output>.xml` and return its path
pub fn write_placement(config: &ExportConfig, placement: &PlacementOptions) -> Result<PathBuf> {
    let path = config.artifact_path(".xml");
    let bytes = render_placement(config, placement)?;
    std::fs::write(&path, bytes)
        .map_err(Error::from)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "placement file written");
    Ok(path)
}

/// The SDK's BGL compiler
#[derive(Debug, Clone)]
pub struct BglComp {
    process: ToolProcess,
}

impl BglComp {
    /// Compiler at `executable`
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            process: ToolProcess::new("bglcomp", executable, timeout),
        }
    }

    /// Compiler located through the configuration
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let executable = config.compiler.bglcomp(config.sdk).ok_or_else(|| Error::MissingConfig {
            key: "compiler.bglcomp_path".to_string(),
        })?;
        Ok(Self::new(executable, Duration::from_secs(config.compiler.timeout_secs)))
    }

    /// Compile a placement file into the `.BGL` beside it
    pub fn compile(&self, placement_xml: &Path) -> Result<CompileOutcome> {
        let run = self.process.run(&[placement_xml.as_os_str().to_os_string()])?;
        self.process.outcome(run, &replace_extension(placement_xml, ".BGL"))
    }
}
