//! Export configuration
//!
//! One [`ExportConfig`] drives a whole export run. It deserializes from
//! YAML with every field optional, and [`ExportConfig::validate`] must pass
//! before any output file is opened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result, ResultExt};
use crate::naming::replace_extension;
use crate::types::{friendly_name_for_output, BoundingBox, Guid};

/// Target simulator SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkVersion {
    /// Flight Simulator X
    #[default]
    Fsx,
    /// Prepar3D v1
    P3dv1,
    /// Prepar3D v2
    P3dv2,
    /// Prepar3D v3
    P3dv3,
    /// Prepar3D v4
    P3dv4,
    /// Prepar3D v5
    P3dv5,
    /// Prepar3D v6
    P3dv6,
}

impl SdkVersion {
    /// All supported versions, oldest first
    pub const ALL: [SdkVersion; 7] = [
        SdkVersion::Fsx,
        SdkVersion::P3dv1,
        SdkVersion::P3dv2,
        SdkVersion::P3dv3,
        SdkVersion::P3dv4,
        SdkVersion::P3dv5,
        SdkVersion::P3dv6,
    ];

    /// Lowercase identifier
    pub const fn as_str(self) -> &'static str {
        match self {
            SdkVersion::Fsx => "fsx",
            SdkVersion::P3dv1 => "p3dv1",
            SdkVersion::P3dv2 => "p3dv2",
            SdkVersion::P3dv3 => "p3dv3",
            SdkVersion::P3dv4 => "p3dv4",
            SdkVersion::P3dv5 => "p3dv5",
            SdkVersion::P3dv6 => "p3dv6",
        }
    }

    /// Uses the `FS10Material` record instead of `P3DMaterial`
    pub const fn uses_fs10_material(self) -> bool {
        matches!(self, SdkVersion::Fsx | SdkVersion::P3dv1)
    }

    /// Understands `PBRMaterial` records
    pub const fn supports_pbr(self) -> bool {
        !self.uses_fs10_material()
    }

    /// Understands a second UV channel
    pub const fn supports_second_uv(self) -> bool {
        matches!(self, SdkVersion::P3dv4 | SdkVersion::P3dv5 | SdkVersion::P3dv6)
    }

    /// Understands clear coat and metallic reflectance records
    pub const fn supports_clear_coat(self) -> bool {
        matches!(self, SdkVersion::P3dv5 | SdkVersion::P3dv6)
    }

    /// Accepts `MaterialScript` on specular materials
    pub const fn supports_specular_material_script(self) -> bool {
        matches!(self, SdkVersion::Fsx | SdkVersion::P3dv5 | SdkVersion::P3dv6)
    }

    /// XToMdl location relative to the SDK root
    pub const fn xtomdl_relative_path(self) -> &'static str {
        match self {
            SdkVersion::Fsx | SdkVersion::P3dv1 => "Environment Kit\\Modeling SDK\\3DSM7\\Plugins\\XToMdl.exe",
            SdkVersion::P3dv2 | SdkVersion::P3dv3 => "Modeling SDK\\3DSM7\\Plugins\\XToMdl.exe",
            SdkVersion::P3dv4 | SdkVersion::P3dv5 | SdkVersion::P3dv6 => {
                "Modeling\\3ds Max\\Common\\Plugins\\XToMdl.exe"
            }
        }
    }

    /// BglComp location relative to the SDK root
    pub const fn bglcomp_relative_path(self) -> &'static str {
        match self {
            SdkVersion::Fsx | SdkVersion::P3dv1 => "Environment Kit\\BGL Compiler SDK\\BglComp.exe",
            SdkVersion::P3dv2 | SdkVersion::P3dv3 => "Environment SDK\\BGL Compiler SDK\\BglComp.exe",
            SdkVersion::P3dv4 | SdkVersion::P3dv5 | SdkVersion::P3dv6 => "World\\Scenery\\bglcomp.exe",
        }
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdkVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == lower)
            .ok_or_else(|| Error::invalid_config(format!("Unknown SDK version: {s}")))
    }
}

/// Model identity written into the GUID record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelIdentity {
    /// GUID text, validated on export
    pub guid: String,
    /// Friendly name, non-empty ASCII
    pub friendly_name: String,
    /// Optional bounding box override
    pub bounding_box: Option<BoundingBox>,
    /// Optional radius override
    pub radius: Option<f32>,
}

/// External compiler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Run XToMdl after writing the scene
    pub enabled: bool,
    /// SDK root used to locate the tools
    pub sdk_root: Option<PathBuf>,
    /// Explicit XToMdl path, overrides the SDK layout
    pub xtomdl_path: Option<PathBuf>,
    /// Explicit BglComp path, overrides the SDK layout
    pub bglcomp_path: Option<PathBuf>,
    /// Pass `/WRITETOFILE` to flush intermediate data
    pub write_to_file: bool,
    /// Pass `/XMLSAMPLE`
    pub xml_sample: bool,
    /// Seconds each tool may run before it is killed
    pub timeout_secs: u64,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            sdk_root: None,
            xtomdl_path: None,
            bglcomp_path: None,
            write_to_file: false,
            xml_sample: false,
            timeout_secs: 300,
        }
    }
}

impl CompilerOptions {
    /// Resolve the XToMdl executable for a given SDK
    pub fn xtomdl(&self, sdk: SdkVersion) -> Option<PathBuf> {
        self.xtomdl_path
            .clone()
            .or_else(|| self.sdk_root.as_ref().map(|root| join_windows(root, sdk.xtomdl_relative_path())))
    }

    /// Resolve the BglComp executable for a given SDK
    pub fn bglcomp(&self, sdk: SdkVersion) -> Option<PathBuf> {
        self.bglcomp_path
            .clone()
            .or_else(|| self.sdk_root.as_ref().map(|root| join_windows(root, sdk.bglcomp_relative_path())))
    }
}

fn join_windows(root: &Path, relative: &str) -> PathBuf {
    relative.split('\\').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Altitude unit of a placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AltitudeUnit {
    /// Meters
    #[default]
    #[serde(rename = "M")]
    Meters,
    /// Feet
    #[serde(rename = "F")]
    Feet,
}

impl AltitudeUnit {
    /// Suffix used in the placement XML
    pub const fn suffix(self) -> &'static str {
        match self {
            AltitudeUnit::Meters => "M",
            AltitudeUnit::Feet => "F",
        }
    }
}

/// Scenery placement written to `<output>.xml` and compiled to a BGL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementOptions {
    /// Latitude text as BglComp expects it
    pub latitude: String,
    /// Longitude text as BglComp expects it
    pub longitude: String,
    /// Altitude value
    pub altitude: f64,
    /// Altitude unit
    pub altitude_unit: AltitudeUnit,
    /// Altitude is above ground level
    pub altitude_is_agl: bool,
    /// Pitch in degrees
    pub pitch: f64,
    /// Bank in degrees
    pub bank: f64,
    /// Heading in degrees
    pub heading: f64,
    /// Scenery complexity class
    pub image_complexity: String,
    /// Emit `<NoAutogenSuppression />`
    pub no_autogen_suppression: bool,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            latitude: "0.0".to_string(),
            longitude: "0.0".to_string(),
            altitude: 0.0,
            altitude_unit: AltitudeUnit::Meters,
            altitude_is_agl: true,
            pitch: 0.0,
            bank: 0.0,
            heading: 0.0,
            image_complexity: "NORMAL".to_string(),
            no_autogen_suppression: false,
        }
    }
}

/// Full configuration of one export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Destination `.x` file
    pub output_path: PathBuf,
    /// Use the modifier-evaluated mesh when the snapshot carries one
    pub apply_modifiers: bool,
    /// Only export selected objects
    pub export_selection: bool,
    /// Write `.xanim` keyframes for tagged nodes
    pub export_animation: bool,
    /// Write bones and skin weights
    pub export_skin_weights: bool,
    /// Target SDK
    pub sdk: SdkVersion,
    /// Reference textures as `.bmp` instead of `.dds`
    pub use_bmp: bool,
    /// Also log to `<output>-log.txt`
    pub use_logfile: bool,
    /// Animation definition dictionary
    pub modeldef_path: Option<PathBuf>,
    /// GUID record contents
    pub model: ModelIdentity,
    /// External compiler settings
    pub compiler: CompilerOptions,
    /// Scenery placement, compiled after the model when set
    pub placement: Option<PlacementOptions>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("model.x"),
            apply_modifiers: true,
            export_selection: false,
            export_animation: false,
            export_skin_weights: false,
            sdk: SdkVersion::default(),
            use_bmp: false,
            use_logfile: false,
            modeldef_path: None,
            model: ModelIdentity::default(),
            compiler: CompilerOptions::default(),
            placement: None,
        }
    }
}

impl ExportConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text).with_context(|| format!("reading config {}", path.display()))
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check everything that must hold before the scene file is opened
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::MissingConfig {
                key: "output_path".to_string(),
            });
        }

        friendly_name_for_output(&self.model.friendly_name)?;
        Guid::parse(&self.model.guid)?;

        if let Some(bb) = &self.model.bounding_box {
            if !bb.is_ordered() {
                return Err(Error::invalid_config("bounding box min exceeds max"));
            }
        }
        if let Some(radius) = self.model.radius {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(Error::invalid_config(format!("invalid radius override {radius}")));
            }
        }

        if self.export_animation {
            match &self.modeldef_path {
                None => {
                    return Err(Error::MissingConfig {
                        key: "modeldef_path".to_string(),
                    })
                }
                Some(path) if !path.exists() => {
                    return Err(Error::ModelDef {
                        path: path.clone(),
                        message: "file does not exist".to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        if self.compiler.enabled && self.compiler.xtomdl(self.sdk).is_none() {
            return Err(Error::MissingConfig {
                key: "compiler.sdk_root".to_string(),
            });
        }
        if self.compiler.enabled && self.placement.is_some() && self.compiler.bglcomp(self.sdk).is_none() {
            return Err(Error::MissingConfig {
                key: "compiler.bglcomp_path".to_string(),
            });
        }

        Ok(())
    }

    /// Sibling artifact path sharing the output stem
    pub fn artifact_path(&self, ext: &str) -> PathBuf {
        replace_extension(&self.output_path, ext)
    }

    /// Animation XML path
    pub fn xanim_path(&self) -> PathBuf {
        self.artifact_path(".xanim")
    }

    /// Compiled model path
    pub fn mdl_path(&self) -> PathBuf {
        self.artifact_path(".MDL")
    }

    /// Log file path
    pub fn log_path(&self) -> PathBuf {
        self.artifact_path("-log.txt")
    }
}
