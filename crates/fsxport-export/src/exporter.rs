//! Export orchestration
//!
//! One run goes through index, selection, skin capture, armature
//! flattening, the scene file, the animation file and finally the external
//! compilers. Everything before the scene file is opened can fail without
//! leaving anything on disk.

use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use fsxport_core::{Error, ExportConfig, Result};
use fsxport_scene::{flatten_armatures, prune, FrameEvaluator, FrameGuard, SceneDescription, SceneForest};

use crate::animation::{animation_tags, generate_all, write_xanim, Animation};
use crate::compiler::{CompileOutcome, CompileRequest, ModelCompiler, XToMdl};
use crate::frame::FrameWriter;
use crate::mesh::SkinBindings;
use crate::modeldef::ModelDef;
use crate::placement::{write_placement, BglComp};
use crate::scene_file::{close_root_frames, open_root_frames, write_guid, write_header, write_hierarchy};
use crate::templates::write_templates;
use crate::writer::{XFile, XWriter};

/// Callback receiving progress updates
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Stage of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Building and rewriting the export forest
    Indexing,
    /// Writing root frames
    Writing,
    /// Sampling animations
    Animating,
    /// Running external compilers
    Compiling,
    /// Run finished
    Complete,
}

/// Progress information during an export
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current stage
    pub phase: ExportPhase,
    /// Items done in this stage
    pub current: usize,
    /// Items in this stage
    pub total: usize,
    /// Item being processed
    pub current_item: Option<String>,
}

/// Forest ready to be written
#[derive(Debug, Clone)]
pub struct PreparedScene {
    /// Export forest, selection applied and armatures removed
    pub forest: SceneForest,
    /// Skin bindings captured before flattening
    pub skin: SkinBindings,
    /// Nodes dropped by selection
    pub pruned: Vec<String>,
    /// Armatures removed by flattening
    pub flattened: Vec<String>,
}

/// One generated animation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationSummary {
    /// Part name
    pub part: String,
    /// Dictionary tag
    pub tag: String,
    /// Last animated frame
    pub key_range: f32,
    /// Number of keyframes
    pub keys: usize,
}

impl From<&Animation> for AnimationSummary {
    fn from(animation: &Animation) -> Self {
        Self {
            part: animation.safe_name.clone(),
            tag: animation.tag.clone(),
            key_range: animation.key_range,
            keys: animation.rotation_keys.len(),
        }
    }
}

/// What an export produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// Scene file written
    pub scene_path: PathBuf,
    /// Nodes written
    pub nodes: usize,
    /// Root frame names in output order
    pub roots: Vec<String>,
    /// Nodes dropped by selection
    pub pruned: Vec<String>,
    /// Armatures removed by flattening
    pub flattened: Vec<String>,
    /// Meshes written with skin weights
    pub skinned_meshes: usize,
    /// Animations written
    pub animations: Vec<AnimationSummary>,
    /// Animation file written
    pub xanim_path: Option<PathBuf>,
    /// Model compiler result
    pub model: Option<CompileOutcome>,
    /// Placement file written
    pub placement_path: Option<PathBuf>,
    /// BGL compiler result
    pub bgl: Option<CompileOutcome>,
}

impl ExportReport {
    /// Whether any external tool ran out of time
    pub fn timed_out(&self) -> bool {
        [&self.model, &self.bgl]
            .into_iter()
            .flatten()
            .any(CompileOutcome::is_timeout)
    }
}

/// Exporter to the DirectX .X text format
pub struct XExporter {
    config: ExportConfig,
    progress: Option<ProgressCallback>,
    compiler: Option<Box<dyn ModelCompiler>>,
}

impl XExporter {
    /// Exporter for `config`
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            progress: None,
            compiler: None,
        }
    }

    /// Report progress to `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Use `compiler` instead of the SDK's XToMdl
    pub fn with_compiler(mut self, compiler: Box<dyn ModelCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Configuration of this exporter
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    fn report(&self, phase: ExportPhase, current: usize, total: usize, item: Option<&str>) {
        if let Some(callback) = &self.progress {
            callback(ExportProgress {
                phase,
                current,
                total,
                current_item: item.map(str::to_string),
            });
        }
    }

    /// Build the export forest of `scene`
    ///
    /// Skin bindings are captured after selection and before the armatures
    /// are flattened away.
    pub fn prepare(&self, scene: &SceneDescription) -> Result<PreparedScene> {
        self.report(ExportPhase::Indexing, 0, 1, None);
        let mut forest = SceneForest::build(scene, self.config.export_skin_weights)?;
        tracing::info!(nodes = forest.len(), "export index built");

        let pruned = if self.config.export_selection {
            prune(&mut forest, |name| scene.object(name).is_some_and(|o| o.selected))
        } else {
            Vec::new()
        };

        let skin = if self.config.export_skin_weights {
            SkinBindings::capture(scene, &forest)
        } else {
            SkinBindings::default()
        };
        let flattened = flatten_armatures(&mut forest);
        if !flattened.is_empty() {
            tracing::debug!(armatures = ?flattened, "armatures flattened");
        }
        if !forest.is_consistent() {
            return Err(Error::internal("export forest links are inconsistent"));
        }

        self.report(ExportPhase::Indexing, 1, 1, None);
        Ok(PreparedScene {
            forest,
            skin,
            pruned,
            flattened,
        })
    }

    /// Write the complete scene file into `out`
    pub fn write_scene<W: Write, E: FrameEvaluator + ?Sized>(
        &self,
        out: &mut XWriter<W>,
        scene: &SceneDescription,
        prepared: &PreparedScene,
        evaluator: &E,
    ) -> Result<()> {
        tracing::info!("writing header");
        write_header(out, &scene.application, &Local::now())?;
        write_templates(out, self.config.sdk)?;
        write_guid(out, &self.config.model)?;
        write_hierarchy(out, &prepared.forest)?;

        tracing::info!("writing geometry");
        open_root_frames(out)?;
        let frames = FrameWriter::new(scene, &prepared.forest, evaluator, &prepared.skin, &self.config);
        let roots = prepared.forest.roots();
        for (i, &root) in roots.iter().enumerate() {
            let name = prepared.forest.get(root).map(|n| n.name.as_str());
            tracing::info!(root = name.unwrap_or_default(), "writing root frame");
            self.report(ExportPhase::Writing, i, roots.len(), name);
            frames.write_node(out, root)?;
        }
        close_root_frames(out)?;
        self.report(ExportPhase::Writing, roots.len(), roots.len(), None);
        Ok(())
    }

    /// Tags and animations of a prepared scene
    pub fn animations<E: FrameEvaluator + ?Sized>(
        &self,
        scene: &SceneDescription,
        prepared: &PreparedScene,
        evaluator: &mut E,
        modeldef: &ModelDef,
    ) -> Result<(Vec<String>, Vec<Animation>)> {
        let tags = animation_tags(scene, &prepared.forest);
        self.report(ExportPhase::Animating, 0, tags.len(), None);
        let animations = generate_all(
            evaluator,
            scene,
            &prepared.forest,
            modeldef,
            self.config.export_skin_weights,
        )?;
        self.report(ExportPhase::Animating, tags.len(), tags.len(), None);
        Ok((tags, animations))
    }

    /// Run the whole export
    ///
    /// The configuration and dictionary are checked before the scene file is
    /// opened. The evaluator is left at the frame it started on.
    pub fn export<E: FrameEvaluator + ?Sized>(
        &self,
        scene: &SceneDescription,
        evaluator: &mut E,
    ) -> Result<ExportReport> {
        self.config.validate()?;
        let modeldef = match (&self.config.modeldef_path, self.config.export_animation) {
            (Some(path), true) => Some(ModelDef::load(path)?),
            _ => None,
        };
        let prepared = self.prepare(scene)?;

        let mut report = ExportReport {
            scene_path: self.config.output_path.clone(),
            nodes: prepared.forest.len(),
            roots: prepared
                .forest
                .roots()
                .into_iter()
                .filter_map(|id| prepared.forest.get(id).map(|n| n.safe_name.clone()))
                .collect(),
            pruned: prepared.pruned.clone(),
            flattened: prepared.flattened.clone(),
            skinned_meshes: prepared.skin.len(),
            ..Default::default()
        };

        {
            let mut guard = FrameGuard::new(evaluator);
            guard.set_frame(0);

            let mut file = XFile::create(&self.config.output_path)?;
            self.write_scene(&mut *file, scene, &prepared, &*guard)?;
            file.close()?;
            tracing::info!(path = %self.config.output_path.display(), "scene file complete");

            if let Some(modeldef) = &modeldef {
                let (tags, animations) = self.animations(scene, &prepared, &mut *guard, modeldef)?;
                let path = self.config.xanim_path();
                write_xanim(&path, &tags, &animations, modeldef)?;
                report.animations = animations.iter().map(AnimationSummary::from).collect();
                report.xanim_path = Some(path);
            }
        }

        if self.config.compiler.enabled {
            self.compile(&mut report)?;
        }

        self.report(ExportPhase::Complete, 1, 1, None);
        Ok(report)
    }

    fn compile(&self, report: &mut ExportReport) -> Result<()> {
        let steps = if self.config.placement.is_some() { 2 } else { 1 };
        self.report(ExportPhase::Compiling, 0, steps, Some("XToMdl"));

        let request = CompileRequest::from_config(&self.config);
        let outcome = match &self.compiler {
            Some(compiler) => compiler.compile(&request)?,
            None => XToMdl::from_config(&self.config)?.compile(&request)?,
        };
        let timed_out = outcome.is_timeout();
        if let CompileOutcome::TimedOut { tool, seconds } = &outcome {
            tracing::warn!(tool = %tool, seconds, "model compiler timed out, keeping written files");
        }
        report.model = Some(outcome);
        if timed_out {
            return Ok(());
        }

        if let Some(placement) = &self.config.placement {
            self.report(ExportPhase::Compiling, 1, steps, Some("bglcomp"));
            let xml = write_placement(&self.config, placement)?;
            let outcome = BglComp::from_config(&self.config)?.compile(&xml)?;
            if let CompileOutcome::TimedOut { tool, seconds } = &outcome {
                tracing::warn!(tool = %tool, seconds, "BGL compiler timed out, keeping written files");
            }
            report.placement_path = Some(xml);
            report.bgl = Some(outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsxport_core::ModelIdentity;
    use fsxport_scene::SnapshotEvaluator;
    use std::sync::{Arc, Mutex};

    const SCENE: &str = r#"{
        "application": "Blender 4.1",
        "objects": [
            {"name": "Hangar", "type": "EMPTY"},
            {"name": "Roof", "type": "MESH", "parent": "Hangar", "selected": true,
             "mesh": {"vertices": [{"co": [0,0,0]}, {"co": [1,0,0]}, {"co": [0,1,0]}],
                      "polygons": [{"vertices": [0, 1, 2]}]}}
        ]
    }"#;

    fn config(dir: &std::path::Path) -> ExportConfig {
        ExportConfig {
            output_path: dir.join("hangar.x"),
            model: ModelIdentity {
                guid: "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9".to_string(),
                friendly_name: "Hangar model".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    struct FakeCompiler(CompileOutcome);

    impl ModelCompiler for FakeCompiler {
        fn compile(&self, _request: &CompileRequest) -> Result<CompileOutcome> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_prepare_applies_selection() {
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let mut cfg = ExportConfig::default();
        cfg.export_selection = true;
        let prepared = XExporter::new(cfg).prepare(&scene).unwrap();
        assert_eq!(prepared.pruned, vec!["Hangar".to_string()]);
        let roots: Vec<&str> = prepared
            .forest
            .roots()
            .into_iter()
            .map(|id| prepared.forest.get(id).unwrap().name.as_str())
            .collect();
        assert_eq!(roots, vec!["Roof"]);
    }

    #[test]
    fn test_export_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let exporter = XExporter::new(config(dir.path()))
            .with_progress(Box::new(move |p| sink.lock().unwrap().push(p.phase)));

        let mut eval = SnapshotEvaluator::new(&scene);
        let report = exporter.export(&scene, &mut eval).unwrap();
        assert_eq!(report.roots, vec!["Hangar".to_string()]);
        assert_eq!(report.nodes, 2);
        assert!(report.xanim_path.is_none());

        let phases = phases.lock().unwrap();
        assert_eq!(phases.first(), Some(&ExportPhase::Indexing));
        assert!(phases.contains(&ExportPhase::Writing));
        assert_eq!(phases.last(), Some(&ExportPhase::Complete));
    }

    #[test]
    fn test_compiler_timeout_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let mut cfg = config(dir.path());
        cfg.compiler.enabled = true;
        cfg.compiler.xtomdl_path = Some(dir.path().join("XToMdl.exe"));
        let exporter = XExporter::new(cfg).with_compiler(Box::new(FakeCompiler(CompileOutcome::TimedOut {
            tool: "XToMdl".to_string(),
            seconds: 300,
        })));

        let mut eval = SnapshotEvaluator::new(&scene);
        let report = exporter.export(&scene, &mut eval).unwrap();
        assert!(report.timed_out());
        assert!(dir.path().join("hangar.x").exists());
        assert!(report.bgl.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["model"]["timed_out"]["tool"], "XToMdl");
        assert_eq!(json["bgl"], serde_json::Value::Null);
    }

    #[test]
    fn test_missing_dictionary_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneDescription::from_json_str(SCENE).unwrap();
        let mut cfg = config(dir.path());
        cfg.export_animation = true;
        cfg.modeldef_path = Some(dir.path().join("missing.xml"));
        let mut eval = SnapshotEvaluator::new(&scene);
        let err = XExporter::new(cfg).export(&scene, &mut eval).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!dir.path().join("hangar.x").exists());
    }
}
