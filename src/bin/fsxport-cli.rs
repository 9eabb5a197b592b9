//! fsxport CLI
//!
//! Command-line front end for exporting scene snapshots to the FSX/P3D
//! DirectX .X format, inspecting the export hierarchy and animations, and
//! producing starter configuration files.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use fsxport_core::logging::{init_with_config, TracingConfig};
use fsxport_core::{ExportConfig, SdkVersion};
use fsxport_export::modeldef::ModelDef;
use fsxport_export::scene_file::write_hierarchy;
use fsxport_export::{AnimationSummary, CompileOutcome, ExportPhase, ExportReport, XExporter, XWriter};
use fsxport_scene::{SceneDescription, SnapshotEvaluator};

/// fsxport - scene exporter for the FSX and Prepar3D model compilers
#[derive(Parser)]
#[command(name = "fsxport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot to a .x file
    Export(ExportArgs),

    /// Print the export hierarchy of a scene
    Outline(OutlineArgs),

    /// List the animations an export would write
    Anims(AnimsArgs),

    /// Print a default configuration file
    Config(ConfigArgs),
}

/// Settings that override the configuration file
#[derive(Args)]
struct Overrides {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination .x file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only export selected objects
    #[arg(long)]
    selection: bool,

    /// Write bones and skin weights
    #[arg(long)]
    skin: bool,

    /// Write the .xanim file using this ModelDef dictionary
    #[arg(long)]
    modeldef: Option<PathBuf>,

    /// Target SDK (fsx, p3dv1 .. p3dv6)
    #[arg(long, value_parser = parse_sdk)]
    sdk: Option<SdkVersion>,
}

impl Overrides {
    /// Configuration file contents with command line settings applied
    fn resolve(&self) -> Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => ExportConfig::default(),
        };
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(sdk) = self.sdk {
            config.sdk = sdk;
        }
        if let Some(modeldef) = &self.modeldef {
            config.modeldef_path = Some(modeldef.clone());
            config.export_animation = true;
        }
        config.export_selection |= self.selection;
        config.export_skin_weights |= self.skin;
        Ok(config)
    }
}

#[derive(Args)]
struct ExportArgs {
    /// Scene snapshot (JSON)
    scene: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    /// Run XToMdl (and BglComp when placement is configured) after writing
    #[arg(long)]
    compile: bool,

    /// SDK installation used to locate the compilers
    #[arg(long)]
    sdk_root: Option<PathBuf>,
}

#[derive(Args)]
struct OutlineArgs {
    /// Scene snapshot (JSON)
    scene: PathBuf,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args)]
struct AnimsArgs {
    /// Scene snapshot (JSON)
    scene: PathBuf,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args)]
struct ConfigArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

fn parse_sdk(s: &str) -> Result<SdkVersion, String> {
    s.parse().map_err(|_| {
        let known: Vec<&str> = SdkVersion::ALL.iter().map(|v| v.as_str()).collect();
        format!("unknown SDK '{s}', expected one of: {}", known.join(", "))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export(args) => cmd_export(args, cli.verbose, cli.json),
        Commands::Outline(args) => {
            setup_logging(cli.verbose, None)?;
            cmd_outline(args)
        }
        Commands::Anims(args) => {
            setup_logging(cli.verbose, None)?;
            cmd_anims(args, cli.json)
        }
        Commands::Config(args) => {
            setup_logging(cli.verbose, None)?;
            cmd_config(args)
        }
    }
}

fn setup_logging(verbose: u8, log_file: Option<PathBuf>) -> Result<()> {
    let mut config = TracingConfig::from_verbosity(verbose);
    if let Some(path) = log_file {
        config = config.with_log_file(path);
    }
    init_with_config(&config).context("Failed to initialize logging")?;
    Ok(())
}

fn load_scene(path: &Path) -> Result<SceneDescription> {
    SceneDescription::from_json_file(path).with_context(|| format!("Failed to load scene {}", path.display()))
}

fn cmd_export(args: ExportArgs, verbose: u8, json: bool) -> Result<()> {
    let mut config = args.overrides.resolve()?;
    if args.compile {
        config.compiler.enabled = true;
    }
    if let Some(root) = args.sdk_root {
        config.compiler.sdk_root = Some(root);
    }
    let log_file = config.use_logfile.then(|| config.log_path());
    setup_logging(verbose, log_file)?;

    let scene = load_scene(&args.scene)?;
    info!(scene = %args.scene.display(), output = %config.output_path.display(), "starting export");

    let exporter = XExporter::new(config).with_progress(Box::new(|progress| {
        if progress.phase == ExportPhase::Writing {
            if let Some(item) = &progress.current_item {
                info!("[{}/{}] {}", progress.current + 1, progress.total, item);
            }
        }
    }));
    let mut evaluator = SnapshotEvaluator::new(&scene);
    let report = exporter.export(&scene, &mut evaluator).context("Export failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    if report.timed_out() {
        warn!("an external compiler timed out, its output may be incomplete");
    }
    Ok(())
}

fn print_report(report: &ExportReport) {
    println!("Export complete:");
    println!("  Scene:      {}", report.scene_path.display());
    println!("  Nodes:      {}", report.nodes);
    println!("  Roots:      {}", report.roots.join(", "));
    if !report.pruned.is_empty() {
        println!("  Pruned:     {}", report.pruned.len());
    }
    if report.skinned_meshes > 0 {
        println!("  Skinned:    {}", report.skinned_meshes);
    }
    if let Some(path) = &report.xanim_path {
        println!("  Animations: {} ({})", report.animations.len(), path.display());
    }
    for (label, outcome) in [("Model", &report.model), ("BGL", &report.bgl)] {
        match outcome {
            Some(CompileOutcome::Compiled { artifact, size }) => {
                println!("  {label:<11} {} ({size} bytes)", artifact.display());
            }
            Some(CompileOutcome::TimedOut { tool, seconds }) => {
                println!("  {label:<11} {tool} timed out after {seconds}s");
            }
            None => {}
        }
    }
}

fn cmd_outline(args: OutlineArgs) -> Result<()> {
    let config = args.overrides.resolve()?;
    let scene = load_scene(&args.scene)?;
    let prepared = XExporter::new(config).prepare(&scene)?;

    let stdout = io::stdout();
    let mut out = XWriter::new(stdout.lock());
    write_hierarchy(&mut out, &prepared.forest)?;
    out.flush()?;
    Ok(())
}

fn cmd_anims(args: AnimsArgs, json: bool) -> Result<()> {
    let mut config = args.overrides.resolve()?;
    let Some(path) = config.modeldef_path.clone() else {
        bail!("No ModelDef dictionary configured, pass --modeldef or set modeldef_path");
    };
    config.export_animation = true;
    let modeldef = ModelDef::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    let scene = load_scene(&args.scene)?;

    let exporter = XExporter::new(config);
    let prepared = exporter.prepare(&scene)?;
    let mut evaluator = SnapshotEvaluator::new(&scene);
    let (tags, animations) = exporter.animations(&scene, &prepared, &mut evaluator, &modeldef)?;

    if json {
        let entries: Vec<AnimationSummary> = animations.iter().map(AnimationSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "tags": tags, "animations": entries }))?);
        return Ok(());
    }

    println!("{} tag(s), {} animation(s)", tags.len(), animations.len());
    for tag in &tags {
        println!("{tag}");
        for animation in animations.iter().filter(|a| &a.tag == tag) {
            println!(
                "  {:<32} {:>8.1} frames  {:>4} keys",
                animation.safe_name,
                animation.key_range,
                animation.rotation_keys.len()
            );
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let yaml = ExportConfig::default().to_yaml()?;
    match args.output {
        Some(path) => {
            if path.exists() && !args.force {
                bail!("{} already exists, use --force to overwrite", path.display());
            }
            std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => {
            io::stdout().write_all(yaml.as_bytes())?;
        }
    }
    Ok(())
}
