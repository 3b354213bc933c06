use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the timing of every clip and print it as JSON.
    Annotate(AnnotateArgs),
    /// Render an MP4 video (requires `ffmpeg` and `ffprobe` on PATH for media clips).
    Burn(BurnArgs),
}

#[derive(Parser, Debug)]
struct AnnotateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Keep annotating until the duration settles, at most this many passes.
    #[arg(long)]
    converge: Option<u32>,

    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Parser, Debug)]
struct BurnArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path. Defaults to `<outputDir>/<task key>.mp4`.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    fps: Option<u32>,

    /// Frames rendered concurrently.
    #[arg(long)]
    parallel: Option<usize>,

    /// Frames buffered ahead of the encoder.
    #[arg(long)]
    high_water_mark: Option<usize>,

    #[arg(long, value_enum)]
    cache_format: Option<FormatChoice>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Keep the task's cache directory.
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Raw,
    Jpg,
    Png,
}

impl From<FormatChoice> for montage::session::CacheFormat {
    fn from(c: FormatChoice) -> Self {
        match c {
            FormatChoice::Raw => Self::Raw,
            FormatChoice::Jpg => Self::Jpg,
            FormatChoice::Png => Self::Png,
        }
    }
}

fn main() -> anyhow::Result<()> {
    initialise_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Annotate(args) => cmd_annotate(args),
        Command::Burn(args) => cmd_burn(args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_scene(path: &Path) -> anyhow::Result<montage::SceneDef> {
    montage::SceneDef::load(path).with_context(|| format!("load scene '{}'", path.display()))
}

fn assets_root(scene_path: &Path) -> PathBuf {
    scene_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateOutput {
    duration: f64,
    frames_num: u64,
    width: u32,
    height: u32,
    fps: u32,
    nodes: Vec<NodeOutput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeOutput {
    id: String,
    #[serde(rename = "type")]
    kind: montage::ClipKind,
    parent: Option<String>,
    active: bool,
    z_index: i64,
    timing: Option<montage::ClipTiming>,
}

fn cmd_annotate(args: AnnotateArgs) -> anyhow::Result<()> {
    let mut scene = read_scene(&args.in_path)?;
    if let Some(max_passes) = args.converge {
        scene.config.annotate = montage::AnnotateMode::Converge { max_passes };
    }

    let mut task =
        montage::RenderTask::from_scene(&scene)?.with_assets_root(assets_root(&args.in_path));
    task.prepare(montage::RenderMode::Interactive)?;

    let tree = task.tree();
    let nodes = tree
        .all_nodes(tree.root())
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            NodeOutput {
                id: node.id().to_string(),
                kind: node.kind(),
                parent: node.parent().map(|p| tree.node(p).id().to_string()),
                active: node.active(),
                z_index: node.z_index(),
                timing: node.timing().copied(),
            }
        })
        .collect();
    let out = AnnotateOutput {
        duration: task.timeline().duration(),
        frames_num: task.timeline().frames_num(),
        width: task.config().width,
        height: task.config().height,
        fps: task.config().fps,
        nodes,
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&out)
    } else {
        serde_json::to_string(&out)
    }
    .context("serialize annotate output")?;
    println!("{json}");
    task.destroy();
    Ok(())
}

fn cmd_burn(args: BurnArgs) -> anyhow::Result<()> {
    let mut scene = read_scene(&args.in_path)?;
    let cfg = &mut scene.config;
    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    if let Some(fps) = args.fps {
        cfg.fps = fps;
    }
    if let Some(p) = args.parallel {
        cfg.parallel = p;
    }
    if let Some(hwm) = args.high_water_mark {
        cfg.high_water_mark = hwm;
    }
    if let Some(f) = args.cache_format {
        cfg.cache_format = f.into();
    }
    if args.cache_dir.is_some() {
        cfg.cache_dir = args.cache_dir.clone();
    }
    if args.out.is_some() {
        cfg.output = args.out.clone();
    }
    cfg.debug |= args.debug;

    let mut task =
        montage::RenderTask::from_scene(&scene)?.with_assets_root(assets_root(&args.in_path));
    task.on(|event| match event {
        montage::RenderEvent::LoadedMetadata { duration, .. } => {
            tracing::info!(duration, "timeline ready");
        }
        montage::RenderEvent::Progress { percent } => {
            tracing::debug!(percent, "progress");
        }
        _ => {}
    });

    let out_path = task.output_path();
    let opts = montage::FfmpegOpts::from_config(task.config(), &out_path)?;
    let mut synthesis = montage::FfmpegSynthesis::new(opts);
    let output = task.burn(&mut synthesis)?;

    eprintln!(
        "wrote {} ({} frames)",
        output.path.as_deref().unwrap_or(&out_path).display(),
        output.frames
    );
    Ok(())
}
