
mod device;
mod export;
mod stats;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser, Subcommand};
use geometry::anchor::{Anchor, SnapConfig};
use geometry::bbox::{Dimensions, NormalizedPos};
use geometry::drawing::Resolution;
use geometry::ptz::{self, Reticle};
use geometry::{GeometryError, Point};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite;
use tracing::info;

use crate::device::{DeviceCall, OVERLAY_CGI, PtzAction, WIDGET_CGI};
use crate::export::PlaceTarget;
use crate::stats::{Request, StreamOptions};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid --data: {0}")]
    InvalidData(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("device rejected {method} (code {code}): {message}")]
    Device { method: String, code: String, message: String },
    #[error("websocket failed: {0}")]
    Ws(Box<tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for websocket message")]
    Timeout,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("{path}: {source}")]
    Io { path: String, source: std::io::Error },
}

impl From<tungstenite::Error> for CliError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "overlay-cli", about = "Overlay widget, PTZ, and device stats CLI")]
struct Cli {
    #[arg(long, env = "OVERLAY_BASE_URL", default_value = "http://192.168.0.90")]
    base_url: String,

    #[arg(long, env = "OVERLAY_USER")]
    user: Option<String>,

    #[arg(long, env = "OVERLAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Stats WebSocket URL; defaults to the base URL's host on port 9000.
    #[arg(long, env = "OVERLAY_STATS_URL")]
    stats_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
pub struct CliContext {
    pub base_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub stats_url: Option<String>,
}

impl CliContext {
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn stats_url(&self) -> Result<String, CliError> {
        match &self.stats_url {
            Some(url) => Ok(url.clone()),
            None => stats::default_stats_url(&self.base_url),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Overlay widgets (gauges, meters, text).
    Widget(WidgetCommand),
    /// Dynamic text and image overlays.
    Overlay(OverlayCommand),
    /// Pan, tilt, and zoom.
    Ptz(PtzCommand),
    /// Stream stats snapshots, reconnecting on close.
    Stats(StatsArgs),
    /// List process names running on the device.
    Processes,
    /// Report usage of the device's storage mounts.
    Storage,
    /// Compute where a widget lands on the video.
    Place(PlaceArgs),
    /// Render drawn strokes to an SVG document.
    Annotate(AnnotateArgs),
}

#[derive(Args, Debug)]
struct WidgetCommand {
    #[command(subcommand)]
    command: WidgetSubcommand,
}

#[derive(Subcommand, Debug)]
enum WidgetSubcommand {
    List,
    Capabilities,
    Add {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Remove {
        id: u32,
    },
    RemoveAll,
}

#[derive(Args, Debug)]
struct OverlayCommand {
    #[command(subcommand)]
    command: OverlaySubcommand,
}

#[derive(Subcommand, Debug)]
enum OverlaySubcommand {
    List,
    AddText {
        #[arg(long)]
        data: String,
    },
    AddImage {
        #[arg(long)]
        data: String,
    },
    UpdateText {
        #[arg(long)]
        data: String,
    },
    Remove {
        identity: u32,
    },
}

#[derive(Args, Debug)]
struct PtzCommand {
    #[arg(long, default_value_t = 1)]
    camera: u32,

    #[command(subcommand)]
    command: PtzSubcommand,
}

#[derive(Subcommand, Debug)]
enum PtzSubcommand {
    /// Drag offset from the reticle centre, in pixels.
    Move {
        #[arg(long, allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, allow_hyphen_values = true)]
        dy: f64,
        #[arg(long, default_value_t = 100.0)]
        radius: f64,
    },
    /// Scroll wheel delta; negative zooms in.
    Zoom {
        #[arg(long, allow_hyphen_values = true)]
        delta: f64,
    },
    Stop,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[arg(long)]
    monitor: Option<String>,

    /// Stop after this many snapshots.
    #[arg(long)]
    count: Option<usize>,

    #[arg(long, default_value_t = stats::DEFAULT_RECONNECT_MS)]
    reconnect_ms: u64,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["norm", "anchor", "drop"])))]
struct PlaceArgs {
    /// Video dimensions as JSON, e.g. {"videoWidth":1920,...}.
    #[arg(long)]
    dims: String,

    /// Logical widget size, `WxH`.
    #[arg(long)]
    size: String,

    /// Normalized top-left corner, `X,Y`.
    #[arg(long, allow_hyphen_values = true)]
    norm: Option<String>,

    #[arg(long)]
    anchor: Option<Anchor>,

    /// Pixel drop position, `X,Y`, run through snap detection.
    #[arg(long, allow_hyphen_values = true)]
    drop: Option<String>,

    #[arg(long)]
    no_snap: bool,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    #[arg(long)]
    input: PathBuf,

    /// Logical drawing resolution, `WxH`.
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Output file, or - for stdout.
    #[arg(long, default_value = "-")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let ctx = CliContext {
        base_url: cli.base_url,
        user: cli.user,
        password: cli.password,
        stats_url: cli.stats_url,
    };

    match cli.command {
        Command::Widget(widget) => {
            let call = widget_call(widget.command)?;
            print_json(&device::call(&ctx, &call).await?)
        }
        Command::Overlay(overlay) => {
            let call = overlay_call(overlay.command)?;
            print_json(&device::call(&ctx, &call).await?)
        }
        Command::Ptz(command) => run_ptz(&ctx, command).await,
        Command::Stats(args) => run_stats(&ctx, args).await,
        Command::Processes => print_json(&stats::request(&ctx.stats_url()?, &Request::ListProcesses).await?),
        Command::Storage => print_json(&stats::request(&ctx.stats_url()?, &Request::Storage).await?),
        Command::Place(args) => run_place(args),
        Command::Annotate(args) => run_annotate(args),
    }
}

fn widget_call(command: WidgetSubcommand) -> Result<DeviceCall, CliError> {
    let call = match command {
        WidgetSubcommand::List => DeviceCall::new(WIDGET_CGI, "listWidgets", json!({})),
        WidgetSubcommand::Capabilities => DeviceCall::new(WIDGET_CGI, "listCapabilities", json!({})),
        WidgetSubcommand::Add { data } => DeviceCall::new(WIDGET_CGI, "addWidget", device::parse_data(&data)?),
        WidgetSubcommand::Update { data } => DeviceCall::new(WIDGET_CGI, "updateWidget", device::parse_data(&data)?),
        WidgetSubcommand::Remove { id } => {
            DeviceCall::new(WIDGET_CGI, "removeWidget", json!({ "generalParams": { "id": id } }))
        }
        WidgetSubcommand::RemoveAll => DeviceCall::new(WIDGET_CGI, "removeAllWidgets", json!({})),
    };
    Ok(call)
}

fn overlay_call(command: OverlaySubcommand) -> Result<DeviceCall, CliError> {
    let call = match command {
        OverlaySubcommand::List => DeviceCall::new(OVERLAY_CGI, "list", json!({})),
        OverlaySubcommand::AddText { data } => DeviceCall::new(OVERLAY_CGI, "addText", device::parse_data(&data)?),
        OverlaySubcommand::AddImage { data } => DeviceCall::new(OVERLAY_CGI, "addImage", device::parse_data(&data)?),
        OverlaySubcommand::UpdateText { data } => DeviceCall::new(OVERLAY_CGI, "setText", device::parse_data(&data)?),
        OverlaySubcommand::Remove { identity } => DeviceCall::new(OVERLAY_CGI, "remove", json!({ "identity": identity })),
    };
    Ok(call)
}

fn ptz_action(command: &PtzSubcommand) -> PtzAction {
    match *command {
        PtzSubcommand::Move { dx, dy, radius } => {
            PtzAction::Move(Reticle::new(Point::new(0.0, 0.0), radius).pan_tilt(Point::new(dx, dy)))
        }
        PtzSubcommand::Zoom { delta } => PtzAction::Zoom(ptz::zoom_speed(delta)),
        PtzSubcommand::Stop => PtzAction::Stop,
    }
}

async fn run_ptz(ctx: &CliContext, command: PtzCommand) -> Result<(), CliError> {
    let action = ptz_action(&command.command);
    info!(?action, camera = command.camera, "ptz: sending");
    device::ptz(ctx, &action, command.camera).await?;
    println!("ok");
    Ok(())
}

async fn run_stats(ctx: &CliContext, args: StatsArgs) -> Result<(), CliError> {
    let opts = StreamOptions {
        url: ctx.stats_url()?,
        monitor: args.monitor,
        count: args.count,
        reconnect: Duration::from_millis(args.reconnect_ms),
    };

    let (teardown_tx, teardown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stats: teardown requested");
            teardown_tx.send_replace(true);
        }
    });

    let received = stats::stream(&opts, teardown_rx, |snapshot| println!("{snapshot}")).await;
    info!(received, "stats: done");
    Ok(())
}

fn run_place(args: PlaceArgs) -> Result<(), CliError> {
    let dims: Dimensions = serde_json::from_str(&args.dims)
        .map_err(|e| CliError::InvalidArgument(format!("--dims: {e}")))?;
    let size = export::parse_size(&args.size)?;
    let target = place_target(&args)?;
    let snap = SnapConfig { enabled: !args.no_snap, ..SnapConfig::default() };
    let report = export::place(&dims, size, target, &snap);
    print_json(&serde_json::to_value(report)?)
}

fn place_target(args: &PlaceArgs) -> Result<PlaceTarget, CliError> {
    if let Some(norm) = &args.norm {
        let p = export::parse_point(norm)?;
        return Ok(PlaceTarget::Normalized(NormalizedPos::new(p.x, p.y)));
    }
    if let Some(anchor) = args.anchor {
        return Ok(PlaceTarget::Anchored(anchor));
    }
    match &args.drop {
        Some(drop) => Ok(PlaceTarget::Drop(export::parse_point(drop)?)),
        None => Err(CliError::InvalidArgument("one of --norm, --anchor, --drop is required".to_owned())),
    }
}

fn run_annotate(args: AnnotateArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.input)
        .map_err(|source| CliError::Io { path: args.input.display().to_string(), source })?;
    let svg = export::render_annotation(&raw, args.resolution)?;
    if args.output == "-" {
        print!("{svg}");
        return Ok(());
    }
    fs::write(&args.output, svg).map_err(|source| CliError::Io { path: args.output.clone(), source })?;
    info!(output = %args.output, "annotate: written");
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
