use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use viewreel::event_source::TerminalEventSource;
use viewreel::layout::packing::{Size, calculate_optimal_wall_size};
use viewreel::panic_handler;
use viewreel::settings;
use viewreel::sim::SimPlatform;
use viewreel::state::{
    AppState, DeviceWallPicker, DisplayMode, DisplaySelector, Preset, SelectorKind, ViewSpec,
};
use viewreel::tui::{PreviewApp, run_preview};

#[derive(Parser)]
#[command(name = "viewreel", version, about = "Synchronized multi-viewport page previews")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    preview: PreviewArgs,
}

#[derive(clap::Args, Default)]
struct PreviewArgs {
    /// Application state (YAML or JSON)
    #[arg(long)]
    state: Option<PathBuf>,
    /// Page to preview, overrides the state file
    #[arg(long)]
    url: Option<String>,
    /// breakpoints or device-wall
    #[arg(long)]
    mode: Option<DisplayMode>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the terminal preview
    Preview(PreviewArgs),
    /// Print the device wall packing for a viewport as JSON
    Pack {
        #[arg(long, value_parser = parse_size)]
        viewport: Size,
        #[arg(long = "device", value_parser = parse_size, required = true)]
        devices: Vec<Size>,
        #[arg(long, default_value_t = 20.0)]
        margin: f64,
    },
}

fn parse_size(input: &str) -> Result<Size> {
    let Some((w, h)) = input.split_once(['x', 'X']) else {
        bail!("expected WIDTHxHEIGHT, got {input:?}");
    };
    let width: f64 = w.trim().parse().with_context(|| format!("bad width {w:?}"))?;
    let height: f64 = h.trim().parse().with_context(|| format!("bad height {h:?}"))?;
    if width <= 0.0 || height <= 0.0 {
        bail!("size must be positive, got {input:?}");
    }
    Ok(Size::new(width, height))
}

fn main() -> Result<()> {
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create("viewreel.log")?,
    )?;

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Pack {
            viewport,
            devices,
            margin,
        }) => pack(viewport, &devices, margin),
        Some(Command::Preview(args)) => preview(args),
        None => preview(cli.preview),
    }
}

fn pack(viewport: Size, devices: &[Size], margin: f64) -> Result<()> {
    let items: Vec<Size> = devices
        .iter()
        .map(|d| Size::new(d.width + 2.0 * margin, d.height + 2.0 * margin))
        .collect();
    let layout = calculate_optimal_wall_size(&items, viewport)
        .context("nothing to pack")?;
    let output = serde_json::json!({
        "layout": layout,
        "scale": layout.max_scale(viewport),
        "min_zoom": layout.min_zoom(viewport),
        "positions": layout.positions(&items),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn preview(args: PreviewArgs) -> Result<()> {
    let settings = settings::load_settings();

    let mut state = match &args.state {
        Some(path) => AppState::load(path)?,
        None => AppState {
            options: settings.options(),
            ..builtin_state()
        },
    };
    if let Some(url) = args.url {
        state.page_url = url;
    }
    if let Some(mode) = args.mode {
        state.set_mode(mode);
    }
    if state.page_url.is_empty() {
        bail!("no page to preview, pass --url or a state file with page-url");
    }
    info!(
        "Starting viewreel on {} in {} mode",
        state.page_url, state.ui.mode
    );

    panic_handler::initialize_panic_handler();

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let platform = Rc::new(SimPlatform::default());
    let mut app = PreviewApp::new(platform, state, settings.detector_timings());
    let mut event_source = TerminalEventSource;
    let res = run_preview(&mut terminal, &mut app, &mut event_source);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!("Preview failed: {err:#}");
    }
    res
}

/// Breakpoints and devices used when no state file is given
fn builtin_state() -> AppState {
    let devices = vec![
        ViewSpec::device("iphone-se", "iPhone SE", 375.0, 667.0),
        ViewSpec::device("iphone-15", "iPhone 15", 393.0, 852.0),
        ViewSpec::device("pixel-8", "Pixel 8", 412.0, 915.0),
        ViewSpec::device("ipad-mini", "iPad mini", 768.0, 1024.0),
        ViewSpec::device("ipad-pro", "iPad Pro 12.9", 1024.0, 1366.0),
    ];
    let presets = vec![
        Preset {
            id: "phones".into(),
            title: "Phones".into(),
            devices: vec!["iphone-se".into(), "iphone-15".into(), "pixel-8".into()],
            user_defined: false,
        },
        Preset {
            id: "all".into(),
            title: "All devices".into(),
            devices: devices.iter().filter_map(|d| d.id.clone()).collect(),
            user_defined: false,
        },
    ];
    AppState {
        breakpoints: [320.0, 768.0, 1024.0, 1440.0]
            .into_iter()
            .map(ViewSpec::with_width)
            .collect(),
        device_wall_picker: DeviceWallPicker {
            display: Some(DisplaySelector {
                kind: SelectorKind::Preset,
                id: "phones".into(),
            }),
        },
        devices,
        presets,
        ..AppState::default()
    }
}
