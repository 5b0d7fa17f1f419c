//! pinbridge - pinball emulation core driver CLI

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pinbridge::audio::device::ClockedDevice;
use pinbridge::audio::{AudioBridge, BridgeConfig, BridgeStats, PlaybackDevice, SharedStats};
use pinbridge::config::{Args, BridgeSettings, Command};
use pinbridge::core::synthetic::Burst;
use pinbridge::core::{EmulationCore, SyntheticConfig, SyntheticCore};
use pinbridge::display::alphanumeric::render_cells;
use pinbridge::display::dmd::shade_table;
use pinbridge::display::{HardwareGeneration, SegmentTemplate};
use pinbridge::driver::{DisplayUpdate, Driver};

/// Rendered display updates buffered for the terminal
const DISPLAY_BACKLOG: usize = 8;

/// Main thread polling interval while the core runs
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => BridgeSettings::load(path)?,
        None => BridgeSettings::load_default()?,
    };

    // Initialize logging
    init_logging(&args, &settings)?;

    // Execute command
    match args.command.unwrap_or_default() {
        Command::Demo {
            seconds,
            burst,
            show_displays,
            audio,
        } => cmd_demo(&settings, seconds, burst, show_displays, audio),
        Command::Segments { cells, split } => cmd_segments(&cells, split),
        Command::Shades { depth, sam } => cmd_shades(depth, sam),
        Command::Config { write } => cmd_config(write),
    }
}

fn init_logging(args: &Args, settings: &BridgeSettings) -> Result<()> {
    let level = if args.verbose > 0 || args.quiet {
        args.log_level().to_string()
    } else {
        settings.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let log_file = args.log.as_deref().or(settings.log_file());
    if let Some(log_file) = log_file {
        let file = std::fs::File::create(log_file)
            .with_context(|| format!("cannot create log file '{}'", log_file))?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Run the synthetic core through the bridge
fn cmd_demo(
    settings: &BridgeSettings,
    seconds: Option<f64>,
    burst: bool,
    show_displays: bool,
    audio: bool,
) -> Result<()> {
    println!("pinbridge {} - synthetic core demo\n", pinbridge::VERSION);

    let bridge_config = settings.to_bridge_config();
    bridge_config.validate()?;

    if audio && !cfg!(feature = "playback") {
        warn!("Built without the playback feature, using the simulated device");
    }

    let mut core_config = settings.to_synthetic_config();
    if let Some(seconds) = seconds {
        core_config.max_frames = Some((seconds * core_config.fps).round().max(0.0) as u64);
    }
    if burst {
        core_config.burst = Some(Burst {
            every: (core_config.fps * 2.0).round().max(1.0) as u64,
            stall_frames: (bridge_config.buffer_count + bridge_config.queue_limit) as u32,
        });
    }

    let stats = SharedStats::default();
    let stop = Arc::new(AtomicBool::new(false));

    // Setup Ctrl+C handler
    let s = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, stopping...");
        s.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let (tx, rx) = bounded(DISPLAY_BACKLOG);
    let sink = show_displays.then_some(tx);

    let core_stats = stats.clone();
    let core_stop = stop.clone();
    let handle = thread::Builder::new()
        .name("emulation-core".to_string())
        .spawn(move || -> pinbridge::Result<u64> {
            #[cfg(feature = "playback")]
            if audio {
                let device = pinbridge::audio::device::RodioDevice::open_default()?;
                return run_core(device, bridge_config, core_config, core_stats, &core_stop, sink);
            }
            let _ = audio;
            run_core(ClockedDevice::new(), bridge_config, core_config, core_stats, &core_stop, sink)
        })?;

    println!("Core running. Press Ctrl+C to stop.\n");

    while !handle.is_finished() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(update) => print_display(&update),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
        }
    }

    let frames = handle
        .join()
        .map_err(|_| anyhow!("emulation core thread panicked"))??;

    print_stats(frames, &stats.lock());
    println!("Stopped.");
    Ok(())
}

/// Drive one core session on the current thread
fn run_core<D: PlaybackDevice>(
    device: D,
    bridge_config: BridgeConfig,
    core_config: SyntheticConfig,
    stats: SharedStats,
    stop: &AtomicBool,
    sink: Option<Sender<DisplayUpdate>>,
) -> pinbridge::Result<u64> {
    let bridge = AudioBridge::with_shared_stats(device, bridge_config, stats)?;
    let mut driver = Driver::new(bridge, HardwareGeneration::Other);
    if let Some(sink) = sink {
        driver = driver.with_display_sink(sink);
    }

    let mut core = SyntheticCore::new(core_config);
    let result = core.run(&mut driver, stop);
    let dropped = driver.dropped_updates();
    driver.shutdown()?;
    result?;

    if dropped > 0 {
        info!("{} display updates dropped", dropped);
    }
    Ok(core.frames_emitted())
}

fn print_display(update: &DisplayUpdate) {
    println!("Display {}:", update.index);
    for line in &update.lines {
        println!("{}", line);
    }
    println!();
}

fn print_stats(frames: u64, stats: &BridgeStats) {
    println!("Frames emitted:    {}", frames);
    println!("Frames received:   {}", stats.frames_received);
    println!("Frames played:     {}", stats.frames_played);
    println!("Frames dropped:    {} ({} flushes)", stats.frames_dropped, stats.overflow_flushes);
    println!("Buffers recycled:  {}", stats.buffers_recycled);
    println!("Stale requeues:    {}", stats.stale_requeues);
    println!("Underruns:         {}", stats.underruns);
}

/// Render segment masks given on the command line
fn cmd_segments(cells: &[String], split: bool) -> Result<()> {
    let masks = cells
        .iter()
        .map(|cell| parse_mask(cell))
        .collect::<Result<Vec<u16>>>()?;

    let template = if split {
        SegmentTemplate::Split
    } else {
        SegmentTemplate::Comma
    };

    for line in render_cells(masks, template) {
        println!("{}", line);
    }
    Ok(())
}

fn parse_mask(text: &str) -> Result<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).with_context(|| format!("invalid segment mask '{}'", text))
}

/// Print the intensity table in effect for a depth
fn cmd_shades(depth: u8, sam: bool) -> Result<()> {
    let generation = if sam {
        HardwareGeneration::SamSpa
    } else {
        HardwareGeneration::Other
    };

    println!("Intensity codes for depth {} ({:?}):\n", depth, generation);
    for (code, shade) in shade_table(depth, generation) {
        println!("  {:#04x}  {}  {:?}", code, shade.glyph(), shade);
    }
    println!("\nAny other code renders blank.");
    Ok(())
}

/// Print or write the sample settings file
fn cmd_config(write: Option<PathBuf>) -> Result<()> {
    let sample = BridgeSettings::sample_config();

    match write {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create '{}'", parent.display()))?;
            }
            std::fs::write(&path, sample)
                .with_context(|| format!("cannot write '{}'", path.display()))?;
            println!("Wrote sample settings to {}", path.display());
        }
        None => {
            print!("{}", sample);
            println!("\n# Searched locations:");
            for path in BridgeSettings::search_paths() {
                println!("#   {}", path.display());
            }
        }
    }

    Ok(())
}
