//! # Pi Status Display Entry Point
//!
//! Wires the host metric sources, the buttons and the panel into the screen
//! controller. Production mode drives the SSD1306 over I2C and reads the
//! buttons from the GPIO character device; development mode (`--stdout`)
//! prints frames as ASCII art, takes `n`/`s` + Enter as button presses and
//! never powers the machine off.

use anyhow::Context;
use clap::Parser;
use status_display_lib::config::{Config, DEFAULT_CONFIG_PATH};
use status_display_lib::controller::{Cadence, Outcome, ScreenController, SystemClock};
use status_display_lib::debounce::{ChannelButton, InputSource};
use status_display_lib::display::{DisplaySink, TerminalSink};
use status_display_lib::host;
use status_display_lib::shutdown::{DryRunShutdown, ShutdownAgent};
use status_display_lib::sources::SourceSet;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pi-status-display",
    about = "System status pages on an SSD1306 OLED",
    version
)]
struct Args {
    /// Configuration file. Missing file means built-in defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Development mode: ASCII frames on stdout, keyboard buttons, no power-off.
    #[arg(long)]
    stdout: bool,

    /// Render the first screen once and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pi_status_display", "status_display_lib"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Frames go to stdout in development mode, so logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the controller and run it to completion.
#[allow(clippy::too_many_arguments)]
fn drive<N, S, D, A>(
    navigate: N,
    shutdown: S,
    sources: SourceSet,
    sink: D,
    agent: A,
    config: &Config,
    stop: Arc<AtomicBool>,
    once: bool,
) -> anyhow::Result<()>
where
    N: InputSource,
    S: InputSource,
    D: DisplaySink,
    A: ShutdownAgent,
{
    let mut controller = ScreenController::new(
        SystemClock,
        navigate,
        shutdown,
        sources,
        sink,
        agent,
        Cadence::from_config(config),
    )
    .with_stop_flag(stop);

    if once {
        controller.render_once();
        return Ok(());
    }

    match controller.run() {
        Outcome::PoweredOff => {
            info!("power-off accepted, exiting");
            Ok(())
        }
        Outcome::Interrupted => {
            info!("stopped");
            Ok(())
        }
        Outcome::ShutdownFailed(e) => Err(e).context("power-off request failed"),
    }
}

/// Keyboard stand-in for the two buttons: `n` navigates, `s` shuts down.
///
/// Each button gets a one-slot channel: a press typed while the previous one
/// has not been picked up yet is dropped.
fn keyboard_buttons() -> (ChannelButton, ChannelButton) {
    let (nav_tx, nav_rx) = mpsc::sync_channel(1);
    let (off_tx, off_rx) = mpsc::sync_channel(1);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let sent = match line.trim() {
                "n" | "" => nav_tx.try_send(()),
                "s" => off_tx.try_send(()),
                other => {
                    warn!(input = other, "unknown key, use n (navigate) or s (shutdown)");
                    Ok(())
                }
            };
            if let Err(TrySendError::Disconnected(())) = sent {
                break;
            }
        }
    });

    (ChannelButton::new(nav_rx), ChannelButton::new(off_rx))
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
fn run_panel(
    config: &Config,
    sources: SourceSet,
    stop: Arc<AtomicBool>,
    once: bool,
) -> anyhow::Result<()> {
    use status_display_lib::debounce::DebouncedButton;
    use status_display_lib::gpio_lines;
    use status_display_lib::oled::OledSink;
    use status_display_lib::shutdown::CommandShutdown;
    use std::time::Duration;

    // Only a missing bus device is fatal; an absent or unpowered panel is
    // retried on every frame.
    let sink = OledSink::open(&config.display).context("cannot open the OLED I2C bus")?;
    info!(
        bus = %config.display.i2c_bus,
        address = %format!("{:#04x}", config.display.address),
        "OLED bus opened"
    );

    let buttons = &config.buttons;
    let (navigate, shutdown) =
        gpio_lines::open(&buttons.gpio_chip, buttons.navigate_line, buttons.shutdown_line)
            .context("button lines unavailable")?;
    info!(
        navigate = buttons.navigate_line,
        shutdown = buttons.shutdown_line,
        "buttons ready"
    );

    let debounce = Duration::from_millis(buttons.debounce_ms);
    drive(
        DebouncedButton::new("navigate", navigate, debounce),
        DebouncedButton::new("shutdown", shutdown, debounce),
        sources,
        sink,
        CommandShutdown::new(config.shutdown.command.clone()),
        config,
        stop,
        once,
    )
}

#[cfg(not(all(target_os = "linux", feature = "hardware")))]
fn run_panel(
    _config: &Config,
    _sources: SourceSet,
    _stop: Arc<AtomicBool>,
    _once: bool,
) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "OLED support not enabled. Rebuild with --features hardware on Linux, \
         or use --stdout for development mode"
    ))
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Configuration problems are the only fatal startup errors.
    let config = Config::load_from_path(&args.config)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    // Metric reads run on this runtime's blocking pool under a timeout.
    let rt = tokio::runtime::Runtime::new()?;
    let sources = SourceSet::new(host::bounded_sources(&config, rt.handle()))?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received stop signal");
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("failed to install signal handler: {}", e);
    }

    let result = if args.stdout {
        // Development mode: ASCII output for testing
        let (navigate, shutdown) = keyboard_buttons();
        info!("development mode: type n + Enter to navigate, s + Enter to shut down");
        drive(
            navigate,
            shutdown,
            sources,
            TerminalSink::stdout(),
            DryRunShutdown,
            &config,
            stop,
            args.once,
        )
    } else {
        run_panel(&config, sources, stop, args.once)
    };

    // A metric read stuck past its timeout must not hold up the exit.
    rt.shutdown_background();
    result
}
