//! trackscroll - trackball side-button scrolling for Linux
//!
//! Runs in the background: grabs the trackball, shows a tray icon with the
//! settings menu and follows edits of the settings file.

use anyhow::{Context, Result, bail};
use std::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trackscroll::hook;
use trackscroll::tray::TrayIcon;
use trackscroll::{AppCommand, ScrollService, Settings, SettingsHandle, SettingsWatcher};

const USAGE: &str = "\
Usage: trackscroll [OPTIONS]

Options:
      --no-tray        Run without the system tray icon
      --device PATH    Grab this /dev/input/event* node instead of auto-detecting
      --list-devices   List pointer devices and exit
  -v, --verbose        Debug logging (RUST_LOG overrides)
  -h, --help           Print this help";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    no_tray: bool,
    device: Option<String>,
    list_devices: bool,
    verbose: bool,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-tray" => parsed.no_tray = true,
            "--device" => {
                let path = args.next().context("--device needs a path")?;
                parsed.device = Some(path);
            }
            "--list-devices" => parsed.list_devices = true,
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => parsed.help = true,
            other => bail!("Unknown argument: {other}\n\n{USAGE}"),
        }
    }
    Ok(parsed)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn list_devices() {
    let devices = hook::list_pointer_devices();
    if devices.is_empty() {
        println!("No pointer devices found in /dev/input/ (check permissions?)");
        return;
    }
    for dev in devices {
        let marker = if dev.is_candidate() { "*" } else { " " };
        println!(
            "{marker} {}  '{}' [side_btns={}]",
            dev.path.display(),
            dev.name,
            dev.has_side_buttons
        );
    }
    println!("\n* usable as scroll source");
}

/// Start or stop the service so it matches the current settings
fn reconcile(settings: &SettingsHandle, service: &mut Option<ScrollService>) {
    let snapshot = settings.snapshot();

    let restart = service.as_ref().is_some_and(|s| {
        !s.is_running() || s.source_setting() != snapshot.source_device.as_deref()
    });
    if restart || !snapshot.enabled {
        if let Some(mut running) = service.take() {
            running.stop();
        }
    }

    if snapshot.enabled && service.is_none() {
        match ScrollService::start(settings.clone()) {
            Ok(started) => *service = Some(started),
            Err(e) => error!("Failed to start scrolling: {e:#}"),
        }
    }
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    init_logging(args.verbose);

    if args.list_devices {
        list_devices();
        return Ok(());
    }

    info!("trackscroll starting...");

    let path = Settings::default_path()?;
    let mut settings = Settings::load_from(&path).unwrap_or_else(|e| {
        warn!("{e}, using defaults");
        Settings::default()
    });
    if let Some(device) = args.device {
        // Command line override, not persisted unless the menu saves
        settings.source_device = Some(device);
    }
    let settings = SettingsHandle::with_path(settings, &path);

    let (tx, rx) = mpsc::channel::<AppCommand>();

    let quit_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(AppCommand::Quit);
    })
    .context("Failed to install Ctrl+C handler")?;

    let tray = if args.no_tray {
        None
    } else {
        match TrayIcon::new(settings.clone(), tx.clone()) {
            Ok(tray) => Some(tray),
            Err(e) => {
                warn!("Failed to create tray icon: {e:#}");
                None
            }
        }
    };

    let reload_tx = tx.clone();
    let _watcher = match SettingsWatcher::start(&path, settings.clone(), move |_| {
        let _ = reload_tx.send(AppCommand::SettingsChanged);
    }) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("Settings hot reload unavailable: {e}");
            None
        }
    };
    drop(tx);

    let mut service: Option<ScrollService> = None;
    reconcile(&settings, &mut service);

    while let Ok(command) = rx.recv() {
        match command {
            AppCommand::SettingsChanged => {
                reconcile(&settings, &mut service);
                if let Some(tray) = &tray {
                    tray.refresh();
                }
            }
            AppCommand::Quit => break,
        }
    }

    if let Some(mut running) = service.take() {
        running.stop();
    }
    info!("trackscroll shutting down");
    Ok(())
}
