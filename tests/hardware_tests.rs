//! Hardware-dependent tests that require a real trackball
//!
//! These tests are ignored by default and can be run with:
//! `cargo test -- --ignored`
//!
//! They require:
//! - A connected pointer with side buttons (BTN_SIDE / BTN_EXTRA)
//! - Read access to /dev/input/event* (root or the `input` group)
//! - uinput module loaded and /dev/uinput writable

use std::time::Duration;
use trackscroll::hook;
use trackscroll::{ScrollService, Settings, SettingsHandle};

/// Test pointer enumeration with real hardware
#[test]
#[ignore]
fn test_real_pointer_listing() {
    let devices = hook::list_pointer_devices();
    println!("Found {} pointer device(s)", devices.len());
    for dev in &devices {
        println!(
            "  {:?}: '{}' side_btns={}",
            dev.path, dev.name, dev.has_side_buttons
        );
    }
    assert!(!devices.is_empty(), "No pointer devices found");
}

/// Test that auto-detection finds a usable source
#[test]
#[ignore]
fn test_real_source_selection() {
    let path = hook::select_source_device(None).expect("No trackball with side buttons found");
    assert!(path.exists());
}

/// Test grab, virtual pointer creation and release
#[test]
#[ignore]
fn test_real_grab_and_release() {
    let path = hook::select_source_device(None).expect("No trackball with side buttons found");
    let mut dev = hook::open_and_grab(&path).expect("Failed to grab device");
    let vdev = hook::build_virtual_pointer(&dev).expect("Failed to create virtual pointer");
    drop(vdev);
    dev.ungrab().expect("Failed to release grab");
}

/// Test the full service lifecycle; stop must be idempotent
#[test]
#[ignore]
fn test_real_service_start_stop() {
    let settings = SettingsHandle::new(Settings::default());
    let mut service = ScrollService::start(settings).expect("Failed to start service");
    assert!(service.is_running());
    println!("Scrolling on {:?} for one second...", service.device_path());

    std::thread::sleep(Duration::from_secs(1));

    service.stop();
    assert!(!service.is_running());
    service.stop();
}
