//! Trackball interception (evdev grab + uinput pass-through)
//!
//! The trackball node is grabbed so nothing reaches the desktop directly.
//! Every report is split into segments, each segment is classified through
//! the verdict handoff, and propagated segments are re-emitted unchanged on
//! the virtual pointer. Suppressed segments are simply not re-emitted.

use crate::event::{AuxButton, Point, RawEventKind, RawPointerEvent};
use crate::handoff::{HookEnd, Verdict};
use crate::injector::SharedPointer;
use crate::settings::SettingsHandle;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, InputEvent, InputEventKind, Key, RelativeAxisType, Synchronization};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of our own virtual pointer, never picked as a source
pub const VIRTUAL_DEVICE_NAME: &str = "trackscroll virtual pointer";

#[derive(Error, Debug)]
pub enum HookError {
    #[error("No trackball with side buttons found (try --device /dev/input/eventN)")]
    NoDevice,

    #[error("Failed to open evdev device {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to grab evdev device {path:?}: {source}")]
    Grab {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set evdev device non-blocking: {0}")]
    NonBlocking(#[source] std::io::Error),

    #[error("Failed to build uinput device: {0}")]
    VirtualDevice(#[source] std::io::Error),

    #[error("Failed to read events from evdev device: {0}")]
    Read(#[source] std::io::Error),
}

/// Information about a pointer-like input node
#[derive(Debug, Clone)]
pub struct PointerDeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub has_side_buttons: bool,
    pub has_motion: bool,
}

impl PointerDeviceInfo {
    fn probe(path: PathBuf, dev: &Device) -> Self {
        let name = dev.name().unwrap_or_default().to_string();
        let has_side_buttons = dev
            .supported_keys()
            .map(|k| k.contains(Key::BTN_SIDE) || k.contains(Key::BTN_EXTRA))
            .unwrap_or(false);
        let has_motion = dev
            .supported_relative_axes()
            .map(|r| r.contains(RelativeAxisType::REL_X) && r.contains(RelativeAxisType::REL_Y))
            .unwrap_or(false);
        Self {
            path,
            name,
            has_side_buttons,
            has_motion,
        }
    }

    /// Usable as a scroll source
    pub fn is_candidate(&self) -> bool {
        self.has_side_buttons && self.has_motion && self.name != VIRTUAL_DEVICE_NAME
    }

    pub fn looks_like_trackball(&self) -> bool {
        self.name.to_ascii_lowercase().contains("trackball")
    }
}

/// List every node that reports relative motion, sorted by path
pub fn list_pointer_devices() -> Vec<PointerDeviceInfo> {
    let mut devices: Vec<PointerDeviceInfo> = evdev::enumerate()
        .map(|(path, dev)| PointerDeviceInfo::probe(path, &dev))
        .filter(|info| info.has_motion)
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

/// Pick the node to grab.
///
/// An explicitly configured node wins if it exists. Otherwise the first
/// candidate whose name mentions "trackball", then any candidate at all.
pub fn select_source_device(preferred_device: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = preferred_device {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
        warn!("Configured device {:?} does not exist, auto-detecting", path);
    }

    info!("Scanning /dev/input/event* devices for a trackball...");
    pick_candidate(list_pointer_devices())
}

fn pick_candidate(devices: Vec<PointerDeviceInfo>) -> Option<PathBuf> {
    let mut fallback: Option<PathBuf> = None;
    for info in devices {
        debug!(
            "  {:?}: '{}' side_btns={} motion={}",
            info.path, info.name, info.has_side_buttons, info.has_motion
        );
        if !info.is_candidate() {
            continue;
        }
        if info.looks_like_trackball() {
            info!("Selected trackball: {:?} ({})", info.path, info.name);
            return Some(info.path);
        }
        if fallback.is_none() {
            fallback = Some(info.path);
        }
    }

    match &fallback {
        Some(p) => info!("Selected fallback pointer with side buttons: {:?}", p),
        None => warn!("No suitable input device found!"),
    }
    fallback
}

/// Open the node, switch it to non-blocking reads and grab it exclusively
pub fn open_and_grab(path: &Path) -> Result<Device, HookError> {
    let mut dev = Device::open(path).map_err(|source| HookError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    set_nonblocking(&dev).map_err(HookError::NonBlocking)?;
    dev.grab().map_err(|source| HookError::Grab {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Grabbed device: {:?} ({})",
        path,
        dev.name().unwrap_or("?")
    );
    Ok(dev)
}

/// Build the virtual pointer mirroring the source plus everything we inject
pub fn build_virtual_pointer(source: &Device) -> Result<VirtualDevice, HookError> {
    let mut keys: AttributeSet<Key> = AttributeSet::new();
    if let Some(src_keys) = source.supported_keys() {
        for k in src_keys.iter() {
            keys.insert(k);
        }
    }
    for k in [
        Key::BTN_LEFT,
        Key::BTN_RIGHT,
        Key::BTN_MIDDLE,
        Key::BTN_SIDE,
        Key::BTN_EXTRA,
    ] {
        keys.insert(k);
    }

    let mut axes: AttributeSet<RelativeAxisType> = AttributeSet::new();
    if let Some(src_axes) = source.supported_relative_axes() {
        for axis in src_axes.iter() {
            axes.insert(axis);
        }
    }
    for axis in [
        RelativeAxisType::REL_X,
        RelativeAxisType::REL_Y,
        RelativeAxisType::REL_WHEEL,
        RelativeAxisType::REL_HWHEEL,
        RelativeAxisType::REL_WHEEL_HI_RES,
        RelativeAxisType::REL_HWHEEL_HI_RES,
    ] {
        axes.insert(axis);
    }

    let vdev = VirtualDeviceBuilder::new()
        .map_err(HookError::VirtualDevice)?
        .name(VIRTUAL_DEVICE_NAME)
        .with_keys(&keys)
        .map_err(HookError::VirtualDevice)?
        .with_relative_axes(&axes)
        .map_err(HookError::VirtualDevice)?
        .build()
        .map_err(HookError::VirtualDevice)?;
    info!("Virtual pointer created");
    Ok(vdev)
}

fn set_nonblocking(dev: &Device) -> std::io::Result<()> {
    let raw_fd = dev.as_raw_fd();

    // Preserve existing flags; just OR in O_NONBLOCK.
    let current = unsafe { libc::fcntl(raw_fd, libc::F_GETFL) };
    if current < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let rc = unsafe { libc::fcntl(raw_fd, libc::F_SETFL, current | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn aux_button(key: Key) -> Option<AuxButton> {
    if key == Key::BTN_SIDE {
        Some(AuxButton::X1)
    } else if key == Key::BTN_EXTRA {
        Some(AuxButton::X2)
    } else {
        None
    }
}

/// What a segment of a report means to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Aux { button: AuxButton, pressed: bool },
    Move { dx: i32, dy: i32 },
    Other,
}

/// Part of one kernel report that is classified and forwarded as a unit
#[derive(Debug, Clone)]
pub struct Segment {
    pub kind: SegmentKind,
    pub events: Vec<InputEvent>,
    pub timestamp: SystemTime,
}

/// Split one report (without its SYN_REPORT) into segments.
///
/// Order: everything unrelated first, then each side-button transition in
/// report order, then the combined motion. Autorepeat values (2) on the side
/// buttons are treated as unrelated.
pub fn split_frame(frame: &[InputEvent]) -> Vec<Segment> {
    let timestamp = frame
        .first()
        .map(|ev| ev.timestamp())
        .unwrap_or_else(SystemTime::now);

    let mut other = Vec::new();
    let mut buttons = Vec::new();
    let mut motion = Vec::new();
    let (mut dx, mut dy) = (0, 0);

    for ev in frame {
        match ev.kind() {
            InputEventKind::Key(key) if matches!(ev.value(), 0 | 1) => match aux_button(key) {
                Some(button) => buttons.push(Segment {
                    kind: SegmentKind::Aux {
                        button,
                        pressed: ev.value() == 1,
                    },
                    events: vec![*ev],
                    timestamp,
                }),
                None => other.push(*ev),
            },
            InputEventKind::RelAxis(RelativeAxisType::REL_X) => {
                dx += ev.value();
                motion.push(*ev);
            }
            InputEventKind::RelAxis(RelativeAxisType::REL_Y) => {
                dy += ev.value();
                motion.push(*ev);
            }
            InputEventKind::Synchronization(_) => {}
            _ => other.push(*ev),
        }
    }

    let mut segments = Vec::with_capacity(buttons.len() + 2);
    if !other.is_empty() {
        segments.push(Segment {
            kind: SegmentKind::Other,
            events: other,
            timestamp,
        });
    }
    segments.extend(buttons);
    if !motion.is_empty() {
        segments.push(Segment {
            kind: SegmentKind::Move { dx, dy },
            events: motion,
            timestamp,
        });
    }
    segments
}

/// Virtual cursor position as seen by the desktop.
///
/// Only propagated motion moves the cursor, so while motion is suppressed the
/// settled position stays at the scroll origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorTracker {
    settled: Point,
}

impl CursorTracker {
    pub fn position(&self) -> Point {
        self.settled
    }

    /// Position carried by the raw event for this segment
    pub fn position_for(&self, kind: &SegmentKind) -> Point {
        match *kind {
            SegmentKind::Move { dx, dy } => self.settled.offset(dx, dy),
            _ => self.settled,
        }
    }

    pub fn commit(&mut self, kind: &SegmentKind, verdict: Verdict) {
        if verdict == Verdict::Propagate {
            self.settled = self.position_for(kind);
        }
    }
}

/// The raw event the classifier sees for a segment
pub fn raw_event(segment: &Segment, position: Point) -> RawPointerEvent {
    let kind = match segment.kind {
        SegmentKind::Aux {
            button,
            pressed: true,
        } => RawEventKind::AuxDown(button),
        SegmentKind::Aux {
            button,
            pressed: false,
        } => RawEventKind::AuxUp(button),
        SegmentKind::Move { .. } => RawEventKind::Move,
        SegmentKind::Other => RawEventKind::Other,
    };
    RawPointerEvent {
        kind,
        position,
        timestamp: segment.timestamp,
    }
}

/// Grab-thread loop: read reports, ask for verdicts, forward what propagates
pub(crate) fn run_hook_loop(
    stop: Arc<AtomicBool>,
    mut device: Device,
    output: SharedPointer,
    mut handoff: HookEnd,
    settings: SettingsHandle,
) -> Result<(), HookError> {
    let mut cursor = CursorTracker::default();
    let mut frame: Vec<InputEvent> = Vec::new();

    info!("Hook running, waiting for trackball events...");

    let result = loop {
        if stop.load(Ordering::Relaxed) {
            break Ok(());
        }

        let mut had_events = false;
        match device.fetch_events() {
            Ok(events) => {
                for ev in events {
                    had_events = true;
                    if let InputEventKind::Synchronization(Synchronization::SYN_REPORT) = ev.kind() {
                        handle_frame(&frame, &mut cursor, &mut handoff, &output, &settings);
                        frame.clear();
                    } else {
                        frame.push(ev);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No events available
            }
            Err(e) => break Err(HookError::Read(e)),
        }

        if !had_events {
            thread::sleep(Duration::from_millis(2));
        }
    };

    // Best-effort ungrab. (Dropping the device should also release the grab.)
    let _ = device.ungrab();
    info!("Trackball released");
    result
}

fn handle_frame(
    frame: &[InputEvent],
    cursor: &mut CursorTracker,
    handoff: &mut HookEnd,
    output: &SharedPointer,
    settings: &SettingsHandle,
) {
    if frame.is_empty() {
        return;
    }
    let timeout = Duration::from_millis(settings.snapshot().verdict_timeout_ms);

    for segment in split_frame(frame) {
        let position = cursor.position_for(&segment.kind);
        let verdict = handoff.request(raw_event(&segment, position), timeout);
        cursor.commit(&segment.kind, verdict);

        if verdict == Verdict::Propagate {
            let mut vdev = output.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = vdev.emit(&segment.events) {
                warn!("uinput emit failed: {e}");
            }
        }
    }
}
