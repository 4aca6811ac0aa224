//! Integration tests for trackscroll
//!
//! These tests drive the public API the way the grab thread does, without
//! touching real hardware. Tests that require hardware live in
//! hardware_tests.rs and are marked with #[ignore].

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use trackscroll::event::WHEEL_UNIT;
use trackscroll::handoff;
use trackscroll::settings::{ButtonAction, ScrollKeyAction};
use trackscroll::{
    AuxButton, ClassifierState, Dispatcher, InjectError, Injector, Point, RawPointerEvent,
    Settings, SettingsHandle, SyntheticEvent, Verdict, WheelAxis, classify,
};

/// Injector that records into a shared log, usable across threads
#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<SyntheticEvent>>>);

impl SharedLog {
    fn events(&self) -> Vec<SyntheticEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl Injector for SharedLog {
    fn submit(&mut self, events: &[SyntheticEvent]) -> Result<(), InjectError> {
        self.0.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

fn wheel_total(events: &[SyntheticEvent], wanted: WheelAxis) -> i32 {
    events
        .iter()
        .filter_map(|ev| match *ev {
            SyntheticEvent::Wheel {
                axis, magnitude, ..
            } if axis == wanted => Some(magnitude),
            _ => None,
        })
        .sum()
}

/// Hold X1, roll the ball down, release: the cursor stays put and the page
/// scrolls.
#[test]
fn test_hold_to_scroll_session() {
    let settings = Settings {
        scroll_speed: 20,
        ..Settings::default()
    };
    let mut state = ClassifierState::Normal;
    let mut injected = Vec::new();
    let origin = Point::new(400, 300);

    let mut feed = |state: &mut ClassifierState, ev: RawPointerEvent| {
        let result = classify(state, &ev, &settings);
        *state = result.next_state;
        injected.extend(result.synthetic_events);
        result.suppress_original
    };

    assert!(feed(&mut state, RawPointerEvent::aux_down(AuxButton::X1, origin)));
    for _ in 0..6 {
        // The hook reports suppressed motion relative to the frozen origin
        assert!(feed(&mut state, RawPointerEvent::moved(origin.offset(0, 25))));
    }
    assert!(feed(&mut state, RawPointerEvent::aux_up(AuxButton::X1, origin)));
    assert_eq!(state, ClassifierState::Normal);

    // The first move only starts the session; the other five add 125 pixels
    // of which 100 were consumed before the release.
    assert_eq!(wheel_total(&injected, WheelAxis::Vertical), -5 * WHEEL_UNIT);
    assert_eq!(wheel_total(&injected, WheelAxis::Horizontal), 0);
    assert!(injected.iter().all(|ev| ev.target() == origin.offset(0, 25)));
}

/// Motion and clicks outside of a session are never touched
#[test]
fn test_ordinary_pointer_use_passes_through() {
    let settings = Settings::default();
    let mut state = ClassifierState::Normal;
    for i in 0..50 {
        let ev = if i % 10 == 0 {
            RawPointerEvent::other(Point::new(i, i))
        } else {
            RawPointerEvent::moved(Point::new(i, -i))
        };
        let result = classify(&state, &ev, &settings);
        assert!(!result.suppress_original);
        assert!(result.synthetic_events.is_empty());
        state = result.next_state;
    }
    assert_eq!(state, ClassifierState::Normal);
}

/// Full threaded path: hook side requests verdicts, dispatcher answers and
/// injects.
#[test]
fn test_dispatcher_over_handoff() {
    let settings = SettingsHandle::new(Settings {
        aux2: ButtonAction::Middle,
        scroll_speed: 10,
        ..Settings::default()
    });
    let log = SharedLog::default();
    let (mut hook, end) = handoff::channel(16);
    let stop = Arc::new(AtomicBool::new(false));

    let worker = {
        let settings = settings.clone();
        let log = log.clone();
        let stop = stop.clone();
        thread::spawn(move || Dispatcher::new(settings, log).run(end, &stop))
    };

    let timeout = Duration::from_secs(5);
    let at = Point::new(10, 10);
    let mut ask = |ev: RawPointerEvent| hook.request(ev, timeout);

    // Middle click on X2
    assert_eq!(ask(RawPointerEvent::aux_down(AuxButton::X2, at)), Verdict::Suppress);
    assert_eq!(ask(RawPointerEvent::aux_up(AuxButton::X2, at)), Verdict::Suppress);

    // Scroll session on X1
    assert_eq!(ask(RawPointerEvent::aux_down(AuxButton::X1, at)), Verdict::Suppress);
    assert_eq!(ask(RawPointerEvent::moved(at.offset(30, 0))), Verdict::Suppress);
    assert_eq!(ask(RawPointerEvent::moved(at.offset(30, 0))), Verdict::Suppress);
    assert_eq!(ask(RawPointerEvent::moved(at)), Verdict::Suppress);
    assert_eq!(ask(RawPointerEvent::aux_up(AuxButton::X1, at)), Verdict::Suppress);

    // Back to normal
    assert_eq!(ask(RawPointerEvent::moved(at.offset(1, 1))), Verdict::Propagate);

    drop(hook);
    worker.join().unwrap();

    let events = log.events();
    assert_eq!(events[0], SyntheticEvent::middle_down(at));
    assert_eq!(events[1], SyntheticEvent::middle_up(at));
    assert_eq!(wheel_total(&events, WheelAxis::Horizontal), 3 * WHEEL_UNIT);
}

/// Emulate-middle: a click without motion turns into a middle click, a drag
/// scrolls instead.
#[test]
fn test_emulate_middle_click_or_scroll() {
    let settings = Settings {
        scroll_key_action: ScrollKeyAction::EmulateMiddle,
        ..Settings::default()
    };
    let at = Point::new(0, 0);

    let down = classify(
        &ClassifierState::Normal,
        &RawPointerEvent::aux_down(AuxButton::X1, at),
        &settings,
    );
    let up = classify(
        &down.next_state,
        &RawPointerEvent::aux_up(AuxButton::X1, at),
        &settings,
    );
    assert!(up.suppress_original);
    assert_eq!(
        up.synthetic_events,
        vec![SyntheticEvent::middle_down(at), SyntheticEvent::middle_up(at)]
    );
    assert_eq!(up.next_state, ClassifierState::Normal);

    let moved = classify(&down.next_state, &RawPointerEvent::moved(at.offset(3, 3)), &settings);
    let up_after_drag = classify(
        &moved.next_state,
        &RawPointerEvent::aux_up(AuxButton::X1, at),
        &settings,
    );
    assert!(up_after_drag.synthetic_events.is_empty());
    assert_eq!(up_after_drag.next_state, ClassifierState::Normal);
}

/// Settings written by one handle are what the next start reads back
#[test]
fn test_settings_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let handle = SettingsHandle::with_path(Settings::default(), &path);
    handle.update(|s| {
        s.aux1 = ButtonAction::Middle;
        s.aux2 = ButtonAction::Scroll;
        s.reverse_vertical = true;
        s.source_device = Some("/dev/input/event9".to_string());
    });
    handle.persist().unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded, *handle.snapshot());

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("aux1 = \"middle\""));
    assert!(text.contains("reverse_vertical = true"));
}

/// Older or hand-written files with missing keys load with defaults
#[test]
fn test_partial_settings_file() {
    let loaded = Settings::from_toml("aux2 = \"middle\"\nscroll_speed = 0\n").unwrap();
    assert_eq!(loaded.aux1, ButtonAction::Scroll);
    assert_eq!(loaded.aux2, ButtonAction::Middle);
    assert_eq!(loaded.scroll_speed, Settings::default().scroll_speed);
}
