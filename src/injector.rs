//! Synthetic input injection through the uinput virtual pointer

use crate::event::{AuxButton, SyntheticButton, SyntheticEvent, WHEEL_UNIT, WheelAxis};
use evdev::uinput::VirtualDevice;
use evdev::{EventType, InputEvent, Key, RelativeAxisType};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::trace;

/// Virtual pointer shared by the grab thread (pass-through) and the injector
pub type SharedPointer = Arc<Mutex<VirtualDevice>>;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("uinput emit failed: {0}")]
    Emit(#[from] std::io::Error),
}

/// Sink for synthetic events, submitted in order as one batch
pub trait Injector: Send {
    fn submit(&mut self, events: &[SyntheticEvent]) -> Result<(), InjectError>;
}

/// Sub-notch wheel travel not yet reported on the legacy wheel axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelRemainder {
    vertical: i32,
    horizontal: i32,
}

impl WheelRemainder {
    fn slot(&mut self, axis: WheelAxis) -> &mut i32 {
        match axis {
            WheelAxis::Vertical => &mut self.vertical,
            WheelAxis::Horizontal => &mut self.horizontal,
        }
    }
}

fn button_key(button: SyntheticButton) -> Key {
    match button {
        SyntheticButton::Middle => Key::BTN_MIDDLE,
        SyntheticButton::Aux(AuxButton::X1) => Key::BTN_SIDE,
        SyntheticButton::Aux(AuxButton::X2) => Key::BTN_EXTRA,
    }
}

fn wheel_axes(axis: WheelAxis) -> (RelativeAxisType, RelativeAxisType) {
    match axis {
        WheelAxis::Vertical => (RelativeAxisType::REL_WHEEL_HI_RES, RelativeAxisType::REL_WHEEL),
        WheelAxis::Horizontal => (
            RelativeAxisType::REL_HWHEEL_HI_RES,
            RelativeAxisType::REL_HWHEEL,
        ),
    }
}

/// Translate one descriptor into the evdev events of a single report.
///
/// Wheel descriptors always produce the hi-res event. The legacy notch event
/// is added once the accumulated travel on that axis reaches a full notch.
pub fn translate(event: &SyntheticEvent, remainder: &mut WheelRemainder) -> Vec<InputEvent> {
    match *event {
        SyntheticEvent::ButtonDown { button, .. } => {
            vec![InputEvent::new(EventType::KEY, button_key(button).code(), 1)]
        }
        SyntheticEvent::ButtonUp { button, .. } => {
            vec![InputEvent::new(EventType::KEY, button_key(button).code(), 0)]
        }
        SyntheticEvent::Wheel {
            axis, magnitude, ..
        } => {
            let (hi_res, legacy) = wheel_axes(axis);
            let mut out = vec![InputEvent::new(EventType::RELATIVE, hi_res.0, magnitude)];

            let pending = remainder.slot(axis);
            let total = pending.saturating_add(magnitude);
            let notches = total / WHEEL_UNIT;
            *pending = total - notches * WHEEL_UNIT;
            if notches != 0 {
                out.push(InputEvent::new(EventType::RELATIVE, legacy.0, notches));
            }
            out
        }
    }
}

/// Injects into the virtual pointer, one report per descriptor
pub struct UinputInjector {
    device: SharedPointer,
    remainder: WheelRemainder,
}

impl UinputInjector {
    pub fn new(device: SharedPointer) -> Self {
        Self {
            device,
            remainder: WheelRemainder::default(),
        }
    }
}

impl Injector for UinputInjector {
    fn submit(&mut self, events: &[SyntheticEvent]) -> Result<(), InjectError> {
        for event in events {
            let report = translate(event, &mut self.remainder);
            trace!("Injecting {:?} at {}", event, event.target());
            let mut device = self.device.lock().unwrap_or_else(|e| e.into_inner());
            // emit() terminates the report with SYN_REPORT
            device.emit(&report)?;
        }
        Ok(())
    }
}
