//! Pointer event model shared by the hook, the classifier and the injector
//!
//! Raw events flow in from the grabbed trackball, synthetic events flow out to
//! the virtual pointer. Both carry plain screen-space coordinates; nothing here
//! knows about evdev.

use std::fmt;
use std::time::SystemTime;

/// One wheel notch in hi-res wheel units (same value as the Linux
/// `REL_WHEEL_HI_RES` unit and the classic `WHEEL_DELTA`).
pub const WHEEL_UNIT: i32 = 120;

/// Screen position in device coordinates, never normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Auxiliary (side) buttons of the trackball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxButton {
    /// X1, reported by the kernel as `BTN_SIDE` (usually "back")
    X1,
    /// X2, reported by the kernel as `BTN_EXTRA` (usually "forward")
    X2,
}

impl AuxButton {
    /// Numeric id as used in the settings menu ("X1" = 1, "X2" = 2)
    pub fn id(self) -> u8 {
        match self {
            AuxButton::X1 => 1,
            AuxButton::X2 => 2,
        }
    }

}

impl fmt::Display for AuxButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{}", self.id())
    }
}

/// What kind of hardware event was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    AuxDown(AuxButton),
    AuxUp(AuxButton),
    Move,
    /// Anything else: primary buttons, the physical wheel, misc reports
    Other,
}

/// One observed hardware event, consumed exactly once by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPointerEvent {
    pub kind: RawEventKind,
    pub position: Point,
    pub timestamp: SystemTime,
}

impl RawPointerEvent {
    pub fn new(kind: RawEventKind, position: Point) -> Self {
        Self {
            kind,
            position,
            timestamp: SystemTime::now(),
        }
    }

    pub fn aux_down(button: AuxButton, position: Point) -> Self {
        Self::new(RawEventKind::AuxDown(button), position)
    }

    pub fn aux_up(button: AuxButton, position: Point) -> Self {
        Self::new(RawEventKind::AuxUp(button), position)
    }

    pub fn moved(position: Point) -> Self {
        Self::new(RawEventKind::Move, position)
    }

    pub fn other(position: Point) -> Self {
        Self::new(RawEventKind::Other, position)
    }
}

/// Buttons the program may press on the virtual pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticButton {
    Middle,
    Aux(AuxButton),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAxis {
    Vertical,
    Horizontal,
}

/// Descriptor of one injected input event
///
/// Wheel magnitudes are signed and expressed in [`WHEEL_UNIT`] units:
/// positive vertical scrolls away from the user, positive horizontal scrolls
/// right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticEvent {
    ButtonDown {
        button: SyntheticButton,
        target: Point,
    },
    ButtonUp {
        button: SyntheticButton,
        target: Point,
    },
    Wheel {
        axis: WheelAxis,
        magnitude: i32,
        target: Point,
    },
}

impl SyntheticEvent {
    pub fn middle_down(target: Point) -> Self {
        SyntheticEvent::ButtonDown {
            button: SyntheticButton::Middle,
            target,
        }
    }

    pub fn middle_up(target: Point) -> Self {
        SyntheticEvent::ButtonUp {
            button: SyntheticButton::Middle,
            target,
        }
    }

    pub fn aux_down(button: AuxButton, target: Point) -> Self {
        SyntheticEvent::ButtonDown {
            button: SyntheticButton::Aux(button),
            target,
        }
    }

    pub fn aux_up(button: AuxButton, target: Point) -> Self {
        SyntheticEvent::ButtonUp {
            button: SyntheticButton::Aux(button),
            target,
        }
    }

    pub fn wheel(axis: WheelAxis, magnitude: i32, target: Point) -> Self {
        SyntheticEvent::Wheel {
            axis,
            magnitude,
            target,
        }
    }

    pub fn target(&self) -> Point {
        match *self {
            SyntheticEvent::ButtonDown { target, .. }
            | SyntheticEvent::ButtonUp { target, .. }
            | SyntheticEvent::Wheel { target, .. } => target,
        }
    }
}
