//! Side-button event classification
//!
//! A pure state machine: given the current state, one raw event and a settings
//! snapshot, decide the next state, whether the original event is swallowed,
//! and which synthetic events to inject. No I/O and no hidden state; the
//! dispatcher owns the only `ClassifierState` and replaces it after each step.
//!
//! Any combination not listed explicitly falls back to "stay in the current
//! state and let the event through", so a gap here can never eat input.

use crate::event::{AuxButton, Point, RawEventKind, RawPointerEvent, SyntheticEvent, WHEEL_UNIT, WheelAxis};
use crate::settings::{DualAxisTicks, ScrollKeyAction, Settings};
use std::fmt;

/// Where the side-button gesture currently is
///
/// Every non-normal state remembers the button that entered it, so the
/// matching release always closes the gesture even if the settings changed in
/// between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierState {
    /// No gesture in progress, the trackball acts normally
    #[default]
    Normal,
    /// Scroll button is down (or toggled on), waiting for motion
    ScrollArmed { origin: Point, button: AuxButton },
    /// Motion is being turned into wheel ticks
    Scrolling {
        origin: Point,
        button: AuxButton,
        acc_x: i32,
        acc_y: i32,
    },
    /// A side button is standing in for the middle button
    MiddleHeld {
        origin: Point,
        button: AuxButton,
        /// The other side button was pressed (and swallowed) while held
        swallowed_other: bool,
    },
    /// Emulated back/forward press waiting for the completing tap
    DefaultHeld { origin: Point, button: AuxButton },
}

impl ClassifierState {
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierState::Normal => "Normal",
            ClassifierState::ScrollArmed { .. } => "ScrollArmed",
            ClassifierState::Scrolling { .. } => "Scrolling",
            ClassifierState::MiddleHeld { .. } => "MiddleHeld",
            ClassifierState::DefaultHeld { .. } => "DefaultHeld",
        }
    }

    /// Position recorded when the state was entered
    pub fn origin(&self) -> Option<Point> {
        match *self {
            ClassifierState::Normal => None,
            ClassifierState::ScrollArmed { origin, .. }
            | ClassifierState::Scrolling { origin, .. }
            | ClassifierState::MiddleHeld { origin, .. }
            | ClassifierState::DefaultHeld { origin, .. } => Some(origin),
        }
    }
}

impl fmt::Display for ClassifierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ClassifierState::Normal => write!(f, "Normal"),
            ClassifierState::Scrolling {
                origin,
                button,
                acc_x,
                acc_y,
            } => write!(f, "Scrolling[{button} @ {origin}, acc=({acc_x}, {acc_y})]"),
            other => match other.origin() {
                Some(origin) => write!(f, "{}[@ {origin}]", other.name()),
                None => write!(f, "{}", other.name()),
            },
        }
    }
}

/// Outcome of one classification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierResult {
    pub next_state: ClassifierState,
    /// True: the original event must not reach the rest of the system
    pub suppress_original: bool,
    /// Events to inject, in order (at most two)
    pub synthetic_events: Vec<SyntheticEvent>,
}

impl ClassifierResult {
    fn pass(state: ClassifierState) -> Self {
        Self {
            next_state: state,
            suppress_original: false,
            synthetic_events: Vec::new(),
        }
    }

    fn suppress(next_state: ClassifierState) -> Self {
        Self::suppress_with(next_state, Vec::new())
    }

    fn suppress_with(next_state: ClassifierState, synthetic_events: Vec<SyntheticEvent>) -> Self {
        Self {
            next_state,
            suppress_original: true,
            synthetic_events,
        }
    }
}

/// Run one step of the state machine
pub fn classify(
    state: &ClassifierState,
    event: &RawPointerEvent,
    settings: &Settings,
) -> ClassifierResult {
    match *state {
        ClassifierState::Normal => normal(event, settings),
        ClassifierState::ScrollArmed { origin, button } => {
            scroll_armed(*state, origin, button, event, settings)
        }
        ClassifierState::Scrolling {
            origin,
            button,
            acc_x,
            acc_y,
        } => scrolling(*state, origin, button, (acc_x, acc_y), event, settings),
        ClassifierState::MiddleHeld {
            button,
            swallowed_other,
            ..
        } => middle_held(*state, button, swallowed_other, event),
        ClassifierState::DefaultHeld { button, .. } => default_held(*state, button, event),
    }
}

fn normal(event: &RawPointerEvent, settings: &Settings) -> ClassifierResult {
    let pos = event.position;
    match event.kind {
        RawEventKind::AuxDown(button) if settings.uses_for_middle(button) => {
            ClassifierResult::suppress_with(
                ClassifierState::MiddleHeld {
                    origin: pos,
                    button,
                    swallowed_other: false,
                },
                vec![SyntheticEvent::middle_down(pos)],
            )
        }
        RawEventKind::AuxDown(button) if settings.uses_for_scroll(button) => {
            ClassifierResult::suppress(ClassifierState::ScrollArmed {
                origin: pos,
                button,
            })
        }
        // Release of the second tap that switched toggle-scrolling off
        RawEventKind::AuxUp(button)
            if settings.uses_for_scroll(button)
                && settings.scroll_key_action == ScrollKeyAction::Toggle =>
        {
            ClassifierResult::suppress(ClassifierState::Normal)
        }
        _ => ClassifierResult::pass(ClassifierState::Normal),
    }
}

fn scroll_armed(
    state: ClassifierState,
    origin: Point,
    armed_by: AuxButton,
    event: &RawPointerEvent,
    settings: &Settings,
) -> ClassifierResult {
    let pos = event.position;
    let toggle = settings.scroll_key_action == ScrollKeyAction::Toggle;
    match event.kind {
        RawEventKind::AuxUp(button) if button == armed_by => match settings.scroll_key_action {
            ScrollKeyAction::Toggle => ClassifierResult::suppress(ClassifierState::ScrollArmed {
                origin: pos,
                button,
            }),
            ScrollKeyAction::EmulateDefault => ClassifierResult::suppress_with(
                ClassifierState::DefaultHeld { origin: pos, button },
                vec![SyntheticEvent::aux_down(button, pos)],
            ),
            ScrollKeyAction::EmulateMiddle => ClassifierResult::suppress_with(
                ClassifierState::Normal,
                vec![SyntheticEvent::middle_down(pos), SyntheticEvent::middle_up(pos)],
            ),
            ScrollKeyAction::None => ClassifierResult::suppress(ClassifierState::Normal),
        },
        RawEventKind::AuxDown(button) if button == armed_by && toggle => {
            ClassifierResult::suppress(ClassifierState::Normal)
        }
        // First motion starts scrolling; its own delta is absorbed
        RawEventKind::Move => ClassifierResult::suppress(ClassifierState::Scrolling {
            origin,
            button: armed_by,
            acc_x: 0,
            acc_y: 0,
        }),
        _ => ClassifierResult::pass(state),
    }
}

fn scrolling(
    state: ClassifierState,
    origin: Point,
    armed_by: AuxButton,
    acc: (i32, i32),
    event: &RawPointerEvent,
    settings: &Settings,
) -> ClassifierResult {
    let toggle = settings.scroll_key_action == ScrollKeyAction::Toggle;
    match event.kind {
        RawEventKind::AuxUp(button) if button == armed_by => {
            if toggle {
                ClassifierResult::suppress(ClassifierState::Scrolling {
                    origin,
                    button,
                    acc_x: 0,
                    acc_y: 0,
                })
            } else {
                ClassifierResult::suppress(ClassifierState::Normal)
            }
        }
        RawEventKind::AuxDown(button) if button == armed_by && toggle => {
            ClassifierResult::suppress(ClassifierState::Normal)
        }
        RawEventKind::Move => scroll_step(origin, armed_by, acc, event.position, settings),
        _ => ClassifierResult::pass(state),
    }
}

/// Consume whole notches from the accumulated motion, then add the new delta.
///
/// The threshold is checked against the accumulation *before* this event's
/// delta is added. The origin never moves: the suppressed cursor stays put,
/// so `position - origin` is exactly this event's motion.
fn scroll_step(
    origin: Point,
    button: AuxButton,
    (acc_x, acc_y): (i32, i32),
    pos: Point,
    settings: &Settings,
) -> ClassifierResult {
    let speed = settings.speed_divisor();
    let mut x = acc_x;
    let mut y = acc_y;
    let mut horizontal = None;
    let mut vertical = None;

    if acc_x.abs() > speed {
        let notches = acc_x / speed;
        let sign = if settings.reverse_horizontal { -1 } else { 1 };
        horizontal = Some(SyntheticEvent::wheel(
            WheelAxis::Horizontal,
            sign * WHEEL_UNIT * notches,
            pos,
        ));
        x = acc_x - notches * speed;
        if settings.prefer_axis {
            y = 0;
        }
    }

    if acc_y.abs() > speed {
        let notches = acc_y / speed;
        // Screen y grows downwards, wheel "up" is positive
        let sign = if settings.reverse_vertical { 1 } else { -1 };
        vertical = Some(SyntheticEvent::wheel(
            WheelAxis::Vertical,
            sign * WHEEL_UNIT * notches,
            pos,
        ));
        if settings.prefer_axis {
            x = 0;
        }
        y = acc_y - notches * speed;
    }

    let synthetic_events = match (horizontal, vertical) {
        (Some(_), Some(v))
            if settings.prefer_axis || settings.dual_axis_ticks == DualAxisTicks::LastAxisOnly =>
        {
            vec![v]
        }
        (h, v) => h.into_iter().chain(v).collect(),
    };

    x = x.saturating_add(pos.x.saturating_sub(origin.x));
    y = y.saturating_add(pos.y.saturating_sub(origin.y));

    ClassifierResult::suppress_with(
        ClassifierState::Scrolling {
            origin,
            button,
            acc_x: x,
            acc_y: y,
        },
        synthetic_events,
    )
}

fn middle_held(
    state: ClassifierState,
    held: AuxButton,
    swallowed_other: bool,
    event: &RawPointerEvent,
) -> ClassifierResult {
    let pos = event.position;
    match event.kind {
        RawEventKind::AuxUp(button) if button == held => ClassifierResult::suppress_with(
            ClassifierState::Normal,
            vec![SyntheticEvent::middle_up(pos)],
        ),
        // Other side-button presses are ignored until the middle is released
        RawEventKind::AuxDown(button) => ClassifierResult::suppress(ClassifierState::MiddleHeld {
            origin: pos,
            button: held,
            swallowed_other: swallowed_other || button != held,
        }),
        // The release belonging to a swallowed press is swallowed too
        RawEventKind::AuxUp(_) if swallowed_other => {
            ClassifierResult::suppress(ClassifierState::MiddleHeld {
                origin: state.origin().unwrap_or(pos),
                button: held,
                swallowed_other: false,
            })
        }
        _ => ClassifierResult::pass(state),
    }
}

fn default_held(state: ClassifierState, held: AuxButton, event: &RawPointerEvent) -> ClassifierResult {
    match event.kind {
        RawEventKind::AuxDown(button) if button == held => ClassifierResult::suppress_with(
            ClassifierState::Normal,
            vec![SyntheticEvent::aux_up(held, event.position)],
        ),
        _ => ClassifierResult::pass(state),
    }
}
