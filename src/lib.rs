//! trackscroll - scroll with a trackball by holding a side button
//!
//! The trackball is grabbed through evdev. Side-button presses and motion
//! are run through [`classifier::classify`], which decides whether the
//! original event reaches the desktop and which wheel ticks or middle clicks
//! are injected instead through a uinput virtual pointer.

pub mod classifier;
pub mod dispatcher;
pub mod event;
pub mod handoff;
pub mod hook;
pub mod injector;
pub mod service;
pub mod settings;
pub mod tray;
pub mod watcher;

pub use classifier::{ClassifierResult, ClassifierState, classify};
pub use dispatcher::Dispatcher;
pub use event::{AuxButton, Point, RawEventKind, RawPointerEvent, SyntheticEvent, WheelAxis};
pub use handoff::Verdict;
pub use hook::HookError;
pub use injector::{InjectError, Injector, UinputInjector};
pub use service::ScrollService;
pub use settings::{Settings, SettingsError, SettingsHandle};
pub use watcher::SettingsWatcher;

/// Requests for the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// The settings snapshot changed (tray menu or file reload)
    SettingsChanged,
    Quit,
}
