//! Dispatcher: owns the classifier state and acts on its results

use crate::classifier::{ClassifierState, classify};
use crate::event::{RawPointerEvent, SyntheticEvent};
use crate::handoff::{DispatchEnd, Verdict};
use crate::injector::Injector;
use crate::settings::SettingsHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often `run` re-checks the stop flag while idle
const IDLE_POLL: Duration = Duration::from_millis(50);

pub struct Dispatcher<I: Injector> {
    state: ClassifierState,
    settings: SettingsHandle,
    injector: I,
}

impl<I: Injector> Dispatcher<I> {
    pub fn new(settings: SettingsHandle, injector: I) -> Self {
        Self {
            state: ClassifierState::Normal,
            settings,
            injector,
        }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    /// Classify one event, inject what it asks for and return its verdict.
    ///
    /// The state advances even when injection fails; the failure is logged
    /// and not retried.
    pub fn dispatch(&mut self, event: &RawPointerEvent) -> Verdict {
        let settings = self.settings.snapshot();
        let result = classify(&self.state, event, &settings);

        if result.next_state != self.state {
            debug!("{} -> {} on {:?}", self.state, result.next_state, event.kind);
        }
        self.state = result.next_state;

        self.inject(&result.synthetic_events);

        if result.suppress_original {
            Verdict::Suppress
        } else {
            Verdict::Propagate
        }
    }

    /// Serve the handoff until `stop` is set or the grab thread goes away
    pub fn run(&mut self, handoff: DispatchEnd, stop: &AtomicBool) {
        info!("Dispatcher running");
        while !stop.load(Ordering::Relaxed) {
            match handoff.recv_timeout(IDLE_POLL) {
                Ok(pending) => {
                    let verdict = self.dispatch(&pending.event);
                    handoff.reply(pending.seq, verdict);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.release_held();
        info!("Dispatcher stopped");
    }

    /// Release any button we are still holding down and return to Normal
    pub fn release_held(&mut self) {
        let release = match self.state {
            ClassifierState::MiddleHeld { origin, .. } => Some(SyntheticEvent::middle_up(origin)),
            ClassifierState::DefaultHeld { origin, button } => {
                Some(SyntheticEvent::aux_up(button, origin))
            }
            _ => None,
        };
        if let Some(ev) = release {
            info!("Releasing held button on shutdown ({})", self.state);
            self.inject(&[ev]);
        }
        self.state = ClassifierState::Normal;
    }

    fn inject(&mut self, events: &[SyntheticEvent]) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.injector.submit(events) {
            warn!("Failed to inject {} event(s): {}", events.len(), e);
        }
    }
}
