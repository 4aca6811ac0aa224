//! Scroll service lifecycle: grab thread + dispatcher thread

use crate::dispatcher::Dispatcher;
use crate::handoff;
use crate::hook::{self, HookError};
use crate::injector::UinputInjector;
use crate::settings::SettingsHandle;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{info, warn};

/// Pending events allowed between the grab thread and the dispatcher
const HANDOFF_CAPACITY: usize = 64;

pub struct ScrollService {
    stop: Arc<AtomicBool>,
    hook: Option<thread::JoinHandle<()>>,
    dispatcher: Option<thread::JoinHandle<()>>,
    device_path: PathBuf,
    source_setting: Option<String>,
}

impl ScrollService {
    /// Grab the trackball and start both threads.
    ///
    /// Device selection, the grab and the virtual pointer are all set up
    /// before returning, so failures are reported to the caller.
    pub fn start(settings: SettingsHandle) -> Result<Self> {
        let snapshot = settings.snapshot();
        let source_setting = snapshot.source_device.clone();

        let device_path =
            hook::select_source_device(source_setting.as_deref()).ok_or(HookError::NoDevice)?;
        let device = hook::open_and_grab(&device_path)?;
        let output = Arc::new(Mutex::new(hook::build_virtual_pointer(&device)?));

        let (hook_end, dispatch_end) = handoff::channel(HANDOFF_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let mut dispatcher = Dispatcher::new(settings.clone(), UinputInjector::new(output.clone()));
        let stop_dispatcher = stop.clone();
        let dispatcher_join = thread::Builder::new()
            .name("trackscroll-dispatch".into())
            .spawn(move || dispatcher.run(dispatch_end, &stop_dispatcher))
            .context("Failed to spawn dispatcher thread")?;

        let stop_hook = stop.clone();
        let hook_join = thread::Builder::new()
            .name("trackscroll-hook".into())
            .spawn(move || {
                if let Err(e) = hook::run_hook_loop(stop_hook, device, output, hook_end, settings) {
                    warn!("hook stopped: {e:#}");
                }
            })
            .context("Failed to spawn hook thread")?;

        info!("Scroll service started on {:?}", device_path);
        Ok(Self {
            stop,
            hook: Some(hook_join),
            dispatcher: Some(dispatcher_join),
            device_path,
            source_setting,
        })
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    /// The `source_device` setting this service was started with
    pub fn source_setting(&self) -> Option<&str> {
        self.source_setting.as_deref()
    }

    /// False once stopped or once the grab thread exited on its own
    pub fn is_running(&self) -> bool {
        self.hook.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Release the trackball and join both threads. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The grab thread goes first; dropping its handoff end also wakes
        // the dispatcher.
        if let Some(handle) = self.hook.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
            info!("Scroll service stopped");
        }
    }
}

impl Drop for ScrollService {
    fn drop(&mut self) {
        self.stop();
    }
}
