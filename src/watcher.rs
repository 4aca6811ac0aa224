//! Hot reload of the settings file

use crate::settings::{Settings, SettingsError, SettingsHandle};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Watches the settings file and swaps in new snapshots when it changes.
/// Watching stops when this is dropped.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
}

impl SettingsWatcher {
    /// Watch `path` and keep `handle` in sync with it.
    ///
    /// `on_reload` runs on the watcher thread after a changed file was
    /// swapped in. A file that fails to parse is logged and ignored.
    pub fn start<F>(path: &Path, handle: SettingsHandle, on_reload: F) -> notify::Result<Self>
    where
        F: Fn(Arc<Settings>) + Send + 'static,
    {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        // The directory may not exist before the first save
        fs::create_dir_all(&dir)?;

        let target = path.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Settings watch error: {e}");
                    return;
                }
            };
            if !is_relevant(&event, &target) {
                return;
            }
            match reload_if_changed(&handle, &target) {
                Ok(Some(settings)) => on_reload(settings),
                Ok(None) => debug!("Settings file touched, contents unchanged"),
                Err(e) => warn!("Ignoring settings change: {e}"),
            }
        })?;

        // Watch the directory: editors often replace the file instead of
        // writing it in place.
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching {:?} for settings changes", path);

        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == target.file_name())
}

/// Re-read `path` and swap it in if it differs from the current snapshot
pub fn reload_if_changed(
    handle: &SettingsHandle,
    path: &Path,
) -> Result<Option<Arc<Settings>>, SettingsError> {
    let loaded = Settings::load_from(path)?;
    if *handle.snapshot() == loaded {
        return Ok(None);
    }
    handle.replace(loaded);
    info!("Settings reloaded from {:?}", path);
    Ok(Some(handle.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ButtonAction;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_reload_swaps_changed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let handle = SettingsHandle::new(Settings::default());

        Settings {
            aux2: ButtonAction::Middle,
            ..Settings::default()
        }
        .save_to(&path)
        .unwrap();

        let reloaded = reload_if_changed(&handle, &path).unwrap().unwrap();
        assert_eq!(reloaded.aux2, ButtonAction::Middle);
        assert_eq!(handle.snapshot().aux2, ButtonAction::Middle);

        // Same contents again: nothing to do
        assert!(reload_if_changed(&handle, &path).unwrap().is_none());
    }

    #[test]
    fn test_reload_keeps_snapshot_on_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "scroll_speed = \"fast\"").unwrap();

        let handle = SettingsHandle::new(Settings::default());
        assert!(reload_if_changed(&handle, &path).is_err());
        assert_eq!(*handle.snapshot(), Settings::default());
    }

    #[test]
    fn test_relevant_events() {
        let target = Path::new("/tmp/cfg/settings.toml");
        let modify = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/cfg/settings.toml"));
        let other_file = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/cfg/other.toml"));
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/tmp/cfg/settings.toml"));

        assert!(is_relevant(&modify, target));
        assert!(!is_relevant(&other_file, target));
        assert!(!is_relevant(&access, target));
    }

    /// Depends on the platform delivering file system events in time
    #[test]
    #[ignore]
    fn test_watcher_picks_up_external_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        Settings::default().save_to(&path).unwrap();

        let handle = SettingsHandle::new(Settings::default());
        let (tx, rx) = mpsc::channel();
        let _watcher = SettingsWatcher::start(&path, handle.clone(), move |s| {
            let _ = tx.send(s.scroll_speed);
        })
        .unwrap();

        Settings {
            scroll_speed: 10,
            ..Settings::default()
        }
        .save_to(&path)
        .unwrap();

        let speed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(speed, 10);
        assert_eq!(handle.snapshot().scroll_speed, 10);
    }
}
