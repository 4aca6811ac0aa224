//! Application settings management
//!
//! Settings are persisted as TOML in the user's config directory and shared
//! between threads as immutable snapshots. A reader always sees one complete
//! snapshot, never a mix of old and new fields.

use crate::event::AuxButton;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// Accepted verdict deadlines. Zero would let every original event through
/// alongside its synthetic replacement; long waits stall the pointer.
pub const VERDICT_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=100;

/// Errors from loading or saving the settings file
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("Settings I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Role of one side button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Hold (or toggle) to turn trackball motion into wheel ticks
    Scroll,
    /// Acts as the middle mouse button
    Middle,
    /// Left alone, the button keeps its normal back/forward meaning
    #[default]
    Default,
}

/// What releasing the scroll button does when no motion happened in between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollKeyAction {
    /// Hold-to-scroll: releasing just ends scrolling
    #[default]
    None,
    /// Press once to start scrolling, press again to stop
    Toggle,
    /// A click without motion sends the button's normal back/forward action
    EmulateDefault,
    /// A click without motion sends a middle click
    EmulateMiddle,
}

/// How to resolve a move that crosses the threshold on both axes at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DualAxisTicks {
    /// Emit the horizontal tick followed by the vertical tick
    #[default]
    EmitBoth,
    /// Emit only the vertical tick (the horizontal one is computed and dropped)
    LastAxisOnly,
}

/// Scroll speed presets offered in the tray menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSpeed {
    Low,
    Medium,
    High,
}

impl ScrollSpeed {
    pub const ALL: [ScrollSpeed; 3] = [ScrollSpeed::Low, ScrollSpeed::Medium, ScrollSpeed::High];

    /// Motion (in pixels) consumed per wheel notch. Smaller is faster.
    pub fn divisor(self) -> u32 {
        match self {
            ScrollSpeed::Low => 30,
            ScrollSpeed::Medium => 20,
            ScrollSpeed::High => 10,
        }
    }

    /// Closest preset for an arbitrary divisor (custom values from the file)
    pub fn nearest(divisor: u32) -> Self {
        Self::ALL
            .into_iter()
            .min_by_key(|s| s.divisor().abs_diff(divisor))
            .unwrap_or(ScrollSpeed::Low)
    }

    pub fn label(self) -> &'static str {
        match self {
            ScrollSpeed::Low => "Low",
            ScrollSpeed::Medium => "Medium",
            ScrollSpeed::High => "High",
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Whether the trackball is grabbed at all
    pub enabled: bool,

    /// Role of X1 (`BTN_SIDE`)
    pub aux1: ButtonAction,

    /// Role of X2 (`BTN_EXTRA`)
    pub aux2: ButtonAction,

    pub scroll_key_action: ScrollKeyAction,

    /// Pixels of motion per wheel notch (must be >= 1)
    pub scroll_speed: u32,

    /// Only ever scroll along one axis per tick
    pub prefer_axis: bool,

    pub reverse_vertical: bool,

    pub reverse_horizontal: bool,

    pub dual_axis_ticks: DualAxisTicks,

    /// Explicit /dev/input/event* node; auto-detected when unset
    pub source_device: Option<String>,

    /// How long the grab thread waits for a verdict before letting the
    /// original event through
    pub verdict_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            aux1: ButtonAction::Scroll,
            aux2: ButtonAction::Default,
            scroll_key_action: ScrollKeyAction::None,
            scroll_speed: ScrollSpeed::Low.divisor(),
            prefer_axis: false,
            reverse_vertical: false,
            reverse_horizontal: false,
            dual_axis_ticks: DualAxisTicks::EmitBoth,
            source_device: None,
            verdict_timeout_ms: 25,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::NoConfigDir)?
            .join("trackscroll");
        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from the default location (or create defaults)
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!("No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Parse and validate a settings document
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings.validated())
    }

    /// Clamp or replace out-of-range values
    pub fn validated(mut self) -> Self {
        if !VERDICT_TIMEOUT_RANGE_MS.contains(&self.verdict_timeout_ms) {
            let clamped = self
                .verdict_timeout_ms
                .clamp(*VERDICT_TIMEOUT_RANGE_MS.start(), *VERDICT_TIMEOUT_RANGE_MS.end());
            warn!(
                "verdict_timeout_ms = {} is outside {:?}, using {}",
                self.verdict_timeout_ms, VERDICT_TIMEOUT_RANGE_MS, clamped
            );
            self.verdict_timeout_ms = clamped;
        }
        if self.scroll_speed == 0 {
            warn!(
                "scroll_speed must be at least 1, falling back to {}",
                Self::default().scroll_speed
            );
            self.scroll_speed = Self::default().scroll_speed;
        }
        self
    }

    pub fn button_action(&self, button: AuxButton) -> ButtonAction {
        match button {
            AuxButton::X1 => self.aux1,
            AuxButton::X2 => self.aux2,
        }
    }

    pub fn set_button_action(&mut self, button: AuxButton, action: ButtonAction) {
        match button {
            AuxButton::X1 => self.aux1 = action,
            AuxButton::X2 => self.aux2 = action,
        }
    }

    pub fn uses_for_scroll(&self, button: AuxButton) -> bool {
        self.button_action(button) == ButtonAction::Scroll
    }

    pub fn uses_for_middle(&self, button: AuxButton) -> bool {
        self.button_action(button) == ButtonAction::Middle
    }

    /// Divisor as used by the accumulation arithmetic
    pub fn speed_divisor(&self) -> i32 {
        i32::try_from(self.scroll_speed.max(1)).unwrap_or(i32::MAX)
    }
}

/// Shared, atomically swappable settings snapshot
///
/// Cloning the handle shares the same underlying snapshot.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    current: Arc<RwLock<Arc<Settings>>>,
    path: Option<PathBuf>,
}

impl SettingsHandle {
    /// Handle without a backing file; `persist` is a no-op
    pub fn new(settings: Settings) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(settings))),
            path: None,
        }
    }

    /// Handle whose changes are persisted to `path`
    pub fn with_path(settings: Settings, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(settings)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current snapshot. Cheap; holds no lock after returning.
    pub fn snapshot(&self) -> Arc<Settings> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a whole new snapshot
    pub fn replace(&self, settings: Settings) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(settings);
    }

    /// Copy-modify-swap under the write lock, returning the new snapshot
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Arc<Settings> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = Settings::clone(&guard);
        f(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    /// Save the current snapshot to the backing file, if any
    pub fn persist(&self) -> Result<(), SettingsError> {
        match &self.path {
            Some(path) => self.snapshot().save_to(path),
            None => Ok(()),
        }
    }
}
