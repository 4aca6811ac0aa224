//! System tray icon for trackscroll
//!
//! Every setting is reachable from the tray menu. Menu changes are applied to
//! the shared settings snapshot immediately and saved to disk.

use crate::AppCommand;
use crate::event::AuxButton;
use crate::settings::{ButtonAction, ScrollKeyAction, ScrollSpeed, Settings, SettingsHandle};
use anyhow::Result;
use std::sync::mpsc::Sender;
use tracing::{info, warn};

const BUTTON_ACTIONS: [(ButtonAction, &str); 3] = [
    (ButtonAction::Scroll, "Scroll"),
    (ButtonAction::Middle, "Middle button"),
    (ButtonAction::Default, "Default (back/forward)"),
];

const SCROLL_KEY_ACTIONS: [(ScrollKeyAction, &str); 4] = [
    (ScrollKeyAction::None, "None (hold to scroll)"),
    (ScrollKeyAction::Toggle, "Toggle scrolling"),
    (ScrollKeyAction::EmulateDefault, "Emulate default click"),
    (ScrollKeyAction::EmulateMiddle, "Emulate middle click"),
];

fn button_action_index(action: ButtonAction) -> usize {
    BUTTON_ACTIONS
        .iter()
        .position(|(a, _)| *a == action)
        .unwrap_or(0)
}

fn scroll_key_action_index(action: ScrollKeyAction) -> usize {
    SCROLL_KEY_ACTIONS
        .iter()
        .position(|(a, _)| *a == action)
        .unwrap_or(0)
}

fn speed_index(divisor: u32) -> usize {
    let nearest = ScrollSpeed::nearest(divisor);
    ScrollSpeed::ALL
        .iter()
        .position(|s| *s == nearest)
        .unwrap_or(0)
}

/// Tooltip title reflecting the current state
fn title_for(settings: &Settings) -> String {
    let name = if cfg!(debug_assertions) {
        "trackscroll (Debug)"
    } else {
        "trackscroll"
    };
    if settings.enabled {
        name.to_string()
    } else {
        format!("{name} - disabled")
    }
}

/// System tray icon handler (StatusNotifier)
pub struct TrayIcon {
    handle: ksni::Handle<SettingsTray>,
}

struct SettingsTray {
    settings: SettingsHandle,
    sender: Sender<AppCommand>,
}

impl SettingsTray {
    /// Apply a menu change, save it, and tell the main loop
    fn apply(&mut self, f: impl FnOnce(&mut Settings)) {
        self.settings.update(f);
        if let Err(e) = self.settings.persist() {
            warn!("Failed to save settings: {e}");
        }
        let _ = self.sender.send(AppCommand::SettingsChanged);
    }

    fn button_submenu(&self, button: AuxButton, settings: &Settings) -> ksni::menu::MenuItem<Self> {
        use ksni::menu::{MenuItem, RadioGroup, RadioItem, SubMenu};

        let options = BUTTON_ACTIONS
            .iter()
            .map(|(_, label)| RadioItem {
                label: label.to_string(),
                ..Default::default()
            })
            .collect();

        MenuItem::SubMenu(SubMenu {
            label: format!("{button} button"),
            enabled: settings.enabled,
            submenu: vec![MenuItem::RadioGroup(RadioGroup {
                selected: button_action_index(settings.button_action(button)),
                select: Box::new(move |this: &mut Self, index| {
                    let action = BUTTON_ACTIONS[index.min(BUTTON_ACTIONS.len() - 1)].0;
                    info!("{button} action set to {:?}", action);
                    this.apply(|s| s.set_button_action(button, action));
                }),
                options,
            })],
            ..Default::default()
        })
    }
}

impl ksni::Tray for SettingsTray {
    fn title(&self) -> String {
        title_for(&self.settings.snapshot())
    }

    fn icon_name(&self) -> String {
        if self.settings.snapshot().enabled {
            "input-mouse".to_string()
        } else {
            "input-mouse-symbolic".to_string()
        }
    }

    fn id(&self) -> String {
        "trackscroll".to_string()
    }

    fn menu(&self) -> Vec<ksni::menu::MenuItem<Self>> {
        use ksni::menu::{CheckmarkItem, MenuItem, RadioGroup, RadioItem, StandardItem, SubMenu};

        let settings = self.settings.snapshot();

        vec![
            MenuItem::Checkmark(CheckmarkItem {
                label: "Enabled".to_string(),
                checked: settings.enabled,
                activate: Box::new(|this: &mut Self| this.apply(|s| s.enabled = !s.enabled)),
                ..Default::default()
            }),
            MenuItem::Separator,
            self.button_submenu(AuxButton::X1, &settings),
            self.button_submenu(AuxButton::X2, &settings),
            MenuItem::SubMenu(SubMenu {
                label: "Scroll speed".to_string(),
                enabled: settings.enabled,
                submenu: vec![MenuItem::RadioGroup(RadioGroup {
                    selected: speed_index(settings.scroll_speed),
                    select: Box::new(|this: &mut Self, index| {
                        let speed = ScrollSpeed::ALL[index.min(ScrollSpeed::ALL.len() - 1)];
                        this.apply(|s| s.scroll_speed = speed.divisor());
                    }),
                    options: ScrollSpeed::ALL
                        .iter()
                        .map(|s| RadioItem {
                            label: s.label().to_string(),
                            ..Default::default()
                        })
                        .collect(),
                })],
                ..Default::default()
            }),
            MenuItem::SubMenu(SubMenu {
                label: "Scroll button click".to_string(),
                enabled: settings.enabled,
                submenu: vec![MenuItem::RadioGroup(RadioGroup {
                    selected: scroll_key_action_index(settings.scroll_key_action),
                    select: Box::new(|this: &mut Self, index| {
                        let action = SCROLL_KEY_ACTIONS[index.min(SCROLL_KEY_ACTIONS.len() - 1)].0;
                        this.apply(|s| s.scroll_key_action = action);
                    }),
                    options: SCROLL_KEY_ACTIONS
                        .iter()
                        .map(|(_, label)| RadioItem {
                            label: label.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                })],
                ..Default::default()
            }),
            MenuItem::Checkmark(CheckmarkItem {
                label: "Prefer one axis".to_string(),
                enabled: settings.enabled,
                checked: settings.prefer_axis,
                activate: Box::new(|this: &mut Self| this.apply(|s| s.prefer_axis = !s.prefer_axis)),
                ..Default::default()
            }),
            MenuItem::Checkmark(CheckmarkItem {
                label: "Reverse vertical".to_string(),
                enabled: settings.enabled,
                checked: settings.reverse_vertical,
                activate: Box::new(|this: &mut Self| {
                    this.apply(|s| s.reverse_vertical = !s.reverse_vertical)
                }),
                ..Default::default()
            }),
            MenuItem::Checkmark(CheckmarkItem {
                label: "Reverse horizontal".to_string(),
                enabled: settings.enabled,
                checked: settings.reverse_horizontal,
                activate: Box::new(|this: &mut Self| {
                    this.apply(|s| s.reverse_horizontal = !s.reverse_horizontal)
                }),
                ..Default::default()
            }),
            MenuItem::Separator,
            MenuItem::Standard(StandardItem {
                label: "Quit".to_string(),
                activate: Box::new(|this: &mut Self| {
                    let _ = this.sender.send(AppCommand::Quit);
                }),
                ..Default::default()
            }),
        ]
    }
}

impl TrayIcon {
    /// Create and show the system tray icon
    pub fn new(settings: SettingsHandle, sender: Sender<AppCommand>) -> Result<Self> {
        let tray = SettingsTray { settings, sender };
        let service = ksni::TrayService::new(tray);
        let handle = service.handle();
        service.spawn();

        info!("System tray icon created (StatusNotifier)");

        Ok(Self { handle })
    }

    /// Redraw after settings changed outside the menu
    pub fn refresh(&self) {
        self.handle.update(|_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_indices_match_settings() {
        assert_eq!(button_action_index(ButtonAction::Scroll), 0);
        assert_eq!(button_action_index(ButtonAction::Default), 2);
        assert_eq!(scroll_key_action_index(ScrollKeyAction::EmulateMiddle), 3);
        assert_eq!(speed_index(30), 0);
        assert_eq!(speed_index(20), 1);
        assert_eq!(speed_index(10), 2);
        // Custom values from the file snap to the closest preset
        assert_eq!(speed_index(12), 2);
    }

    #[test]
    fn test_title_shows_disabled_state() {
        let mut settings = Settings::default();
        assert!(!title_for(&settings).contains("disabled"));
        settings.enabled = false;
        assert!(title_for(&settings).ends_with("disabled"));
    }

    #[test]
    fn test_apply_updates_saves_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let (tx, rx) = std::sync::mpsc::channel();
        let mut tray = SettingsTray {
            settings: SettingsHandle::with_path(Settings::default(), &path),
            sender: tx,
        };

        tray.apply(|s| s.prefer_axis = true);

        assert!(tray.settings.snapshot().prefer_axis);
        assert!(Settings::load_from(&path).unwrap().prefer_axis);
        assert!(matches!(rx.try_recv(), Ok(AppCommand::SettingsChanged)));
    }
}
