//! Configuration file support for labwm.
//!
//! Loads settings from ~/.config/labwm/config.toml if it exists,
//! otherwise uses the classic WindowLab defaults.
//!
//! Also provides `Settings` - the runtime configuration struct with
//! resolved color values, keysyms and decoration sizes.

use serde::Deserialize;
use std::path::PathBuf;

// =============================================================================
// Runtime Configuration (resolved values)
// =============================================================================

/// Amount each channel of the active color is darkened by for a pressed button
const ACTIVE_SHADOW: u32 = 0x20;

/// Resolved colors, as pixel values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub border: u32,
    pub text: u32,
    /// Focused title bar and taskbar button
    pub active: u32,
    /// Title-bar button while pressed
    pub depressed: u32,
    pub inactive: u32,
    /// Menu background
    pub menu: u32,
    /// Highlighted menu item
    pub selected: u32,
    /// Frame and taskbar background
    pub empty: u32,
}

/// Global shortcuts: one modifier, four keysyms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub modifier: u16,
    pub cycle_prev: u32,
    pub cycle_next: u32,
    pub fullscreen: u32,
    pub toggle_z: u32,
}

impl KeyBindings {
    pub fn keysyms(&self) -> [u32; 4] {
        [self.cycle_prev, self.cycle_next, self.fullscreen, self.toggle_z]
    }
}

/// Runtime configuration with resolved values.
#[derive(Debug, Clone)]
pub struct Settings {
    pub display: Option<String>,
    pub font: String,
    pub border_width: i32,
    /// Overrides the bar height derived from the font
    pub bar_height: Option<i32>,
    pub double_click_ms: u32,
    pub menu_file: Option<PathBuf>,
    pub palette: Palette,
    pub keys: KeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().resolve()
    }
}

// =============================================================================
// File-based Configuration (TOML parsing)
// =============================================================================

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub appearance: AppearanceConfig,
    pub colors: ColorConfig,
    pub keybindings: KeybindingConfig,
}

/// General settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// X display to connect to instead of $DISPLAY
    pub display: Option<String>,
    /// Two title-bar clicks closer than this toggle stacking
    pub double_click_ms: u32,
    /// Menu definition file, searched before the standard locations
    pub menu_file: Option<String>,
}

/// Appearance settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Core X font name
    pub font: String,
    pub border_width: u32,
    pub bar_height: Option<u32>,
}

/// Color settings (hex strings like "#fd0" or "#ffdd00")
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub border: String,
    pub text: String,
    pub active: String,
    pub inactive: String,
    pub menu: String,
    pub selected: String,
    pub empty: String,
}

/// Keybinding configuration: the modifier plus a key name per action
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeybindingConfig {
    pub modifier: String,
    pub cycle_prev: String,
    pub cycle_next: String,
    pub fullscreen: String,
    pub toggle_z: String,
}

impl Config {
    /// Load config from default path (~/.config/labwm/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("labwm")
            .join("config.toml")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Resolve into runtime settings. Unparseable values fall back to the
    /// defaults with a warning.
    pub fn resolve(&self) -> Settings {
        let defaults = ColorConfig::default();
        let color = |value: &str, fallback: &str| {
            parse_color(value).unwrap_or_else(|| {
                log::warn!("Invalid color '{}', using {}", value, fallback);
                parse_color(fallback).unwrap_or(0)
            })
        };
        let c = &self.colors;
        let active = color(&c.active, &defaults.active);
        let palette = Palette {
            border: color(&c.border, &defaults.border),
            text: color(&c.text, &defaults.text),
            active,
            depressed: darken(active, ACTIVE_SHADOW),
            inactive: color(&c.inactive, &defaults.inactive),
            menu: color(&c.menu, &defaults.menu),
            selected: color(&c.selected, &defaults.selected),
            empty: color(&c.empty, &defaults.empty),
        };

        let kb = &self.keybindings;
        let key_defaults = KeybindingConfig::default();
        let key = |name: &str, fallback: &str| {
            key_to_keysym(name)
                .or_else(|| key_to_keysym(fallback))
                .unwrap_or(0)
        };
        let keys = KeyBindings {
            modifier: parse_modifier(&kb.modifier).unwrap_or_else(|| {
                log::warn!("Unknown modifier '{}', using Mod1", kb.modifier);
                MOD1_MASK
            }),
            cycle_prev: key(&kb.cycle_prev, &key_defaults.cycle_prev),
            cycle_next: key(&kb.cycle_next, &key_defaults.cycle_next),
            fullscreen: key(&kb.fullscreen, &key_defaults.fullscreen),
            toggle_z: key(&kb.toggle_z, &key_defaults.toggle_z),
        };

        Settings {
            display: self.general.display.clone(),
            font: self.appearance.font.clone(),
            border_width: self.appearance.border_width as i32,
            bar_height: self.appearance.bar_height.map(|h| h as i32),
            double_click_ms: self.general.double_click_ms,
            menu_file: self
                .general
                .menu_file
                .as_deref()
                .map(|path| PathBuf::from(shellexpand::tilde(path).into_owned())),
            palette,
            keys,
        }
    }
}

// X11 modifier masks
const SHIFT_MASK: u16 = 1;
const CONTROL_MASK: u16 = 4;
const MOD1_MASK: u16 = 8; // Alt
const MOD4_MASK: u16 = 64; // Super/Win

/// Parse a modifier name. "None" means no modifier is needed.
pub fn parse_modifier(s: &str) -> Option<u16> {
    match s.to_lowercase().as_str() {
        "none" | "" => Some(0),
        "mod1" | "alt" => Some(MOD1_MASK),
        "mod4" | "super" | "win" => Some(MOD4_MASK),
        "shift" => Some(SHIFT_MASK),
        "control" | "ctrl" => Some(CONTROL_MASK),
        _ => None,
    }
}

/// Convert key name to X11 keysym
fn key_to_keysym(key: &str) -> Option<u32> {
    let lower = key.to_lowercase();
    match lower.as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "page_up" | "pageup" | "prior" => Some(0xff55),
        "page_down" | "pagedown" | "next" => Some(0xff56),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        // Letters and digits share their ASCII code
        s if s.len() == 1 && s.as_bytes()[0].is_ascii_alphanumeric() => {
            Some(s.as_bytes()[0] as u32)
        }
        // Function keys F1-F12
        s if s.starts_with('f') => match s[1..].parse::<u32>() {
            Ok(n @ 1..=12) => Some(0xffbe + n - 1),
            _ => {
                log::warn!("Unknown key: {}", key);
                None
            }
        },
        _ => {
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}

/// Parse hex color string ("#rgb", "#rrggbb", with or without '#') to u32
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim_start_matches('#');
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match s.len() {
        6 => u32::from_str_radix(s, 16).ok(),
        3 => {
            let short = u32::from_str_radix(s, 16).ok()?;
            let (r, g, b) = ((short >> 8) & 0xf, (short >> 4) & 0xf, short & 0xf);
            Some((r * 0x11) << 16 | (g * 0x11) << 8 | b * 0x11)
        }
        _ => None,
    }
}

/// Darken every channel by `amount`; a channel that would underflow becomes 0.
fn darken(color: u32, amount: u32) -> u32 {
    let channel = |shift: u32| ((color >> shift) & 0xff).saturating_sub(amount) << shift;
    channel(16) | channel(8) | channel(0)
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            display: None,
            double_click_ms: 400,
            menu_file: None,
        }
    }
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            font: "-b&h-lucida-medium-r-*-*-10-*-*-*-*-*-*-*".to_string(),
            border_width: 2,
            bar_height: None,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            border: "#000".to_string(),
            text: "#000".to_string(),
            active: "#fd0".to_string(),
            inactive: "#aaa".to_string(),
            menu: "#ddd".to_string(),
            selected: "#aad".to_string(),
            empty: "#000".to_string(),
        }
    }
}

impl Default for KeybindingConfig {
    fn default() -> Self {
        Self {
            modifier: "Mod1".to_string(),
            cycle_prev: "Tab".to_string(),
            cycle_next: "q".to_string(),
            fullscreen: "F11".to_string(),
            toggle_z: "F12".to_string(),
        }
    }
}
