//! labwm - a small stacking window manager for X11
//!
//! Every client gets a frame with a title bar carrying hide, depth and
//! close buttons. A taskbar across the top of the screen lists the clients
//! and doubles as the launcher menu.

mod atoms;
mod client;
mod config;
mod decor;
mod errors;
mod event;
mod geometry;
mod manage;
mod menu;
mod moveresize;
mod registry;
mod signals;
mod state;
mod taskbar;
#[cfg(test)]
mod testing;
mod tracing;
mod types;
mod window_query;
mod wm;
mod xconn;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use config::Config;
use wm::Wm;
use xconn::X11Conn;

/// labwm - stacking window manager with a taskbar
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// X display to manage (default: $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Config file (default: ~/.config/labwm/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Core X font for titles and menus
    #[arg(long)]
    font: Option<String>,

    /// Border color, #rgb or #rrggbb
    #[arg(long)]
    border: Option<String>,

    /// Title and label text color
    #[arg(long)]
    text: Option<String>,

    /// Focused title bar color
    #[arg(long)]
    active: Option<String>,

    /// Unfocused title bar color
    #[arg(long)]
    inactive: Option<String>,

    /// Menu background color
    #[arg(long)]
    menu: Option<String>,

    /// Highlighted menu item color
    #[arg(long)]
    selected: Option<String>,

    /// Frame and empty taskbar color
    #[arg(long)]
    empty: Option<String>,
}

impl Args {
    /// Overlay the command line onto the file configuration
    fn apply(self, config: &mut Config) {
        if let Some(display) = self.display {
            config.general.display = Some(display);
        }
        if let Some(font) = self.font {
            config.appearance.font = font;
        }
        let colors = &mut config.colors;
        for (flag, slot) in [
            (self.border, &mut colors.border),
            (self.text, &mut colors.text),
            (self.active, &mut colors.active),
            (self.inactive, &mut colors.inactive),
            (self.menu, &mut colors.menu),
            (self.selected, &mut colors.selected),
            (self.empty, &mut colors.empty),
        ] {
            if let Some(value) = flag {
                *slot = value;
            }
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = Args::parse();
    log::info!("Starting labwm");

    let mut config = match args.config.take() {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    args.apply(&mut config);
    let settings = config.resolve();

    let conn = X11Conn::connect(settings.display.as_deref(), &settings.font)?;
    conn.become_wm()?;
    signals::install_handlers()?;

    let mut wm = Wm::new(conn, settings)?;
    wm.grab_keys()?;
    wm.scan_existing_windows()?;
    wm.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_overrides_file() {
        let args = Args::parse_from(["labwm", "--font", "9x15", "--active", "#ff0000", "--display", ":3"]);
        let mut config = Config::default();
        let inactive = config.colors.inactive.clone();
        args.apply(&mut config);

        assert_eq!(config.appearance.font, "9x15");
        assert_eq!(config.colors.active, "#ff0000");
        assert_eq!(config.colors.inactive, inactive);

        let settings = config.resolve();
        assert_eq!(settings.display.as_deref(), Some(":3"));
        assert_eq!(settings.palette.active, 0xff0000);
    }
}
