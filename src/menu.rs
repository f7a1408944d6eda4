//! The launcher menu shown in the taskbar.
//!
//! Items come from a menurc file of `label:command` lines. Each item knows
//! its pixel offset in the bar so a pointer position maps straight to an
//! item.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::geometry::SPACE;

const FALLBACK_LABEL: &str = "xterm";
const FALLBACK_COMMAND: &str = "xterm";

/// System-wide menu, consulted after the per-user files
const SYSTEM_MENURC: &str = "/etc/labwm/menurc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub command: String,
    /// Left edge within the bar
    pub x: i32,
    pub width: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Menu {
    items: Vec<MenuItem>,
}

/// Split one menurc line into label and command.
///
/// Blank lines, `#` comments and lines without a command yield `None`.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (label, command) = line.split_once(':')?;
    let command = command.trim_start().trim_end_matches(['\r', '\n']);
    if label.is_empty() || command.is_empty() {
        return None;
    }
    Some((label.to_string(), command.to_string()))
}

impl Menu {
    /// Build a menu from `(label, command)` pairs, laying items out left to
    /// right with `text_width` measuring labels.
    pub fn from_entries(entries: Vec<(String, String)>, text_width: impl Fn(&str) -> i32) -> Self {
        let mut x = 0;
        let items = entries
            .into_iter()
            .map(|(label, command)| {
                let width = text_width(&label) + SPACE * 4;
                let item = MenuItem { label, command, x, width };
                x += width + 1;
                item
            })
            .collect();
        Self { items }
    }

    /// Load the first menurc found, falling back to a lone xterm item.
    pub fn load(configured: Option<&Path>, text_width: impl Fn(&str) -> i32) -> Self {
        for path in search_paths(configured) {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                let entries: Vec<_> = contents.lines().filter_map(parse_line).collect();
                log::info!("Loaded {} menu items from {:?}", entries.len(), path);
                return Self::from_entries(entries, text_width);
            }
        }
        log::warn!("No menurc found, using a single '{}' item", FALLBACK_LABEL);
        Self::from_entries(
            vec![(FALLBACK_LABEL.to_string(), FALLBACK_COMMAND.to_string())],
            text_width,
        )
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Index of the item under `x`. Edges are inclusive.
    pub fn item_at(&self, x: i32) -> Option<usize> {
        self.items
            .iter()
            .position(|item| x >= item.x && x <= item.x + item.width)
    }

    pub fn get(&self, index: usize) -> Option<&MenuItem> {
        self.items.get(index)
    }
}

fn search_paths(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".windowlab").join("windowlab.menurc"));
    }
    paths.push(PathBuf::from(SYSTEM_MENURC));
    paths
}

/// Run a menu command through the user's shell in a new session.
pub fn spawn(item: &MenuItem) {
    log::info!("Launching '{}': {}", item.label, item.command);
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let mut cmd = Command::new(&shell);
    cmd.arg("-c").arg(&item.command);

    // Detach from labwm's session so launched apps outlive it
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    if let Err(e) = cmd.spawn() {
        log::error!("Failed to spawn '{}': {}", item.command, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width(text: &str) -> i32 {
        6 * text.len() as i32
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("Terminal:xterm -bg black"),
            Some(("Terminal".to_string(), "xterm -bg black".to_string()))
        );
        assert_eq!(
            parse_line("   Web:   firefox\r"),
            Some(("Web".to_string(), "firefox".to_string()))
        );
        assert_eq!(
            parse_line("Clock:xclock -update 1:00"),
            Some(("Clock".to_string(), "xclock -update 1:00".to_string()))
        );
        assert_eq!(parse_line("# Comment:not an item"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("NoCommand:   "), None);
        assert_eq!(parse_line("no separator"), None);
        assert_eq!(parse_line(":orphan"), None);
    }

    #[test]
    fn test_item_layout() {
        let menu = Menu::from_entries(
            vec![
                ("Term".to_string(), "xterm".to_string()),
                ("Editor".to_string(), "xedit".to_string()),
            ],
            width,
        );
        let items = menu.items();
        assert_eq!(items[0].x, 0);
        assert_eq!(items[0].width, 24 + 12);
        assert_eq!(items[1].x, 37);
        assert_eq!(items[1].width, 36 + 12);
    }

    #[test]
    fn test_item_at() {
        let menu = Menu::from_entries(
            vec![
                ("Term".to_string(), "xterm".to_string()),
                ("Editor".to_string(), "xedit".to_string()),
            ],
            width,
        );
        assert_eq!(menu.item_at(0), Some(0));
        assert_eq!(menu.item_at(36), Some(0));
        assert_eq!(menu.item_at(37), Some(1));
        assert_eq!(menu.item_at(85), Some(1));
        assert_eq!(menu.item_at(86), None);
        assert_eq!(menu.item_at(-1), None);
    }

    #[test]
    fn test_load_from_configured_file() {
        let path = std::env::temp_dir().join(format!("labwm-menurc-{}", std::process::id()));
        std::fs::write(&path, "# launchers\nTerm:xterm\n\n  Files: pcmanfm\n").unwrap();

        let menu = Menu::load(Some(&path), width);
        std::fs::remove_file(&path).unwrap();

        let labels: Vec<_> = menu.items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Term", "Files"]);
        assert_eq!(menu.get(1).unwrap().command, "pcmanfm");
    }
}
