//! Frame decorations: the title bar and its three buttons.

use anyhow::Result;
use x11rb::protocol::xproto::Window;

use crate::client::ClientId;
use crate::geometry::{TitleBarHit, SPACE};
use crate::types::Rect;
use crate::wm::Wm;
use crate::xconn::XConn;

impl<X: XConn> Wm<X> {
    /// Repaint a client's title bar. Fullscreen clients have none.
    pub(crate) fn redraw_client(&self, id: ClientId) -> Result<()> {
        let Some(client) = self.registry.get(id) else {
            return Ok(());
        };
        if self.registry.is_fullscreen(id) {
            return Ok(());
        }

        let m = &self.metrics;
        let palette = &self.settings.palette;
        let frame = client.frame;
        let width = client.rect.width;
        let bar = m.bar_height - m.border_width;
        let line_y = bar + m.border_width / 2;

        self.conn
            .draw_line(frame, palette.border, (0, line_y), (width, line_y))?;

        let background = if self.registry.focused() == Some(id) {
            palette.active
        } else {
            palette.inactive
        };
        self.conn.fill_rect(
            frame,
            background,
            Rect::new(0, 0, width - m.button_size() * 3, bar),
        )?;
        if let (false, Some(title)) = (client.is_transient(), &client.title) {
            let (ascent, _) = self.conn.font_extents();
            self.conn
                .draw_text(frame, palette.text, background, SPACE, SPACE + ascent, title)?;
        }

        for button in [TitleBarHit::Hide, TitleBarHit::ToggleDepth, TitleBarHit::Close] {
            self.draw_button(frame, width, button, background)?;
        }
        Ok(())
    }

    /// Paint one title-bar button over `background`.
    pub(crate) fn draw_button(
        &self,
        frame: Window,
        width: i32,
        button: TitleBarHit,
        background: u32,
    ) -> Result<()> {
        let m = &self.metrics;
        let size = m.button_size();
        let detail = self.settings.palette.text;
        let half = m.bar_height / 2;

        let slot = match button {
            TitleBarHit::Hide => 3,
            TitleBarHit::ToggleDepth => 2,
            TitleBarHit::Close => 1,
            TitleBarHit::Title => return Ok(()),
        };
        let x = width - size * slot;
        self.conn
            .fill_rect(frame, background, Rect::new(x, 0, size, size))?;

        match button {
            TitleBarHit::Hide => {
                // Eight spokes around the centre
                let o = half - 5;
                let spokes = [
                    ((4, 2), (4, 0)),
                    ((6, 2), (7, 1)),
                    ((6, 4), (8, 4)),
                    ((6, 6), (7, 7)),
                    ((4, 6), (4, 8)),
                    ((2, 6), (1, 7)),
                    ((2, 4), (0, 4)),
                    ((2, 2), (1, 1)),
                ];
                for ((x1, y1), (x2, y2)) in spokes {
                    self.conn.draw_line(
                        frame,
                        detail,
                        (x + o + x1, o + y1),
                        (x + o + x2, o + y2),
                    )?;
                }
            }
            TitleBarHit::ToggleDepth => {
                let o = half - 6;
                self.conn
                    .draw_rect(frame, detail, Rect::new(x + o, o, 7, 7))?;
                self.conn
                    .draw_rect(frame, detail, Rect::new(x + o + 3, o + 3, 7, 7))?;
            }
            TitleBarHit::Close => {
                let o = half - 5;
                let strokes = [
                    ((1, 0), (8, 7)),
                    ((1, 1), (7, 7)),
                    ((0, 1), (7, 8)),
                    ((0, 7), (7, 0)),
                    ((1, 7), (7, 1)),
                    ((1, 8), (8, 1)),
                ];
                for ((x1, y1), (x2, y2)) in strokes {
                    self.conn.draw_line(
                        frame,
                        detail,
                        (x + o + x1, o + y1),
                        (x + o + x2, o + y2),
                    )?;
                }
            }
            TitleBarHit::Title => {}
        }
        Ok(())
    }
}
