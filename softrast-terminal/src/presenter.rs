/// Presentation of finished frames on a truecolor terminal
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use std::io::{self, Write};

use softrast_core::geometry::unpack_argb;
use softrast_core::FrameBuffer;

/// Upper half block: foreground paints the top pixel, background the bottom one
const HALF_BLOCK: char = '\u{2580}';

/// Receives every finished frame
pub trait Presenter {
    fn present(&mut self, frame: &FrameBuffer, status: &str) -> io::Result<()>;
}

/// Frame-buffer size that fills a terminal of `columns` x `rows` cells
pub fn frame_size(columns: u16, rows: u16) -> (usize, usize) {
    (columns.max(1) as usize, 2 * rows.max(1) as usize)
}

fn rgb(color: u32) -> Color {
    let (r, g, b, _) = unpack_argb(color);
    Color::Rgb { r, g, b }
}

/// Draws two frame-buffer rows per terminal row with half-block characters
pub struct TerminalPresenter<W: Write> {
    out: W,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Queue the whole frame followed by the status line; colors are only
    /// re-sent when they change from the previous cell
    pub fn draw(&mut self, frame: &FrameBuffer, status: &str) -> io::Result<()> {
        let (width, height) = (frame.width(), frame.height());
        let pixels = frame.color();
        let out = &mut self.out;

        out.queue(cursor::MoveTo(0, 0))?;
        let mut current: Option<(u32, u32)> = None;
        for row in (0..height).step_by(2) {
            if row > 0 {
                out.queue(cursor::MoveTo(0, (row / 2) as u16))?;
            }
            for x in 0..width {
                let top = pixels[row * width + x];
                let bottom = if row + 1 < height { pixels[(row + 1) * width + x] } else { 0 };
                if current != Some((top, bottom)) {
                    out.queue(SetForegroundColor(rgb(top)))?;
                    out.queue(SetBackgroundColor(rgb(bottom)))?;
                    current = Some((top, bottom));
                }
                out.queue(Print(HALF_BLOCK))?;
            }
        }
        out.queue(ResetColor)?;

        // Status overlay on the first row
        out.queue(cursor::MoveTo(0, 0))?;
        out.queue(SetForegroundColor(Color::Yellow))?;
        out.queue(Print(status))?;
        out.queue(ResetColor)?;
        Ok(())
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, frame: &FrameBuffer, status: &str) -> io::Result<()> {
        self.draw(frame, status)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        assert_eq!(frame_size(80, 24), (80, 48));
        assert_eq!(frame_size(0, 0), (1, 2));
    }

    #[test]
    fn test_draw_emits_one_block_per_cell() {
        let frame = FrameBuffer::new(4, 6);
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.present(&frame, "FPS: 60.0").unwrap();
        let output = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(output.chars().filter(|&c| c == HALF_BLOCK).count(), 4 * 3);
        assert!(output.contains("FPS: 60.0"));
    }

    #[test]
    fn test_colors_are_truecolor() {
        let mut frame = FrameBuffer::new(1, 2);
        {
            let mut band = frame.as_band();
            band.row_mut(0).0[0] = 0xFF10_2030;
            band.row_mut(1).0[0] = 0xFF40_5060;
        }
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.draw(&frame, "").unwrap();
        let output = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(output.contains("38;2;16;32;48"));
        assert!(output.contains("48;2;64;80;96"));
    }
}
