//! In-place status line.
//!
//! A `StatusLine` owns the terminal row the cursor currently sits on. Every
//! render returns the cursor to column zero and clears the row before writing,
//! and the cursor never advances to a new line until the line is finished with
//! `succeed` or `fail`. Writes are flushed immediately, so nothing is left
//! pending between calls.

use super::style::OutputStyle;
use crossterm::{
    queue,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use tracing::warn;

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const SUCCESS_GLYPH: &str = "✔";
const FAILURE_GLYPH: &str = "✖";

/// Lifecycle of a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLineState {
    Idle,
    Active(String),
    Stopped,
    Succeeded(String),
    Failed(String),
}

#[derive(Debug)]
pub struct StatusLine {
    state: StatusLineState,
    /// Whether a render currently occupies the row.
    visible: bool,
    frame: usize,
    style: OutputStyle,
}

impl StatusLine {
    pub fn new(style: OutputStyle) -> Self {
        Self {
            state: StatusLineState::Idle,
            visible: false,
            frame: 0,
            style,
        }
    }

    /// Create a line and render `text` on it right away.
    pub fn start<W: Write>(style: OutputStyle, out: &mut W, text: &str) -> io::Result<Self> {
        let mut line = Self::new(style);
        line.set_text(out, text)?;
        Ok(line)
    }

    #[cfg(test)]
    pub fn state(&self) -> &StatusLineState {
        &self.state
    }

    #[cfg(test)]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            StatusLineState::Succeeded(_) | StatusLineState::Failed(_)
        )
    }

    /// Replace the visible text in place.
    ///
    /// Ignored once the line has succeeded or failed.
    pub fn set_text<W: Write>(&mut self, out: &mut W, text: &str) -> io::Result<()> {
        if self.is_finished() {
            warn!("Ignoring status update after line finished: {}", text);
            return Ok(());
        }

        let glyph = SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()];
        self.frame = self.frame.wrapping_add(1);

        clear_row(out)?;
        write!(out, "{} {}", self.style.cyan(&glyph.to_string()), text)?;
        out.flush()?;

        self.visible = true;
        self.state = StatusLineState::Active(text.to_string());
        Ok(())
    }

    /// Erase the line, leaving the cursor at the start of an empty row.
    ///
    /// Stopping an already stopped line writes nothing.
    pub fn stop<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        self.erase(out)?;
        self.state = StatusLineState::Stopped;
        Ok(())
    }

    /// Replace the line with a permanent success message.
    pub fn succeed<W: Write>(&mut self, out: &mut W, message: &str) -> io::Result<()> {
        let glyph = self.style.green(SUCCESS_GLYPH);
        self.finish(out, &glyph, message, StatusLineState::Succeeded)
    }

    /// Replace the line with a permanent failure message.
    pub fn fail<W: Write>(&mut self, out: &mut W, message: &str) -> io::Result<()> {
        let glyph = self.style.red(FAILURE_GLYPH);
        self.finish(out, &glyph, message, StatusLineState::Failed)
    }

    fn finish<W: Write>(
        &mut self,
        out: &mut W,
        glyph: &str,
        message: &str,
        state: fn(String) -> StatusLineState,
    ) -> io::Result<()> {
        if self.is_finished() {
            warn!("Status line already finished, dropping: {}", message);
            return Ok(());
        }
        self.erase(out)?;
        writeln!(out, "{} {}", glyph, message)?;
        out.flush()?;
        self.state = state(message.to_string());
        Ok(())
    }

    fn erase<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.visible {
            clear_row(out)?;
            out.flush()?;
            self.visible = false;
        }
        Ok(())
    }
}

/// Carriage return plus clear of the whole row.
fn clear_row<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(b"\r")?;
    queue!(out, Clear(ClearType::CurrentLine))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: &str = "\r\x1b[2K";

    fn output(buf: &[u8]) -> String {
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_set_text_rewrites_in_place() {
        let mut out = Vec::new();
        let mut line = StatusLine::new(OutputStyle::plain());
        line.set_text(&mut out, "first").unwrap();
        line.set_text(&mut out, "second").unwrap();

        let text = output(&out);
        assert_eq!(text, format!("{CLEAR}⠋ first{CLEAR}⠙ second"));
        assert!(!text.contains('\n'));
        assert_eq!(line.state(), &StatusLineState::Active("second".to_string()));
        assert!(line.is_visible());
    }

    #[test]
    fn test_stop_clears_row() {
        let mut out = Vec::new();
        let mut line = StatusLine::start(OutputStyle::plain(), &mut out, "working").unwrap();
        out.clear();

        line.stop(&mut out).unwrap();
        assert_eq!(output(&out), CLEAR);
        assert_eq!(line.state(), &StatusLineState::Stopped);
        assert!(!line.is_visible());
    }

    #[test]
    fn test_stop_twice_matches_stop_once() {
        let mut once = Vec::new();
        let mut line = StatusLine::start(OutputStyle::plain(), &mut once, "working").unwrap();
        line.stop(&mut once).unwrap();

        let mut twice = Vec::new();
        let mut other = StatusLine::start(OutputStyle::plain(), &mut twice, "working").unwrap();
        other.stop(&mut twice).unwrap();
        other.stop(&mut twice).unwrap();

        assert_eq!(once, twice);
        assert_eq!(line.state(), other.state());
    }

    #[test]
    fn test_stop_without_render_writes_nothing() {
        let mut out = Vec::new();
        let mut line = StatusLine::new(OutputStyle::plain());
        line.stop(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_succeed_is_permanent() {
        let mut out = Vec::new();
        let mut line = StatusLine::start(OutputStyle::plain(), &mut out, "working").unwrap();
        line.succeed(&mut out, "Response completed!").unwrap();
        let finished = output(&out);
        assert!(finished.ends_with(&format!("{CLEAR}✔ Response completed!\n")));

        line.set_text(&mut out, "late").unwrap();
        line.fail(&mut out, "too late").unwrap();
        line.stop(&mut out).unwrap();
        assert_eq!(output(&out), finished);
        assert_eq!(
            line.state(),
            &StatusLineState::Succeeded("Response completed!".to_string())
        );
    }

    #[test]
    fn test_fail_after_stop_prints_message() {
        let mut out = Vec::new();
        let mut line = StatusLine::start(OutputStyle::plain(), &mut out, "working").unwrap();
        line.stop(&mut out).unwrap();
        out.clear();

        line.fail(&mut out, "Failed to generate response").unwrap();
        assert_eq!(output(&out), "✖ Failed to generate response\n");
        assert!(line.is_finished());
        assert!(!line.is_visible());
    }

    #[test]
    fn test_at_most_one_render_visible() {
        let mut out = Vec::new();
        let mut line = StatusLine::new(OutputStyle::plain());
        for text in ["a", "b", "c"] {
            line.set_text(&mut out, text).unwrap();
            assert!(line.is_visible());
        }
        // Every render is preceded by a clear, so only the last one survives.
        let text = output(&out);
        assert_eq!(text.matches(CLEAR).count(), 3);
        assert!(text.ends_with("⠹ c"));
    }
}
