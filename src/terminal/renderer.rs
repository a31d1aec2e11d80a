//! Interleaves streamed fragments with the live status line.

use super::aggregator::{ChunkAggregator, StreamStats};
use super::status_line::StatusLine;
use super::style::OutputStyle;
use std::io::{self, Write};

/// Writes fragments as permanent output and keeps a status line beneath them.
///
/// Fragment text is append-only. Only the status row below it is rewritten.
pub struct StreamRenderer<'a, W: Write> {
    out: &'a mut W,
    status: StatusLine,
    aggregator: ChunkAggregator,
}

impl<'a, W: Write> StreamRenderer<'a, W> {
    /// Start rendering with a fresh status line showing `initial_status`.
    pub fn start(out: &'a mut W, style: OutputStyle, initial_status: &str) -> io::Result<Self> {
        let status = StatusLine::start(style, &mut *out, initial_status)?;
        Ok(Self {
            out,
            status,
            aggregator: ChunkAggregator::new(),
        })
    }

    /// Render one fragment and refresh the status line with updated counts.
    pub fn on_fragment(&mut self, fragment: &str) -> io::Result<StreamStats> {
        self.status.stop(&mut *self.out)?;

        self.out.write_all(fragment.as_bytes())?;
        if !fragment.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }

        let stats = self.aggregator.accumulate(fragment);
        self.status.set_text(&mut *self.out, &stats.progress_text())?;
        Ok(stats)
    }

    pub fn stats(&self) -> StreamStats {
        self.aggregator.stats()
    }

    #[cfg(test)]
    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn succeed(&mut self, message: &str) -> io::Result<()> {
        self.status.succeed(&mut *self.out, message)
    }

    pub fn fail(&mut self, message: &str) -> io::Result<()> {
        self.status.fail(&mut *self.out, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::screen::Screen;
    use crate::terminal::status_line::StatusLineState;

    fn render(fragments: &[&str]) -> (Vec<u8>, StreamStats) {
        let mut out = Vec::new();
        let stats = {
            let mut renderer =
                StreamRenderer::start(&mut out, OutputStyle::plain(), "Generating response...")
                    .unwrap();
            for fragment in fragments {
                renderer.on_fragment(fragment).unwrap();
            }
            renderer.stats()
        };
        (out, stats)
    }

    #[test]
    fn test_fragments_become_permanent_lines() {
        let (out, stats) = render(&["Hi", " there", "!"]);
        let screen = Screen::replay(&out);
        assert_eq!(screen.permanent(), "Hi\n there\n!\n");
        assert_eq!(screen.current, "⠸ Generated 2 words, 9 characters...");
        assert_eq!(stats.word_count, 2);
        assert_eq!(stats.char_count, 9);
    }

    #[test]
    fn test_permanent_output_is_fragment_concatenation() {
        let cases: &[&[&str]] = &[
            &[],
            &["single"],
            &["line one\n", "line two\n"],
            &["mixed\n", "no newline", "", "tail\n\n"],
            &["ünïcode", " ✨ ", "\n"],
        ];
        for fragments in cases {
            let (out, _) = render(fragments);
            let expected: String = fragments
                .iter()
                .map(|f| {
                    if f.ends_with('\n') {
                        f.to_string()
                    } else {
                        format!("{f}\n")
                    }
                })
                .collect();
            assert_eq!(Screen::replay(&out).permanent(), expected);
        }
    }

    #[test]
    fn test_status_row_tracks_latest_counts() {
        let mut out = Vec::new();
        let mut renderer =
            StreamRenderer::start(&mut out, OutputStyle::plain(), "Generating response...")
                .unwrap();
        let first = renderer.on_fragment("one two").unwrap();
        let second = renderer.on_fragment(" three").unwrap();
        assert_eq!(first.word_count, 2);
        assert_eq!(second.word_count, 3);
        assert_eq!(
            renderer.status().state(),
            &StatusLineState::Active("Generated 3 words, 13 characters...".to_string())
        );
        assert!(renderer.status().is_visible());
    }

    #[test]
    fn test_succeed_leaves_no_live_row() {
        let mut out = Vec::new();
        {
            let mut renderer =
                StreamRenderer::start(&mut out, OutputStyle::plain(), "Generating response...")
                    .unwrap();
            renderer.on_fragment("done").unwrap();
            renderer.succeed("Response completed!").unwrap();
        }
        let screen = Screen::replay(&out);
        assert_eq!(screen.permanent(), "done\n✔ Response completed!\n");
        assert!(screen.current.is_empty());
    }
}
