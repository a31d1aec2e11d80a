//! Running word and character counts for a streamed response.
//!
//! Word counting is a heuristic: every space character in a fragment counts as
//! one word boundary, and the first fragment carrying visible text opens the
//! first word. A fragment that splits a word or ends on a space can therefore
//! skew the count slightly; displayed counts follow this rule exactly.

/// Counts over everything accumulated so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub word_count: usize,
    pub char_count: usize,
}

impl StreamStats {
    /// Status text shown while the response is streaming.
    pub fn progress_text(&self) -> String {
        format!(
            "Generated {} words, {} characters...",
            self.word_count, self.char_count
        )
    }

    /// Summary text printed once the response is complete.
    pub fn summary_text(&self) -> String {
        format!(
            "Total: {} words, {} characters",
            self.word_count, self.char_count
        )
    }
}

#[derive(Debug, Default)]
pub struct ChunkAggregator {
    boundaries: usize,
    chars: usize,
    seen_text: bool,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the counts and return the updated totals.
    pub fn accumulate(&mut self, fragment: &str) -> StreamStats {
        self.chars += fragment.chars().count();
        self.boundaries += fragment.matches(' ').count();
        if !self.seen_text && fragment.chars().any(|c| !c.is_whitespace()) {
            self.seen_text = true;
        }
        self.stats()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            word_count: self.boundaries + usize::from(self.seen_text),
            char_count: self.chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulate_all(fragments: &[&str]) -> StreamStats {
        let mut aggregator = ChunkAggregator::new();
        let mut stats = aggregator.stats();
        for fragment in fragments {
            stats = aggregator.accumulate(fragment);
        }
        stats
    }

    #[test]
    fn test_empty_stream_counts_nothing() {
        assert_eq!(accumulate_all(&[]), StreamStats::default());
        assert_eq!(accumulate_all(&[""]), StreamStats::default());
    }

    #[test]
    fn test_hi_there_counts() {
        let stats = accumulate_all(&["Hi", " there", "!"]);
        assert_eq!(stats.word_count, 2);
        assert_eq!(stats.char_count, 9);
        assert_eq!(stats.progress_text(), "Generated 2 words, 9 characters...");
    }

    #[test]
    fn test_each_space_is_a_boundary() {
        let stats = accumulate_all(&["one two  three"]);
        // Three spaces, so three boundaries after the opening word.
        assert_eq!(stats.word_count, 4);
    }

    #[test]
    fn test_whitespace_only_opens_no_word() {
        let stats = accumulate_all(&["\n", "\n"]);
        assert_eq!(stats.word_count, 0);
        assert_eq!(stats.char_count, 2);
    }

    #[test]
    fn test_char_count_uses_characters_not_bytes() {
        let stats = accumulate_all(&["héllo", " wörld"]);
        assert_eq!(stats.char_count, 11);
        assert_eq!(stats.word_count, 2);
    }

    #[test]
    fn test_counts_never_decrease() {
        let mut aggregator = ChunkAggregator::new();
        let mut previous = aggregator.stats();
        for fragment in ["", "a", " ", "b c", "\n", "", "d"] {
            let next = aggregator.accumulate(fragment);
            assert!(next.word_count >= previous.word_count);
            assert!(next.char_count >= previous.char_count);
            previous = next;
        }
    }

    #[test]
    fn test_split_fragments_stay_within_boundary_divergence() {
        let cases: &[(&str, &str)] = &[
            ("Hi", " there!"),
            ("Hi ", "there!"),
            ("Hi t", "here!"),
            ("  ", "  "),
            ("", "word"),
            ("one two", " three four "),
            ("\n", "x"),
        ];
        for (first, second) in cases {
            let split = accumulate_all(&[*first, *second]);
            let joined_text = format!("{first}{second}");
            let joined = accumulate_all(&[joined_text.as_str()]);

            assert_eq!(split.char_count, joined.char_count);

            let boundary_spaces = first.chars().rev().take_while(|c| *c == ' ').count()
                + second.chars().take_while(|c| *c == ' ').count();
            let divergence = split.word_count.abs_diff(joined.word_count);
            assert!(
                divergence <= boundary_spaces,
                "{first:?} + {second:?}: diverged by {divergence}, bound {boundary_spaces}"
            );
        }
    }
}
