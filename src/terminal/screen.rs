//! Replays captured terminal bytes into committed lines and the live row.

const CLEAR_ROW: &str = "\r\x1b[2K";

#[derive(Debug, Default)]
pub struct Screen {
    /// Rows that ended with a newline and can no longer be rewritten.
    pub lines: Vec<String>,
    /// Whatever sits on the cursor row right now.
    pub current: String,
}

impl Screen {
    pub fn replay(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut screen = Self::default();
        let mut rest: &str = &text;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix(CLEAR_ROW) {
                screen.current.clear();
                rest = after;
                continue;
            }
            let mut chars = rest.chars();
            match chars.next() {
                Some('\n') => screen.lines.push(std::mem::take(&mut screen.current)),
                Some(c) => screen.current.push(c),
                None => break,
            }
            rest = chars.as_str();
        }
        screen
    }

    /// Committed output joined back together, one newline per row.
    pub fn permanent(&self) -> String {
        self.lines.iter().map(|line| format!("{line}\n")).collect()
    }
}
