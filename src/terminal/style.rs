//! Colouring for permanent output and status glyphs.

use crossterm::style::{Attribute, Color, Stylize};

/// Whether ANSI colour is applied to output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputStyle {
    color: bool,
}

impl OutputStyle {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Plain output for captured test buffers.
    #[cfg(test)]
    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn blue(&self, text: &str) -> String {
        self.paint(text, Color::Blue)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(text, Color::Green)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(text, Color::Red)
    }

    pub fn cyan(&self, text: &str) -> String {
        self.paint(text, Color::Cyan)
    }

    pub fn gray(&self, text: &str) -> String {
        self.paint(text, Color::Grey)
    }

    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.attribute(Attribute::Dim).to_string()
        } else {
            text.to_string()
        }
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }
}
