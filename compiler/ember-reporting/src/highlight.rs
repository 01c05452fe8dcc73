//! ANSI colour highlighting for terminal diagnostics.

use std::{fmt, ops::BitOr};

/// Terminal colours used by diagnostic rendering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Colour {
    Red,
    Yellow,
    Blue,
    Cyan,
}

impl Colour {
    fn code(self) -> &'static str {
        match self {
            Colour::Red => "31",
            Colour::Yellow => "33",
            Colour::Blue => "34",
            Colour::Cyan => "36",
        }
    }
}

/// Text modifiers that can be combined with a [Colour].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Modifier {
    Bold,
    Underline,
}

impl Modifier {
    fn code(self) -> &'static str {
        match self {
            Modifier::Bold => "1",
            Modifier::Underline => "4",
        }
    }
}

/// A colour with an optional modifier, built via `Colour::Red | Modifier::Bold`.
#[derive(Debug, Copy, Clone)]
pub struct Style {
    colour: Colour,
    modifier: Option<Modifier>,
}

impl From<Colour> for Style {
    fn from(colour: Colour) -> Self {
        Style { colour, modifier: None }
    }
}

impl BitOr<Modifier> for Colour {
    type Output = Style;

    fn bitor(self, modifier: Modifier) -> Style {
        Style { colour: self, modifier: Some(modifier) }
    }
}

/// Wrap `message` in the escape codes for `style`.
pub fn highlight(style: impl Into<Style>, message: impl fmt::Display) -> String {
    let style = style.into();
    match style.modifier {
        Some(modifier) => {
            format!("\u{1b}[{}m\u{1b}[{}m{message}\u{1b}[0m", style.colour.code(), modifier.code())
        }
        None => format!("\u{1b}[{}m{message}\u{1b}[0m", style.colour.code()),
    }
}
