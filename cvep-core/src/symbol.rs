use crate::code::Code;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key centre in pixels relative to the screen centre, y pointing up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One selectable key of the speller.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub index: usize,
    pub label: String,
    pub position: Position,
    pub code: Arc<Code>,
}

impl Symbol {
    /// Text drawn on the key; file-safe names map to their glyphs.
    pub fn display_label(&self) -> &str {
        display_label(&self.label)
    }
}

pub fn display_label(label: &str) -> &str {
    match label {
        "slash" => "/",
        "comma" => ",",
        "colon" => ":",
        "asterisk" => "*",
        "question" => "?",
        "quote" => "\"",
        "smaller" => "<",
        "larger" => ">",
        "bar" => "|",
        "tilde" => "~",
        "backslash" => "\\",
        "backspace" => "<-",
        "clear" => "<<",
        "autocomplete" => ">>",
        "shift" => "sh",
        "speaker" => "sp",
        "space" => "",
        other => other,
    }
}
