//! Turning raw key input into the single characters a session consumes.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Map a terminal key event to a typed character.
///
/// Enter becomes `'\n'` and Tab becomes `'\t'`. Key releases, Ctrl/Alt
/// chords and keys without a printable character yield `None`.
pub fn normalize_key(key: &KeyEvent) -> Option<char> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
    {
        return None;
    }

    match key.code {
        KeyCode::Enter => Some('\n'),
        KeyCode::Tab => Some('\t'),
        KeyCode::Char(c) if !c.is_control() => Some(c),
        _ => None,
    }
}

/// Same contract for DOM-style key names such as `"Enter"` or `"a"`.
/// Any other multi-character name is dropped.
pub fn normalize_key_name(name: &str) -> Option<char> {
    match name {
        "Enter" => Some('\n'),
        "Tab" => Some('\t'),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_control() => Some(c),
                _ => None,
            }
        }
    }
}
