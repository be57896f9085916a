//! Remote cursor map.
//!
//! Last write wins in arrival order. Entries live until the user leaves the
//! room or the room is left; nothing expires them by age.

use std::collections::HashMap;

use crate::protocol::TextPosition;

/// A participant's caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    pub user_id: String,
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    pub fn position(&self) -> TextPosition {
        TextPosition::new(self.line, self.column)
    }
}

#[derive(Debug, Default)]
pub struct CursorSync {
    cursors: HashMap<String, CursorPosition>,
}

impl CursorSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `cursor_moved` broadcast.
    pub fn apply(&mut self, user_id: String, position: TextPosition) -> CursorPosition {
        let cursor = CursorPosition {
            user_id: user_id.clone(),
            line: position.line,
            column: position.column,
        };
        self.cursors.insert(user_id, cursor.clone());
        cursor
    }

    pub fn remove(&mut self, user_id: &str) -> Option<CursorPosition> {
        self.cursors.remove(user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<&CursorPosition> {
        self.cursors.get(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CursorPosition> {
        self.cursors.values()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }
}
