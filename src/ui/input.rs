//! Input handling and key bindings

use crossterm::event::KeyCode;

/// Whether vim-style keybindings are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyBindings {
    /// Arrow keys for navigation (default)
    #[default]
    Arrows,
    /// Vim-style h/j/k/l navigation
    Vim,
}

/// Which surface currently receives key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Table navigation
    #[default]
    Normal,
    /// Live search box
    Search,
    /// Filter drawer list
    Filters,
    /// Add/edit form inside the filter drawer
    FilterEditor,
    /// Column drawer
    Columns,
    /// Blocking message that must be dismissed
    Alert,
}

impl KeyBindings {
    /// Check if this key code moves up
    pub fn is_up(&self, key: KeyCode) -> bool {
        matches!((self, key), (_, KeyCode::Up) | (Self::Vim, KeyCode::Char('k')))
    }

    /// Check if this key code moves down
    pub fn is_down(&self, key: KeyCode) -> bool {
        matches!((self, key), (_, KeyCode::Down) | (Self::Vim, KeyCode::Char('j')))
    }

    /// Check if this key code selects the previous header column
    pub fn is_left(&self, key: KeyCode) -> bool {
        matches!((self, key), (_, KeyCode::Left) | (Self::Vim, KeyCode::Char('h')))
    }

    /// Check if this key code selects the next header column
    pub fn is_right(&self, key: KeyCode) -> bool {
        matches!((self, key), (_, KeyCode::Right) | (Self::Vim, KeyCode::Char('l')))
    }
}
