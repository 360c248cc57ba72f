//! UI components for the TUI

pub mod components;
mod app;
mod input;

pub use app::{App, AppState};
pub use input::{InputMode, KeyBindings};
