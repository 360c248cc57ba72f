//! View models shared by the terminal UI and the HTML export

pub mod detail;
pub mod html;
mod table;

pub use detail::{DetailModel, DetailPanel, fetch_detail};
pub use table::{Cell, TableModel, TableView};
