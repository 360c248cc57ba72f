//! Table view model: header cells and formatted rows for the visible columns

use crate::directory::{SortDirection, SortState};
use crate::models::{User, UserField};

/// A header of the user table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub field: UserField,
    pub label: &'static str,
    pub sort: Option<SortDirection>,
}

impl HeaderCell {
    /// Label with the sort indicator appended when this column is sorted
    pub fn title(&self) -> String {
        match self.sort {
            Some(dir) => format!("{} {}", self.label, dir.indicator()),
            None => self.label.to_string(),
        }
    }
}

/// Field-aware cell formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// Enabled flag, rendered as a two-state badge
    Badge(bool),
    /// The display name, emphasized but otherwise plain text
    Name(String),
    Text(String),
}

impl Cell {
    fn for_field(field: UserField, user: &User) -> Self {
        match field {
            UserField::AccountEnabled => Self::Badge(user.is_enabled()),
            UserField::DisplayName => Self::Name(field.text(user)),
            _ => Self::Text(field.text(user)),
        }
    }

    /// Plain text of the cell
    pub fn text(&self) -> &str {
        match self {
            Self::Badge(true) => "Enabled",
            Self::Badge(false) => "Disabled",
            Self::Name(s) | Self::Text(s) => s,
        }
    }
}

/// One table row, keyed by the record's object id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub user_id: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableModel {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<TableRow>,
}

impl TableModel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct TableView;

impl TableView {
    pub fn render(records: &[&User], columns: &[UserField], sort: SortState) -> TableModel {
        let headers = columns
            .iter()
            .map(|&field| HeaderCell {
                field,
                label: field.label(),
                sort: sort.indicator_for(field),
            })
            .collect();

        let rows = records
            .iter()
            .map(|user| TableRow {
                user_id: user.object_id().to_string(),
                cells: columns.iter().map(|&f| Cell::for_field(f, user)).collect(),
            })
            .collect();

        TableModel { headers, rows }
    }
}
