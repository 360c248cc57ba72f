//! In-memory user directory with search, filter, sort and column state

use super::filter::{FilterCondition, FilterError};
use crate::models::{User, UserField};
use std::sync::Arc;

/// Direction of the active sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }
}

/// At most one active sort field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub field: Option<UserField>,
    pub direction: SortDirection,
}

impl SortState {
    /// Same field flips direction, another field starts ascending
    pub fn toggle(&mut self, field: UserField) {
        if self.field == Some(field) {
            self.direction = self.direction.toggled();
        } else {
            self.field = Some(field);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn indicator_for(&self, field: UserField) -> Option<SortDirection> {
        (self.field == Some(field)).then_some(self.direction)
    }
}

/// Owner of the directory snapshot and every piece of view state
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    snapshot: Arc<[User]>,
    columns: Vec<UserField>,
    filters: Vec<FilterCondition>,
    search_query: String,
    sort: SortState,
}

impl Default for DirectoryStore {
    fn default() -> Self {
        Self::new(UserField::BASE.to_vec())
    }
}

impl DirectoryStore {
    pub fn new(columns: Vec<UserField>) -> Self {
        let mut store = Self {
            snapshot: Arc::from(Vec::new()),
            columns: Vec::new(),
            filters: Vec::new(),
            search_query: String::new(),
            sort: SortState::default(),
        };
        store.set_columns(columns);
        store
    }

    /// Swap in a freshly fetched directory as a whole
    pub fn replace_snapshot(&mut self, users: Vec<User>) {
        self.snapshot = Arc::from(users);
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn find(&self, user_id: &str) -> Option<&User> {
        self.snapshot.iter().find(|u| u.object_id() == user_id)
    }

    // Columns

    pub fn columns(&self) -> &[UserField] {
        &self.columns
    }

    /// Replace the visible columns, dropping duplicates
    pub fn set_columns(&mut self, fields: Vec<UserField>) {
        self.columns.clear();
        for field in fields {
            if !self.columns.contains(&field) {
                self.columns.push(field);
            }
        }
    }

    /// Show appends the field at the end; hide removes it
    pub fn toggle_column(&mut self, field: UserField, show: bool) {
        if show {
            if !self.columns.contains(&field) {
                self.columns.push(field);
            }
        } else {
            self.columns.retain(|f| *f != field);
        }
    }

    // Search

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Records whose six searchable fields contain `query`, case-insensitively
    pub fn search<'a>(records: &'a [User], query: &str) -> Vec<&'a User> {
        let query = query.trim().to_lowercase();
        records
            .iter()
            .filter(|u| query.is_empty() || u.search_text().to_lowercase().contains(&query))
            .collect()
    }

    // Filters

    pub fn filters(&self) -> &[FilterCondition] {
        &self.filters
    }

    pub fn add_filter(&mut self, condition: FilterCondition) -> Result<(), FilterError> {
        validate(&condition)?;
        self.filters.push(condition);
        Ok(())
    }

    /// Out-of-range indices are ignored
    pub fn edit_filter(
        &mut self,
        index: usize,
        condition: FilterCondition,
    ) -> Result<(), FilterError> {
        validate(&condition)?;
        if let Some(slot) = self.filters.get_mut(index) {
            *slot = condition;
        }
        Ok(())
    }

    /// Out-of-range indices are ignored
    pub fn remove_filter(&mut self, index: usize) {
        if index < self.filters.len() {
            self.filters.remove(index);
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Records satisfying every condition, in input order
    pub fn apply_filters<'a>(
        records: &[&'a User],
        conditions: &[FilterCondition],
    ) -> Vec<&'a User> {
        records
            .iter()
            .copied()
            .filter(|u| conditions.iter().all(|c| c.matches(u)))
            .collect()
    }

    /// Clear the search box and all filters
    pub fn reset(&mut self) {
        self.search_query.clear();
        self.filters.clear();
    }

    // Sorting

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn sort_by(&mut self, field: UserField) {
        self.sort.toggle(field);
    }

    /// Case-insensitive ordering of the field's string form
    pub fn sort_records(records: &mut [&User], sort: SortState) {
        let Some(field) = sort.field else {
            return;
        };
        records.sort_by(|a, b| {
            let x = field.text(a).to_lowercase();
            let y = field.text(b).to_lowercase();
            let ord = x.cmp(&y);
            match sort.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    /// Current view: searched, filtered, then sorted
    pub fn view(&self) -> Vec<&User> {
        let searched = Self::search(&self.snapshot, &self.search_query);
        let mut rows = Self::apply_filters(&searched, &self.filters);
        Self::sort_records(&mut rows, self.sort);
        rows
    }
}

fn validate(condition: &FilterCondition) -> Result<(), FilterError> {
    if condition.op.needs_value() && condition.value.trim().is_empty() {
        Err(FilterError::MissingValue)
    } else {
        Ok(())
    }
}
