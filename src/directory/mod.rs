//! Directory store: the loaded user snapshot and the view state over it

mod filter;
mod store;

pub use filter::{FilterCondition, FilterError, FilterOp};
pub use store::{DirectoryStore, SortDirection, SortState};
