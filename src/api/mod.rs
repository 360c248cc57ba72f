//! API module for Microsoft Graph interactions

mod client;
mod directory;
mod users;

pub use client::{GraphClient, GraphResult, GRAPH_BASE_URL};
