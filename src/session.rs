//! Session state and the command dispatch table driving it
//!
//! The session owns the auth session, the Graph client, the directory store
//! and the detail panel. User interfaces translate input into [`Command`]s
//! and render from the session; nothing here depends on the terminal.

use crate::api::GraphClient;
use crate::auth::AuthSession;
use crate::directory::{DirectoryStore, FilterCondition, FilterError};
use crate::export::{ExportFormat, export_table};
use crate::models::{User, UserField};
use crate::view::{DetailModel, DetailPanel, TableModel, TableView, fetch_detail};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Everything a user interface can ask the session to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reload,
    Search(String),
    AddFilter(FilterCondition),
    EditFilter(usize, FilterCondition),
    RemoveFilter(usize),
    ClearFilters,
    /// Clear search and filters together
    ResetAll,
    SortBy(UserField),
    ToggleColumn(UserField, bool),
    SetColumns(Vec<UserField>),
    OpenDetail(String),
    CloseDetail,
    Export(ExportFormat),
}

/// What a successful command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Exported(String),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Export failed: {0:#}")]
    Export(#[from] anyhow::Error),
}

/// A finished background load tagged with the request that issued it
#[derive(Debug)]
enum Update {
    /// `None` when no token was available and the snapshot stays as is
    Users { seq: u64, users: Option<Vec<User>> },
    Detail { seq: u64, model: DetailModel },
}

pub struct Session {
    auth: Arc<AuthSession>,
    graph: Arc<GraphClient>,
    store: DirectoryStore,
    detail: Option<DetailPanel>,
    /// Sequence number of the latest detail request
    detail_seq: u64,
    /// Sequence number of the latest user load
    load_seq: u64,
    loading: bool,
    updates_tx: mpsc::UnboundedSender<Update>,
    updates_rx: mpsc::UnboundedReceiver<Update>,
    export_dir: PathBuf,
}

impl Session {
    pub fn new(auth: Arc<AuthSession>, graph: Arc<GraphClient>, store: DirectoryStore) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            auth,
            graph,
            store,
            detail: None,
            detail_seq: 0,
            load_seq: 0,
            loading: false,
            updates_tx,
            updates_rx,
            export_dir: PathBuf::from("."),
        }
    }

    #[cfg(test)]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn store(&self) -> &DirectoryStore {
        &self.store
    }

    pub fn detail(&self) -> Option<&DetailPanel> {
        self.detail.as_ref()
    }

    /// Whether a user load is still running
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Users in the loaded snapshot
    pub fn user_count(&self) -> usize {
        self.store.len()
    }

    /// Current view as a table model
    pub fn table(&self) -> TableModel {
        let rows = self.store.view();
        TableView::render(&rows, self.store.columns(), self.store.sort_state())
    }

    /// Run one command against the session
    pub async fn dispatch(&mut self, command: Command) -> Result<Outcome, CommandError> {
        debug!(?command, "dispatch");
        match command {
            Command::Reload => self.start_reload(),
            Command::Search(query) => self.store.set_search(query),
            Command::AddFilter(condition) => self.store.add_filter(condition)?,
            Command::EditFilter(index, condition) => self.store.edit_filter(index, condition)?,
            Command::RemoveFilter(index) => self.store.remove_filter(index),
            Command::ClearFilters => self.store.clear_filters(),
            Command::ResetAll => self.store.reset(),
            Command::SortBy(field) => self.store.sort_by(field),
            Command::ToggleColumn(field, show) => self.store.toggle_column(field, show),
            Command::SetColumns(fields) => self.store.set_columns(fields),
            Command::OpenDetail(user_id) => self.open_detail(&user_id),
            Command::CloseDetail => self.close_detail(),
            Command::Export(format) => {
                let path = format.file_path(&self.export_dir);
                let detail = match &self.detail {
                    Some(DetailPanel::Ready(model)) => Some(model.as_ref()),
                    _ => None,
                };
                let written = export_table(&self.table(), detail, format, &path)?;
                info!(path = %written, "exported user table");
                return Ok(Outcome::Exported(written));
            }
        }
        Ok(Outcome::Done)
    }

    /// Start fetching every user in the background; `poll_updates` applies it
    ///
    /// Without a token the snapshot is kept; a failed fetch leaves an empty
    /// directory. Sign-in prompts raised while the token is acquired stay
    /// visible because the caller keeps drawing.
    pub fn start_reload(&mut self) {
        self.load_seq += 1;
        self.loading = true;

        let seq = self.load_seq;
        let auth = self.auth.clone();
        let graph = self.graph.clone();
        let tx = self.updates_tx.clone();

        tokio::spawn(async move {
            let users = fetch_users(&auth, &graph).await;
            let _ = tx.send(Update::Users { seq, users });
        });
    }

    /// Show the loading panel and start enrichment in the background
    pub fn open_detail(&mut self, user_id: &str) {
        let Some(user) = self.store.find(user_id).cloned() else {
            warn!(user_id, "open detail for unknown user");
            return;
        };

        self.detail_seq += 1;
        self.detail = Some(DetailPanel::loading(&user));
        self.spawn_detail(self.detail_seq, user);
    }

    fn spawn_detail(&self, seq: u64, user: User) {
        let auth = self.auth.clone();
        let graph = self.graph.clone();
        let tx = self.updates_tx.clone();

        tokio::spawn(async move {
            let token = auth.get_access_token().await;
            let model = fetch_detail(&graph, &user, token.as_deref()).await;
            // The receiver only goes away with the session
            let _ = tx.send(Update::Detail { seq, model });
        });
    }

    pub fn close_detail(&mut self) {
        self.detail_seq += 1;
        self.detail = None;
    }

    /// Apply finished background loads; returns true when anything changed
    ///
    /// Only the latest issued request of each kind is applied.
    pub fn poll_updates(&mut self) -> bool {
        let mut changed = false;
        while let Ok(update) = self.updates_rx.try_recv() {
            changed |= self.apply_update(update);
        }
        changed
    }

    fn apply_update(&mut self, update: Update) -> bool {
        match update {
            Update::Users { seq, .. } if seq != self.load_seq => {
                debug!(seq, latest = self.load_seq, "dropping stale user load");
                false
            }
            Update::Users { users, .. } => {
                self.loading = false;
                if let Some(users) = users {
                    self.store.replace_snapshot(users);
                }
                true
            }
            Update::Detail { seq, .. } if seq != self.detail_seq || self.detail.is_none() => {
                debug!(seq, latest = self.detail_seq, "dropping stale detail");
                false
            }
            Update::Detail { model, .. } => {
                self.detail = Some(DetailPanel::Ready(Box::new(model)));
                true
            }
        }
    }

    #[cfg(test)]
    async fn wait_until(&mut self, done: impl Fn(&Self) -> bool) {
        while !done(self) {
            match self.updates_rx.recv().await {
                Some(update) => {
                    self.apply_update(update);
                }
                None => break,
            }
        }
    }

    /// Wait until the open panel is filled in
    #[cfg(test)]
    pub async fn wait_for_detail(&mut self) {
        self.wait_until(|s| !matches!(s.detail, Some(DetailPanel::Loading { .. })))
            .await;
    }

    /// Wait until the running user load is applied
    #[cfg(test)]
    pub async fn wait_for_users(&mut self) {
        self.wait_until(|s| !s.loading).await;
    }
}

/// Every user, or `None` without a token; a failed fetch yields no users
async fn fetch_users(auth: &AuthSession, graph: &GraphClient) -> Option<Vec<User>> {
    let Some(token) = auth.get_access_token().await else {
        warn!("no access token, skipping user load");
        return None;
    };

    match graph.list_users(&token).await {
        Ok(users) => {
            info!(count = users.len(), "loaded users");
            Some(users)
        }
        Err(e) => {
            error!(error = %e, "failed to load users");
            Some(Vec::new())
        }
    }
}
