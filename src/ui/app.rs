//! Application state and main TUI logic

use super::components;
use super::input::{InputMode, KeyBindings};
use crate::directory::{FilterCondition, FilterError, FilterOp};
use crate::export::ExportFormat;
use crate::models::UserField;
use crate::session::{Command, CommandError, Outcome, Session};
use tokio::sync::watch;
use tracing::warn;

/// Application state for the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

/// Part of the filter form that receives edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorPart {
    #[default]
    Field,
    Op,
    Value,
}

impl EditorPart {
    fn next(self) -> Self {
        match self {
            Self::Field => Self::Op,
            Self::Op => Self::Value,
            Self::Value => Self::Field,
        }
    }
}

/// Add/edit form for a single filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEditor {
    /// Filter being edited, `None` when adding
    pub index: Option<usize>,
    pub field: UserField,
    pub op: FilterOp,
    pub value: String,
    pub part: EditorPart,
}

impl FilterEditor {
    fn new() -> Self {
        Self {
            index: None,
            field: UserField::DisplayName,
            op: FilterOp::default(),
            value: String::new(),
            part: EditorPart::Field,
        }
    }

    fn edit(index: usize, condition: &FilterCondition) -> Self {
        Self {
            index: Some(index),
            field: condition.field,
            op: condition.op,
            value: condition.value.clone(),
            part: EditorPart::Value,
        }
    }

    pub fn next_part(&mut self) {
        self.part = self.part.next();
    }

    /// Cycle the field or operator under the cursor
    pub fn cycle(&mut self, forward: bool) {
        match (self.part, forward) {
            (EditorPart::Field, true) => self.field = self.field.next(),
            (EditorPart::Field, false) => self.field = self.field.prev(),
            (EditorPart::Op, true) => self.op = self.op.next(),
            (EditorPart::Op, false) => self.op = self.op.prev(),
            (EditorPart::Value, _) => {}
        }
    }

    pub fn push(&mut self, c: char) {
        if self.part == EditorPart::Value {
            self.value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.part == EditorPart::Value {
            self.value.pop();
        }
    }

    fn command(&self) -> Result<Command, FilterError> {
        let condition = FilterCondition::new(self.field, self.op, &self.value)?;
        Ok(match self.index {
            Some(i) => Command::EditFilter(i, condition),
            None => Command::AddFilter(condition),
        })
    }
}

/// Main application struct
pub struct App {
    /// Headless session: directory, auth, detail panel
    pub session: Session,

    /// Current application state
    pub state: AppState,

    /// Key binding style
    pub key_bindings: KeyBindings,

    /// Input mode
    pub input_mode: InputMode,

    /// Text in the search box
    pub search_input: String,

    // Table state
    pub row_index: usize,
    pub header_index: usize,

    /// First visible line of the detail drawer
    pub detail_scroll: u16,

    // Drawer state
    pub filter_index: usize,
    pub column_index: usize,
    pub editor: Option<FilterEditor>,

    /// Blocking message shown until dismissed
    pub alert: Option<String>,

    // Feedback message
    pub message: Option<String>,

    /// Sign-in instructions published by the identity provider
    prompt: watch::Receiver<Option<String>>,

    /// Should quit
    pub should_quit: bool,
}

impl App {
    pub fn new(
        session: Session,
        key_bindings: KeyBindings,
        prompt: watch::Receiver<Option<String>>,
    ) -> Self {
        Self {
            session,
            state: AppState::Loading,
            key_bindings,
            input_mode: InputMode::Normal,
            search_input: String::new(),
            row_index: 0,
            header_index: 0,
            detail_scroll: 0,
            filter_index: 0,
            column_index: 0,
            editor: None,
            alert: None,
            message: None,
            prompt,
            should_quit: false,
        }
    }

    /// Run a command, turning failures into alerts or status messages
    pub async fn run(&mut self, command: Command) {
        match self.session.dispatch(command).await {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Exported(path)) => self.message = Some(format!("Exported to {}", path)),
            Err(CommandError::Filter(e)) => self.show_alert(e.to_string()),
            Err(e) => {
                warn!(error = %e, "command failed");
                self.message = Some(e.to_string());
            }
        }
        self.clamp_selection();
    }

    /// Start fetching all users; `tick` switches to ready when they arrive
    pub async fn reload(&mut self) {
        self.state = AppState::Loading;
        self.run(Command::Reload).await;
    }

    fn finish_load(&mut self) {
        self.state = AppState::Ready;
        self.clamp_selection();
        self.message = Some(if self.session.store().is_empty() {
            "No users found".to_string()
        } else {
            format!("Loaded {} users", self.session.user_count())
        });
    }

    /// Per-frame housekeeping: background results and sign-in prompts
    pub fn tick(&mut self) {
        self.session.poll_updates();
        if self.state == AppState::Loading && !self.session.is_loading() {
            self.finish_load();
        }

        if self.prompt.has_changed().unwrap_or(false) {
            let prompt = self.prompt.borrow_and_update().clone();
            if let Some(text) = prompt {
                self.show_alert(text);
            }
        }
    }

    pub fn show_alert(&mut self, text: String) {
        self.alert = Some(text);
        self.input_mode = InputMode::Alert;
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
        self.input_mode = if self.editor.is_some() {
            InputMode::FilterEditor
        } else {
            InputMode::Normal
        };
    }

    // Table

    fn visible_rows(&self) -> usize {
        self.session.store().view().len()
    }

    fn clamp_selection(&mut self) {
        let rows = self.visible_rows();
        if self.row_index >= rows {
            self.row_index = rows.saturating_sub(1);
        }
        let columns = self.session.store().columns().len();
        if self.header_index >= columns {
            self.header_index = columns.saturating_sub(1);
        }
        let filters = self.session.store().filters().len();
        if self.filter_index >= filters {
            self.filter_index = filters.saturating_sub(1);
        }
    }

    pub fn navigate_up(&mut self) {
        match self.input_mode {
            InputMode::Filters => self.filter_index = self.filter_index.saturating_sub(1),
            InputMode::Columns => self.column_index = self.column_index.saturating_sub(1),
            _ => self.row_index = self.row_index.saturating_sub(1),
        }
    }

    pub fn navigate_down(&mut self) {
        match self.input_mode {
            InputMode::Filters => {
                if self.filter_index + 1 < self.session.store().filters().len() {
                    self.filter_index += 1;
                }
            }
            InputMode::Columns => {
                if self.column_index + 1 < UserField::ALL.len() {
                    self.column_index += 1;
                }
            }
            _ => {
                if self.row_index + 1 < self.visible_rows() {
                    self.row_index += 1;
                }
            }
        }
    }

    pub fn prev_header(&mut self) {
        self.header_index = self.header_index.saturating_sub(1);
    }

    pub fn next_header(&mut self) {
        if self.header_index + 1 < self.session.store().columns().len() {
            self.header_index += 1;
        }
    }

    pub fn selected_header(&self) -> Option<UserField> {
        self.session.store().columns().get(self.header_index).copied()
    }

    pub fn selected_user_id(&self) -> Option<String> {
        self.session
            .store()
            .view()
            .get(self.row_index)
            .map(|u| u.object_id().to_string())
    }

    pub async fn sort_selected(&mut self) {
        if let Some(field) = self.selected_header() {
            self.run(Command::SortBy(field)).await;
        }
    }

    pub async fn open_selected(&mut self) {
        if let Some(user_id) = self.selected_user_id() {
            self.detail_scroll = 0;
            self.run(Command::OpenDetail(user_id)).await;
        }
    }

    pub async fn close_detail(&mut self) {
        if self.session.detail().is_some() {
            self.detail_scroll = 0;
            self.run(Command::CloseDetail).await;
        }
    }

    /// Scroll the detail drawer, keeping the last line reachable
    pub fn scroll_detail(&mut self, lines: i32) {
        let Some(panel) = self.session.detail() else {
            return;
        };
        let max = components::detail_line_count(panel).saturating_sub(1);
        let next = (i32::from(self.detail_scroll) + lines).clamp(0, i32::from(max));
        self.detail_scroll = u16::try_from(next).unwrap_or(0);
    }

    pub async fn reset_all(&mut self) {
        self.search_input.clear();
        self.run(Command::ResetAll).await;
        self.message = Some("Search and filters cleared".to_string());
    }

    pub async fn export(&mut self, format: ExportFormat) {
        self.run(Command::Export(format)).await;
    }

    // Search

    pub fn start_search(&mut self) {
        self.search_input = self.session.store().search_query().to_string();
        self.input_mode = InputMode::Search;
    }

    pub async fn search_push(&mut self, c: char) {
        self.search_input.push(c);
        self.run(Command::Search(self.search_input.clone())).await;
    }

    pub async fn search_backspace(&mut self) {
        self.search_input.pop();
        self.run(Command::Search(self.search_input.clone())).await;
    }

    /// Esc in the search box clears the query
    pub async fn cancel_search(&mut self) {
        self.search_input.clear();
        self.input_mode = InputMode::Normal;
        self.run(Command::Search(String::new())).await;
    }

    // Filter drawer

    pub fn open_filters(&mut self) {
        self.input_mode = InputMode::Filters;
        self.clamp_selection();
    }

    pub fn start_add_filter(&mut self) {
        self.editor = Some(FilterEditor::new());
        self.input_mode = InputMode::FilterEditor;
    }

    pub fn start_edit_filter(&mut self) {
        if let Some(condition) = self.session.store().filters().get(self.filter_index) {
            self.editor = Some(FilterEditor::edit(self.filter_index, condition));
            self.input_mode = InputMode::FilterEditor;
        }
    }

    pub async fn remove_selected_filter(&mut self) {
        self.run(Command::RemoveFilter(self.filter_index)).await;
    }

    /// Save the form; a blank value keeps the form open behind an alert
    pub async fn save_editor(&mut self) {
        let Some(editor) = &self.editor else {
            return;
        };
        match editor.command() {
            Ok(command) => {
                self.editor = None;
                self.input_mode = InputMode::Filters;
                self.run(command).await;
            }
            Err(e) => self.show_alert(e.to_string()),
        }
    }

    pub fn cancel_editor(&mut self) {
        self.editor = None;
        self.input_mode = InputMode::Filters;
    }

    // Column drawer

    pub fn open_columns(&mut self) {
        self.input_mode = InputMode::Columns;
    }

    pub async fn toggle_selected_column(&mut self) {
        let Some(&field) = UserField::ALL.get(self.column_index) else {
            return;
        };
        let show = !self.session.store().columns().contains(&field);
        self.run(Command::ToggleColumn(field, show)).await;
    }

    pub fn close_drawer(&mut self) {
        self.editor = None;
        self.input_mode = InputMode::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GraphClient;
    use crate::auth::AuthSession;
    use crate::auth::testing::{ScriptedProvider, account, grant};
    use crate::directory::DirectoryStore;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_users(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "a", "displayName": "Alice A", "accountEnabled": true},
                    {"id": "b", "displayName": "Bob B", "accountEnabled": false}
                ]
            })))
            .mount(server)
            .await;
    }

    async fn app_with(
        server: &MockServer,
        provider: ScriptedProvider,
        prompt: watch::Receiver<Option<String>>,
    ) -> App {
        let auth = Arc::new(AuthSession::new(Arc::new(provider), vec![]));
        auth.ensure_signed_in().await;
        let graph = Arc::new(GraphClient::new(server.uri(), 999).unwrap());
        let session = Session::new(auth, graph, DirectoryStore::default());
        App::new(session, KeyBindings::Arrows, prompt)
    }

    async fn app(server: &MockServer) -> (App, watch::Sender<Option<String>>) {
        mount_users(server).await;
        let provider = ScriptedProvider {
            accounts: vec![account()],
            silent: Some(grant("tok", Duration::hours(1))),
            ..Default::default()
        };
        let (tx, rx) = watch::channel(None);
        let mut app = app_with(server, provider, rx).await;
        app.reload().await;
        app.session.wait_for_users().await;
        app.tick();
        (app, tx)
    }

    #[tokio::test]
    async fn test_reload_finishes_on_tick() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;
        assert_eq!(app.state, AppState::Ready);
        assert_eq!(app.message.as_deref(), Some("Loaded 2 users"));

        app.reload().await;
        assert_eq!(app.state, AppState::Loading);
        app.session.wait_for_users().await;
        app.tick();
        assert_eq!(app.state, AppState::Ready);
    }

    #[tokio::test]
    async fn test_sign_in_prompt_shows_while_users_load() {
        let server = MockServer::start().await;
        mount_users(&server).await;
        let (tx, rx) = watch::channel(None);
        let provider = ScriptedProvider {
            accounts: vec![account()],
            interactive: Some(grant("tok", Duration::hours(1))),
            interactive_prompt: Some((tx, StdDuration::from_secs(3))),
            ..Default::default()
        };
        let mut app = app_with(&server, provider, rx).await;

        app.reload().await;
        let shown = tokio::time::timeout(StdDuration::from_secs(1), async {
            while app.alert.is_none() {
                app.tick();
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        })
        .await;

        assert!(shown.is_ok());
        assert_eq!(app.state, AppState::Loading);
        assert!(app.alert.as_deref().unwrap().contains("devicelogin"));
    }

    #[tokio::test]
    async fn test_detail_scroll_is_bounded() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;

        app.scroll_detail(10);
        assert_eq!(app.detail_scroll, 0);

        app.open_selected().await;
        app.session.wait_for_detail().await;
        app.scroll_detail(10);
        assert_eq!(app.detail_scroll, 10);
        app.scroll_detail(1000);
        let last = components::detail_line_count(app.session.detail().unwrap()) - 1;
        assert_eq!(app.detail_scroll, last);
        app.scroll_detail(-1000);
        assert_eq!(app.detail_scroll, 0);

        app.scroll_detail(5);
        app.close_detail().await;
        assert_eq!(app.detail_scroll, 0);
    }

    #[tokio::test]
    async fn test_live_search_clamps_selection() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;
        assert_eq!(app.state, AppState::Ready);

        app.navigate_down();
        assert_eq!(app.selected_user_id().as_deref(), Some("b"));

        app.start_search();
        for c in "ali".chars() {
            app.search_push(c).await;
        }
        assert_eq!(app.row_index, 0);
        assert_eq!(app.selected_user_id().as_deref(), Some("a"));

        app.cancel_search().await;
        assert_eq!(app.session.store().view().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_filter_raises_alert_and_keeps_form() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;

        app.open_filters();
        app.start_add_filter();
        app.save_editor().await;
        assert_eq!(app.input_mode, InputMode::Alert);
        assert!(app.alert.as_deref().unwrap().starts_with("Please provide a value"));

        app.dismiss_alert();
        assert_eq!(app.input_mode, InputMode::FilterEditor);

        let editor = app.editor.as_mut().unwrap();
        editor.next_part();
        editor.cycle(true);
        assert_eq!(editor.op, FilterOp::Equals);
        editor.next_part();
        for c in "bob b".chars() {
            editor.push(c);
        }
        app.save_editor().await;

        assert_eq!(app.input_mode, InputMode::Filters);
        assert_eq!(app.session.store().filters().len(), 1);
        assert_eq!(app.selected_user_id().as_deref(), Some("b"));

        app.start_edit_filter();
        assert_eq!(app.editor.as_ref().map(|e| e.index), Some(Some(0)));
        app.cancel_editor();
        app.remove_selected_filter().await;
        assert!(app.session.store().filters().is_empty());
    }

    #[tokio::test]
    async fn test_column_drawer_toggles() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;

        app.open_columns();
        for _ in 0..6 {
            app.navigate_down();
        }
        app.toggle_selected_column().await;
        assert_eq!(app.session.store().columns().last(), Some(&UserField::Department));
        app.toggle_selected_column().await;
        assert!(!app.session.store().columns().contains(&UserField::Department));
    }

    #[tokio::test]
    async fn test_sort_selected_header() {
        let server = MockServer::start().await;
        let (mut app, _tx) = app(&server).await;

        app.sort_selected().await;
        app.sort_selected().await;
        assert_eq!(app.selected_user_id().as_deref(), Some("b"));
        app.next_header();
        assert_eq!(app.selected_header(), Some(UserField::UserPrincipalName));
    }

    #[tokio::test]
    async fn test_provider_prompt_becomes_alert() {
        let server = MockServer::start().await;
        let (mut app, tx) = app(&server).await;

        tx.send_replace(Some("Go to https://microsoft.com/devicelogin".to_string()));
        app.tick();
        assert_eq!(app.input_mode, InputMode::Alert);
        assert!(app.alert.as_deref().unwrap().contains("devicelogin"));
    }
}
