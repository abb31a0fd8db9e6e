use std::sync::{Arc, Mutex};
use std::time::Instant;
use anyhow::Result;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use securegpt_core::{
    copy_code, code_blocks, BannerSlot, ChatRole, ChatStore, Config, Conversation,
    ConversationController, FileStore, OllamaClient, Segment, StoreSnapshot, Submission,
    SubmitError, SystemClipboard, TransportError,
};
use crate::highlight::HighlightCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
    Input,
}

/// Latest snapshot committed by the store, not yet folded into the view
type SnapshotSlot = Arc<Mutex<Option<Arc<StoreSnapshot>>>>;

/// Code blocks of a conversation's finished answers, numbered from 0
pub fn answer_code_blocks(conversation: &Conversation) -> Vec<Segment> {
    conversation
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::Assistant && !m.is_thinking)
        .flat_map(|m| code_blocks(&m.content))
        .collect()
}

/// The request currently running on a background task
pub struct PendingQuery {
    pub submission: Submission,
    pub task: JoinHandle<Result<String, TransportError>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Chat state
    pub store: ChatStore,
    pub controller: ConversationController,
    pub ollama: OllamaClient,
    pub pending: Option<PendingQuery>,
    store_updates: SnapshotSlot,
    viewed_conversation: Option<String>,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Sidebar
    pub show_sidebar: bool,
    pub sidebar_state: ListState,

    // Chat pane scrolling
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub total_chat_lines: u16,
    pub follow_bottom: bool,

    // Code block copy
    pub selected_code: Option<usize>,
    pub clipboard: SystemClipboard,
    pub banners: BannerSlot,
    pub highlights: HighlightCache,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub sidebar_area: Option<Rect>,
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        info!(dir = %data_dir.display(), "using data directory");

        let mut store = ChatStore::load(Box::new(FileStore::new(data_dir)))
            .with_title_words(config.title_words());
        let store_updates = SnapshotSlot::default();
        let sink = Arc::clone(&store_updates);
        store.subscribe(move |snapshot| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(Arc::clone(snapshot));
            }
        });
        let viewed_conversation = store.active_id().map(str::to_string);
        let controller = ConversationController::from_config(config);
        let ollama = OllamaClient::new(config.endpoint(), config.model());

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,

            store,
            controller,
            ollama,
            pending: None,
            store_updates,
            viewed_conversation,

            input: String::new(),
            input_cursor: 0,

            show_sidebar: true,
            sidebar_state: ListState::default(),

            chat_scroll: 0,
            chat_height: 0,
            total_chat_lines: 0,
            follow_bottom: true,

            selected_code: None,
            clipboard: SystemClipboard::new(),
            banners: BannerSlot::default(),
            highlights: HighlightCache::default(),

            animation_frame: 0,

            sidebar_area: None,
            chat_area: None,
        };
        app.sync_sidebar();
        Ok(app)
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Point the sidebar highlight at the active conversation
    pub fn sync_sidebar(&mut self) {
        let active = self.store.active_id();
        let index = self
            .store
            .conversations()
            .iter()
            .position(|c| Some(c.id.as_str()) == active);
        self.sidebar_state.select(index);
    }

    /// Fold the store's latest commit into view state: sidebar selection,
    /// code selection and the highlight cache
    pub fn apply_store_updates(&mut self) {
        let latest = match self.store_updates.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(snapshot) = latest else {
            return;
        };

        self.sync_sidebar();
        if snapshot.active_id != self.viewed_conversation {
            self.viewed_conversation = snapshot.active_id.clone();
            self.selected_code = None;
            self.follow_bottom = true;
        }

        // Only the active conversation is ever drawn
        let blocks = snapshot.active().map(answer_code_blocks).unwrap_or_default();
        self.highlights.retain_blocks(
            blocks
                .iter()
                .map(|b| (b.language.as_deref().unwrap_or_default(), b.content.as_str())),
        );
    }

    // Sidebar actions
    pub fn sidebar_down(&mut self) {
        let len = self.store.conversations().len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    fn selected_conversation_id(&self) -> Option<String> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.store.conversations().get(i))
            .map(|c| c.id.clone())
    }

    pub fn activate_selected(&mut self) {
        if let Some(id) = self.selected_conversation_id() {
            self.activate(&id);
        }
    }

    pub fn activate(&mut self, id: &str) {
        self.store.set_active(id);
    }

    pub fn new_conversation(&mut self) {
        self.store.create_conversation();
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_conversation_id() {
            self.store.delete_conversation(&id);
        }
    }

    pub fn delete_all(&mut self) {
        self.store.delete_all();
        // The UI never shows an empty store
        self.store.ensure_populated();
    }

    // Submission
    pub fn submit_input(&mut self) {
        let submission = match self.controller.begin(&mut self.store, &self.input) {
            Ok(submission) => submission,
            Err(SubmitError::EmptyInput) => return,
            Err(e) => {
                debug!(error = %e, "submission rejected");
                return;
            }
        };

        self.input.clear();
        self.input_cursor = 0;
        self.follow_bottom = true;

        let ollama = self.ollama.clone();
        let prompt = submission.prompt.clone();
        let task = tokio::spawn(async move { ollama.query(&prompt).await });
        self.pending = Some(PendingQuery { submission, task });
    }

    /// Patch in the answer once the background request has finished
    pub async fn poll_pending(&mut self) {
        let finished = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.task.is_finished());
        if !finished {
            return;
        }
        let Some(PendingQuery { submission, task }) = self.pending.take() else {
            return;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::Aborted(e.to_string())),
        };
        self.controller.complete(&mut self.store, submission, result);
        self.follow_bottom = true;
    }

    // Code blocks
    /// Code blocks of the active conversation's answers, numbered from 0
    pub fn active_code_blocks(&self) -> Vec<Segment> {
        self.store.active().map(answer_code_blocks).unwrap_or_default()
    }

    pub fn select_next_code(&mut self) {
        let count = self.active_code_blocks().len();
        if count == 0 {
            self.selected_code = None;
            return;
        }
        self.selected_code = Some(match self.selected_code {
            Some(i) => (i + 1).min(count - 1),
            None => count - 1,
        });
    }

    pub fn select_prev_code(&mut self) {
        let count = self.active_code_blocks().len();
        if count == 0 {
            self.selected_code = None;
            return;
        }
        self.selected_code = Some(match self.selected_code {
            Some(i) => i.saturating_sub(1).min(count - 1),
            None => count - 1,
        });
    }

    /// Copy the selected block, or the most recent one if none is selected
    pub fn copy_selected_code(&mut self) {
        let blocks = self.active_code_blocks();
        let index = self.selected_code.unwrap_or(blocks.len().saturating_sub(1));
        if let Some(block) = blocks.get(index) {
            copy_code(&mut self.clipboard, &block.content, &mut self.banners, Instant::now());
        }
    }

    // Chat scrolling
    fn max_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    /// Tick animation frame and expire banners (called by Tick event)
    pub fn on_tick(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.banners.expire(Instant::now());
    }
}
