//! In-memory doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::chat::{ChannelClient, ChatTransport, Recorder};
use crate::error::{AppError, AppResult};
use crate::jobs::controllers::ControllerContext;
use crate::jobs::{ClientSet, ExecutionMode, Job, RunContext, Trigger};
use crate::tracker::{
    Bug, BugId, BugUpdate, Comment, DebugTrackerClient, HistoryEntry, SearchQuery, TrackerClient,
};

pub const ADMIN_CHANNEL: &str = "#admin";

pub fn sample_bug(id: BugId, status: &str) -> Bug {
    let changed = Timestamp::now() - SignedDuration::from_hours(1);
    Bug {
        id,
        summary: format!("Bug number {}", id),
        status: status.to_string(),
        resolution: String::new(),
        severity: "medium".to_string(),
        priority: "medium".to_string(),
        product: "Platform".to_string(),
        component: vec!["Storage".to_string()],
        assigned_to: "dev@example.com".to_string(),
        creator: "reporter@example.com".to_string(),
        keywords: Vec::new(),
        creation_time: Some(changed),
        last_change_time: Some(changed),
    }
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Default)]
struct TrackerState {
    bugs: Vec<Bug>,
    comments: HashMap<BugId, Vec<Comment>>,
    failing_updates: HashSet<BugId>,
}

/// Tracker backed by a vector of bugs
#[derive(Default)]
pub struct MockTracker {
    state: Mutex<TrackerState>,
    reads: AtomicUsize,
    mutations: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockTracker {
    pub fn with_bugs(bugs: Vec<Bug>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                bugs,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Every read sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every call fail with a remote error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_updates_for(&self, id: BugId) {
        self.state.lock().unwrap().failing_updates.insert(id);
    }

    pub fn push_comment(&self, id: BugId, creator: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        let comments = state.comments.entry(id).or_default();
        let comment = Comment {
            id: comments.len() as u64 + 1,
            bug_id: id,
            text: text.to_string(),
            creator: creator.to_string(),
            creation_time: Some(Timestamp::now()),
            is_private: false,
        };
        comments.push(comment);
    }

    pub fn bug(&self, id: BugId) -> Option<Bug> {
        self.state
            .lock()
            .unwrap()
            .bugs
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    async fn read(&self, operation: &str) -> AppResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check(operation)
    }

    fn check(&self, operation: &str) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::remote(operation, anyhow::anyhow!("tracker unavailable")));
        }
        Ok(())
    }

    fn not_found(id: BugId) -> AppError {
        AppError::NotFound {
            entity: "bug".to_string(),
            field: "id".to_string(),
            value: id.to_string(),
        }
    }
}

#[async_trait]
impl TrackerClient for MockTracker {
    async fn get_bug(&self, id: BugId) -> AppResult<Bug> {
        self.read("get_bug").await?;
        self.bug(id).ok_or_else(|| Self::not_found(id))
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Vec<Bug>> {
        self.read("search").await?;
        let now = Timestamp::now();
        let state = self.state.lock().unwrap();
        Ok(state
            .bugs
            .iter()
            .filter(|bug| query.matches(bug, now))
            .cloned()
            .collect())
    }

    async fn get_comments(&self, id: BugId) -> AppResult<Vec<Comment>> {
        self.read("get_comments").await?;
        let state = self.state.lock().unwrap();
        Ok(state.comments.get(&id).cloned().unwrap_or_default())
    }

    async fn get_history(&self, _id: BugId) -> AppResult<Vec<HistoryEntry>> {
        self.read("get_history").await?;
        Ok(Vec::new())
    }

    async fn update_bug(&self, id: BugId, update: &BugUpdate) -> AppResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check("update_bug")?;

        let mut state = self.state.lock().unwrap();
        if state.failing_updates.contains(&id) {
            return Err(AppError::remote("update_bug", anyhow::anyhow!("bug {} is locked", id)));
        }
        let bug = state
            .bugs
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Self::not_found(id))?;

        if let Some(status) = &update.status {
            bug.status = status.clone();
        }
        if let Some(resolution) = &update.resolution {
            bug.resolution = resolution.clone();
        }
        bug.keywords
            .retain(|k| !update.keywords_remove.iter().any(|r| r.eq_ignore_ascii_case(k)));
        for keyword in &update.keywords_add {
            if !bug.has_keyword(keyword) {
                bug.keywords.push(keyword.clone());
            }
        }
        bug.last_change_time = Some(Timestamp::now());
        drop(state);

        if let Some(comment) = &update.comment {
            self.push_comment(id, "bot@example.com", comment);
        }
        Ok(())
    }

    async fn add_comment(&self, id: BugId, text: &str) -> AppResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check("add_comment")?;
        self.push_comment(id, "bot@example.com", text);
        Ok(())
    }
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    /// Set for ephemeral messages
    pub user: Option<String>,
    pub text: String,
}

/// Transport keeping every message it was asked to post
#[derive(Default)]
pub struct RecordingTransport {
    posted: Mutex<Vec<PostedMessage>>,
    failing: bool,
}

impl RecordingTransport {
    /// Rejects every post.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<PostedMessage> {
        self.filtered(|m| m.user.is_none())
    }

    /// Every post in order, ephemeral or not
    pub fn all_messages(&self) -> Vec<PostedMessage> {
        self.filtered(|_| true)
    }

    pub fn ephemeral_messages(&self) -> Vec<PostedMessage> {
        self.filtered(|m| m.user.is_some())
    }

    fn filtered(&self, keep: impl Fn(&PostedMessage) -> bool) -> Vec<PostedMessage> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter(|m| keep(m))
            .cloned()
            .collect()
    }

    fn record(&self, channel: &str, user: Option<&str>, text: &str) -> AppResult<()> {
        if self.failing {
            return Err(AppError::remote("chat.postMessage", anyhow::anyhow!("channel_not_found")));
        }
        self.posted.lock().unwrap().push(PostedMessage {
            channel: channel.to_string(),
            user: user.map(str::to_string),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn post_message(&self, channel: &str, text: &str) -> AppResult<()> {
        self.record(channel, None, text)
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> AppResult<()> {
        self.record(channel, Some(user), text)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn recorder(transport: &Arc<RecordingTransport>) -> Recorder {
    let channel = ChannelClient::new(transport.clone(), ADMIN_CHANNEL, ADMIN_CHANNEL, false);
    Recorder::new(channel, "tracker-operator")
}

// ============================================================================
// Jobs
// ============================================================================

/// Job counting its runs
pub struct StubJob {
    name: String,
    trigger: Trigger,
    delay: Option<Duration>,
    failing: bool,
    on_by_default: bool,
    runs: AtomicUsize,
    finished: AtomicUsize,
    modes: Mutex<Vec<ExecutionMode>>,
}

impl StubJob {
    pub fn manual(name: &str) -> Self {
        Self::with_trigger(name, Trigger::Manual)
    }

    pub fn every(name: &str, interval: Duration) -> Self {
        Self::with_trigger(name, Trigger::Interval(interval))
    }

    fn with_trigger(name: &str, trigger: Trigger) -> Self {
        Self {
            name: name.to_string(),
            trigger,
            delay: None,
            failing: false,
            on_by_default: true,
            runs: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn off_by_default(mut self) -> Self {
        self.on_by_default = false;
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<ExecutionMode> {
        self.modes.lock().unwrap().clone()
    }

    /// Resolves once the first run has begun.
    pub async fn wait_started(&self) {
        while self.runs() == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl Job for StubJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    fn enabled_by_default(&self) -> bool {
        self.on_by_default
    }

    async fn sync(&self, ctx: &RunContext) -> AppResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(ctx.mode);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.failing {
            return Err(AppError::Internal {
                source: anyhow::anyhow!("{} blew up", self.name),
            });
        }
        Ok(())
    }
}

/// Controller wiring over `tracker`, everything posted to [`ADMIN_CHANNEL`].
pub fn controller_context(
    tracker: &Arc<MockTracker>,
    transport: &Arc<RecordingTransport>,
) -> ControllerContext {
    let debug_channel = ChannelClient::new(transport.clone(), ADMIN_CHANNEL, ADMIN_CHANNEL, true);
    ControllerContext {
        clients: ClientSet {
            production: tracker.clone(),
            debug: Arc::new(DebugTrackerClient::new(tracker.clone(), debug_channel)),
        },
        channel: ChannelClient::new(transport.clone(), ADMIN_CHANNEL, ADMIN_CHANNEL, false),
        components: Default::default(),
        product: None,
        username: "bot@example.com".to_string(),
        team: Default::default(),
        trigger: Trigger::Manual,
    }
}

pub fn run_context(transport: &Arc<RecordingTransport>, mode: ExecutionMode) -> RunContext {
    RunContext::new("test", mode, CancellationToken::new(), recorder(transport))
}
