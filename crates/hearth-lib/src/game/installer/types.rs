use serde::Serialize;
use tokio::sync::{mpsc, watch};

/// Receives progress for long-running work (installs, exports, imports).
///
/// Calls may arrive from a worker task or a blocking thread. Implementations
/// are responsible for getting the update to whoever owns UI state.
pub trait ProgressSink: Send + Sync {
    /// A new step started; `text` is a short human-readable label.
    fn on_status(&self, text: &str);

    /// Units done within the current step.
    fn on_progress(&self, current: u64, total: u64);

    /// The install state machine moved. Only the orchestrator calls this.
    fn on_state(&self, _state: &InstallState) {}
}

/// A progress sink that drops everything.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn on_status(&self, _text: &str) {}
    fn on_progress(&self, _current: u64, _total: u64) {}
}

/// Stage of a profile install that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    Base,
    Loader,
    DependentMods,
}

impl InstallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStage::Base => "base",
            InstallStage::Loader => "loader",
            InstallStage::DependentMods => "dependent_mods",
        }
    }
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-request install state. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallState {
    #[default]
    Idle,
    InstallingBase,
    InstallingLoader,
    InstallingDependentMods,
    Done {
        resolved_version_id: String,
    },
    Failed {
        stage: InstallStage,
        cause: String,
    },
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Done { .. } | InstallState::Failed { .. })
    }

    /// Stage this state is working on, if it is a working state.
    pub fn stage(&self) -> Option<InstallStage> {
        match self {
            InstallState::InstallingBase => Some(InstallStage::Base),
            InstallState::InstallingLoader => Some(InstallStage::Loader),
            InstallState::InstallingDependentMods => Some(InstallStage::DependentMods),
            _ => None,
        }
    }
}

/// Latest progress as seen through a [`WatchProgressSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub label: String,
    pub current: u64,
    pub total: u64,
    pub state: InstallState,
}

/// Publishes progress on a `watch` channel.
///
/// Receivers only ever see the most recent snapshot, so intermediate values
/// may be skipped; the terminal state is always the last thing written.
pub struct WatchProgressSink {
    tx: watch::Sender<ProgressSnapshot>,
}

impl WatchProgressSink {
    pub fn channel() -> (Self, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        (Self { tx }, rx)
    }
}

impl ProgressSink for WatchProgressSink {
    fn on_status(&self, text: &str) {
        self.tx.send_modify(|snapshot| {
            snapshot.label = text.to_string();
            snapshot.current = 0;
            snapshot.total = 0;
        });
    }

    fn on_progress(&self, current: u64, total: u64) {
        self.tx.send_modify(|snapshot| {
            snapshot.current = current;
            snapshot.total = total;
        });
    }

    fn on_state(&self, state: &InstallState) {
        self.tx.send_modify(|snapshot| snapshot.state = state.clone());
    }
}

/// One progress update, as sent by [`ChannelProgressSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Stage { stage: InstallStage },
    Status { text: String },
    Progress { current: u64, total: u64 },
    Finished { state: InstallState },
}

/// Forwards every update as a [`ProgressEvent`] on an unbounded channel.
/// Sends after the receiver is gone are dropped.
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_status(&self, text: &str) {
        let _ = self.tx.send(ProgressEvent::Status {
            text: text.to_string(),
        });
    }

    fn on_progress(&self, current: u64, total: u64) {
        let _ = self.tx.send(ProgressEvent::Progress { current, total });
    }

    fn on_state(&self, state: &InstallState) {
        let event = match state.stage() {
            Some(stage) => ProgressEvent::Stage { stage },
            None if state.is_terminal() => ProgressEvent::Finished {
                state: state.clone(),
            },
            None => return,
        };
        let _ = self.tx.send(event);
    }
}

/// Cancellation token wrapper
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Owning side of a [`CancelToken`].
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
