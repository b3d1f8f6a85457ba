//! Process-wide provisioning status record

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Lifecycle of the sidecar. Ordered so transitions can only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Initialized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
        }
    }
}

#[derive(Debug)]
struct StatusRecord {
    state: LifecycleState,
    started_at: Option<DateTime<Utc>>,
    last_model_pull: Option<DateTime<Utc>>,
    last_nodes_pull: Option<DateTime<Utc>>,
    // Unbounded: every message since startup is retained. Long-lived sidecars
    // that are pulled from repeatedly grow this without limit.
    messages: Vec<String>,
}

/// Immutable copy of the status record taken under the lock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub state: LifecycleState,
    pub uptime: String,
    pub uptime_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_model_pull: Option<DateTime<Utc>>,
    pub last_nodes_pull: Option<DateTime<Utc>>,
    pub messages: Vec<String>,
}

/// Shared status tracker.
///
/// Every mutation takes the single lock; readers only ever get a
/// [`StatusSnapshot`] copied out while the lock is held.
#[derive(Debug)]
pub struct StatusTracker {
    created_at: DateTime<Utc>,
    record: Mutex<StatusRecord>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            record: Mutex::new(StatusRecord {
                state: LifecycleState::Uninitialized,
                started_at: None,
                last_model_pull: None,
                last_nodes_pull: None,
                messages: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `state`. Backward transitions are ignored so the state never
    /// regresses. Entering `initializing` stamps the start time.
    pub fn set_state(&self, state: LifecycleState) {
        let mut record = self.lock();

        if state < record.state {
            warn!(
                current = %record.state,
                requested = %state,
                "Ignoring backward lifecycle transition"
            );
            return;
        }

        if state == LifecycleState::Initializing && record.started_at.is_none() {
            record.started_at = Some(Utc::now());
        }

        record.state = state;
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    pub fn record_model_pull(&self) {
        self.lock().last_model_pull = Some(Utc::now());
    }

    pub fn record_nodes_pull(&self) {
        self.lock().last_nodes_pull = Some(Utc::now());
    }

    pub fn append_message(&self, message: impl Into<String>) {
        let message = message.into();
        info!(status_message = %message, "Status");
        self.lock().messages.push(message);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let record = self.lock();
        let since = record.started_at.unwrap_or(self.created_at);
        let uptime = Utc::now().signed_duration_since(since);

        StatusSnapshot {
            state: record.state,
            uptime: format_uptime(uptime.num_seconds()),
            uptime_seconds: uptime.num_seconds(),
            started_at: record.started_at,
            last_model_pull: record.last_model_pull,
            last_nodes_pull: record.last_nodes_pull,
            messages: record.messages.clone(),
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn format_uptime(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
