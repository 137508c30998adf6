//! Hand-written fakes shared by the application-level test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use roomsync_core::{SyncError, SyncResult};
use roomsync_domain::entities::Room;
use roomsync_domain::ports::{
    CancelProbe, PlatformAccount, PlatformClient, PlatformMessage, PlatformRoom, SummaryModel,
    SummaryOutput, SummaryRequest,
};
use roomsync_domain::value_objects::TokenUsage;

pub fn room(external_id: &str, name: &str) -> PlatformRoom {
    PlatformRoom {
        room_id: external_id.to_string(),
        name: name.to_string(),
        description: None,
    }
}

pub fn message(id: &str, body: &str) -> PlatformMessage {
    PlatformMessage {
        message_id: id.to_string(),
        account: PlatformAccount {
            account_id: "acc-1".to_string(),
            name: "Ada".to_string(),
        },
        body: body.to_string(),
        send_time: 1_700_000_000,
    }
}

/// A room row as the repository would return it, for pure policy tests
pub fn room_record(id: i64, external_id: &str) -> Room {
    let now = Utc::now();
    Room {
        id,
        external_id: external_id.to_string(),
        name: external_id.to_string(),
        description: None,
        active: true,
        last_synced_message_id: None,
        last_sync_at: None,
        last_error_at: None,
        last_error_message: None,
        last_error_status: None,
        created_at: now,
        updated_at: now,
    }
}

/// Platform fake with scripted responses and a shared call log
#[derive(Clone, Default)]
pub struct ScriptedPlatformClient {
    rooms: Vec<PlatformRoom>,
    messages: HashMap<String, Vec<PlatformMessage>>,
    failures: HashMap<String, (u16, String)>,
    calls: Arc<Mutex<Vec<(String, bool)>>>,
    room_lists: Arc<AtomicUsize>,
}

impl ScriptedPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rooms(mut self, rooms: Vec<PlatformRoom>) -> Self {
        self.rooms = rooms;
        self
    }

    pub fn with_messages(mut self, external_id: &str, messages: Vec<PlatformMessage>) -> Self {
        self.messages.insert(external_id.to_string(), messages);
        self
    }

    pub fn with_failure(mut self, external_id: &str, status: u16, body: &str) -> Self {
        self.failures
            .insert(external_id.to_string(), (status, body.to_string()));
        self
    }

    /// Every `list_messages` call as `(room, force)`, in order
    pub fn message_calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn room_list_calls(&self) -> usize {
        self.room_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatformClient {
    async fn list_rooms(&self) -> SyncResult<Vec<PlatformRoom>> {
        self.room_lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.rooms.clone())
    }

    async fn list_messages(
        &self,
        room_external_id: &str,
        force: bool,
    ) -> SyncResult<Vec<PlatformMessage>> {
        self.calls
            .lock()
            .unwrap()
            .push((room_external_id.to_string(), force));

        if let Some((status, body)) = self.failures.get(room_external_id) {
            return Err(SyncError::PlatformApi {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(self
            .messages
            .get(room_external_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Cancellation probe that allows `n` checkpoints, then cancels
pub struct CancelAfter {
    remaining: AtomicUsize,
}

impl CancelAfter {
    pub fn new(n: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(n),
        }
    }
}

#[async_trait]
impl CancelProbe for CancelAfter {
    async fn checkpoint(&self) -> SyncResult<()> {
        loop {
            let current = self.remaining.load(Ordering::SeqCst);
            if current == 0 {
                return Err(SyncError::Canceled);
            }
            if self
                .remaining
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }
}

/// Summary model fake that records every request it sees
#[derive(Clone, Default)]
pub struct CountingSummarizer {
    requests: Arc<Mutex<Vec<SummaryRequest>>>,
}

impl CountingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<SummaryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryModel for CountingSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> SyncResult<SummaryOutput> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let n = requests.len();
        Ok(SummaryOutput {
            text: format!("summary {n}"),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
                requests: 1,
            },
        })
    }
}
