//! A scripted directory client.
//!
//! Every lookup is answered according to the current [`DirectoryScript`],
//! and every dispatched request is recorded for inspection.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use rollcall_core::{LookupRequest, MatchEntry};
use rollcall_sync::{DirectoryClient, ResponseSink, SyncError};

/// How the directory answers the next lookups.
#[derive(Debug, Clone)]
pub enum DirectoryScript {
    /// Answer with these entries before `dispatch_lookup` returns.
    RespondImmediately(Vec<MatchEntry>),
    /// Answer with every requested hash, before `dispatch_lookup` returns.
    MatchAll,
    /// Answer from another thread after a delay.
    RespondAfter(Duration, Vec<MatchEntry>),
    /// Deliver these raw bytes as the response payload.
    Payload(Vec<u8>),
    /// Report a directory error.
    Error(String),
    /// Accept the request and never answer.
    Silent,
    /// Refuse the request.
    Unavailable,
}

/// Directory client double driven by a [`DirectoryScript`].
pub struct ScriptedDirectory {
    script: Mutex<DirectoryScript>,
    requests: Mutex<Vec<LookupRequest>>,
    last_sink: Mutex<Option<ResponseSink>>,
}

impl ScriptedDirectory {
    pub fn new(script: DirectoryScript) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            last_sink: Mutex::new(None),
        }
    }

    pub fn set_script(&self, script: DirectoryScript) {
        *lock(&self.script) = script;
    }

    /// Requests dispatched so far, including refused ones.
    pub fn dispatch_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<LookupRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Answer the most recent request now, as a late response would.
    ///
    /// Returns whether the answer was accepted by a waiting run.
    pub fn deliver_late(&self, entries: Vec<MatchEntry>) -> bool {
        let Some(request) = self.last_request() else {
            return false;
        };
        match lock(&self.last_sink).as_ref() {
            Some(sink) => sink.on_result(&request.transaction_id, entries),
            None => false,
        }
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn dispatch_lookup(
        &self,
        request: &LookupRequest,
        sink: ResponseSink,
    ) -> rollcall_sync::Result<()> {
        lock(&self.requests).push(request.clone());
        *lock(&self.last_sink) = Some(sink.clone());

        let script = lock(&self.script).clone();
        let id = request.transaction_id;
        match script {
            DirectoryScript::RespondImmediately(entries) => {
                sink.on_result(&id, entries);
            }
            DirectoryScript::MatchAll => {
                let entries = request.hashes.iter().copied().map(MatchEntry::new).collect();
                sink.on_result(&id, entries);
            }
            DirectoryScript::RespondAfter(delay, entries) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    sink.on_result(&id, entries);
                });
            }
            DirectoryScript::Payload(bytes) => {
                sink.on_payload(&id, &bytes);
            }
            DirectoryScript::Error(cause) => {
                sink.on_error(&id, cause);
            }
            DirectoryScript::Silent => {}
            DirectoryScript::Unavailable => {
                return Err(SyncError::TransportUnavailable("scripted outage".into()));
            }
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
