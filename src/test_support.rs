//! Scriptable transport stub for unit tests
//!
//! [`ScriptedTransport`] answers transfer-tracking calls from queues primed by
//! the test and falls back to fixed defaults when a queue runs dry. It moves
//! no data; tests that need real message flow use
//! [`LocalFabric`](crate::transport::LocalFabric) instead.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::datatype::ElementKind;
use crate::transport::{
    Completion, ContextId, OpToken, Progress, StatusCode, Transport,
};
use crate::{Rank, Tag};

/// The status every unscripted fallible call fails with.
pub(crate) const SCRIPT_FAIL: StatusCode = StatusCode::new(901);

#[derive(Default)]
struct Script {
    polls: VecDeque<Result<Progress, StatusCode>>,
    waits: VecDeque<Result<Completion, StatusCode>>,
    cancels: VecDeque<StatusCode>,
    world_sizes: VecDeque<Result<usize, StatusCode>>,
    polled: usize,
    cancelled: usize,
}

/// A transport whose answers are scripted per call.
pub(crate) struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> ScriptedTransport {
        ScriptedTransport {
            script: Mutex::new(Script::default()),
        }
    }

    pub(crate) fn expect_poll(&self, answer: Result<Progress, StatusCode>) {
        self.script.lock().polls.push_back(answer);
    }

    pub(crate) fn expect_wait(&self, answer: Result<Completion, StatusCode>) {
        self.script.lock().waits.push_back(answer);
    }

    pub(crate) fn expect_cancel(&self, answer: StatusCode) {
        self.script.lock().cancels.push_back(answer);
    }

    pub(crate) fn expect_world_size(&self, answer: Result<usize, StatusCode>) {
        self.script.lock().world_sizes.push_back(answer);
    }

    /// Number of `poll` calls taken so far.
    pub(crate) fn polls_taken(&self) -> usize {
        self.script.lock().polled
    }

    /// Number of `cancel` calls taken so far.
    pub(crate) fn cancels_taken(&self) -> usize {
        self.script.lock().cancelled
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        _bytes: &[u8],
        _kind: ElementKind,
        _dest: Rank,
        _tag: Tag,
        _context: ContextId,
    ) -> StatusCode {
        StatusCode::SUCCESS
    }

    fn receive(
        &self,
        _bytes: &mut [u8],
        _kind: ElementKind,
        _source: Option<Rank>,
        _tag: Tag,
        _context: ContextId,
    ) -> StatusCode {
        StatusCode::SUCCESS
    }

    fn immediate_send(
        &self,
        _bytes: &[u8],
        _kind: ElementKind,
        _dest: Rank,
        _tag: Tag,
        _context: ContextId,
    ) -> Result<OpToken, StatusCode> {
        Ok(OpToken::from_raw(0))
    }

    fn immediate_receive(
        &self,
        _capacity: usize,
        _kind: ElementKind,
        _source: Option<Rank>,
        _tag: Tag,
        _context: ContextId,
    ) -> Result<OpToken, StatusCode> {
        Ok(OpToken::from_raw(0))
    }

    fn poll(&self, _token: OpToken) -> Result<Progress, StatusCode> {
        let mut script = self.script.lock();
        script.polled += 1;
        script.polls.pop_front().unwrap_or(Err(SCRIPT_FAIL))
    }

    fn wait(&self, _token: OpToken) -> Result<Completion, StatusCode> {
        self.script.lock().waits.pop_front().unwrap_or(Err(SCRIPT_FAIL))
    }

    fn cancel(&self, _token: OpToken) -> StatusCode {
        let mut script = self.script.lock();
        script.cancelled += 1;
        script.cancels.pop_front().unwrap_or(StatusCode::SUCCESS)
    }

    fn create_context(
        &self,
        _parent: ContextId,
        _members: &[Rank],
    ) -> Result<ContextId, StatusCode> {
        Err(SCRIPT_FAIL)
    }

    fn duplicate_context(&self, _context: ContextId) -> Result<ContextId, StatusCode> {
        Err(SCRIPT_FAIL)
    }

    fn release_context(&self, _context: ContextId) -> StatusCode {
        StatusCode::SUCCESS
    }

    fn world_context(&self) -> ContextId {
        ContextId::from_raw(0)
    }

    fn world_size(&self) -> Result<usize, StatusCode> {
        self.script.lock().world_sizes.pop_front().unwrap_or(Ok(1))
    }

    fn error_string(&self, status: StatusCode) -> String {
        format!("scripted failure {}", status.as_raw())
    }
}
