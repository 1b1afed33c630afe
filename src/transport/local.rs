//! In-process reference transport
//!
//! A [`LocalFabric`] wires a fixed number of endpoints together through shared
//! mailboxes, with OS threads standing in for processes: thread N holds the
//! endpoint for world rank N and drives its side of every transfer itself.
//! There is no background progress engine; a blocking call parks the calling
//! thread on the fabric condvar until a peer's call resolves it.
//!
//! Matching is oldest-first per receiving mailbox: a receive takes the first
//! queued message that agrees on (source-or-any, tag), a message is handed to
//! the first posted receive that accepts it. Element kind and capacity are
//! checked at match time; a mismatch fails the receive and consumes the
//! message, leaving the sender unaffected.
//!
//! Context derivation is collective in the same sense as the communicator
//! layer above it: every member of the parent makes the same
//! `create_context`/`duplicate_context` call, and calls agree by (parent,
//! resolved member set, call sequence), so all members of one logical
//! derivation observe the same fresh context id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::datatype::ElementKind;
use crate::transport::{Completion, ContextId, OpToken, Progress, StatusCode, Transport};
use crate::{Rank, Tag};

/// Operation on a context this fabric does not know or has torn down.
pub const INVALID_CONTEXT: StatusCode = StatusCode::new(1);
/// The calling endpoint is not a member of the context.
pub const NOT_A_MEMBER: StatusCode = StatusCode::new(2);
/// A peer rank lies outside the context's group.
pub const INVALID_RANK: StatusCode = StatusCode::new(3);
/// Sender and receiver disagree about the element kind.
pub const KIND_MISMATCH: StatusCode = StatusCode::new(4);
/// The matched message does not fit the receive buffer.
pub const TRUNCATED: StatusCode = StatusCode::new(5);
/// Unknown or already-observed operation token.
pub const INVALID_TOKEN: StatusCode = StatusCode::new(6);
/// The context was torn down with the operation still pending.
pub const CONTEXT_RELEASED: StatusCode = StatusCode::new(7);
/// The member list passed to context creation is empty or repeats a member.
pub const INVALID_GROUP: StatusCode = StatusCode::new(8);

const WORLD: ContextId = ContextId::from_raw(0);

/// One message parked in a mailbox until a receive claims it.
struct Envelope {
    source: Rank,
    tag: Tag,
    kind: ElementKind,
    payload: Vec<u8>,
    /// Token of the posting send, for immediate-mode sends.
    send_op: Option<u64>,
}

/// One posted receive waiting for a matching message.
struct PendingReceive {
    op: u64,
    source: Option<Rank>,
    tag: Tag,
    kind: ElementKind,
    capacity: usize,
}

#[derive(Default)]
struct Mailbox {
    undelivered: VecDeque<Envelope>,
    posted: VecDeque<PendingReceive>,
}

struct ContextState {
    /// Member endpoint per rank, in group order.
    nodes: Vec<usize>,
    /// One mailbox per rank.
    boxes: Vec<Mailbox>,
    /// Members that have not yet released the context.
    live: usize,
}

impl ContextState {
    fn new(nodes: Vec<usize>) -> ContextState {
        let size = nodes.len();
        ContextState {
            nodes,
            boxes: (0..size).map(|_| Mailbox::default()).collect(),
            live: size,
        }
    }
}

enum OpState {
    /// Send parked in `context`'s mailbox for `dest`.
    SendQueued { context: ContextId, dest: Rank },
    /// Receive posted in `context`'s mailbox for `rank`.
    ReceiveQueued { context: ContextId, rank: Rank },
    /// Outcome recorded, waiting to be observed.
    Resolved(Completion),
}

/// Keys one logical collective derivation.
#[derive(Clone, PartialEq, Eq, Hash)]
struct DeriveKey {
    parent: u64,
    nodes: Vec<usize>,
}

#[derive(Default)]
struct FabricState {
    contexts: HashMap<u64, ContextState>,
    ops: HashMap<u64, OpState>,
    next_context: u64,
    next_op: u64,
    /// Context ids minted per derivation key, in round order.
    derived: HashMap<DeriveKey, Vec<u64>>,
    /// How many derivation rounds each endpoint has gone through per key.
    derive_seq: HashMap<(usize, DeriveKey), usize>,
    /// Clone ids minted per source context, in round order.
    duplicated: HashMap<u64, Vec<u64>>,
    dup_seq: HashMap<(usize, u64), usize>,
}

impl FabricState {
    fn mint_op(&mut self) -> u64 {
        let op = self.next_op;
        self.next_op += 1;
        op
    }

    fn mint_context(&mut self) -> u64 {
        let id = self.next_context;
        self.next_context += 1;
        id
    }
}

struct Shared {
    size: usize,
    state: Mutex<FabricState>,
    progress: Condvar,
}

/// The rank of `node` within `context`, or why it cannot operate there.
fn member_rank(state: &FabricState, context: ContextId, node: usize) -> Result<Rank, StatusCode> {
    if context.is_null() {
        return Err(INVALID_CONTEXT);
    }
    let ctx = state.contexts.get(&context.as_raw()).ok_or(INVALID_CONTEXT)?;
    let rank = ctx
        .nodes
        .iter()
        .position(|&n| n == node)
        .ok_or(NOT_A_MEMBER)?;
    Ok(rank as Rank)
}

fn rank_in_context(state: &FabricState, context: ContextId, rank: Rank) -> bool {
    state
        .contexts
        .get(&context.as_raw())
        .map_or(false, |ctx| rank >= 0 && (rank as usize) < ctx.nodes.len())
}

fn envelope_matches(envelope: &Envelope, source: Option<Rank>, tag: Tag) -> bool {
    envelope.tag == tag && source.map_or(true, |s| envelope.source == s)
}

/// Hands a claimed envelope to its receive, validating kind and capacity.
///
/// The sender's part of the transfer is done either way; only the receive
/// carries a mismatch error.
fn settle(state: &mut FabricState, receive: PendingReceive, envelope: Envelope) {
    let Envelope {
        kind,
        payload,
        send_op,
        ..
    } = envelope;
    let outcome = if kind != receive.kind {
        Completion {
            payload: None,
            status: KIND_MISMATCH,
            cancelled: false,
        }
    } else if payload.len() > receive.capacity {
        Completion {
            payload: None,
            status: TRUNCATED,
            cancelled: false,
        }
    } else {
        Completion {
            payload: Some(payload),
            status: StatusCode::SUCCESS,
            cancelled: false,
        }
    };
    state.ops.insert(receive.op, OpState::Resolved(outcome));
    if let Some(op) = send_op {
        state.ops.insert(
            op,
            OpState::Resolved(Completion {
                payload: None,
                status: StatusCode::SUCCESS,
                cancelled: false,
            }),
        );
    }
}

/// Delivers `envelope` to the oldest matching posted receive, or parks it.
fn consign(state: &mut FabricState, context: u64, dest: Rank, envelope: Envelope) {
    let receive = {
        let ctx = match state.contexts.get_mut(&context) {
            Some(ctx) => ctx,
            None => return,
        };
        let mailbox = &mut ctx.boxes[dest as usize];
        let at = mailbox
            .posted
            .iter()
            .position(|r| envelope_matches(&envelope, r.source, r.tag));
        match at {
            Some(at) => mailbox.posted.remove(at),
            None => {
                mailbox.undelivered.push_back(envelope);
                return;
            }
        }
    };
    if let Some(receive) = receive {
        settle(state, receive, envelope);
    }
}

/// Claims the oldest matching queued message for `receive`, or posts it.
fn claim(state: &mut FabricState, context: u64, rank: Rank, receive: PendingReceive) {
    let envelope = {
        let ctx = match state.contexts.get_mut(&context) {
            Some(ctx) => ctx,
            None => return,
        };
        let mailbox = &mut ctx.boxes[rank as usize];
        let at = mailbox
            .undelivered
            .iter()
            .position(|e| envelope_matches(e, receive.source, receive.tag));
        match at {
            Some(at) => mailbox.undelivered.remove(at),
            None => {
                mailbox.posted.push_back(receive);
                return;
            }
        }
    };
    if let Some(envelope) = envelope {
        settle(state, receive, envelope);
    }
}

/// A bundle of in-process endpoints acting as one communication world.
///
/// # Examples
/// See `demos/ring.rs`
#[derive(Clone)]
pub struct LocalFabric {
    shared: Arc<Shared>,
}

impl LocalFabric {
    /// Creates a fabric of `size` endpoints, world ranks `0..size`.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn new(size: usize) -> LocalFabric {
        assert!(size > 0, "a fabric needs at least one endpoint");
        let mut state = FabricState {
            next_context: WORLD.as_raw() + 1,
            ..FabricState::default()
        };
        state
            .contexts
            .insert(WORLD.as_raw(), ContextState::new((0..size).collect()));
        LocalFabric {
            shared: Arc::new(Shared {
                size,
                state: Mutex::new(state),
                progress: Condvar::new(),
            }),
        }
    }

    /// The endpoint for world rank `rank`, normally moved into that rank's
    /// thread.
    ///
    /// # Panics
    /// If `rank` is outside `0..self.size()`.
    pub fn endpoint(&self, rank: usize) -> LocalEndpoint {
        assert!(
            rank < self.shared.size,
            "no endpoint {} in a fabric of {}",
            rank,
            self.shared.size
        );
        LocalEndpoint {
            shared: Arc::clone(&self.shared),
            node: rank,
        }
    }

    /// Number of endpoints.
    pub fn size(&self) -> usize {
        self.shared.size
    }
}

/// One process's attachment to a [`LocalFabric`].
pub struct LocalEndpoint {
    shared: Arc<Shared>,
    node: usize,
}

impl LocalEndpoint {
    /// This endpoint's rank in the world context.
    pub fn world_rank(&self) -> Rank {
        self.node as Rank
    }

    /// Blocks until the operation resolves, consuming its entry.
    fn wait_raw(&self, op: u64) -> Result<Completion, StatusCode> {
        let mut state = self.shared.state.lock();
        loop {
            let resolved = matches!(state.ops.get(&op), Some(OpState::Resolved(_)));
            if resolved {
                match state.ops.remove(&op) {
                    Some(OpState::Resolved(completion)) => return Ok(completion),
                    _ => return Err(INVALID_TOKEN),
                }
            }
            if !state.ops.contains_key(&op) {
                return Err(INVALID_TOKEN);
            }
            self.shared.progress.wait(&mut state);
        }
    }
}

impl Transport for LocalEndpoint {
    fn send(
        &self,
        bytes: &[u8],
        kind: ElementKind,
        dest: Rank,
        tag: Tag,
        context: ContextId,
    ) -> StatusCode {
        let mut state = self.shared.state.lock();
        let source = match member_rank(&state, context, self.node) {
            Ok(rank) => rank,
            Err(code) => return code,
        };
        if !rank_in_context(&state, context, dest) {
            return INVALID_RANK;
        }
        consign(
            &mut state,
            context.as_raw(),
            dest,
            Envelope {
                source,
                tag,
                kind,
                payload: bytes.to_vec(),
                send_op: None,
            },
        );
        self.shared.progress.notify_all();
        StatusCode::SUCCESS
    }

    fn receive(
        &self,
        bytes: &mut [u8],
        kind: ElementKind,
        source: Option<Rank>,
        tag: Tag,
        context: ContextId,
    ) -> StatusCode {
        let op = {
            let mut state = self.shared.state.lock();
            let rank = match member_rank(&state, context, self.node) {
                Ok(rank) => rank,
                Err(code) => return code,
            };
            if let Some(source) = source {
                if !rank_in_context(&state, context, source) {
                    return INVALID_RANK;
                }
            }
            let op = state.mint_op();
            state
                .ops
                .insert(op, OpState::ReceiveQueued { context, rank });
            claim(
                &mut state,
                context.as_raw(),
                rank,
                PendingReceive {
                    op,
                    source,
                    tag,
                    kind,
                    capacity: bytes.len(),
                },
            );
            self.shared.progress.notify_all();
            op
        };
        match self.wait_raw(op) {
            Ok(completion) => {
                if completion.status.is_success() {
                    if let Some(payload) = completion.payload {
                        bytes[..payload.len()].copy_from_slice(&payload);
                    }
                }
                completion.status
            }
            Err(code) => code,
        }
    }

    fn immediate_send(
        &self,
        bytes: &[u8],
        kind: ElementKind,
        dest: Rank,
        tag: Tag,
        context: ContextId,
    ) -> Result<OpToken, StatusCode> {
        let mut state = self.shared.state.lock();
        let source = member_rank(&state, context, self.node)?;
        if !rank_in_context(&state, context, dest) {
            return Err(INVALID_RANK);
        }
        let op = state.mint_op();
        state.ops.insert(op, OpState::SendQueued { context, dest });
        consign(
            &mut state,
            context.as_raw(),
            dest,
            Envelope {
                source,
                tag,
                kind,
                payload: bytes.to_vec(),
                send_op: Some(op),
            },
        );
        self.shared.progress.notify_all();
        Ok(OpToken::from_raw(op))
    }

    fn immediate_receive(
        &self,
        capacity: usize,
        kind: ElementKind,
        source: Option<Rank>,
        tag: Tag,
        context: ContextId,
    ) -> Result<OpToken, StatusCode> {
        let mut state = self.shared.state.lock();
        let rank = member_rank(&state, context, self.node)?;
        if let Some(source) = source {
            if !rank_in_context(&state, context, source) {
                return Err(INVALID_RANK);
            }
        }
        let op = state.mint_op();
        state
            .ops
            .insert(op, OpState::ReceiveQueued { context, rank });
        claim(
            &mut state,
            context.as_raw(),
            rank,
            PendingReceive {
                op,
                source,
                tag,
                kind,
                capacity,
            },
        );
        self.shared.progress.notify_all();
        Ok(OpToken::from_raw(op))
    }

    fn poll(&self, token: OpToken) -> Result<Progress, StatusCode> {
        let mut state = self.shared.state.lock();
        let op = token.as_raw();
        let resolved = matches!(state.ops.get(&op), Some(OpState::Resolved(_)));
        if resolved {
            match state.ops.remove(&op) {
                Some(OpState::Resolved(completion)) => Ok(Progress::Complete(completion)),
                _ => Err(INVALID_TOKEN),
            }
        } else if state.ops.contains_key(&op) {
            Ok(Progress::Pending)
        } else {
            Err(INVALID_TOKEN)
        }
    }

    fn wait(&self, token: OpToken) -> Result<Completion, StatusCode> {
        self.wait_raw(token.as_raw())
    }

    fn cancel(&self, token: OpToken) -> StatusCode {
        let mut state = self.shared.state.lock();
        let op = token.as_raw();
        let queued = match state.ops.get(&op) {
            Some(OpState::SendQueued { context, dest }) => Some((*context, *dest, true)),
            Some(OpState::ReceiveQueued { context, rank }) => Some((*context, *rank, false)),
            Some(OpState::Resolved(_)) => None,
            None => return INVALID_TOKEN,
        };
        if let Some((context, rank, is_send)) = queued {
            if let Some(ctx) = state.contexts.get_mut(&context.as_raw()) {
                let mailbox = &mut ctx.boxes[rank as usize];
                if is_send {
                    if let Some(at) = mailbox
                        .undelivered
                        .iter()
                        .position(|e| e.send_op == Some(op))
                    {
                        mailbox.undelivered.remove(at);
                    }
                } else if let Some(at) = mailbox.posted.iter().position(|r| r.op == op) {
                    mailbox.posted.remove(at);
                }
            }
            state.ops.insert(
                op,
                OpState::Resolved(Completion {
                    payload: None,
                    status: StatusCode::SUCCESS,
                    cancelled: true,
                }),
            );
            self.shared.progress.notify_all();
        }
        StatusCode::SUCCESS
    }

    fn create_context(&self, parent: ContextId, members: &[Rank]) -> Result<ContextId, StatusCode> {
        let mut state = self.shared.state.lock();
        if parent.is_null() {
            return Err(INVALID_CONTEXT);
        }
        let nodes: Vec<usize> = {
            let ctx = state
                .contexts
                .get(&parent.as_raw())
                .ok_or(INVALID_CONTEXT)?;
            if !ctx.nodes.contains(&self.node) {
                return Err(NOT_A_MEMBER);
            }
            if members.is_empty() {
                return Err(INVALID_GROUP);
            }
            let mut nodes = Vec::with_capacity(members.len());
            for &rank in members {
                if rank < 0 || rank as usize >= ctx.nodes.len() {
                    return Err(INVALID_RANK);
                }
                let node = ctx.nodes[rank as usize];
                if nodes.contains(&node) {
                    return Err(INVALID_GROUP);
                }
                nodes.push(node);
            }
            nodes
        };
        let key = DeriveKey {
            parent: parent.as_raw(),
            nodes: nodes.clone(),
        };
        let seq = {
            let counter = state.derive_seq.entry((self.node, key.clone())).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };
        let minted = state.derived.get(&key).map_or(0, |ids| ids.len());
        if minted <= seq {
            let id = state.mint_context();
            state.contexts.insert(id, ContextState::new(nodes.clone()));
            state.derived.entry(key.clone()).or_default().push(id);
        }
        let id = match state.derived.get(&key).and_then(|ids| ids.get(seq)) {
            Some(&id) => id,
            None => return Err(INVALID_CONTEXT),
        };
        if nodes.contains(&self.node) {
            Ok(ContextId::from_raw(id))
        } else {
            Ok(ContextId::NULL)
        }
    }

    fn duplicate_context(&self, context: ContextId) -> Result<ContextId, StatusCode> {
        let mut state = self.shared.state.lock();
        if context.is_null() {
            return Err(INVALID_CONTEXT);
        }
        let raw = context.as_raw();
        let nodes = {
            let ctx = state.contexts.get(&raw).ok_or(INVALID_CONTEXT)?;
            if !ctx.nodes.contains(&self.node) {
                return Err(NOT_A_MEMBER);
            }
            ctx.nodes.clone()
        };
        let seq = {
            let counter = state.dup_seq.entry((self.node, raw)).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };
        let minted = state.duplicated.get(&raw).map_or(0, |ids| ids.len());
        if minted <= seq {
            let id = state.mint_context();
            state.contexts.insert(id, ContextState::new(nodes));
            state.duplicated.entry(raw).or_default().push(id);
        }
        match state.duplicated.get(&raw).and_then(|ids| ids.get(seq)) {
            Some(&id) => Ok(ContextId::from_raw(id)),
            None => Err(INVALID_CONTEXT),
        }
    }

    fn release_context(&self, context: ContextId) -> StatusCode {
        if context.is_null() {
            return INVALID_CONTEXT;
        }
        let mut state = self.shared.state.lock();
        let raw = context.as_raw();
        let torn_down = match state.contexts.get_mut(&raw) {
            Some(ctx) => {
                if !ctx.nodes.contains(&self.node) {
                    return NOT_A_MEMBER;
                }
                ctx.live -= 1;
                ctx.live == 0
            }
            None => return INVALID_CONTEXT,
        };
        if torn_down {
            if let Some(ctx) = state.contexts.remove(&raw) {
                // Fail whatever is still parked in the dead context.
                for mailbox in ctx.boxes {
                    for receive in mailbox.posted {
                        state.ops.insert(
                            receive.op,
                            OpState::Resolved(Completion {
                                payload: None,
                                status: CONTEXT_RELEASED,
                                cancelled: false,
                            }),
                        );
                    }
                    for envelope in mailbox.undelivered {
                        if let Some(op) = envelope.send_op {
                            state.ops.insert(
                                op,
                                OpState::Resolved(Completion {
                                    payload: None,
                                    status: CONTEXT_RELEASED,
                                    cancelled: false,
                                }),
                            );
                        }
                    }
                }
                self.shared.progress.notify_all();
            }
        }
        StatusCode::SUCCESS
    }

    fn world_context(&self) -> ContextId {
        WORLD
    }

    fn world_size(&self) -> Result<usize, StatusCode> {
        Ok(self.shared.size)
    }

    fn error_string(&self, status: StatusCode) -> String {
        let text = match status {
            StatusCode::SUCCESS => "success",
            INVALID_CONTEXT => "invalid or released communication context",
            NOT_A_MEMBER => "endpoint is not a member of the context",
            INVALID_RANK => "peer rank outside the context group",
            KIND_MISMATCH => "element kind mismatch between sender and receiver",
            TRUNCATED => "message does not fit the receive buffer",
            INVALID_TOKEN => "unknown or already-observed operation token",
            CONTEXT_RELEASED => "context torn down with the operation still pending",
            INVALID_GROUP => "unusable member list for context creation",
            other => return format!("unknown status code {}", other.as_raw()),
        };
        text.to_string()
    }
}
