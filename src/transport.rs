//! The byte-moving transport boundary
//!
//! Everything below the communicator layer is reached through the [`Transport`]
//! trait: context management, blocking and immediate transfer primitives, and
//! completion tracking for posted operations. Implementations own the actual
//! progress engine: network, shared memory, or, for the bundled
//! [`LocalFabric`], the peer threads themselves.
//!
//! Status reporting is deliberately flat: every call yields a [`StatusCode`]
//! (or carries one in its `Err`), and the only way to interpret a non-success
//! code is [`Transport::error_string`]. The communicator layer funnels all of
//! them through one translation gateway.

use crate::datatype::ElementKind;
use crate::{Rank, Tag};

pub mod local;

pub use self::local::{LocalEndpoint, LocalFabric};

/// Identifies one communication scope among a fixed set of processes.
///
/// Ids are opaque outside the transport that minted them. [`ContextId::NULL`]
/// is the one distinguished value: it is what context creation hands a parent
/// member that is not part of the new group, and no transfer can run on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// The null context: a communicator bound to it is initialized but cannot
    /// transfer.
    pub const NULL: ContextId = ContextId(u64::MAX);

    /// Wraps a raw context value. Meant for `Transport` implementations.
    pub const fn from_raw(raw: u64) -> ContextId {
        ContextId(raw)
    }

    /// The raw context value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null context.
    pub const fn is_null(self) -> bool {
        self.0 == ContextId::NULL.0
    }
}

/// Token of one posted, not yet observed operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpToken(u64);

impl OpToken {
    /// Wraps a raw token value. Meant for `Transport` implementations.
    pub const fn from_raw(raw: u64) -> OpToken {
        OpToken(raw)
    }

    /// The raw token value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Result code of a single transport call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatusCode(i32);

impl StatusCode {
    /// The code reported by successful calls.
    pub const SUCCESS: StatusCode = StatusCode(0);

    /// Wraps a raw status value.
    pub const fn new(code: i32) -> StatusCode {
        StatusCode(code)
    }

    /// The raw status value.
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Whether the call succeeded.
    pub const fn is_success(self) -> bool {
        self.0 == StatusCode::SUCCESS.0
    }
}

/// Outcome of a resolved operation.
#[derive(Clone, Debug)]
pub struct Completion {
    /// Received payload, for receives that completed with data. At most as
    /// long as the capacity the receive was posted with.
    pub payload: Option<Vec<u8>>,
    /// The operation's own status; non-success means the transfer failed after
    /// being posted.
    pub status: StatusCode,
    /// Whether a cancel claimed the operation before it could match.
    pub cancelled: bool,
}

/// Progress of a posted operation as seen by [`Transport::poll`].
#[derive(Clone, Debug)]
pub enum Progress {
    /// Not finished yet.
    Pending,
    /// Finished; the completion carries the outcome.
    Complete(Completion),
}

/// Capabilities the communicator layer requires from a message-passing
/// runtime.
///
/// One value of this trait represents one process's attachment to the runtime;
/// peers are always named by their rank within a context. Implementations are
/// shared across communicators as `Arc<dyn Transport>` and must therefore be
/// safe to call from multiple threads.
///
/// Tokens returned by the immediate-mode primitives are single-observation:
/// the `poll` or `wait` call that sees the completion consumes the token, and
/// later calls with it report an error.
pub trait Transport: Send + Sync {
    /// Blocking send of `bytes` as elements of `kind` to `dest` under `tag`.
    ///
    /// Returns once the message is consigned to the runtime; the peer need not
    /// have received it yet.
    fn send(
        &self,
        bytes: &[u8],
        kind: ElementKind,
        dest: Rank,
        tag: Tag,
        context: ContextId,
    ) -> StatusCode;

    /// Blocking receive into `bytes` of a message of `kind` under `tag`.
    ///
    /// A `source` of `None` accepts any sender. Returns once a matching
    /// message has been copied into `bytes` or the transfer failed.
    fn receive(
        &self,
        bytes: &mut [u8],
        kind: ElementKind,
        source: Option<Rank>,
        tag: Tag,
        context: ContextId,
    ) -> StatusCode;

    /// Posts a send; the token resolves once a matching receive claims the
    /// message.
    fn immediate_send(
        &self,
        bytes: &[u8],
        kind: ElementKind,
        dest: Rank,
        tag: Tag,
        context: ContextId,
    ) -> Result<OpToken, StatusCode>;

    /// Posts a receive for up to `capacity` bytes; the payload arrives in the
    /// completion.
    fn immediate_receive(
        &self,
        capacity: usize,
        kind: ElementKind,
        source: Option<Rank>,
        tag: Tag,
        context: ContextId,
    ) -> Result<OpToken, StatusCode>;

    /// Non-blocking completion check; observing a completion consumes the
    /// token.
    fn poll(&self, token: OpToken) -> Result<Progress, StatusCode>;

    /// Blocks until the operation resolves, consuming the token.
    fn wait(&self, token: OpToken) -> Result<Completion, StatusCode>;

    /// Best-effort abort of a posted operation.
    ///
    /// The operation still resolves (as cancelled, or with its original
    /// outcome if the runtime already matched it), so the token must still be
    /// observed afterwards.
    fn cancel(&self, token: OpToken) -> StatusCode;

    /// Derives a context over `members` from `parent`.
    ///
    /// `members` lists parent ranks; their order becomes the new context's
    /// rank order. Callers inside `members` receive the fresh id, a caller
    /// that belongs to the parent but not to `members` receives
    /// [`ContextId::NULL`]. Like the rest of the derivation protocol this is
    /// collective: every parent member is expected to make the same call.
    fn create_context(&self, parent: ContextId, members: &[Rank]) -> Result<ContextId, StatusCode>;

    /// Clones `context` into an independent scope over the same members.
    ///
    /// Traffic never crosses between a context and its clone. Collective
    /// across the context's members, like
    /// [`create_context`](Transport::create_context).
    fn duplicate_context(&self, context: ContextId) -> Result<ContextId, StatusCode>;

    /// Releases the calling process's share of `context`.
    fn release_context(&self, context: ContextId) -> StatusCode;

    /// The implicit context spanning every process of the runtime.
    fn world_context(&self) -> ContextId;

    /// Number of processes in the world context.
    fn world_size(&self) -> Result<usize, StatusCode>;

    /// Human-readable description of a status code.
    fn error_string(&self, status: StatusCode) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_context_is_distinguished() {
        assert!(ContextId::NULL.is_null());
        assert!(!ContextId::from_raw(0).is_null());
        assert_ne!(ContextId::from_raw(3), ContextId::NULL);
    }

    #[test]
    fn status_codes_compare_by_value() {
        assert!(StatusCode::SUCCESS.is_success());
        assert!(!StatusCode::new(2).is_success());
        assert_eq!(StatusCode::new(0), StatusCode::SUCCESS);
    }
}
