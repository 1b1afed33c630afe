//! Organizing processes as groups and communicators
//!
//! Processes are organized in communicators. All processes on a transport are
//! reachable through the world communicator owned by the
//! [`Universe`](crate::environment::Universe); further communicators are
//! derived from it over subsets of its group, or created as aliases and clones
//! of existing ones. Within a communicator, processes are addressed by their
//! `Rank`; that information is encapsulated in a [`Process`].
//!
//! A fresh communicator from
//! [`Universe::communicator`](crate::environment::Universe::communicator) is
//! blank and is brought up by exactly one lifecycle operation:
//!
//! - [`Communicator::initialize`], derivation over a subgroup of a parent,
//! - [`Communicator::copy_from`], an alias of the source's context (borrowed),
//! - [`Communicator::duplicate_from`], an independent clone of the source's
//!   context (owned).
//!
//! Ownership of the underlying transport context is explicit: the handle
//! carries an [`Ownership`] tag and only an `Owned`, non-null context is
//! released when the communicator is dropped.

use std::fmt;
use std::sync::Arc;

use conv::ConvUtil;
use log::debug;
use smallvec::SmallVec;

use crate::error::{precondition, translate, CommError};
use crate::transport::{ContextId, Transport};
use crate::Rank;

/// An ordered, duplicate-free list of process ids.
///
/// The ids are ranks of whatever communicator the group is interpreted
/// against; their order defines the rank order of a communicator derived over
/// the group. Groups are value-like: `Clone` yields an independent deep copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessGroup {
    ids: Vec<Rank>,
}

impl ProcessGroup {
    /// Creates an empty group.
    pub fn new() -> ProcessGroup {
        ProcessGroup { ids: Vec::new() }
    }

    /// Creates the group of ids `0..count`, in order.
    pub fn range(count: Rank) -> ProcessGroup {
        ProcessGroup {
            ids: (0..count).collect(),
        }
    }

    /// Creates a group from `ids`, keeping the first occurrence of each id.
    pub fn from_ids(ids: &[Rank]) -> ProcessGroup {
        let mut group = ProcessGroup::new();
        for &id in ids {
            group.add(id);
        }
        group
    }

    /// Appends `id` to the group.
    ///
    /// Returns whether it was inserted; an id that is already a member is
    /// left where it is.
    pub fn add(&mut self, id: Rank) -> bool {
        if self.contains(id) {
            false
        } else {
            self.ids.push(id);
            true
        }
    }

    /// Number of ids in the group.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// Whether the group holds no ids.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The id at `position`, if any.
    pub fn get(&self, position: usize) -> Option<Rank> {
        self.ids.get(position).copied()
    }

    /// The position of `id` within the group, if it is a member.
    pub fn position(&self, id: Rank) -> Option<usize> {
        self.ids.iter().position(|&member| member == id)
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: Rank) -> bool {
        self.ids.contains(&id)
    }

    /// The ids in group order.
    pub fn ids(&self) -> &[Rank] {
        &self.ids
    }

    /// Iterates over the ids in group order.
    pub fn iter(&self) -> impl Iterator<Item = Rank> + '_ {
        self.ids.iter().copied()
    }
}

/// How a communicator relates to its transport context.
///
/// The tag decides release behavior on drop through a single exhaustive
/// match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// The communicator releases the context when dropped.
    Owned,
    /// Another communicator owns the context; it is never released here.
    Borrowed,
}

/// A transport context together with its ownership tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContextHandle {
    id: ContextId,
    ownership: Ownership,
}

impl ContextHandle {
    fn owned(id: ContextId) -> ContextHandle {
        ContextHandle {
            id,
            ownership: Ownership::Owned,
        }
    }

    fn borrowed(id: ContextId) -> ContextHandle {
        ContextHandle {
            id,
            ownership: Ownership::Borrowed,
        }
    }

    /// The transport context id.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The ownership tag.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }
}

/// A communication scope over an ordered group of processes.
///
/// All transfers run through the addressing views
/// [`process_at_rank`](Communicator::process_at_rank) and
/// [`any_process`](Communicator::any_process); see the
/// [`point_to_point`](crate::point_to_point) module.
///
/// No internal locking: concurrent operations on one communicator must be
/// serialized by the caller, or given their own communicator via
/// [`duplicate_from`](Communicator::duplicate_from).
pub struct Communicator {
    transport: Arc<dyn Transport>,
    handle: Option<ContextHandle>,
    group: ProcessGroup,
    initialized: bool,
    revision: u64,
}

impl Communicator {
    /// A blank communicator on `transport`, to be brought up by one lifecycle
    /// operation.
    pub(crate) fn blank(transport: Arc<dyn Transport>) -> Communicator {
        Communicator {
            transport,
            handle: None,
            group: ProcessGroup::new(),
            initialized: false,
            revision: 0,
        }
    }

    /// The world communicator: the transport's implicit global context,
    /// borrowed because it must never be released by this wrapper.
    pub(crate) fn world(transport: Arc<dyn Transport>, group: ProcessGroup) -> Communicator {
        let handle = ContextHandle::borrowed(transport.world_context());
        Communicator {
            transport,
            handle: Some(handle),
            group,
            initialized: true,
            revision: 1,
        }
    }

    /// Derives this communicator as a sub-scope of `parent` over `subgroup`.
    ///
    /// `subgroup` lists parent ranks; its order becomes this communicator's
    /// rank order. Every id is assumed to be a valid parent rank; passing one
    /// that is not surfaces as a transport error. Derivation is collective
    /// across the parent: a member that calls this while left out of
    /// `subgroup` ends up initialized on the null context and cannot
    /// transfer.
    ///
    /// On failure nothing is retained: the communicator stays uninitialized
    /// with no handle.
    ///
    /// # Examples
    /// See `demos/ring.rs`
    pub fn initialize(
        &mut self,
        parent: &Communicator,
        subgroup: ProcessGroup,
    ) -> Result<(), CommError> {
        if self.initialized {
            return Err(precondition(CommError::AlreadyInitialized));
        }
        if !parent.initialized {
            return Err(precondition(CommError::UninitializedParent));
        }
        if subgroup.is_empty() {
            return Err(precondition(CommError::EmptyGroup));
        }
        if subgroup.size() > parent.group.size() {
            return Err(precondition(CommError::OversizedGroup {
                len: subgroup.size(),
                parent: parent.group.size(),
            }));
        }
        let transport = Arc::clone(&parent.transport);
        let members: SmallVec<[Rank; 8]> = subgroup.iter().collect();
        let id = transport
            .create_context(parent.context_or_null(), &members)
            .map_err(|code| translate(transport.as_ref(), code))?;
        debug!(
            "derived context {:?} over {} of {} parent ranks",
            id,
            subgroup.size(),
            parent.group.size()
        );
        self.transport = transport;
        self.handle = Some(ContextHandle::owned(id));
        self.set_group(subgroup);
        self.initialized = true;
        self.touch();
        Ok(())
    }

    /// Turns this communicator into an alias of `source`: same underlying
    /// context, no new transport resource.
    ///
    /// The context is borrowed: dropping this communicator never releases a
    /// context it does not own; `source` (or whoever holds the context as
    /// owned) remains responsible for it.
    pub fn copy_from(&mut self, source: &Communicator) {
        self.reset_from(source);
        if let Some(handle) = source.handle {
            self.handle = Some(ContextHandle::borrowed(handle.id()));
        }
    }

    /// Turns this communicator into an independent clone of `source`: same
    /// group, fresh context owned by this communicator.
    ///
    /// Traffic never crosses between the clone and the original. Cloning is
    /// collective across the source's members. A clone failure is logged and
    /// leaves this communicator without a handle; inspect
    /// [`context`](Communicator::context) to tell the cases apart.
    pub fn duplicate_from(&mut self, source: &Communicator) {
        self.reset_from(source);
        if let Some(handle) = source.handle {
            match self.transport.duplicate_context(handle.id()) {
                Ok(id) => {
                    debug!("duplicated context {:?} as {:?}", handle.id(), id);
                    self.handle = Some(ContextHandle::owned(id));
                }
                Err(code) => {
                    translate(self.transport.as_ref(), code);
                }
            }
        }
    }

    /// Shared start of copy and duplicate: deep group copy, release of any
    /// owned context, transport adoption, initialized propagation.
    fn reset_from(&mut self, source: &Communicator) {
        self.set_group(source.group.clone());
        self.release_handle();
        self.transport = Arc::clone(&source.transport);
        self.initialized = source.initialized;
        self.touch();
    }

    /// Releases an owned, non-null context and clears the handle.
    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            match (handle.ownership(), handle.id().is_null()) {
                (Ownership::Owned, false) => {
                    debug!("releasing context {:?}", handle.id());
                    let status = self.transport.release_context(handle.id());
                    if !status.is_success() {
                        translate(self.transport.as_ref(), status);
                    }
                }
                (Ownership::Owned, true) | (Ownership::Borrowed, _) => {}
            }
        }
    }

    fn set_group(&mut self, group: ProcessGroup) {
        self.group = group;
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn context_or_null(&self) -> ContextId {
        self.handle.map_or(ContextId::NULL, |handle| handle.id())
    }

    /// The context to transfer on, or the null-context error.
    pub(crate) fn active_context(&self) -> Result<ContextId, CommError> {
        match self.handle {
            Some(handle) if !handle.id().is_null() => Ok(handle.id()),
            _ => Err(precondition(CommError::NullContext)),
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Number of processes in this communicator.
    pub fn size(&self) -> Rank {
        self.group
            .size()
            .value_as()
            .expect("Group size exceeds the range of Rank.")
    }

    /// The context this communicator operates on, if any.
    ///
    /// `Some(ContextId::NULL)` marks a parent member that was excluded from a
    /// derivation: initialized, but unable to transfer.
    pub fn context(&self) -> Option<ContextId> {
        self.handle.map(|handle| handle.id())
    }

    /// The context handle with its ownership tag, if any.
    pub fn handle(&self) -> Option<ContextHandle> {
        self.handle
    }

    /// Whether a lifecycle operation has completed on this communicator.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The group backing this communicator.
    pub fn group(&self) -> &ProcessGroup {
        &self.group
    }

    /// Monotone counter bumped by every successful lifecycle mutation.
    ///
    /// Observers compare revisions to notice derivations, copies, and
    /// duplications without subscribing to anything.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// A view of the process at `rank` for addressing transfers.
    ///
    /// # Panics
    /// If `rank` is outside `0..self.size()`.
    ///
    /// # Examples
    /// See `demos/ring.rs`
    pub fn process_at_rank(&self, rank: Rank) -> Process<'_> {
        assert!(
            0 <= rank && rank < self.size(),
            "invalid rank: {}",
            rank
        );
        Process {
            communicator: self,
            rank,
        }
    }

    /// A view accepting a message from whatever process sends next.
    pub fn any_process(&self) -> AnyProcess<'_> {
        AnyProcess { communicator: self }
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.release_handle();
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("handle", &self.handle)
            .field("group", &self.group)
            .field("initialized", &self.initialized)
            .field("revision", &self.revision)
            .finish()
    }
}

/// Identifies a process by rank within a communicator.
#[derive(Copy, Clone)]
pub struct Process<'a> {
    pub(crate) communicator: &'a Communicator,
    pub(crate) rank: Rank,
}

impl<'a> Process<'a> {
    /// The process's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }
}

/// Stands for whatever process sends next: the receive-side wildcard.
#[derive(Copy, Clone)]
pub struct AnyProcess<'a> {
    pub(crate) communicator: &'a Communicator,
}
