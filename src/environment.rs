//! Environmental management
//!
//! This module ties a process to its communication runtime. A [`Universe`]
//! wraps one [`Transport`] attachment and hands out communicators on it; the
//! free functions [`initialize`], [`universe`], and [`world_communicator`]
//! manage the one process-wide `Universe` slot for programs that want a
//! global entry point instead of threading a `Universe` through their call
//! tree.
//!
//! The world communicator is constructed lazily on first request and cached
//! only on success. When the transport cannot report the world size, the
//! failed attempt leaves nothing behind and the next request starts over.

use std::sync::Arc;

use conv::ConvUtil;
use log::debug;
use once_cell::sync::OnceCell;

use crate::error::{precondition, translate, CommError};
use crate::topology::{Communicator, ProcessGroup};
use crate::transport::Transport;

static UNIVERSE: OnceCell<Universe> = OnceCell::new();

/// Global context
///
/// One process's attachment to a communication runtime. Every communicator
/// obtained from a `Universe` shares its transport.
pub struct Universe {
    transport: Arc<dyn Transport>,
    world: OnceCell<Communicator>,
}

impl Universe {
    /// A universe on `transport`.
    pub fn new<T>(transport: T) -> Universe
    where
        T: Transport + 'static,
    {
        Universe::from_arc(Arc::new(transport))
    }

    /// A universe on an already shared transport.
    pub fn from_arc(transport: Arc<dyn Transport>) -> Universe {
        Universe {
            transport,
            world: OnceCell::new(),
        }
    }

    /// The 'world communicator'
    ///
    /// Contains all processes initially partaking in the computation. Built
    /// on first call and cached; a transport failure or a reported size of
    /// zero is not cached, so a later call tries again.
    ///
    /// # Examples
    /// See `demos/ring.rs`
    pub fn world(&self) -> Result<&Communicator, CommError> {
        self.world.get_or_try_init(|| {
            let size = self
                .transport
                .world_size()
                .map_err(|code| translate(self.transport.as_ref(), code))?;
            if size == 0 {
                return Err(precondition(CommError::EmptyWorld));
            }
            debug!("world communicator spans {} processes", size);
            let count = size
                .value_as()
                .expect("World size exceeds the range of Rank.");
            Ok(Communicator::world(
                Arc::clone(&self.transport),
                ProcessGroup::range(count),
            ))
        })
    }

    /// A blank communicator on this universe's transport.
    ///
    /// It is brought up afterwards by one of the lifecycle operations on
    /// [`Communicator`].
    pub fn communicator(&self) -> Communicator {
        Communicator::blank(Arc::clone(&self.transport))
    }
}

/// Installs `transport` as the process-wide universe.
///
/// If no universe has been installed so far, installs one and returns it.
/// Otherwise returns `None`; the first installation wins and is never
/// replaced.
///
/// # Examples
/// See `demos/ring.rs`
pub fn initialize<T>(transport: T) -> Option<&'static Universe>
where
    T: Transport + 'static,
{
    match UNIVERSE.set(Universe::new(transport)) {
        Ok(()) => UNIVERSE.get(),
        Err(_) => None,
    }
}

/// The process-wide universe, if one has been installed.
pub fn universe() -> Option<&'static Universe> {
    UNIVERSE.get()
}

/// The world communicator of the process-wide universe.
///
/// Fails if no universe has been installed or the world cannot be
/// constructed.
pub fn world_communicator() -> Result<&'static Communicator, CommError> {
    match UNIVERSE.get() {
        Some(universe) => universe.world(),
        None => Err(precondition(CommError::Uninitialized)),
    }
}
