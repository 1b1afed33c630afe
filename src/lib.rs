//! Typed point-to-point communication between cooperating processes
//!
//! Message passing structures parallel programs as a set of peer processes
//! that share nothing and exchange typed messages. This library provides the
//! communicator layer for such programs: process groups, communication
//! contexts that keep unrelated traffic apart, and blocking as well as
//! immediate-mode sends and receives of typed buffers. The actual byte
//! movement is pluggable through the [`Transport`](transport::Transport)
//! trait; a conforming in-process implementation,
//! [`LocalFabric`](transport::LocalFabric), is bundled and doubles as the
//! test bed.
//!
//! # Usage
//!
//! Add the `commlink` crate as a dependency in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! commlink = "0.1.0"
//! ```
//!
//! Then use it in your program like this:
//!
//! ```
//! use std::thread;
//!
//! use commlink::traits::*;
//! use commlink::transport::LocalFabric;
//! use commlink::Universe;
//!
//! let fabric = LocalFabric::new(2);
//! let workers: Vec<_> = (0..2)
//!     .map(|rank| {
//!         let endpoint = fabric.endpoint(rank);
//!         thread::spawn(move || {
//!             let universe = Universe::new(endpoint);
//!             let world = universe.world()?;
//!             if rank == 0 {
//!                 let msg = vec![2.0f64, 3.0, 5.0];
//!                 world.process_at_rank(1).send(&msg[..], 0)?;
//!             } else {
//!                 let mut msg = vec![0.0f64; 3];
//!                 world.any_process().receive_into(&mut msg[..], 0)?;
//!                 assert_eq!(msg, [2.0, 3.0, 5.0]);
//!             }
//!             Ok::<(), commlink::CommError>(())
//!         })
//!     })
//!     .collect();
//! for worker in workers {
//!     worker.join().unwrap().unwrap();
//! }
//! ```
//!
//! # Features
//!
//! - **Groups, contexts, communicators**: ordered process groups, communicator
//!   derivation over subgroups, aliasing and duplication with explicit context
//!   ownership.
//! - **Point to point communication**: blocking send/receive and
//!   immediate-mode variants with testable, waitable, cancellable requests;
//!   per-message tags and an any-source wildcard.
//! - **Datatypes**: transfers are typed element buffers; the element kind is
//!   carried with each message and checked on receipt.
//!
//! Not provided:
//!
//! - Collective operations
//! - Process topology discovery
//! - Fault tolerance across process failures

pub mod datatype;
pub mod environment;
pub mod error;
pub mod point_to_point;
pub mod request;
pub mod topology;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

/// Re-exports all traits.
pub mod traits {
    pub use crate::datatype::traits::*;
    pub use crate::point_to_point::traits::*;
    pub use crate::transport::Transport;
}

pub use crate::environment::{initialize, universe, world_communicator, Universe};
pub use crate::error::CommError;

/// Identifies a process within a communicator by its position in the group.
pub type Rank = i32;
/// Encodes number of elements in multi-element messages.
pub type Count = i32;
/// Can be used to tag messages on the sender side and match on the receiver
/// side.
pub type Tag = i32;
