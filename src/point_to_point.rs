//! Point to point communication
//!
//! Endpoints of communication are described by types that implement the
//! [`Source`] and [`Destination`] traits. Communication operations are
//! implemented as default methods on those traits: blocking
//! [`send`](Destination::send) / [`receive_into`](Source::receive_into) pairs,
//! and immediate-mode variants that return a [`Request`] to be tested, waited
//! on, or cancelled.
//!
//! Buffers are typed element slices; the element kind travels with the message
//! and the receiving side rejects a mismatch. A message may be shorter than
//! the receive buffer, never longer.

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::datatype::{Buffer, BufferMut};
use crate::error::{check, translate, CommError};
use crate::request::Request;
use crate::topology::{AnyProcess, Communicator, Process};
use crate::{Rank, Tag};

/// Point to point communication traits
pub mod traits {
    pub use super::{Destination, Source};
}

static COPY_STAGING: AtomicBool = AtomicBool::new(false);

/// Routes every transfer through an intermediate heap buffer.
///
/// With staging on, sends hand the transport a copy of the caller's bytes and
/// receives land in scratch storage that is copied back afterwards, so the
/// transport never touches caller memory directly. The scratch buffer is
/// copied back in full; a message shorter than the buffer therefore zeroes
/// the buffer's tail. The flag is process-global and read at the start of
/// each blocking transfer (immediate-mode transfers ignore it); it exists for
/// transports that cannot operate on arbitrary user buffers. Off by default.
pub fn set_copy_staging(enabled: bool) {
    COPY_STAGING.store(enabled, Ordering::Relaxed);
}

/// Whether transfers currently stage through intermediate buffers.
pub fn copy_staging() -> bool {
    COPY_STAGING.load(Ordering::Relaxed)
}

/// Something that can be used as the destination in a point to point send
/// operation
///
/// The only implementor is [`Process`]: sends always name their target.
pub trait Destination {
    /// The communicator the transfer runs on.
    fn communicator(&self) -> &Communicator;

    /// `Rank` that identifies the destination.
    fn destination_rank(&self) -> Rank;

    /// Send the contents of `buf` to `Destination` `&self`, tagged `tag`.
    ///
    /// Blocks until the message is consigned to the transport; the peer need
    /// not have received it yet.
    ///
    /// # Examples
    /// See `demos/ring.rs`
    fn send<Buf>(&self, buf: &Buf, tag: Tag) -> Result<(), CommError>
    where
        Buf: Buffer + ?Sized,
    {
        send_buffer(self.communicator(), self.destination_rank(), buf, tag)
    }

    /// Initiate sending the contents of `buf` to `Destination` `&self`,
    /// tagged `tag`.
    ///
    /// The returned [`Request`] borrows `buf` for as long as the operation is
    /// in flight and completes once a matching receive has claimed the
    /// message.
    ///
    /// # Examples
    /// See `demos/immediate.rs`
    fn immediate_send<'b, Buf>(&self, buf: &'b Buf, tag: Tag) -> Result<Request<'b>, CommError>
    where
        Buf: Buffer + ?Sized,
    {
        immediate_send_buffer(self.communicator(), self.destination_rank(), buf, tag)
    }
}

/// Something that can be used as the source in a point to point receive
/// operation
///
/// A [`Process`] receives from the identified peer only; an [`AnyProcess`]
/// accepts the message of whatever peer sends next.
pub trait Source {
    /// The communicator the transfer runs on.
    fn communicator(&self) -> &Communicator;

    /// `Rank` that identifies the source, or `None` to accept any sender.
    fn source_rank(&self) -> Option<Rank>;

    /// Receive a message tagged `tag` from `Source` `&self` into `buf`.
    ///
    /// Blocks until a matching message has arrived. The message's element
    /// kind must equal the buffer's and its length must not exceed the
    /// buffer's; either violation fails the receive and consumes the message.
    ///
    /// # Examples
    /// See `demos/ring.rs`
    fn receive_into<Buf>(&self, buf: &mut Buf, tag: Tag) -> Result<(), CommError>
    where
        Buf: BufferMut + ?Sized,
    {
        receive_buffer(self.communicator(), self.source_rank(), buf, tag)
    }

    /// Initiate receiving a message tagged `tag` from `Source` `&self` into
    /// `buf`.
    ///
    /// The returned [`Request`] borrows `buf` exclusively for as long as the
    /// operation is in flight; the payload lands in `buf` when the request
    /// resolves.
    ///
    /// # Examples
    /// See `demos/immediate.rs`
    fn immediate_receive_into<'b, Buf>(
        &self,
        buf: &'b mut Buf,
        tag: Tag,
    ) -> Result<Request<'b>, CommError>
    where
        Buf: BufferMut + ?Sized,
    {
        immediate_receive_buffer(self.communicator(), self.source_rank(), buf, tag)
    }
}

impl<'a> Destination for Process<'a> {
    fn communicator(&self) -> &Communicator {
        self.communicator
    }

    fn destination_rank(&self) -> Rank {
        self.rank
    }
}

impl<'a> Source for Process<'a> {
    fn communicator(&self) -> &Communicator {
        self.communicator
    }

    fn source_rank(&self) -> Option<Rank> {
        Some(self.rank)
    }
}

impl<'a> Source for AnyProcess<'a> {
    fn communicator(&self) -> &Communicator {
        self.communicator
    }

    fn source_rank(&self) -> Option<Rank> {
        None
    }
}

fn send_buffer<Buf>(
    comm: &Communicator,
    dest: Rank,
    buf: &Buf,
    tag: Tag,
) -> Result<(), CommError>
where
    Buf: Buffer + ?Sized,
{
    let context = comm.active_context()?;
    let transport = comm.transport();
    let status = if copy_staging() {
        // Scratch copy lives only for the duration of the call.
        let staged = buf.as_bytes().to_vec();
        transport.send(&staged, buf.element_kind(), dest, tag, context)
    } else {
        transport.send(buf.as_bytes(), buf.element_kind(), dest, tag, context)
    };
    check(transport.as_ref(), status)
}

fn receive_buffer<Buf>(
    comm: &Communicator,
    source: Option<Rank>,
    buf: &mut Buf,
    tag: Tag,
) -> Result<(), CommError>
where
    Buf: BufferMut + ?Sized,
{
    let context = comm.active_context()?;
    let transport = comm.transport();
    let kind = buf.element_kind();
    if copy_staging() {
        let mut staged = vec![0u8; buf.as_bytes().len()];
        let status = transport.receive(&mut staged, kind, source, tag, context);
        check(transport.as_ref(), status)?;
        buf.as_bytes_mut().copy_from_slice(&staged);
        Ok(())
    } else {
        let status = transport.receive(buf.as_bytes_mut(), kind, source, tag, context);
        check(transport.as_ref(), status)
    }
}

fn immediate_send_buffer<'b, Buf>(
    comm: &Communicator,
    dest: Rank,
    buf: &'b Buf,
    tag: Tag,
) -> Result<Request<'b>, CommError>
where
    Buf: Buffer + ?Sized,
{
    let context = comm.active_context()?;
    let transport = comm.transport();
    if copy_staging() {
        warn!("copy staging does not apply to immediate-mode transfers");
    }
    let token = transport
        .immediate_send(buf.as_bytes(), buf.element_kind(), dest, tag, context)
        .map_err(|code| translate(transport.as_ref(), code))?;
    Ok(Request::sending(transport.clone(), token, buf))
}

fn immediate_receive_buffer<'b, Buf>(
    comm: &Communicator,
    source: Option<Rank>,
    buf: &'b mut Buf,
    tag: Tag,
) -> Result<Request<'b>, CommError>
where
    Buf: BufferMut + ?Sized,
{
    let context = comm.active_context()?;
    let transport = comm.transport();
    if copy_staging() {
        warn!("copy staging does not apply to immediate-mode transfers");
    }
    let kind = buf.element_kind();
    let capacity = buf.as_bytes().len();
    let token = transport
        .immediate_receive(capacity, kind, source, tag, context)
        .map_err(|code| translate(transport.as_ref(), code))?;
    Ok(Request::receiving(transport.clone(), token, buf.as_bytes_mut()))
}
