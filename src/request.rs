//! Request objects for non-blocking operations
//!
//! Immediate-mode operations such as
//! [`immediate_send`](crate::point_to_point::Destination::immediate_send)
//! return request objects that borrow the buffers involved in the operation
//! so as to ensure proper access restrictions while the transfer is in
//! flight. A request resolves through [`test`](Request::test) or
//! [`wait`](Request::wait); afterwards both are no-ops and the borrow ends
//! when the request is dropped.
//!
//! Failure reporting is deliberately relaxed, matching the blocking side's
//! spirit but without a `Result`: a request whose operation failed still
//! counts as resolved, and the failure surfaces as one warning log line. Code
//! that must distinguish outcomes keeps the data it expected to receive out of
//! band or checks the buffer contents.
//!
//! Dropping an unresolved request cancels the operation on the way out, so an
//! abandoned transfer never leaves the transport waiting on a buffer that no
//! longer exists.

use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;

use crate::datatype::Buffer;
use crate::error::translate;
use crate::transport::{Completion, OpToken, Progress, Transport};

/// A request object for a non-blocking operation, borrowing its buffer for
/// `'b`
///
/// Send requests hold a shared borrow of the outgoing buffer; receive
/// requests hold an exclusive borrow of the incoming one and fill it upon
/// resolution.
///
/// # Examples
///
/// See `demos/immediate.rs`
#[must_use]
pub struct Request<'b> {
    transport: Arc<dyn Transport>,
    token: Option<OpToken>,
    sink: Option<&'b mut [u8]>,
    _buffer: PhantomData<&'b [u8]>,
}

impl<'b> Request<'b> {
    /// A request tracking a posted send; `buffer` is the borrow being
    /// guarded.
    pub(crate) fn sending<Buf>(
        transport: Arc<dyn Transport>,
        token: OpToken,
        _buffer: &'b Buf,
    ) -> Request<'b>
    where
        Buf: Buffer + ?Sized,
    {
        Request {
            transport,
            token: Some(token),
            sink: None,
            _buffer: PhantomData,
        }
    }

    /// A request tracking a posted receive; the payload lands in `sink` upon
    /// resolution.
    pub(crate) fn receiving(
        transport: Arc<dyn Transport>,
        token: OpToken,
        sink: &'b mut [u8],
    ) -> Request<'b> {
        Request {
            transport,
            token: Some(token),
            sink: Some(sink),
            _buffer: PhantomData,
        }
    }

    /// Whether the operation has been observed to finish.
    pub fn is_resolved(&self) -> bool {
        self.token.is_none()
    }

    /// Check without blocking whether the operation has finished.
    ///
    /// Returns whether the request is resolved. A transport failure while
    /// checking is logged and reported as not finished, so callers in a
    /// test loop keep their request usable.
    ///
    /// # Examples
    ///
    /// See `demos/immediate.rs`
    pub fn test(&mut self) -> bool {
        let token = match self.token {
            Some(token) => token,
            None => return true,
        };
        match self.transport.poll(token) {
            Ok(Progress::Complete(completion)) => {
                self.resolve(completion);
                true
            }
            Ok(Progress::Pending) => false,
            Err(code) => {
                translate(self.transport.as_ref(), code);
                false
            }
        }
    }

    /// Block until the operation finishes.
    ///
    /// A transport failure while waiting is logged and leaves the request
    /// unresolved.
    ///
    /// # Examples
    ///
    /// See `demos/immediate.rs`
    pub fn wait(&mut self) {
        let token = match self.token {
            Some(token) => token,
            None => return,
        };
        match self.transport.wait(token) {
            Ok(completion) => self.resolve(completion),
            Err(code) => {
                translate(self.transport.as_ref(), code);
            }
        }
    }

    /// Ask the transport to abort the operation.
    ///
    /// Best effort: an operation that already matched keeps its outcome. The
    /// request stays unresolved until a subsequent [`test`](Request::test) or
    /// [`wait`](Request::wait) observes how the cancel played out; a failure
    /// to cancel is logged.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token {
            let status = self.transport.cancel(token);
            if !status.is_success() {
                translate(self.transport.as_ref(), status);
            }
        }
    }

    /// Consumes the token and applies the completion to the borrowed buffer.
    fn resolve(&mut self, completion: Completion) {
        self.token = None;
        if !completion.status.is_success() {
            translate(self.transport.as_ref(), completion.status);
            return;
        }
        if completion.cancelled {
            debug!("request resolved as cancelled");
            return;
        }
        if let (Some(sink), Some(payload)) = (self.sink.as_deref_mut(), completion.payload) {
            let count = payload.len().min(sink.len());
            sink[..count].copy_from_slice(&payload[..count]);
        }
    }
}

impl<'b> Drop for Request<'b> {
    fn drop(&mut self) {
        if let Some(token) = self.token {
            debug!("request dropped while in flight, cancelling");
            self.transport.cancel(token);
            // Observe the cancelled operation so the transport can retire it.
            let _ = self.transport.poll(token);
        }
    }
}
