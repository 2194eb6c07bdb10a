//! A FIFO with at most one waiting consumer.
//!
//! Producers never wait on an unbounded queue. A consumer that finds the
//! queue empty parks its task until a message is sent or the queue is
//! closed. Only one consumer may be parked at a time; a second one is
//! rejected with [`RecvError::ConcurrentAccess`] instead of being queued.

use fnv::FnvHashMap;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::{error, fmt, mem};

pub struct MessageQueue<T> {
    inner: Arc<Mutex<Shared<T>>>,
}

/// Future returned by [`MessageQueue::recv`].
///
/// Dropping it before completion gives up the waiter slot.
#[must_use = "futures do nothing unless polled"]
pub struct Recv<'a, T> {
    queue: &'a MessageQueue<T>,
    ticket: Option<u64>,
    done: bool,
}

/// Future returned by [`MessageQueue::send_wait`].
///
/// Dropping it while parked takes the producer off the wake list.
#[must_use = "futures do nothing unless polled"]
pub struct SendWait<'a, T> {
    queue: &'a MessageQueue<T>,
    msg: Option<T>,
    ticket: Option<u64>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecvError {
    /// Another consumer is already waiting on this queue.
    ConcurrentAccess,
    /// The queue was closed and every buffered message has been taken.
    Closed,
}

/// The message could not be queued; it is handed back.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum SendError<T> {
    Full(T),
    Closed(T),
}

struct Shared<T> {
    buffer: VecDeque<T>,
    capacity: Option<usize>,
    watch: Watch,
    // Producers parked in `send_wait`, one slot per future.
    blocked_senders: FnvHashMap<u64, Waker>,
    next_ticket: u64,
}

enum Watch {
    Idle,
    Waiting { ticket: u64, waker: Waker },
    // A message arrived for the parked consumer; it has not popped it yet.
    Notified { ticket: u64 },
    Closed,
}

impl<T> MessageQueue<T> {
    /// Creates a queue without a size limit.
    ///
    /// Nothing stops a producer that outpaces its consumer from growing the
    /// buffer until memory runs out. Use [`MessageQueue::bounded`] when the
    /// producer is not trusted to pace itself.
    pub fn new() -> Self {
        MessageQueue::with_capacity(None)
    }

    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue needs room for one message");
        MessageQueue::with_capacity(Some(capacity))
    }

    pub(crate) fn with_capacity(capacity: Option<usize>) -> Self {
        MessageQueue {
            inner: Arc::new(Mutex::new(Shared {
                buffer: VecDeque::new(),
                capacity,
                watch: Watch::Idle,
                blocked_senders: FnvHashMap::default(),
                next_ticket: 0,
            })),
        }
    }

    /// Appends a message without waiting.
    ///
    /// Wakes the parked consumer, if any. Fails when the queue is closed, or
    /// when a bounded queue is full.
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        let mut shared = self.lock();

        if shared.is_closed() {
            return Err(SendError::Closed(msg));
        }

        if shared.is_full() {
            return Err(SendError::Full(msg));
        }

        shared.buffer.push_back(msg);
        let waker = shared.notify_waiter();
        drop(shared);

        if let Some(waker) = waker {
            waker.wake();
        }

        Ok(())
    }

    /// Appends a message, parking the producer while a bounded queue is full.
    pub fn send_wait(&self, msg: T) -> SendWait<'_, T> {
        SendWait {
            queue: self,
            msg: Some(msg),
            ticket: None,
        }
    }

    fn poll_send(
        &self,
        cx: &mut Context<'_>,
        msg: &mut Option<T>,
        ticket: &mut Option<u64>,
    ) -> Poll<Result<(), SendError<T>>> {
        let mut shared = self.lock();

        let item = match msg.take() {
            Some(item) => item,
            None => panic!("`send_wait` polled after completion"),
        };

        if let Some(ticket) = ticket.take() {
            shared.blocked_senders.remove(&ticket);
        }

        if shared.is_closed() {
            return Poll::Ready(Err(SendError::Closed(item)));
        }

        if shared.is_full() {
            *msg = Some(item);
            let next = shared.next_ticket;
            shared.next_ticket = next.wrapping_add(1);
            shared.blocked_senders.insert(next, cx.waker().clone());
            *ticket = Some(next);
            return Poll::Pending;
        }

        shared.buffer.push_back(item);
        let waker = shared.notify_waiter();
        drop(shared);

        if let Some(waker) = waker {
            waker.wake();
        }

        Poll::Ready(Ok(()))
    }

    /// Takes the message at the head of the queue, parking the calling task
    /// while the queue is empty.
    pub fn recv(&self) -> Recv<'_, T> {
        Recv {
            queue: self,
            ticket: None,
            done: false,
        }
    }

    /// Takes the head message if there is one, without parking.
    pub fn try_recv(&self) -> Result<Option<T>, RecvError> {
        let mut shared = self.lock();

        match shared.watch {
            Watch::Waiting { .. } | Watch::Notified { .. } => {
                return Err(RecvError::ConcurrentAccess);
            }
            _ => {}
        }

        match shared.pop() {
            Some(msg) => {
                let senders = mem::take(&mut shared.blocked_senders);
                drop(shared);
                wake_all(senders);
                Ok(Some(msg))
            }
            None if shared.is_closed() => Err(RecvError::Closed),
            None => Ok(None),
        }
    }

    /// Closes the queue.
    ///
    /// Messages already buffered are still delivered. The parked consumer and
    /// any producer parked in [`MessageQueue::send_wait`] are woken.
    pub fn close(&self) {
        let mut shared = self.lock();

        let waker = match mem::replace(&mut shared.watch, Watch::Closed) {
            Watch::Waiting { waker, .. } => Some(waker),
            _ => None,
        };
        let senders = mem::take(&mut shared.blocked_senders);
        drop(shared);

        tracing::trace!("message queue closed");

        if let Some(waker) = waker {
            waker.wake();
        }
        wake_all(senders);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.lock().capacity
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        // Every critical section leaves `Shared` consistent, so a panic in
        // another holder does not invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poll_recv(
        &self,
        cx: &mut Context<'_>,
        ticket: &mut Option<u64>,
    ) -> Poll<Result<T, RecvError>> {
        let mut shared = self.lock();

        let ticket = match *ticket {
            Some(ticket) => ticket,
            None => {
                let next = shared.next_ticket;
                shared.next_ticket = next.wrapping_add(1);
                *ticket = Some(next);
                next
            }
        };

        if let Some(owner) = shared.watch.owner() {
            if owner != ticket {
                return Poll::Ready(Err(RecvError::ConcurrentAccess));
            }
        }

        if let Some(msg) = shared.pop() {
            let senders = mem::take(&mut shared.blocked_senders);
            drop(shared);
            wake_all(senders);
            return Poll::Ready(Ok(msg));
        }

        if shared.is_closed() {
            return Poll::Ready(Err(RecvError::Closed));
        }

        shared.watch = Watch::Waiting {
            ticket,
            waker: cx.waker().clone(),
        };
        Poll::Pending
    }

    fn release_sender(&self, ticket: u64) {
        self.lock().blocked_senders.remove(&ticket);
    }

    fn release(&self, ticket: u64) {
        let mut shared = self.lock();

        if shared.watch.owner() == Some(ticket) {
            shared.watch = Watch::Idle;
        }
    }
}

impl<T> Shared<T> {
    fn is_closed(&self) -> bool {
        match self.watch {
            Watch::Closed => true,
            _ => false,
        }
    }

    fn is_full(&self) -> bool {
        match self.capacity {
            Some(capacity) => self.buffer.len() >= capacity,
            None => false,
        }
    }

    fn pop(&mut self) -> Option<T> {
        let msg = self.buffer.pop_front()?;
        if !self.is_closed() {
            self.watch = Watch::Idle;
        }
        Some(msg)
    }

    // Hands the parked consumer its turn; the caller wakes it once the lock
    // is released.
    fn notify_waiter(&mut self) -> Option<Waker> {
        match mem::replace(&mut self.watch, Watch::Idle) {
            Watch::Waiting { ticket, waker } => {
                self.watch = Watch::Notified { ticket };
                Some(waker)
            }
            other => {
                self.watch = other;
                None
            }
        }
    }
}

impl Watch {
    fn owner(&self) -> Option<u64> {
        match *self {
            Watch::Waiting { ticket, .. } | Watch::Notified { ticket } => Some(ticket),
            _ => None,
        }
    }
}

fn wake_all(wakers: FnvHashMap<u64, Waker>) {
    for (_, waker) in wakers {
        waker.wake();
    }
}

impl<T> Future for Recv<'_, T> {
    type Output = Result<T, RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        assert!(!this.done, "`Recv` polled after completion");

        let res = this.queue.poll_recv(cx, &mut this.ticket);
        if res.is_ready() {
            this.done = true;
        }
        res
    }
}

impl<T> Future for SendWait<'_, T> {
    type Output = Result<(), SendError<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        this.queue.poll_send(cx, &mut this.msg, &mut this.ticket)
    }
}

// The message is moved out by value and never pinned.
impl<T> Unpin for SendWait<'_, T> {}

impl<T> Drop for SendWait<'_, T> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket {
            self.queue.release_sender(ticket);
        }
    }
}

impl<T> Drop for Recv<'_, T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        if let Some(ticket) = self.ticket {
            self.queue.release(ticket);
        }
    }
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        MessageQueue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        MessageQueue::new()
    }
}

impl<T> fmt::Debug for MessageQueue<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let shared = self.lock();
        fmt.debug_struct("MessageQueue")
            .field("len", &shared.buffer.len())
            .field("capacity", &shared.capacity)
            .field("watch", &shared.watch)
            .finish()
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Watch::Idle => fmt.write_str("Idle"),
            Watch::Waiting { ticket, .. } => write!(fmt, "Waiting({})", ticket),
            Watch::Notified { ticket } => write!(fmt, "Notified({})", ticket),
            Watch::Closed => fmt.write_str("Closed"),
        }
    }
}

impl<T> fmt::Debug for SendWait<'_, T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("SendWait")
            .field("ticket", &self.ticket)
            .field("parked", &self.msg.is_some())
            .finish()
    }
}

impl<T> fmt::Debug for Recv<'_, T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Recv")
            .field("ticket", &self.ticket)
            .field("done", &self.done)
            .finish()
    }
}

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SendError::Full(msg) | SendError::Closed(msg) => msg,
        }
    }

    pub fn is_full(&self) -> bool {
        match *self {
            SendError::Full(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RecvError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            RecvError::ConcurrentAccess => "queue can only be watched by one task at a time",
            RecvError::Closed => "queue closed",
        })
    }
}

impl error::Error for RecvError {}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SendError::Full(_) => fmt.write_str("Full(..)"),
            SendError::Closed(_) => fmt.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            SendError::Full(_) => "queue full",
            SendError::Closed(_) => "queue closed",
        })
    }
}

impl<T> error::Error for SendError<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::task::noop_waker;

    fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn delivers_in_send_order() {
        let queue = MessageQueue::new();
        queue.send("a").unwrap();
        queue.send("b").unwrap();
        queue.send("c").unwrap();

        let mut got = Vec::new();
        for _ in 0..3 {
            match poll_once(&mut queue.recv()) {
                Poll::Ready(Ok(msg)) => got.push(msg),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(got, ["a", "b", "c"]);
    }

    #[test]
    fn second_waiter_is_rejected() {
        let queue = MessageQueue::<u32>::new();

        let mut first = queue.recv();
        assert!(poll_once(&mut first).is_pending());

        let mut second = queue.recv();
        assert_eq!(
            poll_once(&mut second),
            Poll::Ready(Err(RecvError::ConcurrentAccess))
        );
        drop(second);

        queue.send(7).unwrap();
        assert_eq!(poll_once(&mut first), Poll::Ready(Ok(7)));
    }

    #[test]
    fn notified_waiter_keeps_its_turn() {
        let queue = MessageQueue::new();

        let mut first = queue.recv();
        assert!(poll_once(&mut first).is_pending());
        queue.send(1).unwrap();

        assert_eq!(queue.try_recv(), Err(RecvError::ConcurrentAccess));
        assert_eq!(poll_once(&mut first), Poll::Ready(Ok(1)));
        assert_eq!(queue.try_recv(), Ok(None));
    }

    #[test]
    fn dropping_a_waiter_frees_the_slot() {
        let queue = MessageQueue::new();

        let mut first = queue.recv();
        assert!(poll_once(&mut first).is_pending());
        drop(first);

        queue.send(3).unwrap();
        assert_eq!(poll_once(&mut queue.recv()), Poll::Ready(Ok(3)));
    }

    #[test]
    fn close_drains_then_fails() {
        let queue = MessageQueue::new();
        queue.send(1).unwrap();
        queue.close();

        assert!(queue.send(2).unwrap_err().into_inner() == 2);
        assert_eq!(poll_once(&mut queue.recv()), Poll::Ready(Ok(1)));
        assert_eq!(
            poll_once(&mut queue.recv()),
            Poll::Ready(Err(RecvError::Closed))
        );
    }

    #[test]
    fn close_releases_parked_consumer() {
        let queue = MessageQueue::<()>::new();

        let mut waiting = queue.recv();
        assert!(poll_once(&mut waiting).is_pending());

        queue.close();
        assert_eq!(poll_once(&mut waiting), Poll::Ready(Err(RecvError::Closed)));
    }

    #[test]
    fn bounded_queue_fails_fast_when_full() {
        let queue = MessageQueue::bounded(1);
        queue.send(1).unwrap();

        let err = queue.send(2).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn send_wait_parks_until_room() {
        let queue = MessageQueue::bounded(1);
        queue.send(1).unwrap();

        let mut pending = queue.send_wait(2);
        assert!(poll_once(&mut pending).is_pending());

        assert_eq!(queue.try_recv(), Ok(Some(1)));
        assert_eq!(poll_once(&mut pending), Poll::Ready(Ok(())));
        assert_eq!(queue.try_recv(), Ok(Some(2)));
    }

    #[test]
    fn repolled_producer_holds_one_slot() {
        let queue = MessageQueue::bounded(1);
        queue.send(1).unwrap();

        let mut pending = queue.send_wait(2);
        for _ in 0..10_000 {
            assert!(poll_once(&mut pending).is_pending());
        }
        assert_eq!(queue.lock().blocked_senders.len(), 1);

        let mut other = queue.send_wait(3);
        assert!(poll_once(&mut other).is_pending());
        assert_eq!(queue.lock().blocked_senders.len(), 2);

        drop(pending);
        drop(other);
        assert!(queue.lock().blocked_senders.is_empty());
        assert_eq!(queue.try_recv(), Ok(Some(1)));
    }

    #[test]
    fn close_fails_parked_producer() {
        let queue = MessageQueue::bounded(1);
        queue.send(1).unwrap();

        let mut pending = queue.send_wait(2);
        assert!(poll_once(&mut pending).is_pending());

        queue.close();
        match poll_once(&mut pending) {
            Poll::Ready(Err(SendError::Closed(2))) => {}
            _ => panic!("producer should see the queue closed"),
        }
        drop(pending);
        assert!(queue.lock().blocked_senders.is_empty());
    }
}
