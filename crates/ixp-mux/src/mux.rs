use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use bytes::Bytes;
use ixp_frame::{FrameReader, FrameWriter};
use ixp_transport::Connection;
use tracing::{debug, error, info, warn};

use crate::config::{self, MuxConfig};
use crate::error::{MuxError, Result};
use crate::pending::{Completion, Pending};
use crate::tags::{self, TagPool};
use crate::worker::{self, RecvSignal, SendTask, Submission};

/// A response frame as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub type_code: u8,
    pub body: Bytes,
}

/// How a request is correlated with its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Draw a tag from the pool; responses may arrive in any order.
    #[default]
    Tagged,
    /// Use [`Multiplexer::NOTAG`]; responses arrive in submission order.
    Sequential,
}

/// Multiplexer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Accepting requests.
    Running,
    /// Graceful shutdown in progress: no new requests, queued ones still
    /// being written and answered.
    Draining,
    /// Terminated. Every request has been resolved.
    Closed,
}

/// State shared between the handle and both workers.
pub(crate) struct Shared {
    lifecycle: Mutex<Lifecycle>,
    pub(crate) tags: TagPool,
    pub(crate) pending: Pending,
    conn: Connection,
}

struct Lifecycle {
    state: State,
    close_error: Option<MuxError>,
    send_tx: Option<Sender<SendTask>>,
    recv_tx: Option<Sender<RecvSignal>>,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lifecycle().state == State::Closed
    }

    /// The error the multiplexer was closed with, once closed.
    pub(crate) fn close_error(&self) -> Option<MuxError> {
        self.lifecycle().close_error.clone()
    }

    /// Tear the connection down and fail everything still pending with
    /// `err`.
    ///
    /// Only the first call has any effect; returns whether this call was
    /// it. Callbacks run on the calling thread before this returns.
    pub(crate) fn terminate(&self, err: MuxError) -> bool {
        {
            let mut life = self.lifecycle();
            if life.state == State::Closed {
                return false;
            }
            life.state = State::Closed;
            life.close_error = Some(err.clone());
            if let Some(tx) = life.send_tx.take() {
                let _ = tx.send(SendTask::Stop);
            }
            if let Some(tx) = life.recv_tx.take() {
                let _ = tx.send(RecvSignal::Stop);
            }
        }

        if let Err(e) = self.conn.shutdown() {
            warn!(error = %e, "connection shutdown failed");
        }
        self.tags.close();

        let cancelled = self.pending.close(err.clone());
        if !cancelled.is_empty() {
            warn!(count = cancelled.len(), reason = %err, "failing pending requests");
        }
        for completion in cancelled {
            completion.resolve(Err(err.clone()));
        }
        true
    }
}

struct Workers {
    send: Option<JoinHandle<()>>,
    recv: Option<JoinHandle<()>>,
}

/// Multiplexes concurrent requests over one connection.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. Dropping the
/// multiplexer closes it.
///
/// Callbacks run on the receive worker (or on whichever thread closes the
/// multiplexer) and must not block on another response from the same
/// multiplexer. Calling [`close`](Multiplexer::close) from inside a callback
/// is allowed.
///
/// ```no_run
/// use ixp_mux::{Dispatch, Multiplexer, MuxConfig};
///
/// # fn main() -> ixp_mux::Result<()> {
/// let mux = Multiplexer::connect("tcp!localhost!564", MuxConfig::default())?;
/// let tversion = &b"\x00\x20\x00\x00\x06\x009P2000"[..];
/// let response = mux.request(100, tversion, Dispatch::Sequential)?;
/// println!("{} bytes back", response.body.len());
/// mux.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Multiplexer {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
    worker_threads: [ThreadId; 2],
}

impl Multiplexer {
    /// Tag reserved for sequential requests.
    pub const NOTAG: u16 = tags::NOTAG;
    pub const DEFAULT_MAX_TAGS: u16 = config::DEFAULT_MAX_TAGS;
    pub const MAX_TAGS: u16 = config::MAX_TAGS;

    /// Take ownership of a connected stream and start both workers.
    pub fn new(conn: impl Into<Connection>, config: MuxConfig) -> Result<Self> {
        config.validate()?;
        let conn = conn.into();

        let reader = FrameReader::with_config(conn.try_clone()?, config.frame_config());
        let writer = FrameWriter::with_config(conn.try_clone()?, config.frame_config());

        let (send_tx, send_rx) = mpsc::channel();
        let (recv_tx, recv_rx) = mpsc::channel();

        let shared = Arc::new(Shared {
            lifecycle: Mutex::new(Lifecycle {
                state: State::Running,
                close_error: None,
                send_tx: Some(send_tx),
                recv_tx: Some(recv_tx.clone()),
            }),
            tags: TagPool::new(config.max_tags),
            pending: Pending::new(),
            conn,
        });

        let recv = spawn("ixp-mux-recv", {
            let shared = Arc::clone(&shared);
            move || worker::recv_loop(shared, recv_rx, reader)
        })?;
        let send = match spawn("ixp-mux-send", {
            let shared = Arc::clone(&shared);
            move || worker::send_loop(shared, send_rx, recv_tx, writer)
        }) {
            Ok(handle) => handle,
            Err(err) => {
                shared.terminate(err.clone());
                let _ = recv.join();
                return Err(err);
            }
        };

        info!(
            max_tags = config.max_tags,
            max_frame_size = config.max_frame_size,
            "multiplexer started"
        );

        Ok(Self {
            shared,
            worker_threads: [send.thread().id(), recv.thread().id()],
            workers: Mutex::new(Workers {
                send: Some(send),
                recv: Some(recv),
            }),
        })
    }

    /// Dial `address` (`unix!path` or `tcp!host!port`) and multiplex over it.
    pub fn connect(address: &str, config: MuxConfig) -> Result<Self> {
        let conn = Connection::dial(address)?;
        Self::new(conn, config)
    }

    /// Submit a request without waiting for its response.
    ///
    /// On `Ok`, exactly one of `on_success` or `on_error` will eventually
    /// run. On `Err` the request was not accepted and neither runs.
    pub fn request_async<S, E>(
        &self,
        type_code: u8,
        body: impl Into<Bytes>,
        dispatch: Dispatch,
        on_success: S,
        on_error: E,
    ) -> Result<()>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(MuxError) + Send + 'static,
    {
        self.submit(
            type_code,
            body.into(),
            dispatch,
            Completion::Callbacks {
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            },
        )
    }

    /// Submit a request and block until it resolves.
    ///
    /// Must not be called from inside a callback of this multiplexer.
    pub fn request(
        &self,
        type_code: u8,
        body: impl Into<Bytes>,
        dispatch: Dispatch,
    ) -> Result<Response> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(type_code, body.into(), dispatch, Completion::Channel(tx))?;
        rx.recv().unwrap_or(Err(MuxError::Closed))
    }

    /// Submit a request and await its response.
    #[cfg(feature = "async")]
    pub async fn call(
        &self,
        type_code: u8,
        body: impl Into<Bytes>,
        dispatch: Dispatch,
    ) -> Result<Response> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.submit(type_code, body.into(), dispatch, Completion::Oneshot(tx))?;
        rx.await.unwrap_or(Err(MuxError::Closed))
    }

    fn submit(
        &self,
        type_code: u8,
        body: Bytes,
        dispatch: Dispatch,
        completion: Completion,
    ) -> Result<()> {
        let life = self.shared.lifecycle();
        let Some(tx) = life.send_tx.as_ref().filter(|_| life.state == State::Running) else {
            return Err(MuxError::Closed);
        };
        debug!(type_code, size = body.len(), ?dispatch, "request queued");
        tx.send(SendTask::Request(Submission {
            type_code,
            body,
            dispatch,
            completion,
        }))
        .map_err(|_| MuxError::Closed)
    }

    /// Stop accepting requests, let everything already submitted be written
    /// and answered, then close.
    ///
    /// Blocks for as long as the peer takes to answer. Anything left once
    /// the workers stop fails with [`MuxError::Shutdown`]. Called from a
    /// callback, there is nothing to wait on and this closes immediately.
    pub fn shutdown(&self) -> Result<()> {
        if self.on_worker_thread() {
            warn!("shutdown from a multiplexer callback, closing without draining");
            self.shared.terminate(MuxError::Shutdown);
            return Ok(());
        }

        let recv_tx = {
            let mut life = self.shared.lifecycle();
            if life.state == State::Running {
                info!(pending = self.shared.pending.len(), "draining multiplexer");
                life.state = State::Draining;
                if let Some(tx) = life.send_tx.take() {
                    let _ = tx.send(SendTask::Stop);
                }
                life.recv_tx.take()
            } else {
                None
            }
        };

        {
            let mut workers = self.lock_workers();
            join(workers.send.take());
            if let Some(tx) = recv_tx {
                let _ = tx.send(RecvSignal::Stop);
            }
            join(workers.recv.take());
        }

        if self.shared.terminate(MuxError::Shutdown) {
            info!("multiplexer shut down");
        }
        Ok(())
    }

    /// Terminate immediately.
    ///
    /// Every pending request fails with `reason`, or [`MuxError::Closed`],
    /// before this returns.
    pub fn close(&self, reason: Option<MuxError>) {
        if self.shared.terminate(reason.unwrap_or(MuxError::Closed)) {
            info!("multiplexer closed");
        }
        self.join_workers();
    }

    pub fn state(&self) -> State {
        self.shared.lifecycle().state
    }

    /// Number of requests registered and awaiting a response.
    pub fn pending(&self) -> usize {
        self.shared.pending.len()
    }

    /// Number of tags currently free.
    pub fn available_tags(&self) -> usize {
        self.shared.tags.available()
    }

    fn on_worker_thread(&self) -> bool {
        self.worker_threads.contains(&thread::current().id())
    }

    fn lock_workers(&self) -> MutexGuard<'_, Workers> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_workers(&self) {
        // A worker cannot join itself.
        if self.on_worker_thread() {
            return;
        }
        let mut workers = self.lock_workers();
        join(workers.send.take());
        join(workers.recv.take());
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        if self.state() != State::Closed {
            self.close(None);
        } else {
            self.join_workers();
        }
    }
}

impl fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiplexer")
            .field("state", &self.state())
            .field("pending", &self.pending())
            .field("available_tags", &self.available_tags())
            .finish()
    }
}

fn spawn<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| MuxError::Transport(Arc::new(e)))
}

fn join(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            error!("multiplexer worker panicked");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ixp_frame::{Frame, FrameError};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn connected(config: MuxConfig) -> (Multiplexer, Connection) {
        let (client, server) = Connection::pair().unwrap();
        (Multiplexer::new(client, config).unwrap(), server)
    }

    /// Answers every frame with itself until the connection goes away.
    fn echo_peer(conn: Connection) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut reader = FrameReader::new(conn.try_clone().unwrap());
            let mut writer = FrameWriter::new(conn);
            while let Ok(frame) = reader.read_frame() {
                if writer.write_frame(&frame).is_err() {
                    break;
                }
            }
        })
    }

    fn peer_io(conn: Connection) -> (FrameReader<Connection>, FrameWriter<Connection>) {
        (FrameReader::new(conn.try_clone().unwrap()), FrameWriter::new(conn))
    }

    #[test]
    fn echo_roundtrip() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = echo_peer(server);

        let response = mux.request(1, "asdfghjkl", Dispatch::Tagged).unwrap();
        assert_eq!(
            response,
            Response {
                type_code: 1,
                body: Bytes::from_static(b"asdfghjkl"),
            }
        );

        let response = mux.request(100, "9P2000", Dispatch::Sequential).unwrap();
        assert_eq!(response.type_code, 100);
        assert_eq!(response.body.as_ref(), b"9P2000");

        mux.shutdown().unwrap();
        assert_eq!(mux.state(), State::Closed);
        peer.join().unwrap();
    }

    #[test]
    fn concurrent_callers_get_their_own_responses() {
        let (mux, server) = connected(MuxConfig::default().with_max_tags(4));
        let mux = Arc::new(mux);
        let peer = echo_peer(server);

        let callers: Vec<_> = (0..8)
            .map(|t| {
                let mux = Arc::clone(&mux);
                thread::spawn(move || {
                    for i in 0..25 {
                        let body = format!("caller-{t}-{i}");
                        let response = mux.request(7, body.clone(), Dispatch::Tagged).unwrap();
                        assert_eq!(response.body.as_ref(), body.as_bytes());
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }

        assert_eq!(mux.available_tags(), 4);
        mux.shutdown().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn tagged_responses_route_out_of_order() {
        let (mux, server) = connected(MuxConfig::default());
        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            mux.request_async(
                1,
                format!("req-{i}"),
                Dispatch::Tagged,
                move |r| tx.send((i, r)).unwrap(),
                |_| {},
            )
            .unwrap();
        }

        let (mut reader, mut writer) = peer_io(server);
        let frames: Vec<Frame> = (0..3).map(|_| reader.read_frame().unwrap()).collect();
        for frame in frames.iter().rev() {
            let reply = [b"re: ".as_ref(), frame.body.as_ref()].concat();
            writer.send(2, frame.tag, &reply).unwrap();
        }

        let order: Vec<usize> = (0..3)
            .map(|_| {
                let (i, response) = rx.recv_timeout(WAIT).unwrap();
                assert_eq!(response.type_code, 2);
                assert_eq!(response.body, Bytes::from(format!("re: req-{i}")));
                i
            })
            .collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn sequential_responses_resolve_in_submission_order() {
        let (mux, server) = connected(MuxConfig::default());
        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            mux.request_async(
                1,
                format!("seq-{i}"),
                Dispatch::Sequential,
                move |r| tx.send((i, r.body)).unwrap(),
                |_| {},
            )
            .unwrap();
        }

        let (mut reader, mut writer) = peer_io(server);
        for i in 0..3 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.tag, Multiplexer::NOTAG);
            assert_eq!(frame.body, Bytes::from(format!("seq-{i}")));
        }
        for i in 0..3 {
            writer
                .send(1, Multiplexer::NOTAG, format!("r{i}").as_bytes())
                .unwrap();
        }

        for i in 0..3 {
            let (which, body) = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(which, i);
            assert_eq!(body, Bytes::from(format!("r{i}")));
        }
        assert_eq!(mux.pending(), 0);
    }

    #[test]
    fn in_flight_tags_are_distinct_and_never_reserved() {
        let (mux, server) = connected(MuxConfig::default().with_max_tags(8));
        for _ in 0..8 {
            mux.request_async(1, "x", Dispatch::Tagged, |_| {}, |_| {})
                .unwrap();
        }

        let (mut reader, _writer) = peer_io(server);
        let tags: HashSet<u16> = (0..8).map(|_| reader.read_frame().unwrap().tag).collect();
        assert_eq!(tags.len(), 8);
        assert!(tags.iter().all(|&tag| (1..=8).contains(&tag)));

        assert_eq!(mux.available_tags(), 0);
        assert_eq!(mux.pending(), 8);
        mux.close(None);
        assert_eq!(mux.pending(), 0);
    }

    #[test]
    fn capacity_bounds_requests_in_flight() {
        let (client, server) = UnixStream::pair().unwrap();
        let mux = Multiplexer::new(client, MuxConfig::default().with_max_tags(2)).unwrap();

        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            mux.request_async(1, format!("{i}"), Dispatch::Tagged, move |_| tx.send(i).unwrap(), |_| {})
                .unwrap();
        }

        let mut reader = FrameReader::new(&server);
        let mut writer = FrameWriter::new(&server);
        let first = reader.read_frame().unwrap();
        let second = reader.read_frame().unwrap();

        // no free tag, so the third request stays queued
        server
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        assert!(matches!(reader.read_frame(), Err(FrameError::Io(_))));

        writer.write_frame(&first).unwrap();
        server.set_read_timeout(Some(WAIT)).unwrap();
        let third = reader.read_frame().unwrap();
        assert_eq!(third.tag, first.tag);
        assert_eq!(third.body.as_ref(), b"2");

        writer.write_frame(&second).unwrap();
        writer.write_frame(&third).unwrap();

        let mut done: Vec<i32> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        done.sort();
        assert_eq!(done, vec![0, 1, 2]);
    }

    #[test]
    fn close_fails_pending_before_returning() {
        let (mux, server) = connected(MuxConfig::default());
        let errors = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let errors = Arc::clone(&errors);
            mux.request_async(
                1,
                "never answered",
                Dispatch::Tagged,
                |_| panic!("unexpected response"),
                move |e| errors.lock().unwrap().push(e),
            )
            .unwrap();
        }

        let (mut reader, _writer) = peer_io(server);
        reader.read_frame().unwrap();
        reader.read_frame().unwrap();

        mux.close(None);

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, MuxError::Closed)));
        assert_eq!(mux.state(), State::Closed);
    }

    #[test]
    fn close_reason_is_delivered() {
        let (mux, _server) = connected(MuxConfig::default());
        let (tx, rx) = mpsc::channel();
        mux.request_async(1, "x", Dispatch::Sequential, |_| {}, move |e| {
            tx.send(e).unwrap()
        })
        .unwrap();

        mux.close(Some(MuxError::Config("going away".into())));

        let err = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(err, MuxError::Config(msg) if msg == "going away"));
    }

    #[test]
    fn requests_after_close_are_rejected() {
        let (mux, _server) = connected(MuxConfig::default());
        mux.close(None);

        let called = Arc::new(AtomicUsize::new(0));
        let (a, b) = (Arc::clone(&called), Arc::clone(&called));
        let err = mux
            .request_async(
                1,
                "late",
                Dispatch::Tagged,
                move |_| {
                    a.fetch_add(1, Ordering::SeqCst);
                },
                move |_| {
                    b.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap_err();
        assert!(matches!(err, MuxError::Closed));
        assert!(matches!(
            mux.request(1, "late", Dispatch::Sequential),
            Err(MuxError::Closed)
        ));
        assert_eq!(called.load(Ordering::SeqCst), 0);

        // closing again is harmless
        mux.close(None);
        mux.shutdown().unwrap();
    }

    #[test]
    fn shutdown_waits_for_submitted_requests() {
        let (mux, server) = connected(MuxConfig::default().with_max_tags(3));
        let peer = echo_peer(server);

        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..20 {
            let done = Arc::clone(&done);
            let dispatch = if i % 4 == 0 {
                Dispatch::Sequential
            } else {
                Dispatch::Tagged
            };
            mux.request_async(
                1,
                format!("{i}"),
                dispatch,
                move |_| {
                    done.fetch_add(1, Ordering::SeqCst);
                },
                |e| panic!("request failed: {e}"),
            )
            .unwrap();
        }

        mux.shutdown().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(mux.state(), State::Closed);
        assert!(matches!(
            mux.request(1, "late", Dispatch::Tagged),
            Err(MuxError::Closed)
        ));
        peer.join().unwrap();
    }

    #[test]
    fn peer_disconnect_fails_pending() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = thread::spawn(move || {
            let mut reader = FrameReader::new(server);
            reader.read_frame().unwrap();
        });

        let err = mux.request(1, "hello?", Dispatch::Tagged).unwrap_err();
        assert!(matches!(err, MuxError::Transport(_)), "got {err:?}");
        assert!(err.is_fatal());
        assert_eq!(mux.state(), State::Closed);
        peer.join().unwrap();
    }

    #[test]
    fn short_frame_from_peer_is_fatal() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = thread::spawn(move || {
            let mut raw = server.try_clone().unwrap();
            let mut reader = FrameReader::new(server);
            reader.read_frame().unwrap();
            raw.write_all(&[3, 0, 0, 0, 1, 1, 0]).unwrap();
            // hold the connection open until the client gives up on it
            let _ = reader.read_frame();
        });

        let err = mux.request(1, "x", Dispatch::Tagged).unwrap_err();
        match &err {
            MuxError::Framing(inner) => {
                assert!(matches!(**inner, FrameError::InvalidLength { length: 3, .. }))
            }
            other => panic!("expected framing error, got {other:?}"),
        }
        assert!(matches!(
            mux.request(1, "y", Dispatch::Tagged),
            Err(MuxError::Closed)
        ));
        peer.join().unwrap();
    }

    #[test]
    fn response_for_unknown_tag_is_fatal() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = thread::spawn(move || {
            let (mut reader, mut writer) = peer_io(server);
            let frame = reader.read_frame().unwrap();
            writer.send(frame.type_code, 77, b"stray").unwrap();
            let _ = reader.read_frame();
        });

        let err = mux.request(1, "x", Dispatch::Tagged).unwrap_err();
        assert!(matches!(err, MuxError::UnknownTag(77)));
        peer.join().unwrap();
    }

    #[test]
    fn panicking_callback_does_not_stop_the_receiver() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = echo_peer(server);

        mux.request_async(1, "first", Dispatch::Tagged, |_| panic!("boom"), |_| {})
            .unwrap();
        let response = mux.request(1, "second", Dispatch::Tagged).unwrap();
        assert_eq!(response.body.as_ref(), b"second");
        assert_eq!(mux.state(), State::Running);

        mux.shutdown().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn oversized_request_fails_alone() {
        let (mux, server) = connected(MuxConfig::default().with_max_frame_size(16));
        let peer = echo_peer(server);

        let err = mux.request(1, vec![0u8; 64], Dispatch::Tagged).unwrap_err();
        assert!(matches!(err, MuxError::Encoding(_)));
        assert!(!err.is_fatal());

        let response = mux.request(1, "ok", Dispatch::Tagged).unwrap();
        assert_eq!(response.body.as_ref(), b"ok");
        assert_eq!(mux.available_tags(), 1024);

        mux.shutdown().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn close_from_inside_a_callback() {
        let (mux, server) = connected(MuxConfig::default());
        let mux = Arc::new(mux);
        let peer = echo_peer(server);

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&mux);
        mux.request_async(
            1,
            "bye",
            Dispatch::Tagged,
            move |_| {
                inner.close(None);
                tx.send(inner.state()).unwrap();
            },
            |_| {},
        )
        .unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), State::Closed);
        mux.close(None);
        peer.join().unwrap();
    }

    #[test]
    fn shutdown_from_a_callback_fails_the_rest_with_shutdown() {
        let (mux, server) = connected(MuxConfig::default());
        let mux = Arc::new(mux);

        let (state_tx, state_rx) = mpsc::channel();
        let inner = Arc::clone(&mux);
        mux.request_async(
            1,
            "bye",
            Dispatch::Tagged,
            move |_| {
                inner.shutdown().unwrap();
                state_tx.send(inner.state()).unwrap();
            },
            |e| panic!("first request failed: {e}"),
        )
        .unwrap();

        let answered = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let (a, e) = (Arc::clone(&answered), Arc::clone(&errors));
        mux.request_async(
            1,
            "left hanging",
            Dispatch::Tagged,
            move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            },
            move |err| e.lock().unwrap().push(err),
        )
        .unwrap();

        // Both requests are on the wire before the first is answered.
        let (mut reader, mut writer) = peer_io(server);
        let first = reader.read_frame().unwrap();
        let second = reader.read_frame().unwrap();
        assert_eq!(second.body.as_ref(), b"left hanging");
        writer.send(2, first.tag, b"ok").unwrap();

        assert_eq!(state_rx.recv_timeout(WAIT).unwrap(), State::Closed);
        {
            let errors = errors.lock().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], MuxError::Shutdown));
        }
        assert_eq!(answered.load(Ordering::SeqCst), 0);

        mux.close(None);
        assert_eq!(mux.state(), State::Closed);
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (client, _server) = Connection::pair().unwrap();
        let err = Multiplexer::new(client, MuxConfig::default().with_max_tags(0)).unwrap_err();
        assert!(matches!(err, MuxError::Config(_)));
    }

    #[test]
    fn connect_rejects_bad_address() {
        let err = Multiplexer::connect("carrier-pigeon!coop", MuxConfig::default()).unwrap_err();
        assert!(matches!(err, MuxError::Connect(_)));
    }

    #[test]
    fn debug_shows_state() {
        let (mux, _server) = connected(MuxConfig::default().with_max_tags(2));
        let debug = format!("{mux:?}");
        assert!(debug.contains("Running"));
        assert!(debug.contains("available_tags: 2"));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn call_resolves_future() {
        let (mux, server) = connected(MuxConfig::default());
        let peer = echo_peer(server);

        let response = mux.call(3, "async", Dispatch::Tagged).await.unwrap();
        assert_eq!(response.body.as_ref(), b"async");

        mux.close(None);
        assert!(matches!(
            mux.call(3, "late", Dispatch::Tagged).await,
            Err(MuxError::Closed)
        ));
        peer.join().unwrap();
    }
}
