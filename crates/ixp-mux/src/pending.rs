//! Pending request table.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::error;

use crate::error::{MuxError, Result};
use crate::mux::Response;
use crate::tags::NOTAG;

pub(crate) type SuccessFn = Box<dyn FnOnce(Response) + Send + 'static>;
pub(crate) type ErrorFn = Box<dyn FnOnce(MuxError) + Send + 'static>;

/// How a request's outcome is delivered. Consumed on resolution, so each
/// request resolves at most once.
pub(crate) enum Completion {
    Callbacks {
        on_success: SuccessFn,
        on_error: ErrorFn,
    },
    Channel(SyncSender<Result<Response>>),
    #[cfg(feature = "async")]
    Oneshot(tokio::sync::oneshot::Sender<Result<Response>>),
}

impl Completion {
    /// Deliver the outcome.
    ///
    /// A panicking callback is logged and swallowed; it never reaches the
    /// worker that resolved it.
    pub(crate) fn resolve(self, outcome: Result<Response>) {
        match self {
            Completion::Callbacks {
                on_success,
                on_error,
            } => {
                let (which, result) = match outcome {
                    Ok(response) => (
                        "success",
                        panic::catch_unwind(AssertUnwindSafe(move || on_success(response))),
                    ),
                    Err(err) => (
                        "error",
                        panic::catch_unwind(AssertUnwindSafe(move || on_error(err))),
                    ),
                };
                if let Err(payload) = result {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(continuation = which, panic = %message, "request continuation panicked");
                }
            }
            // The receiver may have gone away; nothing left to tell.
            Completion::Channel(tx) => {
                let _ = tx.send(outcome);
            }
            #[cfg(feature = "async")]
            Completion::Oneshot(tx) => {
                let _ = tx.send(outcome);
            }
        }
    }
}

/// Requests written (or about to be written) and awaiting a response.
///
/// Tagged requests are keyed by tag; sequential requests queue in
/// submission order.
pub(crate) struct Pending {
    inner: Mutex<Table>,
}

#[derive(Default)]
struct Table {
    tagged: HashMap<u16, Completion>,
    sequential: VecDeque<Completion>,
    closed: Option<MuxError>,
}

impl Pending {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a completion under `tag`.
    ///
    /// Once the table is closed the completion is handed back together with
    /// the close error.
    pub(crate) fn register(
        &self,
        tag: u16,
        completion: Completion,
    ) -> std::result::Result<(), (Completion, MuxError)> {
        let mut table = self.lock();
        if let Some(err) = &table.closed {
            return Err((completion, err.clone()));
        }
        if tag == NOTAG {
            table.sequential.push_back(completion);
        } else {
            table.tagged.insert(tag, completion);
        }
        Ok(())
    }

    /// Remove the completion a response with `tag` belongs to.
    pub(crate) fn take(&self, tag: u16) -> Option<Completion> {
        let mut table = self.lock();
        if tag == NOTAG {
            table.sequential.pop_front()
        } else {
            table.tagged.remove(&tag)
        }
    }

    /// Close the table and hand back everything still pending.
    ///
    /// Later registrations fail with `err`. Only the first close takes
    /// effect.
    pub(crate) fn close(&self, err: MuxError) -> Vec<Completion> {
        let mut table = self.lock();
        if table.closed.is_none() {
            table.closed = Some(err);
        }
        let mut drained: Vec<Completion> = table.tagged.drain().map(|(_, c)| c).collect();
        drained.extend(table.sequential.drain(..));
        drained
    }

    pub(crate) fn len(&self) -> usize {
        let table = self.lock();
        table.tagged.len() + table.sequential.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;

    fn response(body: &'static str) -> Response {
        Response {
            type_code: 1,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Completion {
        let ok_log = Arc::clone(log);
        let err_log = Arc::clone(log);
        Completion::Callbacks {
            on_success: Box::new(move |r| {
                ok_log
                    .lock()
                    .unwrap()
                    .push(format!("{name}:ok:{}", String::from_utf8_lossy(&r.body)))
            }),
            on_error: Box::new(move |e| err_log.lock().unwrap().push(format!("{name}:err:{e}"))),
        }
    }

    #[test]
    fn tagged_lookup_by_tag() {
        let pending = Pending::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        pending.register(1, recording(&log, "a")).ok().unwrap();
        pending.register(2, recording(&log, "b")).ok().unwrap();
        assert_eq!(pending.len(), 2);

        pending.take(2).unwrap().resolve(Ok(response("two")));
        pending.take(1).unwrap().resolve(Ok(response("one")));
        assert!(pending.take(1).is_none());

        assert_eq!(*log.lock().unwrap(), vec!["b:ok:two", "a:ok:one"]);
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn sequential_is_fifo() {
        let pending = Pending::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            pending.register(NOTAG, recording(&log, name)).ok().unwrap();
        }

        for body in ["x", "y", "z"] {
            pending.take(NOTAG).unwrap().resolve(Ok(response(body)));
        }
        assert!(pending.take(NOTAG).is_none());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:ok:x", "second:ok:y", "third:ok:z"]
        );
    }

    #[test]
    fn close_drains_and_rejects_later_registrations() {
        let pending = Pending::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        pending.register(5, recording(&log, "a")).ok().unwrap();
        pending.register(NOTAG, recording(&log, "b")).ok().unwrap();

        let drained = pending.close(MuxError::Closed);
        assert_eq!(drained.len(), 2);
        for completion in drained {
            completion.resolve(Err(MuxError::Closed));
        }
        assert_eq!(log.lock().unwrap().len(), 2);

        let (completion, err) = pending
            .register(6, recording(&log, "late"))
            .err()
            .unwrap();
        assert!(matches!(err, MuxError::Closed));
        drop(completion);

        // first close wins
        pending.close(MuxError::Shutdown);
        let (_, err) = pending.register(7, recording(&log, "later")).err().unwrap();
        assert!(matches!(err, MuxError::Closed));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let completion = Completion::Callbacks {
            on_success: Box::new(|_| panic!("boom")),
            on_error: Box::new(|_| {}),
        };
        completion.resolve(Ok(response("x")));
    }

    #[test]
    fn channel_completion_delivers_once() {
        let (tx, rx) = mpsc::sync_channel(1);
        Completion::Channel(tx).resolve(Err(MuxError::Shutdown));
        assert!(matches!(rx.recv().unwrap(), Err(MuxError::Shutdown)));
        assert!(rx.recv().is_err());
    }
}
