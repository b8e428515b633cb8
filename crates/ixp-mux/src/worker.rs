//! Send and receive workers.
//!
//! The send worker is the only writer on the connection and the receive
//! worker the only reader. The send worker tells the receive worker about
//! each frame it writes, so the receive worker only reads while a response
//! is owed.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use bytes::Bytes;
use ixp_frame::{FrameReader, FrameWriter};
use ixp_transport::Connection;
use tracing::{debug, error, trace};

use crate::error::MuxError;
use crate::mux::{Dispatch, Response, Shared};
use crate::pending::Completion;
use crate::tags::NOTAG;

pub(crate) struct Submission {
    pub(crate) type_code: u8,
    pub(crate) body: Bytes,
    pub(crate) dispatch: Dispatch,
    pub(crate) completion: Completion,
}

pub(crate) enum SendTask {
    Request(Submission),
    Stop,
}

pub(crate) enum RecvSignal {
    /// One more response is owed.
    Expect,
    Stop,
}

pub(crate) fn send_loop(
    shared: Arc<Shared>,
    tasks: Receiver<SendTask>,
    expect: Sender<RecvSignal>,
    mut writer: FrameWriter<Connection>,
) {
    debug!("send worker started");
    while let Ok(SendTask::Request(submission)) = tasks.recv() {
        if let Err(err) = send_one(&shared, &mut writer, &expect, submission) {
            if !shared.is_closed() {
                error!(error = %err, "send failed");
            }
            shared.terminate(err);
        }
    }
    debug!("send worker stopped");
}

/// Frame and write one request. An `Err` is a connection fault; per-request
/// failures are delivered to the request itself.
fn send_one(
    shared: &Shared,
    writer: &mut FrameWriter<Connection>,
    expect: &Sender<RecvSignal>,
    submission: Submission,
) -> Result<(), MuxError> {
    let Submission {
        type_code,
        body,
        dispatch,
        completion,
    } = submission;

    if let Some(err) = shared.close_error() {
        completion.resolve(Err(err));
        return Ok(());
    }

    if let Err(err) = writer.check_body_len(body.len()) {
        debug!(type_code, size = body.len(), "request rejected: {err}");
        completion.resolve(Err(MuxError::Encoding(Arc::new(err))));
        return Ok(());
    }

    let tag = match dispatch {
        Dispatch::Sequential => NOTAG,
        Dispatch::Tagged => match shared.tags.acquire() {
            Some(tag) => tag,
            None => {
                completion.resolve(Err(shared.close_error().unwrap_or(MuxError::Closed)));
                return Ok(());
            }
        },
    };

    // Registered before writing: the response can arrive as soon as the
    // last byte leaves.
    if let Err((completion, err)) = shared.pending.register(tag, completion) {
        if tag != NOTAG {
            shared.tags.release(tag);
        }
        completion.resolve(Err(err));
        return Ok(());
    }

    writer.send(type_code, tag, &body)?;
    trace!(type_code, tag, size = body.len(), "request sent");

    // Receiver gone means the connection is already being torn down.
    let _ = expect.send(RecvSignal::Expect);
    Ok(())
}

pub(crate) fn recv_loop(
    shared: Arc<Shared>,
    signals: Receiver<RecvSignal>,
    mut reader: FrameReader<Connection>,
) {
    debug!("receive worker started");
    while let Ok(RecvSignal::Expect) = signals.recv() {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                if !shared.is_closed() {
                    error!(error = %err, "receive failed");
                    shared.terminate(MuxError::from(err));
                }
                break;
            }
        };
        trace!(
            type_code = frame.type_code,
            tag = frame.tag,
            size = frame.body.len(),
            "response received"
        );

        let Some(completion) = shared.pending.take(frame.tag) else {
            error!(tag = frame.tag, "response for unknown tag");
            shared.terminate(MuxError::UnknownTag(frame.tag));
            break;
        };
        if frame.tag != NOTAG {
            shared.tags.release(frame.tag);
        }
        completion.resolve(Ok(Response {
            type_code: frame.type_code,
            body: frame.body,
        }));
    }
    debug!("receive worker stopped");
}
