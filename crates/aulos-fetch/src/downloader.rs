//! The producer/consumer engine: a pool of segment-fetch workers feeding a
//! bounded, offset-ordered ready queue that a single reader drains into the
//! client-facing pipe.

use std::{sync::Arc, time::Duration};

use aulos_net::{HttpClient, Net, NetError, RangeSpec};
use aulos_pipe::PipeWriter;
use bytes::Bytes;
use http::StatusCode;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, trace, warn};

use crate::{
    chunk::Chunk,
    error::{FetchError, FetchResult},
    session::DownloadSession,
};

/// Reader gives up when no chunk arrives for this long.
const READER_TIMEOUT: Duration = Duration::from_secs(10);
/// Poll cadence while waiting for a dequeued chunk's payload.
const PAYLOAD_POLL: Duration = Duration::from_millis(50);
/// Pause between backpressure re-checks.
const BACKPRESSURE_PAUSE: Duration = Duration::from_secs(1);
/// Pause between segment fetch attempts.
const RETRY_PAUSE: Duration = Duration::from_secs(1);
/// Idle timeout that bounds the teardown drain.
const DRAIN_IDLE: Duration = Duration::from_secs(1);

const FETCH_ATTEMPTS: u32 = 5;
const FETCH_ATTEMPTS_BIASED: u32 = 7;
const BIAS_WINDOW: u64 = 1024 * 1024;

/// Drive one session to completion, filling `sink` in offset order.
///
/// Spawns the planned workers, runs the ordered reader, and on any exit
/// path stops the session, drains the ready queue and closes the sink.
/// Worker tasks are detached; they observe the stopped flag at their next
/// suspension point.
pub async fn run(
    session: Arc<DownloadSession>,
    mut rx: mpsc::Receiver<Arc<Chunk>>,
    net: HttpClient,
    sink: PipeWriter,
) -> FetchResult<()> {
    let workers = session.config.params.planned_workers;
    debug!(
        url = %session.config.url,
        range_start = session.config.range_start,
        range_end = session.config.range_end,
        chunk_size = session.config.params.chunk_size,
        workers,
        "segmented download starting"
    );

    for worker in 0..workers {
        let session = Arc::clone(&session);
        let net = net.clone();
        tokio::spawn(worker_loop(session, net, worker));
    }

    let outcome = read_loop(&session, &mut rx, &sink).await;

    session.stop();
    sink.close();
    drain(&mut rx).await;

    match &outcome {
        Ok(()) => debug!(
            url = %session.config.url,
            bytes = session.current_offset() - session.config.range_start,
            "segmented download complete"
        ),
        Err(err) => debug!(url = %session.config.url, error = %err, "segmented download ended early"),
    }
    outcome
}

/// Single consumer: pops chunks in plan order, waits for their payloads and
/// forwards them downstream.
async fn read_loop(
    session: &DownloadSession,
    rx: &mut mpsc::Receiver<Arc<Chunk>>,
    sink: &PipeWriter,
) -> FetchResult<()> {
    loop {
        if session.current_offset() > session.config.range_end {
            return Ok(());
        }

        let chunk = match timeout(READER_TIMEOUT, rx.recv()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Err(FetchError::Aborted),
            Err(_) => {
                debug!("timed out waiting for the next planned chunk");
                return Err(FetchError::Aborted);
            }
        };

        let payload = loop {
            if !session.is_running() {
                return Err(FetchError::Aborted);
            }
            if let Some(payload) = chunk.take() {
                break payload;
            }
            tokio::time::sleep(PAYLOAD_POLL).await;
        };

        session.advance_offset(payload.len() as u64);
        trace!(
            start = chunk.start(),
            len = payload.len(),
            offset = session.current_offset(),
            "chunk forwarded"
        );

        if sink.write(payload).await.is_err() {
            debug!("downstream pipe closed, aborting session");
            return Err(FetchError::Aborted);
        }
    }
}

/// Release whatever the workers still had queued at teardown.
async fn drain(rx: &mut mpsc::Receiver<Arc<Chunk>>) {
    while let Ok(Some(chunk)) = timeout(DRAIN_IDLE, rx.recv()).await {
        drop(chunk.take());
    }
}

async fn worker_loop(session: Arc<DownloadSession>, net: HttpClient, worker: u64) {
    while session.is_running() {
        let Some(chunk) = session.plan_next() else {
            trace!(worker, "range fully planned, worker exiting");
            break;
        };

        // Too much unconsumed data: pause before fetching to keep the
        // in-flight payload bytes under the session budget.
        while session.is_running() && session.queued_bytes() >= session.buffer_budget() {
            trace!(
                worker,
                queued = session.queued_bytes(),
                budget = session.buffer_budget(),
                "ready queue at capacity, pausing"
            );
            tokio::time::sleep(BACKPRESSURE_PAUSE).await;
        }
        if !session.is_running() {
            break;
        }

        if !fetch_chunk(&session, &net, &chunk, worker).await {
            session.stop();
            break;
        }
    }
}

/// Fetch one chunk into its slot. `false` means the session cannot continue.
async fn fetch_chunk(
    session: &DownloadSession,
    net: &HttpClient,
    chunk: &Chunk,
    worker: u64,
) -> bool {
    let attempts = if first_window_bias(chunk.start(), session.config.range_end) {
        FETCH_ATTEMPTS_BIASED
    } else {
        FETCH_ATTEMPTS
    };
    let range = RangeSpec::new(chunk.start(), Some(chunk.end()));

    for attempt in 0..attempts {
        if !session.is_running() {
            return false;
        }

        let sent = net
            .get_ranged(
                session.config.url.clone(),
                range.clone(),
                Some(session.config.headers.clone()),
            )
            .await;

        match sent {
            Ok(resp) => {
                match window_payload(&resp.body, resp.status, chunk.span_len()) {
                    Some(payload) => {
                        chunk.fill(payload);
                        return true;
                    }
                    None => {
                        // Short or oversized body without a 206: likely a
                        // transient truncation, worth another attempt.
                        warn!(
                            worker,
                            attempt,
                            start = chunk.start(),
                            end = chunk.end(),
                            status = resp.status.as_u16(),
                            got = resp.body.len(),
                            "segment response does not match the requested window"
                        );
                    }
                }
            }
            Err(NetError::HttpStatus { status, .. }) => {
                warn!(
                    worker,
                    start = chunk.start(),
                    end = chunk.end(),
                    status,
                    "upstream refused a segment, stopping session"
                );
                return false;
            }
            Err(err) => {
                warn!(
                    worker,
                    attempt,
                    start = chunk.start(),
                    end = chunk.end(),
                    error = %err,
                    "segment fetch attempt failed"
                );
            }
        }

        tokio::time::sleep(RETRY_PAUSE).await;
    }

    warn!(
        worker,
        start = chunk.start(),
        end = chunk.end(),
        attempts,
        "segment fetch attempts exhausted"
    );
    false
}

/// Extract exactly the requested window from a segment response body.
///
/// A 206 body is the window itself. Any other 2xx is accepted when the body
/// length matches the window, or covers it from offset zero (an upstream
/// that ignored `Range` on a small resource).
fn window_payload(body: &Bytes, status: StatusCode, span_len: u64) -> Option<Bytes> {
    let body_len = body.len() as u64;
    if status == StatusCode::PARTIAL_CONTENT {
        if body_len >= span_len {
            return Some(body.slice(0..span_len as usize));
        }
        return None;
    }
    if body_len == span_len {
        return Some(body.clone());
    }
    None
}

/// Extra attempts for the start of the resource, where a stalled fetch is
/// most visible as time-to-first-byte.
fn first_window_bias(start: u64, range_end: u64) -> bool {
    start < BIAS_WINDOW || (range_end > 0 && (range_end - start) / range_end * 1000 < 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_applies_below_one_mebibyte() {
        assert!(first_window_bias(0, 0));
        assert!(first_window_bias(BIAS_WINDOW - 1, 10 * BIAS_WINDOW));
    }

    #[test]
    fn bias_guards_zero_range_end() {
        // A zero range_end must not divide by zero and is never classified
        // as first-window once past the absolute threshold.
        assert!(first_window_bias(0, 0));
        assert!(!first_window_bias(2 * BIAS_WINDOW, 0));
    }

    #[test]
    fn window_payload_slices_oversized_206() {
        let body = Bytes::from_static(b"0123456789");
        let payload = window_payload(&body, StatusCode::PARTIAL_CONTENT, 4).unwrap();
        assert_eq!(payload.as_ref(), b"0123");
    }

    #[test]
    fn window_payload_rejects_short_bodies() {
        let body = Bytes::from_static(b"01");
        assert!(window_payload(&body, StatusCode::PARTIAL_CONTENT, 4).is_none());
        assert!(window_payload(&body, StatusCode::OK, 4).is_none());
    }

    #[test]
    fn window_payload_accepts_exact_200() {
        let body = Bytes::from_static(b"0123");
        let payload = window_payload(&body, StatusCode::OK, 4).unwrap();
        assert_eq!(payload.as_ref(), b"0123");
    }
}
