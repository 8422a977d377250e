use tokio::time::sleep;
use tracing::debug;
use tracing::warn;

use super::OperationRequest;
use crate::metrics::AMBIGUOUS_OUTCOME_COUNTER;
use crate::metrics::TRANSPORT_RETRY_COUNTER;
use crate::network::RequestChannel;
use crate::network::RoundTripError;
use crate::protocol::ResponseFrame;
use crate::protocol::Status;
use crate::utils::time::Deadline;
use crate::BackoffPolicy;
use crate::Error;
use crate::Result;
use crate::TransportError;

/// Sends `request` until the store answers, the attempts run out or the
/// deadline passes.
///
/// Failures that prove the store never saw the request are retried for
/// every operation. A failure after which the request may have been applied
/// is retried only for idempotent operations; writes surface it as
/// [`Error::AmbiguousOutcome`] so they are never applied twice.
pub(crate) async fn send_with_retry(
    channel: &RequestChannel,
    policy: &BackoffPolicy,
    request: &OperationRequest,
    deadline: &Deadline,
) -> Result<ResponseFrame> {
    let op = request.kind;
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < policy.max_attempts && !deadline.is_expired() {
        attempts += 1;
        debug!("[:Dispatcher:{}] {} attempt {} of {}", op, request.key, attempts, policy.max_attempts);

        let attempt_timeout = deadline.cap(policy.attempt_timeout());
        match channel.round_trip(request.to_wire(), attempt_timeout).await {
            Ok(frame) if frame.status == Status::TemporaryFailure => {
                last_error = Some(TransportError::TemporaryFailure);
            }
            Ok(frame) => return Ok(frame),
            Err(RoundTripError::Frame(e)) => return Err(e),
            Err(RoundTripError::Transport(e)) => {
                if e.request_may_have_been_applied() && !op.is_idempotent() {
                    warn!("[:Dispatcher:{}] {} outcome unknown: {}", op, request.key, e);
                    AMBIGUOUS_OUTCOME_COUNTER.with_label_values(&[op.as_str()]).inc();
                    return Err(Error::AmbiguousOutcome {
                        key: request.key.clone(),
                        op,
                        cas: request.cas,
                        level: request.durability,
                        reason: e.to_string(),
                    });
                }
                last_error = Some(e);
            }
        }

        if attempts < policy.max_attempts && !deadline.is_expired() {
            let delay = deadline.cap(policy.delay_for(attempts));
            debug!("[:Dispatcher:{}] retrying {} in {:?}", op, request.key, delay);
            TRANSPORT_RETRY_COUNTER.with_label_values(&[op.as_str()]).inc();
            sleep(delay).await;
        }
    }

    if deadline.is_expired() {
        warn!("[:Dispatcher:{}] {} timed out after {} attempts", op, request.key, attempts);
        return Err(Error::Timeout {
            key: request.key.clone(),
            op,
            elapsed: deadline.elapsed(),
        });
    }

    warn!("[:Dispatcher:{}] {} failed after {} attempts", op, request.key, attempts);
    Err(Error::Transport {
        key: request.key.clone(),
        op,
        attempts,
        source: last_error.unwrap_or(TransportError::TimedOut { sent: false }),
    })
}
