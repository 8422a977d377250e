use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::sleep;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::DurabilityLevel;
use crate::metrics::DURABILITY_WAIT_HISTOGRAM;
use crate::network::RoundTripError;
use crate::protocol::Observation;
use crate::protocol::Request;
use crate::protocol::Response;
use crate::protocol::Status;
use crate::client::ClientInner;
use crate::utils::time::Deadline;
use crate::Cas;
use crate::Error;
use crate::MutationToken;
use crate::OperationKind;
use crate::Result;

/// Nodes holding a mutation, as counted from one observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Online nodes holding the mutation in memory
    pub replicated: usize,
    /// Online nodes that wrote it to disk
    pub persisted: usize,
}

/// Verdict on a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityState {
    Satisfied(Progress),
    Pending(Progress),
    /// Not enough nodes are online to ever reach the level
    Impossible { required: usize, available: usize },
    /// The partition failed over since the write; it may have been rolled back
    RolledBack { current_uuid: u64 },
}

/// Successful durability wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurabilitySatisfied {
    pub level: DurabilityLevel,
    pub progress: Progress,
    pub polls: u32,
}

/// Decides whether `observation` satisfies `level` for the mutation
/// identified by `token`.
///
/// Offline nodes never count towards acknowledgement. A node that holds a
/// later seqno holds this mutation too.
pub fn evaluate(
    level: DurabilityLevel,
    token: &MutationToken,
    observation: &Observation,
) -> DurabilityState {
    let total = observation.nodes.len();
    let required = level.required_acks(total);
    let online = observation.nodes.iter().filter(|n| n.online).count();
    if online < required {
        return DurabilityState::Impossible {
            required,
            available: online,
        };
    }

    if observation.partition_uuid != token.partition_uuid {
        return DurabilityState::RolledBack {
            current_uuid: observation.partition_uuid,
        };
    }

    let mut progress = Progress::default();
    for node in observation.nodes.iter().filter(|n| n.online) {
        if node.replicated_seqno >= token.seqno {
            progress.replicated += 1;
        }
        if node.persisted_seqno >= token.seqno {
            progress.persisted += 1;
        }
    }

    let acked = if level.requires_persistence() {
        progress.persisted
    } else {
        progress.replicated
    };
    if acked >= required {
        DurabilityState::Satisfied(progress)
    } else {
        DurabilityState::Pending(progress)
    }
}

/// Polls partition progress until a mutation reaches its durability level.
#[derive(Clone)]
pub struct DurabilityTracker {
    inner: Arc<ArcSwap<ClientInner>>,
}

impl DurabilityTracker {
    pub(crate) fn new(inner: Arc<ArcSwap<ClientInner>>) -> Self {
        Self { inner }
    }

    /// Waits until the mutation behind `token` satisfies `level`.
    ///
    /// # Errors
    /// - [`Error::DurabilityImpossible`] when too few nodes are online
    /// - [`Error::AmbiguousOutcome`] when the partition failed over meanwhile
    ///   or an observe reply could not be used
    /// - [`Error::DurabilityTimeout`] when `timeout` passes first; the write
    ///   itself is not rolled back
    pub async fn await_durability(
        &self,
        key: &str,
        cas: Cas,
        token: MutationToken,
        level: DurabilityLevel,
        timeout: Duration,
    ) -> Result<DurabilitySatisfied> {
        if level == DurabilityLevel::None {
            return Ok(DurabilitySatisfied {
                level,
                progress: Progress::default(),
                polls: 0,
            });
        }

        let inner = self.inner.load_full();
        let config = inner.config.durability;
        let deadline = Deadline::after(timeout);
        let _wait = DURABILITY_WAIT_HISTOGRAM
            .with_label_values(&[level.as_str()])
            .start_timer();

        let mut interval = config.poll_interval();
        let mut progress = Progress::default();
        let mut polls = 0;

        loop {
            polls += 1;
            let attempt_timeout = deadline.cap(config.observe_timeout()).max(Duration::from_millis(1));
            let request = Request::Observe {
                partition_id: token.partition_id,
            };

            match inner.channel.round_trip(request, attempt_timeout).await {
                Ok(frame) => match (frame.status, frame.body) {
                    (Status::Success, Response::Observe(observation)) => {
                        match evaluate(level, &token, &observation) {
                            DurabilityState::Satisfied(p) => {
                                debug!(
                                    "[:DurabilityTracker:await] {} {} satisfied after {} polls: {:?}",
                                    key,
                                    level.as_str(),
                                    polls,
                                    p
                                );
                                return Ok(DurabilitySatisfied {
                                    level,
                                    progress: p,
                                    polls,
                                });
                            }
                            DurabilityState::Pending(p) => {
                                trace!("[:DurabilityTracker:await] {} pending: {:?}", key, p);
                                progress = p;
                            }
                            DurabilityState::Impossible { required, available } => {
                                warn!(
                                    "[:DurabilityTracker:await] {} {} impossible: {} of {} required nodes online",
                                    key,
                                    level.as_str(),
                                    available,
                                    required
                                );
                                return Err(Error::DurabilityImpossible {
                                    key: key.to_string(),
                                    cas,
                                    level,
                                    required,
                                    available,
                                });
                            }
                            DurabilityState::RolledBack { current_uuid } => {
                                warn!(
                                    "[:DurabilityTracker:await] {} partition {} failed over ({:#x} -> {:#x})",
                                    key, token.partition_id, token.partition_uuid, current_uuid
                                );
                                return Err(Error::AmbiguousOutcome {
                                    key: key.to_string(),
                                    op: OperationKind::Observe,
                                    cas: Some(cas),
                                    level,
                                    reason: format!(
                                        "partition {} failed over after the write; it may have been rolled back",
                                        token.partition_id
                                    ),
                                });
                            }
                        }
                    }
                    (status, _) => {
                        debug!("[:DurabilityTracker:await] observe returned {:?}", status);
                    }
                },
                // observe is idempotent, keep polling until the deadline
                Err(RoundTripError::Transport(e)) => {
                    debug!("[:DurabilityTracker:await] observe failed: {}", e);
                }
                // the write already landed; the caller must learn that much
                Err(RoundTripError::Frame(e)) => {
                    warn!("[:DurabilityTracker:await] {} observe reply unusable: {}", key, e);
                    return Err(Error::AmbiguousOutcome {
                        key: key.to_string(),
                        op: OperationKind::Observe,
                        cas: Some(cas),
                        level,
                        reason: format!("write applied but durability could not be tracked: {e}"),
                    });
                }
            }

            if deadline.is_expired() {
                warn!(
                    "[:DurabilityTracker:await] {} {} not confirmed within {:?}: {:?}",
                    key,
                    level.as_str(),
                    timeout,
                    progress
                );
                return Err(Error::DurabilityTimeout {
                    key: key.to_string(),
                    cas,
                    level,
                    timeout,
                    replicated: progress.replicated,
                    persisted: progress.persisted,
                });
            }

            sleep(deadline.cap(interval)).await;
            interval = (interval * 2).min(config.max_poll_interval());
        }
    }
}
