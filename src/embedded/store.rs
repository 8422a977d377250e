use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::trace;

use crate::constants::DEFAULT_PARTITION_COUNT;
use crate::constants::JSON_FLAGS;
use crate::constants::MAX_DOCUMENT_SIZE;
use crate::protocol::Observation;
use crate::protocol::Payload;
use crate::protocol::ReplicaState;
use crate::protocol::Request;
use crate::protocol::RequestFrame;
use crate::protocol::Response;
use crate::protocol::ResponseFrame;
use crate::protocol::Status;
use crate::protocol::StoreSemantics;
use crate::subdoc;
use crate::subdoc::LookupSpec;
use crate::subdoc::MutateSpec;
use crate::utils::cluster::partition_for_key;
use crate::utils::time::get_duration_since_epoch;
use crate::Cas;
use crate::Document;
use crate::MutationToken;

type Reply = std::result::Result<Response, Status>;

/// Shape of an [`EmbeddedStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub partition_count: u16,
    /// Copies besides the active one
    pub replicas: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            partition_count: DEFAULT_PARTITION_COUNT,
            replicas: 2,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    content: Bytes,
    flags: u32,
    cas: Cas,
    expires_at: Option<Instant>,
}

impl StoredDocument {
    fn is_expired(
        &self,
        now: Instant,
    ) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn remaining(
        &self,
        now: Instant,
    ) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

#[derive(Debug, Clone, Copy)]
struct NodeState {
    online: bool,
    persistence_stalled: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeProgress {
    replicated: u64,
    persisted: u64,
}

#[derive(Debug)]
struct PartitionState {
    uuid: u64,
    high_seqno: u64,
    /// Indexed by node id; node 0 holds the active copy
    progress: Vec<NodeProgress>,
}

/// Document store living inside the process.
///
/// Every node holds a copy of every partition. The active copy (node 0)
/// takes writes in memory at once; on each observe of a partition the
/// online replicas catch up in memory and every online copy persists what
/// it held at the previous observe. So `MajorityReplicated` is met on the
/// first poll and the persisted levels on the second.
pub struct EmbeddedStore {
    options: StoreOptions,
    documents: DashMap<String, StoredDocument>,
    cas_clock: AtomicU64,
    partitions: Vec<Mutex<PartitionState>>,
    nodes: RwLock<Vec<NodeState>>,
    pending_temp_failures: AtomicU32,
}

impl Default for EmbeddedStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl EmbeddedStore {
    pub fn new(options: StoreOptions) -> Self {
        let options = StoreOptions {
            partition_count: options.partition_count.max(1),
            ..options
        };
        let node_count = options.replicas + 1;
        let mut rng = rand::thread_rng();
        let partitions = (0..options.partition_count)
            .map(|_| {
                Mutex::new(PartitionState {
                    uuid: rng.gen_range(1..u64::MAX),
                    high_seqno: 0,
                    progress: vec![NodeProgress::default(); node_count],
                })
            })
            .collect();

        info!(
            "[:EmbeddedStore:new] {} partitions, {} nodes",
            options.partition_count, node_count
        );
        Self {
            options,
            documents: DashMap::new(),
            cas_clock: AtomicU64::new(get_duration_since_epoch().as_nanos() as u64),
            partitions,
            nodes: RwLock::new(vec![
                NodeState {
                    online: true,
                    persistence_stalled: false,
                };
                node_count
            ]),
            pending_temp_failures: AtomicU32::new(0),
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn node_count(&self) -> usize {
        self.options.replicas + 1
    }

    /// Takes a node offline or brings it back. Returns false for unknown ids.
    pub fn set_node_online(
        &self,
        node_id: u32,
        online: bool,
    ) -> bool {
        self.update_node(node_id, |node| node.online = online)
    }

    /// A stalled node keeps replicating but never persists.
    pub fn set_persistence_stalled(
        &self,
        node_id: u32,
        stalled: bool,
    ) -> bool {
        self.update_node(node_id, |node| node.persistence_stalled = stalled)
    }

    /// Gives the partition a new uuid, as a replica promotion would.
    pub fn failover(
        &self,
        partition_id: u16,
    ) -> Option<u64> {
        let mut partition = self.partitions.get(partition_id as usize)?.lock();
        let mut uuid = rand::thread_rng().gen_range(1..u64::MAX);
        while uuid == partition.uuid {
            uuid = rand::thread_rng().gen_range(1..u64::MAX);
        }
        info!(
            "[:EmbeddedStore:failover] partition {} uuid {:#x} -> {:#x}",
            partition_id, partition.uuid, uuid
        );
        partition.uuid = uuid;
        Some(uuid)
    }

    /// The next `count` key requests are refused with a temporary failure.
    pub fn inject_temporary_failures(
        &self,
        count: u32,
    ) {
        self.pending_temp_failures.store(count, Ordering::SeqCst);
    }

    /// Partition `key` lives in.
    pub fn partition_of(
        &self,
        key: &str,
    ) -> u16 {
        partition_for_key(key.as_bytes(), self.options.partition_count)
    }

    /// Current state of `key`, bypassing the wire.
    pub fn document(
        &self,
        key: &str,
    ) -> Option<Document> {
        let now = Instant::now();
        let stored = self.documents.get(key)?;
        if stored.is_expired(now) {
            return None;
        }
        Some(Document {
            key: key.to_string(),
            content: stored.content.clone(),
            cas: stored.cas,
            expiry: stored.remaining(now),
            flags: stored.flags,
        })
    }

    /// Live documents; expired ones are dropped on the way.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.documents.retain(|_, doc| !doc.is_expired(now));
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serves one decoded request.
    pub fn handle(
        &self,
        frame: RequestFrame,
    ) -> ResponseFrame {
        let opaque = frame.opaque;
        trace!("[:EmbeddedStore:handle] opaque={} {:?}", opaque, frame.body);

        if frame.body.key().is_some() && self.take_temporary_failure() {
            debug!("[:EmbeddedStore:handle] opaque={} injected temporary failure", opaque);
            return ResponseFrame::error(opaque, Status::TemporaryFailure);
        }

        match self.serve(frame.body) {
            Ok(body) => ResponseFrame {
                opaque,
                status: Status::Success,
                body,
            },
            Err(status) => ResponseFrame::error(opaque, status),
        }
    }

    fn serve(
        &self,
        request: Request,
    ) -> Reply {
        match request {
            Request::Get { key } => self.get(&key),
            Request::Exists { key } => self.read(&key, |doc| Ok(Response::Exists { cas: doc.cas })),
            Request::Insert {
                key,
                value,
                flags,
                expiry,
            } => self.store(&key, value, flags, expiry, |current| match current {
                Some(_) => Err(Status::KeyExists),
                None => Ok(()),
            }),
            Request::Upsert {
                key,
                value,
                flags,
                expiry,
            } => self.store(&key, value, flags, expiry, |_| Ok(())),
            Request::Replace {
                key,
                value,
                flags,
                expiry,
                cas,
            } => self.store(&key, value, flags, expiry, |current| {
                check_cas(current.ok_or(Status::KeyNotFound)?, cas)
            }),
            Request::Remove { key, cas } => self.remove(&key, cas),
            Request::Touch { key, expiry } => self.touch(&key, expiry),
            Request::LookupIn { key, specs } => self.lookup_in(&key, &specs),
            Request::MutateIn {
                key,
                specs,
                cas,
                semantics,
                expiry,
            } => self.mutate_in(&key, &specs, cas, semantics, expiry),
            Request::Observe { partition_id } => self.observe(partition_id),
        }
    }

    fn get(
        &self,
        key: &str,
    ) -> Reply {
        let now = Instant::now();
        self.read(key, |doc| {
            Ok(Response::Document {
                value: Payload::raw(doc.content.clone()),
                cas: doc.cas,
                flags: doc.flags,
                expiry: doc.remaining(now),
            })
        })
    }

    fn read(
        &self,
        key: &str,
        f: impl FnOnce(&StoredDocument) -> Reply,
    ) -> Reply {
        let now = Instant::now();
        let expired = match self.documents.get(key) {
            Some(doc) if !doc.is_expired(now) => return f(&doc),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.documents.remove_if(key, |_, doc| doc.is_expired(now));
        }
        Err(Status::KeyNotFound)
    }

    /// Runs `f` on the live document of `key` while holding its shard lock.
    ///
    /// Whatever `f` leaves in the slot is written back; `None` deletes the
    /// key. Expired documents appear as absent.
    fn with_slot<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Option<StoredDocument>) -> R,
    ) -> R {
        let now = Instant::now();
        match self.documents.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone()).filter(|doc| !doc.is_expired(now));
                let result = f(&mut slot);
                match slot {
                    Some(doc) => {
                        occupied.insert(doc);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(doc) = slot {
                    vacant.insert(doc);
                }
                result
            }
        }
    }

    fn store(
        &self,
        key: &str,
        value: Payload,
        flags: u32,
        expiry: Option<Duration>,
        precondition: impl FnOnce(Option<&StoredDocument>) -> std::result::Result<(), Status>,
    ) -> Reply {
        if value.data.len() > MAX_DOCUMENT_SIZE {
            return Err(Status::ValueTooLarge);
        }
        self.with_slot(key, |slot| {
            precondition(slot.as_ref())?;
            let expires_at = expires_at(expiry)?;
            let (cas, token) = self.commit(key);
            *slot = Some(StoredDocument {
                content: value.data,
                flags,
                cas,
                expires_at,
            });
            Ok(Response::Mutation { cas, token })
        })
    }

    fn remove(
        &self,
        key: &str,
        cas: Option<Cas>,
    ) -> Reply {
        self.with_slot(key, |slot| {
            check_cas(slot.as_ref().ok_or(Status::KeyNotFound)?, cas)?;
            *slot = None;
            let (cas, token) = self.commit(key);
            Ok(Response::Mutation { cas, token })
        })
    }

    fn touch(
        &self,
        key: &str,
        expiry: Option<Duration>,
    ) -> Reply {
        self.with_slot(key, |slot| {
            let doc = slot.as_mut().ok_or(Status::KeyNotFound)?;
            let expires_at = expires_at(expiry)?;
            let (cas, token) = self.commit(key);
            doc.cas = cas;
            doc.expires_at = expires_at;
            Ok(Response::Mutation { cas, token })
        })
    }

    fn lookup_in(
        &self,
        key: &str,
        specs: &[LookupSpec],
    ) -> Reply {
        self.read(key, |doc| {
            let json = parse_json(&doc.content)?;
            let results = subdoc::lookup_all(&json, specs)
                .into_iter()
                .map(|result| result.and_then(|value| encode_value(&value)))
                .collect();
            Ok(Response::LookupIn { cas: doc.cas, results })
        })
    }

    fn mutate_in(
        &self,
        key: &str,
        specs: &[MutateSpec],
        expected_cas: Option<Cas>,
        semantics: StoreSemantics,
        expiry: Option<Duration>,
    ) -> Reply {
        self.with_slot(key, |slot| {
            let requested_expiry = expires_at(expiry)?;
            let (mut json, flags, expires) = match (slot.as_ref(), semantics) {
                (Some(_), StoreSemantics::Insert) => return Err(Status::KeyExists),
                (None, StoreSemantics::Replace) => return Err(Status::KeyNotFound),
                // a cas names a document that must still exist
                (None, _) if expected_cas.is_some() => return Err(Status::KeyNotFound),
                (None, _) => (Value::Object(Default::default()), JSON_FLAGS, None),
                (Some(doc), _) => {
                    check_cas(doc, expected_cas)?;
                    (parse_json(&doc.content)?, doc.flags, doc.expires_at)
                }
            };

            let results = subdoc::mutate_all(&mut json, specs).map_err(|(index, error)| {
                debug!("[:EmbeddedStore:mutate_in] {} spec {} failed: {}", key, index, error);
                Status::SubdocFailure {
                    index: index as u16,
                    error,
                }
            })?;
            let results = results
                .iter()
                .map(|value| value.as_ref().map(encode_value).transpose())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Status::Invalid(e.to_string()))?;

            let content = serde_json::to_vec(&json).map_err(|e| Status::Invalid(e.to_string()))?;
            if content.len() > MAX_DOCUMENT_SIZE {
                return Err(Status::ValueTooLarge);
            }

            let (cas, token) = self.commit(key);
            *slot = Some(StoredDocument {
                content: Bytes::from(content),
                flags,
                cas,
                expires_at: if expiry.is_some() { requested_expiry } else { expires },
            });
            Ok(Response::MutateIn { cas, token, results })
        })
    }

    fn observe(
        &self,
        partition_id: u16,
    ) -> Reply {
        let partition = self
            .partitions
            .get(partition_id as usize)
            .ok_or_else(|| Status::Invalid(format!("no partition {partition_id}")))?;
        let nodes = self.nodes.read();
        let mut state = partition.lock();
        let high_seqno = state.high_seqno;

        for (node, progress) in nodes.iter().zip(state.progress.iter_mut()) {
            if !node.online {
                continue;
            }
            let held_before = progress.replicated;
            progress.replicated = high_seqno;
            if !node.persistence_stalled {
                progress.persisted = progress.persisted.max(held_before);
            }
        }

        let observation = Observation {
            partition_id,
            partition_uuid: state.uuid,
            high_seqno,
            nodes: nodes
                .iter()
                .zip(state.progress.iter())
                .enumerate()
                .map(|(id, (node, progress))| ReplicaState {
                    node_id: id as u32,
                    active: id == 0,
                    online: node.online,
                    replicated_seqno: progress.replicated,
                    persisted_seqno: progress.persisted,
                })
                .collect(),
        };
        Ok(Response::Observe(observation))
    }

    /// Mints the cas and mutation token of a write to `key`.
    fn commit(
        &self,
        key: &str,
    ) -> (Cas, MutationToken) {
        let cas = Cas(self.cas_clock.fetch_add(1, Ordering::SeqCst).wrapping_add(1).max(1));
        let partition_id = self.partition_of(key);
        let mut state = self.partitions[partition_id as usize].lock();
        state.high_seqno += 1;
        let seqno = state.high_seqno;
        state.progress[0].replicated = seqno;

        (
            cas,
            MutationToken {
                partition_id,
                partition_uuid: state.uuid,
                seqno,
            },
        )
    }

    fn update_node(
        &self,
        node_id: u32,
        f: impl FnOnce(&mut NodeState),
    ) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(node_id as usize) {
            Some(node) => {
                f(node);
                info!("[:EmbeddedStore:update_node] node {} now {:?}", node_id, node);
                true
            }
            None => false,
        }
    }

    fn take_temporary_failure(&self) -> bool {
        self.pending_temp_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn check_cas(
    doc: &StoredDocument,
    expected: Option<Cas>,
) -> std::result::Result<(), Status> {
    match expected {
        Some(cas) if cas != doc.cas => Err(Status::CasMismatch),
        _ => Ok(()),
    }
}

/// Zero and absent expiries both mean the document never expires.
///
/// An expiry too far out for the clock to represent is rejected.
fn expires_at(expiry: Option<Duration>) -> std::result::Result<Option<Instant>, Status> {
    match expiry.filter(|e| !e.is_zero()) {
        None => Ok(None),
        Some(e) => Instant::now()
            .checked_add(e)
            .map(Some)
            .ok_or_else(|| Status::Invalid(format!("expiry of {e:?} is out of range"))),
    }
}

fn parse_json(content: &[u8]) -> std::result::Result<Value, Status> {
    serde_json::from_slice(content).map_err(|_| Status::Invalid("document is not JSON".into()))
}

fn encode_value(value: &Value) -> std::result::Result<Vec<u8>, subdoc::PathError> {
    serde_json::to_vec(value).map_err(|e| subdoc::PathError::ValueInvalid(e.to_string()))
}
