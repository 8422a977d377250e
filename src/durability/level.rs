use serde::Deserialize;
use serde::Serialize;

use crate::utils::cluster::majority_count;

/// How widely a write must be acknowledged before it is reported successful.
///
/// Variants are ordered by strength; a stronger level never succeeds before
/// a weaker one would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityLevel {
    /// Primary acknowledgement only
    #[default]
    None,
    /// A majority of nodes hold the mutation in memory
    MajorityReplicated,
    /// A majority of nodes have persisted the mutation
    PersistedToMajority,
    /// Every node has persisted the mutation
    PersistedToAll,
}

impl DurabilityLevel {
    /// Number of nodes that must acknowledge for a partition with
    /// `total_nodes` copies (active + replicas).
    pub fn required_acks(
        &self,
        total_nodes: usize,
    ) -> usize {
        match self {
            DurabilityLevel::None => 1,
            DurabilityLevel::MajorityReplicated | DurabilityLevel::PersistedToMajority => {
                majority_count(total_nodes)
            }
            DurabilityLevel::PersistedToAll => total_nodes,
        }
    }

    /// Whether acknowledgement must come from disk rather than memory.
    pub fn requires_persistence(&self) -> bool {
        matches!(
            self,
            DurabilityLevel::PersistedToMajority | DurabilityLevel::PersistedToAll
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityLevel::None => "none",
            DurabilityLevel::MajorityReplicated => "majority_replicated",
            DurabilityLevel::PersistedToMajority => "persisted_to_majority",
            DurabilityLevel::PersistedToAll => "persisted_to_all",
        }
    }
}
