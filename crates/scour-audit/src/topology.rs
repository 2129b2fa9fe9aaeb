//! Storage topology: which devices back each policy's object ring.

use std::collections::BTreeMap;

use scour_types::{Device, PolicyIndex};
use tracing::debug;

use crate::error::AuditError;

/// Source of truth for policy → device placement.
pub trait TopologyProvider: Send + Sync {
    /// Every configured storage policy.
    fn policies(&self) -> Vec<PolicyIndex>;

    /// Device slots of a policy's object ring. `None` marks a removed slot.
    fn object_ring_devices(&self, policy: PolicyIndex) -> Result<Vec<Option<Device>>, AuditError>;
}

/// A fixed topology, typically loaded from the daemon config.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    rings: BTreeMap<PolicyIndex, Vec<Option<Device>>>,
}

impl StaticTopology {
    /// Build from `(policy, device names)` pairs. Empty names mark removed
    /// slots; any other name must parse as `host:port`.
    pub fn new<I, S>(policies: I) -> Result<Self, AuditError>
    where
        I: IntoIterator<Item = (PolicyIndex, Vec<S>)>,
        S: AsRef<str>,
    {
        let mut rings = BTreeMap::new();
        for (policy, names) in policies {
            let slots = names
                .iter()
                .map(|name| match name.as_ref().trim() {
                    "" => Ok(None),
                    name => Device::parse(name).map(Some),
                })
                .collect::<Result<Vec<_>, _>>()?;
            debug!(policy, devices = slots.len(), "loaded object ring");
            rings.entry(policy).or_insert_with(Vec::new).extend(slots);
        }
        Ok(Self { rings })
    }
}

impl TopologyProvider for StaticTopology {
    fn policies(&self) -> Vec<PolicyIndex> {
        self.rings.keys().copied().collect()
    }

    fn object_ring_devices(&self, policy: PolicyIndex) -> Result<Vec<Option<Device>>, AuditError> {
        Ok(self.rings.get(&policy).cloned().unwrap_or_default())
    }
}
