//! Adapter seam for the process-wide topology context (spec.md §9: global
//! state is owned by a single long-lived context; the engine only reads a
//! snapshot through this trait rather than owning it).

use hub_topology::DeviceTopology;

pub trait TopologySource: Send + Sync {
    fn snapshot(&self) -> DeviceTopology;
}
