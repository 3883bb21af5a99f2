// Domain layer: models, progress snapshots and ports. Adapters implement the ports.

pub mod model;
pub mod ports;
pub mod progress;
