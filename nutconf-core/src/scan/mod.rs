//! Concurrent device scanning
//!
//! A shared fixed-size worker pool bounds the number of in-flight probes
//! across all assets; the orchestrator fans probes out per asset and
//! aggregates whatever comes back before the scan deadline.

mod orchestrator;
mod pool;

pub use orchestrator::{ProbeFn, ProtocolScanner, ScanOrchestrator};
pub use pool::WorkerPool;
