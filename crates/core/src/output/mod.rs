pub mod artnet;
pub mod discovery;
pub mod e131;
pub mod error;
pub mod null;
#[allow(clippy::module_inception)]
pub mod output;
pub mod output_manager;
pub mod serial;
pub mod sync;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use discovery::{ArtNetDiscoverer, Discoverer, E131Discoverer};
pub use error::OutputError;
pub use output::{create_driver, Output, OutputConfig, OutputDriver, ProtocolKind};
pub use output_manager::{NetworkFile, OutputManager, OutputSummary, Position, StartReport};
pub use sync::{SyncSender, UdpSyncSender};
