//! NutConf Core Library
//!
//! Configuration reconciliation engine for NUT power-device drivers
//! (UPS, PDU, ePDU, STS).
//!
//! # Features
//!
//! - **Concurrent Scanning**: Probes devices over every applicable
//!   protocol/credential combination on a bounded worker pool
//! - **Reconciliation**: Classifies persisted configurations as working,
//!   non-working, or unknown against scan evidence
//! - **Priority Ordering**: Ranks candidate configurations by driver
//!   preference (SNMPv3 first, serial fallbacks last)
//! - **Materialization**: Idempotent INI-style driver files, written
//!   atomically and only when content actually changes
//! - **Driver Lifecycle**: Batches service start/stop requests so bursts
//!   of changes cause one restart per driver
//!
//! # Module Structure
//!
//! - `device/` - Configuration data model, text codec, on-disk files
//! - `scan/` - Worker pool and per-asset scan orchestration
//! - `reconcile` - Scan-versus-store classification and row instantiation
//! - `manager` - Aggregate root: cache, pipelines, persistence
//! - `connector` - Bus-facing notification and request handlers

// Grouped modules
pub mod device;
pub mod scan;

// Standalone modules
pub mod connector;
pub mod constants;
pub mod credentials;
pub mod drivers;
pub mod manager;
pub mod protect;
pub mod reconcile;
pub mod settings;
pub mod store;
pub mod testing;

// Re-export primary types from device/
pub use device::{
    parse_config, serialize_config, write_device_config, DeviceConfiguration,
    DeviceConfigurationRow, DeviceConfigurationType, KnownConfiguration,
};

// Re-export the engine surface
pub use connector::{ConfigurationConnector, NotificationBus};
pub use credentials::{CredentialId, CredentialProvider, CredentialV1, CredentialV3};
pub use drivers::{driver_unit, DriverLifecycle, ServiceController, SystemdController};
pub use manager::{is_configurations_change, ConfigurationManager};
pub use protect::AssetProtect;
pub use scan::{ProbeFn, ProtocolScanner, ScanOrchestrator, WorkerPool};
pub use settings::{
    load_default_settings, load_settings, load_settings_or_default, EngineSettings,
};
pub use store::ConfigStore;
