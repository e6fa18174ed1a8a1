//! Device configuration data model, text codec, and on-disk materialization

mod codec;
mod file;
mod types;

pub use codec::{parse_config, serialize_config};
pub use file::{
    device_config_path, read_device_config, remove_device_config, write_device_config,
};
pub use types::{
    DeviceConfiguration, DeviceConfigurationRow, DeviceConfigurationType, KnownConfiguration,
};

pub(crate) use types::is_placeholder;
