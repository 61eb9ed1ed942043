//! # WDI Autofocus Driver Library
//!
//! Drives a networked WDI autofocus accessory through a motion-control protocol
//! stack. The driver keeps its connection parameters as plain configuration and
//! connects lazily: on first use, and again after any connection parameter
//! changes.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered configuration (TOML file plus `WDI_AUTOFOCUS_`
//!   environment variables) loaded with `figment`.
//! - **`error`**: The `AutofocusError` enum shared by every layer.
//! - **`hardware`**: Capability traits, transport contracts, the simulated
//!   transport and the `WdiAutofocus` driver.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`properties`**: The property table mapping host-facing names to
//!   configuration fields.
//! - **`validation`**: Range and value checks used by setters and configuration.

pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod properties;
pub mod validation;

pub use config::{AutofocusConfig, DeviceConfiguration};
pub use error::{AppResult, AutofocusError, ErrorKind};
pub use hardware::{AutoFocus, ConnectionState, Device, WdiAutofocus};
