//! Transport Contracts
//!
//! The motion-control protocol stack and the WDI provider link belong to an
//! external library. This module pins down the part of that library the
//! autofocus driver relies on, as two traits:
//!
//! - [`AutofocusTransport`] opens a session against a [`ConnectionTarget`]
//! - [`AutofocusSession`] resolves sub-devices and executes focus commands
//!
//! Handles returned by a session ([`AxisHandle`], [`DeviceHandle`],
//! [`FocusHandle`]) are plain values; they are only meaningful for the session
//! that produced them.

use async_trait::async_trait;
use thiserror::Error;

/// Focus axis setting holding the lower tracking limit, in native units.
pub const LIMIT_MIN_SETTING: &str = "motion.tracking.limit.min";

/// Focus axis setting holding the upper tracking limit, in native units.
pub const LIMIT_MAX_SETTING: &str = "motion.tracking.limit.max";

/// Errors reported by the transport library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The endpoint refused or did not answer the connection attempt.
    #[error("endpoint {0} unreachable")]
    Unreachable(String),

    /// No device answers at the address.
    #[error("no device at address {0}")]
    DeviceNotFound(u8),

    /// The device exists but has no such axis.
    #[error("device {device} has no axis {axis}")]
    AxisNotFound {
        /// Device address
        device: u8,
        /// Requested axis
        axis: u8,
    },

    /// A command was sent but failed.
    #[error("command '{command}' failed: {reason}")]
    CommandFailed {
        /// Command name
        command: String,
        /// Failure description
        reason: String,
    },

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

/// Result type of transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Where to connect: the motion-control port plus the WDI provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Motion-control port
    pub motion_port: String,
    /// WDI provider host
    pub host: String,
    /// WDI provider TCP port
    pub port: u16,
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} via {}", self.host, self.port, self.motion_port)
    }
}

/// A resolved motorised axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisHandle {
    /// Device address
    pub device: u8,
    /// Axis number within the device
    pub axis: u8,
}

/// A resolved device without axis selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Device address
    pub address: u8,
}

/// Operation handle tying the provider to the focus axis and optional turret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusHandle {
    /// Identifier of the autofocus provider on the motion-control network
    pub provider_id: u32,
    /// Focus stage axis
    pub focus_axis: AxisHandle,
    /// Objective turret, if present
    pub turret: Option<DeviceHandle>,
}

/// Status snapshot reported by the autofocus device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusStatus {
    /// Whether the sensor reports the sample in focus
    pub in_focus: bool,
}

/// Parameters of a generic register read on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRead {
    /// Register/channel identifier
    pub channel: u32,
    /// Element size in bytes
    pub length: u32,
    /// Number of elements
    pub count: u32,
    /// Offset of the first element
    pub offset: u32,
    /// Access mode
    pub mode: String,
}

/// Opens sessions to the autofocus device.
#[async_trait]
pub trait AutofocusTransport: Send + Sync {
    /// Open the motion-control connection and the WDI provider link.
    async fn connect(&self, target: &ConnectionTarget)
        -> TransportResult<Box<dyn AutofocusSession>>;
}

/// An open session to the autofocus device.
#[async_trait]
pub trait AutofocusSession: Send + Sync {
    /// Identifier of the connected autofocus provider.
    fn provider_id(&self) -> u32;

    /// Resolve a device and one of its axes.
    async fn resolve_axis(&self, device: u8, axis: u8) -> TransportResult<AxisHandle>;

    /// Resolve a device by address.
    async fn resolve_device(&self, address: u8) -> TransportResult<DeviceHandle>;

    /// Whether the axis reports motion in progress.
    async fn is_busy(&self, axis: AxisHandle) -> TransportResult<bool>;

    /// Read an axis setting in native units.
    async fn get_setting(&self, axis: AxisHandle, name: &str) -> TransportResult<f64>;

    /// Write an axis setting in native units.
    async fn set_setting(&self, axis: AxisHandle, name: &str, value: f64) -> TransportResult<()>;

    /// Query the autofocus status.
    async fn status(&self, focus: &FocusHandle) -> TransportResult<FocusStatus>;

    /// Focus once; `scan` searches the whole range first.
    async fn focus_once(&self, focus: &FocusHandle, scan: bool) -> TransportResult<()>;

    /// Start the continuous focus tracking loop.
    async fn start_focus_loop(&self, focus: &FocusHandle) -> TransportResult<()>;

    /// Stop the continuous focus tracking loop.
    async fn stop_focus_loop(&self, focus: &FocusHandle) -> TransportResult<()>;

    /// Read raw values from a provider register.
    async fn generic_read(&self, request: &RegisterRead) -> TransportResult<Vec<i32>>;

    /// Close the session. Dropping a session without closing releases it as well.
    async fn close(&mut self) -> TransportResult<()>;
}
