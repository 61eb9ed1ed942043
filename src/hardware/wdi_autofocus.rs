//! Zaber WDI Autofocus Driver
//!
//! Drives a WDI autofocus sensor that steers a focus stage on a Zaber
//! motion-control network, optionally together with an objective turret.
//!
//! # Connection lifecycle
//!
//! The driver holds its configuration and a two-state connection:
//!
//! ```text
//!   Disconnected --(first operation needing the device)--> Connected
//!   Connected ----(write to host/port/address/axis/turret)--> Disconnected
//!   Connected ----(shutdown / drop)--------------------------> Disconnected
//! ```
//!
//! Connecting opens the endpoint, resolves the focus axis and, when configured,
//! the turret, then installs the new connection in one step. A failed attempt
//! leaves the driver disconnected. Every connection-relevant setter funnels
//! through `invalidate_connection`.
//!
//! # Failure policy
//!
//! Commands propagate their errors. The three status queries (`is_busy`,
//! `is_continuous_focus_active`, `is_focus_locked`) report `false` instead; see
//! [`FailurePolicy`].
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wdi_autofocus::config::DeviceConfiguration;
//! use wdi_autofocus::hardware::capabilities::{AutoFocus, Device};
//! use wdi_autofocus::hardware::mock::MockAutofocusTransport;
//! use wdi_autofocus::hardware::wdi_autofocus::WdiAutofocus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = Arc::new(MockAutofocusTransport::new());
//!     let mut autofocus = WdiAutofocus::new(DeviceConfiguration::default(), transport);
//!
//!     autofocus.set_wdi_host("192.168.0.20")?;
//!     autofocus.initialize().await?;
//!     autofocus.full_focus().await?;
//!     println!("Focus score: {:.3}", autofocus.current_focus_score().await?);
//!
//!     autofocus.shutdown().await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AutofocusConfig, DeviceConfiguration, TransportConfig};
use crate::error::{AppResult, AutofocusError};
use crate::hardware::capabilities::{AutoFocus, Device};
use crate::hardware::transport::{
    AutofocusSession, AutofocusTransport, ConnectionTarget, FocusHandle, RegisterRead,
    TransportResult, LIMIT_MAX_SETTING, LIMIT_MIN_SETTING,
};
use crate::properties::{self, ConfigField, PropertyValue};
use crate::validation::{is_finite, is_in_range, is_not_empty, narrow};

/// Device name registered with the host.
pub const DEVICE_NAME: &str = "WdiAutofocus";

/// Device description registered with the host.
pub const DEVICE_DESCRIPTION: &str = "Zaber WDI Autofocus device adapter";

/// Native limit units per millimetre.
pub const NATIVE_PER_MM: f64 = 1_000_000.0;

/// Divisor turning the raw position register into a focus score.
pub const FOCUS_SCORE_DIVISOR: f64 = 1024.0;

/// Generic read of the WDI position register.
pub fn position_register() -> RegisterRead {
    RegisterRead {
        channel: 41,
        length: 4,
        count: 1,
        offset: 0,
        mode: "t".to_string(),
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live session; the next operation connects.
    Disconnected,
    /// A session is open and addresses are resolved.
    Connected,
}

/// Operations subject to the failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Opening the connection
    EnsureConnected,
    /// Full focus
    FullFocus,
    /// Incremental focus
    IncrementalFocus,
    /// Continuous focus start
    StartContinuousFocus,
    /// Continuous focus stop
    StopContinuousFocus,
    /// Axis busy query
    IsBusy,
    /// Continuous focus state query
    IsContinuousFocusActive,
    /// Focus lock query
    IsFocusLocked,
    /// Focus score read
    CurrentFocusScore,
}

/// What an operation does when the device cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the error to the caller.
    Propagate,
    /// Log the error and report `false`.
    ReportFalse,
}

impl FailurePolicy {
    /// Policy of `operation`.
    pub const fn for_operation(operation: Operation) -> Self {
        match operation {
            Operation::IsBusy | Operation::IsContinuousFocusActive | Operation::IsFocusLocked => {
                FailurePolicy::ReportFalse
            }
            Operation::EnsureConnected
            | Operation::FullFocus
            | Operation::IncrementalFocus
            | Operation::StartContinuousFocus
            | Operation::StopContinuousFocus
            | Operation::CurrentFocusScore => FailurePolicy::Propagate,
        }
    }
}

/// Apply the `ReportFalse` policy to a status query.
fn report_false_on_error(operation: Operation, result: AppResult<bool>) -> bool {
    debug_assert_eq!(
        FailurePolicy::for_operation(operation),
        FailurePolicy::ReportFalse
    );
    match result {
        Ok(flag) => flag,
        Err(err) => {
            warn!(?operation, error = %err, "Status query failed, reporting false");
            false
        }
    }
}

/// Run a transport call under a time budget, describing failures with `command`.
async fn bounded<T, F>(limit: Duration, command: &str, call: F) -> Result<T, String>
where
    F: Future<Output = TransportResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{}: {}", command, err)),
        Err(_) => Err(format!("{}: timed out after {:?}", command, limit)),
    }
}

struct ActiveConnection {
    session: Box<dyn AutofocusSession>,
    focus: FocusHandle,
}

enum Link {
    Disconnected,
    Connected(ActiveConnection),
}

/// Soft limit bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitBound {
    Min,
    Max,
}

impl LimitBound {
    fn setting(self) -> &'static str {
        match self {
            LimitBound::Min => LIMIT_MIN_SETTING,
            LimitBound::Max => LIMIT_MAX_SETTING,
        }
    }
}

/// Limits the connected device is known to hold, in mm.
///
/// `None` means unknown: the bound was never read or written on this
/// connection, or the last write failed.
#[derive(Debug, Default, Clone, Copy)]
struct ConfirmedLimits {
    min: Option<f64>,
    max: Option<f64>,
}

impl ConfirmedLimits {
    fn get(&self, bound: LimitBound) -> Option<f64> {
        match bound {
            LimitBound::Min => self.min,
            LimitBound::Max => self.max,
        }
    }

    fn set(&mut self, bound: LimitBound, value: Option<f64>) {
        match bound {
            LimitBound::Min => self.min = value,
            LimitBound::Max => self.max = value,
        }
    }
}

/// Driver for the Zaber WDI autofocus.
///
/// One instance owns its configuration and connection; every operation that may
/// talk to the device takes `&mut self`.
pub struct WdiAutofocus {
    config: DeviceConfiguration,
    transport: Arc<dyn AutofocusTransport>,
    link: Link,
    confirmed_limits: ConfirmedLimits,
    initialized: bool,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl WdiAutofocus {
    /// Create a disconnected driver with default transport timeouts.
    pub fn new(config: DeviceConfiguration, transport: Arc<dyn AutofocusTransport>) -> Self {
        let timeouts = TransportConfig::default();
        debug!("WdiAutofocus::new");
        Self {
            config,
            transport,
            link: Link::Disconnected,
            confirmed_limits: ConfirmedLimits::default(),
            initialized: false,
            connect_timeout: timeouts.connect_timeout(),
            command_timeout: timeouts.command_timeout(),
        }
    }

    /// Create a driver from a loaded configuration, validating the device section.
    pub fn from_config(
        config: &AutofocusConfig,
        transport: Arc<dyn AutofocusTransport>,
    ) -> AppResult<Self> {
        config.device.validate()?;
        Ok(Self::new(config.device.clone(), transport).with_timeouts(&config.transport))
    }

    /// Replace the transport timeouts.
    pub fn with_timeouts(mut self, timeouts: &TransportConfig) -> Self {
        self.connect_timeout = timeouts.connect_timeout();
        self.command_timeout = timeouts.command_timeout();
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        match self.link {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connected(_) => ConnectionState::Connected,
        }
    }

    /// Whether `initialize` has completed since construction or the last shutdown.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // -------------------------------------------------------------------------
    // Connection management
    // -------------------------------------------------------------------------

    fn target(&self) -> ConnectionTarget {
        ConnectionTarget {
            motion_port: self.config.motion_port.clone(),
            host: self.config.wdi_host.clone(),
            port: self.config.wdi_port,
        }
    }

    /// Drop the live connection, if any, so the next operation reconnects.
    fn invalidate_connection(&mut self, reason: &str) {
        self.confirmed_limits = ConfirmedLimits::default();
        if let Link::Connected(active) = std::mem::replace(&mut self.link, Link::Disconnected) {
            info!(
                provider_id = active.session.provider_id(),
                reason, "Autofocus connection invalidated"
            );
        }
    }

    /// Connect if disconnected.
    ///
    /// # Errors
    /// `AutofocusError::Connection` if the endpoint is unreachable or an address
    /// does not resolve. The driver then stays disconnected.
    pub async fn ensure_connected(&mut self) -> AppResult<()> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&mut self) -> AppResult<&ActiveConnection> {
        if let Link::Disconnected = self.link {
            let active = self.open_connection().await?;
            self.link = Link::Connected(active);
        }
        match &self.link {
            Link::Connected(active) => Ok(active),
            Link::Disconnected => Err(AutofocusError::Connection(
                "connection was not established".to_string(),
            )),
        }
    }

    async fn open_connection(&self) -> AppResult<ActiveConnection> {
        let target = self.target();
        info!(%target, "Opening autofocus connection");

        let mut session = bounded(
            self.connect_timeout,
            "connect",
            self.transport.connect(&target),
        )
        .await
        .map_err(AutofocusError::Connection)?;

        match self.resolve_focus(session.as_ref()).await {
            Ok(focus) => {
                info!(
                    provider_id = focus.provider_id,
                    focus_device = focus.focus_axis.device,
                    focus_axis = focus.focus_axis.axis,
                    turret = ?focus.turret.map(|t| t.address),
                    "Autofocus connected"
                );
                Ok(ActiveConnection { session, focus })
            }
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    debug!(error = %close_err, "Closing half-open session failed");
                }
                Err(err)
            }
        }
    }

    async fn resolve_focus(&self, session: &dyn AutofocusSession) -> AppResult<FocusHandle> {
        let focus_axis = bounded(
            self.connect_timeout,
            "resolve focus axis",
            session.resolve_axis(self.config.focus_address, self.config.focus_axis),
        )
        .await
        .map_err(AutofocusError::Connection)?;

        let turret = match self.config.turret_address() {
            Some(address) => Some(
                bounded(
                    self.connect_timeout,
                    "resolve objective turret",
                    session.resolve_device(address),
                )
                .await
                .map_err(AutofocusError::Connection)?,
            ),
            None => None,
        };

        Ok(FocusHandle {
            provider_id: session.provider_id(),
            focus_axis,
            turret,
        })
    }

    // -------------------------------------------------------------------------
    // Configuration setters
    // -------------------------------------------------------------------------

    /// Set the motion-control port. Drops a live connection.
    pub fn set_motion_port(&mut self, port: impl Into<String>) -> AppResult<()> {
        let port = port.into();
        is_not_empty(properties::MOTION_PORT, &port)?;
        self.invalidate_connection(properties::MOTION_PORT);
        self.config.motion_port = port;
        Ok(())
    }

    /// Set the WDI provider host. Drops a live connection.
    pub fn set_wdi_host(&mut self, host: impl Into<String>) -> AppResult<()> {
        let host = host.into();
        is_not_empty(properties::WDI_HOST, &host)?;
        self.invalidate_connection(properties::WDI_HOST);
        self.config.wdi_host = host;
        Ok(())
    }

    /// Set the WDI provider TCP port. Drops a live connection.
    pub fn set_wdi_port(&mut self, port: u16) -> AppResult<()> {
        is_in_range(properties::WDI_PORT, i64::from(port), ConfigField::WdiPort.integer_range())?;
        self.invalidate_connection(properties::WDI_PORT);
        self.config.wdi_port = port;
        Ok(())
    }

    /// Set the focus stage device address. Drops a live connection.
    pub fn set_focus_address(&mut self, address: u8) -> AppResult<()> {
        is_in_range(
            properties::FOCUS_ADDRESS,
            i64::from(address),
            ConfigField::FocusAddress.integer_range(),
        )?;
        self.invalidate_connection(properties::FOCUS_ADDRESS);
        self.config.focus_address = address;
        Ok(())
    }

    /// Set the focus stage axis number. Drops a live connection.
    pub fn set_focus_axis(&mut self, axis: u8) -> AppResult<()> {
        is_in_range(
            properties::FOCUS_AXIS,
            i64::from(axis),
            ConfigField::FocusAxis.integer_range(),
        )?;
        self.invalidate_connection(properties::FOCUS_AXIS);
        self.config.focus_axis = axis;
        Ok(())
    }

    /// Set the objective turret address (`<= 0` for none). Drops a live connection.
    pub fn set_objective_turret_address(&mut self, address: i8) -> AppResult<()> {
        is_in_range(
            properties::OBJECTIVE_TURRET_ADDRESS,
            i64::from(address),
            ConfigField::ObjectiveTurretAddress.integer_range(),
        )?;
        self.invalidate_connection(properties::OBJECTIVE_TURRET_ADDRESS);
        self.config.objective_turret_address = address;
        Ok(())
    }

    /// Set the lower soft limit in mm.
    ///
    /// The value is stored first, then written to the device in native units,
    /// connecting if needed. The write is skipped only when the device already
    /// confirmed this value on the current connection.
    ///
    /// # Errors
    /// `AutofocusError::Configuration` if the value is not finite or exceeds the
    /// upper limit; nothing is stored then. `AutofocusError::Connection` or
    /// `AutofocusError::Communication` if the write cannot be delivered; the new
    /// value stays stored and the next write of the same value retries.
    pub async fn set_limit_min(&mut self, limit_mm: f64) -> AppResult<()> {
        is_finite(properties::LIMIT_MIN, limit_mm)?;
        if limit_mm > self.config.limit_max {
            return Err(AutofocusError::Configuration(format!(
                "{} ({}) exceeds {} ({})",
                properties::LIMIT_MIN,
                limit_mm,
                properties::LIMIT_MAX,
                self.config.limit_max
            )));
        }
        self.config.limit_min = limit_mm;
        self.push_limit(LimitBound::Min, limit_mm).await
    }

    /// Set the upper soft limit in mm. Same ordering as [`Self::set_limit_min`].
    pub async fn set_limit_max(&mut self, limit_mm: f64) -> AppResult<()> {
        is_finite(properties::LIMIT_MAX, limit_mm)?;
        if limit_mm < self.config.limit_min {
            return Err(AutofocusError::Configuration(format!(
                "{} ({}) is below {} ({})",
                properties::LIMIT_MAX,
                limit_mm,
                properties::LIMIT_MIN,
                self.config.limit_min
            )));
        }
        self.config.limit_max = limit_mm;
        self.push_limit(LimitBound::Max, limit_mm).await
    }

    async fn push_limit(&mut self, bound: LimitBound, limit_mm: f64) -> AppResult<()> {
        let setting = bound.setting();
        if self.confirmed_limits.get(bound) == Some(limit_mm) {
            debug!(setting, limit_mm, "Device already holds this limit");
            return Ok(());
        }

        let limit = self.command_timeout;
        let native = limit_mm * NATIVE_PER_MM;
        let active = self.connection().await?;
        debug!(setting, native, "Pushing soft limit");
        let result = bounded(
            limit,
            setting,
            active
                .session
                .set_setting(active.focus.focus_axis, setting, native),
        )
        .await
        .map_err(AutofocusError::Communication);

        let confirmed = result.as_ref().ok().map(|_| limit_mm);
        self.confirmed_limits.set(bound, confirmed);
        result
    }

    // -------------------------------------------------------------------------
    // Property dispatch
    // -------------------------------------------------------------------------

    /// Read a configuration field.
    pub fn get_config(&self, field: ConfigField) -> PropertyValue {
        match field {
            ConfigField::Name => PropertyValue::String(DEVICE_NAME.to_string()),
            ConfigField::Description => PropertyValue::String(DEVICE_DESCRIPTION.to_string()),
            ConfigField::MotionPort => PropertyValue::String(self.config.motion_port.clone()),
            ConfigField::WdiHost => PropertyValue::String(self.config.wdi_host.clone()),
            ConfigField::WdiPort => PropertyValue::Integer(i64::from(self.config.wdi_port)),
            ConfigField::FocusAddress => {
                PropertyValue::Integer(i64::from(self.config.focus_address))
            }
            ConfigField::FocusAxis => PropertyValue::Integer(i64::from(self.config.focus_axis)),
            ConfigField::ObjectiveTurretAddress => {
                PropertyValue::Integer(i64::from(self.config.objective_turret_address))
            }
            ConfigField::LimitMin => PropertyValue::Float(self.config.limit_min),
            ConfigField::LimitMax => PropertyValue::Float(self.config.limit_max),
        }
    }

    /// Write a configuration field.
    ///
    /// # Errors
    /// Configuration errors (read-only field, kind mismatch, out of range, limit
    /// ordering) are raised before any device interaction. Limit fields may also
    /// fail with `AutofocusError::Connection` or `AutofocusError::Communication`.
    pub async fn set_config(&mut self, field: ConfigField, value: PropertyValue) -> AppResult<()> {
        let descriptor = field.descriptor();
        let name = descriptor.name;
        debug!(property = name, %value, "WdiAutofocus::set_config");

        if descriptor.read_only {
            return Err(AutofocusError::ReadOnlyProperty(name.to_string()));
        }

        let range = field.integer_range();
        match field {
            ConfigField::Name | ConfigField::Description => {
                Err(AutofocusError::ReadOnlyProperty(name.to_string()))
            }
            ConfigField::MotionPort => self.set_motion_port(value.as_str(name)?),
            ConfigField::WdiHost => self.set_wdi_host(value.as_str(name)?),
            ConfigField::WdiPort => self.set_wdi_port(narrow(name, value.as_integer(name)?, range)?),
            ConfigField::FocusAddress => {
                self.set_focus_address(narrow(name, value.as_integer(name)?, range)?)
            }
            ConfigField::FocusAxis => {
                self.set_focus_axis(narrow(name, value.as_integer(name)?, range)?)
            }
            ConfigField::ObjectiveTurretAddress => {
                self.set_objective_turret_address(narrow(name, value.as_integer(name)?, range)?)
            }
            ConfigField::LimitMin => self.set_limit_min(value.as_float(name)?).await,
            ConfigField::LimitMax => self.set_limit_max(value.as_float(name)?).await,
        }
    }

    /// Read a property by its host-facing name.
    pub fn get_property(&self, name: &str) -> AppResult<PropertyValue> {
        Ok(self.get_config(properties::descriptor(name)?.field))
    }

    /// Write a property by its host-facing name.
    pub async fn set_property(&mut self, name: &str, value: PropertyValue) -> AppResult<()> {
        let field = properties::descriptor(name)?.field;
        self.set_config(field, value).await
    }

    // -------------------------------------------------------------------------
    // Focus operations
    // -------------------------------------------------------------------------

    async fn focus_once(&mut self, scan: bool) -> AppResult<()> {
        let limit = self.command_timeout;
        let active = self.connection().await?;
        bounded(
            limit,
            "focus_once",
            active.session.focus_once(&active.focus, scan),
        )
        .await
        .map_err(AutofocusError::Communication)
    }

    /// Start the continuous focus tracking loop.
    pub async fn start_continuous_focus(&mut self) -> AppResult<()> {
        debug!("WdiAutofocus::start_continuous_focus");
        let limit = self.command_timeout;
        let active = self.connection().await?;
        bounded(
            limit,
            "start_focus_loop",
            active.session.start_focus_loop(&active.focus),
        )
        .await
        .map_err(AutofocusError::Communication)
    }

    /// Stop the continuous focus tracking loop.
    pub async fn stop_continuous_focus(&mut self) -> AppResult<()> {
        debug!("WdiAutofocus::stop_continuous_focus");
        let limit = self.command_timeout;
        let active = self.connection().await?;
        bounded(
            limit,
            "stop_focus_loop",
            active.session.stop_focus_loop(&active.focus),
        )
        .await
        .map_err(AutofocusError::Communication)
    }

    async fn focus_axis_busy(&mut self) -> AppResult<bool> {
        let limit = self.command_timeout;
        let active = self.connection().await?;
        bounded(
            limit,
            "is_busy",
            active.session.is_busy(active.focus.focus_axis),
        )
        .await
        .map_err(AutofocusError::Communication)
    }

    /// Whether the focus axis is moving. Reports `false` on any failure.
    pub async fn is_busy(&mut self) -> bool {
        debug!("WdiAutofocus::is_busy");
        let result = self.focus_axis_busy().await;
        report_false_on_error(Operation::IsBusy, result)
    }

    /// Whether continuous focusing runs (the focus axis is busy tracking).
    /// Reports `false` on any failure.
    pub async fn is_continuous_focus_active(&mut self) -> bool {
        debug!("WdiAutofocus::is_continuous_focus_active");
        let result = self.focus_axis_busy().await;
        report_false_on_error(Operation::IsContinuousFocusActive, result)
    }

    /// Whether the device reports the sample in focus. Reports `false` on any failure.
    pub async fn is_focus_locked(&mut self) -> bool {
        debug!("WdiAutofocus::is_focus_locked");
        let limit = self.command_timeout;
        let result = match self.connection().await {
            Ok(active) => bounded(limit, "status", active.session.status(&active.focus))
                .await
                .map(|status| status.in_focus)
                .map_err(AutofocusError::Communication),
            Err(err) => Err(err),
        };
        report_false_on_error(Operation::IsFocusLocked, result)
    }

    async fn read_focus_position(&mut self) -> AppResult<i32> {
        let limit = self.command_timeout;
        let request = position_register();
        let active = self.connection().await?;
        let values = bounded(
            limit,
            "generic_read",
            active.session.generic_read(&request),
        )
        .await
        .map_err(AutofocusError::Communication)?;
        values.first().copied().ok_or_else(|| {
            AutofocusError::Communication("generic_read: empty response".to_string())
        })
    }

    async fn load_device_limits(&mut self) -> AppResult<(f64, f64)> {
        let limit = self.command_timeout;
        let active = self.connection().await?;
        bounded(limit, "status", active.session.status(&active.focus))
            .await
            .map_err(AutofocusError::Communication)?;

        let axis = active.focus.focus_axis;
        let min = bounded(
            limit,
            LIMIT_MIN_SETTING,
            active.session.get_setting(axis, LIMIT_MIN_SETTING),
        )
        .await
        .map_err(AutofocusError::Communication)?;
        let max = bounded(
            limit,
            LIMIT_MAX_SETTING,
            active.session.get_setting(axis, LIMIT_MAX_SETTING),
        )
        .await
        .map_err(AutofocusError::Communication)?;
        Ok((min / NATIVE_PER_MM, max / NATIVE_PER_MM))
    }
}

#[async_trait]
impl Device for WdiAutofocus {
    fn name(&self) -> &'static str {
        DEVICE_NAME
    }

    fn description(&self) -> &'static str {
        DEVICE_DESCRIPTION
    }

    async fn initialize(&mut self) -> AppResult<()> {
        if self.initialized {
            return Ok(());
        }
        info!("WdiAutofocus::initialize");

        let (limit_min, limit_max) = match self.load_device_limits().await {
            Ok(limits) => limits,
            Err(err) => {
                warn!(error = %err, "Attempt to connect to autofocus failed");
                return Err(err);
            }
        };
        self.config.limit_min = limit_min;
        self.config.limit_max = limit_max;
        self.confirmed_limits = ConfirmedLimits {
            min: Some(limit_min),
            max: Some(limit_max),
        };
        self.initialized = true;
        info!(limit_min, limit_max, "Autofocus initialized");
        Ok(())
    }

    async fn shutdown(&mut self) -> AppResult<()> {
        info!("WdiAutofocus::shutdown");
        self.initialized = false;
        self.confirmed_limits = ConfirmedLimits::default();
        let limit = self.command_timeout;
        if let Link::Connected(mut active) = std::mem::replace(&mut self.link, Link::Disconnected)
        {
            if let Err(err) = bounded(limit, "close", active.session.close()).await {
                warn!(error = %err, "Closing autofocus session failed");
            }
        }
        Ok(())
    }

    async fn busy(&mut self) -> bool {
        self.is_busy().await
    }
}

#[async_trait]
impl AutoFocus for WdiAutofocus {
    async fn full_focus(&mut self) -> AppResult<()> {
        debug!("WdiAutofocus::full_focus");
        self.focus_once(true).await
    }

    async fn incremental_focus(&mut self) -> AppResult<()> {
        debug!("WdiAutofocus::incremental_focus");
        self.focus_once(false).await
    }

    async fn set_continuous_focusing(&mut self, enabled: bool) -> AppResult<()> {
        if enabled {
            self.start_continuous_focus().await
        } else {
            self.stop_continuous_focus().await
        }
    }

    async fn continuous_focusing(&mut self) -> bool {
        self.is_continuous_focus_active().await
    }

    async fn is_continuous_focus_locked(&mut self) -> bool {
        self.is_focus_locked().await
    }

    async fn current_focus_score(&mut self) -> AppResult<f64> {
        debug!("WdiAutofocus::current_focus_score");
        let raw = self.read_focus_position().await?;
        Ok((f64::from(raw) / FOCUS_SCORE_DIVISOR).abs())
    }

    async fn set_offset(&mut self, offset: f64) -> AppResult<()> {
        debug!(offset, "WdiAutofocus::set_offset ignored");
        Ok(())
    }
}

impl Drop for WdiAutofocus {
    fn drop(&mut self) {
        if let Link::Connected(active) = &self.link {
            debug!(
                provider_id = active.session.provider_id(),
                "WdiAutofocus dropped with a live connection; releasing it"
            );
        }
    }
}
