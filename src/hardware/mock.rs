//! Mock Transport
//!
//! Simulated autofocus transport for testing without the motion-control network.
//! All waiting uses `tokio::time::sleep`, never `std::thread::sleep`.
//!
//! The mock keeps one shared state behind an `Arc`, so a test can hold a clone of
//! the transport, hand another clone to the driver, and then:
//! - Inject failures per operation ([`MockOperation`]) or make hosts unreachable
//! - Add latency to every call to exercise timeouts
//! - Inspect what the driver did: connection attempts, resolved addresses,
//!   setting writes, focus commands, register reads and session lifetimes
//!
//! # Simulated device
//!
//! - Register 41 returns the configured raw focus position
//! - The focus axis reports busy while the focus loop runs
//! - Tracking limits default to 0 and 25 mm, stored in native units

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, Duration};

use crate::config::SimulationConfig;
use crate::hardware::transport::{
    AutofocusSession, AutofocusTransport, AxisHandle, ConnectionTarget, DeviceHandle,
    FocusHandle, FocusStatus, RegisterRead, TransportError, TransportResult, LIMIT_MAX_SETTING,
    LIMIT_MIN_SETTING,
};

/// Register holding the raw focus position.
const POSITION_REGISTER: u32 = 41;

/// Transport operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// Opening a session
    Connect,
    /// Resolving a device axis
    ResolveAxis,
    /// Resolving a device
    ResolveDevice,
    /// Axis busy query
    IsBusy,
    /// Axis setting read
    GetSetting,
    /// Axis setting write
    SetSetting,
    /// Autofocus status query
    Status,
    /// Single focus command
    FocusOnce,
    /// Focus loop start
    StartFocusLoop,
    /// Focus loop stop
    StopFocusLoop,
    /// Register read
    GenericRead,
}

impl MockOperation {
    fn command_name(self) -> &'static str {
        match self {
            MockOperation::Connect => "connect",
            MockOperation::ResolveAxis => "resolve_axis",
            MockOperation::ResolveDevice => "resolve_device",
            MockOperation::IsBusy => "is_busy",
            MockOperation::GetSetting => "get_setting",
            MockOperation::SetSetting => "set_setting",
            MockOperation::Status => "status",
            MockOperation::FocusOnce => "focus_once",
            MockOperation::StartFocusLoop => "start_focus_loop",
            MockOperation::StopFocusLoop => "stop_focus_loop",
            MockOperation::GenericRead => "generic_read",
        }
    }
}

/// Focus command received by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusCommand {
    /// Single focus, with or without a range scan
    FocusOnce {
        /// Whether the full range was scanned
        scan: bool,
    },
    /// Continuous focus loop started
    StartLoop,
    /// Continuous focus loop stopped
    StopLoop,
}

#[derive(Debug)]
struct MockState {
    unreachable_hosts: HashSet<String>,
    devices: BTreeMap<u8, u8>,
    settings: HashMap<String, f64>,
    raw_position: i32,
    in_focus: bool,
    motion_busy: bool,
    loop_running: bool,
    latency: Duration,
    failing: HashSet<MockOperation>,
    next_provider_id: u32,
    connection_attempts: Vec<ConnectionTarget>,
    resolved_axes: Vec<AxisHandle>,
    resolved_devices: Vec<u8>,
    setting_writes: Vec<(String, f64)>,
    commands: Vec<FocusCommand>,
    register_reads: Vec<RegisterRead>,
    closed_sessions: usize,
}

impl MockState {
    fn from_simulation(sim: &SimulationConfig) -> Self {
        let mut settings = HashMap::new();
        settings.insert(LIMIT_MIN_SETTING.to_string(), 0.0);
        settings.insert(LIMIT_MAX_SETTING.to_string(), 25_000_000.0);

        Self {
            unreachable_hosts: sim.unreachable_hosts.iter().cloned().collect(),
            devices: sim.devices.iter().map(|d| (d.address, d.axes)).collect(),
            settings,
            raw_position: sim.raw_position,
            in_focus: sim.in_focus,
            motion_busy: false,
            loop_running: false,
            latency: Duration::from_millis(sim.latency_ms),
            failing: HashSet::new(),
            next_provider_id: 1,
            connection_attempts: Vec::new(),
            resolved_axes: Vec::new(),
            resolved_devices: Vec::new(),
            setting_writes: Vec::new(),
            commands: Vec::new(),
            register_reads: Vec::new(),
            closed_sessions: 0,
        }
    }

    fn check(&self, op: MockOperation) -> TransportResult<()> {
        if self.failing.contains(&op) {
            return Err(TransportError::CommandFailed {
                command: op.command_name().to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Simulated autofocus transport.
///
/// # Example
///
/// ```rust,ignore
/// let transport = MockAutofocusTransport::new();
/// transport.fail(MockOperation::IsBusy).await;
/// let mut autofocus = WdiAutofocus::new(config, Arc::new(transport.clone()));
/// assert!(!autofocus.is_busy().await);
/// ```
#[derive(Clone)]
pub struct MockAutofocusTransport {
    state: Arc<Mutex<MockState>>,
    live_sessions: Arc<AtomicUsize>,
}

impl MockAutofocusTransport {
    /// Create a mock with the default simulated network (focus stage at 1, turret at 2).
    pub fn new() -> Self {
        Self::from_simulation(&SimulationConfig::default())
    }

    /// Create a mock from the `[simulation]` configuration section.
    pub fn from_simulation(sim: &SimulationConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::from_simulation(sim))),
            live_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make a host refuse (`false`) or accept (`true`) connections.
    pub async fn set_reachable(&self, host: &str, reachable: bool) {
        let mut state = self.state.lock().await;
        if reachable {
            state.unreachable_hosts.remove(host);
        } else {
            state.unreachable_hosts.insert(host.to_string());
        }
    }

    /// Make every call of `op` fail until [`Self::recover`] is called.
    pub async fn fail(&self, op: MockOperation) {
        self.state.lock().await.failing.insert(op);
    }

    /// Stop failing `op`.
    pub async fn recover(&self, op: MockOperation) {
        self.state.lock().await.failing.remove(&op);
    }

    /// Add a device to the simulated network.
    pub async fn add_device(&self, address: u8, axes: u8) {
        self.state.lock().await.devices.insert(address, axes);
    }

    /// Set the raw value of the focus position register.
    pub async fn set_raw_position(&self, raw: i32) {
        self.state.lock().await.raw_position = raw;
    }

    /// Set the "in focus" status flag.
    pub async fn set_in_focus(&self, in_focus: bool) {
        self.state.lock().await.in_focus = in_focus;
    }

    /// Mark the focus axis as moving independently of the focus loop.
    pub async fn set_motion_busy(&self, busy: bool) {
        self.state.lock().await.motion_busy = busy;
    }

    /// Delay every subsequent call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Set an axis setting in native units.
    pub async fn set_setting(&self, name: &str, value: f64) {
        self.state
            .lock()
            .await
            .settings
            .insert(name.to_string(), value);
    }

    /// Current value of an axis setting in native units.
    pub async fn setting(&self, name: &str) -> Option<f64> {
        self.state.lock().await.settings.get(name).copied()
    }

    /// Every connection attempt, successful or not, in order.
    pub async fn connection_attempts(&self) -> Vec<ConnectionTarget> {
        self.state.lock().await.connection_attempts.clone()
    }

    /// Every axis resolved, in order.
    pub async fn resolved_axes(&self) -> Vec<AxisHandle> {
        self.state.lock().await.resolved_axes.clone()
    }

    /// Every device address resolved without axis, in order.
    pub async fn resolved_devices(&self) -> Vec<u8> {
        self.state.lock().await.resolved_devices.clone()
    }

    /// Every accepted setting write, in native units.
    pub async fn setting_writes(&self) -> Vec<(String, f64)> {
        self.state.lock().await.setting_writes.clone()
    }

    /// Every accepted focus command, in order.
    pub async fn commands(&self) -> Vec<FocusCommand> {
        self.state.lock().await.commands.clone()
    }

    /// Every accepted register read, in order.
    pub async fn register_reads(&self) -> Vec<RegisterRead> {
        self.state.lock().await.register_reads.clone()
    }

    /// Whether the continuous focus loop is running.
    pub async fn loop_running(&self) -> bool {
        self.state.lock().await.loop_running
    }

    /// Number of sessions closed explicitly.
    pub async fn closed_sessions(&self) -> usize {
        self.state.lock().await.closed_sessions
    }

    /// Number of sessions currently alive (opened and not yet dropped).
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    async fn delay(state: &Mutex<MockState>) {
        let latency = state.lock().await.latency;
        if !latency.is_zero() {
            sleep(latency).await;
        }
    }
}

impl Default for MockAutofocusTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutofocusTransport for MockAutofocusTransport {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> TransportResult<Box<dyn AutofocusSession>> {
        Self::delay(&self.state).await;

        let mut state = self.state.lock().await;
        state.connection_attempts.push(target.clone());
        state.check(MockOperation::Connect)?;
        if state.unreachable_hosts.contains(&target.host) {
            return Err(TransportError::Unreachable(target.to_string()));
        }

        let provider_id = state.next_provider_id;
        state.next_provider_id += 1;
        self.live_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%target, provider_id, "MockAutofocusTransport: session opened");

        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            live_sessions: Arc::clone(&self.live_sessions),
            provider_id,
            closed: false,
        }))
    }
}

/// Session handed out by [`MockAutofocusTransport`].
struct MockSession {
    state: Arc<Mutex<MockState>>,
    live_sessions: Arc<AtomicUsize>,
    provider_id: u32,
    closed: bool,
}

impl MockSession {
    /// Apply latency, then lock the state and check for closure and injected faults.
    async fn begin(&self, op: MockOperation) -> TransportResult<MutexGuard<'_, MockState>> {
        MockAutofocusTransport::delay(&self.state).await;
        if self.closed {
            return Err(TransportError::Closed);
        }
        let state = self.state.lock().await;
        state.check(op)?;
        Ok(state)
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutofocusSession for MockSession {
    fn provider_id(&self) -> u32 {
        self.provider_id
    }

    async fn resolve_axis(&self, device: u8, axis: u8) -> TransportResult<AxisHandle> {
        let mut state = self.begin(MockOperation::ResolveAxis).await?;
        let axes = *state
            .devices
            .get(&device)
            .ok_or(TransportError::DeviceNotFound(device))?;
        if axis == 0 || axis > axes {
            return Err(TransportError::AxisNotFound { device, axis });
        }
        let handle = AxisHandle { device, axis };
        state.resolved_axes.push(handle);
        Ok(handle)
    }

    async fn resolve_device(&self, address: u8) -> TransportResult<DeviceHandle> {
        let mut state = self.begin(MockOperation::ResolveDevice).await?;
        if !state.devices.contains_key(&address) {
            return Err(TransportError::DeviceNotFound(address));
        }
        state.resolved_devices.push(address);
        Ok(DeviceHandle { address })
    }

    async fn is_busy(&self, _axis: AxisHandle) -> TransportResult<bool> {
        let state = self.begin(MockOperation::IsBusy).await?;
        Ok(state.loop_running || state.motion_busy)
    }

    async fn get_setting(&self, _axis: AxisHandle, name: &str) -> TransportResult<f64> {
        let state = self.begin(MockOperation::GetSetting).await?;
        state
            .settings
            .get(name)
            .copied()
            .ok_or_else(|| TransportError::CommandFailed {
                command: "get_setting".to_string(),
                reason: format!("unknown setting '{}'", name),
            })
    }

    async fn set_setting(&self, _axis: AxisHandle, name: &str, value: f64) -> TransportResult<()> {
        let mut state = self.begin(MockOperation::SetSetting).await?;
        state.settings.insert(name.to_string(), value);
        state.setting_writes.push((name.to_string(), value));
        Ok(())
    }

    async fn status(&self, _focus: &FocusHandle) -> TransportResult<FocusStatus> {
        let state = self.begin(MockOperation::Status).await?;
        Ok(FocusStatus {
            in_focus: state.in_focus,
        })
    }

    async fn focus_once(&self, _focus: &FocusHandle, scan: bool) -> TransportResult<()> {
        let mut state = self.begin(MockOperation::FocusOnce).await?;
        state.commands.push(FocusCommand::FocusOnce { scan });
        Ok(())
    }

    async fn start_focus_loop(&self, _focus: &FocusHandle) -> TransportResult<()> {
        let mut state = self.begin(MockOperation::StartFocusLoop).await?;
        state.loop_running = true;
        state.commands.push(FocusCommand::StartLoop);
        Ok(())
    }

    async fn stop_focus_loop(&self, _focus: &FocusHandle) -> TransportResult<()> {
        let mut state = self.begin(MockOperation::StopFocusLoop).await?;
        state.loop_running = false;
        state.commands.push(FocusCommand::StopLoop);
        Ok(())
    }

    async fn generic_read(&self, request: &RegisterRead) -> TransportResult<Vec<i32>> {
        let mut state = self.begin(MockOperation::GenericRead).await?;
        if request.channel != POSITION_REGISTER {
            return Err(TransportError::CommandFailed {
                command: "generic_read".to_string(),
                reason: format!("unknown register {}", request.channel),
            });
        }
        state.register_reads.push(request.clone());
        let mut values = vec![0; request.count as usize];
        if let Some(first) = values.first_mut() {
            *first = state.raw_position;
        }
        Ok(values)
    }

    async fn close(&mut self) -> TransportResult<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().await.closed_sessions += 1;
            tracing::debug!(provider_id = self.provider_id, "MockAutofocusTransport: session closed");
        }
        Ok(())
    }
}
