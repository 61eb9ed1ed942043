//! Integration tests for the WDI autofocus driver
//!
//! These tests drive `WdiAutofocus` against `MockAutofocusTransport` and check
//! the lazy connection lifecycle, the failure policy and the device operations.

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use wdi_autofocus::config::{DeviceConfiguration, TransportConfig};
use wdi_autofocus::error::{AutofocusError, ErrorKind};
use wdi_autofocus::hardware::capabilities::{AutoFocus, Device};
use wdi_autofocus::hardware::mock::{FocusCommand, MockAutofocusTransport, MockOperation};
use wdi_autofocus::hardware::transport::{AxisHandle, LIMIT_MAX_SETTING, LIMIT_MIN_SETTING};
use wdi_autofocus::hardware::wdi_autofocus::{ConnectionState, WdiAutofocus};
use wdi_autofocus::properties::{ConfigField, PropertyValue};

fn setup(config: DeviceConfiguration) -> (MockAutofocusTransport, WdiAutofocus) {
    let transport = MockAutofocusTransport::new();
    let autofocus = WdiAutofocus::new(config, Arc::new(transport.clone()));
    (transport, autofocus)
}

fn default_setup() -> (MockAutofocusTransport, WdiAutofocus) {
    setup(DeviceConfiguration::default())
}

// =============================================================================
// Lazy connection
// =============================================================================

#[tokio::test]
async fn test_setters_before_first_use_connect_once_with_latest_values() {
    let (transport, mut autofocus) = default_setup();
    transport.add_device(4, 2).await;

    autofocus.set_wdi_host("10.0.0.1").unwrap();
    autofocus.set_wdi_port(28).unwrap();
    autofocus.set_wdi_host("10.0.0.2").unwrap();
    autofocus.set_focus_address(4).unwrap();
    autofocus.set_focus_axis(2).unwrap();
    autofocus.set_motion_port("COM7").unwrap();
    assert!(transport.connection_attempts().await.is_empty());

    autofocus.full_focus().await.unwrap();
    autofocus.incremental_focus().await.unwrap();

    let attempts = transport.connection_attempts().await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].host, "10.0.0.2");
    assert_eq!(attempts[0].port, 28);
    assert_eq!(attempts[0].motion_port, "COM7");
    assert_eq!(
        transport.resolved_axes().await,
        vec![AxisHandle { device: 4, axis: 2 }]
    );
}

#[tokio::test]
async fn test_host_change_invalidates_and_reconnects_to_new_host() {
    let (transport, mut autofocus) = default_setup();
    autofocus.set_wdi_host("alpha").unwrap();
    autofocus.full_focus().await.unwrap();
    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);

    autofocus.set_wdi_host("beta").unwrap();
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
    // The replaced session is released, not leaked.
    assert_eq!(transport.live_sessions(), 0);

    autofocus.incremental_focus().await.unwrap();
    let hosts: Vec<_> = transport
        .connection_attempts()
        .await
        .into_iter()
        .map(|target| target.host)
        .collect();
    assert_eq!(hosts, vec!["alpha", "beta"]);
    assert_eq!(transport.live_sessions(), 1);
}

#[tokio::test]
async fn test_every_connection_parameter_invalidates() {
    let (transport, mut autofocus) = default_setup();
    transport.add_device(3, 1).await;

    let changes: Vec<(ConfigField, PropertyValue)> = vec![
        (ConfigField::MotionPort, PropertyValue::String("COM3".into())),
        (ConfigField::WdiHost, PropertyValue::String("gamma".into())),
        (ConfigField::WdiPort, PropertyValue::Integer(1027)),
        (ConfigField::FocusAddress, PropertyValue::Integer(3)),
        (ConfigField::FocusAxis, PropertyValue::Integer(1)),
        (ConfigField::ObjectiveTurretAddress, PropertyValue::Integer(2)),
    ];

    for (field, value) in changes {
        autofocus.ensure_connected().await.unwrap();
        autofocus.set_config(field, value).await.unwrap();
        assert_eq!(
            autofocus.connection_state(),
            ConnectionState::Disconnected,
            "{:?} should invalidate the connection",
            field
        );
    }
}

#[tokio::test]
async fn test_limit_write_keeps_connection() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();

    autofocus.set_limit_max(12.5).await.unwrap();

    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);
    assert_eq!(transport.connection_attempts().await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_then_recovery() {
    let (transport, mut autofocus) = default_setup();
    autofocus.set_wdi_host("offline").unwrap();
    transport.set_reachable("offline", false).await;

    let err = autofocus.full_focus().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
    assert!(transport.commands().await.is_empty());

    transport.set_reachable("offline", true).await;
    assert_ok!(autofocus.full_focus().await);
    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);
    assert_eq!(transport.connection_attempts().await.len(), 2);
}

#[tokio::test]
async fn test_unresolvable_axis_leaves_no_partial_connection() {
    let (transport, mut autofocus) = default_setup();
    autofocus.set_focus_axis(5).unwrap();

    let err = autofocus.start_continuous_focus().await.unwrap_err();
    assert!(matches!(err, AutofocusError::Connection(_)));
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
    assert_eq!(transport.live_sessions(), 0);

    autofocus.set_focus_axis(1).unwrap();
    assert_ok!(autofocus.start_continuous_focus().await);
}

#[tokio::test]
async fn test_turret_resolution_follows_address_sign() {
    for (address, expected) in [(-1, vec![]), (0, vec![]), (2, vec![2u8])] {
        let config = DeviceConfiguration {
            objective_turret_address: address,
            ..DeviceConfiguration::default()
        };
        let (transport, mut autofocus) = setup(config);

        autofocus.ensure_connected().await.unwrap();
        assert_eq!(
            transport.resolved_devices().await,
            expected,
            "turret address {}",
            address
        );
    }
}

#[tokio::test]
async fn test_missing_turret_is_a_connection_error() {
    let (_transport, mut autofocus) = default_setup();
    autofocus.set_objective_turret_address(9).unwrap();

    let err = autofocus.ensure_connected().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
}

// =============================================================================
// Focus operations
// =============================================================================

#[tokio::test]
async fn test_focus_commands_reach_the_device() {
    let (transport, mut autofocus) = default_setup();

    autofocus.full_focus().await.unwrap();
    autofocus.incremental_focus().await.unwrap();
    autofocus.set_continuous_focusing(true).await.unwrap();
    assert!(autofocus.continuous_focusing().await);
    autofocus.set_continuous_focusing(false).await.unwrap();
    assert!(!autofocus.continuous_focusing().await);

    assert_eq!(
        transport.commands().await,
        vec![
            FocusCommand::FocusOnce { scan: true },
            FocusCommand::FocusOnce { scan: false },
            FocusCommand::StartLoop,
            FocusCommand::StopLoop,
        ]
    );
}

#[tokio::test]
async fn test_focus_score_is_absolute_raw_over_1024() {
    let (transport, mut autofocus) = default_setup();

    transport.set_raw_position(-2048).await;
    assert_eq!(autofocus.current_focus_score().await.unwrap(), 2.0);

    transport.set_raw_position(512).await;
    assert_eq!(autofocus.current_focus_score().await.unwrap(), 0.5);
    assert_eq!(autofocus.last_focus_score().await.unwrap(), 0.5);

    let reads = transport.register_reads().await;
    assert_eq!(reads.len(), 3);
    assert!(reads
        .iter()
        .all(|r| r.channel == 41 && r.length == 4 && r.count == 1 && r.offset == 0 && r.mode == "t"));
}

#[tokio::test]
async fn test_commands_propagate_communication_errors() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();

    transport.fail(MockOperation::FocusOnce).await;
    transport.fail(MockOperation::StartFocusLoop).await;
    transport.fail(MockOperation::StopFocusLoop).await;
    transport.fail(MockOperation::GenericRead).await;

    for err in [
        autofocus.full_focus().await.unwrap_err(),
        autofocus.incremental_focus().await.unwrap_err(),
        autofocus.start_continuous_focus().await.unwrap_err(),
        autofocus.stop_continuous_focus().await.unwrap_err(),
        autofocus.current_focus_score().await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Communication, "{}", err);
    }
    // Command failures do not tear the connection down.
    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_status_queries_report_false_on_failure() {
    let (transport, mut autofocus) = default_setup();
    autofocus.start_continuous_focus().await.unwrap();
    assert!(autofocus.is_busy().await);
    assert!(autofocus.is_continuous_focus_active().await);
    assert!(autofocus.is_focus_locked().await);

    transport.fail(MockOperation::IsBusy).await;
    transport.fail(MockOperation::Status).await;
    assert!(!autofocus.is_busy().await);
    assert!(!autofocus.is_continuous_focus_active().await);
    assert!(!autofocus.is_focus_locked().await);
    assert!(!autofocus.busy().await);
}

#[tokio::test]
async fn test_status_queries_report_false_when_unreachable() {
    let (transport, mut autofocus) = default_setup();
    transport.fail(MockOperation::Connect).await;

    assert!(!autofocus.is_busy().await);
    assert!(!autofocus.is_continuous_focus_active().await);
    assert!(!autofocus.is_continuous_focus_locked().await);
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_offset_and_auto_parameters_are_accepted() {
    let (transport, mut autofocus) = default_setup();

    assert_ok!(autofocus.set_offset(3.0).await);
    assert_eq!(autofocus.offset().await.unwrap(), 0.0);
    assert_ok!(autofocus.auto_set_parameters().await);
    assert!(transport.connection_attempts().await.is_empty());
}

// =============================================================================
// Soft limits
// =============================================================================

#[tokio::test]
async fn test_limit_min_pushes_scaled_value() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();

    autofocus.set_limit_min(1.25).await.unwrap();

    assert_eq!(
        transport.setting_writes().await,
        vec![(LIMIT_MIN_SETTING.to_string(), 1_250_000.0)]
    );
    assert_eq!(transport.setting(LIMIT_MIN_SETTING).await, Some(1_250_000.0));
}

#[tokio::test]
async fn test_failed_limit_push_keeps_requested_value() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();
    transport.fail(MockOperation::SetSetting).await;

    let err = autofocus.set_limit_min(2.0).await.unwrap_err();

    assert!(matches!(err, AutofocusError::Communication(_)));
    assert_eq!(autofocus.config().limit_min, 2.0);
    assert_eq!(
        autofocus.get_config(ConfigField::LimitMin),
        PropertyValue::Float(2.0)
    );
}

#[tokio::test]
async fn test_limit_written_before_initialize_survives_it() {
    let (transport, mut autofocus) = default_setup();

    autofocus.set_limit_min(1.5).await.unwrap();
    autofocus.initialize().await.unwrap();

    assert_eq!(autofocus.config().limit_min, 1.5);
    assert_eq!(transport.setting(LIMIT_MIN_SETTING).await, Some(1_500_000.0));
}

#[tokio::test]
async fn test_limit_retry_after_failed_push_reaches_device() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();

    transport.fail(MockOperation::SetSetting).await;
    assert_err!(autofocus.set_limit_min(2.0).await);
    transport.recover(MockOperation::SetSetting).await;

    assert_ok!(autofocus.set_limit_min(2.0).await);
    assert_eq!(transport.setting(LIMIT_MIN_SETTING).await, Some(2_000_000.0));
}

#[tokio::test]
async fn test_limit_write_to_unreachable_device_fails_and_keeps_value() {
    let (transport, mut autofocus) = default_setup();
    transport.fail(MockOperation::Connect).await;

    let err = autofocus.set_limit_max(10.0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(autofocus.config().limit_max, 10.0);

    transport.recover(MockOperation::Connect).await;
    assert_ok!(autofocus.set_limit_max(10.0).await);
    assert_eq!(transport.setting(LIMIT_MAX_SETTING).await, Some(10_000_000.0));
}

#[tokio::test]
async fn test_non_finite_limit_is_rejected() {
    let (_transport, mut autofocus) = default_setup();
    assert_err!(autofocus.set_limit_max(f64::NAN).await);
    assert_eq!(autofocus.config().limit_max, 25.0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_initialize_loads_device_limits() {
    let (transport, mut autofocus) = default_setup();
    transport.set_setting(LIMIT_MIN_SETTING, 500_000.0).await;
    transport.set_setting(LIMIT_MAX_SETTING, 18_000_000.0).await;

    autofocus.initialize().await.unwrap();

    assert!(autofocus.is_initialized());
    assert_eq!(autofocus.config().limit_min, 0.5);
    assert_eq!(autofocus.config().limit_max, 18.0);
    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);

    // Second call is a no-op.
    transport.set_setting(LIMIT_MAX_SETTING, 1_000_000.0).await;
    autofocus.initialize().await.unwrap();
    assert_eq!(autofocus.config().limit_max, 18.0);
    assert_eq!(transport.connection_attempts().await.len(), 1);
}

#[tokio::test]
async fn test_initialize_failure_leaves_device_uninitialized() {
    let (transport, mut autofocus) = default_setup();
    transport.fail(MockOperation::GetSetting).await;

    let err = autofocus.initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!autofocus.is_initialized());
    assert_eq!(autofocus.config().limit_max, 25.0);

    transport.recover(MockOperation::GetSetting).await;
    assert_ok!(autofocus.initialize().await);
    assert!(autofocus.is_initialized());
}

#[tokio::test]
async fn test_shutdown_closes_session_and_is_idempotent() {
    let (transport, mut autofocus) = default_setup();
    autofocus.initialize().await.unwrap();

    autofocus.shutdown().await.unwrap();
    autofocus.shutdown().await.unwrap();

    assert!(!autofocus.is_initialized());
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
    assert_eq!(transport.closed_sessions().await, 1);
    assert_eq!(transport.live_sessions(), 0);

    // The device stays usable and reconnects on demand.
    autofocus.full_focus().await.unwrap();
    assert_eq!(transport.connection_attempts().await.len(), 2);
}

#[tokio::test]
async fn test_drop_releases_connection() {
    let (transport, mut autofocus) = default_setup();
    autofocus.ensure_connected().await.unwrap();
    assert_eq!(transport.live_sessions(), 1);

    drop(autofocus);
    assert_eq!(transport.live_sessions(), 0);
}

#[tokio::test]
async fn test_device_identity() {
    let (_transport, autofocus) = default_setup();
    assert_eq!(autofocus.name(), "WdiAutofocus");
    assert_eq!(autofocus.description(), "Zaber WDI Autofocus device adapter");
}

// =============================================================================
// Timeouts
// =============================================================================

fn short_timeouts() -> TransportConfig {
    TransportConfig {
        connect_timeout_ms: 50,
        command_timeout_ms: 50,
    }
}

#[tokio::test]
async fn test_slow_connect_is_a_connection_error() {
    let (transport, autofocus) = default_setup();
    let mut autofocus = autofocus.with_timeouts(&short_timeouts());
    transport.set_latency(Duration::from_millis(300)).await;

    let err = autofocus.ensure_connected().await.unwrap_err();
    assert!(matches!(err, AutofocusError::Connection(_)), "{}", err);
    assert_eq!(autofocus.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_slow_command_is_a_communication_error() {
    let (transport, autofocus) = default_setup();
    let mut autofocus = autofocus.with_timeouts(&short_timeouts());
    autofocus.ensure_connected().await.unwrap();
    transport.set_latency(Duration::from_millis(300)).await;

    let err = autofocus.full_focus().await.unwrap_err();
    assert!(matches!(err, AutofocusError::Communication(_)), "{}", err);
    assert!(err.to_string().contains("timed out"));
    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);
}
