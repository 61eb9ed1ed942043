//! Integration tests for name-based property access
//!
//! Rejected writes must fail with a configuration error before the driver
//! talks to the transport.

use std::sync::Arc;

use wdi_autofocus::config::DeviceConfiguration;
use wdi_autofocus::error::{AutofocusError, ErrorKind};
use wdi_autofocus::hardware::mock::MockAutofocusTransport;
use wdi_autofocus::hardware::transport::LIMIT_MAX_SETTING;
use wdi_autofocus::hardware::wdi_autofocus::{ConnectionState, WdiAutofocus};
use wdi_autofocus::properties::{self, PropertyKind, PropertyValue, PROPERTIES};

fn setup() -> (MockAutofocusTransport, WdiAutofocus) {
    let transport = MockAutofocusTransport::new();
    let autofocus = WdiAutofocus::new(
        DeviceConfiguration::default(),
        Arc::new(transport.clone()),
    );
    (transport, autofocus)
}

#[tokio::test]
async fn test_every_property_is_readable() {
    let (_transport, autofocus) = setup();

    for descriptor in PROPERTIES.iter() {
        let value = autofocus.get_property(descriptor.name).unwrap();
        assert_eq!(value.kind(), descriptor.kind, "{}", descriptor.name);
    }
    assert_eq!(
        autofocus.get_property(properties::NAME).unwrap(),
        PropertyValue::String("WdiAutofocus".into())
    );
    assert_eq!(
        autofocus.get_property(properties::WDI_PORT).unwrap(),
        PropertyValue::Integer(27)
    );
    assert_eq!(
        autofocus
            .get_property(properties::OBJECTIVE_TURRET_ADDRESS)
            .unwrap(),
        PropertyValue::Integer(-1)
    );
}

#[tokio::test]
async fn test_writes_by_name_update_configuration() {
    let (transport, mut autofocus) = setup();

    autofocus
        .set_property(properties::WDI_HOST, PropertyValue::String("10.1.1.9".into()))
        .await
        .unwrap();
    autofocus
        .set_property(properties::WDI_PORT, PropertyValue::Integer(2700))
        .await
        .unwrap();

    let config = autofocus.config();
    assert_eq!(config.wdi_host, "10.1.1.9");
    assert_eq!(config.wdi_port, 2700);
    assert!(transport.connection_attempts().await.is_empty());

    // Limits go straight to the device, over the newly configured endpoint.
    autofocus
        .set_property(properties::LIMIT_MAX, PropertyValue::Integer(20))
        .await
        .unwrap();
    assert_eq!(autofocus.config().limit_max, 20.0);
    let attempts = transport.connection_attempts().await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].host, "10.1.1.9");
    assert_eq!(attempts[0].port, 2700);
    assert_eq!(
        transport.setting_writes().await,
        vec![(LIMIT_MAX_SETTING.to_string(), 20_000_000.0)]
    );
}

#[tokio::test]
async fn test_rejected_writes_never_touch_the_device() {
    let (transport, mut autofocus) = setup();
    autofocus.ensure_connected().await.unwrap();

    let rejected = [
        ("Gain", PropertyValue::Float(1.0)),
        (properties::NAME, PropertyValue::String("Other".into())),
        (properties::DESCRIPTION, PropertyValue::String("Other".into())),
        (properties::WDI_PORT, PropertyValue::String("27".into())),
        (properties::WDI_PORT, PropertyValue::Integer(0)),
        (properties::WDI_PORT, PropertyValue::Integer(70_000)),
        (properties::FOCUS_ADDRESS, PropertyValue::Integer(100)),
        (properties::FOCUS_AXIS, PropertyValue::Float(1.0)),
        (properties::OBJECTIVE_TURRET_ADDRESS, PropertyValue::Integer(-2)),
        (properties::WDI_HOST, PropertyValue::String("  ".into())),
        (properties::LIMIT_MIN, PropertyValue::String("1.0".into())),
        (properties::LIMIT_MIN, PropertyValue::Float(30.0)),
        (properties::LIMIT_MAX, PropertyValue::Integer(-5)),
    ];

    for (name, value) in rejected {
        let err = autofocus.set_property(name, value).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{}: {}", name, err);
    }

    assert_eq!(autofocus.connection_state(), ConnectionState::Connected);
    assert_eq!(transport.connection_attempts().await.len(), 1);
    assert!(transport.setting_writes().await.is_empty());
    assert_eq!(autofocus.config(), &DeviceConfiguration::default());
}

#[tokio::test]
async fn test_specific_rejection_variants() {
    let (_transport, mut autofocus) = setup();

    assert!(matches!(
        autofocus
            .set_property("Gain", PropertyValue::Integer(1))
            .await,
        Err(AutofocusError::UnknownProperty(_))
    ));
    assert!(matches!(
        autofocus
            .set_property(properties::NAME, PropertyValue::String("x".into()))
            .await,
        Err(AutofocusError::ReadOnlyProperty(_))
    ));
    assert!(matches!(
        autofocus
            .set_property(properties::FOCUS_AXIS, PropertyValue::String("1".into()))
            .await,
        Err(AutofocusError::PropertyKindMismatch { expected: "integer", .. })
    ));
    assert!(matches!(
        autofocus.get_property("Gain"),
        Err(AutofocusError::UnknownProperty(_))
    ));
}

#[tokio::test]
async fn test_text_values_parse_by_property_kind() {
    let (_transport, mut autofocus) = setup();

    for (name, text) in [
        (properties::FOCUS_ADDRESS, "2"),
        (properties::LIMIT_MIN, "0.75"),
        (properties::MOTION_PORT, "/dev/ttyUSB0"),
    ] {
        let kind = properties::descriptor(name).unwrap().kind;
        let value = PropertyValue::parse(name, kind, text).unwrap();
        autofocus.set_property(name, value).await.unwrap();
    }

    assert_eq!(autofocus.config().focus_address, 2);
    assert_eq!(autofocus.config().limit_min, 0.75);
    assert_eq!(autofocus.config().motion_port, "/dev/ttyUSB0");
    assert_eq!(
        properties::descriptor(properties::LIMIT_MIN).unwrap().kind,
        PropertyKind::Float
    );
}
