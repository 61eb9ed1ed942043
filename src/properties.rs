//! Property dispatch table
//!
//! The host framework addresses device settings by property name. Instead of
//! one callback object per property, the driver keeps a static table mapping
//! each name to a typed [`ConfigField`], its value kind and its limits; the
//! driver then dispatches reads and writes on the field.

use std::ops::RangeInclusive;

use crate::error::{AppResult, AutofocusError};
use crate::validation::{
    AXIS_NUMBER_RANGE, DEVICE_ADDRESS_RANGE, TCP_PORT_RANGE, TURRET_ADDRESS_RANGE,
};

/// Device name property.
pub const NAME: &str = "Name";
/// Device description property.
pub const DESCRIPTION: &str = "Description";
/// Motion-control port property.
pub const MOTION_PORT: &str = "Zaber Serial Port";
/// WDI provider host property.
pub const WDI_HOST: &str = "WDI Hostname/IP";
/// WDI provider TCP port property.
pub const WDI_PORT: &str = "WDI Port";
/// Focus stage device address property.
pub const FOCUS_ADDRESS: &str = "Focus Stage Device Number";
/// Focus stage axis property.
pub const FOCUS_AXIS: &str = "Focus Stage Axis Number";
/// Objective turret device address property.
pub const OBJECTIVE_TURRET_ADDRESS: &str = "Objective Turret Device Number";
/// Lower soft limit property.
pub const LIMIT_MIN: &str = "Limit Min [mm]";
/// Upper soft limit property.
pub const LIMIT_MAX: &str = "Limit Max [mm]";

/// Configuration field a property maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    /// Device name (read-only)
    Name,
    /// Device description (read-only)
    Description,
    /// Motion-control port
    MotionPort,
    /// WDI provider host
    WdiHost,
    /// WDI provider TCP port
    WdiPort,
    /// Focus stage device address
    FocusAddress,
    /// Focus stage axis number
    FocusAxis,
    /// Objective turret device address
    ObjectiveTurretAddress,
    /// Lower soft limit in mm
    LimitMin,
    /// Upper soft limit in mm
    LimitMax,
}

impl ConfigField {
    /// Whether writing this field drops the current connection.
    pub fn invalidates_connection(self) -> bool {
        matches!(
            self,
            ConfigField::MotionPort
                | ConfigField::WdiHost
                | ConfigField::WdiPort
                | ConfigField::FocusAddress
                | ConfigField::FocusAxis
                | ConfigField::ObjectiveTurretAddress
        )
    }

    /// Descriptor of this field in [`PROPERTIES`].
    pub fn descriptor(self) -> &'static PropertyDescriptor {
        let index = match self {
            ConfigField::Name => 0,
            ConfigField::Description => 1,
            ConfigField::MotionPort => 2,
            ConfigField::WdiHost => 3,
            ConfigField::WdiPort => 4,
            ConfigField::FocusAddress => 5,
            ConfigField::FocusAxis => 6,
            ConfigField::ObjectiveTurretAddress => 7,
            ConfigField::LimitMin => 8,
            ConfigField::LimitMax => 9,
        };
        &PROPERTIES[index]
    }

    /// Accepted integer values; unbounded for fields without limits.
    pub fn integer_range(self) -> RangeInclusive<i64> {
        self.descriptor()
            .limits
            .clone()
            .unwrap_or(i64::MIN..=i64::MAX)
    }
}

/// Value kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Text
    String,
    /// Whole number
    Integer,
    /// Floating point number
    Float,
}

impl PropertyKind {
    fn label(self) -> &'static str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Integer => "integer",
            PropertyKind::Float => "float",
        }
    }
}

/// A property value as exchanged with the host.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Text value
    String(String),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
}

impl PropertyValue {
    /// Kind of this value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::String(_) => PropertyKind::String,
            PropertyValue::Integer(_) => PropertyKind::Integer,
            PropertyValue::Float(_) => PropertyKind::Float,
        }
    }

    /// Parse text into a value of `kind`, e.g. from a command line.
    pub fn parse(name: &str, kind: PropertyKind, text: &str) -> AppResult<Self> {
        let mismatch = || AutofocusError::PropertyKindMismatch {
            name: name.to_string(),
            expected: kind.label(),
        };
        match kind {
            PropertyKind::String => Ok(PropertyValue::String(text.to_string())),
            PropertyKind::Integer => text
                .trim()
                .parse()
                .map(PropertyValue::Integer)
                .map_err(|_| mismatch()),
            PropertyKind::Float => text
                .trim()
                .parse()
                .map(PropertyValue::Float)
                .map_err(|_| mismatch()),
        }
    }

    /// Text content, for string properties.
    pub fn as_str(&self, name: &str) -> AppResult<&str> {
        match self {
            PropertyValue::String(s) => Ok(s),
            _ => Err(AutofocusError::PropertyKindMismatch {
                name: name.to_string(),
                expected: PropertyKind::String.label(),
            }),
        }
    }

    /// Integer content, for integer properties.
    pub fn as_integer(&self, name: &str) -> AppResult<i64> {
        match self {
            PropertyValue::Integer(v) => Ok(*v),
            _ => Err(AutofocusError::PropertyKindMismatch {
                name: name.to_string(),
                expected: PropertyKind::Integer.label(),
            }),
        }
    }

    /// Float content; integers widen.
    pub fn as_float(&self, name: &str) -> AppResult<f64> {
        match self {
            PropertyValue::Float(v) => Ok(*v),
            PropertyValue::Integer(v) => Ok(*v as f64),
            PropertyValue::String(_) => Err(AutofocusError::PropertyKindMismatch {
                name: name.to_string(),
                expected: PropertyKind::Float.label(),
            }),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Static description of one property.
#[derive(Debug)]
pub struct PropertyDescriptor {
    /// Name the host uses
    pub name: &'static str,
    /// Field the property maps to
    pub field: ConfigField,
    /// Value kind
    pub kind: PropertyKind,
    /// Whether writes are rejected
    pub read_only: bool,
    /// Whether the property exists before initialization
    pub pre_init: bool,
    /// Allowed integer range, if limited
    pub limits: Option<RangeInclusive<i64>>,
}

impl PropertyDescriptor {
    /// Whether writing this property drops the current connection.
    pub fn invalidates_connection(&self) -> bool {
        self.field.invalidates_connection()
    }
}

/// All properties of the autofocus device, in registration order.
pub static PROPERTIES: [PropertyDescriptor; 10] = [
    PropertyDescriptor {
        name: NAME,
        field: ConfigField::Name,
        kind: PropertyKind::String,
        read_only: true,
        pre_init: true,
        limits: None,
    },
    PropertyDescriptor {
        name: DESCRIPTION,
        field: ConfigField::Description,
        kind: PropertyKind::String,
        read_only: true,
        pre_init: true,
        limits: None,
    },
    PropertyDescriptor {
        name: MOTION_PORT,
        field: ConfigField::MotionPort,
        kind: PropertyKind::String,
        read_only: false,
        pre_init: true,
        limits: None,
    },
    PropertyDescriptor {
        name: WDI_HOST,
        field: ConfigField::WdiHost,
        kind: PropertyKind::String,
        read_only: false,
        pre_init: true,
        limits: None,
    },
    PropertyDescriptor {
        name: WDI_PORT,
        field: ConfigField::WdiPort,
        kind: PropertyKind::Integer,
        read_only: false,
        pre_init: true,
        limits: Some(TCP_PORT_RANGE),
    },
    PropertyDescriptor {
        name: FOCUS_ADDRESS,
        field: ConfigField::FocusAddress,
        kind: PropertyKind::Integer,
        read_only: false,
        pre_init: true,
        limits: Some(DEVICE_ADDRESS_RANGE),
    },
    PropertyDescriptor {
        name: FOCUS_AXIS,
        field: ConfigField::FocusAxis,
        kind: PropertyKind::Integer,
        read_only: false,
        pre_init: true,
        limits: Some(AXIS_NUMBER_RANGE),
    },
    PropertyDescriptor {
        name: OBJECTIVE_TURRET_ADDRESS,
        field: ConfigField::ObjectiveTurretAddress,
        kind: PropertyKind::Integer,
        read_only: false,
        pre_init: true,
        limits: Some(TURRET_ADDRESS_RANGE),
    },
    PropertyDescriptor {
        name: LIMIT_MIN,
        field: ConfigField::LimitMin,
        kind: PropertyKind::Float,
        read_only: false,
        pre_init: false,
        limits: None,
    },
    PropertyDescriptor {
        name: LIMIT_MAX,
        field: ConfigField::LimitMax,
        kind: PropertyKind::Float,
        read_only: false,
        pre_init: false,
        limits: None,
    },
];

/// Look up a property by name.
pub fn descriptor(name: &str) -> AppResult<&'static PropertyDescriptor> {
    PROPERTIES
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| AutofocusError::UnknownProperty(name.to_string()))
}
