//! Autofocus Hardware Layer
//!
//! Capability traits, the transport contracts the driver consumes, a simulated
//! transport, and the WDI autofocus driver itself.

pub mod capabilities;
pub mod mock;
pub mod transport;
pub mod wdi_autofocus;

pub use capabilities::{AutoFocus, Device};
pub use mock::{FocusCommand, MockAutofocusTransport, MockOperation};
pub use transport::{AutofocusSession, AutofocusTransport, ConnectionTarget, TransportError};
pub use wdi_autofocus::{ConnectionState, FailurePolicy, Operation, WdiAutofocus};
