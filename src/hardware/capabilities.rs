//! Device Capabilities
//!
//! Traits describing what the host device-management framework can ask of a
//! device. A device implements the capabilities it supports:
//!
//! - [`Device`]: lifecycle and busy state, implemented by every device
//! - [`AutoFocus`]: focus commands, focus score and continuous focusing
//!
//! # Contract
//!
//! - All methods take `&mut self`: one owner drives a device at a time, and the
//!   borrow checker enforces it instead of an internal lock
//! - Every call runs to completion (or failure) before returning
//! - Query methods returning `bool` never fail; a failed query reads as `false`

use async_trait::async_trait;

use crate::error::AppResult;

/// Capability: Device lifecycle
#[async_trait]
pub trait Device: Send {
    /// Device name as registered with the host.
    fn name(&self) -> &'static str;

    /// Human readable description.
    fn description(&self) -> &'static str;

    /// Connect and read initial state. Calling it again is a no-op.
    async fn initialize(&mut self) -> AppResult<()>;

    /// Release the connection. Calling it again is a no-op.
    async fn shutdown(&mut self) -> AppResult<()>;

    /// Whether the device is executing a command.
    async fn busy(&mut self) -> bool;
}

/// Capability: Autofocus
///
/// Devices that can focus a sample (single shot or continuously) and report a
/// focus score.
#[async_trait]
pub trait AutoFocus: Device {
    /// Focus once after scanning the full range.
    async fn full_focus(&mut self) -> AppResult<()>;

    /// Focus once from the current position.
    async fn incremental_focus(&mut self) -> AppResult<()>;

    /// Start or stop continuous focusing.
    async fn set_continuous_focusing(&mut self, enabled: bool) -> AppResult<()>;

    /// Whether continuous focusing is running.
    async fn continuous_focusing(&mut self) -> bool;

    /// Whether continuous focusing holds the sample in focus.
    async fn is_continuous_focus_locked(&mut self) -> bool;

    /// Focus score measured now.
    async fn current_focus_score(&mut self) -> AppResult<f64>;

    /// Focus score of the last focus operation.
    ///
    /// # Default Implementation
    /// Measures the current score.
    async fn last_focus_score(&mut self) -> AppResult<f64> {
        self.current_focus_score().await
    }

    /// Focus offset.
    ///
    /// # Default Implementation
    /// Devices without offset support report `0.0`.
    async fn offset(&mut self) -> AppResult<f64> {
        Ok(0.0)
    }

    /// Set the focus offset.
    ///
    /// # Default Implementation
    /// Accepted and ignored.
    async fn set_offset(&mut self, _offset: f64) -> AppResult<()> {
        Ok(())
    }

    /// Let the device choose its own focus parameters.
    ///
    /// # Default Implementation
    /// Accepted and ignored.
    async fn auto_set_parameters(&mut self) -> AppResult<()> {
        Ok(())
    }
}
