//! Hardware Abstraction Layer
//!
//! This module defines the seams between the driver and the integrator's
//! platform code: the raw register-bus transaction primitive and the
//! optional cross-thread hardware lock.
//!
//! # Modules
//!
//! - [`bus`]: `RegisterBus`, `SharedMem` and `HwLock` traits plus the
//!   `NoLock` default
//!
//! # Delay Integration
//!
//! All polling loops use `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your HAL.

pub mod bus;

// Re-export commonly used types
pub use bus::{HwLock, LockGuard, NoLock, RegisterBus, SharedMem};
