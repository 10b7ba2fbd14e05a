//! Radio device implementations
//!
//! Each device consumes `RadioCommand`s from the node task and delivers
//! `ReceivedFrame`s back to it:
//!
//! - `echo`: loops transmitted packets back to the same node
//! - `simulator`: connects the node to an in-process network simulator

#[cfg(feature = "radio-device-echo")]
pub mod echo;

#[cfg(feature = "radio-device-simulator")]
pub mod simulator;

#[cfg(feature = "radio-device-echo")]
pub use echo::{radio_device_task, RadioDevice};

#[cfg(feature = "radio-device-simulator")]
pub use simulator::{radio_device_task, RadioDevice};
