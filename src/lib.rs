//! Motor controller core for an ATmega128 scooter ESC
//!
//! Sampling, regulation, pulse output, odometry and persistence are
//! portable and tested on the host. Register-level drivers live in
//! [`hal`] and are only built for AVR.

#![cfg_attr(not(test), no_std)]

pub mod application;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod drivers;
pub mod logger;
pub mod os;

#[cfg(target_arch = "avr")]
pub mod hal;

pub use application::Application;
pub use controller::{ControlIo, Context, EventSources, GuardError, HaltGuard, Telemetry};
pub use logger::{LogType, Logger};
