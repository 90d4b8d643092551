//! gadgetswitch - Dynamic USB gadget mode switching service
//!
//! This crate provides the core functionality for gadgetswitch, a daemon
//! that re-presents a single USB device-controller port as different gadget
//! identities (mass storage, network adapter, serial console) at runtime.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gadget;
pub mod profile;
pub mod registry;
pub mod transport;
pub mod trigger;

pub use controller::ModeController;
pub use error::{AppError, Result};
pub use registry::{Template, TemplateRegistry};
