//! Trigger adapters - the surfaces that ask the controller to switch.
//!
//! Adapters never run the switch sequence in a context that cannot block:
//! the control socket handles commands on tokio tasks, and the GPIO trigger
//! bridges its event thread to an async worker before touching the
//! controller.

pub mod control;
pub mod gpio;

pub use control::ControlSocket;
pub use gpio::GpioTrigger;
