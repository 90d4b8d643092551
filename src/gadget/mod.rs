//! ConfigFS USB gadget plumbing.
//!
//! Layering:
//! ```text
//! GadgetShell (gadget skeleton: descriptors, strings, configs/c.1)
//!     ├── profiles populate functions/ and link into configs/c.1
//!     └── UdcPort binds/unbinds the whole gadget to the UDC
//! ```

pub mod configfs;
pub mod shell;
pub mod udc;

pub use shell::{GadgetDescriptor, GadgetShell};
pub use udc::UdcPort;
