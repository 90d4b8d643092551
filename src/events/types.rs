//! Mode event payloads.

use serde::{Deserialize, Serialize};

/// Events published by the mode controller.
///
/// `TeardownWarning` is the required side channel for non-fatal teardown
/// failures: a switch can succeed while old-instance cleanup leaks, and
/// operators must still see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModeEvent {
    SwitchStarted {
        from: Option<String>,
        to: String,
    },
    SwitchCompleted {
        mode: String,
    },
    SwitchFailed {
        target: String,
        reason: String,
    },
    TeardownWarning {
        mode: String,
        reason: String,
    },
    ControllerShutdown {
        last_mode: Option<String>,
    },
}
