//! Active instance - the live realization of one template.

use crate::error::TeardownError;
use crate::profile::{ActiveProfile, ProfileKind};

/// The one live identity instance, exclusively owned by the
/// [`ModeController`](super::ModeController).
///
/// `attached` mirrors the transport: `true` means the bus currently presents
/// this instance's identity, `false` means the bus is detached.
pub struct ActiveInstance {
    template_name: String,
    profile: Box<dyn ActiveProfile>,
    attached: bool,
}

impl ActiveInstance {
    pub fn new(template_name: impl Into<String>, profile: Box<dyn ActiveProfile>) -> Self {
        Self {
            template_name: template_name.into(),
            profile,
            attached: false,
        }
    }

    /// Name of the template this instance was built from.
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn kind(&self) -> ProfileKind {
        self.profile.kind()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn describe(&self) -> String {
        self.profile.describe()
    }

    /// Release the instance's resources. Consumes the instance; after this
    /// call nothing can reference the torn-down state.
    pub async fn teardown(mut self) -> Result<(), TeardownError> {
        self.profile.teardown().await
    }
}
