//! Focus-event driver
//!
//! The controller does not care how "the user returned to this screen" is
//! detected; any event source that can push into an mpsc channel works. The
//! driver simply forwards each signal to [`SessionController::check_session`]
//! and lets the controller's single-flight gate coalesce bursts.

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;

use crate::session::controller::SessionController;
use crate::settings::OAuthConfig;

/// Forward focus signals to the controller until the sender side is dropped.
pub async fn drive_focus_events(
    controller: Arc<SessionController>,
    config: OAuthConfig,
    mut focus: mpsc::Receiver<()>,
) {
    while focus.recv().await.is_some() {
        if let Err(err) = controller.check_session(&config).await {
            warn!("session check after focus event failed: {err}");
        }
    }
}
