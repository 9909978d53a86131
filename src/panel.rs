use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::lifecycle::StatusEvent;

/// What the deposit form shows: the output area and the last status line.
///
/// A generation result replaces the output text; each verification result
/// is appended on a new line. Nothing trims the output between generations,
/// so repeated verifies grow it without bound.
///
/// Whether Verify is enabled is not tracked here. Events can be dropped when
/// a reader lags, so enablement is read from the session's proof state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPanel {
    pub output: String,
    pub last_status: Option<String>,
}

impl OutputPanel {
    pub fn apply(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Status { message } => {
                self.last_status = Some(message.clone());
            }
            StatusEvent::HandleAvailable { .. } => {}
            StatusEvent::GenerationResult { message, .. } => {
                self.output = message.clone();
                self.last_status = Some(message.clone());
            }
            StatusEvent::VerificationResult { message, .. } => {
                self.output.push('\n');
                self.output.push_str(message);
                self.last_status = Some(message.clone());
            }
        }
    }
}

/// An [`OutputPanel`] kept current from a session's event stream.
pub struct PanelFeed {
    panel: OutputPanel,
    events: broadcast::Receiver<StatusEvent>,
}

impl PanelFeed {
    pub fn new(events: broadcast::Receiver<StatusEvent>) -> Self {
        Self {
            panel: OutputPanel::default(),
            events,
        }
    }

    /// Apply every pending event, then return the panel.
    pub fn refresh(&mut self) -> &OutputPanel {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.panel.apply(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Output panel lagged; {} status events dropped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        &self.panel
    }
}
