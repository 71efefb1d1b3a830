//! Report handler run by the workers: decode, then emit to the session's
//! virtual device

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use xpad360_protocol::{decode, Packet, ReportBuffer};

use crate::pool::ReportHandler;
use crate::session::{SessionDirectory, SessionKey};
use crate::uinput::{VirtualInput, VirtualInputError};

/// Decodes reports and forwards input events to the owning session
pub struct ReportSink<V: VirtualInput> {
    directory: Arc<SessionDirectory<V>>,
}

impl<V: VirtualInput> ReportSink<V> {
    pub fn new(directory: Arc<SessionDirectory<V>>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<SessionDirectory<V>> {
        &self.directory
    }
}

impl<V: VirtualInput> ReportHandler for ReportSink<V> {
    fn handle(&self, report: &ReportBuffer, session: SessionKey) {
        match decode(report) {
            Packet::LedStatus { pattern } => {
                info!("{}: controller LED status {}", session, pattern);
            }
            Packet::RumbleStatus { value } => {
                debug!("{}: rumble status {}", session, value);
            }
            Packet::AttachmentDetected => {
                warn!("{}: attachment detected, attachments are not supported", session);
            }
            Packet::Input(input) => {
                let Some(port) = self.directory.get(session) else {
                    debug!("{} is gone, discarding input report", session);
                    return;
                };
                match port.emit(input.events()) {
                    Ok(()) => {}
                    Err(VirtualInputError::NotCreated | VirtualInputError::NotOpen) => {
                        debug!("{}: virtual device not live, discarding report", session);
                    }
                    Err(e) => warn!("{}: failed to write to uinput device: {}", session, e),
                }
            }
            Packet::Ignored { header } => {
                trace!("{}: ignoring packet with header 0x{:04X}", session, header);
            }
        }
    }
}
