//! Event-dispatch loop
//!
//! A single task owns the [`DeviceManager`] and serializes everything that
//! touches sessions: hot-plug notifications, transfer completions and the
//! shutdown signal.

use futures::StreamExt;
use nusb::hotplug::HotplugEvent;
use nusb::DeviceInfo;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::lifecycle::DeviceManager;
use crate::pool::ReportDispatch;
use crate::transfer::TransferOutcome;
use crate::uinput::VirtualInput;
use crate::usb::{NusbHost, TransferCompletion};

/// Connected USB devices matching the configured controller identity
pub fn list_matching(config: &DriverConfig) -> anyhow::Result<Vec<DeviceInfo>> {
    Ok(nusb::list_devices()?
        .filter(|dev| config.matches(dev.vendor_id(), dev.product_id()))
        .collect())
}

fn attach<V, D>(manager: &mut DeviceManager<NusbHost, V, D>, device: &DeviceInfo)
where
    V: VirtualInput,
    D: ReportDispatch,
{
    info!(
        "Controller {:04x}:{:04x} found on bus {} address {}",
        device.vendor_id(),
        device.product_id(),
        device.bus_number(),
        device.device_address()
    );
    if !xpad360_protocol::is_supported(device.vendor_id(), device.product_id()) {
        warn!("Not a stock wired controller, attaching as configured");
    }
    // Failures are logged and fully unwound by the manager
    if let Err(e) = manager.attach(device) {
        debug!("Leaving {:?} unmanaged: {}", device.id(), e);
    }
}

/// Drive controllers until Ctrl-C
///
/// Devices already plugged in are attached first. Every session is
/// detached before returning.
pub async fn run<V, D>(
    manager: &mut DeviceManager<NusbHost, V, D>,
    mut completions: mpsc::UnboundedReceiver<TransferCompletion>,
    config: &DriverConfig,
) -> anyhow::Result<()>
where
    V: VirtualInput,
    D: ReportDispatch,
{
    // Watch before enumerating so nothing plugged in between is missed
    let mut hotplug = nusb::watch_devices()?;

    for device in list_matching(config)? {
        attach(manager, &device);
    }
    if manager.is_empty() {
        info!("Waiting for controllers...");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = hotplug.next() => match event {
                Some(HotplugEvent::Connected(device)) => {
                    if config.matches(device.vendor_id(), device.product_id()) {
                        attach(manager, &device);
                    }
                }
                Some(HotplugEvent::Disconnected(id)) => {
                    manager.detach(&id);
                }
                None => {
                    warn!("Hotplug watch ended");
                    break;
                }
            },
            Some(done) = completions.recv() => {
                if let TransferOutcome::Stopped(e) =
                    manager.on_transfer_complete(done.session, done.status, &done.data)
                {
                    debug!("{}: transfer loop stopped: {}", done.session, e);
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }
    }

    manager.detach_all();
    Ok(())
}
