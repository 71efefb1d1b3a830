//! Driver configuration
//!
//! Stored as TOML. A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cpu;
use crate::pool::DEFAULT_QUEUE_DEPTH;
use crate::uinput::DeviceDescriptor;

/// Complete driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Worker thread count; one per online CPU when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Reports each worker may hold before new ones are dropped
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// USB vendor id of controllers to drive
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    /// USB product id of controllers to drive
    #[serde(default = "default_product_id")]
    pub product_id: u16,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}
fn default_vendor_id() -> u16 {
    xpad360_protocol::VENDOR_ID
}
fn default_product_id() -> u16 {
    xpad360_protocol::PRODUCT_ID
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_depth: default_queue_depth(),
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
        }
    }
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("xpad360")
            .join("driver.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DriverConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Worker count to start: the configured one, else the online CPUs
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(cpu::online_cpus)
    }

    /// Queue depth clamped to at least one report
    pub fn effective_queue_depth(&self) -> usize {
        self.queue_depth.max(1)
    }

    /// Whether a USB device is one this driver should attach to
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        vendor_id == self.vendor_id && product_id == self.product_id
    }

    /// Identity the virtual controller is created with
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::xpad360(self.vendor_id, self.product_id)
    }
}
