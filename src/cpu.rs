//! Online processor discovery

use std::path::Path;

use tracing::{debug, warn};

/// sysfs list of online CPUs
pub const ONLINE_CPUS_PATH: &str = "/sys/devices/system/cpu/online";

/// Count the CPUs in a kernel cpulist such as `0-3,6,8-9`
///
/// Parsing stops at the first malformed entry; entries before it still
/// count.
pub fn parse_cpu_list(list: &str) -> usize {
    let mut count = 0;
    for entry in list.trim().split(',').filter(|e| !e.is_empty()) {
        let parsed = match entry.split_once('-') {
            Some((lo, hi)) => match (lo.trim().parse::<usize>(), hi.trim().parse::<usize>()) {
                (Ok(lo), Ok(hi)) if hi >= lo => Some(hi - lo + 1),
                _ => None,
            },
            None => entry.trim().parse::<usize>().ok().map(|_| 1),
        };
        match parsed {
            Some(n) => count += n,
            None => {
                warn!("Malformed cpulist entry {:?}", entry);
                break;
            }
        }
    }
    count
}

/// Number of CPUs listed in a cpulist file, if it can be read
pub fn online_cpus_from(path: &Path) -> Option<usize> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(parse_cpu_list(&content)),
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Number of online CPUs
///
/// Reads sysfs first and falls back to the standard library's estimate.
/// Returns 0 if neither source knows.
pub fn online_cpus() -> usize {
    online_cpus_from(Path::new(ONLINE_CPUS_PATH)).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(0)
    })
}
