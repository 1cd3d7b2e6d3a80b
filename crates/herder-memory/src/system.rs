// Values at or above 1 EiB are how cgroup v1 spells "no limit".
const CGROUP_UNLIMITED_BYTES: u64 = 1 << 60;

#[cfg(target_os = "linux")]
const CGROUP_LIMIT_FILES: [&str; 2] = [
    "/sys/fs/cgroup/memory.max",
    "/sys/fs/cgroup/memory/memory.limit_in_bytes",
];

/// Best-effort total memory available to this process, in bytes.
///
/// Uses the physical memory reported by the OS, lowered to the container's cgroup memory
/// limit when one is set. Returns `None` when neither can be determined.
pub fn detect_total_memory() -> Option<u64> {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let physical = Some(system.total_memory()).filter(|&bytes| bytes > 0);

    match (physical, cgroup_memory_limit()) {
        (Some(physical), Some(limit)) => Some(physical.min(limit)),
        (physical, limit) => physical.or(limit),
    }
}

#[cfg(target_os = "linux")]
fn cgroup_memory_limit() -> Option<u64> {
    CGROUP_LIMIT_FILES.iter().find_map(|&path| {
        match std::fs::read_to_string(path) {
            Ok(raw) => parse_cgroup_memory_limit_bytes(&raw),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "herder.memory",
                        path,
                        error = %err,
                        "failed to read cgroup memory limit"
                    );
                }
                None
            }
        }
    })
}

#[cfg(not(target_os = "linux"))]
fn cgroup_memory_limit() -> Option<u64> {
    None
}

/// Parses `memory.max` (v2) or `memory.limit_in_bytes` (v1). `None` means unlimited.
pub fn parse_cgroup_memory_limit_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw == "max" {
        return None;
    }
    raw.parse::<u64>()
        .ok()
        .filter(|&bytes| bytes > 0 && bytes < CGROUP_UNLIMITED_BYTES)
}
