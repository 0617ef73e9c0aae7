use std::env;

/// Best-effort host name, used as the default machine identifier.
pub fn hostname() -> Option<String> {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    read_hostname_file()
}

#[cfg(unix)]
fn read_hostname_file() -> Option<String> {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(unix))]
fn read_hostname_file() -> Option<String> {
    None
}

pub fn default_machine_id() -> String {
    hostname().unwrap_or_else(|| "unknown".to_string())
}
