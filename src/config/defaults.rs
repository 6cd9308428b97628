//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Connection Defaults
// =============================================================================

pub fn default_database() -> String {
    "state_storage".to_string()
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// CouchDB's standard HTTP port.
pub fn default_port() -> u16 {
    5984
}

pub fn default_scheme() -> String {
    "http".to_string()
}

pub fn default_timeout_secs() -> u64 {
    10
}

// =============================================================================
// Manager Defaults
// =============================================================================

pub fn default_max_retries() -> u32 {
    crate::manager::MAX_RETRIES
}
