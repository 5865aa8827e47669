use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::{DEFAULT_DATA_FILE, DEFAULT_LOG_FILE, DEFAULT_SESSION_TIMEOUT_SECS};

/// Per-period withdrawal ceilings
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct WithdrawalLimits {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

impl Default for WithdrawalLimits {
    fn default() -> Self {
        Self {
            daily: 10_000.00,
            weekly: 25_000.00,
            monthly: 50_000.00,
        }
    }
}

/// Portal settings, read from a JSON file with every field optional
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    pub session_timeout_secs: u64,
    pub data_file: String,
    pub log_file: String,
    pub withdrawal_limits: WithdrawalLimits,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            data_file: DEFAULT_DATA_FILE.to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            withdrawal_limits: WithdrawalLimits::default(),
        }
    }
}

impl PortalConfig {
    pub fn session_timeout_ms(&self) -> i64 {
        i64::try_from(self.session_timeout_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    /// Load configuration from `path`, using defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut data = String::new();
        match File::open(path.as_ref()) {
            Ok(mut file) => {
                file.read_to_string(&mut data)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        }

        serde_json::from_str(&data).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to parse config {}: {}", path.as_ref().display(), e),
            )
        })
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        File::create(path)?.write_all(data.as_bytes())
    }
}
