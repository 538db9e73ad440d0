//! # Seed Configuration
//!
//! `config/config.toml` under the home directory, generated with defaults
//! on first start. Environment variables override the file:
//!
//! | Variable | Field |
//! |---|---|
//! | `LISTEN_PORT` | port of `laddr` |
//! | `CHAIN_ID` | `chain_id` |
//! | `ADDR_STRICT` | `addr_book_strict` |
//! | `MAX_INBOUND` | `max_num_inbound_peers` |
//! | `MAX_OUTBOUND` | `max_num_outbound_peers` |
//! | `SEEDS` | `seeds` |
//!
//! Relative file paths resolve against the home directory (`$SEED_HOME`,
//! or `$HOME/.tenderseed`).

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use seed_peer_exchange::{
    AddressBookConfig, ConnectionSlotsConfig, NetAddress, PexConfig, SwitchConfig,
};

/// Config file location, relative to the home directory.
pub const CONFIG_FILE: &str = "config/config.toml";

/// Home directory name under `$HOME`.
pub const DEFAULT_HOME_DIR: &str = ".tenderseed";

const DEFAULT_SEEDS: &str = "1b077d96ceeba7ef503fb048f343a538b2dcdf1b@136.243.218.244:26656,\
2308bed9e096a8b96d2aa343acc1147813c59ed2@3.225.38.25:26656,\
085f62d67bbf9c501e8ac84d4533440a1eef6c45@95.217.196.54:26656,\
f515a8599b40f0e84dfad935ba414674ab11a668@osmosis.blockpane.com:26656";

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to render default config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    #[error("no home directory: set SEED_HOME or HOME")]
    NoHomeDir,
    #[error("{0}")]
    Invalid(String),
}

/// Top-level seed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Address to listen for incoming connections
    pub laddr: String,
    /// Network identifier
    pub chain_id: String,
    /// Node key path, relative to the home directory or absolute
    pub node_key_file: PathBuf,
    /// Address book path, relative to the home directory or absolute
    pub addr_book_file: PathBuf,
    /// Strict routability rules; turn off for private or local networks
    pub addr_book_strict: bool,
    /// Maximum number of inbound connections
    pub max_num_inbound_peers: usize,
    /// Maximum number of outbound connections
    pub max_num_outbound_peers: usize,
    /// Accept several sessions from one host
    pub allow_duplicate_ip: bool,
    /// Comma-separated `id@host:port` seeds to discover peers from
    pub seeds: String,
    pub address_book: AddressBookSection,
    pub pex: PexSection,
    pub switch: SwitchSection,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            laddr: "tcp://0.0.0.0:6969".to_string(),
            chain_id: "osmosis-1".to_string(),
            node_key_file: PathBuf::from("config/node_key.json"),
            addr_book_file: PathBuf::from("data/addrbook.json"),
            addr_book_strict: true,
            max_num_inbound_peers: 1000,
            max_num_outbound_peers: 1000,
            allow_duplicate_ip: true,
            seeds: DEFAULT_SEEDS.to_string(),
            address_book: AddressBookSection::default(),
            pex: PexSection::default(),
            switch: SwitchSection::default(),
        }
    }
}

/// `[address_book]` tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressBookSection {
    pub new_bucket_count: usize,
    pub old_bucket_count: usize,
    pub bucket_size: usize,
    pub max_failures: u32,
    pub max_selection: usize,
}

impl Default for AddressBookSection {
    fn default() -> Self {
        let book = AddressBookConfig::default();
        Self {
            new_bucket_count: book.new_bucket_count,
            old_bucket_count: book.old_bucket_count,
            bucket_size: book.bucket_size,
            max_failures: book.max_failures,
            max_selection: book.max_selection,
        }
    }
}

/// `[pex]` tuning, durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PexSection {
    pub request_interval_secs: u64,
    pub request_jitter_secs: u64,
    pub response_timeout_secs: u64,
    pub min_request_interval_secs: u64,
    pub max_ignored_requests: u32,
    pub max_misbehavior: u32,
    pub max_addresses_per_response: usize,
}

impl Default for PexSection {
    fn default() -> Self {
        let pex = PexConfig::default();
        Self {
            request_interval_secs: pex.request_interval.as_secs(),
            request_jitter_secs: pex.request_jitter.as_secs(),
            response_timeout_secs: pex.response_timeout.as_secs(),
            min_request_interval_secs: pex.min_request_interval.as_secs(),
            max_ignored_requests: pex.max_ignored_requests,
            max_misbehavior: pex.max_misbehavior,
            max_addresses_per_response: pex.max_addresses_per_response,
        }
    }
}

/// `[switch]` tuning, durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSection {
    pub dial_interval_secs: u64,
    pub max_dials_per_tick: usize,
    pub dial_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub churn_grace_secs: u64,
    pub churn_jitter_secs: u64,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub ban_duration_secs: u64,
    pub save_interval_secs: u64,
    pub shutdown_grace_secs: u64,
    pub max_frame_size: usize,
}

impl Default for SwitchSection {
    fn default() -> Self {
        let switch = SwitchConfig::default();
        Self {
            dial_interval_secs: switch.dial_interval.as_secs(),
            max_dials_per_tick: switch.max_dials_per_tick,
            dial_timeout_secs: switch.dial_timeout.as_secs(),
            handshake_timeout_secs: switch.handshake_timeout.as_secs(),
            churn_grace_secs: switch.churn_grace.as_secs(),
            churn_jitter_secs: switch.churn_jitter.as_secs(),
            backoff_base_secs: switch.backoff_base.as_secs(),
            backoff_max_secs: switch.backoff_max.as_secs(),
            ban_duration_secs: switch.ban_duration.as_secs(),
            save_interval_secs: switch.save_interval.as_secs(),
            shutdown_grace_secs: switch.shutdown_grace.as_secs(),
            max_frame_size: switch.max_frame_size,
        }
    }
}

impl SeedConfig {
    /// Read `config/config.toml` under `home`, writing the defaults first
    /// when the file does not exist.
    pub fn load_or_init(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.write(&path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Render to TOML at `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("LISTEN_PORT") {
            let port: u16 = parse_env("LISTEN_PORT", &port)?;
            let mut addr = self.listen_addr()?;
            addr.set_port(port);
            self.laddr = format!("tcp://{addr}");
        }
        if let Some(chain_id) = lookup("CHAIN_ID") {
            self.chain_id = chain_id;
        }
        if let Some(strict) = lookup("ADDR_STRICT") {
            self.addr_book_strict = parse_bool("ADDR_STRICT", &strict)?;
        }
        if let Some(max) = lookup("MAX_INBOUND") {
            self.max_num_inbound_peers = parse_env("MAX_INBOUND", &max)?;
        }
        if let Some(max) = lookup("MAX_OUTBOUND") {
            self.max_num_outbound_peers = parse_env("MAX_OUTBOUND", &max)?;
        }
        if let Some(seeds) = lookup("SEEDS") {
            self.seeds = seeds;
        }
        Ok(())
    }

    /// Reject settings the seed cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain_id must not be empty".into()));
        }
        if self.max_num_inbound_peers == 0 && self.max_num_outbound_peers == 0 {
            return Err(ConfigError::Invalid(
                "at least one of max_num_inbound_peers and max_num_outbound_peers must be positive"
                    .into(),
            ));
        }
        let book = &self.address_book;
        if book.new_bucket_count == 0 || book.old_bucket_count == 0 || book.bucket_size == 0 {
            return Err(ConfigError::Invalid(
                "address book bucket counts and size must be positive".into(),
            ));
        }
        if self.switch.backoff_max_secs < self.switch.backoff_base_secs {
            return Err(ConfigError::Invalid(
                "switch.backoff_max_secs must not be below backoff_base_secs".into(),
            ));
        }
        Ok(())
    }

    /// `laddr` as a socket address; the `tcp://` scheme is optional.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.laddr.strip_prefix("tcp://").unwrap_or(&self.laddr);
        raw.parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.laddr.clone()))
    }

    pub fn node_key_path(&self, home: &Path) -> PathBuf {
        resolve_path(home, &self.node_key_file)
    }

    pub fn addr_book_path(&self, home: &Path) -> PathBuf {
        resolve_path(home, &self.addr_book_file)
    }

    pub fn address_book_config(&self) -> AddressBookConfig {
        let section = &self.address_book;
        AddressBookConfig {
            new_bucket_count: section.new_bucket_count,
            old_bucket_count: section.old_bucket_count,
            bucket_size: section.bucket_size,
            max_failures: section.max_failures,
            max_selection: section.max_selection,
            strict: self.addr_book_strict,
            ..AddressBookConfig::default()
        }
    }

    pub fn pex_config(&self) -> PexConfig {
        let section = &self.pex;
        PexConfig {
            request_interval: Duration::from_secs(section.request_interval_secs),
            request_jitter: Duration::from_secs(section.request_jitter_secs),
            response_timeout: Duration::from_secs(section.response_timeout_secs),
            min_request_interval: Duration::from_secs(section.min_request_interval_secs),
            max_ignored_requests: section.max_ignored_requests,
            max_misbehavior: section.max_misbehavior,
            max_addresses_per_response: section.max_addresses_per_response,
            ..PexConfig::default()
        }
    }

    /// Switch settings dialing `seeds` while the book is empty.
    pub fn switch_config(&self, seeds: Vec<NetAddress>) -> SwitchConfig {
        let section = &self.switch;
        SwitchConfig {
            slots: ConnectionSlotsConfig {
                max_inbound: self.max_num_inbound_peers,
                max_outbound: self.max_num_outbound_peers,
                allow_duplicate_ip: self.allow_duplicate_ip,
            },
            pex: self.pex_config(),
            seed_mode: true,
            seeds,
            dial_interval: Duration::from_secs(section.dial_interval_secs.max(1)),
            max_dials_per_tick: section.max_dials_per_tick,
            dial_timeout: Duration::from_secs(section.dial_timeout_secs),
            handshake_timeout: Duration::from_secs(section.handshake_timeout_secs),
            churn_grace: Duration::from_secs(section.churn_grace_secs),
            churn_jitter: Duration::from_secs(section.churn_jitter_secs),
            backoff_base: Duration::from_secs(section.backoff_base_secs),
            backoff_max: Duration::from_secs(section.backoff_max_secs),
            ban_duration: Duration::from_secs(section.ban_duration_secs),
            save_interval: Duration::from_secs(section.save_interval_secs.max(1)),
            shutdown_grace: Duration::from_secs(section.shutdown_grace_secs),
            max_frame_size: section.max_frame_size,
            ..SwitchConfig::default()
        }
    }
}

/// The seed's home directory: `$SEED_HOME`, else `$HOME/.tenderseed`.
pub fn home_dir(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(home) = lookup("SEED_HOME").filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    lookup("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(DEFAULT_HOME_DIR))
        .ok_or(ConfigError::NoHomeDir)
}

/// `path` as is when absolute, else joined onto `home`.
pub fn resolve_path(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        }),
    }
}
