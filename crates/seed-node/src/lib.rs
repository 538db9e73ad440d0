//! # Seed Node
//!
//! The process around the peer-exchange core: configuration file and
//! environment overrides, the node key, the home directory lock, logging,
//! and the runtime that wires the switch to a TCP listener.
//!
//! ## Modular Structure
//!
//! - `config` - `SeedConfig`, TOML file plus environment overrides
//! - `node_key` - ed25519 identity key and node id
//! - `lock` - exclusive lock on the data directory
//! - `telemetry` - tracing subscriber setup
//! - `runtime` - startup, signal handling, shutdown

pub mod config;
pub mod lock;
pub mod node_key;
pub mod runtime;
pub mod telemetry;

pub use config::{home_dir, ConfigError, SeedConfig};
pub use lock::{HomeLock, LockError};
pub use node_key::{NodeKey, NodeKeyError};
pub use runtime::{shutdown_signal, SeedRuntime, SEED_VERSION};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
