//! # Seed Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── flows.rs        # several switches on an in-memory network
//! │   ├── persistence.rs  # address book file across restarts
//! │   └── tcp.rs          # two seed runtimes over loopback TCP
//! └── benches/
//!     └── address_book_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p seed-tests
//! cargo test -p seed-tests integration::flows::
//! cargo bench -p seed-tests
//! ```

pub mod integration;
