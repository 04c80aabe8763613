//! Everything that touches the network: rate-limited retrying downloads,
//! the `repo.js`/`files.js` manifest client, bounded-concurrency transfer
//! pools, and the CRC32/SHA-256 helpers recovery and the version store
//! need.

pub mod error;
pub mod hashing;
pub mod net;
pub mod pool;

pub use error::TransportError;
pub use hashing::{crc32_file, sha256_hex, verify_crc32};
pub use net::{download, get_bytes, get_json, rate_limiter, ByteRateLimiter};
pub use pool::TransferPool;
