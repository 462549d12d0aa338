//! Content-addressed file staging for bench providers.
//!
//! A [`ProviderDriver`] takes a local file, fingerprints it, and makes it
//! reachable from the device under test through a TFTP root, an HTTP
//! document root or an NFS-exported cache. Content already present on a
//! provider is never transferred twice.
//!
//! # Modules
//!
//! - [`fingerprint`]: SHA-256 content fingerprints
//! - [`paths`]: cache layouts and path confinement
//! - [`cache`]: per-process bookkeeping and the stage algorithm
//! - [`transport`]: symlink, shared-cache and remote-copy backends
//! - [`session`]: remote command and upload boundary (OpenSSH by default)
//! - [`provider`]: provider resource definitions
//! - [`driver`]: the [`FileStager`](bench_core::FileStager) implementation

pub mod cache;
pub mod driver;
pub mod fingerprint;
pub mod paths;
pub mod provider;
pub mod session;
pub mod transport;

pub use cache::{CacheEntry, ContentCache, StagedFile};
pub use driver::{ProviderDriver, ProviderFlavor};
pub use fingerprint::{fingerprint_file, Fingerprint};
pub use paths::{confine, CacheLayout, StagePath};
pub use provider::ProviderResource;
pub use session::{RemoteSession, SessionManager, SshConfig, SshManager};
pub use transport::{LocalLink, RemoteCopy, SharedCache, Transport};
