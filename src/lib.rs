//! trustcheck - decide whether a Windows file is trusted
//!
//! A file is checked two independent ways: its embedded (Authenticode)
//! signature, and a catalog signature, where the file's hash is listed in a
//! separately signed catalog registered with the system.
//!
//! # Examples
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> trustcheck::Result<()> {
//! let result = trustcheck::check(r"C:\Windows\System32\cmd.exe")?;
//!
//! if result.is_catalog_signed {
//!     println!("cmd.exe is vouched for by a system catalog");
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod checker;
pub mod config;
pub mod error;
pub mod logging;
#[cfg(windows)]
pub mod utils;
#[cfg(windows)]
pub mod verification;
#[cfg(windows)]
pub mod win32_guards;

#[cfg(all(test, windows))]
mod tests;

// Re-export commonly used types for convenience
pub use checker::{
    member_tag, CatalogAdmin, CatalogLookup, CatalogMember, HashAlgorithm, SignatureChecker,
    TrustBackend, TrustQueryResult,
};
pub use config::{CheckOptions, RevocationPolicy};
pub use error::{hr_to_trust_error, CheckError, Result, TrustError};
#[cfg(windows)]
pub use verification::WinTrustBackend;

/// Checks `path` against the system's trust services with default options
#[cfg(windows)]
pub fn check(path: impl AsRef<std::path::Path>) -> Result<TrustQueryResult> {
    SignatureChecker::system(CheckOptions::default()).check(path)
}
