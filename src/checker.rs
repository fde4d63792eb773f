//! Embedded and catalog signature checks, sequenced over a [`TrustBackend`].
//!
//! The checker owns the control flow: the up-front existence check, the
//! Authenticode query, and the catalog lookup with its SHA-256 to SHA-1
//! fallback. Every OS resource it touches is an owned value released on drop,
//! so early returns through `?` never leak a catalog-admin context or handle.

use crate::config::CheckOptions;
use crate::error::{CheckError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

/// Outcome of a trust query for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustQueryResult {
    pub is_authenticode_signed: bool,
    pub is_catalog_signed: bool,
}

impl TrustQueryResult {
    /// Trusted by at least one mechanism
    pub fn is_trusted(&self) -> bool {
        self.is_authenticode_signed || self.is_catalog_signed
    }
}

/// Hash algorithm a catalog-admin context is acquired with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha1,
}

impl HashAlgorithm {
    /// Algorithm name understood by `CryptCATAdminAcquireContext2`
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha1 => "SHA1",
        }
    }
}

/// Catalog lookup strategy, chosen once from what the OS exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLookup {
    /// Single-algorithm acquisition; hashes are implicitly SHA-1
    Legacy,
    /// Selectable-algorithm acquisition; SHA-256 first, SHA-1 as fallback
    Modern,
}

impl CatalogLookup {
    /// Algorithms to try, in order, until a catalog matches
    pub fn hash_algorithms(self) -> &'static [HashAlgorithm] {
        match self {
            CatalogLookup::Legacy => &[HashAlgorithm::Sha1],
            CatalogLookup::Modern => &[HashAlgorithm::Sha256, HashAlgorithm::Sha1],
        }
    }
}

/// A file hash listed in a catalog, with the catalog that lists it
pub struct CatalogMember<'a, F> {
    pub catalog_path: &'a Path,
    pub member_path: &'a Path,
    pub member_file: &'a F,
    pub member_tag: &'a str,
    pub hash: &'a [u8],
}

/// Catalog member tag for a file hash: uppercase hex
pub fn member_tag(hash: &[u8]) -> String {
    hex::encode_upper(hash)
}

/// OS trust services the checker sequences.
///
/// Implementations own their resources: `File` and `Admin` release their
/// underlying handles when dropped.
pub trait TrustBackend {
    type File;
    type Admin: CatalogAdmin<File = Self::File>;

    /// Detects which catalog APIs are available
    fn detect_lookup(&self) -> CatalogLookup;

    /// Verifies the file's embedded Authenticode signature
    fn verify_embedded(&self, path: &Path, options: &CheckOptions) -> Result<bool>;

    /// Opens the file for reading with shared read/write access
    fn open_shared(&self, path: &Path) -> Result<Self::File>;

    /// Acquires a catalog-admin context through the strategy's API
    fn acquire_admin(&self, lookup: CatalogLookup, algorithm: HashAlgorithm)
        -> Result<Self::Admin>;
}

/// An open catalog-admin context
pub trait CatalogAdmin {
    type File;

    /// Hashes the file with this context's algorithm
    fn calc_hash(&self, file: &Self::File) -> Result<Vec<u8>>;

    /// Path of a catalog listing `hash`, or `None` when no catalog does
    fn find_catalog(&self, hash: &[u8]) -> Result<Option<PathBuf>>;

    /// Verifies the catalog's signature for this member
    fn verify_member(
        &self,
        member: &CatalogMember<'_, Self::File>,
        options: &CheckOptions,
    ) -> Result<bool>;
}

/// Checks embedded and catalog signatures through a backend
pub struct SignatureChecker<B> {
    backend: B,
    lookup: CatalogLookup,
    options: CheckOptions,
}

impl<B: TrustBackend> SignatureChecker<B> {
    pub fn new(backend: B, options: CheckOptions) -> Self {
        let lookup = backend.detect_lookup();
        debug!(?lookup, "catalog lookup strategy selected");
        Self {
            backend,
            lookup,
            options,
        }
    }

    pub fn lookup(&self) -> CatalogLookup {
        self.lookup
    }

    /// Queries both trust mechanisms for the file at `path`
    ///
    /// # Arguments
    /// * `path` - File to check; must reference an existing file
    ///
    /// # Returns
    /// A `TrustQueryResult` with both flags set, or `CheckError::NotFound` when
    /// `path` is missing or not a file. Any OS failure propagates as an error;
    /// no partial result is returned.
    ///
    /// # Note
    /// The embedded check runs first. The catalog check then tries each of the
    /// strategy's hash algorithms in order and stops at the first catalog that
    /// lists the file; a catalog that lists it but fails verification does not
    /// trigger the next algorithm. The file handle and every catalog-admin
    /// context are released before this returns, on success and on error.
    pub fn check(&self, path: impl AsRef<Path>) -> Result<TrustQueryResult> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CheckError::NotFound(path.to_path_buf()));
        }

        let span = info_span!("check", path = %path.display());
        let _enter = span.enter();

        let is_authenticode_signed = self.backend.verify_embedded(path, &self.options)?;
        let file = self.backend.open_shared(path)?;
        let is_catalog_signed = self.verify_catalog(path, &file)?;

        info!(is_authenticode_signed, is_catalog_signed, "trust query complete");
        Ok(TrustQueryResult {
            is_authenticode_signed,
            is_catalog_signed,
        })
    }

    fn verify_catalog(&self, path: &Path, file: &B::File) -> Result<bool> {
        for &algorithm in self.lookup.hash_algorithms() {
            let admin = self.backend.acquire_admin(self.lookup, algorithm)?;
            let hash = admin.calc_hash(file)?;

            let Some(catalog_path) = admin.find_catalog(&hash)? else {
                debug!(algorithm = algorithm.name(), "no catalog lists this hash");
                continue;
            };

            let tag = member_tag(&hash);
            debug!(
                algorithm = algorithm.name(),
                catalog = %catalog_path.display(),
                member_tag = %tag,
                "catalog match"
            );
            let member = CatalogMember {
                catalog_path: &catalog_path,
                member_path: path,
                member_file: file,
                member_tag: &tag,
                hash: &hash,
            };
            return admin.verify_member(&member, &self.options);
        }
        Ok(false)
    }
}
