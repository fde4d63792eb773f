// System tests against the real WinTrust services. They need a standard
// Windows install; missing fixtures fail loudly rather than skip.

use crate::checker::{CatalogLookup, SignatureChecker, TrustQueryResult};
use crate::config::{CheckOptions, RevocationPolicy};
use crate::error::CheckError;
use std::io::Write;

fn system_file(path: &str) -> &str {
    if !std::path::Path::new(path).exists() {
        panic!(
            "{} not found. This test requires a standard Windows install.",
            path
        );
    }
    path
}

#[test]
fn modern_catalog_api_is_detected() {
    // CryptCATAdminAcquireContext2 ships with Windows 8 and later
    let checker = SignatureChecker::system(CheckOptions::default());
    assert_eq!(checker.lookup(), CatalogLookup::Modern);
}

#[test]
fn system_cmd_is_catalog_signed() {
    // Path to Windows cmd.exe (catalog-signed on modern Windows)
    let path = system_file(r"C:\Windows\System32\cmd.exe");

    let result = crate::check(path).unwrap();

    assert_eq!(
        result,
        TrustQueryResult {
            is_authenticode_signed: false,
            is_catalog_signed: true
        },
        "cmd.exe should be vouched for only by a catalog"
    );
}

#[test]
fn embedded_signed_system_binary() {
    // ntoskrnl.exe carries its own Authenticode signature
    let path = system_file(r"C:\Windows\System32\ntoskrnl.exe");

    let result = crate::check(path).unwrap();

    assert!(
        result.is_authenticode_signed,
        "ntoskrnl.exe should have a valid embedded signature: {:?}",
        result
    );
}

#[test]
fn unsigned_temp_file_is_not_trusted() {
    let mut file = tempfile::Builder::new().suffix(".exe").tempfile().unwrap();
    file.write_all(b"MZ not really a program").unwrap();
    file.flush().unwrap();

    let result = crate::check(file.path()).unwrap();

    assert_eq!(result, TrustQueryResult::default());
}

#[test]
fn missing_file_is_reported_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.exe");

    match crate::check(&missing) {
        Err(CheckError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("Expected NotFound, got: {:?}", other),
    }
}

#[test]
fn whole_chain_revocation_check_completes_for_cmd() {
    let path = system_file(r"C:\Windows\System32\cmd.exe");
    let options = CheckOptions::default().with_revocation(RevocationPolicy::WholeChain);

    // The catalog verdict depends on reaching revocation servers, so only the
    // embedded verdict is stable here.
    let result = SignatureChecker::system(options).check(path).unwrap();

    assert!(!result.is_authenticode_signed);
}
