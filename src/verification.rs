//! WinTrust-backed implementation of [`TrustBackend`].
//!
//! Embedded signatures go through `WinVerifyTrust` on the file path. Catalog
//! signatures go through the CryptCATAdmin APIs: hash the file, find a catalog
//! that lists the hash, then `WinVerifyTrust` in catalog mode for that member.
//!
//! `CryptCATAdminAcquireContext2` and `CryptCATAdminCalcHashFromFileHandle2`
//! are resolved from `wintrust.dll` at runtime. When either is missing, the
//! backend falls back to the single-algorithm (SHA-1) APIs.

use crate::checker::{CatalogAdmin, CatalogLookup, CatalogMember, HashAlgorithm, TrustBackend};
use crate::config::{CheckOptions, RevocationPolicy};
use crate::error::{hr_to_trust_error, CheckError, Result};
use crate::utils::{to_wide_null_terminated, wide_buffer_to_path};
use crate::win32_guards::*;
use std::fs::{File, OpenOptions};
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{debug, warn};
use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Security::Cryptography::Catalog::*;
use windows::Win32::Security::Cryptography::CERT_STRONG_SIGN_PARA;
use windows::Win32::Security::WinTrust::*;
use windows::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};
use windows::Win32::System::LibraryLoader::{
    GetProcAddress, LoadLibraryExW, LOAD_LIBRARY_SEARCH_SYSTEM32,
};

type AcquireContext2Fn = unsafe extern "system" fn(
    *mut isize,
    *const GUID,
    PCWSTR,
    *const CERT_STRONG_SIGN_PARA,
    u32,
) -> BOOL;

type CalcHashFromFileHandle2Fn =
    unsafe extern "system" fn(isize, HANDLE, *mut u32, *mut u8, u32) -> BOOL;

/// Entry points of the selectable-algorithm catalog API
#[derive(Clone, Copy)]
struct ModernCatalogApi {
    acquire_context: AcquireContext2Fn,
    calc_hash: CalcHashFromFileHandle2Fn,
}

impl ModernCatalogApi {
    /// Loads wintrust.dll from System32 and looks both exports up.
    /// The module stays loaded for the life of the process.
    fn resolve() -> Option<Self> {
        unsafe {
            let module =
                LoadLibraryExW(w!("wintrust.dll"), None, LOAD_LIBRARY_SEARCH_SYSTEM32).ok()?;
            let acquire = GetProcAddress(module, s!("CryptCATAdminAcquireContext2"))?;
            let calc = GetProcAddress(module, s!("CryptCATAdminCalcHashFromFileHandle2"))?;
            Some(ModernCatalogApi {
                acquire_context: std::mem::transmute::<
                    unsafe extern "system" fn() -> isize,
                    AcquireContext2Fn,
                >(acquire),
                calc_hash: std::mem::transmute::<
                    unsafe extern "system" fn() -> isize,
                    CalcHashFromFileHandle2Fn,
                >(calc),
            })
        }
    }
}

fn os_error(operation: &'static str) -> impl FnOnce(Error) -> CheckError {
    move |e| CheckError::trust_api(operation, e.code().0)
}

fn revocation_flags(
    policy: RevocationPolicy,
) -> (WINTRUST_DATA_REVOCATION_CHECKS, WINTRUST_DATA_PROVIDER_FLAGS) {
    match policy {
        RevocationPolicy::None => (WTD_REVOKE_NONE, WTD_REVOCATION_CHECK_NONE),
        RevocationPolicy::WholeChain => (WTD_REVOKE_WHOLECHAIN, WTD_REVOCATION_CHECK_CHAIN),
    }
}

fn new_trust_data(choice: WINTRUST_DATA_UNION_CHOICE, options: &CheckOptions) -> WINTRUST_DATA {
    let (revocation_checks, provider_flags) = revocation_flags(options.revocation);
    WINTRUST_DATA {
        cbStruct: std::mem::size_of::<WINTRUST_DATA>() as u32,
        pPolicyCallbackData: ptr::null_mut(),
        pSIPClientData: ptr::null_mut(),
        dwUIChoice: WTD_UI_NONE,
        fdwRevocationChecks: revocation_checks,
        dwUnionChoice: choice,
        Anonymous: unsafe { std::mem::zeroed() }, // set by the caller
        dwStateAction: WTD_STATEACTION_VERIFY,
        hWVTStateData: HANDLE(ptr::null_mut()),
        pwszURLReference: PWSTR(ptr::null_mut()),
        dwProvFlags: provider_flags,
        dwUIContext: WINTRUST_DATA_UICONTEXT(0),
        pSignatureSettings: ptr::null_mut(),
    }
}

/// Runs WinVerifyTrust and closes its state before returning the HRESULT
fn verify_trust(trust_data: &mut WINTRUST_DATA) -> i32 {
    let mut action = WINTRUST_ACTION_GENERIC_VERIFY_V2;
    let hr = unsafe {
        WinVerifyTrust(
            HWND(ptr::null_mut()),
            &mut action as *mut GUID,
            &mut *trust_data as *mut WINTRUST_DATA as *mut std::ffi::c_void,
        )
    };
    let _state = WinVerifyTrustGuard::new(trust_data);
    hr
}

/// Decides what a null handle from CryptCATAdminEnumCatalogFromHash means.
///
/// Only `ERROR_NOT_FOUND` is a genuine miss; any other code, including a
/// stopped or disabled CryptSvc, is an OS failure.
fn classify_catalog_miss(last_error: WIN32_ERROR) -> Result<()> {
    match last_error {
        ERROR_NOT_FOUND => Ok(()),
        ERROR_SERVICE_NOT_ACTIVE | ERROR_SERVICE_DISABLED => {
            warn!(code = last_error.0, "catalog service (CryptSvc) is unavailable");
            Err(CheckError::trust_api(
                "CryptCATAdminEnumCatalogFromHash",
                last_error.to_hresult().0,
            ))
        }
        _ => Err(CheckError::trust_api(
            "CryptCATAdminEnumCatalogFromHash",
            last_error.to_hresult().0,
        )),
    }
}

fn trust_verdict(kind: &str, hr: i32) -> bool {
    if hr == S_OK.0 {
        return true;
    }
    debug!(kind, code = hr, reason = %hr_to_trust_error(hr), "not trusted");
    false
}

/// Trust backend over the system's WinTrust and catalog services
///
/// # Note
/// Construction looks up wintrust.dll exports `CryptCATAdminAcquireContext2` and
/// `CryptCATAdminCalcHashFromFileHandle2`. When both exist the backend reports
/// [`CatalogLookup::Modern`] and acquires contexts per hash algorithm; otherwise
/// it reports [`CatalogLookup::Legacy`] and every context hashes with SHA-1.
///
/// Catalog-admin contexts, catalog contexts and WinVerifyTrust state are held
/// in guards from [`crate::win32_guards`] and released on every exit path.
pub struct WinTrustBackend {
    modern: Option<ModernCatalogApi>,
}

impl WinTrustBackend {
    /// Creates a backend, resolving the catalog API once
    ///
    /// # Returns
    /// A backend whose [`TrustBackend::detect_lookup`] reflects what this
    /// Windows version exports
    pub fn new() -> Self {
        WinTrustBackend {
            modern: ModernCatalogApi::resolve(),
        }
    }
}

impl Default for WinTrustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustBackend for WinTrustBackend {
    type File = File;
    type Admin = CatAdminContext;

    fn detect_lookup(&self) -> CatalogLookup {
        if self.modern.is_some() {
            CatalogLookup::Modern
        } else {
            CatalogLookup::Legacy
        }
    }

    fn verify_embedded(&self, path: &Path, options: &CheckOptions) -> Result<bool> {
        let wide_path = to_wide_null_terminated(path);

        let mut file_info = WINTRUST_FILE_INFO {
            cbStruct: std::mem::size_of::<WINTRUST_FILE_INFO>() as u32,
            pcwszFilePath: PCWSTR::from_raw(wide_path.as_ptr()),
            hFile: HANDLE(ptr::null_mut()),
            pgKnownSubject: ptr::null_mut(),
        };

        let mut trust_data = new_trust_data(WTD_CHOICE_FILE, options);
        trust_data.Anonymous.pFile = &mut file_info as *mut _;

        Ok(trust_verdict("embedded", verify_trust(&mut trust_data)))
    }

    fn open_shared(&self, path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ.0 | FILE_SHARE_WRITE.0)
            .open(path)
            .map_err(|source| CheckError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    fn acquire_admin(
        &self,
        lookup: CatalogLookup,
        algorithm: HashAlgorithm,
    ) -> Result<CatAdminContext> {
        let mut handle: isize = 0;
        let modern = match (lookup, self.modern) {
            (CatalogLookup::Modern, Some(api)) => Some(api),
            _ => None,
        };

        match modern {
            Some(api) => {
                let algorithm_name = to_wide_null_terminated(algorithm.name());
                let ok = unsafe {
                    (api.acquire_context)(
                        &mut handle,
                        &DRIVER_ACTION_VERIFY,
                        PCWSTR::from_raw(algorithm_name.as_ptr()),
                        ptr::null(),
                        0,
                    )
                };
                ok.ok().map_err(os_error("CryptCATAdminAcquireContext2"))?;
            }
            None => unsafe {
                CryptCATAdminAcquireContext(
                    &mut handle,
                    Some(&DRIVER_ACTION_VERIFY as *const GUID),
                    0,
                )
                .map_err(os_error("CryptCATAdminAcquireContext"))?;
            },
        }

        if handle == 0 {
            return Err(CheckError::trust_api(
                "CryptCATAdminAcquireContext",
                E_HANDLE.0,
            ));
        }
        debug!(
            algorithm = algorithm.name(),
            modern = modern.is_some(),
            "acquired catalog admin context"
        );

        Ok(CatAdminContext {
            handle: CatAdminHandle::new(handle),
            calc_hash: modern.map(|api| api.calc_hash),
        })
    }
}

/// Catalog-admin context bound to one hash algorithm
pub struct CatAdminContext {
    handle: CatAdminHandle,
    calc_hash: Option<CalcHashFromFileHandle2Fn>,
}

impl CatAdminContext {
    fn query_hash(
        &self,
        h_file: HANDLE,
        cb_hash: &mut u32,
        pb_hash: Option<*mut u8>,
    ) -> windows::core::Result<()> {
        unsafe {
            match self.calc_hash {
                Some(calc) => calc(
                    self.handle.raw(),
                    h_file,
                    cb_hash,
                    pb_hash.unwrap_or(ptr::null_mut()),
                    0,
                )
                .ok(),
                None => CryptCATAdminCalcHashFromFileHandle(h_file, cb_hash, pb_hash, 0),
            }
        }
    }

    fn hash_operation(&self) -> &'static str {
        if self.calc_hash.is_some() {
            "CryptCATAdminCalcHashFromFileHandle2"
        } else {
            "CryptCATAdminCalcHashFromFileHandle"
        }
    }
}

impl CatalogAdmin for CatAdminContext {
    type File = File;

    fn calc_hash(&self, file: &File) -> Result<Vec<u8>> {
        let h_file = HANDLE(file.as_raw_handle());

        // First call to get the required buffer size, then allocate and call again
        let mut cb_hash: u32 = 0;
        let sizing = self.query_hash(h_file, &mut cb_hash, None);
        if cb_hash == 0 {
            return Err(match sizing {
                Err(e) => os_error(self.hash_operation())(e),
                Ok(()) => CheckError::trust_api(self.hash_operation(), E_UNEXPECTED.0),
            });
        }

        let mut digest = vec![0u8; cb_hash as usize];
        self.query_hash(h_file, &mut cb_hash, Some(digest.as_mut_ptr()))
            .map_err(os_error(self.hash_operation()))?;
        digest.truncate(cb_hash as usize);
        Ok(digest)
    }

    fn find_catalog(&self, hash: &[u8]) -> Result<Option<PathBuf>> {
        let handle =
            unsafe { CryptCATAdminEnumCatalogFromHash(self.handle.raw(), hash, 0, None) };
        if handle == 0 {
            let last_error = unsafe { GetLastError() };
            return classify_catalog_miss(last_error).map(|()| None);
        }
        let catalog = CatalogContextGuard::new(&self.handle, handle);

        let mut info = CATALOG_INFO {
            cbStruct: std::mem::size_of::<CATALOG_INFO>() as u32,
            ..unsafe { std::mem::zeroed() }
        };
        let found = unsafe { CryptCATCatalogInfoFromContext(catalog.raw(), &mut info, 0) };
        found.map_err(os_error("CryptCATCatalogInfoFromContext"))?;

        Ok(Some(wide_buffer_to_path(&info.wszCatalogFile)))
    }

    fn verify_member(
        &self,
        member: &CatalogMember<'_, File>,
        options: &CheckOptions,
    ) -> Result<bool> {
        let wide_catalog = to_wide_null_terminated(member.catalog_path);
        let wide_member = to_wide_null_terminated(member.member_path);
        let wide_tag = to_wide_null_terminated(member.member_tag);

        let catalog_info = WINTRUST_CATALOG_INFO {
            cbStruct: std::mem::size_of::<WINTRUST_CATALOG_INFO>() as u32,
            dwCatalogVersion: 0,
            pcwszCatalogFilePath: PCWSTR::from_raw(wide_catalog.as_ptr()),
            pcwszMemberTag: PCWSTR::from_raw(wide_tag.as_ptr()),
            pcwszMemberFilePath: PCWSTR::from_raw(wide_member.as_ptr()),
            hMemberFile: HANDLE(member.member_file.as_raw_handle()),
            pbCalculatedFileHash: member.hash.as_ptr() as *mut u8,
            cbCalculatedFileHash: member.hash.len() as u32,
            pcCatalogContext: ptr::null_mut(),
            hCatAdmin: self.handle.raw(),
        };

        let mut trust_data = new_trust_data(WTD_CHOICE_CATALOG, options);
        trust_data.Anonymous.pCatalog = &catalog_info as *const _ as *mut _;

        Ok(trust_verdict("catalog", verify_trust(&mut trust_data)))
    }
}

impl crate::checker::SignatureChecker<WinTrustBackend> {
    /// Checker over the system's trust services, with the catalog API detected once
    pub fn system(options: CheckOptions) -> Self {
        Self::new(WinTrustBackend::new(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_catalog_miss() {
        assert!(classify_catalog_miss(ERROR_NOT_FOUND).is_ok());
    }

    #[test]
    fn stopped_catalog_service_is_an_error() {
        for code in [ERROR_SERVICE_NOT_ACTIVE, ERROR_SERVICE_DISABLED] {
            match classify_catalog_miss(code) {
                Err(CheckError::TrustApi { operation, code: hr }) => {
                    assert_eq!(operation, "CryptCATAdminEnumCatalogFromHash");
                    assert_eq!(hr, code.to_hresult().0);
                }
                other => panic!("Expected TrustApi for {:?}, got: {:?}", code, other),
            }
        }
    }

    #[test]
    fn other_enum_failures_propagate() {
        for code in [ERROR_INVALID_PARAMETER, ERROR_NOT_ENOUGH_MEMORY] {
            assert!(
                matches!(
                    classify_catalog_miss(code),
                    Err(CheckError::TrustApi { .. })
                ),
                "{:?} should not be treated as a catalog miss",
                code
            );
        }
    }

    #[test]
    fn system_backend_resolves_modern_api() {
        // Both exports ship with Windows 8 and later
        assert_eq!(WinTrustBackend::new().detect_lookup(), CatalogLookup::Modern);
    }
}
