// RAII guards for Win32 handles and contexts
// These release their resource exactly once when dropped, on every exit path

use std::ptr;
use tracing::trace;
use windows::core::GUID;
use windows::Win32::Foundation::*;
use windows::Win32::Security::Cryptography::Catalog::*;
use windows::Win32::Security::WinTrust::*;

/// Owned catalog-admin context.
/// Calls CryptCATAdminReleaseContext on drop
pub struct CatAdminHandle(isize);

impl CatAdminHandle {
    /// Takes ownership of a context returned by CryptCATAdminAcquireContext(2)
    pub fn new(handle: isize) -> Self {
        CatAdminHandle(handle)
    }

    pub fn raw(&self) -> isize {
        self.0
    }
}

impl Drop for CatAdminHandle {
    fn drop(&mut self) {
        if self.0 != 0 {
            trace!(handle = self.0, "releasing catalog admin context");
            unsafe {
                let _ = CryptCATAdminReleaseContext(self.0, 0);
            }
        }
    }
}

/// Catalog context returned by CryptCATAdminEnumCatalogFromHash.
/// Borrows the admin context it came from so it is always released first
pub struct CatalogContextGuard<'a> {
    admin: &'a CatAdminHandle,
    handle: isize,
}

impl<'a> CatalogContextGuard<'a> {
    pub fn new(admin: &'a CatAdminHandle, handle: isize) -> Self {
        CatalogContextGuard { admin, handle }
    }

    pub fn raw(&self) -> isize {
        self.handle
    }
}

impl Drop for CatalogContextGuard<'_> {
    fn drop(&mut self) {
        if self.handle != 0 {
            unsafe {
                let _ = CryptCATAdminReleaseCatalogContext(self.admin.raw(), self.handle, 0);
            }
        }
    }
}

/// Closes WinVerifyTrust state data on drop.
/// The close call reuses the same WINTRUST_DATA that opened the state
pub struct WinVerifyTrustGuard<'a> {
    trust_data: &'a mut WINTRUST_DATA,
}

impl<'a> WinVerifyTrustGuard<'a> {
    pub fn new(trust_data: &'a mut WINTRUST_DATA) -> Self {
        WinVerifyTrustGuard { trust_data }
    }
}

impl Drop for WinVerifyTrustGuard<'_> {
    fn drop(&mut self) {
        if self.trust_data.hWVTStateData == HANDLE(ptr::null_mut()) {
            return;
        }
        self.trust_data.dwStateAction = WTD_STATEACTION_CLOSE;
        let mut action = WINTRUST_ACTION_GENERIC_VERIFY_V2;
        unsafe {
            let _ = WinVerifyTrust(
                HWND(ptr::null_mut()),
                &mut action as *mut GUID,
                &mut *self.trust_data as *mut WINTRUST_DATA as *mut std::ffi::c_void,
            );
        }
        self.trust_data.hWVTStateData = HANDLE(ptr::null_mut());
    }
}
