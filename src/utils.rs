use std::ffi::{OsStr, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;

/// Converts an OS string to a Windows wide string (`Vec<u16>`) with a
/// trailing null terminator suitable for passing to Win32 APIs.
pub fn to_wide_null_terminated(s: impl AsRef<OsStr>) -> Vec<u16> {
    s.as_ref()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Reads a null-terminated wide string out of a fixed-size Win32 buffer.
/// A buffer without a terminator is read in full.
pub fn wide_buffer_to_path(buf: &[u16]) -> PathBuf {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    PathBuf::from(OsString::from_wide(&buf[..len]))
}
