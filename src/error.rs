use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a trust check
#[derive(Debug, Error)]
pub enum CheckError {
    /// The path does not reference an existing file. Reported before any OS call.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be opened for shared read/write access
    #[error("failed to open {} for catalog verification: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A call into the OS trust services failed
    #[error("{operation} failed with code 0x{code:08X}")]
    TrustApi { operation: &'static str, code: i32 },
}

impl CheckError {
    pub fn trust_api(operation: &'static str, code: i32) -> Self {
        CheckError::TrustApi { operation, code }
    }

    /// Whether this is the up-front missing-file error
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;

/// Decoded `WinVerifyTrust` failure codes, used when logging why a signature was rejected
#[derive(Debug, PartialEq, Clone)]
pub enum TrustError {
    ProviderUnknown,
    SubjectNotTrusted,
    SubjectFormUnknown,
    NoSignature,
    BadDigest,
    TimeStamp,
    Critical,
    Expired,
    Revoked,
    UntrustedRoot,
    SecuritySettings,
    Chaining,
    UntrustedTestRoot,
    WrongUsage,
    NoRevocationCheck,
    RevocationOffline,
    CNNoMatch,
    FileError,
    ExplicitDistrust,
    Unknown(i32),
}

impl fmt::Display for TrustError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustError::ProviderUnknown => write!(f, "TRUST_E_PROVIDER_UNKNOWN: the trust provider is not recognized on this system"),
            TrustError::SubjectNotTrusted => write!(f, "TRUST_E_SUBJECT_NOT_TRUSTED: the subject failed the specified verification action"),
            TrustError::SubjectFormUnknown => write!(f, "TRUST_E_SUBJECT_FORM_UNKNOWN: the subject form is not supported by the trust provider"),
            TrustError::NoSignature => write!(f, "TRUST_E_NOSIGNATURE: no signature was present in the subject"),
            TrustError::BadDigest => write!(f, "TRUST_E_BAD_DIGEST: the file's digest does not match the expected value"),
            TrustError::TimeStamp => write!(f, "TRUST_E_TIME_STAMP: the timestamp is invalid"),
            TrustError::Critical => write!(f, "CERT_E_CRITICAL: a certificate contains an unknown extension marked critical"),
            TrustError::Expired => write!(f, "CERT_E_EXPIRED: the certificate has expired"),
            TrustError::Revoked => write!(f, "CERT_E_REVOKED: the certificate has been revoked"),
            TrustError::UntrustedRoot => write!(f, "CERT_E_UNTRUSTEDROOT: the certificate chain is not trusted"),
            TrustError::SecuritySettings => write!(f, "CRYPT_E_SECURITY_SETTINGS: security settings prevented verification"),
            TrustError::Chaining => write!(f, "CERT_E_CHAINING: the certificate chain could not be built"),
            TrustError::UntrustedTestRoot => write!(f, "CERT_E_UNTRUSTEDTESTROOT: the certificate is based on an untrusted test root"),
            TrustError::WrongUsage => write!(f, "CERT_E_WRONG_USAGE: the certificate is not valid for the requested usage"),
            TrustError::NoRevocationCheck => write!(f, "CRYPT_E_NO_REVOCATION_CHECK: revocation check was not performed"),
            TrustError::RevocationOffline => write!(f, "CRYPT_E_REVOCATION_OFFLINE: the revocation server was offline"),
            TrustError::CNNoMatch => write!(f, "CERT_E_CN_NO_MATCH: the certificate's common name does not match"),
            TrustError::FileError => write!(f, "CRYPT_E_FILE_ERROR: an error occurred while accessing a file"),
            TrustError::ExplicitDistrust => write!(f, "TRUST_E_EXPLICIT_DISTRUST: the signer is explicitly distrusted"),
            TrustError::Unknown(code) => write!(f, "unknown trust error (0x{:08X})", code),
        }
    }
}

/// Converts a `WinVerifyTrust` HRESULT into a `TrustError`
pub fn hr_to_trust_error(hr: i32) -> TrustError {
    match hr {
        -2146762751 => TrustError::ProviderUnknown,     // TRUST_E_PROVIDER_UNKNOWN
        -2146762748 => TrustError::SubjectNotTrusted,   // TRUST_E_SUBJECT_NOT_TRUSTED
        -2146762749 => TrustError::SubjectFormUnknown,  // TRUST_E_SUBJECT_FORM_UNKNOWN
        -2146762496 => TrustError::NoSignature,         // TRUST_E_NOSIGNATURE
        -2146869232 => TrustError::BadDigest,           // TRUST_E_BAD_DIGEST
        -2146869243 => TrustError::TimeStamp,           // TRUST_E_TIME_STAMP
        -2146762491 => TrustError::Critical,            // CERT_E_CRITICAL
        -2146762495 => TrustError::Expired,             // CERT_E_EXPIRED
        -2146762484 => TrustError::Revoked,             // CERT_E_REVOKED
        -2146762487 => TrustError::UntrustedRoot,       // CERT_E_UNTRUSTEDROOT
        -2146885594 => TrustError::SecuritySettings,    // CRYPT_E_SECURITY_SETTINGS
        -2146762486 => TrustError::Chaining,            // CERT_E_CHAINING
        -2146762483 => TrustError::UntrustedTestRoot,   // CERT_E_UNTRUSTEDTESTROOT
        -2146762480 => TrustError::WrongUsage,          // CERT_E_WRONG_USAGE
        -2146885614 => TrustError::NoRevocationCheck,   // CRYPT_E_NO_REVOCATION_CHECK
        -2146885613 => TrustError::RevocationOffline,   // CRYPT_E_REVOCATION_OFFLINE
        -2146762481 => TrustError::CNNoMatch,           // CERT_E_CN_NO_MATCH
        -2146885629 => TrustError::FileError,           // CRYPT_E_FILE_ERROR
        -2146762479 => TrustError::ExplicitDistrust,    // TRUST_E_EXPLICIT_DISTRUST
        _ => TrustError::Unknown(hr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hresults_decode() {
        assert_eq!(hr_to_trust_error(0x800B0100u32 as i32), TrustError::NoSignature);
        assert_eq!(hr_to_trust_error(0x800B0109u32 as i32), TrustError::UntrustedRoot);
        assert_eq!(hr_to_trust_error(0x80096010u32 as i32), TrustError::BadDigest);
        assert_eq!(hr_to_trust_error(0x800B0111u32 as i32), TrustError::ExplicitDistrust);
    }

    #[test]
    fn unknown_hresult_keeps_code() {
        let err = hr_to_trust_error(0x1234);
        assert_eq!(err, TrustError::Unknown(0x1234));
        assert_eq!(err.to_string(), "unknown trust error (0x00001234)");
    }

    #[test]
    fn trust_api_error_displays_hex_code() {
        let err = CheckError::trust_api("CryptCATAdminAcquireContext2", 0x80070057u32 as i32);
        assert_eq!(
            err.to_string(),
            "CryptCATAdminAcquireContext2 failed with code 0x80070057"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_mentions_path() {
        let err = CheckError::NotFound(PathBuf::from("missing.exe"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "file not found: missing.exe");
    }
}
