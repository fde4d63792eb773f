//! Options applied to every trust query.

use clap::ValueEnum;

/// How far `WinVerifyTrust` checks certificate revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RevocationPolicy {
    /// No revocation checks; verification never touches the network
    #[default]
    None,
    /// Check every certificate in the chain
    WholeChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOptions {
    pub revocation: RevocationPolicy,
}

impl CheckOptions {
    pub fn with_revocation(mut self, revocation: RevocationPolicy) -> Self {
        self.revocation = revocation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skips_revocation() {
        assert_eq!(CheckOptions::default().revocation, RevocationPolicy::None);
    }

    #[test]
    fn revocation_parses_from_cli_names() {
        assert_eq!(
            RevocationPolicy::from_str("whole-chain", false),
            Ok(RevocationPolicy::WholeChain)
        );
        assert_eq!(
            RevocationPolicy::from_str("none", false),
            Ok(RevocationPolicy::None)
        );
        assert!(RevocationPolicy::from_str("sometimes", false).is_err());
    }
}
