use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trustcheck::{logging, CheckError, RevocationPolicy, TrustQueryResult};

/// Check whether files are trusted by an embedded Authenticode signature
/// or by a signed system catalog
#[derive(Parser, Debug)]
#[cfg_attr(not(windows), allow(dead_code))]
#[command(name = "trustcheck", version)]
struct Cli {
    /// Files to check
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print one JSON object per file
    #[arg(long)]
    json: bool,

    /// Certificate revocation checking
    #[arg(long, value_enum, default_value_t = RevocationPolicy::None)]
    revocation: RevocationPolicy,

    /// Increase log verbosity (repeatable); TRUSTCHECK_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const EXIT_OS_ERROR: u8 = 1;
#[cfg_attr(not(windows), allow(dead_code))]
const EXIT_NOT_FOUND: u8 = 2;

#[cfg_attr(not(windows), allow(dead_code))]
#[derive(Serialize)]
struct Report<'a> {
    path: String,
    #[serde(flatten)]
    result: &'a TrustQueryResult,
}

#[cfg_attr(not(windows), allow(dead_code))]
fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
fn render_human(path: &Path, result: &TrustQueryResult) -> String {
    format!(
        "{}: authenticode={} catalog={}",
        path.display(),
        yes_no(result.is_authenticode_signed),
        yes_no(result.is_catalog_signed)
    )
}

#[cfg_attr(not(windows), allow(dead_code))]
fn render_json(path: &Path, result: &TrustQueryResult) -> serde_json::Result<String> {
    serde_json::to_string(&Report {
        path: path.display().to_string(),
        result,
    })
}

#[cfg_attr(not(windows), allow(dead_code))]
fn exit_code_for(err: &CheckError) -> u8 {
    if err.is_not_found() {
        EXIT_NOT_FOUND
    } else {
        EXIT_OS_ERROR
    }
}

#[cfg(windows)]
fn run(cli: &Cli) -> u8 {
    use trustcheck::{CheckOptions, SignatureChecker};

    let options = CheckOptions::default().with_revocation(cli.revocation);
    let checker = SignatureChecker::system(options);
    let mut status = 0;

    for path in &cli.paths {
        let result = match checker.check(path) {
            Ok(result) => result,
            Err(err) => {
                eprintln!("trustcheck: {err}");
                status = status.max(exit_code_for(&err));
                continue;
            }
        };

        if cli.json {
            match render_json(path, &result) {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    eprintln!(
                        "trustcheck: failed to encode result for {}: {err}",
                        path.display()
                    );
                    status = status.max(EXIT_OS_ERROR);
                }
            }
        } else {
            println!("{}", render_human(path, &result));
        }
    }

    status
}

#[cfg(not(windows))]
fn run(_cli: &Cli) -> u8 {
    eprintln!(
        "trustcheck: signature checks need the Windows trust services; \
         this platform is not supported"
    );
    EXIT_OS_ERROR
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    ExitCode::from(run(&cli))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn catalog_only() -> TrustQueryResult {
        TrustQueryResult {
            is_authenticode_signed: false,
            is_catalog_signed: true,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "trustcheck",
            "--json",
            "--revocation",
            "whole-chain",
            "-vv",
            "a.exe",
            "b.dll",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.revocation, RevocationPolicy::WholeChain);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.paths, vec![PathBuf::from("a.exe"), PathBuf::from("b.dll")]);
    }

    #[test]
    fn cli_requires_a_path() {
        assert!(Cli::try_parse_from(["trustcheck"]).is_err());
    }

    #[test]
    fn human_output_names_both_mechanisms() {
        assert_eq!(
            render_human(Path::new("cmd.exe"), &catalog_only()),
            "cmd.exe: authenticode=no catalog=yes"
        );
    }

    #[test]
    fn json_output_flattens_result() {
        let line = render_json(Path::new("cmd.exe"), &catalog_only()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "path": "cmd.exe",
                "isAuthenticodeSigned": false,
                "isCatalogSigned": true
            })
        );
    }

    #[test]
    fn not_found_has_its_own_exit_code() {
        assert_eq!(
            exit_code_for(&CheckError::NotFound(PathBuf::from("x"))),
            EXIT_NOT_FOUND
        );
        assert_eq!(
            exit_code_for(&CheckError::trust_api("WinVerifyTrust", -1)),
            EXIT_OS_ERROR
        );
    }
}
