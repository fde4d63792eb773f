//! Example: Basic trust check
//!
//! Checks one file for an embedded signature and a catalog signature, and
//! shows which catalog API the system offers.

#[cfg(windows)]
fn main() {
    use trustcheck::{CheckOptions, SignatureChecker};

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <path_to_file>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let checker = SignatureChecker::system(CheckOptions::default());
    println!("Catalog lookup strategy: {:?}", checker.lookup());
    println!("Checking signatures for: {}\n", path);

    match checker.check(path) {
        Ok(result) => {
            println!("Embedded signature valid: {}", result.is_authenticode_signed);
            println!("Catalog signature valid: {}", result.is_catalog_signed);
            if result.is_trusted() {
                println!("\nFile is trusted");
            } else {
                println!("\nFile is not trusted");
            }
        }
        Err(err) => {
            eprintln!("Check failed: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(windows))]
fn main() {
    eprintln!("This example needs Windows.");
}
