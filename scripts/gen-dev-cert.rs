//! Dev certificate generator - run with `cargo run --manifest-path scripts/Cargo.toml`
//!
//! Writes a self-signed localhost certificate to the same files the server's
//! TLS loader reads: TLS_CERT_PATH/TLS_KEY_PATH when both are set, otherwise
//! certs/ at the repository root. Browsers only pin certificates valid for at
//! most 14 days, so rerun this after expiry.

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use fruit_merge_server::config::ServerConfig;
use fruit_merge_server::net::tls::{cert_paths, hash_der};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn main() -> Result<(), Box<dyn Error>> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
    let (cert_path, key_path) = cert_paths(&ServerConfig::load_or_default(), &root);

    if cert_path.exists() && key_path.exists() {
        println!("Certificate already exists at {}", cert_path.display());
        println!("Delete it to regenerate (it expires 14 days after creation).\n");
        let key_pair = KeyPair::from_pem(&fs::read_to_string(&key_path)?)?;
        return print_hashes(&cert_path, &key_pair);
    }

    println!("Generating development certificate for localhost...\n");
    let key_pair = generate(&cert_path, &key_path)?;
    println!("Certificate: {}", cert_path.display());
    println!("Private key: {}\n", key_path.display());

    print_hashes(&cert_path, &key_pair)
}

fn generate(cert_path: &Path, key_path: &Path) -> Result<KeyPair, Box<dyn Error>> {
    for path in [cert_path, key_path] {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut params =
        CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, "Fruit Merge Dev");

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    fs::write(cert_path, cert.pem())?;
    fs::write(key_path, key_pair.serialize_pem())?;
    Ok(key_pair)
}

/// Print the hashes in the form the server logs at startup
fn print_hashes(cert_path: &Path, key_pair: &KeyPair) -> Result<(), Box<dyn Error>> {
    let cert = pem::parse(fs::read_to_string(cert_path)?)?;

    println!("serverCertificateHashes value (SHA-256, base64):");
    println!("  {}\n", hash_der(cert.contents()));

    println!("Chrome flag:");
    println!(
        "  --ignore-certificate-errors-spki-list={}\n",
        hash_der(&key_pair.public_key_der())
    );

    println!("Start the server from the repository root so it finds the same files.");
    Ok(())
}
