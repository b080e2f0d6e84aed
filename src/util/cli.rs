use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;

use crate::core::types::{ClientSecret, HashedClientSecret};
use crate::crypto::AesCrypto;
use crate::provider::error::Error;
use crate::util::hash::HashingService;

#[derive(Parser)]
#[clap(
    name = "kagami-util",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
pub struct Options {
    #[clap(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand)]
enum SubCommand {
    /// Hashes a client secret for the `secret_hash` field of a client
    /// registration.
    HashSecret(HashSecret),
    /// Prints a fresh key suitable for `ENCRYPTION_KEY`.
    GenerateEncryptionKey,
}

#[derive(clap::Args)]
struct HashSecret {
    #[clap(long, env = "HASH_SECRET")]
    hash_secret: String,
    #[clap(short, long)]
    secret: String,
}

fn hash_secret(c: &HashSecret) -> Result<String, Error> {
    let hasher = HashingService::with_secret_key(c.hash_secret.clone());
    let hashed: HashedClientSecret = hasher.hash(&ClientSecret(c.secret.clone()))?;
    Ok(hashed.0)
}

fn generate_encryption_key() -> String {
    STANDARD.encode(AesCrypto::generate_key())
}

pub fn run_cli_action(opts: Options) -> Result<String, Error> {
    match &opts.command {
        SubCommand::HashSecret(c) => hash_secret(c),
        SubCommand::GenerateEncryptionKey => Ok(generate_encryption_key()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_accepted_by_crypto() {
        let opts = Options::parse_from(["kagami-util", "generate-encryption-key"]);
        let key = run_cli_action(opts).unwrap();
        assert!(AesCrypto::from_base64(&key).is_ok());
    }

    #[test]
    fn hashed_secret_verifies() {
        let opts = Options::parse_from([
            "kagami-util",
            "hash-secret",
            "--hash-secret",
            "pepper",
            "--secret",
            "s3cret",
        ]);
        let hashed = HashedClientSecret(run_cli_action(opts).unwrap());
        let hasher = HashingService::with_secret_key("pepper".to_string());
        assert!(hasher.verify(&ClientSecret("s3cret".to_string()), &hashed).unwrap());
    }
}
