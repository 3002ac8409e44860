//! Signing identity loading

use pet_client::ConfigError;
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::path::Path;

/// Load a keypair from a JSON keypair file, or from a base58 encoded
/// 64 byte secret key as exported by browser wallets
pub fn load(source: &str) -> Result<Keypair, ConfigError> {
    if Path::new(source).exists() {
        return read_keypair_file(source).map_err(|e| ConfigError::Keypair {
            path: source.to_string(),
            reason: e.to_string(),
        });
    }

    let bytes = bs58::decode(source).into_vec().map_err(|e| ConfigError::Keypair {
        path: "<base58>".to_string(),
        reason: format!("not a file and not base58: {}", e),
    })?;
    Keypair::from_bytes(&bytes).map_err(|e| ConfigError::Keypair {
        path: "<base58>".to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    #[test]
    fn test_load_base58_secret() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        assert_eq!(load(&encoded).unwrap().pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_garbage() {
        let err = load("definitely/not/a/keypair.json").unwrap_err();
        assert!(matches!(err, ConfigError::Keypair { .. }));
    }
}
