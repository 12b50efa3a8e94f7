//! Wallet management and operation signing.
//!
//! # Security
//! - Secret keys are loaded ONLY from the environment
//! - Keys are never logged, serialized, or echoed in error messages

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::config::env::{require, EnvSource, Role};
use crate::config::ConfigError;
use crate::crypto::base58::{self, EDSK, EDSK_SEED};
use crate::crypto::hash::blake2b_256;
use crate::crypto::{Address, PublicKey, Signature};
use crate::tezos::types::{TezosError, TezosResult};

/// Watermark prepended to manager operations before signing.
pub const OPERATION_WATERMARK: u8 = 0x03;

/// An ed25519 signing identity.
pub struct Wallet {
    signing_key: SigningKey,
    public_key: PublicKey,
    address: Address,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address.to_string()).finish_non_exhaustive()
    }
}

impl Wallet {
    /// Create a wallet from an `edsk` secret key.
    ///
    /// Both the 32 byte seed form and the 64 byte seed-plus-public-key form
    /// are accepted. Encrypted (`edesk`) keys are not.
    pub fn from_secret_key(secret: &str) -> TezosResult<Self> {
        let secret = secret.trim();
        if secret.starts_with("edesk") {
            return Err(TezosError::Wallet("Encrypted secret keys are not supported".to_string()));
        }

        let (prefix, payload) = base58::decode_any(secret, &[&EDSK_SEED, &EDSK])
            .map_err(|_| TezosError::Wallet("Invalid secret key format, expected an edsk key".to_string()))?;

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&payload[..32]);
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        if prefix == &EDSK && payload[32..] != verifying_key.as_bytes()[..] {
            return Err(TezosError::Wallet("Secret key does not match its embedded public key".to_string()));
        }

        let public_key = PublicKey::Ed25519(verifying_key.to_bytes());
        let address = Address::implicit(public_key.hash());

        tracing::info!(address = %address, "Wallet initialized");

        Ok(Self { signing_key, public_key, address })
    }

    /// Load the wallet for `role` from its environment variable.
    ///
    /// A missing or unusable key is a configuration error naming the variable.
    pub fn from_env(env: &dyn EnvSource, role: Role) -> Result<Self, ConfigError> {
        let key = role.key_env();
        let secret = require(env, key)?;
        Self::from_secret_key(&secret).map_err(|e| ConfigError::InvalidEnv {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign forged operation bytes: ed25519 over blake2b-256 of the watermarked bytes.
    pub fn sign_operation(&self, forged: &[u8]) -> Signature {
        let mut watermarked = Vec::with_capacity(forged.len() + 1);
        watermarked.push(OPERATION_WATERMARK);
        watermarked.extend_from_slice(forged);
        self.sign_bytes(&watermarked)
    }

    /// Sign arbitrary bytes (e.g. packed data) without a watermark.
    pub fn sign_bytes(&self, bytes: &[u8]) -> Signature {
        Signature(self.signing_key.sign(&blake2b_256(bytes)).to_bytes())
    }
}

/// Check a signature produced by [`Wallet::sign_bytes`].
pub fn verify_bytes(public_key: &PublicKey, bytes: &[u8], signature: &Signature) -> bool {
    let PublicKey::Ed25519(raw) = public_key else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(raw) else {
        return false;
    };
    key.verify(&blake2b_256(bytes), &ed25519_dalek::Signature::from_bytes(signature.as_bytes()))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn seed_key(byte: u8) -> String {
        base58::encode(&EDSK_SEED, &[byte; 32])
    }

    #[test]
    fn test_seed_and_expanded_forms_agree() {
        let from_seed = Wallet::from_secret_key(&seed_key(7)).unwrap();

        let mut expanded = vec![7u8; 32];
        expanded.extend_from_slice(&from_seed.public_key().to_bytes()[1..]);
        let from_expanded = Wallet::from_secret_key(&base58::encode(&EDSK, &expanded)).unwrap();

        assert_eq!(from_seed.address(), from_expanded.address());
        assert!(from_seed.address().to_string().starts_with("tz1"));
        assert!(from_seed.public_key().to_string().starts_with("edpk"));
    }

    #[test]
    fn test_expanded_form_must_match() {
        let mut expanded = vec![7u8; 32];
        expanded.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            Wallet::from_secret_key(&base58::encode(&EDSK, &expanded)),
            Err(TezosError::Wallet(_))
        ));
    }

    #[test]
    fn test_errors_never_echo_the_key() {
        let secret = "edskNotARealKey";
        let err = Wallet::from_secret_key(secret).unwrap_err().to_string();
        assert!(!err.contains(secret));
        assert!(Wallet::from_secret_key("edesk1abc").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_secret_key(&seed_key(7)).unwrap();
        let debug = format!("{wallet:?}");
        assert!(debug.contains("tz1"));
        assert!(!debug.contains("signing_key"));
    }

    #[test]
    fn test_signatures_verify() {
        let wallet = Wallet::from_secret_key(&seed_key(9)).unwrap();
        let message = b"\x05\x07\x07\x00\x01\x00\x02";

        let signature = wallet.sign_bytes(message);
        assert!(verify_bytes(wallet.public_key(), message, &signature));
        assert!(!verify_bytes(wallet.public_key(), b"other", &signature));

        let forged = [0xab; 40];
        let op_sig = wallet.sign_operation(&forged);
        let mut watermarked = vec![OPERATION_WATERMARK];
        watermarked.extend_from_slice(&forged);
        assert!(verify_bytes(wallet.public_key(), &watermarked, &op_sig));
        assert_ne!(op_sig, wallet.sign_bytes(&forged));
    }

    #[test]
    fn test_from_env_reports_variable() {
        let env: HashMap<String, String> = HashMap::new();
        assert!(matches!(
            Wallet::from_env(&env, Role::TokenAdmin),
            Err(ConfigError::MissingEnv(key)) if key == "BACKED_TOKEN_ADMIN_PRIVATE_KEY"
        ));

        let env: HashMap<String, String> =
            [("TEZOS_DEPLOYER_PRIVATE_KEY".to_string(), "garbage".to_string())].into();
        assert!(matches!(
            Wallet::from_env(&env, Role::Deployer),
            Err(ConfigError::InvalidEnv { .. })
        ));
    }
}
