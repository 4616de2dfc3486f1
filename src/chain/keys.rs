use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};

use crate::error::ChainError;

type Blake2b160 = Blake2b<U20>;
type Blake2b256 = Blake2b<U32>;

const EDSK_SEED_PREFIX: [u8; 4] = [13, 15, 58, 7];
const EDSK_SECRET_PREFIX: [u8; 4] = [43, 246, 78, 7];
const EDPK_PREFIX: [u8; 4] = [13, 15, 37, 217];
const TZ1_PREFIX: [u8; 3] = [6, 161, 159];

/// Watermark prepended to manager operations before signing
const GENERIC_OPERATION_WATERMARK: u8 = 0x03;

pub(crate) fn b58check_encode(prefix: &[u8], payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(prefix.len() + payload.len());
    bytes.extend_from_slice(prefix);
    bytes.extend_from_slice(payload);
    bs58::encode(bytes).with_check().into_string()
}

/// In-memory ed25519 signer for a `tz1` account
pub struct TezosSigner {
    signing_key: SigningKey,
    public_key_hash: String,
}

impl std::fmt::Debug for TezosSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TezosSigner")
            .field("public_key_hash", &self.public_key_hash)
            .finish_non_exhaustive()
    }
}

impl TezosSigner {
    /// Decode an unencrypted `edsk` secret key, either the 32-byte seed form
    /// or the 64-byte expanded form.
    pub fn from_secret_key(encoded: &str) -> Result<Self, ChainError> {
        let decoded = bs58::decode(encoded.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| ChainError::InvalidKey(format!("base58check decode failed: {}", e)))?;

        let seed: [u8; 32] = if decoded.len() == 36 && decoded[..4] == EDSK_SEED_PREFIX {
            decoded[4..36]
                .try_into()
                .map_err(|_| ChainError::InvalidKey("truncated seed".to_string()))?
        } else if decoded.len() == 68 && decoded[..4] == EDSK_SECRET_PREFIX {
            decoded[4..36]
                .try_into()
                .map_err(|_| ChainError::InvalidKey("truncated secret key".to_string()))?
        } else {
            return Err(ChainError::InvalidKey(
                "expected an unencrypted ed25519 (edsk) secret key".to_string(),
            ));
        };

        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let digest = Blake2b160::digest(signing_key.verifying_key().as_bytes());
        let public_key_hash = b58check_encode(&TZ1_PREFIX, &digest);

        Self {
            signing_key,
            public_key_hash,
        }
    }

    /// `tz1...` address of the signer
    pub fn public_key_hash(&self) -> &str {
        &self.public_key_hash
    }

    /// `edpk...` encoded public key
    pub fn public_key(&self) -> String {
        b58check_encode(&EDPK_PREFIX, self.signing_key.verifying_key().as_bytes())
    }

    /// Sign forged operation bytes: ed25519 over `blake2b_256(0x03 || bytes)`
    pub fn sign_operation(&self, forged: &[u8]) -> [u8; 64] {
        let mut hasher = Blake2b256::new();
        hasher.update([GENERIC_OPERATION_WATERMARK]);
        hasher.update(forged);
        let digest = hasher.finalize();

        self.signing_key.sign(&digest).to_bytes()
    }
}
