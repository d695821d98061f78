use ed25519_dalek::{Signer, SigningKey};
use garden_auth::KeyEncoding;
use serde::{Deserialize, Serialize};

/// What a wallet hands back after signing a challenge message.
///
/// Encodings must match the service's configured key encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSignature {
    pub signature: String,
    pub public_key: String,
    pub wallet_address: String,
}

/// Ed25519 key held in process, for scripts and test harnesses that sign
/// without a browser wallet. The wallet address is the encoded public key.
pub struct LocalWallet {
    key: SigningKey,
    encoding: KeyEncoding,
}

impl LocalWallet {
    pub fn from_bytes(secret: &[u8; 32], encoding: KeyEncoding) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
            encoding,
        }
    }

    pub fn public_key(&self) -> String {
        self.encoding.encode(self.key.verifying_key().as_bytes())
    }

    pub fn address(&self) -> String {
        self.public_key()
    }

    pub fn sign(&self, message: &str) -> WalletSignature {
        let signature = self.key.sign(message.as_bytes());
        WalletSignature {
            signature: self.encoding.encode(&signature.to_bytes()),
            public_key: self.public_key(),
            wallet_address: self.address(),
        }
    }
}
