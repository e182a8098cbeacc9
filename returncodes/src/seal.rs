//! Sealed export of a control-component private key.
//!
//! The key is encrypted with AES-256-GCM under a key derived with HKDF-SHA256 from an
//! operator-held sealing secret and a random salt. The public key is authenticated as
//! associated data, so a sealed key cannot be re-labelled with another component's public key.

use crate::*;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

const AES_IV_LENGTH: usize = 12;
const SALT_LENGTH: usize = 16;
const SEAL_INFO: &[u8] = b"returncodes/sealed-key";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    pub public_key: HexInteger,

    #[serde(with = "hex_serde")]
    pub salt: Vec<u8>,

    /// nonce || AES-GCM ciphertext
    #[serde(with = "hex_serde")]
    pub ciphertext: Vec<u8>,
}

impl SealedKey {
    pub fn seal<R: RngCore + CryptoRng>(
        group: &ZpSubgroup,
        key: &PrivateExponent,
        sealing_secret: &[u8],
        rng: &mut R,
    ) -> Result<Self, SealError> {
        let public_key = group.pow_generator(key.exponent());

        let mut salt = vec![0u8; SALT_LENGTH];
        rng.fill_bytes(&mut salt);
        let aes_key = derive_key(sealing_secret, &salt)?;

        let mut nonce = [0u8; AES_IV_LENGTH];
        rng.fill_bytes(&mut nonce);

        let plaintext = Zeroizing::new(group.exponent_to_bytes(key.exponent()));
        let aad = group.to_bytes(&public_key);
        let aead = Aes256Gcm::new_from_slice(aes_key.as_slice()).map_err(|_| SealError::Aead)?;
        let encrypted = aead
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: &aad,
                },
            )
            .map_err(|_| SealError::Aead)?;

        let mut ciphertext = Vec::with_capacity(AES_IV_LENGTH + encrypted.len());
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend(encrypted);

        Ok(SealedKey {
            public_key: HexInteger::from(&public_key),
            salt,
            ciphertext,
        })
    }

    /// Recover the private key, checking it against the sealed public key
    pub fn unseal(
        &self,
        group: &ZpSubgroup,
        sealing_secret: &[u8],
    ) -> Result<PrivateExponent, SealError> {
        if self.ciphertext.len() <= AES_IV_LENGTH {
            return Err(SealError::Truncated);
        }

        let public_key = group.element(self.public_key.0)?;
        let aes_key = derive_key(sealing_secret, &self.salt)?;
        let aad = group.to_bytes(&public_key);

        let (nonce, encrypted) = self.ciphertext.split_at(AES_IV_LENGTH);
        let aead = Aes256Gcm::new_from_slice(aes_key.as_slice()).map_err(|_| SealError::Aead)?;
        let plaintext = Zeroizing::new(
            aead.decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: encrypted,
                    aad: &aad,
                },
            )
            .map_err(|_| SealError::Aead)?,
        );

        let key = PrivateExponent::new(group.exponent(bigint_from_be_bytes(&plaintext))?);
        if group.pow_generator(key.exponent()) != public_key {
            return Err(SealError::InvalidKey(GroupError::InvalidExponent));
        }

        Ok(key)
    }

    pub fn public_key(&self, group: &ZpSubgroup) -> Result<GroupElement, GroupError> {
        group.element(self.public_key.0)
    }
}

fn derive_key(sealing_secret: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, SealError> {
    let h = Hkdf::<Sha256>::new(Some(salt), sealing_secret);
    let mut out = Zeroizing::new([0u8; 32]);
    h.expand(SEAL_INFO, &mut out[..])
        .map_err(|_| HashError::OutputLength(32))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_seal_roundtrip() {
        let mut rng = ChaCha20Rng::from_seed([30u8; 32]);
        let group = test_group();
        let key = group.random_private_exponent(&mut rng);

        let sealed = SealedKey::seal(&group, &key, b"operator secret", &mut rng).unwrap();
        assert_eq!(
            sealed.public_key(&group).unwrap(),
            group.pow_generator(key.exponent())
        );

        let json = serde_json::to_string(&sealed).unwrap();
        let sealed: SealedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(sealed.unseal(&group, b"operator secret").unwrap(), key);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let mut rng = ChaCha20Rng::from_seed([31u8; 32]);
        let group = test_group();
        let key = group.random_private_exponent(&mut rng);
        let sealed = SealedKey::seal(&group, &key, b"operator secret", &mut rng).unwrap();

        assert!(matches!(
            sealed.unseal(&group, b"wrong secret"),
            Err(SealError::Aead)
        ));
    }

    #[test]
    fn test_tampered_seal_fails() {
        let mut rng = ChaCha20Rng::from_seed([32u8; 32]);
        let group = test_group();
        let key = group.random_private_exponent(&mut rng);
        let sealed = SealedKey::seal(&group, &key, b"operator secret", &mut rng).unwrap();

        // Swap in another public key
        let other = group.random_private_exponent(&mut rng);
        let mut relabeled = sealed.clone();
        relabeled.public_key = HexInteger::from(&group.pow_generator(other.exponent()));
        assert!(matches!(
            relabeled.unseal(&group, b"operator secret"),
            Err(SealError::Aead)
        ));

        let mut truncated = sealed;
        truncated.ciphertext.truncate(AES_IV_LENGTH);
        assert!(matches!(
            truncated.unseal(&group, b"operator secret"),
            Err(SealError::Truncated)
        ));
    }
}
