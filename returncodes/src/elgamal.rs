use crate::*;
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Multi-element ElGamal public key (y_1, ..., y_n) with y_i = g^{x_i}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElGamalPublicKey {
    elements: Vec<GroupElement>,
}

impl ElGamalPublicKey {
    pub fn new(elements: Vec<GroupElement>) -> Self {
        ElGamalPublicKey { elements }
    }

    pub fn elements(&self) -> &[GroupElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Multi-element ElGamal private key (x_1, ..., x_n)
pub struct ElGamalPrivateKey {
    exponents: Vec<PrivateExponent>,
}

impl ElGamalPrivateKey {
    pub fn new(exponents: Vec<PrivateExponent>) -> Self {
        ElGamalPrivateKey { exponents }
    }

    pub fn exponents(&self) -> &[PrivateExponent] {
        &self.exponents
    }

    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }
}

impl fmt::Debug for ElGamalPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElGamalPrivateKey(<{} redacted>)", self.exponents.len())
    }
}

/// ElGamal ciphertext (gamma, phi_1, ..., phi_k) = (g^r, m_1 * y_1^r, ..., m_k * y_k^r)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    gamma: GroupElement,
    phis: Vec<GroupElement>,
}

impl Ciphertext {
    pub fn new(gamma: GroupElement, phis: Vec<GroupElement>) -> Self {
        Ciphertext { gamma, phis }
    }

    pub fn gamma(&self) -> &GroupElement {
        &self.gamma
    }

    pub fn phis(&self) -> &[GroupElement] {
        &self.phis
    }

    /// Number of encrypted messages
    pub fn len(&self) -> usize {
        self.phis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phis.is_empty()
    }

    /// gamma followed by every phi
    pub fn elements(&self) -> impl Iterator<Item = &GroupElement> {
        std::iter::once(&self.gamma).chain(self.phis.iter())
    }
}

impl From<&Ciphertext> for Hashable {
    fn from(ciphertext: &Ciphertext) -> Self {
        Hashable::elements(ciphertext.elements())
    }
}

/// Encryption randomness r
///
/// Can only be drawn from a cryptographically secure generator held by this process;
/// there is no way to build one from a caller-supplied value.
/// Callers must not use the same randomness for two different messages under the same key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionRandomness(Exponent);

impl EncryptionRandomness {
    pub fn generate<R: RngCore + CryptoRng>(group: &ZpSubgroup, rng: &mut R) -> Self {
        EncryptionRandomness(group.random_exponent(rng))
    }

    pub(crate) fn exponent(&self) -> &Exponent {
        &self.0
    }
}

impl fmt::Debug for EncryptionRandomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionRandomness(<redacted>)")
    }
}

/// ElGamal encryption over a `ZpSubgroup`
#[derive(Debug, Clone)]
pub struct ElGamalCodec {
    group: ZpSubgroup,
}

impl ElGamalCodec {
    pub fn new(group: ZpSubgroup) -> Self {
        ElGamalCodec { group }
    }

    pub fn group(&self) -> &ZpSubgroup {
        &self.group
    }

    /// Generate a key pair able to encrypt `size` messages at once
    pub fn generate_key_pair<R: RngCore + CryptoRng>(
        &self,
        size: usize,
        rng: &mut R,
    ) -> (ElGamalPrivateKey, ElGamalPublicKey) {
        let private = ElGamalPrivateKey::new(
            (0..size)
                .map(|_| self.group.random_private_exponent(rng))
                .collect(),
        );
        let public = self.public_key(&private);
        (private, public)
    }

    pub fn public_key(&self, private_key: &ElGamalPrivateKey) -> ElGamalPublicKey {
        let elements = private_key
            .exponents()
            .iter()
            .map(|x| self.group.pow_generator(x.exponent()))
            .collect();
        ElGamalPublicKey::new(elements)
    }

    /// Encrypt `messages` with the first `messages.len()` elements of `public_key`
    pub fn encrypt(
        &self,
        public_key: &ElGamalPublicKey,
        messages: &[GroupElement],
        randomness: &EncryptionRandomness,
    ) -> Result<Ciphertext, GroupError> {
        if messages.is_empty() || messages.len() > public_key.len() {
            return Err(GroupError::ArityMismatch {
                expected: public_key.len(),
                found: messages.len(),
            });
        }

        let r = randomness.exponent();
        let gamma = self.group.pow_generator(r);
        let phis = messages
            .iter()
            .zip(public_key.elements())
            .map(|(m, y)| {
                let shared = self.group.pow(y, r)?;
                self.group.multiply(m, &shared)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Ciphertext { gamma, phis })
    }

    /// Re-randomize a ciphertext without changing its plaintext
    pub fn reencrypt(
        &self,
        public_key: &ElGamalPublicKey,
        ciphertext: &Ciphertext,
        randomness: &EncryptionRandomness,
    ) -> Result<Ciphertext, GroupError> {
        let ones = vec![self.group.identity(); ciphertext.len()];
        let blinding = self.encrypt(public_key, &ones, randomness)?;
        self.combine(ciphertext, &blinding)
    }

    /// Homomorphic multiplication, element-wise
    pub fn combine(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, GroupError> {
        if a.len() != b.len() {
            return Err(GroupError::ArityMismatch {
                expected: a.len(),
                found: b.len(),
            });
        }

        let gamma = self.group.multiply(&a.gamma, &b.gamma)?;
        let phis = a
            .phis
            .iter()
            .zip(b.phis.iter())
            .map(|(x, y)| self.group.multiply(x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Ciphertext { gamma, phis })
    }

    /// Decrypt a single-message ciphertext: phi / gamma^x
    pub fn decrypt_with_exponent(
        &self,
        ciphertext: &Ciphertext,
        private_exponent: &PrivateExponent,
    ) -> Result<GroupElement, GroupError> {
        if ciphertext.len() != 1 {
            return Err(GroupError::ArityMismatch {
                expected: 1,
                found: ciphertext.len(),
            });
        }
        self.unblind(&ciphertext.gamma, &ciphertext.phis[0], private_exponent)
    }

    /// Decrypt every message of a ciphertext
    pub fn decrypt(
        &self,
        ciphertext: &Ciphertext,
        private_key: &ElGamalPrivateKey,
    ) -> Result<Vec<GroupElement>, GroupError> {
        if ciphertext.is_empty() || ciphertext.len() > private_key.len() {
            return Err(GroupError::ArityMismatch {
                expected: private_key.len(),
                found: ciphertext.len(),
            });
        }

        ciphertext
            .phis
            .iter()
            .zip(private_key.exponents())
            .map(|(phi, x)| self.unblind(&ciphertext.gamma, phi, x))
            .collect()
    }

    fn unblind(
        &self,
        gamma: &GroupElement,
        phi: &GroupElement,
        x: &PrivateExponent,
    ) -> Result<GroupElement, GroupError> {
        let shared = self.group.pow(gamma, x.exponent())?;
        let inverse = self.group.inverse(&shared)?;
        self.group.multiply(phi, &inverse)
    }
}
