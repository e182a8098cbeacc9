use crate::*;
use crypto_bigint::Encoding;
use digest::Digest;
use hkdf::Hkdf;
use sha2::{Sha256, Sha512};
use sha3::Sha3_256;

const TAG_BYTES: u8 = 0x00;
const TAG_TEXT: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_LIST: u8 = 0x03;

/// A value that can be fed to `HashBuilder::recursive_hash`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hashable {
    Bytes(Vec<u8>),
    Text(String),
    Integer(BigInt),
    List(Vec<Hashable>),
}

impl From<&GroupElement> for Hashable {
    fn from(element: &GroupElement) -> Self {
        Hashable::Integer(*element.value())
    }
}

impl From<&Exponent> for Hashable {
    fn from(exponent: &Exponent) -> Self {
        Hashable::Integer(*exponent.value())
    }
}

impl From<&str> for Hashable {
    fn from(text: &str) -> Self {
        Hashable::Text(text.to_string())
    }
}

impl From<&[u8]> for Hashable {
    fn from(bytes: &[u8]) -> Self {
        Hashable::Bytes(bytes.to_vec())
    }
}

impl From<Vec<Hashable>> for Hashable {
    fn from(items: Vec<Hashable>) -> Self {
        Hashable::List(items)
    }
}

impl Hashable {
    pub fn elements<'a, I: IntoIterator<Item = &'a GroupElement>>(elements: I) -> Self {
        Hashable::List(elements.into_iter().map(Hashable::from).collect())
    }
}

/// Digest, structured hash and keyed digest under one `HashPolicy`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashBuilder {
    policy: HashPolicy,
}

impl HashBuilder {
    pub fn new(policy: HashPolicy) -> Self {
        HashBuilder { policy }
    }

    pub fn policy(&self) -> &HashPolicy {
        &self.policy
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self.policy.algorithm {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
        }
    }

    /// Hash a tree of values with a type tag at every node
    ///
    /// Lists hash the concatenation of their children's digests, so `[a, b]` and `[ab]`
    /// never collide. Text is encoded with the configured charset first.
    pub fn recursive_hash(&self, value: &Hashable) -> Result<Vec<u8>, HashError> {
        let mut buf = Vec::new();
        match value {
            Hashable::Bytes(bytes) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(bytes);
            }
            Hashable::Text(text) => {
                buf.push(TAG_TEXT);
                buf.extend(self.policy.charset.encode(text)?);
            }
            Hashable::Integer(n) => {
                buf.push(TAG_INTEGER);
                buf.extend(minimal_be_bytes(n));
            }
            Hashable::List(items) => {
                buf.push(TAG_LIST);
                for item in items {
                    buf.extend(self.recursive_hash(item)?);
                }
            }
        }
        Ok(self.digest(&buf))
    }

    /// HKDF(salt = key, ikm = input, info) under the configured algorithm, filling `out`
    pub fn keyed_digest(
        &self,
        key: &[u8],
        input: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<(), HashError> {
        let result = match self.policy.algorithm {
            HashAlgorithm::Sha256 => Hkdf::<Sha256>::new(Some(key), input).expand(info, out),
            HashAlgorithm::Sha512 => Hkdf::<Sha512>::new(Some(key), input).expand(info, out),
            HashAlgorithm::Sha3_256 => Hkdf::<Sha3_256>::new(Some(key), input).expand(info, out),
        };
        result.map_err(|_| HashError::OutputLength(out.len()))
    }
}

fn minimal_be_bytes(n: &BigInt) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    match bytes.iter().position(|b| *b != 0) {
        Some(start) => bytes[start..].to_vec(),
        None => vec![0],
    }
}
