use crate::*;
use std::fmt;
use std::path::Path;

/// RFC 3526, 2048-bit MODP group (group id 14)
const RFC3526_2048_P: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF6955817183995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// Digest algorithm used for Fiat-Shamir challenges, fingerprints and code derivation
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-256")]
    Sha256,

    #[serde(rename = "SHA-512")]
    Sha512,

    #[serde(rename = "SHA3-256")]
    Sha3_256,
}

impl HashAlgorithm {
    /// Digest length in bytes
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Sha3_256 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Sha3_256 => "SHA3-256",
        };
        write!(f, "{}", name)
    }
}

/// Character encoding applied to text before it is hashed
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    #[serde(rename = "UTF-8")]
    Utf8,

    #[serde(rename = "UTF-16BE")]
    Utf16Be,

    #[serde(rename = "ISO-8859-1")]
    Latin1,
}

impl Charset {
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, HashError> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Utf16Be => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect()),
            Charset::Latin1 => text
                .chars()
                .map(|c| {
                    if (c as u32) <= 0xFF {
                        Ok(c as u8)
                    } else {
                        Err(HashError::UnencodableText {
                            charset: *self,
                            character: c,
                        })
                    }
                })
                .collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Latin1 => "ISO-8859-1",
        };
        write!(f, "{}", name)
    }
}

/// The hashing context shared by provers, verifiers and the code deriver
///
/// Two parties only interoperate when their policies are identical; the proof engine
/// stamps `identifier()` into every proof so a mismatch can be told apart from a forgery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashPolicy {
    pub algorithm: HashAlgorithm,
    pub provider: String,
    pub charset: Charset,
}

impl HashPolicy {
    pub fn new(algorithm: HashAlgorithm, provider: &str, charset: Charset) -> Self {
        HashPolicy {
            algorithm,
            provider: provider.to_string(),
            charset,
        }
    }

    /// `ALGORITHM/provider/CHARSET`
    pub fn identifier(&self) -> String {
        format!("{}/{}/{}", self.algorithm, self.provider, self.charset)
    }
}

impl Default for HashPolicy {
    fn default() -> Self {
        HashPolicy::new(HashAlgorithm::Sha256, "rust-crypto", Charset::Utf8)
    }
}

/// Public parameters (p, q, g) of the prime-order subgroup of Z*_p
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupParameters {
    pub p: HexInteger,
    pub q: HexInteger,
    pub g: HexInteger,
}

impl GroupParameters {
    /// The 2048-bit MODP group of RFC 3526 with g = 2 and q = (p - 1) / 2
    pub fn rfc3526_2048() -> Self {
        let p = BigInt::from_be_hex(RFC3526_2048_P);
        let q = p.wrapping_sub(&BigInt::ONE).shr_vartime(1);

        GroupParameters {
            p: HexInteger(p),
            q: HexInteger(q),
            g: HexInteger(BigInt::from_u8(2)),
        }
    }

    pub fn group(&self) -> Result<ZpSubgroup, GroupError> {
        ZpSubgroup::new(self.p.0, self.q.0, self.g.0)
    }
}

impl Default for GroupParameters {
    fn default() -> Self {
        GroupParameters::rfc3526_2048()
    }
}

/// A t-of-n threshold
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    pub threshold: usize,
    pub total: usize,
}

impl ThresholdConfig {
    pub fn new(threshold: usize, total: usize) -> Result<Self, ShareError> {
        let config = ThresholdConfig { threshold, total };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShareError> {
        // Share indices are u32 evaluation points starting at 1
        if self.threshold == 0 || self.threshold > self.total || self.total > u32::MAX as usize {
            return Err(ShareError::InvalidThreshold {
                threshold: self.threshold,
                total: self.total,
            });
        }
        Ok(())
    }
}

/// Complete configuration for a control component, combiner or ceremony
///
/// The library never reads the environment: callers build or load a `Config`
/// and hand the pieces to the components at construction time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub group: GroupParameters,

    #[serde(default)]
    pub hash_policy: HashPolicy,

    pub key_sharing: ThresholdConfig,

    pub control_components: Vec<ComponentId>,

    /// Secret key for return code derivation
    #[serde(with = "hex_serde")]
    pub code_derivation_key: Vec<u8>,

    #[serde(default = "default_contribution_timeout")]
    pub contribution_timeout_secs: u64,
}

fn default_contribution_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(json).map_err(ConversionError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.key_sharing.validate()?;
        self.group.group()?;

        if self.control_components.is_empty() {
            return Err(Error::Config("no control components configured".to_string()));
        }
        let mut ids = self.control_components.clone();
        ids.sort();
        ids.dedup();
        if ids.len() != self.control_components.len() {
            return Err(Error::Config("duplicate control component id".to_string()));
        }
        if self.code_derivation_key.len() < 16 {
            return Err(Error::Config(
                "code derivation key must be at least 16 bytes".to_string(),
            ));
        }
        Ok(())
    }

    pub fn group(&self) -> Result<ZpSubgroup, GroupError> {
        self.group.group()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            group: GroupParameters::default(),
            hash_policy: HashPolicy::default(),
            key_sharing: ThresholdConfig {
                threshold: 2,
                total: 3,
            },
            control_components: (1..=4).map(ComponentId).collect(),
            code_derivation_key: b"returncodes-default-code-key-000".to_vec(),
            contribution_timeout_secs: default_contribution_timeout(),
        }
    }
}
