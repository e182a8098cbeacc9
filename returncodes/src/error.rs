use crate::*;

use thiserror::Error;

/// Crate-level error, wrapping the error of whichever component failed
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Contribution(#[from] ContributionError),

    #[error(transparent)]
    Combination(#[from] CombinationError),

    #[error("returncodes: invalid configuration: {0}")]
    Config(String),

    #[error("returncodes: unable to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Group arithmetic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("returncodes: value is not a member of the prime-order subgroup")]
    InvalidGroupElement,

    #[error("returncodes: exponent is not in the range [0, q)")]
    InvalidExponent,

    #[error("returncodes: invalid group parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("returncodes: exponent has no inverse modulo q")]
    NotInvertible,

    #[error("returncodes: mismatched ciphertext or key arity: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },
}

/// Hashing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("returncodes: character {character:?} cannot be encoded as {charset}")]
    UnencodableText { charset: Charset, character: char },

    #[error("returncodes: keyed digest cannot produce {0} bytes")]
    OutputLength(usize),

    #[error("returncodes: no group element found after {attempts} hash-to-group attempts")]
    HashToGroupExhausted { attempts: u32 },

    #[error("returncodes: no exponent in [1, q) found after {attempts} derivation attempts")]
    ExponentDerivationExhausted { attempts: u32 },
}

/// Proof engine errors
///
/// A proof that simply fails to verify is not an error: `verify` returns `Ok(false)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("returncodes: malformed proof: expected {expected} {part}, found {found}")]
    MalformedProof {
        part: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("returncodes: proof context mismatch: verifier uses {expected}, proof was made with {found}")]
    ContextMismatch { expected: String, found: String },

    #[error("returncodes: witness has {found} exponents, statement needs {expected}")]
    WitnessArity { expected: usize, found: usize },

    #[error("returncodes: witness does not satisfy the statement")]
    WitnessMismatch,

    #[error("returncodes: invalid statement: {0}")]
    InvalidStatement(&'static str),

    #[error("returncodes: proof group error: {0}")]
    Group(#[from] GroupError),

    #[error("returncodes: proof hash error: {0}")]
    Hash(#[from] HashError),
}

/// Threshold secret sharing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("returncodes: invalid threshold {threshold} of {total}")]
    InvalidThreshold { threshold: usize, total: usize },

    #[error("returncodes: not enough secret shares: need {needed}, found {found}")]
    InsufficientShares { needed: usize, found: usize },

    #[error("returncodes: share {index} is inconsistent with the reconstruction polynomial")]
    InconsistentShare { index: u32 },

    #[error("returncodes: reconstructed key does not match the published public key")]
    PublicKeyMismatch,

    #[error("returncodes: share group error: {0}")]
    Group(#[from] GroupError),
}

/// Key sealing errors
#[derive(Debug, Error)]
pub enum SealError {
    #[error("returncodes: sealed key is truncated")]
    Truncated,

    #[error("returncodes: unable to unseal key - wrong sealing secret or corrupted data")]
    Aead,

    #[error("returncodes: unsealed key is not a valid exponent")]
    InvalidKey(#[from] GroupError),

    #[error("returncodes: key derivation failed: {0}")]
    Hash(#[from] HashError),
}

/// Structural and serialization errors
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("returncodes: invalid hexadecimal in {0}")]
    BadHex(&'static str),

    #[error("returncodes: integer in {0} is too large")]
    TooLarge(&'static str),

    #[error("returncodes: invalid verification card id {0:?}")]
    InvalidVerificationCardId(String),

    #[error("returncodes: no ballot casting key material for verification card {0}")]
    MissingBallotCastingKey(VerificationCardId),

    #[error("returncodes: invalid {field}: {source}")]
    InvalidElement {
        field: &'static str,
        source: GroupError,
    },

    #[error("returncodes: correctness information covers {expected} selections, ballot has {found}")]
    SelectionCountMismatch { expected: usize, found: usize },

    #[error("returncodes: ballot carries no correctness information")]
    MissingCorrectnessInformation,

    #[error("returncodes: selection index {0} is out of range")]
    SelectionIndexOutOfRange(usize),

    #[error("returncodes: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("returncodes: CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("returncodes: unable to deserialize: empty or unknown format")]
    UnknownFormat,
}

/// Errors raised by a control component computing its partial contribution
#[derive(Debug, Error)]
pub enum ContributionError {
    #[error("returncodes: encrypted representation {index} is not a valid ciphertext: {source}")]
    InvalidCiphertext { index: usize, source: GroupError },

    #[error("returncodes: ballot conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("returncodes: control component {component_id} failed to prove its contribution for ballot {fingerprint}: {source}")]
    Proof {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
        source: ProofError,
    },

    #[error("returncodes: contribution group error: {0}")]
    Group(#[from] GroupError),

    #[error("returncodes: contribution hash error: {0}")]
    Hash(#[from] HashError),
}

/// Errors raised while combining the partial contributions for one ballot
#[derive(Debug, Error)]
pub enum CombinationError {
    #[error("returncodes: missing contributions from control components {component_ids:?} for ballot {fingerprint}")]
    MissingContribution {
        component_ids: Vec<ComponentId>,
        fingerprint: BallotFingerprint,
    },

    #[error("returncodes: proof of control component {component_id} failed to verify for ballot {fingerprint}")]
    InvalidProof {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
    },

    #[error("returncodes: control component {component_id} submitted conflicting contributions for ballot {fingerprint}")]
    ConflictingContribution {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
    },

    #[error("returncodes: proof of control component {component_id} for ballot {fingerprint} was made under a different configuration: {source}")]
    ProofConfiguration {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
        source: ProofError,
    },

    #[error("returncodes: contribution of control component {component_id} for ballot {fingerprint} is malformed: {source}")]
    MalformedContribution {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
        source: ProofError,
    },

    #[error("returncodes: control component {component_id} has no registered public key (ballot {fingerprint})")]
    UnregisteredComponent {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
    },

    #[error("returncodes: voter keys of control component {component_id} for ballot {fingerprint} differ from the published ones")]
    VoterKeyMismatch {
        component_id: ComponentId,
        fingerprint: BallotFingerprint,
    },

    #[error("returncodes: no control components expected for ballot {0}")]
    NoExpectedComponents(BallotFingerprint),

    #[error("returncodes: encrypted representation {index} is not a valid ciphertext: {source}")]
    InvalidCiphertext { index: usize, source: GroupError },

    #[error("returncodes: unable to build combined correctness information: {0}")]
    CombinedCorrectnessInformationConversion(#[from] ConversionError),

    #[error("returncodes: combination group error: {0}")]
    Group(#[from] GroupError),

    #[error("returncodes: combination hash error: {0}")]
    Hash(#[from] HashError),
}

impl From<ContributionError> for CombinationError {
    fn from(e: ContributionError) -> Self {
        match e {
            ContributionError::InvalidCiphertext { index, source } => {
                CombinationError::InvalidCiphertext { index, source }
            }
            ContributionError::Conversion(e) => {
                CombinationError::CombinedCorrectnessInformationConversion(e)
            }
            ContributionError::Group(e) => CombinationError::Group(e),
            ContributionError::Hash(e) => CombinationError::Hash(e),
            ContributionError::Proof {
                component_id,
                fingerprint,
                source,
            } => CombinationError::MalformedContribution {
                component_id,
                fingerprint,
                source,
            },
        }
    }
}
