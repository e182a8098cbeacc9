use crate::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use zeroize::Zeroize;

/// A message that travels between control components, the combiner and the voting client
///
/// Messages are packed as CBOR by default. Readers accept both CBOR and JSON:
/// JSON is detected by a leading `{`.
pub trait WireMessage: Serialize + DeserializeOwned {
    fn to_bytes(&self) -> Result<Vec<u8>, ConversionError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    fn to_json(&self) -> Result<String, ConversionError> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ConversionError> {
        match bytes.first() {
            None => Err(ConversionError::UnknownFormat),
            Some(b'{') => Ok(serde_json::from_slice(bytes)?),
            Some(_) => Ok(serde_cbor::from_slice(bytes)?),
        }
    }
}

/// Wire form of a `Ciphertext`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EncodedCiphertext {
    pub gamma: HexInteger,
    pub phis: Vec<HexInteger>,
}

impl EncodedCiphertext {
    /// Decode against `group`, checking every element for membership
    pub fn decode(&self, group: &ZpSubgroup) -> Result<Ciphertext, GroupError> {
        if self.phis.is_empty() {
            return Err(GroupError::ArityMismatch {
                expected: 1,
                found: 0,
            });
        }
        let gamma = group.element(self.gamma.0)?;
        let phis = self
            .phis
            .iter()
            .map(|phi| group.element(phi.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Ciphertext::new(gamma, phis))
    }
}

impl From<&Ciphertext> for EncodedCiphertext {
    fn from(ciphertext: &Ciphertext) -> Self {
        EncodedCiphertext {
            gamma: HexInteger::from(ciphertext.gamma()),
            phis: ciphertext.phis().iter().map(HexInteger::from).collect(),
        }
    }
}

impl WireMessage for EncodedCiphertext {}

/// Wire form of a `Proof`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProofMessage {
    pub context: String,
    pub commitment: Vec<HexInteger>,
    pub challenge: HexInteger,
    pub responses: Vec<HexInteger>,
}

impl ProofMessage {
    pub fn decode(&self, group: &ZpSubgroup) -> Result<Proof, ConversionError> {
        let commitment = decode_elements(group, &self.commitment, "proof commitment")?;
        let challenge = decode_exponent(group, &self.challenge, "proof challenge")?;
        let responses = self
            .responses
            .iter()
            .map(|r| decode_exponent(group, r, "proof response"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Proof {
            context: self.context.clone(),
            commitment,
            challenge,
            responses,
        })
    }
}

impl From<&Proof> for ProofMessage {
    fn from(proof: &Proof) -> Self {
        ProofMessage {
            context: proof.context.clone(),
            commitment: proof.commitment.iter().map(HexInteger::from).collect(),
            challenge: HexInteger::from(&proof.challenge),
            responses: proof.responses.iter().map(HexInteger::from).collect(),
        }
    }
}

/// Wire form of a `PartialContribution`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialContributionMessage {
    pub component_id: ComponentId,
    pub ballot_fingerprint: BallotFingerprint,
    pub voter_choice_key: HexInteger,
    pub voter_vote_cast_key: HexInteger,
    pub partial_results: Vec<HexInteger>,
    pub proof: ProofMessage,
}

impl PartialContributionMessage {
    pub fn decode(&self, group: &ZpSubgroup) -> Result<PartialContribution, ConversionError> {
        let element = |value: &HexInteger, field| {
            group
                .element(value.0)
                .map_err(|source| ConversionError::InvalidElement { field, source })
        };
        Ok(PartialContribution {
            component_id: self.component_id,
            ballot_fingerprint: self.ballot_fingerprint.clone(),
            voter_public_keys: VoterPublicKeys {
                choice: element(&self.voter_choice_key, "voter choice key")?,
                vote_cast: element(&self.voter_vote_cast_key, "voter vote cast key")?,
            },
            partial_results: decode_elements(group, &self.partial_results, "partial result")?,
            proof: self.proof.decode(group)?,
        })
    }
}

impl From<&PartialContribution> for PartialContributionMessage {
    fn from(contribution: &PartialContribution) -> Self {
        PartialContributionMessage {
            component_id: contribution.component_id,
            ballot_fingerprint: contribution.ballot_fingerprint.clone(),
            voter_choice_key: HexInteger::from(&contribution.voter_public_keys.choice),
            voter_vote_cast_key: HexInteger::from(&contribution.voter_public_keys.vote_cast),
            partial_results: contribution
                .partial_results
                .iter()
                .map(HexInteger::from)
                .collect(),
            proof: ProofMessage::from(&contribution.proof),
        }
    }
}

impl WireMessage for PartialContributionMessage {}

/// Wire form of one custodian's `KeyShare`, as handed over at the end of a key ceremony
///
/// The share value is secret: it is redacted in debug output and zeroized on drop.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct KeyShareMessage {
    pub component_id: ComponentId,
    pub index: u32,
    pub value: HexInteger,
    pub threshold: usize,
    pub total: usize,
    pub commitments: Vec<HexInteger>,
}

impl KeyShareMessage {
    pub fn new(component_id: ComponentId, share: &KeyShare) -> Self {
        KeyShareMessage {
            component_id,
            index: share.index,
            value: HexInteger::from(share.value().exponent()),
            threshold: share.threshold,
            total: share.total,
            commitments: share.commitments.iter().map(HexInteger::from).collect(),
        }
    }

    /// Decode against `group`; consistency with the other shares is checked on reconstruction
    pub fn decode(&self, group: &ZpSubgroup) -> Result<KeyShare, ConversionError> {
        let value = decode_exponent(group, &self.value, "key share value")?;
        Ok(KeyShare::from_parts(
            self.index,
            PrivateExponent::new(value),
            self.threshold,
            self.total,
            decode_elements(group, &self.commitments, "key share commitment")?,
        ))
    }
}

impl fmt::Debug for KeyShareMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShareMessage")
            .field("component_id", &self.component_id)
            .field("index", &self.index)
            .field("value", &"<redacted>")
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .finish()
    }
}

impl Drop for KeyShareMessage {
    fn drop(&mut self) {
        self.value.0.zeroize();
    }
}

impl WireMessage for KeyShareMessage {}

fn decode_elements(
    group: &ZpSubgroup,
    values: &[HexInteger],
    field: &'static str,
) -> Result<Vec<GroupElement>, ConversionError> {
    values
        .iter()
        .map(|v| {
            group
                .element(v.0)
                .map_err(|source| ConversionError::InvalidElement { field, source })
        })
        .collect()
}

fn decode_exponent(
    group: &ZpSubgroup,
    value: &HexInteger,
    field: &'static str,
) -> Result<Exponent, ConversionError> {
    group
        .exponent(value.0)
        .map_err(|source| ConversionError::InvalidElement { field, source })
}
