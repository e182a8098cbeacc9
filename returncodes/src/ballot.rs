use crate::*;
use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a voter's verification card: 32 lowercase hex characters
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerificationCardId(String);

impl VerificationCardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn random() -> Self {
        VerificationCardId(Uuid::new_v4().to_simple().to_string())
    }
}

impl FromStr for VerificationCardId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed =
            s.len() == 32 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(ConversionError::InvalidVerificationCardId(s.to_string()));
        }
        Ok(VerificationCardId(s.to_string()))
    }
}

impl fmt::Display for VerificationCardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VerificationCardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerificationCardId({})", self.0)
    }
}

impl Serialize for VerificationCardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VerificationCardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VerificationCardId::from_str(&s).map_err(DeError::custom)
    }
}

/// Digest binding a proof to one ballot
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BallotFingerprint(Vec<u8>);

impl BallotFingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for BallotFingerprint {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ConversionError::BadHex("ballot fingerprint"))?;
        Ok(BallotFingerprint(bytes))
    }
}

impl fmt::Display for BallotFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for BallotFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BallotFingerprint({})", self)
    }
}

impl Serialize for BallotFingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BallotFingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BallotFingerprint::from_str(&s).map_err(DeError::custom)
    }
}

/// An encrypted ballot as delivered by the ballot-casting workflow
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub id: Uuid,

    pub verification_card_id: VerificationCardId,

    /// One ciphertext per selection
    pub encrypted_representations: Vec<EncodedCiphertext>,

    /// Verification card id to hex-encoded confirmation key element.
    ///
    /// Hashmaps are not allowed because their unstable ordering leads to non-determinism.
    pub ballot_casting_keys: IndexMap<String, String>,

    #[serde(default)]
    pub correctness_information: Vec<CorrectnessInformation>,
}

impl Ballot {
    pub fn new(
        verification_card_id: VerificationCardId,
        ciphertexts: &[Ciphertext],
        confirmation_key: &GroupElement,
        correctness_information: Vec<CorrectnessInformation>,
    ) -> Self {
        let mut ballot_casting_keys = IndexMap::new();
        ballot_casting_keys.insert(
            verification_card_id.to_string(),
            HexInteger::from(confirmation_key).to_string(),
        );

        Ballot {
            id: Uuid::new_v4(),
            verification_card_id,
            encrypted_representations: ciphertexts.iter().map(EncodedCiphertext::from).collect(),
            ballot_casting_keys,
            correctness_information,
        }
    }
}

impl WireMessage for Ballot {}

/// A ballot after decoding and validation, with the bases every component exponentiates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBallot {
    pub ballot_id: Uuid,
    pub verification_card_id: VerificationCardId,
    pub ciphertexts: Vec<Ciphertext>,
    pub confirmation_key: GroupElement,

    /// One base per selection, then the confirmation base
    pub bases: Vec<GroupElement>,

    pub fingerprint: BallotFingerprint,
    pub correctness_information: Vec<CorrectnessInformation>,
}

impl PreparedBallot {
    /// Decode and validate a ballot, deriving its bases and fingerprint
    ///
    /// Every ciphertext element must be a subgroup member; the first offending ciphertext is
    /// reported by index. Nothing is ever substituted for an invalid value.
    pub fn prepare(
        ballot: &Ballot,
        group: &ZpSubgroup,
        hasher: &HashBuilder,
    ) -> Result<Self, ContributionError> {
        let ciphertexts = ballot
            .encrypted_representations
            .iter()
            .enumerate()
            .map(|(index, encoded)| {
                encoded
                    .decode(group)
                    .map_err(|source| ContributionError::InvalidCiphertext { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let confirmation_key = confirmation_key(ballot, group)?;
        validate_correctness_information(&ballot.correctness_information, ciphertexts.len())?;

        let mut bases = Vec::with_capacity(ciphertexts.len() + 1);
        for (index, ciphertext) in ciphertexts.iter().enumerate() {
            let input = Hashable::List(vec![
                Hashable::from("selection"),
                Hashable::Integer(BigInt::from_u64(index as u64)),
                Hashable::from(ciphertext),
            ]);
            bases.push(group.hash_to_element(hasher, &hasher.recursive_hash(&input)?)?);
        }
        let input = Hashable::List(vec![
            Hashable::from("confirmation"),
            Hashable::from(ballot.verification_card_id.as_str()),
            Hashable::from(&confirmation_key),
        ]);
        bases.push(group.hash_to_element(hasher, &hasher.recursive_hash(&input)?)?);

        let fingerprint = BallotFingerprint(hasher.recursive_hash(&Hashable::List(vec![
            Hashable::from(ballot.id.to_string().as_str()),
            Hashable::from(ballot.verification_card_id.as_str()),
            Hashable::List(ciphertexts.iter().map(Hashable::from).collect()),
            Hashable::from(&confirmation_key),
        ]))?);

        Ok(PreparedBallot {
            ballot_id: ballot.id,
            verification_card_id: ballot.verification_card_id.clone(),
            ciphertexts,
            confirmation_key,
            bases,
            fingerprint,
            correctness_information: ballot.correctness_information.clone(),
        })
    }

    pub fn selection_count(&self) -> usize {
        self.ciphertexts.len()
    }
}

// Every entry of the map must be well formed, and the ballot's own card must be present
fn confirmation_key(ballot: &Ballot, group: &ZpSubgroup) -> Result<GroupElement, ConversionError> {
    let mut own = None;
    for (card, key) in &ballot.ballot_casting_keys {
        let card = VerificationCardId::from_str(card)?;
        let key = HexInteger::parse(key, "ballot casting key")?;
        let key = group
            .element(key.0)
            .map_err(|source| ConversionError::InvalidElement {
                field: "ballot casting key",
                source,
            })?;
        if card == ballot.verification_card_id {
            own = Some(key);
        }
    }
    own.ok_or_else(|| ConversionError::MissingBallotCastingKey(ballot.verification_card_id.clone()))
}
