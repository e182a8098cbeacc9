use crate::*;
use hkdf::Hkdf;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::fmt;
use tracing::debug;

/// Identifier of a control component
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-voter public keys of one control component, g^k_id and g^k_id'
///
/// `choice` belongs to the key that exponentiates the selection bases, `vote_cast` to the
/// key that exponentiates the confirmation base. Both are published at setup so the combiner
/// can check them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoterPublicKeys {
    pub choice: GroupElement,
    pub vote_cast: GroupElement,
}

/// One control component's share of the return-code computation for one ballot
///
/// `partial_results[i] = bases[i]^k_id` for every selection base and
/// `bases[m]^k_id'` for the confirmation base, in the order of `PreparedBallot::bases`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialContribution {
    pub component_id: ComponentId,
    pub ballot_fingerprint: BallotFingerprint,
    pub voter_public_keys: VoterPublicKeys,
    pub partial_results: Vec<GroupElement>,
    pub proof: Proof,
}

impl PartialContribution {
    /// The statement this contribution's proof is about: one secret over
    /// `[g, selection bases..] -> [choice key, results..]` and another over
    /// `[g, confirmation base] -> [vote cast key, result]`
    pub fn statement(
        &self,
        group: &ZpSubgroup,
        prepared: &PreparedBallot,
    ) -> Result<Statement, ProofError> {
        if self.partial_results.len() != prepared.bases.len() {
            return Err(ProofError::MalformedProof {
                part: "partial results",
                expected: prepared.bases.len(),
                found: self.partial_results.len(),
            });
        }
        contribution_statement(
            group,
            prepared,
            &self.voter_public_keys,
            &self.partial_results,
        )
    }
}

fn contribution_statement(
    group: &ZpSubgroup,
    prepared: &PreparedBallot,
    keys: &VoterPublicKeys,
    partial_results: &[GroupElement],
) -> Result<Statement, ProofError> {
    let (confirmation_base, selection_bases) = prepared
        .bases
        .split_last()
        .ok_or(ProofError::InvalidStatement("ballot has no confirmation base"))?;
    let (confirmation_result, selection_results) = partial_results
        .split_last()
        .ok_or(ProofError::InvalidStatement("contribution has no results"))?;

    let mut choice_bases = Vec::with_capacity(selection_bases.len() + 1);
    choice_bases.push(group.generator());
    choice_bases.extend_from_slice(selection_bases);
    let mut choice_images = Vec::with_capacity(selection_results.len() + 1);
    choice_images.push(keys.choice);
    choice_images.extend_from_slice(selection_results);

    Statement::multi_exponentiation(vec![
        (choice_bases, choice_images),
        (
            vec![group.generator(), *confirmation_base],
            vec![keys.vote_cast, *confirmation_result],
        ),
    ])
}

/// Auxiliary proof input binding a contribution to its ballot and to its component's
/// registered key
pub(crate) fn contribution_auxiliary(
    component_id: ComponentId,
    component_key: &GroupElement,
    fingerprint: &BallotFingerprint,
) -> Vec<Hashable> {
    vec![
        Hashable::from("partial-contribution"),
        Hashable::Integer(BigInt::from_u32(component_id.0)),
        Hashable::from(component_key),
        Hashable::Bytes(fingerprint.as_bytes().to_vec()),
    ]
}

// HKDF info labels of the two per-voter keys
const CHOICE_KEY_LABEL: &[u8] = b"returncodes/voter-choice-key";
const VOTE_CAST_KEY_LABEL: &[u8] = b"returncodes/voter-vote-cast-key";

/// The two secret exponents a component uses for one verification card
struct VoterKeys {
    choice: PrivateExponent,
    vote_cast: PrivateExponent,
}

/// A control component: holds exactly one private key and nothing mutable
///
/// The key is never applied to a ballot directly. Each verification card gets its own pair
/// of exponents derived from it, one for the selections and one for the confirmation.
pub struct ControlComponent {
    id: ComponentId,
    engine: ProofEngine,
    key: PrivateExponent,
    public_key: GroupElement,
}

impl fmt::Debug for ControlComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlComponent")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl ControlComponent {
    pub fn new(id: ComponentId, engine: ProofEngine, key: PrivateExponent) -> Self {
        let public_key = engine.group().pow_generator(key.exponent());
        ControlComponent {
            id,
            engine,
            key,
            public_key,
        }
    }

    /// Load a component from its sealed key
    pub fn from_sealed(
        id: ComponentId,
        engine: ProofEngine,
        sealed: &SealedKey,
        sealing_secret: &[u8],
    ) -> Result<Self, SealError> {
        let key = sealed.unseal(engine.group(), sealing_secret)?;
        Ok(Self::new(id, engine, key))
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn public_key(&self) -> &GroupElement {
        &self.public_key
    }

    /// The public keys matching this component's exponents for one verification card
    pub fn voter_public_keys(
        &self,
        verification_card_id: &VerificationCardId,
    ) -> Result<VoterPublicKeys, HashError> {
        let keys = self.voter_keys(verification_card_id)?;
        Ok(self.public_keys_of(&keys))
    }

    fn public_keys_of(&self, keys: &VoterKeys) -> VoterPublicKeys {
        let group = self.engine.group();
        VoterPublicKeys {
            choice: group.pow_generator(keys.choice.exponent()),
            vote_cast: group.pow_generator(keys.vote_cast.exponent()),
        }
    }

    // k_id = KDF(k, card id), with distinct labels for the choice and vote cast exponents
    fn voter_keys(&self, verification_card_id: &VerificationCardId) -> Result<VoterKeys, HashError> {
        let group = self.engine.group();
        let key_bytes = zeroize::Zeroizing::new(group.exponent_to_bytes(self.key.exponent()));
        let salt = verification_card_id.as_str().as_bytes();

        Ok(VoterKeys {
            choice: group.derive_exponent(self.engine.hasher(), salt, &key_bytes, CHOICE_KEY_LABEL)?,
            vote_cast: group.derive_exponent(
                self.engine.hasher(),
                salt,
                &key_bytes,
                VOTE_CAST_KEY_LABEL,
            )?,
        })
    }

    /// Compute this component's partial contribution for `ballot`
    ///
    /// Deterministic: the proof nonces come from a generator seeded with the private key and
    /// the ballot fingerprint, so the same ballot always yields the same contribution.
    pub fn compute(&self, ballot: &Ballot) -> Result<PartialContribution, ContributionError> {
        let prepared = PreparedBallot::prepare(ballot, self.engine.group(), self.engine.hasher())?;
        self.compute_prepared(&prepared)
    }

    pub fn compute_prepared(
        &self,
        prepared: &PreparedBallot,
    ) -> Result<PartialContribution, ContributionError> {
        let group = self.engine.group();
        let proof_error = |source| ContributionError::Proof {
            component_id: self.id,
            fingerprint: prepared.fingerprint.clone(),
            source,
        };

        let (confirmation_base, selection_bases) = prepared
            .bases
            .split_last()
            .ok_or_else(|| proof_error(ProofError::InvalidStatement("ballot has no confirmation base")))?;

        let keys = self.voter_keys(&prepared.verification_card_id)?;
        let voter_public_keys = self.public_keys_of(&keys);

        let mut partial_results = selection_bases
            .iter()
            .map(|base| group.pow(base, keys.choice.exponent()))
            .collect::<Result<Vec<_>, _>>()?;
        partial_results.push(group.pow(confirmation_base, keys.vote_cast.exponent())?);

        let statement =
            contribution_statement(group, prepared, &voter_public_keys, &partial_results)
                .map_err(proof_error)?;
        let mut rng = self.proof_rng(&prepared.fingerprint)?;
        let proof = self
            .engine
            .prove(
                &statement,
                &Witness::from_private_keys(&[&keys.choice, &keys.vote_cast]),
                &contribution_auxiliary(self.id, &self.public_key, &prepared.fingerprint),
                &mut rng,
            )
            .map_err(proof_error)?;

        debug!(
            component_id = %self.id,
            fingerprint = %prepared.fingerprint,
            "computed partial contribution"
        );

        Ok(PartialContribution {
            component_id: self.id,
            ballot_fingerprint: prepared.fingerprint.clone(),
            voter_public_keys,
            partial_results,
            proof,
        })
    }

    // Generate a proof-nonce generator derived from the private key and the ballot
    fn proof_rng(&self, fingerprint: &BallotFingerprint) -> Result<ChaCha20Rng, HashError> {
        let key_bytes = zeroize::Zeroizing::new(self.engine.group().exponent_to_bytes(self.key.exponent()));
        let h = Hkdf::<Sha256>::new(Some(fingerprint.as_bytes()), &key_bytes);
        let mut seed = [0u8; 32];
        h.expand(b"returncodes/proof-nonce", &mut seed)
            .map_err(|_| HashError::OutputLength(32))?;

        Ok(ChaCha20Rng::from_seed(seed))
    }
}
