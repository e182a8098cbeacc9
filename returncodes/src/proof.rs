//! Non-interactive zero-knowledge proofs of knowledge for linear relations over the group.
//!
//! A `Statement` is a group homomorphism phi: Z_q^k -> G^m, given as a list of
//! (witness index, base) pairs per output, together with the claimed images y = phi(x).
//! The prover shows knowledge of x with a Sigma protocol made non-interactive with
//! Fiat-Shamir:
//!
//!  - commitment  t = phi(a) for random a
//!  - challenge   c = H(context, group, statement, t, auxiliary) mod q
//!  - responses   z = a + c * x
//!
//! and the verifier checks phi(z) = t * y^c.

use crate::*;
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The shape of a statement, included in the challenge hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// y = g^x
    Schnorr,

    /// y_i = b_i^x for every i, with one shared x
    Exponentiation,

    /// Several exponentiation statements, each with its own secret
    MultiExponentiation,

    /// Two single-message ciphertexts under different keys hold the same plaintext
    PlaintextEquality,
}

impl StatementKind {
    fn label(&self) -> &'static str {
        match self {
            StatementKind::Schnorr => "schnorr",
            StatementKind::Exponentiation => "exponentiation",
            StatementKind::MultiExponentiation => "multi-exponentiation",
            StatementKind::PlaintextEquality => "plaintext-equality",
        }
    }
}

/// A public statement: the linear map and its claimed images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    kind: StatementKind,
    witness_size: usize,
    phi: Vec<Vec<(usize, GroupElement)>>,
    images: Vec<GroupElement>,
}

impl Statement {
    /// Knowledge of x such that y = g^x
    pub fn schnorr(generator: GroupElement, image: GroupElement) -> Self {
        Statement {
            kind: StatementKind::Schnorr,
            witness_size: 1,
            phi: vec![vec![(0, generator)]],
            images: vec![image],
        }
    }

    /// Knowledge of a single x such that exponentiated_i = bases_i^x for all i
    pub fn exponentiation(
        bases: Vec<GroupElement>,
        exponentiated: Vec<GroupElement>,
    ) -> Result<Self, ProofError> {
        if bases.is_empty() {
            return Err(ProofError::InvalidStatement("no bases"));
        }
        if bases.len() != exponentiated.len() {
            return Err(ProofError::InvalidStatement(
                "bases and exponentiated elements differ in length",
            ));
        }

        Ok(Statement {
            kind: StatementKind::Exponentiation,
            witness_size: 1,
            phi: bases.into_iter().map(|b| vec![(0, b)]).collect(),
            images: exponentiated,
        })
    }

    /// Knowledge of x_1..x_k such that, for every relation j, each exponentiated element is
    /// the matching base raised to x_j
    pub fn multi_exponentiation(
        relations: Vec<(Vec<GroupElement>, Vec<GroupElement>)>,
    ) -> Result<Self, ProofError> {
        if relations.is_empty() {
            return Err(ProofError::InvalidStatement("no relations"));
        }

        let witness_size = relations.len();
        let mut phi = Vec::new();
        let mut images = Vec::new();
        for (index, (bases, exponentiated)) in relations.into_iter().enumerate() {
            if bases.is_empty() {
                return Err(ProofError::InvalidStatement("no bases"));
            }
            if bases.len() != exponentiated.len() {
                return Err(ProofError::InvalidStatement(
                    "bases and exponentiated elements differ in length",
                ));
            }
            phi.extend(bases.into_iter().map(|b| vec![(index, b)]));
            images.extend(exponentiated);
        }

        Ok(Statement {
            kind: StatementKind::MultiExponentiation,
            witness_size,
            phi,
            images,
        })
    }

    /// Knowledge of (r1, r2) such that c1 = (g^r1, m * pk1^r1) and c2 = (g^r2, m * pk2^r2)
    ///
    /// Expressed as phi(r1, r2) = (g^r1, g^r2, pk1^r1 * pk2^-r2) with images
    /// (gamma1, gamma2, phi1 / phi2).
    pub fn plaintext_equality(
        group: &ZpSubgroup,
        c1: &Ciphertext,
        pk1: &GroupElement,
        c2: &Ciphertext,
        pk2: &GroupElement,
    ) -> Result<Self, ProofError> {
        if c1.len() != 1 || c2.len() != 1 {
            return Err(ProofError::InvalidStatement(
                "plaintext equality needs single-message ciphertexts",
            ));
        }

        let g = group.generator();
        let pk2_inverse = group.inverse(pk2)?;
        let phi_quotient = group.multiply(&c1.phis()[0], &group.inverse(&c2.phis()[0])?)?;

        Ok(Statement {
            kind: StatementKind::PlaintextEquality,
            witness_size: 2,
            phi: vec![
                vec![(0, g)],
                vec![(1, g)],
                vec![(0, *pk1), (1, pk2_inverse)],
            ],
            images: vec![*c1.gamma(), *c2.gamma(), phi_quotient],
        })
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn images(&self) -> &[GroupElement] {
        &self.images
    }

    pub fn witness_size(&self) -> usize {
        self.witness_size
    }

    fn evaluate(&self, group: &ZpSubgroup, exponents: &[Exponent]) -> Result<Vec<GroupElement>, GroupError> {
        self.phi
            .iter()
            .map(|row| {
                row.iter().try_fold(group.identity(), |acc, (index, base)| {
                    let term = group.pow(base, &exponents[*index])?;
                    group.multiply(&acc, &term)
                })
            })
            .collect()
    }

    fn to_hashable(&self) -> Hashable {
        let phi = self
            .phi
            .iter()
            .map(|row| {
                Hashable::List(
                    row.iter()
                        .map(|(index, base)| {
                            Hashable::List(vec![
                                Hashable::Integer(BigInt::from_u64(*index as u64)),
                                Hashable::from(base),
                            ])
                        })
                        .collect(),
                )
            })
            .collect();

        Hashable::List(vec![
            Hashable::from(self.kind.label()),
            Hashable::List(phi),
            Hashable::elements(&self.images),
        ])
    }
}

/// The prover's secret exponents, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Witness {
    exponents: Vec<Exponent>,
}

impl Witness {
    pub fn new(exponents: Vec<Exponent>) -> Self {
        Witness { exponents }
    }

    pub fn from_private(private: &PrivateExponent) -> Self {
        Witness {
            exponents: vec![private.exponent().clone()],
        }
    }

    pub fn from_private_keys(keys: &[&PrivateExponent]) -> Self {
        Witness {
            exponents: keys.iter().map(|k| k.exponent().clone()).collect(),
        }
    }

    pub fn from_randomness(randomness: &[&EncryptionRandomness]) -> Self {
        Witness {
            exponents: randomness.iter().map(|r| r.exponent().clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Witness(<{} redacted>)", self.exponents.len())
    }
}

/// A non-interactive proof (commitment, challenge, responses), stamped with the hash context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub context: String,
    pub commitment: Vec<GroupElement>,
    pub challenge: Exponent,
    pub responses: Vec<Exponent>,
}

/// Proves and verifies statements under one group and hash policy
#[derive(Debug, Clone)]
pub struct ProofEngine {
    group: ZpSubgroup,
    hasher: HashBuilder,
}

impl ProofEngine {
    pub fn new(group: ZpSubgroup, policy: HashPolicy) -> Self {
        ProofEngine {
            group,
            hasher: HashBuilder::new(policy),
        }
    }

    pub fn group(&self) -> &ZpSubgroup {
        &self.group
    }

    pub fn hasher(&self) -> &HashBuilder {
        &self.hasher
    }

    /// The context identifier stamped into every proof, `ALGORITHM/provider/CHARSET`
    pub fn context(&self) -> String {
        self.hasher.policy().identifier()
    }

    pub fn prove<R: RngCore + CryptoRng>(
        &self,
        statement: &Statement,
        witness: &Witness,
        auxiliary: &[Hashable],
        rng: &mut R,
    ) -> Result<Proof, ProofError> {
        if witness.len() != statement.witness_size {
            return Err(ProofError::WitnessArity {
                expected: statement.witness_size,
                found: witness.len(),
            });
        }
        if statement.evaluate(&self.group, &witness.exponents)? != statement.images {
            return Err(ProofError::WitnessMismatch);
        }

        let nonces = Witness::new(
            (0..statement.witness_size)
                .map(|_| self.group.random_exponent(rng))
                .collect(),
        );
        let commitment = statement.evaluate(&self.group, &nonces.exponents)?;
        let context = self.context();
        let challenge = self.challenge(&context, statement, &commitment, auxiliary)?;

        let responses = nonces
            .exponents
            .iter()
            .zip(witness.exponents.iter())
            .map(|(a, x)| {
                let cx = self.group.multiply_exponents(&challenge, x);
                self.group.add_exponents(a, &cx)
            })
            .collect();

        Ok(Proof {
            context,
            commitment,
            challenge,
            responses,
        })
    }

    /// Check a proof against a statement
    ///
    /// Returns `Ok(false)` when the proof does not verify. Structural problems with the proof
    /// and a proof made under a different hash context are errors.
    pub fn verify(
        &self,
        statement: &Statement,
        proof: &Proof,
        auxiliary: &[Hashable],
    ) -> Result<bool, ProofError> {
        let context = self.context();
        if proof.context != context {
            return Err(ProofError::ContextMismatch {
                expected: context,
                found: proof.context.clone(),
            });
        }
        if proof.responses.len() != statement.witness_size {
            return Err(ProofError::MalformedProof {
                part: "responses",
                expected: statement.witness_size,
                found: proof.responses.len(),
            });
        }
        if proof.commitment.len() != statement.images.len() {
            return Err(ProofError::MalformedProof {
                part: "commitment elements",
                expected: statement.images.len(),
                found: proof.commitment.len(),
            });
        }

        let challenge = self.challenge(&context, statement, &proof.commitment, auxiliary)?;
        if challenge != proof.challenge {
            return Ok(false);
        }

        let lhs = statement.evaluate(&self.group, &proof.responses)?;
        for ((lhs, t), y) in lhs
            .iter()
            .zip(proof.commitment.iter())
            .zip(statement.images.iter())
        {
            let rhs = self
                .group
                .multiply(t, &self.group.pow(y, &proof.challenge)?)?;
            if *lhs != rhs {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn challenge(
        &self,
        context: &str,
        statement: &Statement,
        commitment: &[GroupElement],
        auxiliary: &[Hashable],
    ) -> Result<Exponent, ProofError> {
        let group = self.group.parameters();
        let input = Hashable::List(vec![
            Hashable::from(context),
            Hashable::List(vec![
                Hashable::Integer(group.p.0),
                Hashable::Integer(group.q.0),
                Hashable::Integer(group.g.0),
            ]),
            statement.to_hashable(),
            Hashable::elements(commitment),
            Hashable::List(auxiliary.to_vec()),
        ]);
        let digest = self.hasher.recursive_hash(&input)?;
        Ok(self.group.exponent_from_digest(&digest))
    }
}
