use crate::*;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Merges the partial contributions for one ballot into the voter's return codes
///
/// Holds no mutable state: one combiner may serve any number of ballots concurrently.
#[derive(Debug)]
pub struct ReturnCodeCombiner {
    engine: ProofEngine,
    deriver: CodeDeriver,
    registry: IndexMap<ComponentId, GroupElement>,
    voter_keys: IndexMap<VerificationCardId, IndexMap<ComponentId, VoterPublicKeys>>,
}

impl ReturnCodeCombiner {
    /// `registry` maps every known control component to its public key
    pub fn new(
        engine: ProofEngine,
        deriver: CodeDeriver,
        registry: IndexMap<ComponentId, GroupElement>,
    ) -> Self {
        ReturnCodeCombiner {
            engine,
            deriver,
            registry,
            voter_keys: IndexMap::new(),
        }
    }

    /// Per-voter public keys published at setup, by verification card and component
    ///
    /// A contribution for a listed card must carry exactly the published keys. Contributions
    /// for cards that are not listed are checked against the keys they carry.
    pub fn with_voter_keys(
        mut self,
        voter_keys: IndexMap<VerificationCardId, IndexMap<ComponentId, VoterPublicKeys>>,
    ) -> Self {
        self.voter_keys = voter_keys;
        self
    }

    pub fn engine(&self) -> &ProofEngine {
        &self.engine
    }

    pub fn prepare(&self, ballot: &Ballot) -> Result<PreparedBallot, CombinationError> {
        Ok(PreparedBallot::prepare(
            ballot,
            self.engine.group(),
            self.engine.hasher(),
        )?)
    }

    pub fn combine(
        &self,
        ballot: &Ballot,
        contributions: &[PartialContribution],
        expected: &[ComponentId],
    ) -> Result<CombinedCorrectnessInformation, CombinationError> {
        let prepared = self.prepare(ballot)?;
        self.combine_prepared(&prepared, contributions, expected)
    }

    /// Combine contributions for an already prepared ballot
    ///
    /// An empty `expected` set is refused: there would be nothing to verify.
    ///
    /// 1. Contributions from unexpected components or for another ballot are discarded.
    /// 2. An identical resubmission is ignored; a differing one is a conflict.
    /// 3. Every remaining proof must verify.
    /// 4. Every expected component must be present.
    /// 5. Partial results are multiplied position by position.
    /// 6. Codes are derived from the products.
    pub fn combine_prepared(
        &self,
        prepared: &PreparedBallot,
        contributions: &[PartialContribution],
        expected: &[ComponentId],
    ) -> Result<CombinedCorrectnessInformation, CombinationError> {
        let fingerprint = &prepared.fingerprint;
        if expected.is_empty() {
            return Err(CombinationError::NoExpectedComponents(fingerprint.clone()));
        }

        let mut accepted: IndexMap<ComponentId, &PartialContribution> = IndexMap::new();
        for contribution in contributions {
            let component_id = contribution.component_id;
            if !expected.contains(&component_id) {
                warn!(%component_id, %fingerprint, "discarding contribution from unexpected component");
                continue;
            }
            if contribution.ballot_fingerprint != *fingerprint {
                warn!(%component_id, %fingerprint, "discarding contribution for another ballot");
                continue;
            }

            match accepted.get(&component_id) {
                Some(existing) if *existing == contribution => {
                    debug!(%component_id, %fingerprint, "ignoring duplicate contribution");
                }
                Some(_) => {
                    return Err(CombinationError::ConflictingContribution {
                        component_id,
                        fingerprint: fingerprint.clone(),
                    })
                }
                None => {
                    accepted.insert(component_id, contribution);
                }
            }
        }

        let mut outcomes = Vec::with_capacity(accepted.len());
        for (component_id, contribution) in &accepted {
            self.verify_contribution(prepared, contribution)?;
            outcomes.push(VerificationOutcome {
                component_id: *component_id,
                verified: true,
            });
        }

        let missing: Vec<ComponentId> = expected
            .iter()
            .filter(|id| !accepted.contains_key(*id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(CombinationError::MissingContribution {
                component_ids: missing,
                fingerprint: fingerprint.clone(),
            });
        }

        // Order-independent: multiplication is commutative
        let group = self.engine.group();
        let mut combined = vec![group.identity(); prepared.bases.len()];
        for contribution in accepted.values() {
            for (acc, partial) in combined.iter_mut().zip(contribution.partial_results.iter()) {
                *acc = group.multiply(acc, partial)?;
            }
        }

        let (confirmation, selections) = match combined.split_last() {
            Some(split) => split,
            None => return Err(ConversionError::MissingCorrectnessInformation.into()),
        };
        let return_codes = self.deriver.derive_all(group, selections, confirmation)?;

        let combined = CombinedCorrectnessInformation::new(
            fingerprint.clone(),
            outcomes,
            prepared.correctness_information.clone(),
            return_codes,
        )?;

        info!(
            %fingerprint,
            components = expected.len(),
            "combined partial contributions"
        );
        Ok(combined)
    }

    fn verify_contribution(
        &self,
        prepared: &PreparedBallot,
        contribution: &PartialContribution,
    ) -> Result<(), CombinationError> {
        let component_id = contribution.component_id;
        let fingerprint = &prepared.fingerprint;

        let public_key =
            self.registry
                .get(&component_id)
                .ok_or_else(|| CombinationError::UnregisteredComponent {
                    component_id,
                    fingerprint: fingerprint.clone(),
                })?;

        let published = self
            .voter_keys
            .get(&prepared.verification_card_id)
            .and_then(|keys| keys.get(&component_id));
        if let Some(published) = published {
            if *published != contribution.voter_public_keys {
                warn!(%component_id, %fingerprint, "voter keys differ from the published ones");
                return Err(CombinationError::VoterKeyMismatch {
                    component_id,
                    fingerprint: fingerprint.clone(),
                });
            }
        }

        let classify = |source: ProofError| match source {
            ProofError::ContextMismatch { .. } => CombinationError::ProofConfiguration {
                component_id,
                fingerprint: fingerprint.clone(),
                source,
            },
            _ => CombinationError::MalformedContribution {
                component_id,
                fingerprint: fingerprint.clone(),
                source,
            },
        };

        let statement = contribution
            .statement(self.engine.group(), prepared)
            .map_err(classify)?;
        let auxiliary = contribution_auxiliary(component_id, public_key, fingerprint);
        let verified = self
            .engine
            .verify(&statement, &contribution.proof, &auxiliary)
            .map_err(classify)?;

        if !verified {
            warn!(%component_id, %fingerprint, "partial contribution proof rejected");
            return Err(CombinationError::InvalidProof {
                component_id,
                fingerprint: fingerprint.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct Fixture {
        components: Vec<ControlComponent>,
        combiner: ReturnCodeCombiner,
        ballot: Ballot,
        expected: Vec<ComponentId>,
    }

    fn fixture(seed: u8, count: u32) -> Fixture {
        let mut rng = ChaCha20Rng::from_seed([seed; 32]);
        let engine = ProofEngine::new(test_group(), HashPolicy::default());

        let components: Vec<ControlComponent> = (1..=count)
            .map(|i| {
                let key = engine.group().random_private_exponent(&mut rng);
                ControlComponent::new(ComponentId(i), engine.clone(), key)
            })
            .collect();
        let registry = components
            .iter()
            .map(|c| (c.id(), *c.public_key()))
            .collect();
        let deriver = CodeDeriver::new(HashPolicy::default(), b"code derivation key");
        let ballot = test_ballot(engine.group(), 2, &mut rng);

        Fixture {
            expected: components.iter().map(|c| c.id()).collect(),
            components,
            combiner: ReturnCodeCombiner::new(engine, deriver, registry),
            ballot,
        }
    }

    fn contributions(f: &Fixture) -> Vec<PartialContribution> {
        f.components
            .iter()
            .map(|c| c.compute(&f.ballot).unwrap())
            .collect()
    }

    #[test]
    fn test_combine() {
        let f = fixture(90, 3);
        let combined = f
            .combiner
            .combine(&f.ballot, &contributions(&f), &f.expected)
            .unwrap();

        assert_eq!(combined.outcomes.len(), 3);
        assert!(combined.outcomes.iter().all(|o| o.verified));
        assert_eq!(combined.return_codes.short_choice_codes.len(), 2);
        assert!(combined
            .return_codes
            .short_choice_codes
            .iter()
            .all(|c| c.len() == 4));
        assert_eq!(combined.return_codes.vote_cast_code.len(), 8);
        assert_eq!(combined.return_codes.ballot_casting_key.len(), 9);
    }

    #[test]
    fn test_order_independent() {
        let f = fixture(91, 3);
        let contributions = contributions(&f);
        let reference = f
            .combiner
            .combine(&f.ballot, &contributions, &f.expected)
            .unwrap();

        for order in &[[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            let permuted: Vec<_> = order.iter().map(|i| contributions[*i].clone()).collect();
            let combined = f
                .combiner
                .combine(&f.ballot, &permuted, &f.expected)
                .unwrap();
            assert_eq!(combined.return_codes, reference.return_codes);
        }
    }

    #[test]
    fn test_codes_depend_on_every_key() {
        let f = fixture(92, 3);
        let g = fixture(93, 3);
        let mine = f
            .combiner
            .combine(&f.ballot, &contributions(&f), &f.expected)
            .unwrap();

        // Same ballot, different component keys
        let theirs: Vec<_> = g
            .components
            .iter()
            .map(|c| c.compute(&f.ballot).unwrap())
            .collect();
        let combiner = ReturnCodeCombiner::new(
            ProofEngine::new(test_group(), HashPolicy::default()),
            CodeDeriver::new(HashPolicy::default(), b"code derivation key"),
            g.components
                .iter()
                .map(|c| (c.id(), *c.public_key()))
                .collect(),
        );
        let other = combiner.combine(&f.ballot, &theirs, &g.expected).unwrap();
        assert_ne!(mine.return_codes, other.return_codes);
    }

    #[test]
    fn test_missing_contribution() {
        let f = fixture(94, 3);
        let mut contributions = contributions(&f);
        contributions.pop();

        match f.combiner.combine(&f.ballot, &contributions, &f.expected) {
            Err(CombinationError::MissingContribution { component_ids, .. }) => {
                assert_eq!(component_ids, vec![ComponentId(3)])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tampered_proof() {
        let f = fixture(95, 3);
        let mut contributions = contributions(&f);

        // Component 2 presents component 3's proof
        contributions[1].proof = contributions[2].proof.clone();

        match f.combiner.combine(&f.ballot, &contributions, &f.expected) {
            Err(CombinationError::InvalidProof { component_id, .. }) => {
                assert_eq!(component_id, ComponentId(2))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_tampered_partial_result() {
        let f = fixture(96, 3);
        let mut contributions = contributions(&f);
        let group = f.combiner.engine().group();
        contributions[0].partial_results[1] = group
            .multiply(&contributions[0].partial_results[1], &group.generator())
            .unwrap();

        assert!(matches!(
            f.combiner.combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::InvalidProof {
                component_id: ComponentId(1),
                ..
            })
        ));
    }

    #[test]
    fn test_duplicates() {
        let f = fixture(97, 3);
        let mut contributions = contributions(&f);
        let reference = f
            .combiner
            .combine(&f.ballot, &contributions, &f.expected)
            .unwrap();

        // Identical resubmission is a no-op
        contributions.push(contributions[0].clone());
        assert_eq!(
            f.combiner
                .combine(&f.ballot, &contributions, &f.expected)
                .unwrap(),
            reference
        );

        // Differing resubmission is a conflict
        let mut conflicting = contributions[1].clone();
        conflicting.partial_results.reverse();
        contributions.push(conflicting);
        assert!(matches!(
            f.combiner.combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::ConflictingContribution {
                component_id: ComponentId(2),
                ..
            })
        ));
    }

    #[test]
    fn test_strangers_and_other_ballots_are_discarded() {
        let f = fixture(98, 3);
        let mut contributions = contributions(&f);
        let expected = &f.expected[..2];

        // Component 3 is not expected, so it is dropped rather than failing the ballot
        let combined = f
            .combiner
            .combine(&f.ballot, &contributions, expected)
            .unwrap();
        assert_eq!(combined.outcomes.len(), 2);

        // A contribution for another ballot does not count
        let mut other_ballot = f.ballot.clone();
        other_ballot.id = uuid::Uuid::new_v4();
        contributions[0] = f.components[0].compute(&other_ballot).unwrap();
        assert!(matches!(
            f.combiner.combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::MissingContribution { .. })
        ));
    }

    #[test]
    fn test_misconfigured_verifier() {
        let f = fixture(99, 2);
        let contributions = contributions(&f);
        let registry = f
            .components
            .iter()
            .map(|c| (c.id(), *c.public_key()))
            .collect();

        let policy = HashPolicy::new(HashAlgorithm::Sha512, "rust-crypto", Charset::Utf8);
        let combiner = ReturnCodeCombiner::new(
            ProofEngine::new(test_group(), policy.clone()),
            CodeDeriver::new(policy, b"code derivation key"),
            registry,
        );

        // Fingerprints differ under another hash algorithm, so prepare separately
        // and present the contributions as if they were made for this ballot
        let prepared = combiner.prepare(&f.ballot).unwrap();
        let relabeled: Vec<_> = contributions
            .into_iter()
            .map(|mut c| {
                c.ballot_fingerprint = prepared.fingerprint.clone();
                c
            })
            .collect();

        assert!(matches!(
            combiner.combine_prepared(&prepared, &relabeled, &f.expected),
            Err(CombinationError::ProofConfiguration {
                component_id: ComponentId(1),
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_contribution() {
        let f = fixture(100, 2);
        let mut contributions = contributions(&f);
        contributions[1].partial_results.pop();
        let expected_fingerprint = contributions[1].ballot_fingerprint.clone();

        match f.combiner.combine(&f.ballot, &contributions, &f.expected) {
            Err(CombinationError::MalformedContribution {
                component_id,
                fingerprint,
                source: ProofError::MalformedProof { .. },
            }) => {
                assert_eq!(component_id, ComponentId(2));
                assert!(fingerprint == expected_fingerprint);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unregistered_component() {
        let f = fixture(101, 2);
        let contributions = contributions(&f);
        let mut registry = IndexMap::new();
        registry.insert(ComponentId(1), *f.components[0].public_key());

        let combiner = ReturnCodeCombiner::new(
            ProofEngine::new(test_group(), HashPolicy::default()),
            CodeDeriver::new(HashPolicy::default(), b"code derivation key"),
            registry,
        );
        assert!(matches!(
            combiner.combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::UnregisteredComponent {
                component_id: ComponentId(2),
                ..
            })
        ));
    }

    #[test]
    fn test_nothing_expected_is_refused() {
        let f = fixture(103, 2);
        let contributions = contributions(&f);

        assert!(matches!(
            f.combiner.combine(&f.ballot, &[], &[]),
            Err(CombinationError::NoExpectedComponents(_))
        ));
        assert!(matches!(
            f.combiner.combine(&f.ballot, &contributions, &[]),
            Err(CombinationError::NoExpectedComponents(_))
        ));
    }

    #[test]
    fn test_published_voter_keys() {
        let f = fixture(104, 2);
        let contributions = contributions(&f);
        let card = f.ballot.verification_card_id.clone();
        let published: IndexMap<_, _> = f
            .components
            .iter()
            .map(|c| (c.id(), c.voter_public_keys(&card).unwrap()))
            .collect();

        let registry = || -> IndexMap<ComponentId, GroupElement> {
            f.components
                .iter()
                .map(|c| (c.id(), *c.public_key()))
                .collect()
        };
        let combiner = |keys: IndexMap<VerificationCardId, IndexMap<ComponentId, VoterPublicKeys>>| {
            ReturnCodeCombiner::new(
                ProofEngine::new(test_group(), HashPolicy::default()),
                CodeDeriver::new(HashPolicy::default(), b"code derivation key"),
                registry(),
            )
            .with_voter_keys(keys)
        };

        let mut keys = IndexMap::new();
        keys.insert(card.clone(), published.clone());
        let reference = f
            .combiner
            .combine(&f.ballot, &contributions, &f.expected)
            .unwrap();
        assert_eq!(
            combiner(keys)
                .combine(&f.ballot, &contributions, &f.expected)
                .unwrap(),
            reference
        );

        // A component that proves against keys other than its published ones is refused,
        // even though its proof is internally consistent
        let mut swapped = published;
        let first = swapped[&ComponentId(1)];
        swapped.insert(
            ComponentId(1),
            VoterPublicKeys {
                choice: first.vote_cast,
                vote_cast: first.choice,
            },
        );
        let mut keys = IndexMap::new();
        keys.insert(card, swapped);
        assert!(matches!(
            combiner(keys).combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::VoterKeyMismatch {
                component_id: ComponentId(1),
                ..
            })
        ));
    }

    #[test]
    fn test_forged_voter_keys() {
        let f = fixture(105, 2);
        let mut contributions = contributions(&f);
        let group = f.combiner.engine().group();

        // Claiming another vote cast key breaks the proof
        contributions[1].voter_public_keys.vote_cast = group
            .multiply(&contributions[1].voter_public_keys.vote_cast, &group.generator())
            .unwrap();
        assert!(matches!(
            f.combiner.combine(&f.ballot, &contributions, &f.expected),
            Err(CombinationError::InvalidProof {
                component_id: ComponentId(2),
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_ballot_casting_keys() {
        let f = fixture(102, 2);
        let contributions = contributions(&f);
        let mut ballot = f.ballot.clone();
        ballot
            .ballot_casting_keys
            .insert("ABC".to_string(), "2".to_string());

        assert!(matches!(
            f.combiner.combine(&ballot, &contributions, &f.expected),
            Err(CombinationError::CombinedCorrectnessInformationConversion(
                ConversionError::InvalidVerificationCardId(_)
            ))
        ));
    }
}
