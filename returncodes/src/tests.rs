use super::*;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::thread;
use std::time::Duration;

#[test]
fn end_to_end_return_codes() {
    let mut rng = ChaCha20Rng::from_seed([200u8; 32]);
    let group = test_group();
    let config = Config {
        group: GroupParameters {
            p: HexInteger::from(*group.p()),
            q: HexInteger::from(*group.q()),
            g: HexInteger::from(&group.generator()),
        },
        control_components: (1..=4).map(ComponentId).collect(),
        ..Config::default()
    };
    config.validate().unwrap();
    let group = config.group().unwrap();

    // Key ceremony: every component key is split among custodians, then rebuilt by a
    // quorum and sealed for the component that will load it
    let ceremony = KeyCeremony::new(group.clone(), config.key_sharing).unwrap();
    let engine = ProofEngine::new(group.clone(), config.hash_policy.clone());
    let mut registry = IndexMap::new();
    let mut components = Vec::new();
    for id in &config.control_components {
        let sealing_secret = format!("sealing secret {}", id);
        let generated = ceremony.generate(*id, &mut rng).unwrap();
        let quorum = &generated.shares[1..=config.key_sharing.threshold];
        let sealed = ceremony
            .export_sealed(
                *id,
                &generated.public_key,
                quorum,
                sealing_secret.as_bytes(),
                &mut rng,
            )
            .unwrap();

        // Sealed keys travel as JSON
        let sealed: SealedKey =
            serde_json::from_str(&serde_json::to_string(&sealed).unwrap()).unwrap();
        let component =
            ControlComponent::from_sealed(*id, engine.clone(), &sealed, sealing_secret.as_bytes())
                .unwrap();
        assert_eq!(*component.public_key(), generated.public_key);

        registry.insert(*id, generated.public_key);
        components.push(component);
    }

    let combiner = ReturnCodeCombiner::new(
        engine.clone(),
        CodeDeriver::new(config.hash_policy.clone(), &config.code_derivation_key),
        registry,
    );

    // The ballot arrives over the wire in CBOR
    let ballot = test_ballot(&group, 3, &mut rng);
    let ballot = Ballot::from_bytes(&ballot.to_bytes().unwrap()).unwrap();
    let prepared = combiner.prepare(&ballot).unwrap();

    let (sender, collector) = ContributionCollector::channel(
        prepared.fingerprint.clone(),
        config.control_components.clone(),
    );
    let handles: Vec<_> = components
        .into_iter()
        .map(|component| {
            let sender = sender.clone();
            let ballot = ballot.clone();
            let group = group.clone();
            thread::spawn(move || {
                // Contributions travel as wire messages as well
                let contribution = component.compute(&ballot).unwrap();
                let message = PartialContributionMessage::from(&contribution)
                    .to_bytes()
                    .unwrap();
                let decoded = PartialContributionMessage::from_bytes(&message).unwrap();
                sender.send(decoded.decode(&group).unwrap()).unwrap();
            })
        })
        .collect();
    drop(sender);

    let contributions = collector
        .collect(Duration::from_secs(config.contribution_timeout_secs))
        .unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let combined = combiner
        .combine_prepared(&prepared, &contributions, &config.control_components)
        .unwrap();

    let codes = &combined.return_codes;
    assert_eq!(codes.short_choice_codes.len(), 3);
    assert!(codes.short_choice_codes.iter().all(|c| c.len() == 4));
    assert_eq!(codes.vote_cast_code.len(), 8);
    assert_eq!(codes.ballot_casting_key.len(), 9);
    assert!(combined.outcomes.iter().all(|o| o.verified));
    assert_eq!(
        combined.correctness_id_for_selection_index(2).unwrap(),
        "question-2"
    );

    // Recombining the same ballot gives the same codes
    let again = combiner
        .combine(&ballot, &contributions, &config.control_components)
        .unwrap();
    assert_eq!(again.return_codes, combined.return_codes);

    let json = combined.to_json().unwrap();
    assert_eq!(
        CombinedCorrectnessInformation::from_bytes(json.as_bytes()).unwrap(),
        combined
    );
}

#[test]
fn quorum_below_threshold_cannot_export() {
    let mut rng = ChaCha20Rng::from_seed([201u8; 32]);
    let group = test_group();
    let ceremony = KeyCeremony::new(group, ThresholdConfig::new(3, 5).unwrap()).unwrap();
    let generated = ceremony.generate(ComponentId(1), &mut rng).unwrap();

    let result = ceremony.export_sealed(
        ComponentId(1),
        &generated.public_key,
        &generated.shares[..2],
        b"secret",
        &mut rng,
    );
    assert!(matches!(
        result,
        Err(Error::Share(ShareError::InsufficientShares {
            needed: 3,
            found: 2
        }))
    ));
}
