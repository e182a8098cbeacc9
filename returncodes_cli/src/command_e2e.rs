use super::command_ceremony::sealed_key_filename;
use super::sealing_secret;
use indexmap::IndexMap;
use rand::rngs::OsRng;
use rayon::prelude::*;
use returncodes::*;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
struct BallotResult {
    ballot_id: Uuid,
    verification_card_id: VerificationCardId,
    result: CombinedCorrectnessInformation,
}

pub fn command_e2e(matches: &clap::ArgMatches, config: &Config) {
    // Unwraps are OK, both args have defaults
    let ballots = parse_count(matches.value_of("ballots").unwrap(), "ballots");
    let selections = parse_count(matches.value_of("selections").unwrap(), "selections");

    let group = config.group().unwrap_or_else(|e| {
        eprintln!("returncodes e2e: invalid group parameters: {}", e);
        std::process::exit(1);
    });
    let engine = ProofEngine::new(group.clone(), config.hash_policy.clone());

    let components: Vec<ControlComponent> = match matches.value_of("keys") {
        Some(dir) => load_components(Path::new(dir), &sealing_secret(matches), &engine, config),
        None => config
            .control_components
            .iter()
            .map(|id| {
                let key = group.random_private_exponent(&mut OsRng);
                ControlComponent::new(*id, engine.clone(), key)
            })
            .collect(),
    };

    let registry: IndexMap<ComponentId, GroupElement> = components
        .iter()
        .map(|c| (c.id(), *c.public_key()))
        .collect();
    let combiner = ReturnCodeCombiner::new(
        engine.clone(),
        CodeDeriver::new(config.hash_policy.clone(), &config.code_derivation_key),
        registry,
    );

    let ballots: Vec<Ballot> = (0..ballots)
        .map(|_| random_ballot(&group, selections))
        .collect();

    let results: Vec<BallotResult> = ballots
        .par_iter()
        .map(|ballot| {
            let result = process_ballot(ballot, &components, &combiner, config)
                .unwrap_or_else(|e| {
                    eprintln!("returncodes e2e: ballot {}: {}", ballot.id, e);
                    std::process::exit(1);
                });
            BallotResult {
                ballot_id: ballot.id,
                verification_card_id: ballot.verification_card_id.clone(),
                result,
            }
        })
        .collect();

    info!(ballots = results.len(), "return codes computed");
    println!("{}", serde_json::to_string_pretty(&results).unwrap());
}

// Fan out one computation per component, fan in through the collector, then combine
fn process_ballot(
    ballot: &Ballot,
    components: &[ControlComponent],
    combiner: &ReturnCodeCombiner,
    config: &Config,
) -> Result<CombinedCorrectnessInformation, Error> {
    let prepared = combiner.prepare(ballot)?;
    let (sender, collector) = ContributionCollector::channel(
        prepared.fingerprint.clone(),
        config.control_components.clone(),
    );

    components
        .par_iter()
        .try_for_each_with(sender, |sender, component| {
            let contribution = component.compute_prepared(&prepared)?;
            // A closed collector has already given up on this ballot
            let _ = sender.send(contribution);
            Ok::<(), ContributionError>(())
        })?;

    let contributions =
        collector.collect(Duration::from_secs(config.contribution_timeout_secs))?;
    Ok(combiner.combine_prepared(&prepared, &contributions, &config.control_components)?)
}

fn load_components(
    dir: &Path,
    secret: &[u8],
    engine: &ProofEngine,
    config: &Config,
) -> Vec<ControlComponent> {
    config
        .control_components
        .iter()
        .map(|id| {
            let location = dir.join(sealed_key_filename(*id));
            let bytes = std::fs::read(&location).unwrap_or_else(|e| {
                eprintln!(
                    "returncodes e2e: unable to read {}: {}",
                    location.display(),
                    e
                );
                std::process::exit(1);
            });
            let sealed: SealedKey = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                eprintln!(
                    "returncodes e2e: unable to parse {}: {}",
                    location.display(),
                    e
                );
                std::process::exit(1);
            });
            ControlComponent::from_sealed(*id, engine.clone(), &sealed, secret).unwrap_or_else(
                |e| {
                    eprintln!("returncodes e2e: component {}: {}", id, e);
                    std::process::exit(1);
                },
            )
        })
        .collect()
}

// Stand-in for the voting client: random selections encrypted under a throwaway key
fn random_ballot(group: &ZpSubgroup, selections: usize) -> Ballot {
    let codec = ElGamalCodec::new(group.clone());
    let (_, public_key) = codec.generate_key_pair(1, &mut OsRng);

    let ciphertexts: Vec<Ciphertext> = (0..selections)
        .map(|_| {
            let message = group.pow_generator(&group.random_exponent(&mut OsRng));
            let randomness = EncryptionRandomness::generate(group, &mut OsRng);
            codec
                .encrypt(&public_key, &[message], &randomness)
                .unwrap_or_else(|e| {
                    eprintln!("returncodes e2e: encryption failed: {}", e);
                    std::process::exit(1);
                })
        })
        .collect();
    let confirmation_key = group.pow_generator(&group.random_exponent(&mut OsRng));
    let correctness_information = vec![CorrectnessInformation {
        correctness_id: "question-1".to_string(),
        number_of_selections: selections,
        number_of_voting_options: selections.max(2),
    }];

    Ballot::new(
        VerificationCardId::random(),
        &ciphertexts,
        &confirmation_key,
        correctness_information,
    )
}

fn parse_count(value: &str, name: &str) -> usize {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("returncodes e2e: {} must be a positive integer", name);
            std::process::exit(1);
        }
    }
}
