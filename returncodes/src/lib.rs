#[macro_use]
extern crate serde;

mod ballot;
mod codes;
mod collector;
mod combiner;
mod config;
mod contribution;
mod correctness;
mod elgamal;
mod error;
mod group;
mod hash;
mod keygen;
mod proof;
mod seal;
mod secret_share;
mod serde_hex;
mod wire;

pub use ballot::*;
pub use codes::*;
pub use collector::*;
pub use combiner::*;
pub use config::*;
pub use contribution::*;
pub use correctness::*;
pub use elgamal::*;
pub use error::*;
pub use group::*;
pub use hash::*;
pub use keygen::*;
pub use proof::*;
pub use seal::*;
pub use secret_share::*;
pub use serde_hex::*;
pub use wire::*;

/// Fixed-width unsigned integer backing every group value
pub type BigInt = crypto_bigint::U2048;

pub const LIMBS: usize = BigInt::LIMBS;

#[cfg(test)]
mod tests;

// 128-bit safe-prime group, small enough to keep tests fast
#[cfg(test)]
pub(crate) fn test_group() -> ZpSubgroup {
    let p = HexInteger::parse("a5480dcdc419be4e5518f18e17e93107", "p").unwrap();
    let q = HexInteger::parse("52a406e6e20cdf272a8c78c70bf49883", "q").unwrap();
    ZpSubgroup::new(p.0, q.0, BigInt::from_u8(2)).unwrap()
}

// A ballot with `selections` encrypted selections, one question per selection
#[cfg(test)]
pub(crate) fn test_ballot(
    group: &ZpSubgroup,
    selections: usize,
    rng: &mut rand_chacha::ChaCha20Rng,
) -> Ballot {
    let codec = ElGamalCodec::new(group.clone());
    let (_, public_key) = codec.generate_key_pair(1, rng);

    let ciphertexts: Vec<Ciphertext> = (0..selections)
        .map(|_| {
            let message = group.pow_generator(&group.random_exponent(rng));
            let randomness = EncryptionRandomness::generate(group, rng);
            codec.encrypt(&public_key, &[message], &randomness).unwrap()
        })
        .collect();
    let confirmation_key = group.pow_generator(&group.random_exponent(rng));
    let correctness_information = (0..selections)
        .map(|i| CorrectnessInformation {
            correctness_id: format!("question-{}", i),
            number_of_selections: 1,
            number_of_voting_options: 2,
        })
        .collect();

    Ballot::new(
        VerificationCardId::random(),
        &ciphertexts,
        &confirmation_key,
        correctness_information,
    )
}
