use crate::*;
use std::fmt;
use zeroize::Zeroizing;

/// The kinds of voter-facing codes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    ShortChoiceCode,
    VoteCastCode,
    BallotCastingKey,
}

impl CodeType {
    pub fn digits(&self) -> usize {
        match self {
            CodeType::ShortChoiceCode => 4,
            CodeType::VoteCastCode => 8,
            CodeType::BallotCastingKey => 9,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CodeType::ShortChoiceCode => "short-choice-code",
            CodeType::VoteCastCode => "vote-cast-code",
            CodeType::BallotCastingKey => "ballot-casting-key",
        }
    }

    fn modulus(&self) -> u128 {
        10u128.pow(self.digits() as u32)
    }
}

/// Codes shown to the voter
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReturnCodes {
    /// One per selection, in ballot order
    pub short_choice_codes: Vec<String>,
    pub vote_cast_code: String,
    pub ballot_casting_key: String,
}

/// Maps a combined group element to a fixed-length decimal code
///
/// code = u128(HKDF(salt = derivation key, ikm = canonical bytes of the element,
/// info = charset-encoded code type label)[..16]) mod 10^digits, left-padded with zeros.
/// The map is a pure function of (key, element, code type) and, being a keyed digest
/// truncated to a few digits, cannot be inverted to recover the element.
pub struct CodeDeriver {
    hasher: HashBuilder,
    key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for CodeDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeDeriver")
            .field("policy", self.hasher.policy())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CodeDeriver {
    pub fn new(policy: HashPolicy, key: &[u8]) -> Self {
        CodeDeriver {
            hasher: HashBuilder::new(policy),
            key: Zeroizing::new(key.to_vec()),
        }
    }

    pub fn derive(
        &self,
        group: &ZpSubgroup,
        element: &GroupElement,
        code_type: CodeType,
    ) -> Result<String, HashError> {
        let info = self.hasher.policy().charset.encode(code_type.label())?;
        let mut out = [0u8; 16];
        self.hasher
            .keyed_digest(&self.key, &group.to_bytes(element), &info, &mut out)?;

        let value = u128::from_be_bytes(out) % code_type.modulus();
        Ok(format!("{:0width$}", value, width = code_type.digits()))
    }

    /// Short choice codes for the selections, vote cast code and ballot casting key for the
    /// confirmation element
    pub fn derive_all(
        &self,
        group: &ZpSubgroup,
        selections: &[GroupElement],
        confirmation: &GroupElement,
    ) -> Result<ReturnCodes, HashError> {
        let short_choice_codes = selections
            .iter()
            .map(|e| self.derive(group, e, CodeType::ShortChoiceCode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReturnCodes {
            short_choice_codes,
            vote_cast_code: self.derive(group, confirmation, CodeType::VoteCastCode)?,
            ballot_casting_key: self.derive(group, confirmation, CodeType::BallotCastingKey)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_code_lengths() {
        let mut rng = ChaCha20Rng::from_seed([80u8; 32]);
        let group = test_group();
        let deriver = CodeDeriver::new(HashPolicy::default(), b"code derivation key");

        // Extremes of the range and a spread of random members
        let mut elements = vec![
            group.identity(),
            group.generator(),
            group.inverse(&group.generator()).unwrap(),
        ];
        for _ in 0..50 {
            elements.push(group.pow_generator(&group.random_exponent(&mut rng)));
        }

        for element in &elements {
            for code_type in &[
                CodeType::ShortChoiceCode,
                CodeType::VoteCastCode,
                CodeType::BallotCastingKey,
            ] {
                let code = deriver.derive(&group, element, *code_type).unwrap();
                assert_eq!(code.len(), code_type.digits());
                assert!(code.bytes().all(|b| b.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn test_derivation_is_pure_and_keyed() {
        let group = test_group();
        let element = group.generator();
        let deriver = CodeDeriver::new(HashPolicy::default(), b"key one");

        let a = deriver.derive(&group, &element, CodeType::VoteCastCode).unwrap();
        let b = deriver.derive(&group, &element, CodeType::VoteCastCode).unwrap();
        assert_eq!(a, b);

        // Another code type with the same element gives an independent code
        let bck = deriver
            .derive(&group, &element, CodeType::BallotCastingKey)
            .unwrap();
        assert_ne!(&bck[..8], a.as_str());

        let other = CodeDeriver::new(HashPolicy::default(), b"key two");
        assert_ne!(
            other.derive(&group, &element, CodeType::VoteCastCode).unwrap(),
            a
        );
    }

    #[test]
    fn test_zero_padding() {
        assert_eq!(format!("{:0width$}", 42u128, width = 4), "0042");
        assert_eq!(CodeType::BallotCastingKey.modulus(), 1_000_000_000);
    }
}
