use crate::*;

/// How many of a ballot's selections belong to one question
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CorrectnessInformation {
    pub correctness_id: String,
    pub number_of_selections: usize,
    pub number_of_voting_options: usize,
}

/// The correctness information must cover exactly the ballot's selections
pub fn validate_correctness_information(
    information: &[CorrectnessInformation],
    selections: usize,
) -> Result<(), ConversionError> {
    if information.is_empty() {
        return Err(ConversionError::MissingCorrectnessInformation);
    }
    let covered: usize = information.iter().map(|c| c.number_of_selections).sum();
    if covered != selections {
        return Err(ConversionError::SelectionCountMismatch {
            expected: covered,
            found: selections,
        });
    }
    Ok(())
}

/// Outcome of checking one component's proof
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub component_id: ComponentId,
    pub verified: bool,
}

/// Everything the voting client receives for one ballot
///
/// Only built when every expected component contributed and every proof verified.
/// The combined group values are not kept: only the derived codes leave the combiner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CombinedCorrectnessInformation {
    pub ballot_fingerprint: BallotFingerprint,
    pub outcomes: Vec<VerificationOutcome>,
    pub correctness_information: Vec<CorrectnessInformation>,
    pub return_codes: ReturnCodes,
}

impl CombinedCorrectnessInformation {
    pub fn new(
        ballot_fingerprint: BallotFingerprint,
        outcomes: Vec<VerificationOutcome>,
        correctness_information: Vec<CorrectnessInformation>,
        return_codes: ReturnCodes,
    ) -> Result<Self, ConversionError> {
        validate_correctness_information(
            &correctness_information,
            return_codes.short_choice_codes.len(),
        )?;

        Ok(CombinedCorrectnessInformation {
            ballot_fingerprint,
            outcomes,
            correctness_information,
            return_codes,
        })
    }

    /// The question a selection (and so its short choice code) belongs to
    pub fn correctness_id_for_selection_index(&self, index: usize) -> Result<&str, ConversionError> {
        let mut end = 0;
        for info in &self.correctness_information {
            end += info.number_of_selections;
            if index < end {
                return Ok(&info.correctness_id);
            }
        }
        Err(ConversionError::SelectionIndexOutOfRange(index))
    }
}

impl WireMessage for CombinedCorrectnessInformation {}
