use crate::*;
use indexmap::IndexMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sending half handed to each control component's worker
///
/// Dropping every sender closes the channel, which ends collection early.
#[derive(Debug, Clone)]
pub struct ContributionSender {
    sender: Sender<PartialContribution>,
}

impl ContributionSender {
    pub fn send(
        &self,
        contribution: PartialContribution,
    ) -> Result<(), SendError<PartialContribution>> {
        self.sender.send(contribution)
    }
}

/// Gathers the contributions for one ballot as they arrive, in any order
///
/// Returns only a complete set: one contribution per expected component.
#[derive(Debug)]
pub struct ContributionCollector {
    fingerprint: BallotFingerprint,
    expected: Vec<ComponentId>,
    receiver: Receiver<PartialContribution>,
}

impl ContributionCollector {
    pub fn channel(
        fingerprint: BallotFingerprint,
        expected: Vec<ComponentId>,
    ) -> (ContributionSender, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            ContributionSender { sender },
            ContributionCollector {
                fingerprint,
                expected,
                receiver,
            },
        )
    }

    /// Wait until every expected component has contributed, or fail once `timeout` elapses or
    /// every sender is gone
    pub fn collect(self, timeout: Duration) -> Result<Vec<PartialContribution>, CombinationError> {
        if self.expected.is_empty() {
            return Err(CombinationError::NoExpectedComponents(self.fingerprint));
        }

        let deadline = Instant::now() + timeout;
        let mut received: IndexMap<ComponentId, PartialContribution> = IndexMap::new();

        while received.len() < self.expected.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let contribution = match self.receiver.recv_timeout(remaining) {
                Ok(contribution) => contribution,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(fingerprint = %self.fingerprint, "timed out waiting for contributions");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(fingerprint = %self.fingerprint, "all contribution senders closed");
                    break;
                }
            };

            let component_id = contribution.component_id;
            if !self.expected.contains(&component_id)
                || contribution.ballot_fingerprint != self.fingerprint
            {
                warn!(%component_id, fingerprint = %self.fingerprint, "discarding stray contribution");
                continue;
            }

            match received.get(&component_id) {
                Some(existing) if *existing == contribution => continue,
                Some(_) => {
                    return Err(CombinationError::ConflictingContribution {
                        component_id,
                        fingerprint: self.fingerprint,
                    })
                }
                None => {
                    received.insert(component_id, contribution);
                }
            }
        }

        let missing: Vec<ComponentId> = self
            .expected
            .iter()
            .filter(|id| !received.contains_key(*id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(CombinationError::MissingContribution {
                component_ids: missing,
                fingerprint: self.fingerprint,
            });
        }

        let mut contributions = Vec::with_capacity(self.expected.len());
        for id in &self.expected {
            if let Some(contribution) = received.swap_remove(id) {
                contributions.push(contribution);
            }
        }
        Ok(contributions)
    }
}
