use crate::*;
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;
use zeroize::Zeroize;

/// One custodian's share of a control-component private key
///
/// Shamir share f(index) of a degree t-1 polynomial over Z_q whose constant term is the key.
/// `commitments` are the Feldman commitments g^{a_k} to the polynomial coefficients; they are
/// public and identical for every share of one split, and commitments[0] is the public key.
#[derive(PartialEq, Eq)]
pub struct KeyShare {
    pub index: u32,
    value: PrivateExponent,
    pub threshold: usize,
    pub total: usize,
    pub commitments: Vec<GroupElement>,
}

impl KeyShare {
    pub(crate) fn from_parts(
        index: u32,
        value: PrivateExponent,
        threshold: usize,
        total: usize,
        commitments: Vec<GroupElement>,
    ) -> Self {
        KeyShare {
            index,
            value,
            threshold,
            total,
            commitments,
        }
    }

    pub fn value(&self) -> &PrivateExponent {
        &self.value
    }

    /// The public key g^secret committed to by this split
    pub fn public_key(&self) -> Option<&GroupElement> {
        self.commitments.first()
    }

    fn same_split(&self, other: &KeyShare) -> bool {
        self.threshold == other.threshold
            && self.total == other.total
            && self.commitments == other.commitments
    }
}

// Cloning a share copies its secret value
impl Clone for KeyShare {
    fn clone(&self) -> Self {
        KeyShare {
            index: self.index,
            value: self.value.duplicate(),
            threshold: self.threshold,
            total: self.total,
            commitments: self.commitments.clone(),
        }
    }
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("index", &self.index)
            .field("value", &"<redacted>")
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .finish()
    }
}

/// A private key rebuilt from shares
///
/// Zeroized when dropped. It cannot be cloned or sent to another thread: it lives only inside
/// the ceremony session that rebuilt it.
pub struct ReconstructedKey {
    key: PrivateExponent,
    _session: PhantomData<*const ()>,
}

impl ReconstructedKey {
    pub fn expose(&self) -> &PrivateExponent {
        &self.key
    }
}

impl fmt::Debug for ReconstructedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReconstructedKey(<redacted>)")
    }
}

/// Threshold sharing of private exponents
#[derive(Debug, Clone)]
pub struct KeyShareManager {
    group: ZpSubgroup,
}

impl KeyShareManager {
    pub fn new(group: ZpSubgroup) -> Self {
        KeyShareManager { group }
    }

    /// Split `secret` into `config.total` shares, any `config.threshold` of which rebuild it
    pub fn split<R: RngCore + CryptoRng>(
        &self,
        secret: &PrivateExponent,
        config: ThresholdConfig,
        rng: &mut R,
    ) -> Result<Vec<KeyShare>, ShareError> {
        config.validate()?;

        let mut coefficients = Vec::with_capacity(config.threshold);
        coefficients.push(secret.exponent().clone());
        for _ in 1..config.threshold {
            coefficients.push(self.group.random_exponent(rng));
        }

        let commitments: Vec<GroupElement> = coefficients
            .iter()
            .map(|a| self.group.pow_generator(a))
            .collect();

        let shares = (1..=config.total as u32)
            .map(|index| KeyShare {
                index,
                value: PrivateExponent::new(self.evaluate(&coefficients, index)),
                threshold: config.threshold,
                total: config.total,
                commitments: commitments.clone(),
            })
            .collect();

        coefficients.zeroize();

        debug!(
            threshold = config.threshold,
            total = config.total,
            "split private key into shares"
        );

        Ok(shares)
    }

    // Horner evaluation of the polynomial at x = index
    fn evaluate(&self, coefficients: &[Exponent], index: u32) -> Exponent {
        let x = self.group.exponent_from_u64(index as u64);
        let mut acc = self.group.exponent_from_u64(0);
        for a in coefficients.iter().rev() {
            acc = self.group.multiply_exponents(&acc, &x);
            acc = self.group.add_exponents(&acc, a);
        }
        acc
    }

    /// Check a share against its Feldman commitments: g^{s_i} = prod_k C_k^{i^k}
    pub fn verify_share(&self, share: &KeyShare) -> Result<bool, ShareError> {
        if share.commitments.len() != share.threshold {
            return Ok(false);
        }

        let x = self.group.exponent_from_u64(share.index as u64);
        let mut power = self.group.exponent_from_u64(1);
        let mut expected = self.group.identity();
        for commitment in &share.commitments {
            let term = self.group.pow(commitment, &power)?;
            expected = self.group.multiply(&expected, &term)?;
            power = self.group.multiply_exponents(&power, &x);
        }

        Ok(self.group.pow_generator(share.value.exponent()) == expected)
    }

    /// Rebuild the secret from at least `threshold` consistent shares
    ///
    /// Identical duplicates are ignored. A share that fails its commitment check, belongs to a
    /// different split, or repeats an index with a different value is an `InconsistentShare`.
    pub fn reconstruct(&self, shares: &[KeyShare]) -> Result<ReconstructedKey, ShareError> {
        let reference = shares.first().ok_or(ShareError::InsufficientShares {
            needed: 1,
            found: 0,
        })?;

        let mut distinct: Vec<&KeyShare> = Vec::with_capacity(shares.len());
        for share in shares {
            if !share.same_split(reference)
                || share.index == 0
                || share.index as usize > share.total
                || !self.verify_share(share)?
            {
                return Err(ShareError::InconsistentShare { index: share.index });
            }

            match distinct.iter().find(|s| s.index == share.index) {
                Some(seen) if seen.value == share.value => continue,
                Some(_) => return Err(ShareError::InconsistentShare { index: share.index }),
                None => distinct.push(share),
            }
        }

        if distinct.len() < reference.threshold {
            return Err(ShareError::InsufficientShares {
                needed: reference.threshold,
                found: distinct.len(),
            });
        }

        let chosen = &distinct[..reference.threshold];
        let mut secret = self.group.exponent_from_u64(0);
        for share in chosen {
            let lambda = self.lagrange_at_zero(share.index, chosen)?;
            let term = self
                .group
                .multiply_exponents(&lambda, share.value.exponent());
            secret = self.group.add_exponents(&secret, &term);
        }

        let key = ReconstructedKey {
            key: PrivateExponent::new(secret),
            _session: PhantomData,
        };

        if Some(&self.group.pow_generator(key.key.exponent())) != reference.public_key() {
            return Err(ShareError::PublicKeyMismatch);
        }

        debug!(shares = chosen.len(), "reconstructed private key");
        Ok(key)
    }

    // lambda_i = prod_{j != i} x_j / (x_j - x_i)
    fn lagrange_at_zero(&self, index: u32, shares: &[&KeyShare]) -> Result<Exponent, ShareError> {
        let x_i = self.group.exponent_from_u64(index as u64);
        let mut numerator = self.group.exponent_from_u64(1);
        let mut denominator = self.group.exponent_from_u64(1);
        for other in shares.iter().filter(|s| s.index != index) {
            let x_j = self.group.exponent_from_u64(other.index as u64);
            numerator = self.group.multiply_exponents(&numerator, &x_j);
            denominator = self
                .group
                .multiply_exponents(&denominator, &self.group.subtract_exponents(&x_j, &x_i));
        }
        let inverse = self.group.invert_exponent(&denominator)?;
        Ok(self.group.multiply_exponents(&numerator, &inverse))
    }

    /// Rebuild the key, hand it to `f`, and erase it on every exit path
    pub fn with_reconstructed<T, E, F>(&self, shares: &[KeyShare], f: F) -> Result<T, E>
    where
        E: From<ShareError>,
        F: FnOnce(&PrivateExponent) -> Result<T, E>,
    {
        let key = self.reconstruct(shares)?;
        f(key.expose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fixture(threshold: usize, total: usize) -> (KeyShareManager, PrivateExponent, Vec<KeyShare>) {
        let mut rng = ChaCha20Rng::from_seed([20u8; 32]);
        let manager = KeyShareManager::new(test_group());
        let secret = manager.group.random_private_exponent(&mut rng);
        let shares = manager
            .split(&secret, ThresholdConfig::new(threshold, total).unwrap(), &mut rng)
            .unwrap();
        (manager, secret, shares)
    }

    #[test]
    fn test_any_threshold_subset_reconstructs() {
        let (manager, secret, shares) = fixture(3, 5);
        assert_eq!(shares.len(), 5);

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = vec![shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    let key = manager.reconstruct(&subset).unwrap();
                    assert_eq!(key.expose(), &secret);
                }
            }
        }

        // More than t shares also works
        assert_eq!(manager.reconstruct(&shares).unwrap().expose(), &secret);
    }

    #[test]
    fn test_too_few_shares() {
        let (manager, _, shares) = fixture(3, 5);

        assert_eq!(
            manager.reconstruct(&shares[1..3]).unwrap_err(),
            ShareError::InsufficientShares {
                needed: 3,
                found: 2
            }
        );

        // Duplicates do not count twice
        let repeated = vec![shares[0].clone(), shares[0].clone(), shares[1].clone()];
        assert_eq!(
            manager.reconstruct(&repeated).unwrap_err(),
            ShareError::InsufficientShares {
                needed: 3,
                found: 2
            }
        );

        assert!(matches!(
            manager.reconstruct(&[]),
            Err(ShareError::InsufficientShares { found: 0, .. })
        ));
    }

    #[test]
    fn test_inconsistent_share() {
        let (manager, _, shares) = fixture(2, 3);
        let one = manager.group.exponent_from_u64(1);

        let mut tampered = shares[1].clone();
        tampered.value =
            PrivateExponent::new(manager.group.add_exponents(tampered.value.exponent(), &one));
        assert_eq!(
            manager
                .reconstruct(&[shares[0].clone(), tampered.clone()])
                .unwrap_err(),
            ShareError::InconsistentShare { index: 2 }
        );

        // Same index, different value
        let mut relabeled = shares[2].clone();
        relabeled.index = 2;
        assert_eq!(
            manager
                .reconstruct(&[shares[1].clone(), relabeled])
                .unwrap_err(),
            ShareError::InconsistentShare { index: 2 }
        );

        // Share from a different split
        let mut rng = ChaCha20Rng::from_seed([21u8; 32]);
        let other_secret = manager.group.random_private_exponent(&mut rng);
        let other_split = manager
            .split(&other_secret, ThresholdConfig::new(2, 3).unwrap(), &mut rng)
            .unwrap();
        assert_eq!(
            manager
                .reconstruct(&[shares[0].clone(), other_split[1].clone()])
                .unwrap_err(),
            ShareError::InconsistentShare { index: 2 }
        );
    }

    #[test]
    fn test_with_reconstructed() {
        let (manager, secret, shares) = fixture(2, 3);

        let public = manager
            .with_reconstructed(&shares[..2], |key| {
                Ok::<_, ShareError>(manager.group.pow_generator(key.exponent()))
            })
            .unwrap();
        assert_eq!(public, manager.group.pow_generator(secret.exponent()));

        // Errors from the scope propagate
        let result: Result<(), Error> =
            manager.with_reconstructed(&shares[..2], |_| Err(Error::Config("abort".to_string())));
        assert!(matches!(result, Err(Error::Config(_))));

        let result: Result<(), Error> = manager.with_reconstructed(&shares[..1], |_| Ok(()));
        assert!(matches!(
            result,
            Err(Error::Share(ShareError::InsufficientShares { .. }))
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(ThresholdConfig::new(0, 3).is_err());
        assert!(ThresholdConfig::new(4, 3).is_err());
        assert!(ThresholdConfig::new(1, 1).is_ok());
    }
}
