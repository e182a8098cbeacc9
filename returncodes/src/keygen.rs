use crate::*;
use rand_core::{CryptoRng, RngCore};
use tracing::info;

/// Output of the generation step of a key ceremony
///
/// The private key itself is gone by the time this is returned: only the custodians' shares
/// (each to be handed to exactly one custodian) and the public key remain.
#[derive(Debug, Clone)]
pub struct ComponentKeyShares {
    pub component_id: ComponentId,
    pub public_key: GroupElement,
    pub shares: Vec<KeyShare>,
}

/// Key-generation ceremony for control-component keys
///
/// 1. `generate` a component key pair and split the private key among custodians.
/// 2. Later, `export_sealed` rebuilds the key from a quorum of shares inside a scope, checks it
///    against the published public key and exports it sealed for the component to load.
#[derive(Debug, Clone)]
pub struct KeyCeremony {
    group: ZpSubgroup,
    manager: KeyShareManager,
    config: ThresholdConfig,
}

impl KeyCeremony {
    pub fn new(group: ZpSubgroup, config: ThresholdConfig) -> Result<Self, ShareError> {
        config.validate()?;
        Ok(KeyCeremony {
            manager: KeyShareManager::new(group.clone()),
            group,
            config,
        })
    }

    pub fn generate<R: RngCore + CryptoRng>(
        &self,
        component_id: ComponentId,
        rng: &mut R,
    ) -> Result<ComponentKeyShares, ShareError> {
        let private_key = self.group.random_private_exponent(rng);
        let public_key = self.group.pow_generator(private_key.exponent());
        let shares = self.manager.split(&private_key, self.config, rng)?;

        info!(
            %component_id,
            threshold = self.config.threshold,
            total = self.config.total,
            "generated control component key"
        );

        Ok(ComponentKeyShares {
            component_id,
            public_key,
            shares,
        })
    }

    /// Rebuild a component key from custodian shares and export it sealed
    pub fn export_sealed<R: RngCore + CryptoRng>(
        &self,
        component_id: ComponentId,
        public_key: &GroupElement,
        shares: &[KeyShare],
        sealing_secret: &[u8],
        rng: &mut R,
    ) -> Result<SealedKey, Error> {
        let sealed = self.manager.with_reconstructed(shares, |key| {
            if self.group.pow_generator(key.exponent()) != *public_key {
                return Err(Error::Share(ShareError::PublicKeyMismatch));
            }
            Ok(SealedKey::seal(&self.group, key, sealing_secret, rng)?)
        })?;

        info!(%component_id, shares = shares.len(), "key ceremony completed");
        Ok(sealed)
    }
}
