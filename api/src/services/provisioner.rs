/// Identity provisioning
///
/// Ensures exactly one profile exists per wallet address. Creation relies on
/// the store's uniqueness constraint: a losing concurrent insert re-reads the
/// winner's row instead of failing.
use std::sync::Arc;
use thiserror::Error;

use crate::repository::{CreateProfileError, NewProfile, Profile, ProfileRepository, StoreError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("identity store unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
    /// Insert hit the unique constraint, yet the row is not readable
    #[error("profile for {wallet_address} collided on insert but cannot be found")]
    DuplicateIdentityRace { wallet_address: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedIdentity {
    pub profile: Profile,
    /// `true` when this call inserted the profile
    pub created: bool,
}

#[derive(Clone)]
pub struct IdentityProvisioner {
    profiles: Arc<dyn ProfileRepository>,
}

impl IdentityProvisioner {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    pub async fn provision(&self, wallet_address: &str) -> Result<ProvisionedIdentity, ProvisionError> {
        if let Some(profile) = self.profiles.find_by_wallet_address(wallet_address).await? {
            return Ok(ProvisionedIdentity {
                profile,
                created: false,
            });
        }

        let new_profile = NewProfile::for_wallet(wallet_address);
        match self.profiles.create(&new_profile).await {
            Ok(profile) => {
                tracing::info!(
                    wallet_address = %wallet_address,
                    identity_id = %profile.id,
                    "Created profile"
                );
                Ok(ProvisionedIdentity {
                    profile,
                    created: true,
                })
            }
            Err(CreateProfileError::Duplicate { .. }) => {
                tracing::info!(
                    wallet_address = %wallet_address,
                    "Concurrent first login created the profile, re-reading"
                );
                match self.profiles.find_by_wallet_address(wallet_address).await? {
                    Some(profile) => Ok(ProvisionedIdentity {
                        profile,
                        created: false,
                    }),
                    None => {
                        tracing::error!(
                            wallet_address = %wallet_address,
                            "Profile missing after unique violation"
                        );
                        Err(ProvisionError::DuplicateIdentityRace {
                            wallet_address: wallet_address.to_string(),
                        })
                    }
                }
            }
            Err(CreateProfileError::Store(e)) => Err(e.into()),
        }
    }
}
