use gate_common::Secret;

use crate::{
    db_types::{PartnerCredential, PartnerId},
    errors::StoreError,
};

/// Lookup and rotation of partner signing credentials.
#[allow(async_fn_in_trait)]
pub trait CredentialManagement {
    /// Fetches the credential for the partner, whether active or not. Returns `None` if the partner is unknown.
    async fn fetch_partner_credential(&self, partner: &PartnerId) -> Result<Option<PartnerCredential>, StoreError>;

    /// Returns the partner's current signing key, if the partner exists and its credential is active.
    async fn fetch_partner_signing_key(&self, partner: &PartnerId) -> Result<Option<Secret<String>>, StoreError> {
        let credential = self.fetch_partner_credential(partner).await?;
        Ok(credential.and_then(|c| c.usable_key().map(|k| Secret::new(k.to_string()))))
    }

    /// Replaces the partner's signing key, creating an active credential if none exists. The previous key must stop
    /// validating as soon as this call returns; there is no period where both keys are valid.
    async fn rotate_partner_key(&self, partner: &PartnerId, new_key: Secret<String>) -> Result<(), StoreError>;

    /// Marks the partner's credential as inactive. Returns true if a credential was deactivated.
    async fn deactivate_partner(&self, partner: &PartnerId) -> Result<bool, StoreError>;
}
