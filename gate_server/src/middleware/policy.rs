use gate_engine::{db_types::SubjectId, AuthorizationError, RoleManagement};
use log::*;

use crate::pipeline::{Gatekeeper, PermissionRequirement};

pub(super) async fn authorize<A: RoleManagement>(
    gatekeeper: &Gatekeeper<A>,
    subject: &SubjectId,
    requirement: &PermissionRequirement,
) -> Result<(), AuthorizationError> {
    let engine = gatekeeper.policy_engine();
    let allowed = match requirement {
        PermissionRequirement::Exact(permission) => engine.authorize(subject, permission).await?,
        PermissionRequirement::Scope(name) => engine.check_subject_has_permission(subject, name).await?,
    };
    if allowed {
        info!(target: "gate::audit", "{subject} was granted {requirement}");
        Ok(())
    } else {
        Err(AuthorizationError::InsufficientPermission(format!("{requirement} is required")))
    }
}
