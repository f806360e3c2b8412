//! Access Guard

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use smallvec::{SmallVec, smallvec};
use tracing::{debug, warn};

use crate::{
    clients::authority::Authority,
    domain::products::{
        errors::ProductsServiceError,
        models::{Product, UserId},
        permissions::{Action, Permission},
    },
};

/// Permissions of which any one grants access.
pub type Permissions = SmallVec<[Permission; 4]>;

/// Decides whether a caller may perform an action, failing closed.
#[derive(Clone)]
pub struct AccessGuard {
    authority: Arc<dyn Authority>,
}

impl Debug for AccessGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AccessGuard").finish_non_exhaustive()
    }
}

impl AccessGuard {
    #[must_use]
    pub fn new(authority: Arc<dyn Authority>) -> Self {
        Self { authority }
    }

    /// Permissions that grant `action` on `resource`, excluding `FULL_ACCESS`.
    ///
    /// Ownership is only consulted when a resource is given. Without one,
    /// update and delete require the cross-owner permission.
    pub fn required_permissions(
        caller: &UserId,
        action: Action,
        resource: Option<&Product>,
    ) -> Permissions {
        let mut permissions: Permissions = smallvec![Permission::ALL];

        match (action, resource) {
            (Action::Create, _) => permissions.push(Permission::CREATE),
            (Action::Read, None) => permissions.push(Permission::READ),
            (Action::Read, Some(product)) if product.is_deleted() => {
                permissions.push(Permission::READ_DELETED);
            }
            (Action::Read, Some(product)) if product.is_owned_by(caller) => {
                permissions.push(Permission::READ);
            }
            (Action::Read, Some(_)) => {
                permissions.extend([Permission::READ, Permission::READ_OTHER]);
            }
            (Action::Update, Some(product)) if product.is_owned_by(caller) => {
                permissions.push(Permission::UPDATE);
            }
            (Action::Delete, Some(product)) if product.is_owned_by(caller) => {
                permissions.push(Permission::DELETE);
            }
            (Action::Update | Action::Delete, _) => permissions.push(Permission::MODIFY_OTHER),
        }

        permissions
    }

    /// Check that `caller` may perform `action` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductsServiceError::Unauthorized`] when access is denied or
    /// the Authority cannot be reached.
    pub async fn check(
        &self,
        caller: &UserId,
        action: Action,
        resource: Option<&Product>,
    ) -> Result<(), ProductsServiceError> {
        self.check_any(caller, Self::required_permissions(caller, action, resource))
            .await
    }

    /// Check that `caller` holds any of `permissions` or `FULL_ACCESS`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductsServiceError::Unauthorized`] when access is denied or
    /// the Authority cannot be reached.
    pub async fn check_any(
        &self,
        caller: &UserId,
        mut permissions: Permissions,
    ) -> Result<(), ProductsServiceError> {
        permissions.push(Permission::FULL_ACCESS);

        match self.authority.has_access(caller, &permissions).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(%caller, ?permissions, "access denied");

                Err(ProductsServiceError::Unauthorized)
            }
            Err(error) => {
                warn!(%caller, "authority check failed, denying access: {error}");

                Err(ProductsServiceError::Unauthorized)
            }
        }
    }
}
