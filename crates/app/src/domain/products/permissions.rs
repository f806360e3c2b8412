//! Product permissions and actions.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

/// A named capability held by a user, as understood by the Authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Permission(&'static str);

impl Permission {
    /// Satisfies every check.
    pub const FULL_ACCESS: Self = Self("FULL_ACCESS");

    /// Satisfies every product check.
    pub const ALL: Self = Self("PRODUCT_ALL");

    pub const CREATE: Self = Self("PRODUCT_CREATE");

    /// Read any live product by id. Listings made with it alone only cover
    /// the caller's own products.
    pub const READ: Self = Self("PRODUCT_READ");

    /// Read and list live products owned by someone else.
    pub const READ_OTHER: Self = Self("PRODUCT_READ_OTHER");

    /// Read tombstoned products.
    pub const READ_DELETED: Self = Self("PRODUCT_READ_DELETED");

    pub const UPDATE: Self = Self("PRODUCT_UPDATE");

    pub const DELETE: Self = Self("PRODUCT_DELETE");

    /// Update or delete products owned by someone else.
    pub const MODIFY_OTHER: Self = Self("PRODUCT_MODIFY_OTHER");

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.0)
    }
}

/// Operation a caller wants to perform on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}
