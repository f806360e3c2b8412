//! Product Models

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity used when a request carries no caller.
pub const GUEST_USER_ID: &str = "GUEST";

/// Product UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductUuid(Uuid);

impl ProductUuid {
    /// Generate a new time-ordered product UUID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ProductUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ProductUuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for ProductUuid {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

impl From<Uuid> for ProductUuid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// User identity as issued by the Authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a caller identity; blank identities become the guest user.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();

        if id.trim().is_empty() {
            return Self::guest();
        }

        Self(id)
    }

    #[must_use]
    pub fn guest() -> Self {
        Self(GUEST_USER_ID.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Reference to an object held by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Per-request caller information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub caller: UserId,
}

impl RequestContext {
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: UserId::new(caller),
        }
    }
}

/// Product Model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub uuid: ProductUuid,
    pub name: String,
    pub description: String,
    /// Price in minor currency units.
    pub price: u64,
    pub thumbnail: ObjectId,
    pub owner: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Product {
    /// Whether the product carries a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner == *user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_id_becomes_guest() {
        assert_eq!(UserId::new("  ").as_str(), GUEST_USER_ID);
        assert_eq!(UserId::new("").as_str(), GUEST_USER_ID);
        assert_eq!(UserId::new("user-1").as_str(), "user-1");
    }

    #[test]
    fn product_uuid_parses_from_string() {
        let uuid = ProductUuid::new();

        let parsed: Result<ProductUuid, _> = uuid.to_string().parse();

        assert_eq!(parsed.ok(), Some(uuid));
        assert!("not-a-uuid".parse::<ProductUuid>().is_err());
    }
}
