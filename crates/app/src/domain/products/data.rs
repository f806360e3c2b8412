//! Products Data

use crate::domain::products::models::{ObjectId, Product, ProductUuid, UserId};

/// New Product Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    /// Generated when omitted.
    pub uuid: Option<ProductUuid>,
    pub name: String,
    pub description: String,
    pub price: u64,
    pub thumbnail: ObjectId,
}

impl NewProduct {
    /// Bind the product to its owner. The owner never changes afterwards.
    #[must_use]
    pub fn into_record(self, owner: UserId) -> NewProductRecord {
        NewProductRecord {
            uuid: self.uuid.unwrap_or_default(),
            name: self.name,
            description: self.description,
            price: self.price,
            thumbnail: self.thumbnail,
            owner,
        }
    }
}

/// Product Update Data
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub price: u64,
    pub thumbnail: ObjectId,
}

impl ProductUpdate {
    /// Overwrite the mutable fields of `product`; identity and ownership are kept.
    #[must_use]
    pub fn apply(self, product: Product) -> Product {
        Product {
            name: self.name,
            description: self.description,
            price: self.price,
            thumbnail: self.thumbnail,
            ..product
        }
    }
}

/// Row to insert into the relational store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub description: String,
    pub price: u64,
    pub thumbnail: ObjectId,
    pub owner: UserId,
}
