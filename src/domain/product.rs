//! Catalog product as seen by the ledger.

use crate::domain::{Money, ProductId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Product lifecycle status. Only active products can be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProductStatus::Draft),
            "active" => Ok(ProductStatus::Active),
            "archived" => Ok(ProductStatus::Archived),
            other => Err(format!("unknown product status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// Unit sale price.
    pub price: Money,
    /// Reference unit cost, used only where no lot allocation exists.
    pub cost_price: Option<Money>,
    pub packaging_cost: Option<Money>,
    pub status: ProductStatus,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// `price - cost - packaging`, when the cost basis is known.
    pub fn unit_margin(&self) -> Option<Money> {
        self.cost_price
            .map(|cost| self.price - cost - self.packaging_cost.unwrap_or_default())
    }
}
