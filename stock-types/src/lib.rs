use derive_more::Display;
use serde::{Deserialize, Serialize};

pub mod product;

pub use product::{Product, ProductId};

/// Stock status of a catalog product. The wire values match the attribute
/// store ("instock"/"outofstock").
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StockStatus {
    #[serde(rename = "instock")]
    #[display("In Stock")]
    InStock,
    #[serde(rename = "outofstock")]
    #[display("Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
        }
    }

    pub fn try_from_str<S: AsRef<str>>(input: S) -> Option<Self> {
        match input.as_ref().trim().to_lowercase().as_str() {
            "instock" => Some(StockStatus::InStock),
            "outofstock" => Some(StockStatus::OutOfStock),
            _ => None,
        }
    }

    /// Status a tracked quantity implies: zero or less means out of stock.
    pub fn for_quantity(qty: i64) -> Self {
        if qty <= 0 {
            StockStatus::OutOfStock
        } else {
            StockStatus::InStock
        }
    }
}

/// Backorder policy. "no" disallows purchase once stock runs out, "yes"
/// allows it, "notify" allows it and flags the order for the customer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BackorderMode {
    #[serde(rename = "no")]
    #[display("Do not allow")]
    Disallow,
    #[serde(rename = "yes")]
    #[display("Allow")]
    Allow,
    #[serde(rename = "notify")]
    #[display("Allow, but notify customer")]
    AllowNotify,
}

impl BackorderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackorderMode::Disallow => "no",
            BackorderMode::Allow => "yes",
            BackorderMode::AllowNotify => "notify",
        }
    }

    pub fn try_from_str<S: AsRef<str>>(input: S) -> Option<Self> {
        match input.as_ref().trim().to_lowercase().as_str() {
            "no" => Some(BackorderMode::Disallow),
            "yes" => Some(BackorderMode::Allow),
            "notify" => Some(BackorderMode::AllowNotify),
            _ => None,
        }
    }

    /// Whether purchases are accepted once quantity is exhausted.
    pub fn allows_backorders(&self) -> bool {
        !matches!(self, BackorderMode::Disallow)
    }
}

#[cfg(test)]
mod tests {
    use super::{BackorderMode, StockStatus};

    #[test]
    fn stock_status_parses_known_values() {
        assert_eq!(
            StockStatus::try_from_str("  InStock  "),
            Some(StockStatus::InStock)
        );
        assert_eq!(
            StockStatus::try_from_str("outofstock"),
            Some(StockStatus::OutOfStock)
        );
        assert_eq!(StockStatus::try_from_str("draft"), None);
        assert_eq!(StockStatus::try_from_str(""), None);
    }

    #[test]
    fn status_for_quantity_treats_zero_as_out_of_stock() {
        assert_eq!(StockStatus::for_quantity(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(-3), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(1), StockStatus::InStock);
    }

    #[test]
    fn backorder_mode_roundtrips_wire_values() {
        for mode in [
            BackorderMode::Disallow,
            BackorderMode::Allow,
            BackorderMode::AllowNotify,
        ] {
            assert_eq!(BackorderMode::try_from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(BackorderMode::try_from_str("maybe"), None);
    }

    #[test]
    fn notify_counts_as_allowing_backorders() {
        assert!(BackorderMode::Allow.allows_backorders());
        assert!(BackorderMode::AllowNotify.allows_backorders());
        assert!(!BackorderMode::Disallow.allows_backorders());
    }
}
