//! Symbol metadata and the exchange-info documents it is built from.

use std::fmt;

use serde::Deserialize;

use crate::core::SymbolId;
use crate::exchange::SymbolFilters;

/// An instrument: base/quote assets, display name, and trading filters.
/// Immutable after construction; shared via `Arc` across paths and orders.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub base: String,
    pub quote: String,
    pub name: String,
    pub filters: SymbolFilters,
}

impl Symbol {
    pub fn new(
        id: SymbolId,
        base: impl Into<String>,
        quote: impl Into<String>,
        name: impl Into<String>,
        filters: SymbolFilters,
    ) -> Self {
        Self {
            id,
            base: base.into(),
            quote: quote.into(),
            name: name.into(),
            filters,
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One symbol entry of the exchange-info document served by the admin
/// endpoint. Filters stay as raw JSON until [`SymbolFilters::from_json`]
/// interprets the entries it knows about.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolDocument {
    pub symbol: String,
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub filters: Vec<serde_json::Value>,
}

impl SymbolDocument {
    /// Whether the instrument is live for trading.
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

/// Root of the exchange-info document.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolDocument>,
}
