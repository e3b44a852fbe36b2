use serde::{Deserialize, Serialize};

/// A tradable instrument as listed in the symbol list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Instrument {
    /// Raw exchange ticker, without any market suffix.
    pub symbol: String,
    /// Human-readable company name; archives are grouped by it on disk.
    pub company_name: String,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
        }
    }

    /// Ticker as the provider expects it, e.g. `RELIANCE` + `.NS`.
    pub fn provider_symbol(&self, market_suffix: &str) -> String {
        format!("{}{}", self.symbol, market_suffix)
    }
}
