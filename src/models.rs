use serde::{Deserialize, Serialize};

// One row of the input portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub name: Option<String>,
    /// Originally paid amount for the position.
    pub cost: f64,
    pub quantity: f64,
}

impl Holding {
    /// Ticker used against the quote provider: symbol plus exchange suffix
    /// (".L" for LSE symbols on Yahoo).
    pub fn ticker(&self, suffix: &str) -> String {
        format!("{}{}", self.symbol, suffix)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }
}

/// Latest traded price. `None` means the fetch failed, which is distinct
/// from a genuine zero price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Option<f64>,
}

impl Quote {
    pub fn failed() -> Self {
        Self { price: None }
    }
}

/// Dividend profile. `yield_pct` is a percentage (4.5 for a 0.045 raw
/// fraction); `None` means unknown or fetch failed. `target` is the analyst
/// target price, absent when the provider has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub yield_pct: Option<f64>,
    pub target: Option<f64>,
}

impl Profile {
    pub fn failed() -> Self {
        Self {
            yield_pct: None,
            target: None,
        }
    }
}

/// Holding joined with its fetch results and derived columns.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedHolding {
    pub symbol: String,
    pub name: String,
    pub quantity: f64,
    pub cost: f64,
    pub price: Option<f64>,
    pub yield_pct: Option<f64>,
    pub target: Option<f64>,
    pub market_value: f64,
    pub unrealized: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub total_cost: f64,
    pub total_value: f64,
    /// Value-weighted dividend yield as a fraction (0.034 for 3.4%).
    pub weighted_yield: f64,
    /// Estimated forward 12-month dividend income.
    pub expected_income: f64,
    pub holdings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub rows: Vec<EnrichedHolding>,
    pub summary: PortfolioSummary,
}
