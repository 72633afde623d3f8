use crate::models::{EnrichedHolding, Holding, PortfolioReport, PortfolioSummary, Profile, Quote};

/// Join holdings with their fetch results and compute the derived columns
/// and portfolio totals. Pure function over three index-aligned slices;
/// equal lengths are the caller's contract.
///
/// A failed fetch (`None` price or yield) keeps its row in the report,
/// valued at zero, so the display layer can flag it; the totals therefore
/// count only rows that actually priced.
pub fn aggregate(holdings: &[Holding], quotes: &[Quote], profiles: &[Profile]) -> PortfolioReport {
    debug_assert_eq!(holdings.len(), quotes.len());
    debug_assert_eq!(holdings.len(), profiles.len());

    let total_cost: f64 = holdings.iter().map(|h| h.cost).sum();

    let market_values: Vec<f64> = holdings
        .iter()
        .zip(quotes)
        .map(|(holding, quote)| quote.price.unwrap_or(0.0) * holding.quantity)
        .collect();
    let total_value: f64 = market_values.iter().sum();

    let rows: Vec<EnrichedHolding> = holdings
        .iter()
        .zip(quotes)
        .zip(profiles)
        .zip(&market_values)
        .map(|(((holding, quote), profile), &market_value)| EnrichedHolding {
            symbol: holding.symbol.clone(),
            name: holding.display_name().to_string(),
            quantity: holding.quantity,
            cost: holding.cost,
            price: quote.price,
            yield_pct: profile.yield_pct,
            target: profile.target,
            market_value,
            unrealized: market_value - holding.cost,
            weight: if total_value > 0.0 {
                market_value / total_value
            } else {
                0.0
            },
        })
        .collect();

    let expected_income: f64 = rows
        .iter()
        .map(|r| r.market_value * r.yield_pct.unwrap_or(0.0) / 100.0)
        .sum();
    let weighted_yield = if total_value > 0.0 {
        expected_income / total_value
    } else {
        0.0
    };

    PortfolioReport {
        summary: PortfolioSummary {
            total_cost,
            total_value,
            weighted_yield,
            expected_income,
            holdings: rows.len(),
        },
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_holding(symbol: &str, cost: f64, quantity: f64) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            name: None,
            cost,
            quantity,
        }
    }

    fn quote(price: f64) -> Quote {
        Quote { price: Some(price) }
    }

    fn profile(yield_pct: f64, target: Option<f64>) -> Profile {
        Profile {
            yield_pct: Some(yield_pct),
            target,
        }
    }

    #[test]
    fn test_single_holding_scenario() {
        let holdings = vec![make_holding("AAA", 1000.0, 100.0)];
        let quotes = vec![quote(12.0)];
        let profiles = vec![profile(3.0, Some(15.0))];

        let report = aggregate(&holdings, &quotes, &profiles);
        let row = &report.rows[0];
        assert_eq!(row.market_value, 1200.0);
        assert_eq!(row.unrealized, 200.0);
        assert_eq!(row.weight, 1.0);
        assert_eq!(row.target, Some(15.0));
        assert_eq!(report.summary.total_cost, 1000.0);
        assert_eq!(report.summary.total_value, 1200.0);
        assert_eq!(report.summary.expected_income, 36.0);
        assert!((report.summary.weighted_yield - 0.03).abs() < 1e-12);
        assert_eq!(report.summary.holdings, 1);
    }

    #[test]
    fn test_failed_quote_counts_as_zero_and_stays_flagged() {
        let holdings = vec![
            make_holding("AAA", 1000.0, 100.0),
            make_holding("BBB", 500.0, 50.0),
        ];
        let quotes = vec![quote(12.0), Quote::failed()];
        let profiles = vec![profile(3.0, None), Profile::failed()];

        let report = aggregate(&holdings, &quotes, &profiles);
        // Total reflects only the row that priced.
        assert_eq!(report.summary.total_value, 1200.0);
        let failed = &report.rows[1];
        assert_eq!(failed.price, None);
        assert_eq!(failed.market_value, 0.0);
        assert_eq!(failed.weight, 0.0);
        assert_eq!(failed.unrealized, -500.0);
        assert_eq!(report.rows[0].weight, 1.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let holdings = vec![
            make_holding("AAA", 100.0, 10.0),
            make_holding("BBB", 100.0, 20.0),
            make_holding("CCC", 100.0, 30.0),
        ];
        let quotes = vec![quote(1.5), quote(2.25), quote(7.125)];
        let profiles = vec![profile(2.0, None), profile(0.0, None), profile(5.5, None)];

        let report = aggregate(&holdings, &quotes, &profiles);
        let weight_sum: f64 = report.rows.iter().map(|r| r.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);
        for row in &report.rows {
            assert!(row.market_value >= 0.0);
            assert_eq!(row.unrealized, row.market_value - row.cost);
        }
    }

    #[test]
    fn test_income_yield_identity() {
        let holdings = vec![
            make_holding("AAA", 100.0, 10.0),
            make_holding("BBB", 100.0, 20.0),
        ];
        let quotes = vec![quote(3.33), quote(9.99)];
        let profiles = vec![profile(4.25, None), profile(1.75, None)];

        let report = aggregate(&holdings, &quotes, &profiles);
        let lhs = report.summary.weighted_yield * report.summary.total_value;
        let rhs = report.summary.expected_income;
        assert!((lhs - rhs).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_value_divides_nothing() {
        let holdings = vec![
            make_holding("AAA", 100.0, 10.0),
            make_holding("BBB", 200.0, 20.0),
        ];
        let quotes = vec![Quote::failed(), Quote::failed()];
        let profiles = vec![Profile::failed(), Profile::failed()];

        let report = aggregate(&holdings, &quotes, &profiles);
        assert_eq!(report.summary.total_value, 0.0);
        assert_eq!(report.summary.weighted_yield, 0.0);
        assert_eq!(report.summary.expected_income, 0.0);
        assert_eq!(report.summary.total_cost, 300.0);
        assert!(report.rows.iter().all(|r| r.weight == 0.0));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let holdings = vec![
            make_holding("AAA", 1000.0, 100.0),
            make_holding("BBB", 500.0, 50.0),
        ];
        let quotes = vec![quote(12.0), quote(4.5)];
        let profiles = vec![profile(3.0, Some(15.0)), profile(6.2, None)];

        let first = aggregate(&holdings, &quotes, &profiles);
        let second = aggregate(&holdings, &quotes, &profiles);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_portfolio() {
        let report = aggregate(&[], &[], &[]);
        assert!(report.rows.is_empty());
        assert_eq!(report.summary.total_value, 0.0);
        assert_eq!(report.summary.weighted_yield, 0.0);
        assert_eq!(report.summary.holdings, 0);
    }
}
