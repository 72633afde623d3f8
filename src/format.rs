use serde::Serialize;

use crate::models::PortfolioReport;

/// Placeholder shown where a fetch failed and no figure exists.
const UNAVAILABLE: &str = "n/a";

/// One display-ready table row; every column pre-formatted as a string.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRow {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Shares")]
    pub shares: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Weight")]
    pub weight: String,
    #[serde(rename = "Yield")]
    pub yield_pct: String,
    #[serde(rename = "P/L")]
    pub unrealized: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplaySummary {
    #[serde(rename = "Portfolio Value")]
    pub portfolio_value: String,
    #[serde(rename = "Weighted Yield")]
    pub weighted_yield: String,
    #[serde(rename = "Expected Income (12m)")]
    pub expected_income: String,
    #[serde(rename = "Holdings")]
    pub holdings: String,
}

fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Whole pounds with thousands separators, e.g. 1234.6 -> "£1,235".
pub fn format_gbp(value: f64) -> String {
    format!("£{}", group_thousands(value.round() as i64))
}

/// Signed variant for P/L figures, e.g. "+£200" / "-£57".
pub fn format_signed_gbp(value: f64) -> String {
    let rounded = value.round() as i64;
    if rounded < 0 {
        format!("-£{}", group_thousands(-rounded))
    } else {
        format!("+£{}", group_thousands(rounded))
    }
}

fn format_shares(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{:.0}", quantity)
    } else {
        format!("{:.4}", quantity)
    }
}

/// Shape a report into the live-holdings table, sorted by market value
/// descending as on the dashboard.
pub fn display_table(report: &PortfolioReport) -> Vec<DisplayRow> {
    let mut rows: Vec<_> = report.rows.iter().collect();
    rows.sort_by(|a, b| {
        b.market_value
            .partial_cmp(&a.market_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    rows.into_iter()
        .map(|row| DisplayRow {
            company: row.name.clone(),
            shares: format_shares(row.quantity),
            price: row
                .price
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            value: format_gbp(row.market_value),
            weight: format!("{:.2}%", row.weight * 100.0),
            yield_pct: row
                .yield_pct
                .map(|y| format!("{:.2}%", y))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            unrealized: format_signed_gbp(row.unrealized),
        })
        .collect()
}

pub fn display_summary(report: &PortfolioReport) -> DisplaySummary {
    let s = &report.summary;
    DisplaySummary {
        portfolio_value: format!(
            "{} ({})",
            format_gbp(s.total_value),
            format_signed_gbp(s.total_value - s.total_cost)
        ),
        weighted_yield: format!("{:.2}%", s.weighted_yield * 100.0),
        expected_income: format_gbp(s.expected_income),
        holdings: s.holdings.to_string(),
    }
}

/// Fixed-width text render of the table plus summary, for the root endpoint.
pub fn render_text(report: &PortfolioReport, refreshed_at: &str) -> String {
    const HEADERS: [&str; 7] = ["Company", "Shares", "Price", "Value", "Weight", "Yield", "P/L"];

    let rows = display_table(report);
    let cells: Vec<[&str; 7]> = rows
        .iter()
        .map(|r| {
            [
                r.company.as_str(),
                r.shares.as_str(),
                r.price.as_str(),
                r.value.as_str(),
                r.weight.as_str(),
                r.yield_pct.as_str(),
                r.unrealized.as_str(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_line = |row: &[&str; 7]| {
        row.iter()
            .enumerate()
            .map(|(i, cell)| format!("{:>width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = String::new();
    out.push_str(&format_line(&HEADERS));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    out.push('\n');
    for row in &cells {
        out.push_str(&format_line(row));
        out.push('\n');
    }

    let summary = display_summary(report);
    out.push('\n');
    out.push_str(&format!("Portfolio Value: {}\n", summary.portfolio_value));
    out.push_str(&format!("Weighted Yield: {}\n", summary.weighted_yield));
    out.push_str(&format!(
        "Expected Income (12m): {}\n",
        summary.expected_income
    ));
    out.push_str(&format!("Holdings: {}\n", summary.holdings));
    out.push_str(&format!("Refreshed: {}\n", refreshed_at));
    out
}
