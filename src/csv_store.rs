use csv::ReaderBuilder;
use serde::Deserialize;
use std::error::Error;

use crate::models::Holding;

/// Symbol value marking the synthetic aggregate row some exports append.
/// Not a real holding; dropped before any processing.
const TOTAL_MARKER: &str = "Total";

// Raw CSV row. Numerics arrive as strings so each field gets an explicit
// parse with a row-level error instead of a silent NaN.
#[derive(Debug, Deserialize)]
struct HoldingCsv {
    #[serde(rename = "Slice")]
    slice: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Owned quantity")]
    owned_quantity: String,
}

pub trait HoldingStore {
    fn read_holdings(&self, path: &str) -> Result<Vec<Holding>, Box<dyn Error + Send + Sync>>;
}

pub struct FileCsvStore;

fn parse_decimal(field: &str, raw: &str, row: usize) -> Result<f64, Box<dyn Error + Send + Sync>> {
    // Exports write thousands separators into numeric columns.
    let cleaned = raw.trim().replace(',', "");
    let parsed: f64 = cleaned
        .parse()
        .map_err(|_| format!("row {}: {} '{}' is not a number", row, field, raw))?;
    if parsed < 0.0 || !parsed.is_finite() {
        return Err(format!("row {}: {} '{}' must be a non-negative number", row, field, raw).into());
    }
    Ok(parsed)
}

impl HoldingStore for FileCsvStore {
    fn read_holdings(&self, path: &str) -> Result<Vec<Holding>, Box<dyn Error + Send + Sync>> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let mut holdings = Vec::new();
        for (i, result) in rdr.deserialize().enumerate() {
            let row = i + 2; // 1-based, after the header line
            let record: HoldingCsv = result?;
            if record.slice == TOTAL_MARKER {
                continue;
            }
            if record.slice.is_empty() {
                return Err(format!("row {}: empty symbol", row).into());
            }
            let name = record.name.filter(|n| !n.is_empty());
            holdings.push(Holding {
                symbol: record.slice,
                name,
                cost: parse_decimal("Value", &record.value, row)?,
                quantity: parse_decimal("Owned quantity", &record.owned_quantity, row)?,
            });
        }
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    struct TempCsv(PathBuf);

    impl TempCsv {
        fn write(name: &str, content: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "income_dashboard_{}_{}.csv",
                std::process::id(),
                name
            ));
            fs::write(&path, content).unwrap();
            Self(path)
        }

        fn path(&self) -> &str {
            self.0.to_str().unwrap()
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_reads_holdings_and_drops_total_row() {
        let csv = TempCsv::write(
            "basic",
            "Slice,Name,Value,Owned quantity\n\
             VOD,Vodafone,\"1,000\",500\n\
             BP,,250.5,10\n\
             Total,,1250.5,510\n",
        );
        let holdings = FileCsvStore.read_holdings(csv.path()).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "VOD");
        assert_eq!(holdings[0].cost, 1000.0);
        assert_eq!(holdings[0].quantity, 500.0);
        assert_eq!(holdings[0].display_name(), "Vodafone");
        assert_eq!(holdings[1].display_name(), "BP");
    }

    #[test]
    fn test_malformed_number_rejects_load() {
        let csv = TempCsv::write(
            "malformed",
            "Slice,Name,Value,Owned quantity\nVOD,Vodafone,abc,500\n",
        );
        let err = FileCsvStore.read_holdings(csv.path()).unwrap_err();
        assert!(err.to_string().contains("Value"));
    }

    #[test]
    fn test_negative_quantity_rejects_load() {
        let csv = TempCsv::write(
            "negative",
            "Slice,Name,Value,Owned quantity\nVOD,Vodafone,1000,-5\n",
        );
        let err = FileCsvStore.read_holdings(csv.path()).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_empty_symbol_rejects_load() {
        let csv = TempCsv::write(
            "empty_symbol",
            "Slice,Name,Value,Owned quantity\n,Vodafone,1000,5\n",
        );
        assert!(FileCsvStore.read_holdings(csv.path()).is_err());
    }
}
