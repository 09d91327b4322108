//! Aggregation of stored records into a deterministic fact sheet
//!
//! Records are grouped by period in the order periods first appear, then
//! summed per product. Within a period products are ranked by total quantity
//! (descending) with ties broken by name, so the same record set always
//! renders the same text regardless of insertion order inside a period.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::{NewSale, Period, SalesRecord};

/// Rendered in place of an empty fact sheet
pub const NO_DATA_MARKER: &str = "No sales found. Please upload sales spreadsheets.";

const HEADING: &str = "Structured facts for analysis:";

/// The fields aggregation needs from a record
pub trait SaleLine {
    fn product(&self) -> &str;
    fn quantity(&self) -> i64;
    fn period(&self) -> Period;
}

impl SaleLine for SalesRecord {
    fn product(&self) -> &str {
        &self.product
    }
    fn quantity(&self) -> i64 {
        self.quantity
    }
    fn period(&self) -> Period {
        SalesRecord::period(self)
    }
}

impl SaleLine for NewSale {
    fn product(&self) -> &str {
        &self.product
    }
    fn quantity(&self) -> i64 {
        self.quantity
    }
    fn period(&self) -> Period {
        NewSale::period(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTotal {
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    /// Ranked, never empty
    pub products: Vec<ProductTotal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactSheet {
    pub periods: Vec<PeriodSummary>,
}

impl FactSheet {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Render the sheet, or the no-data marker when there is nothing to show
    pub fn render(&self) -> String {
        if self.is_empty() {
            return NO_DATA_MARKER.to_string();
        }

        let mut out = String::from(HEADING);
        out.push('\n');
        for summary in &self.periods {
            let _ = write!(out, "\n{}:\n", summary.period);
            for (i, item) in summary.products.iter().enumerate() {
                let _ = writeln!(out, "{}. {}: {}", i + 1, item.product, item.quantity);
            }
        }
        out
    }
}

impl std::fmt::Display for FactSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Group, total and rank. Pure; no I/O.
pub fn summarize<T: SaleLine>(records: &[T]) -> FactSheet {
    let mut order: Vec<Period> = Vec::new();
    let mut totals: HashMap<Period, HashMap<&str, i64>> = HashMap::new();

    for record in records {
        let period = record.period();
        let products = totals.entry(period).or_insert_with(|| {
            order.push(period);
            HashMap::new()
        });
        let total = products.entry(record.product()).or_insert(0);
        *total = total.saturating_add(record.quantity());
    }

    let periods = order
        .into_iter()
        .filter_map(|period| {
            let mut products: Vec<ProductTotal> = totals
                .remove(&period)?
                .into_iter()
                .filter(|(name, _)| !name.trim().is_empty())
                .map(|(product, quantity)| ProductTotal {
                    product: product.to_string(),
                    quantity,
                })
                .collect();
            if products.is_empty() {
                return None;
            }
            products.sort_by(|a, b| {
                b.quantity
                    .cmp(&a.quantity)
                    .then_with(|| a.product.cmp(&b.product))
            });
            Some(PeriodSummary { period, products })
        })
        .collect();

    FactSheet { periods }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Month;
    use crate::test_utils::sale_in;

    fn feb() -> Period {
        Period::new(Month::Fevereiro, 2025)
    }

    fn mar() -> Period {
        Period::new(Month::Marco, 2025)
    }

    #[test]
    fn test_tie_breaks_by_name() {
        let records = vec![sale_in("B", 5, feb()), sale_in("A", 5, feb())];
        let sheet = summarize(&records);
        let names: Vec<_> = sheet.periods[0]
            .products
            .iter()
            .map(|p| p.product.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_sums_per_product() {
        let records = vec![
            sale_in("Caneta", 3, feb()),
            sale_in("Caderno", 4, feb()),
            sale_in("Caneta", 2, feb()),
        ];
        let sheet = summarize(&records);
        assert_eq!(
            sheet.periods[0].products,
            vec![
                ProductTotal {
                    product: "Caneta".into(),
                    quantity: 5
                },
                ProductTotal {
                    product: "Caderno".into(),
                    quantity: 4
                },
            ]
        );
    }

    #[test]
    fn test_periods_in_first_seen_order() {
        let records = vec![
            sale_in("A", 1, mar()),
            sale_in("A", 1, feb()),
            sale_in("B", 1, mar()),
        ];
        let sheet = summarize(&records);
        let periods: Vec<_> = sheet.periods.iter().map(|p| p.period).collect();
        assert_eq!(periods, vec![mar(), feb()]);
    }

    #[test]
    fn test_render() {
        let records = vec![
            sale_in("Caneta", 10, feb()),
            sale_in("Caderno", 12, feb()),
            sale_in("Lápis", 1, mar()),
        ];
        let expected = "Structured facts for analysis:\n\
                        \n\
                        Fevereiro/2025:\n\
                        1. Caderno: 12\n\
                        2. Caneta: 10\n\
                        \n\
                        Março/2025:\n\
                        1. Lápis: 1\n";
        assert_eq!(summarize(&records).render(), expected);
    }

    #[test]
    fn test_deterministic_under_reordering() {
        let mut records = vec![
            sale_in("C", 2, feb()),
            sale_in("A", 2, feb()),
            sale_in("B", 7, feb()),
            sale_in("A", 1, feb()),
        ];
        let first = summarize(&records).render();
        assert_eq!(first, summarize(&records).render());

        records.reverse();
        assert_eq!(first, summarize(&records).render());
    }

    #[test]
    fn test_empty_renders_marker() {
        let sheet = summarize::<NewSale>(&[]);
        assert!(sheet.is_empty());
        assert_eq!(sheet.render(), NO_DATA_MARKER);
    }

    #[test]
    fn test_zero_quantities_still_listed() {
        let sheet = summarize(&[sale_in("Brinde", 0, feb())]);
        assert_eq!(sheet.periods[0].products[0].quantity, 0);
    }
}
