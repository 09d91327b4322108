//! Column header normalization
//!
//! Spreadsheet headers arrive in arbitrary spellings ("Preço Unitário",
//! "preco_unitario", "PRICE"). Each header is folded to a canonical key
//! (lower-case, accents stripped, non-alphanumerics removed) and matched
//! against a fixed, ordered synonym list per field. There is no fuzzy or
//! partial matching.
//!
//! The result of a lookup is a [`NormalizedRow`], a fixed-shape struct, so
//! coercion never has to deal with dynamic maps.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Cell;

/// Remove combining marks after canonical decomposition ("Março" -> "Marco")
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lower-case and strip accents, keeping every other character
pub fn fold_text(s: &str) -> String {
    strip_diacritics(&s.to_lowercase())
}

/// Canonical lookup key for a raw header: folded, then only `[a-z0-9]` kept
pub fn normalize_key(raw: &str) -> String {
    fold_text(raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Logical fields recognized in a sales spreadsheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Product,
    Quantity,
    UnitPrice,
    TotalRevenue,
    TransactionDate,
    TransactionId,
    Category,
    Region,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Self::Product,
        Self::Quantity,
        Self::UnitPrice,
        Self::TotalRevenue,
        Self::TransactionDate,
        Self::TransactionId,
        Self::Category,
        Self::Region,
    ];

    /// Accepted header spellings, already in normalized form, in priority order
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Product => &["produto", "product"],
            Self::Quantity => &["quantidade", "qtd", "quantity"],
            Self::UnitPrice => &["precounitario", "precunitario", "price", "unitprice"],
            Self::TotalRevenue => &["receitatotal", "revenue", "totalrevenue"],
            Self::TransactionDate => &["data", "date"],
            Self::TransactionId => &["idtransacao", "transactionid"],
            Self::Category => &["categoria", "category"],
            Self::Region => &["regiao", "region"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Quantity => "quantity",
            Self::UnitPrice => "unit_price",
            Self::TotalRevenue => "total_revenue",
            Self::TransactionDate => "transaction_date",
            Self::TransactionId => "transaction_id",
            Self::Category => "category",
            Self::Region => "region",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }
}

/// One sheet row projected onto the recognized fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    pub product: Cell,
    pub quantity: Cell,
    pub unit_price: Cell,
    pub total_revenue: Cell,
    pub transaction_date: Cell,
    pub transaction_id: Cell,
    pub category: Cell,
    pub region: Cell,
}

impl NormalizedRow {
    fn slot(&mut self, field: Field) -> &mut Cell {
        match field {
            Field::Product => &mut self.product,
            Field::Quantity => &mut self.quantity,
            Field::UnitPrice => &mut self.unit_price,
            Field::TotalRevenue => &mut self.total_revenue,
            Field::TransactionDate => &mut self.transaction_date,
            Field::TransactionId => &mut self.transaction_id,
            Field::Category => &mut self.category,
            Field::Region => &mut self.region,
        }
    }
}

/// Resolved mapping from header row to field columns
#[derive(Debug, Clone)]
pub struct HeaderMap {
    /// Per field, candidate column indexes in synonym priority order
    columns: [Vec<usize>; 8],
    /// Headers that matched no field
    unmatched: Vec<String>,
}

impl HeaderMap {
    /// Build the mapping for a header row.
    ///
    /// When two headers normalize to the same key, the rightmost one wins.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let keys: Vec<String> = headers.iter().map(|h| normalize_key(h.as_ref())).collect();

        let mut columns: [Vec<usize>; 8] = Default::default();
        for field in Field::ALL {
            for synonym in field.synonyms() {
                if let Some(idx) = keys.iter().rposition(|k| k == synonym) {
                    columns[field.index()].push(idx);
                }
            }
        }

        let unmatched = headers
            .iter()
            .zip(&keys)
            .filter(|(_, key)| {
                !Field::ALL
                    .iter()
                    .any(|f| f.synonyms().contains(&key.as_str()))
            })
            .map(|(h, _)| h.as_ref().to_string())
            .collect();

        Self { columns, unmatched }
    }

    /// Whether any header maps to `field`
    pub fn has(&self, field: Field) -> bool {
        !self.columns[field.index()].is_empty()
    }

    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }

    /// Project a raw row. For each field the first synonym column holding a
    /// non-empty cell supplies the value; short rows read as `Empty`.
    pub fn project(&self, row: &[Cell]) -> NormalizedRow {
        let mut out = NormalizedRow::default();
        for field in Field::ALL {
            let value = self.columns[field.index()]
                .iter()
                .filter_map(|&idx| row.get(idx))
                .find(|cell| !cell.is_empty())
                .cloned()
                .unwrap_or_default();
            *out.slot(field) = value;
        }
        out
    }
}
