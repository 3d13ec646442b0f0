use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a line item, unique within one invoice session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(pub u64);

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Quantity or rate exactly as the user typed it.
///
/// Coercion to a number happens in the calculator; the raw text is kept so
/// that half-typed values ("", "-", "12.") survive editing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct NumericInput(String);

impl NumericInput {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NumericInput {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NumericInput {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for NumericInput {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for NumericInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NumericInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(v) => v.into(),
            Raw::Float(v) => v.into(),
            Raw::Text(v) => v.into(),
        })
    }
}

/// One billable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub description: String,
    pub quantity: NumericInput,
    pub rate: NumericInput,
}

impl LineItem {
    /// A freshly added row: no description, quantity 1, rate 0.
    pub fn blank(id: LineItemId) -> Self {
        Self {
            id,
            description: String::new(),
            quantity: NumericInput::new("1"),
            rate: NumericInput::new("0"),
        }
    }
}

/// Which editable field of a line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    Description,
    Quantity,
    Rate,
}

impl ItemField {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemField::Description => "description",
            ItemField::Quantity => "quantity",
            ItemField::Rate => "rate",
        }
    }
}

/// Which header field an edit or an error refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    ClientName,
    ClientEmail,
    ClientPhone,
    ClientAddress,
    VendorName,
    VendorEmail,
    VendorPhone,
    VendorAddress,
    InvoiceNumber,
    InvoiceDate,
    DueDate,
}

impl HeaderField {
    pub fn as_str(self) -> &'static str {
        match self {
            HeaderField::ClientName => "client_name",
            HeaderField::ClientEmail => "client_email",
            HeaderField::ClientPhone => "client_phone",
            HeaderField::ClientAddress => "client_address",
            HeaderField::VendorName => "vendor_name",
            HeaderField::VendorEmail => "vendor_email",
            HeaderField::VendorPhone => "vendor_phone",
            HeaderField::VendorAddress => "vendor_address",
            HeaderField::InvoiceNumber => "invoice_number",
            HeaderField::InvoiceDate => "invoice_date",
            HeaderField::DueDate => "due_date",
        }
    }
}

/// Contact block for either side of the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Free text, one line per row.
    #[serde(default)]
    pub address: String,
}

impl Party {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn address_lines(&self) -> Vec<&str> {
        self.address
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub client: Party,
    /// `None` when the invoice carries no vendor block at all.
    #[serde(default)]
    pub vendor: Option<Party>,
    /// `None` when the invoice does not use numbering.
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default = "today", deserialize_with = "date_input::required")]
    pub invoice_date: NaiveDate,
    #[serde(default, deserialize_with = "date_input::optional")]
    pub due_date: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Dates written either as `"2026-10-19"` or as a bare TOML date. A TOML
/// datetime keeps only its date part.
mod date_input {
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use toml::value::Datetime;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Toml(Datetime),
    }

    fn to_date<E: Error>(raw: Raw) -> Result<NaiveDate, E> {
        match raw {
            Raw::Text(text) => text.trim().parse().map_err(E::custom),
            Raw::Toml(datetime) => {
                let date = datetime
                    .date
                    .ok_or_else(|| E::custom(format!("`{datetime}` has no date part")))?;
                NaiveDate::from_ymd_opt(date.year.into(), date.month.into(), date.day.into())
                    .ok_or_else(|| E::custom(format!("`{date}` is not a calendar date")))
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        to_date(Raw::deserialize(deserializer)?)
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        Option::<Raw>::deserialize(deserializer)?.map(to_date).transpose()
    }
}

impl Default for InvoiceHeader {
    fn default() -> Self {
        Self {
            client: Party::default(),
            vendor: None,
            invoice_number: None,
            invoice_date: today(),
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub header: InvoiceHeader,
    pub items: Vec<LineItem>,
}

/// Derived amounts. Always recomputed from the items, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}
