//! Draft files: a TOML description of an invoice passed on the command line.
//!
//! ```toml
//! invoice_number = "INV-0042"
//! invoice_date = 2026-10-19
//!
//! [client]
//! name = "Acme Corp"
//! address = """
//! 12 Park Street
//! Kolkata 700016"""
//!
//! [[items]]
//! description = "Consulting Services"
//! quantity = 10
//! rate = 500
//! ```
//!
//! Drafts are only ever read. Item ids are assigned when the draft is loaded.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::DraftError;
use crate::model::{InvoiceHeader, NumericInput};
use crate::state::InvoiceState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftItem {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: NumericInput,
    #[serde(default)]
    pub rate: NumericInput,
}

fn default_quantity() -> NumericInput {
    NumericInput::new("1")
}

impl DraftItem {
    pub fn new(
        description: impl Into<String>,
        quantity: impl Into<NumericInput>,
        rate: impl Into<NumericInput>,
    ) -> Self {
        Self {
            description: description.into(),
            quantity: quantity.into(),
            rate: rate.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Draft {
    #[serde(flatten)]
    pub header: InvoiceHeader,
    #[serde(default)]
    pub items: Vec<DraftItem>,
}

impl Draft {
    pub fn parse(content: &str, path: &Path) -> Result<Self, DraftError> {
        toml::from_str(content).map_err(|source| DraftError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, DraftError> {
        let content = fs::read_to_string(path).map_err(|source| DraftError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Start a session from this draft.
    pub fn into_state(self) -> InvoiceState {
        InvoiceState::with_items(self.header, self.items)
    }
}
