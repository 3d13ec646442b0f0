//! Session state for one invoice and the reducer that edits it.
//!
//! `apply_edit` takes the current snapshot by value and returns the next one.
//! The calculator and validator only ever see [`InvoiceState::logical_invoice`],
//! i.e. the items that are not marked for removal.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::calculator::compute_totals;
use crate::draft::DraftItem;
use crate::model::{HeaderField, Invoice, InvoiceHeader, ItemField, LineItem, LineItemId, Party, Totals};
use crate::validator::{FieldKey, ValidationReport, validate};

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderEdit {
    /// Text fields are stored as given. `InvoiceDate` and `DueDate` expect
    /// `YYYY-MM-DD`; an empty due date clears it.
    Set(HeaderField, String),
    /// Add or drop the vendor block.
    Vendor(bool),
    /// Start or stop numbering this invoice.
    Numbering(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddItem,
    /// Marks the item as leaving; it stops counting immediately.
    RemoveItem(LineItemId),
    /// Drops an item previously marked by `RemoveItem`.
    FinalizeRemoval(LineItemId),
    UpdateItem {
        id: LineItemId,
        field: ItemField,
        value: String,
    },
    UpdateHeader(HeaderEdit),
    Validate {
        today: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceState {
    invoice: Invoice,
    next_id: u64,
    removing: BTreeSet<LineItemId>,
    report: Option<ValidationReport>,
    field_errors: BTreeMap<FieldKey, String>,
}

impl InvoiceState {
    /// A new session holding one blank item.
    pub fn new(header: InvoiceHeader) -> Self {
        Self::with_items(header, Vec::<DraftItem>::new())
    }

    /// Ids are assigned in order; an empty list still yields one blank item.
    pub fn with_items(header: InvoiceHeader, items: impl IntoIterator<Item = DraftItem>) -> Self {
        let mut state = Self {
            invoice: Invoice {
                header,
                items: Vec::new(),
            },
            next_id: 1,
            removing: BTreeSet::new(),
            report: None,
            field_errors: BTreeMap::new(),
        };

        for draft in items {
            let id = state.allocate_id();
            state.invoice.items.push(LineItem {
                id,
                description: draft.description,
                quantity: draft.quantity,
                rate: draft.rate,
            });
        }
        if state.invoice.items.is_empty() {
            let id = state.allocate_id();
            state.invoice.items.push(LineItem::blank(id));
        }
        state
    }

    fn allocate_id(&mut self) -> LineItemId {
        let id = LineItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Everything, including items on their way out.
    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn is_removing(&self, id: LineItemId) -> bool {
        self.removing.contains(&id)
    }

    pub fn active_items(&self) -> impl Iterator<Item = &LineItem> {
        self.invoice
            .items
            .iter()
            .filter(|item| !self.removing.contains(&item.id))
    }

    /// The invoice as the calculator, validator and templates see it.
    pub fn logical_invoice(&self) -> Invoice {
        Invoice {
            header: self.invoice.header.clone(),
            items: self.active_items().cloned().collect(),
        }
    }

    pub fn totals(&self) -> Totals {
        let items: Vec<LineItem> = self.active_items().cloned().collect();
        compute_totals(&items)
    }

    /// Last validation result, `None` once anything has been edited since.
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    pub fn field_error(&self, key: FieldKey) -> Option<&str> {
        self.field_errors.get(&key).map(String::as_str)
    }

    fn touched(&mut self, key: Option<FieldKey>) {
        self.report = None;
        if let Some(key) = key {
            self.field_errors.remove(&key);
        }
    }
}

const VENDOR_FIELDS: [HeaderField; 4] = [
    HeaderField::VendorName,
    HeaderField::VendorEmail,
    HeaderField::VendorPhone,
    HeaderField::VendorAddress,
];

pub fn apply_edit(mut state: InvoiceState, action: Action) -> InvoiceState {
    tracing::debug!(?action, "applying edit");

    match action {
        Action::AddItem => {
            let id = state.allocate_id();
            state.invoice.items.push(LineItem::blank(id));
            state.touched(None);
        }
        Action::RemoveItem(id) => {
            let known = state.invoice.items.iter().any(|item| item.id == id);
            let active = state.active_items().count();
            if !known || state.removing.contains(&id) {
                return state;
            }
            if active <= 1 {
                tracing::debug!(%id, "refusing to remove the last line item");
                return state;
            }
            state.removing.insert(id);
            state.touched(None);
        }
        Action::FinalizeRemoval(id) => {
            if state.removing.remove(&id) {
                state.invoice.items.retain(|item| item.id != id);
                state.field_errors.retain(|key, _| !matches!(key, FieldKey::Item(item, _) if *item == id));
                state.touched(None);
            }
        }
        Action::UpdateItem { id, field, value } => {
            let Some(item) = state.invoice.items.iter_mut().find(|item| item.id == id) else {
                tracing::debug!(%id, "edit for unknown line item ignored");
                return state;
            };
            match field {
                ItemField::Description => item.description = value,
                ItemField::Quantity => item.quantity = value.into(),
                ItemField::Rate => item.rate = value.into(),
            }
            state.touched(Some(FieldKey::Item(id, field)));
        }
        Action::UpdateHeader(edit) => {
            let dropped: &[HeaderField] = match edit {
                HeaderEdit::Vendor(false) => &VENDOR_FIELDS,
                HeaderEdit::Numbering(false) => &[HeaderField::InvoiceNumber],
                _ => &[],
            };
            state
                .field_errors
                .retain(|key, _| !matches!(key, FieldKey::Header(field) if dropped.contains(field)));
            let key = apply_header_edit(&mut state.invoice.header, edit);
            state.touched(key);
        }
        Action::Validate { today } => {
            let invoice = state.logical_invoice();
            let totals = compute_totals(&invoice.items);
            let report = validate(&invoice, &totals, today);
            state.field_errors = report
                .errors
                .iter()
                .map(|e| (e.field, e.message.clone()))
                .collect();
            state.report = Some(report);
        }
    }

    state
}

fn apply_header_edit(header: &mut InvoiceHeader, edit: HeaderEdit) -> Option<FieldKey> {
    match edit {
        HeaderEdit::Set(field, value) => {
            match field {
                HeaderField::ClientName => header.client.name = value,
                HeaderField::ClientEmail => header.client.email = value,
                HeaderField::ClientPhone => header.client.phone = value,
                HeaderField::ClientAddress => header.client.address = value,
                HeaderField::VendorName => vendor_mut(header).name = value,
                HeaderField::VendorEmail => vendor_mut(header).email = value,
                HeaderField::VendorPhone => vendor_mut(header).phone = value,
                HeaderField::VendorAddress => vendor_mut(header).address = value,
                HeaderField::InvoiceNumber => header.invoice_number = Some(value),
                HeaderField::InvoiceDate => match parse_date(&value) {
                    Some(date) => header.invoice_date = date,
                    None => {
                        tracing::warn!(%value, "ignoring unparseable invoice date");
                        return None;
                    }
                },
                HeaderField::DueDate => {
                    if value.trim().is_empty() {
                        header.due_date = None;
                    } else if let Some(date) = parse_date(&value) {
                        header.due_date = Some(date);
                    } else {
                        tracing::warn!(%value, "ignoring unparseable due date");
                        return None;
                    }
                }
            }
            Some(FieldKey::Header(field))
        }
        HeaderEdit::Vendor(enabled) => {
            if !enabled {
                header.vendor = None;
            } else if header.vendor.is_none() {
                header.vendor = Some(Party::default());
            }
            None
        }
        HeaderEdit::Numbering(enabled) => {
            if !enabled {
                header.invoice_number = None;
            } else if header.invoice_number.is_none() {
                header.invoice_number = Some(String::new());
            }
            None
        }
    }
}

fn vendor_mut(header: &mut InvoiceHeader) -> &mut Party {
    header.vendor.get_or_insert_with(Party::default)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
