//! PDF export: validation gate, Typst rendering and compilation.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDate;
use slug::slugify;

use crate::calculator::compute_totals;
use crate::error::ExportError;
use crate::model::{Invoice, InvoiceHeader};
use crate::template::Template;
use crate::validator::validate;

/// Turns a Typst source file into a PDF.
pub trait DocumentCompiler {
    fn compile(&self, source: &Path, output: &Path) -> Result<(), ExportError>;
}

/// Shells out to the `typst` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypstCompiler;

impl DocumentCompiler for TypstCompiler {
    fn compile(&self, source: &Path, output: &Path) -> Result<(), ExportError> {
        if Command::new("typst").arg("--version").output().is_err() {
            return Err(ExportError::CompilerMissing);
        }

        let result = Command::new("typst")
            .arg("compile")
            .arg(source)
            .arg(output)
            .output()
            .map_err(|e| ExportError::compile(e.to_string()))?;

        if result.status.success() {
            Ok(())
        } else {
            Err(ExportError::compile(
                String::from_utf8_lossy(&result.stderr).trim().to_string(),
            ))
        }
    }
}

/// `invoice-inv-0042-acme-corp` or, without a number, `invoice-2026-10-19-acme-corp`.
pub fn export_file_stem(header: &InvoiceHeader) -> String {
    let reference = header
        .invoice_number
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| header.invoice_date.format("%Y-%m-%d").to_string());
    let client = slugify(&header.client.name);
    let client = if client.is_empty() { "client".to_string() } else { client };
    format!("invoice-{reference}-{client}")
}

/// Clears the exporting flag however the export ends.
struct ExportingGuard<'a>(&'a Cell<bool>);

impl Drop for ExportingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Exporter<C = TypstCompiler> {
    compiler: C,
    output_dir: PathBuf,
    exporting: Cell<bool>,
}

impl<C: DocumentCompiler> Exporter<C> {
    pub fn new(compiler: C, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            compiler,
            output_dir: output_dir.into(),
            exporting: Cell::new(false),
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.get()
    }

    /// Validate, render and compile `invoice`. Returns the PDF path.
    ///
    /// Refused with [`ExportError::ValidationFailed`] while the invoice has
    /// errors; warnings do not block.
    pub fn export(
        &self,
        invoice: &Invoice,
        template: Template,
        today: NaiveDate,
    ) -> Result<PathBuf, ExportError> {
        if self.exporting.replace(true) {
            return Err(ExportError::Busy);
        }
        let _guard = ExportingGuard(&self.exporting);

        let result = self.run(invoice, template, today);
        match &result {
            Ok(pdf) => tracing::info!(path = %pdf.display(), %template, "invoice exported"),
            Err(err) => tracing::warn!(error = %err, %template, "invoice export failed"),
        }
        result
    }

    fn run(&self, invoice: &Invoice, template: Template, today: NaiveDate) -> Result<PathBuf, ExportError> {
        let totals = compute_totals(&invoice.items);
        let report = validate(invoice, &totals, today);
        if !report.is_valid() {
            return Err(ExportError::ValidationFailed {
                count: report.errors.len(),
            });
        }

        let source = template.render(invoice, &totals)?;

        fs::create_dir_all(&self.output_dir).map_err(|e| ExportError::io(&self.output_dir, e))?;
        let stem = export_file_stem(&invoice.header);
        let typ_path = self.output_dir.join(format!("{stem}.typ"));
        let pdf_path = self.output_dir.join(format!("{stem}.pdf"));

        fs::write(&typ_path, source).map_err(|e| ExportError::io(&typ_path, e))?;
        tracing::debug!(path = %typ_path.display(), "typst source written");

        self.compiler.compile(&typ_path, &pdf_path)?;
        Ok(pdf_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, LineItemId, Party};
    use std::cell::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCompiler {
        fail: bool,
    }

    impl DocumentCompiler for FakeCompiler {
        fn compile(&self, source: &Path, output: &Path) -> Result<(), ExportError> {
            if self.fail {
                return Err(ExportError::compile("error: unexpected end of file"));
            }
            assert!(source.exists());
            fs::write(output, b"%PDF-1.7").map_err(|e| ExportError::io(output, e))
        }
    }

    /// Starts a second export from inside the first one.
    struct ReentrantCompiler<'a> {
        exporter: &'a OnceCell<Exporter<ReentrantCompiler<'a>>>,
        saw_flag: Cell<bool>,
        refused: Cell<bool>,
    }

    impl DocumentCompiler for ReentrantCompiler<'_> {
        fn compile(&self, _source: &Path, output: &Path) -> Result<(), ExportError> {
            let Some(exporter) = self.exporter.get() else {
                return Err(ExportError::compile("exporter not installed"));
            };
            self.saw_flag.set(exporter.is_exporting());
            let nested = exporter.export(&invoice("Acme Corp", "Consulting Services"), Template::Minimal, today());
            self.refused.set(matches!(nested, Err(ExportError::Busy)));
            fs::write(output, b"%PDF-1.7").map_err(|e| ExportError::io(output, e))
        }
    }

    fn scratch_dir() -> PathBuf {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "invoice-desk-export-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn invoice(client: &str, description: &str) -> Invoice {
        Invoice {
            header: InvoiceHeader {
                client: Party::named(client),
                invoice_date: today(),
                ..InvoiceHeader::default()
            },
            items: vec![LineItem {
                id: LineItemId(1),
                description: description.to_string(),
                quantity: "10".into(),
                rate: "500".into(),
            }],
        }
    }

    #[test]
    fn file_stem_prefers_invoice_number() {
        let mut header = invoice("Acme Corp", "Consulting").header;
        assert_eq!(export_file_stem(&header), "invoice-2026-10-19-acme-corp");

        header.invoice_number = Some("INV/0042".to_string());
        assert_eq!(export_file_stem(&header), "invoice-inv-0042-acme-corp");

        header.client.name = "  ".to_string();
        assert_eq!(export_file_stem(&header), "invoice-inv-0042-client");
    }

    #[test]
    fn invalid_invoice_is_refused_before_rendering() {
        let dir = scratch_dir();
        let exporter = Exporter::new(FakeCompiler { fail: false }, &dir);

        let err = exporter
            .export(&invoice("", ""), Template::Minimal, today())
            .unwrap_err();
        assert!(matches!(err, ExportError::ValidationFailed { count: 2 }));
        assert!(!exporter.is_exporting());
        assert!(!dir.exists());
    }

    #[test]
    fn valid_invoice_produces_pdf() {
        let dir = scratch_dir();
        let exporter = Exporter::new(FakeCompiler { fail: false }, &dir);

        let pdf = exporter
            .export(&invoice("Acme Corp", "Consulting Services"), Template::Modern, today())
            .unwrap();
        assert_eq!(pdf, dir.join("invoice-2026-10-19-acme-corp.pdf"));
        assert!(pdf.exists());
        assert!(dir.join("invoice-2026-10-19-acme-corp.typ").exists());
        assert!(!exporter.is_exporting());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn warnings_do_not_block_export() {
        let dir = scratch_dir();
        let exporter = Exporter::new(FakeCompiler { fail: false }, &dir);

        // Short client name is only a warning.
        assert!(exporter.export(&invoice("A", "Consulting Services"), Template::Professional, today()).is_ok());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn compile_failure_resets_exporting_flag() {
        let dir = scratch_dir();
        let exporter = Exporter::new(FakeCompiler { fail: true }, &dir);

        let err = exporter
            .export(&invoice("Acme Corp", "Consulting Services"), Template::Professional, today())
            .unwrap_err();
        assert!(matches!(err, ExportError::Compile(_)));
        assert!(!exporter.is_exporting());

        // A retry goes through the same path rather than reporting busy.
        let err = exporter
            .export(&invoice("Acme Corp", "Consulting Services"), Template::Professional, today())
            .unwrap_err();
        assert!(matches!(err, ExportError::Compile(_)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn export_started_during_export_is_refused() {
        let dir = scratch_dir();
        let cell = OnceCell::new();
        let compiler = ReentrantCompiler {
            exporter: &cell,
            saw_flag: Cell::new(false),
            refused: Cell::new(false),
        };
        assert!(cell.set(Exporter::new(compiler, &dir)).is_ok());
        let exporter = cell.get().unwrap();

        let pdf = exporter
            .export(&invoice("Acme Corp", "Consulting Services"), Template::Professional, today())
            .unwrap();
        assert!(pdf.exists());
        assert!(exporter.compiler.saw_flag.get());
        assert!(exporter.compiler.refused.get());
        assert!(!exporter.is_exporting());
        fs::remove_dir_all(&dir).ok();
    }
}
