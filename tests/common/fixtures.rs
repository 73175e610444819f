//! Test fixtures and document builders.
//!
//! Provides builders for creating test PDFs and DOCX packages with specific
//! content, following the Builder pattern for clean test setup.

use anyhow::Result;
use printpdf::*;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builder for creating test PDFs, one text line per call.
///
/// Lines are written top-down with a fixed leading so that each one comes
/// back as its own span.
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    lines: Vec<String>,
    font_size: f32,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    /// Creates a new test PDF builder with default settings.
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            lines: Vec::new(),
            font_size: 11.0,
            page_width: Mm(210.0),  // A4 width
            page_height: Mm(297.0), // A4 height
        }
    }

    /// Sets the document title (metadata only).
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines.extend(lines.iter().map(|l| l.to_string()));
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    /// Builds the PDF in memory.
    pub fn build(self) -> Result<Vec<u8>> {
        let (doc, page1, layer1) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let current_layer = doc.get_page(page1).get_layer(layer1);

        if !self.lines.is_empty() {
            let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
            let mut y = self.page_height.0 - 25.0;
            for line in &self.lines {
                current_layer.use_text(line.as_str(), self.font_size, Mm(20.0), Mm(y), &font);
                y -= 10.0;
            }
        }

        Ok(doc.save_to_bytes()?)
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Payslip with a name, a NIR, an address, an email and amounts.
pub fn payslip_pdf() -> Result<Vec<u8>> {
    TestPdfBuilder::new()
        .with_title("Bulletin de paie")
        .with_lines(&[
            "BULLETIN DE PAIE - Janvier 2024",
            "XPERT-IA 3 avenue Magellan",
            "Salarie : Monsieur Jean DUPONT",
            "N SS : 1 85 05 78 006 084 91",
            "Adresse : 12 rue des Lilas 69003 LYON",
            "Contact : jean.dupont@exemple.fr",
            "Salaire de base 2 450,00 EUR",
            "Net a payer 1 910,00 EUR",
        ])
        .build()
}

/// Employment contract naming the employee and the employer company.
pub fn contract_pdf() -> Result<Vec<u8>> {
    TestPdfBuilder::new()
        .with_title("Contrat")
        .with_lines(&[
            "CONTRAT DE TRAVAIL A DUREE INDETERMINEE",
            "Entre la societe ACME SAS",
            "Et Madame Claire MARTIN",
            "Telephone : 06 12 34 56 78",
            "Fait pour servir et valoir ce que de droit.",
            "Signature du salarie",
        ])
        .build()
}

/// A page without any text layer, as a scanner would produce.
pub fn scanned_pdf() -> Result<Vec<u8>> {
    TestPdfBuilder::new().with_title("Scan").build()
}

/// Pipe-separated ledger export.
pub const LEDGER_EXPORT: &str = "JournalCode|JournalLib|EcritureNum|EcritureDate|CompteNum|CompteLib|CompAuxNum|CompAuxLib|PieceRef|PieceDate|EcritureLib|Debit|Credit\n\
VE|Ventes|1|20240105|4011000123|Fournisseurs|F001|DUPONT SARL|FA2024-001|20240105|Facture DUPONT SARL|0,00|1200,00\n\
VE|Ventes|2|20240106|4011000456|Fournisseurs|F002|MARTIN SAS|FA2024-002|20240106|Facture MARTIN SAS|0,00|800,00\n\
BQ|Banque|3|20240120|4011000123|Fournisseurs|F001|DUPONT SARL|VIR-0120|20240120|Reglement DUPONT SARL|1200,00|0,00\n";

/// Payroll declaration with one employee block.
pub const DECLARATION: &str = "S10.G00.00.001,'Logiciel Paie'\n\
S10.G00.01.003,'CABINET DURAND'\n\
S10.G00.02.002,'Paul DURAND'\n\
S10.G00.02.004,'paul.durand@cabinet.fr'\n\
S10.G00.02.005,'0478123456'\n\
S21.G00.06.001,'123456789'\n\
S21.G00.06.004,'12 RUE DE LA REPUBLIQUE'\n\
S21.G00.30.001,'185057800608491'\n\
S21.G00.30.002,'DUPONT'\n\
S21.G00.30.004,'JEAN'\n\
S21.G00.30.006,'15051985'\n\
S21.G00.30.008,'12 RUE DES LILAS'\n\
S21.G00.40.001,'20240101'\n";

/// Builder for minimal DOCX packages.
#[derive(Debug, Clone, Default)]
pub struct TestDocxBuilder {
    paragraphs: Vec<Vec<String>>,
    header: Option<String>,
    footnote: Option<String>,
    comment: Option<(String, String)>,
    properties: Option<(String, String)>,
}

impl TestDocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a paragraph made of one run.
    pub fn with_paragraph(mut self, text: &str) -> Self {
        self.paragraphs.push(vec![text.to_string()]);
        self
    }

    /// Adds a paragraph split over several runs.
    pub fn with_runs(mut self, runs: &[&str]) -> Self {
        self.paragraphs
            .push(runs.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn with_header(mut self, text: &str) -> Self {
        self.header = Some(text.to_string());
        self
    }

    pub fn with_footnote(mut self, text: &str) -> Self {
        self.footnote = Some(text.to_string());
        self
    }

    /// Adds a review comment signed by `author`.
    pub fn with_comment(mut self, author: &str, text: &str) -> Self {
        self.comment = Some((author.to_string(), text.to_string()));
        self
    }

    /// Adds `docProps/core.xml` with a title and a creator.
    pub fn with_properties(mut self, title: &str, creator: &str) -> Self {
        self.properties = Some((title.to_string(), creator.to_string()));
        self
    }

    pub fn build(self) -> Result<Vec<u8>> {
        let body: String = self
            .paragraphs
            .iter()
            .map(|runs| paragraph(runs))
            .collect();
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}<w:sectPr/></w:body></w:document>",
            body
        );

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(
            b"<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>",
        )?;
        zip.start_file("word/document.xml", options)?;
        zip.write_all(document.as_bytes())?;
        if let Some(header) = &self.header {
            let xml = format!(
                "<?xml version=\"1.0\"?><w:hdr xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">{}</w:hdr>",
                paragraph(&[header.clone()])
            );
            zip.start_file("word/header1.xml", options)?;
            zip.write_all(xml.as_bytes())?;
        }
        if let Some(note) = &self.footnote {
            let xml = format!(
                "<?xml version=\"1.0\"?><w:footnotes xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:footnote w:id=\"1\">{}</w:footnote></w:footnotes>",
                paragraph(&[note.clone()])
            );
            zip.start_file("word/footnotes.xml", options)?;
            zip.write_all(xml.as_bytes())?;
        }
        if let Some((author, text)) = &self.comment {
            let xml = format!(
                "<?xml version=\"1.0\"?><w:comments xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:comment w:id=\"0\" w:author=\"{}\" w:initials=\"JD\">{}</w:comment></w:comments>",
                anonymiseur::redaction::word::xml_escape(author),
                paragraph(&[text.clone()])
            );
            zip.start_file("word/comments.xml", options)?;
            zip.write_all(xml.as_bytes())?;
        }
        if let Some((title, creator)) = &self.properties {
            let xml = format!(
                "<?xml version=\"1.0\"?><cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\"><dc:title>{}</dc:title><dc:creator>{}</dc:creator><cp:lastModifiedBy>{}</cp:lastModifiedBy></cp:coreProperties>",
                anonymiseur::redaction::word::xml_escape(title),
                anonymiseur::redaction::word::xml_escape(creator),
                anonymiseur::redaction::word::xml_escape(creator),
            );
            zip.start_file("docProps/core.xml", options)?;
            zip.write_all(xml.as_bytes())?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

fn paragraph(runs: &[String]) -> String {
    let runs: String = runs
        .iter()
        .map(|t| {
            format!(
                "<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>",
                anonymiseur::redaction::word::xml_escape(t)
            )
        })
        .collect();
    format!("<w:p>{}</w:p>", runs)
}
