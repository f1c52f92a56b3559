//! PDF strategy report export.
//!
//! One centered title, then one labeled section per proposal field in
//! declaration order. Section titles are the field names with underscores
//! replaced and title-cased.
mod layout;

use crate::proposal::ProposalRecord;
use crate::util::{field_title, sanitize_file_stem, write_atomic};
use anyhow::{anyhow, Result};
use layout::{Align, Font, Layout, PlacedLine, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::path::Path;

const TITLE_SIZE_PT: f32 = 16.0;
const HEADING_SIZE_PT: f32 = 12.0;
const BODY_SIZE_PT: f32 = 11.0;
const LAYER_NAME: &str = "Report";

/// Default download name: `{location}_report.pdf`.
pub fn report_file_name(location: &str) -> String {
    format!("{}_report.pdf", sanitize_file_stem(location))
}

fn report_title(location: &str) -> String {
    format!("Strategy Report: {location}")
}

fn layout_report(record: &ProposalRecord, title: &str) -> Vec<Vec<PlacedLine>> {
    let mut layout = Layout::new();
    layout.cell(Font::Bold, TITLE_SIZE_PT, 10.0, Align::Center, title);
    layout.gap(10.0);
    for (name, value) in record.fields() {
        layout.cell(Font::Bold, HEADING_SIZE_PT, 10.0, Align::Left, &field_title(name));
        layout.paragraph(Font::Regular, BODY_SIZE_PT, 7.0, value);
        layout.gap(3.0);
    }
    layout.into_pages()
}

pub fn render_report(record: &ProposalRecord, location: &str) -> Result<Vec<u8>> {
    let title = report_title(location);
    let pages = layout_report(record, &title);

    let (doc, first_page, first_layer) = PdfDocument::new(
        title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| anyhow!("load Helvetica: {err}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| anyhow!("load Helvetica-Bold: {err}"))?;

    let mut targets = vec![(first_page, first_layer)];
    for _ in 1..pages.len() {
        targets.push(doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME));
    }
    for (lines, (page, layer)) in pages.iter().zip(targets) {
        let layer = doc.get_page(page).get_layer(layer);
        for line in lines {
            let font = match line.font {
                Font::Regular => &regular,
                Font::Bold => &bold,
            };
            layer.use_text(
                line.text.as_str(),
                line.size_pt,
                Mm(line.x_mm),
                Mm(PAGE_HEIGHT_MM - line.baseline_mm),
                font,
            );
        }
    }

    doc.save_to_bytes().map_err(|err| anyhow!("serialize report: {err}"))
}

pub fn write_report(path: &Path, record: &ProposalRecord, location: &str) -> Result<()> {
    let bytes = render_report(record, location)?;
    write_atomic(path, &bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "report written");
    Ok(())
}
