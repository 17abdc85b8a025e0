// Numan Thabit 2025
//! A4 PDF report with the embedded percentile graph.
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use printpdf::{
    image_crate::{DynamicImage, RgbImage},
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use tracing::info;

use crate::{
    config::EndpointSpec,
    error::RenderError,
    graph::{self, Raster, Series},
};

use super::{verdict, CLOSING, METHOD, PREAMBLE, TITLE};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 25.4;
const GRAPH_MM: f32 = 120.0;
const PT_TO_MM: f32 = 0.352_778;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;
const LAYER: &str = "Layer 1";

/// Renders the graph for every probed endpoint and writes the report to
/// `path`.
pub fn write_pdf(path: &Path, endpoints: &[EndpointSpec]) -> Result<(), RenderError> {
    let series: Vec<Series> = endpoints.iter().filter_map(Series::from_endpoint).collect();
    let raster = graph::render(&series)?;

    let file = File::create(path).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(file);
    compose(&mut out, endpoints, &raster)?;
    out.flush().map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "PDF report generated successfully");
    Ok(())
}

/// Lays out the document around an already rendered graph.
pub fn compose<W: Write>(
    out: &mut BufWriter<W>,
    endpoints: &[EndpointSpec],
    raster: &Raster,
) -> Result<(), RenderError> {
    let (doc, page, layer) =
        PdfDocument::new(TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER);
    let layer = doc.get_page(page).get_layer(layer);
    let mut pages = Pages::new(doc, layer)?;

    pages.paragraph(TITLE, 20.0, Face::Bold);
    pages.gap(4.0);
    pages.paragraph(PREAMBLE, 11.0, Face::Regular);
    pages.gap(3.0);
    pages.paragraph("Method", 14.0, Face::Bold);
    pages.paragraph(METHOD, 11.0, Face::Regular);
    pages.gap(3.0);

    pages.image(raster)?;
    pages.gap(3.0);

    pages.paragraph("Results", 14.0, Face::Bold);
    for endpoint in endpoints {
        pages.paragraph(&verdict(endpoint), 11.0, Face::Regular);
    }
    pages.gap(3.0);
    pages.paragraph(CLOSING, 11.0, Face::Italic);

    pages
        .doc
        .save(out)
        .map_err(|err| RenderError::Pdf(err.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum Face {
    Regular,
    Bold,
    Italic,
}

/// Top-down cursor over the document that starts a new page when the next
/// block does not fit.
struct Pages {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    cursor_mm: f32,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Pages {
    fn new(doc: PdfDocumentReference, layer: PdfLayerReference) -> Result<Self, RenderError> {
        let font = |face| {
            doc.add_builtin_font(face)
                .map_err(|err| RenderError::Pdf(err.to_string()))
        };
        let regular = font(BuiltinFont::Helvetica)?;
        let bold = font(BuiltinFont::HelveticaBold)?;
        let italic = font(BuiltinFont::HelveticaOblique)?;
        Ok(Self {
            doc,
            layer,
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
            regular,
            bold,
            italic,
        })
    }

    fn font(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Italic => &self.italic,
        }
    }

    fn reserve(&mut self, height_mm: f32) {
        if self.cursor_mm - height_mm >= MARGIN_MM {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    }

    fn gap(&mut self, mm: f32) {
        self.cursor_mm -= mm;
    }

    fn paragraph(&mut self, text: &str, size_pt: f32, face: Face) {
        let line_mm = size_pt * PT_TO_MM * 1.4;
        for line in wrap(text, chars_per_line(size_pt)) {
            self.reserve(line_mm);
            self.cursor_mm -= line_mm;
            let font = self.font(face).clone();
            self.layer
                .use_text(line, size_pt, Mm(MARGIN_MM), Mm(self.cursor_mm), &font);
        }
    }

    fn image(&mut self, raster: &Raster) -> Result<(), RenderError> {
        let rgb = RgbImage::from_raw(raster.width, raster.height, raster.pixels.clone())
            .ok_or_else(|| RenderError::Pdf("graph buffer does not match its size".into()))?;
        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(rgb));

        self.reserve(GRAPH_MM);
        self.cursor_mm -= GRAPH_MM;
        let dpi = raster.width as f32 * 25.4 / GRAPH_MM;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm((PAGE_WIDTH_MM - GRAPH_MM) / 2.0)),
                translate_y: Some(Mm(self.cursor_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        Ok(())
    }
}

fn chars_per_line(size_pt: f32) -> usize {
    let usable_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    (usable_mm / (size_pt * PT_TO_MM * GLYPH_WIDTH_EM)).floor().max(1.0) as usize
}

/// Greedy word wrap. A word longer than `width` gets a line of its own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
