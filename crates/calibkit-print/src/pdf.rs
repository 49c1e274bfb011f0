//! Single-page PDF export of a rendered canvas.
//!
//! The page has the physical size of the paper format and the canvas is drawn
//! edge to edge, so printing at 100% scale reproduces the board in millimetres.
//! The bitmap is embedded as one Flate-compressed 8-bit `DeviceGray` image.

use crate::ExportError;
use calibkit_core::PaperFormat;
use flate2::{write::ZlibEncoder, Compression};
use image::GrayImage;
use std::io::Write;

#[cfg(feature = "tracing")]
use tracing::instrument;

const PRODUCER: &str = concat!("calibkit ", env!("CARGO_PKG_VERSION"));

/// Writes canvases as single-page PDF documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfExporter {
    compression: Option<u32>,
}

impl PdfExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zlib level 0-9 for the image stream. Defaults to the flate2 default.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Some(level.min(9));
        self
    }

    /// Encode `canvas` on a page of `paper`'s physical size.
    ///
    /// `dpi` is recorded for logging only; the page size comes from the paper
    /// format, not from the bitmap.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, canvas), fields(w = canvas.width(), h = canvas.height()))
    )]
    pub fn export(
        &self,
        canvas: &GrayImage,
        paper: PaperFormat,
        dpi: u32,
    ) -> Result<Vec<u8>, ExportError> {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return Err(ExportError::EmptyCanvas { width, height });
        }
        let (page_w, page_h) = paper.size_points();

        let level = self
            .compression
            .map(Compression::new)
            .unwrap_or_default();
        let mut encoder = ZlibEncoder::new(Vec::new(), level);
        encoder.write_all(canvas.as_raw())?;
        let image_data = encoder.finish()?;

        let content = format!("q\n{page_w:.2} 0 0 {page_h:.2} 0 0 cm\n/Im0 Do\nQ\n");

        let mut doc = PdfDocument::new();
        doc.object(b"<< /Type /Catalog /Pages 2 0 R >>");
        doc.object(b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
        doc.object(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {page_w:.2} {page_h:.2}] \
                 /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>"
            )
            .as_bytes(),
        );
        doc.stream(
            &format!(
                "/Type /XObject /Subtype /Image /Width {width} /Height {height} \
                 /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode"
            ),
            &image_data,
        );
        doc.stream("", content.as_bytes());
        doc.object(format!("<< /Producer ({PRODUCER}) >>").as_bytes());
        let bytes = doc.finish(1, 6);

        log::debug!(
            "pdf: {width}x{height}px canvas on {paper} ({page_w:.2}x{page_h:.2}pt) at {dpi} dpi, {} bytes",
            bytes.len()
        );
        Ok(bytes)
    }

    /// Same as [`PdfExporter::export`] with the paper format given by name.
    pub fn export_named(
        &self,
        canvas: &GrayImage,
        paper: &str,
        dpi: u32,
    ) -> Result<Vec<u8>, ExportError> {
        let paper = PaperFormat::from_name(paper)?;
        self.export(canvas, paper, dpi)
    }
}

/// Append-only object writer that records byte offsets for the xref table.
struct PdfDocument {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfDocument {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n");
        // Binary marker so transfer tools treat the file as binary.
        buf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn begin(&mut self) -> usize {
        self.offsets.push(self.buf.len());
        let id = self.offsets.len();
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n").as_bytes());
        id
    }

    fn object(&mut self, body: &[u8]) -> usize {
        let id = self.begin();
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        id
    }

    fn stream(&mut self, dict: &str, data: &[u8]) -> usize {
        let id = self.begin();
        let sep = if dict.is_empty() { "" } else { " " };
        self.buf.extend_from_slice(
            format!("<< {dict}{sep}/Length {} >>\nstream\n", data.len()).as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        id
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        let xref_at = self.buf.len();
        let size = self.offsets.len() + 1;
        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {size} /Root {root} 0 R /Info {info} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibkit_core::white_image;

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
    }

    #[test]
    fn page_matches_paper_size() {
        let canvas = white_image(595, 841);
        let pdf = PdfExporter::new()
            .export(&canvas, PaperFormat::A4, 72)
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert!(find(&pdf, b"/MediaBox [0 0 595.28 841.89]").is_some());
        assert!(find(&pdf, b"/Width 595 /Height 841").is_some());
        assert!(find(&pdf, b"595.28 0 0 841.89 0 0 cm").is_some());
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let canvas = white_image(10, 12);
        let pdf = PdfExporter::new()
            .export(&canvas, PaperFormat::Letter, 300)
            .unwrap();
        let marker = b"startxref\n";
        let at = pdf
            .windows(marker.len())
            .rposition(|w| w == marker)
            .unwrap()
            + marker.len();
        let tail = std::str::from_utf8(&pdf[at..]).unwrap();
        let xref_at: usize = tail.lines().next().unwrap().parse().unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref\n0 7\n"));

        let table = std::str::from_utf8(&pdf[xref_at..]).unwrap();
        for (i, line) in table.lines().skip(3).take(6).enumerate() {
            let offset: usize = line[..10].parse().unwrap();
            let header = format!("{} 0 obj", i + 1);
            assert!(pdf[offset..].starts_with(header.as_bytes()), "object {}", i + 1);
        }
    }

    #[test]
    fn empty_canvas_and_unknown_paper_are_rejected() {
        let exporter = PdfExporter::new();
        assert!(matches!(
            exporter.export(&GrayImage::new(0, 5), PaperFormat::A4, 300),
            Err(ExportError::EmptyCanvas { .. })
        ));
        assert!(matches!(
            exporter.export_named(&white_image(4, 4), "B5", 300),
            Err(ExportError::UnknownPaper(_))
        ));
    }
}
