//! Writing rendered canvases to disk, dispatched on the file extension.

use crate::{CalibrationBoard, ExportError, MarkerRenderer, PdfExporter};
use calibkit_core::{PaperFormat, MM_PER_INCH};
use image::{GrayImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Output formats understood by [`save_canvas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    /// PNG with the print density stored in the `pHYs` chunk.
    Png,
    /// Any other raster format the `image` crate can encode.
    Raster(ImageFormat),
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let unsupported = || ExportError::UnsupportedExtension {
            path: path.to_path_buf(),
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(unsupported)?
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "png" => Ok(Self::Png),
            other => match ImageFormat::from_extension(other) {
                Some(fmt) if fmt.writing_enabled() => Ok(Self::Raster(fmt)),
                _ => Err(unsupported()),
            },
        }
    }
}

/// Write `canvas` to `path`. The parent directory must exist.
pub fn save_canvas(
    canvas: &GrayImage,
    path: &Path,
    paper: PaperFormat,
    dpi: u32,
) -> Result<(), ExportError> {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyCanvas { width, height });
    }
    match OutputFormat::from_path(path)? {
        OutputFormat::Pdf => {
            let bytes = PdfExporter::new().export(canvas, paper, dpi)?;
            std::fs::write(path, bytes)?;
        }
        OutputFormat::Png => write_png(canvas, path, dpi)?,
        OutputFormat::Raster(fmt) => canvas.save_with_format(path, fmt)?,
    }
    log::info!("wrote {}x{} canvas to {}", width, height, path.display());
    Ok(())
}

fn write_png(canvas: &GrayImage, path: &Path, dpi: u32) -> Result<(), ExportError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), canvas.width(), canvas.height());
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = (f64::from(dpi) * 1000.0 / MM_PER_INCH).round() as u32;
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(canvas.as_raw())?;
    writer.finish()?;
    Ok(())
}

impl CalibrationBoard {
    /// Render the board and write it to `path`; the extension selects the
    /// format. Marker boards need `renderer`.
    pub fn generate_to_file(
        &self,
        path: &Path,
        renderer: Option<&dyn MarkerRenderer>,
    ) -> Result<GrayImage, ExportError> {
        let canvas = self.generate_inner(renderer)?;
        save_canvas(&canvas, path, self.spec().paper(), self.spec().dpi())?;
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_dispatch() {
        assert_eq!(
            OutputFormat::from_path(Path::new("board.PDF")).unwrap(),
            OutputFormat::Pdf
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("out/board.png")).unwrap(),
            OutputFormat::Png
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("board.bmp")).unwrap(),
            OutputFormat::Raster(ImageFormat::Bmp)
        );
        for bad in ["board", "board.svg", "board.docx"] {
            assert!(matches!(
                OutputFormat::from_path(&PathBuf::from(bad)),
                Err(ExportError::UnsupportedExtension { .. })
            ));
        }
    }

    #[test]
    fn png_keeps_pixels_and_density() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let canvas = GrayImage::from_fn(6, 4, |x, _| image::Luma([if x < 3 { 0 } else { 255 }]));
        save_canvas(&canvas, &path, PaperFormat::A4, 300).unwrap();

        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back, canvas);

        let decoder = png::Decoder::new(std::io::BufReader::new(File::open(&path).unwrap()));
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
    }
}
