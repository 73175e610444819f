//! Signature masking on rendered pages.
//!
//! Pages are rasterized with MuPDF and handed to a [`SignatureDetector`].
//! Regions above the confidence threshold are painted over; when at least one
//! page had a detection, the whole document is rebuilt from the page images
//! with `printpdf`, a caption written over each masked region.

use crate::classifier::DetectionError;
use crate::domain::BBox;
use crate::error::{AnonymizerError, AnonymizerResult};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use mupdf::pdf::PdfDocument as MuPdfDocument;
use mupdf::{Colorspace, Matrix};
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};
use serde::Deserialize;
use std::process::Command;
use tracing::{debug, info};

pub const DEFAULT_CAPTION: &str = "Signature masquée";

/// One region located by a detector, in pixels of the rendered page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Detection {
    #[serde(deserialize_with = "bbox_from_array")]
    pub bbox: BBox,
    pub confidence: f32,
    #[serde(default = "default_class")]
    pub class: String,
}

fn default_class() -> String {
    "signature".to_string()
}

fn bbox_from_array<'de, D>(deserializer: D) -> Result<BBox, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let [x0, y0, x1, y1] = <[f32; 4]>::deserialize(deserializer)?;
    Ok(BBox::new(x0, y0, x1, y1))
}

/// Locates signature-like regions in a page image.
pub trait SignatureDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError>;

    fn name(&self) -> &str;
}

/// Never detects anything.
#[derive(Debug, Clone, Default)]
pub struct NullSignatureDetector;

impl SignatureDetector for NullSignatureDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Runs an external detector on a PNG file.
///
/// The image path is appended to the command line; the command prints a JSON
/// array of `{"bbox": [x0, y0, x1, y1], "confidence": .., "class": ..}`.
#[derive(Debug, Clone)]
pub struct CommandSignatureDetector {
    command: Vec<String>,
}

impl CommandSignatureDetector {
    pub fn new(command: Vec<String>) -> Result<Self, DetectionError> {
        if command.is_empty() {
            return Err(DetectionError::Unavailable(
                "empty detector command".to_string(),
            ));
        }
        Ok(Self { command })
    }
}

impl SignatureDetector for CommandSignatureDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, DetectionError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.png");
        image
            .save(&path)
            .map_err(|e| DetectionError::Unavailable(format!("cannot write page image: {}", e)))?;

        let output = Command::new(&self.command[0])
            .args(&self.command[1..])
            .arg(&path)
            .output()?;
        if !output.status.success() {
            return Err(DetectionError::Unavailable(format!(
                "{} exited with {}: {}",
                self.command[0],
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| DetectionError::Malformed(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.command[0]
    }
}

/// Result of the signature pass.
#[derive(Debug, Clone)]
pub struct SignatureOutcome {
    pub bytes: Vec<u8>,
    /// Regions masked across all pages
    pub detections: usize,
    /// True when the document was rebuilt from page images
    pub image_backed: bool,
}

struct RenderedPage {
    image: RgbImage,
    width_pt: f32,
    height_pt: f32,
    regions: Vec<BBox>,
}

/// Paints `regions` over `image` with an opaque fill and a frame.
pub fn mask_regions(image: &mut RgbImage, regions: &[BBox]) {
    let (width, height) = image.dimensions();
    for region in regions {
        let x0 = region.x0.max(0.0) as i32;
        let y0 = region.y0.max(0.0) as i32;
        let x1 = region.x1.min(width as f32) as i32;
        let y1 = region.y1.min(height as f32) as i32;
        if x1 <= x0 || y1 <= y0 {
            continue;
        }
        let rect = Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32);
        draw_filled_rect_mut(image, rect, Rgb([235, 235, 235]));
        draw_hollow_rect_mut(image, rect, Rgb([90, 90, 90]));
    }
}

/// Masks signatures of a PDF.
pub struct SignatureMasker {
    detector: Box<dyn SignatureDetector>,
    threshold: f32,
    zoom: f32,
    caption: String,
}

impl SignatureMasker {
    pub fn new(detector: Box<dyn SignatureDetector>) -> Self {
        Self {
            detector,
            threshold: 0.5,
            zoom: 2.0,
            caption: DEFAULT_CAPTION.to_string(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Detections of `image` kept by the threshold.
    pub fn regions(&self, image: &RgbImage) -> AnonymizerResult<Vec<BBox>> {
        let detections = self
            .detector
            .detect(image)
            .map_err(|e| AnonymizerError::Detection {
                stage: "signature detection".to_string(),
                reason: e.to_string(),
            })?;
        Ok(detections
            .into_iter()
            .filter(|d| d.confidence >= self.threshold)
            .map(|d| d.bbox)
            .collect())
    }

    /// Returns the input unchanged when nothing is found, otherwise an
    /// image-backed rebuild with every detected region masked.
    pub fn mask(&self, pdf: &[u8]) -> AnonymizerResult<SignatureOutcome> {
        let pages = self.render_pages(pdf)?;
        let detections: usize = pages.iter().map(|p| p.regions.len()).sum();
        if detections == 0 {
            debug!(detector = self.detector.name(), "No signature detected");
            return Ok(SignatureOutcome {
                bytes: pdf.to_vec(),
                detections: 0,
                image_backed: false,
            });
        }

        let bytes = self.rebuild(pages)?;
        info!(detections, "Signatures masked, document rebuilt from images");
        Ok(SignatureOutcome {
            bytes,
            detections,
            image_backed: true,
        })
    }

    fn render_pages(&self, pdf: &[u8]) -> AnonymizerResult<Vec<RenderedPage>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("signed.pdf");
        std::fs::write(&path, pdf).map_err(|e| AnonymizerError::Io {
            path: path.clone(),
            source: e,
        })?;
        let path_str = path.to_str().ok_or_else(|| AnonymizerError::InvalidInput {
            parameter: "input".to_string(),
            reason: "Path contains invalid UTF-8".to_string(),
        })?;

        let doc = MuPdfDocument::open(path_str)
            .map_err(|e| AnonymizerError::mupdf("Failed to open PDF for rendering", e))?;
        let page_count = doc
            .page_count()
            .map_err(|e| AnonymizerError::mupdf("Failed to get page count", e))?;
        let matrix = Matrix::new_scale(self.zoom, self.zoom);

        let mut pages = Vec::with_capacity(page_count as usize);
        for page_idx in 0..page_count {
            let page = doc
                .load_page(page_idx)
                .map_err(|e| AnonymizerError::PdfProcessing {
                    message: format!("Failed to load page {}", page_idx + 1),
                    page: Some(page_idx as usize + 1),
                    source: Some(Box::new(e)),
                })?;
            let bounds = page
                .bounds()
                .map_err(|e| AnonymizerError::mupdf("Failed to get page bounds", e))?;
            let pixmap = page
                .to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)
                .map_err(|e| AnonymizerError::PdfProcessing {
                    message: "Failed to render page".to_string(),
                    page: Some(page_idx as usize + 1),
                    source: Some(Box::new(e)),
                })?;

            let width = pixmap.width() as usize;
            let height = pixmap.height() as usize;
            let n = pixmap.n() as usize;
            let stride = pixmap.stride() as usize;
            let samples = pixmap.samples();
            let mut rgb = Vec::with_capacity(width * height * 3);
            for row in 0..height {
                let line = &samples[row * stride..row * stride + width * n];
                for px in line.chunks(n) {
                    rgb.extend_from_slice(&px[..3]);
                }
            }
            let image = RgbImage::from_raw(width as u32, height as u32, rgb).ok_or_else(|| {
                AnonymizerError::PdfProcessing {
                    message: "Rendered page has an unexpected sample layout".to_string(),
                    page: Some(page_idx as usize + 1),
                    source: None,
                }
            })?;

            let regions = self.regions(&image)?;
            debug!(page = page_idx + 1, regions = regions.len(), "Signature detection");
            pages.push(RenderedPage {
                image,
                width_pt: bounds.x1 - bounds.x0,
                height_pt: bounds.y1 - bounds.y0,
                regions,
            });
        }
        Ok(pages)
    }

    fn rebuild(&self, pages: Vec<RenderedPage>) -> AnonymizerResult<Vec<u8>> {
        let pt_to_mm = |pt: f32| Mm(pt * 25.4 / 72.0);
        let first = pages.first().ok_or_else(|| AnonymizerError::PdfProcessing {
            message: "Document has no pages".to_string(),
            page: None,
            source: None,
        })?;

        let (doc, first_page, first_layer) = PdfDocument::new(
            "Document anonymisé",
            pt_to_mm(first.width_pt),
            pt_to_mm(first.height_pt),
            "Page",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(printpdf_error)?;

        for (index, mut page) in pages.into_iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (p, l) = doc.add_page(pt_to_mm(page.width_pt), pt_to_mm(page.height_pt), "Page");
                doc.get_page(p).get_layer(l)
            };

            mask_regions(&mut page.image, &page.regions);
            Image::from_dynamic_image(&DynamicImage::ImageRgb8(page.image)).add_to_layer(
                layer.clone(),
                ImageTransform {
                    dpi: Some(72.0 * self.zoom),
                    ..Default::default()
                },
            );

            for region in &page.regions {
                let region = region.scaled(1.0 / self.zoom);
                let size = (region.height() * 0.4).clamp(6.0, 12.0);
                let baseline = page.height_pt - region.y1 + (region.height() - size) / 2.0;
                layer.use_text(
                    self.caption.as_str(),
                    size,
                    pt_to_mm(region.x0 + 4.0),
                    pt_to_mm(baseline),
                    &font,
                );
            }
        }

        doc.save_to_bytes().map_err(printpdf_error)
    }
}

fn printpdf_error(e: printpdf::Error) -> AnonymizerError {
    AnonymizerError::BackendError {
        backend: "printpdf".to_string(),
        message: e.to_string(),
        source: None,
    }
}

impl std::fmt::Debug for SignatureMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureMasker")
            .field("detector", &self.detector.name())
            .field("threshold", &self.threshold)
            .field("zoom", &self.zoom)
            .field("caption", &self.caption)
            .finish()
    }
}
