//! Minimal PDF 1.4 writer: A4 pages, the three built-in Helvetica faces,
//! vector paths and RGB image XObjects. Coordinates are millimetres from the
//! top-left corner of the page.

use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::ZlibEncoder;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;

const PT_PER_MM: f64 = 72.0 / 25.4;
const BEZIER_CIRCLE: f64 = 0.552_284_749_8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Italic => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Self::Regular => "Helvetica",
            Self::Bold => "Helvetica-Bold",
            Self::Italic => "Helvetica-Oblique",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn components(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaintStyle {
    Fill,
    Stroke,
    FillStroke,
}

impl PaintStyle {
    fn operator(self, closed: bool) -> &'static str {
        match (self, closed) {
            (Self::Fill, _) => "f",
            (Self::Stroke, true) => "s",
            (Self::Stroke, false) => "S",
            (Self::FillStroke, _) => "b",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Decoded raster ready for embedding. `alpha` becomes a soft mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageHandle(usize);

fn fmt_num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let text = format!("{rounded:.3}");
        text.trim_end_matches('0').to_string()
    }
}

/// Zlib stream for `/Filter /FlateDecode`.
fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 4), Compression::default());
    encoder.write_all(data).context("failed to compress pdf stream")?;
    encoder.finish().context("failed to finish pdf stream")
}

fn x_pt(x_mm: f64) -> f64 {
    x_mm * PT_PER_MM
}

fn y_pt(y_mm: f64) -> f64 {
    (PAGE_HEIGHT_MM - y_mm) * PT_PER_MM
}

/// Maps a char to its WinAnsiEncoding byte, if it has one.
fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => match ch {
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2026}' => Some(0x85),
            '\u{20AC}' => Some(0x80),
            _ => None,
        },
    }
}

/// Encodes text as a PDF literal string body in WinAnsiEncoding.
/// Characters without a WinAnsi code become `?`.
pub fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let byte = win_ansi_byte(ch).unwrap_or(b'?');
        match byte {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7E => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out
}

// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

fn base_letter(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'ê' | 'è' => 'e',
        'É' | 'Ê' | 'È' => 'E',
        'í' | 'ì' | 'î' => 'i',
        'Í' | 'Ì' | 'Î' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        other => other,
    }
}

/// Approximate rendered width of `text` in millimetres.
pub fn text_width_mm(text: &str, font: Font, size_pt: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|ch| {
            let ch = base_letter(ch);
            let code = ch as u32;
            if (0x20..=0x7E).contains(&code) {
                u32::from(HELVETICA_WIDTHS[(code - 0x20) as usize])
            } else {
                556
            }
        })
        .sum();
    let scale = if font == Font::Bold { 1.06 } else { 1.0 };
    f64::from(units) * scale * size_pt / 1000.0 / PT_PER_MM
}

/// Greedy word wrap to `width_mm`. Words wider than a line stay whole.
pub fn wrap_words(text: &str, font: Font, size_pt: f64, width_mm: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if !current.is_empty() && text_width_mm(&candidate, font, size_pt) > width_mm {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Drawing operations for one page.
#[derive(Debug, Default)]
pub struct Canvas {
    ops: String,
    images_used: Vec<usize>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_color(&mut self, color: Rgb) {
        let (r, g, b) = color.components();
        let _ = writeln!(self.ops, "{} {} {} rg", fmt_num(r), fmt_num(g), fmt_num(b));
    }

    pub fn stroke_color(&mut self, color: Rgb) {
        let (r, g, b) = color.components();
        let _ = writeln!(self.ops, "{} {} {} RG", fmt_num(r), fmt_num(g), fmt_num(b));
    }

    pub fn line_width(&mut self, width_mm: f64) {
        let _ = writeln!(self.ops, "{} w", fmt_num(width_mm * PT_PER_MM));
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: PaintStyle) {
        let _ = writeln!(
            self.ops,
            "{} {} {} {} re {}",
            fmt_num(x_pt(x)),
            fmt_num(y_pt(y + h)),
            fmt_num(w * PT_PER_MM),
            fmt_num(h * PT_PER_MM),
            style.operator(false)
        );
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let _ = writeln!(
            self.ops,
            "{} {} m {} {} l S",
            fmt_num(x_pt(x1)),
            fmt_num(y_pt(y1)),
            fmt_num(x_pt(x2)),
            fmt_num(y_pt(y2))
        );
    }

    pub fn circle(&mut self, cx: f64, cy: f64, radius: f64, style: PaintStyle) {
        let (cx, cy, r) = (x_pt(cx), y_pt(cy), radius * PT_PER_MM);
        let k = r * BEZIER_CIRCLE;
        let segments = [
            ((cx + r, cy + k), (cx + k, cy + r), (cx, cy + r)),
            ((cx - k, cy + r), (cx - r, cy + k), (cx - r, cy)),
            ((cx - r, cy - k), (cx - k, cy - r), (cx, cy - r)),
            ((cx + k, cy - r), (cx + r, cy - k), (cx + r, cy)),
        ];
        let _ = writeln!(self.ops, "{} {} m", fmt_num(cx + r), fmt_num(cy));
        for ((x1, y1), (x2, y2), (x3, y3)) in segments {
            let _ = writeln!(
                self.ops,
                "{} {} {} {} {} {} c",
                fmt_num(x1),
                fmt_num(y1),
                fmt_num(x2),
                fmt_num(y2),
                fmt_num(x3),
                fmt_num(y3)
            );
        }
        let _ = writeln!(self.ops, "h {}", style.operator(true));
    }

    /// Draws `text` with its baseline at `y`.
    pub fn text(&mut self, x: f64, y: f64, font: Font, size_pt: f64, color: Rgb, text: &str) {
        self.fill_color(color);
        let _ = writeln!(
            self.ops,
            "BT /{} {} Tf {} {} Td ({}) Tj ET",
            font.resource(),
            fmt_num(size_pt),
            fmt_num(x_pt(x)),
            fmt_num(y_pt(y)),
            encode_text(text)
        );
    }

    /// Single-line text inside a box of width `w`, optionally centred.
    #[allow(clippy::too_many_arguments)]
    pub fn text_in_box(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        font: Font,
        size_pt: f64,
        color: Rgb,
        align: Align,
        text: &str,
    ) {
        let offset = match align {
            Align::Left => 1.5,
            Align::Center => ((w - text_width_mm(text, font, size_pt)) / 2.0).max(0.0),
        };
        self.text(x + offset, y, font, size_pt, color, text);
    }

    /// Text rotated counter-clockwise by `degrees` around its start point.
    #[allow(clippy::too_many_arguments)]
    pub fn rotated_text(
        &mut self,
        x: f64,
        y: f64,
        degrees: f64,
        font: Font,
        size_pt: f64,
        color: Rgb,
        text: &str,
    ) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.fill_color(color);
        let _ = writeln!(
            self.ops,
            "BT /{} {} Tf {} {} {} {} {} {} Tm ({}) Tj ET",
            font.resource(),
            fmt_num(size_pt),
            fmt_num(cos),
            fmt_num(sin),
            fmt_num(-sin),
            fmt_num(cos),
            fmt_num(x_pt(x)),
            fmt_num(y_pt(y)),
            encode_text(text)
        );
    }

    pub fn image(&mut self, handle: ImageHandle, x: f64, y: f64, w: f64, h: f64) {
        if !self.images_used.contains(&handle.0) {
            self.images_used.push(handle.0);
        }
        let _ = writeln!(
            self.ops,
            "q {} 0 0 {} {} {} cm /Im{} Do Q",
            fmt_num(w * PT_PER_MM),
            fmt_num(h * PT_PER_MM),
            fmt_num(x_pt(x)),
            fmt_num(y_pt(y + h)),
            handle.0 + 1
        );
    }
}

/// A document assembled page by page and serialized in one pass.
#[derive(Debug)]
pub struct PdfDocument {
    title: String,
    created_at: DateTime<Local>,
    images: Vec<RasterImage>,
    pages: Vec<Canvas>,
}

struct ObjectWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl ObjectWriter {
    fn begin(&mut self, id: usize) {
        if self.offsets.len() < id {
            self.offsets.resize(id, 0);
        }
        self.offsets[id - 1] = self.out.len();
        self.out.extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    }

    fn dict(&mut self, id: usize, body: &str) {
        self.begin(id);
        self.out.extend_from_slice(body.as_bytes());
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, dict_entries: &str, data: &[u8]) {
        self.begin(id);
        self.out.extend_from_slice(
            format!("<< {dict_entries} /Length {} >>\nstream\n", data.len()).as_bytes(),
        );
        self.out.extend_from_slice(data);
        self.out.extend_from_slice(b"\nendstream\nendobj\n");
    }
}

impl PdfDocument {
    pub fn new(title: &str, created_at: DateTime<Local>) -> Self {
        Self {
            title: title.to_string(),
            created_at,
            images: Vec::new(),
            pages: Vec::new(),
        }
    }

    pub fn add_image(&mut self, image: RasterImage) -> ImageHandle {
        self.images.push(image);
        ImageHandle(self.images.len() - 1)
    }

    pub fn push_page(&mut self, page: Canvas) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // 1 catalog, 2 pages, 3..=5 fonts, 6 info, then images (+ masks), then page/content pairs
        let mut image_ids = Vec::with_capacity(self.images.len());
        let mut next_id = 7;
        for image in &self.images {
            let mask_id = image.alpha.as_ref().map(|_| next_id + 1);
            image_ids.push((next_id, mask_id));
            next_id += if mask_id.is_some() { 2 } else { 1 };
        }
        let page_ids: Vec<(usize, usize)> = (0..self.pages.len())
            .map(|index| (next_id + index * 2, next_id + index * 2 + 1))
            .collect();

        let mut writer = ObjectWriter {
            out: b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec(),
            offsets: Vec::new(),
        };

        writer.dict(1, "<< /Type /Catalog /Pages 2 0 R >>");
        let kids: Vec<String> = page_ids.iter().map(|(page, _)| format!("{page} 0 R")).collect();
        writer.dict(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_ids.len()
            ),
        );
        for (id, font) in [(3, Font::Regular), (4, Font::Bold), (5, Font::Italic)] {
            writer.dict(
                id,
                &format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    font.base_font()
                ),
            );
        }
        writer.dict(
            6,
            &format!(
                "<< /Title ({}) /Producer ({} {}) /CreationDate (D:{}) >>",
                encode_text(&self.title),
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                self.created_at.format("%Y%m%d%H%M%S")
            ),
        );

        for (image, (image_id, mask_id)) in self.images.iter().zip(&image_ids) {
            let mut entries = format!(
                "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode",
                image.width, image.height
            );
            if let Some(mask_id) = mask_id {
                let _ = write!(entries, " /SMask {mask_id} 0 R");
            }
            writer.stream(*image_id, &entries, &deflate(&image.rgb)?);

            if let (Some(mask_id), Some(alpha)) = (mask_id, &image.alpha) {
                let mask_entries = format!(
                    "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode",
                    image.width, image.height
                );
                writer.stream(*mask_id, &mask_entries, &deflate(alpha)?);
            }
        }

        for (page, (page_id, content_id)) in self.pages.iter().zip(&page_ids) {
            let xobjects: Vec<String> = page
                .images_used
                .iter()
                .map(|index| format!("/Im{} {} 0 R", index + 1, image_ids[*index].0))
                .collect();
            writer.dict(
                *page_id,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R /F3 5 0 R >> /XObject << {} >> >> \
                     /Contents {content_id} 0 R >>",
                    fmt_num(PAGE_WIDTH_MM * PT_PER_MM),
                    fmt_num(PAGE_HEIGHT_MM * PT_PER_MM),
                    xobjects.join(" ")
                ),
            );
            writer.stream(*content_id, "", page.ops.as_bytes());
        }

        let xref_offset = writer.out.len();
        let object_count = writer.offsets.len();
        let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
        for offset in &writer.offsets {
            let _ = writeln!(trailer, "{offset:010} 00000 n ");
        }
        let _ = write!(
            trailer,
            "trailer\n<< /Size {} /Root 1 0 R /Info 6 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            object_count + 1
        );
        writer.out.extend_from_slice(trailer.as_bytes());

        Ok(writer.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_text_escapes_delimiters_and_maps_latin1() {
        assert_eq!(encode_text("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(encode_text("Ação"), "A\\347\\343o");
        assert_eq!(encode_text("日"), "?");
    }

    #[test]
    fn fmt_num_trims_trailing_zeros() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(1.23456), "1.235");
        assert_eq!(fmt_num(-0.25), "-0.25");
    }

    #[test]
    fn wrap_words_respects_width() {
        let text = "Carga Final de Dados, Escala Apoio Go Live, Metas de Simulação";
        let lines = wrap_words(text, Font::Regular, 7.0, 40.0);
        assert!(lines.len() > 1);
        assert!(lines
            .iter()
            .all(|line| text_width_mm(line, Font::Regular, 7.0) <= 40.0 || !line.contains(' ')));
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let mut document = PdfDocument::new("Test", Local::now());
        let mut page = Canvas::new();
        page.text(10.0, 10.0, Font::Bold, 12.0, Rgb(0, 0, 0), "Hello");
        document.push_page(page);
        let bytes = document.to_bytes().expect("serialize");
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));

        let xref_start = text.find("xref\n").expect("xref present");
        let entries: Vec<usize> = text[xref_start..]
            .lines()
            .skip(3)
            .take_while(|line| line.ends_with(" n "))
            .map(|line| line[..10].parse().expect("offset"))
            .collect();
        assert_eq!(entries.len(), 8);
        for (index, offset) in entries.iter().enumerate() {
            let header = format!("{} 0 obj", index + 1);
            assert!(bytes[*offset..].starts_with(header.as_bytes()), "object {}", index + 1);
        }
    }

    #[test]
    fn images_with_alpha_get_a_soft_mask() {
        let mut document = PdfDocument::new("Logo", Local::now());
        let handle = document.add_image(RasterImage {
            width: 1,
            height: 1,
            rgb: vec![255, 0, 0],
            alpha: Some(vec![128]),
        });
        let mut page = Canvas::new();
        page.image(handle, 0.0, 0.0, 10.0, 10.0);
        document.push_page(page);

        let text = String::from_utf8_lossy(&document.to_bytes().expect("serialize")).into_owned();
        assert!(text.contains("/SMask 8 0 R"));
        assert!(text.contains("/Im1 7 0 R"));
        assert!(text.contains("/Im1 Do"));
    }

    #[test]
    fn image_streams_are_deflated_and_restorable() {
        use std::io::Read;

        let rgb: Vec<u8> = std::iter::repeat_n([20u8, 50, 100], 64 * 64).flatten().collect();
        let mut document = PdfDocument::new("Chart", Local::now());
        let handle = document.add_image(RasterImage {
            width: 64,
            height: 64,
            rgb: rgb.clone(),
            alpha: None,
        });
        let mut page = Canvas::new();
        page.image(handle, 0.0, 0.0, 10.0, 10.0);
        document.push_page(page);

        let bytes = document.to_bytes().expect("serialize");
        assert!(bytes.len() < rgb.len());

        let header = b"/Filter /FlateDecode /Length ";
        let start = bytes
            .windows(header.len())
            .position(|window| window == header)
            .expect("image dictionary");
        let after_header = &bytes[start + header.len()..];
        let digits: String = after_header
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .map(|byte| char::from(*byte))
            .collect();
        let length: usize = digits.parse().expect("stream length");
        let data_start = start + header.len() + digits.len() + " >>\nstream\n".len();

        let mut restored = Vec::new();
        flate2::read::ZlibDecoder::new(&bytes[data_start..data_start + length])
            .read_to_end(&mut restored)
            .expect("inflate");
        assert_eq!(restored, rgb);
    }
}
