use anyhow::Result;

use super::assets::QrMatrix;
use super::chart::{ProgressMarker, render_radar, sparkline_positions, spoke_angle, spoke_point};
use super::pdf::{
    Align, Canvas, Font, ImageHandle, PAGE_WIDTH_MM, PaintStyle, PdfDocument, RasterImage, Rgb,
    text_width_mm, wrap_words,
};
use super::{ReportOptions, ReportOutline};
use crate::methodology::Phase;

const NAVY: Rgb = Rgb(20, 50, 100);
const AMBER: Rgb = Rgb(255, 179, 14);
const WHITE: Rgb = Rgb(255, 255, 255);
const GRID_FILL: Rgb = Rgb(245, 245, 245);
const PENDING_FILL: Rgb = Rgb(255, 243, 205);
const BODY_TEXT: Rgb = Rgb(60, 60, 60);
const MUTED: Rgb = Rgb(150, 150, 150);
const RULE: Rgb = Rgb(205, 205, 205);
const WATERMARK: Rgb = Rgb(242, 242, 242);

const MARGIN: f64 = 10.0;
const CONTENT_WIDTH: f64 = PAGE_WIDTH_MM - 2.0 * MARGIN;
const CONTENT_TOP: f64 = 42.0;
const CONTENT_BOTTOM: f64 = 280.0;
const LINE_STEP: f64 = 3.5;

const RADAR_CENTER_X: f64 = 58.0;
const RADAR_RADIUS: f64 = 30.0;
const RADAR_SIDE: f64 = 2.0 * (RADAR_RADIUS + 2.0);
const FIELD_LINE_STEP: f64 = 3.4;

struct Logo {
    handle: ImageHandle,
    aspect: f64,
}

/// Lays out pages top to bottom, starting a new page when content runs out.
struct PageFlow<'a> {
    outline: &'a ReportOutline,
    options: &'a ReportOptions,
    document: PdfDocument,
    logo: Option<Logo>,
    page: Canvas,
    y: f64,
}

impl<'a> PageFlow<'a> {
    fn new(
        outline: &'a ReportOutline,
        options: &'a ReportOptions,
        logo: Option<RasterImage>,
    ) -> Self {
        let mut document = PdfDocument::new(&outline.title, options.generated_at);
        let logo = logo.map(|image| {
            let aspect = f64::from(image.height) / f64::from(image.width.max(1));
            Logo {
                handle: document.add_image(image),
                aspect,
            }
        });

        let mut flow = Self {
            outline,
            options,
            document,
            logo,
            page: Canvas::new(),
            y: CONTENT_TOP,
        };
        flow.draw_frame();
        flow
    }

    fn draw_frame(&mut self) {
        if self.options.watermark {
            self.page.rotated_text(
                38.0,
                235.0,
                45.0,
                Font::Bold,
                50.0,
                WATERMARK,
                "C O N F I D E N C I A L",
            );
        }

        self.page.fill_color(NAVY);
        self.page.rect(0.0, 0.0, PAGE_WIDTH_MM, 35.0, PaintStyle::Fill);
        if let Some(logo) = &self.logo {
            let width = 18.0;
            let height = (width * logo.aspect).min(24.0);
            self.page.image(logo.handle, MARGIN, 8.0, width, height);
        }
        self.page.text_in_box(
            30.0,
            19.5,
            150.0,
            Font::Bold,
            15.0,
            WHITE,
            Align::Center,
            &self.outline.title,
        );
    }

    fn draw_footer(&mut self) {
        let page_number = self.document.page_count() + 1;
        let short_digest: String = self.outline.digest.chars().take(16).collect();
        let footer = format!(
            "Gerado em {} | Verificação {} | Página {}",
            self.options.generated_at.format("%d/%m/%Y %H:%M:%S"),
            short_digest,
            page_number
        );
        self.page.text_in_box(
            0.0,
            290.0,
            PAGE_WIDTH_MM,
            Font::Italic,
            7.0,
            MUTED,
            Align::Center,
            &footer,
        );
    }

    fn finish_page(&mut self) {
        self.draw_footer();
        let page = std::mem::take(&mut self.page);
        self.document.push_page(page);
    }

    fn ensure_space(&mut self, height: f64) {
        if self.y + height > CONTENT_BOTTOM {
            self.finish_page();
            self.draw_frame();
            self.y = CONTENT_TOP;
        }
    }

    fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.finish_page();
        self.document.to_bytes()
    }
}

pub(super) fn render(
    outline: &ReportOutline,
    logo: Option<RasterImage>,
    options: &ReportOptions,
) -> Result<Vec<u8>> {
    let mut flow = PageFlow::new(outline, options, logo);

    draw_field_grid(&mut flow);
    draw_global_progress(&mut flow);
    draw_sparkline(&mut flow);

    let center = (RADAR_CENTER_X, flow.y + RADAR_RADIUS + 9.0);
    draw_radar(&mut flow, center)?;
    draw_phase_table(&mut flow, center);
    if let Some(link) = &outline.verification_link {
        draw_qr(&mut flow, center, link)?;
    }

    flow.y = center.1 + RADAR_RADIUS + 18.0;
    draw_notes(&mut flow);
    draw_pendencies(&mut flow);

    flow.into_bytes()
}

/// Word-wraps a grid cell; a word wider than the cell is split between
/// characters so nothing spills outside it.
fn wrap_cell(text: &str, font: Font, size_pt: f64, width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for line in wrap_words(text, font, size_pt, width) {
        if text_width_mm(&line, font, size_pt) <= width {
            lines.push(line);
            continue;
        }

        let mut current = String::new();
        for ch in line.chars() {
            current.push(ch);
            if current.chars().count() > 1 && text_width_mm(&current, font, size_pt) > width {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn draw_field_grid(flow: &mut PageFlow<'_>) {
    const WIDTHS: [f64; 3] = [63.0, 63.0, 64.0];
    const MIN_ROW_HEIGHT: f64 = 7.0;

    let outline = flow.outline;

    flow.page.stroke_color(RULE);
    flow.page.line_width(0.2);
    let mut y = flow.y;
    for (row_index, row) in outline.fields.chunks(3).enumerate() {
        let cells: Vec<Vec<String>> = row
            .iter()
            .zip(WIDTHS)
            .map(|((label, value), width)| {
                wrap_cell(&format!("{label}: {value}"), Font::Bold, 8.0, width - 3.0)
            })
            .collect();
        let line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let row_height = MIN_ROW_HEIGHT.max(line_count as f64 * FIELD_LINE_STEP + 3.6);

        let mut x = MARGIN;
        for (lines, width) in cells.iter().zip(WIDTHS) {
            let style = if row_index == 0 {
                flow.page.fill_color(GRID_FILL);
                PaintStyle::FillStroke
            } else {
                PaintStyle::Stroke
            };
            flow.page.rect(x, y, width, row_height, style);
            for (line_index, line) in lines.iter().enumerate() {
                let baseline = y + 4.8 + line_index as f64 * FIELD_LINE_STEP;
                flow.page
                    .text_in_box(x, baseline, width, Font::Bold, 8.0, NAVY, Align::Left, line);
            }
            x += width;
        }
        y += row_height;
    }

    flow.y = y + 4.0;
}

fn draw_global_progress(flow: &mut PageFlow<'_>) {
    let outline = flow.outline;
    let y = flow.y;
    let label = format!("MÉDIA GLOBAL DE ENTREGA: {:.1}%", outline.global_percent);
    flow.page.text(MARGIN, y + 4.0, Font::Bold, 10.0, NAVY, &label);

    let bar_x = 110.0;
    let bar_width = PAGE_WIDTH_MM - MARGIN - bar_x;
    flow.page.fill_color(Rgb(230, 230, 230));
    flow.page.rect(bar_x, y + 0.8, bar_width, 4.0, PaintStyle::Fill);
    let filled = bar_width * outline.global_percent.clamp(0.0, 100.0) / 100.0;
    if filled > 0.0 {
        flow.page.fill_color(NAVY);
        flow.page.rect(bar_x, y + 0.8, filled, 4.0, PaintStyle::Fill);
    }

    flow.y += 10.0;
}

fn draw_sparkline(flow: &mut PageFlow<'_>) {
    let outline = flow.outline;
    let line_y = flow.y + 6.0;
    let positions = sparkline_positions(20.0, 170.0, outline.phases.len());

    flow.page.stroke_color(NAVY);
    flow.page.line_width(0.8);
    if let (Some(first), Some(last)) = (positions.first(), positions.last()) {
        flow.page.line(*first, line_y, *last, line_y);
    }

    for (status, x) in outline.phases.iter().zip(positions) {
        match status.marker {
            ProgressMarker::Complete => {
                flow.page.fill_color(NAVY);
                flow.page.stroke_color(NAVY);
                flow.page.line_width(0.2);
            }
            ProgressMarker::InProgress => {
                flow.page.fill_color(NAVY);
                flow.page.stroke_color(AMBER);
                flow.page.line_width(1.0);
            }
            ProgressMarker::NotStarted => {
                flow.page.fill_color(WHITE);
                flow.page.stroke_color(NAVY);
                flow.page.line_width(0.4);
            }
        }
        flow.page.circle(x, line_y, 3.0, PaintStyle::FillStroke);

        let label = status.phase.short_label();
        flow.page
            .text_in_box(x - 8.0, line_y - 4.5, 16.0, Font::Bold, 6.0, NAVY, Align::Center, label);
        let percent = format!("{:.0}%", status.percent);
        flow.page.text_in_box(
            x - 8.0,
            line_y + 6.5,
            16.0,
            Font::Bold,
            6.0,
            NAVY,
            Align::Center,
            &percent,
        );
    }

    flow.y = line_y + 10.0;
}

fn draw_radar(flow: &mut PageFlow<'_>, center: (f64, f64)) -> Result<()> {
    let outline = flow.outline;

    let chart = render_radar(&outline.percentages, RADAR_RADIUS, RADAR_SIDE)?;
    let handle = flow.document.add_image(chart);
    let half = RADAR_SIDE / 2.0;
    flow.page.image(handle, center.0 - half, center.1 - half, RADAR_SIDE, RADAR_SIDE);

    for (index, phase) in Phase::ALL.iter().enumerate() {
        let angle = spoke_angle(index, Phase::COUNT);
        let (x, y) = spoke_point(center, RADAR_RADIUS + 6.0, angle, 100.0);
        flow.page.text_in_box(
            x - 8.0,
            y + 1.2,
            16.0,
            Font::Bold,
            7.0,
            NAVY,
            Align::Center,
            phase.short_label(),
        );
    }

    Ok(())
}

fn draw_phase_table(flow: &mut PageFlow<'_>, center: (f64, f64)) {
    let outline = flow.outline;
    let x = 112.0;
    let width = PAGE_WIDTH_MM - MARGIN - x;
    let top = center.1 - RADAR_RADIUS - 4.0;
    let row_height = 6.0;

    flow.page.text(x, top, Font::Bold, 8.0, NAVY, "COMPLETUDE POR FASE");
    flow.page.stroke_color(RULE);
    flow.page.line_width(0.2);
    for (index, status) in outline.phases.iter().enumerate() {
        let y = top + 2.0 + index as f64 * row_height;
        flow.page.line(x, y + row_height, x + width, y + row_height);
        flow.page.text(x + 1.0, y + 4.2, Font::Regular, 7.5, BODY_TEXT, status.phase.label());
        let percent = format!("{:.1}%", status.percent);
        let percent_width = text_width_mm(&percent, Font::Bold, 7.5);
        flow.page.text(
            x + width - percent_width - 1.0,
            y + 4.2,
            Font::Bold,
            7.5,
            NAVY,
            &percent,
        );
    }
}

fn draw_qr(flow: &mut PageFlow<'_>, center: (f64, f64), link: &str) -> Result<()> {
    let matrix = QrMatrix::encode(link)?;
    let size = 26.0;
    let quiet = 1.0;
    let x0 = PAGE_WIDTH_MM - MARGIN - size;
    let y0 = center.1 + 14.0;
    let module = (size - 2.0 * quiet) / matrix.width as f64;

    flow.page.fill_color(WHITE);
    flow.page.rect(x0, y0, size, size, PaintStyle::Fill);
    flow.page.fill_color(NAVY);
    for row in 0..matrix.width {
        for col in 0..matrix.width {
            if matrix.is_dark(col, row) {
                flow.page.rect(
                    x0 + quiet + col as f64 * module,
                    y0 + quiet + row as f64 * module,
                    module,
                    module,
                    PaintStyle::Fill,
                );
            }
        }
    }
    flow.page.text_in_box(
        x0,
        y0 + size + 3.0,
        size,
        Font::Italic,
        6.0,
        BODY_TEXT,
        Align::Center,
        "Escanear para autenticidade",
    );

    Ok(())
}

fn draw_notes(flow: &mut PageFlow<'_>) {
    let outline = flow.outline;
    let Some(notes) = outline.notes.as_deref() else {
        return;
    };

    flow.ensure_space(10.0);
    flow.page.text(MARGIN, flow.y + 3.0, Font::Bold, 9.0, NAVY, "PARECER DA GESTÃO");
    flow.y += 5.5;

    for paragraph in notes.lines() {
        for line in wrap_words(paragraph, Font::Regular, 8.0, CONTENT_WIDTH) {
            flow.ensure_space(LINE_STEP + 0.5);
            flow.page.text(MARGIN, flow.y + 3.0, Font::Regular, 8.0, BODY_TEXT, &line);
            flow.y += LINE_STEP + 0.5;
        }
    }
    flow.y += 3.0;
}

/// Packs items into lines joined by ", ", breaking only between items unless
/// a single item is wider than a line.
fn wrap_items(prefix: &str, items: &[String], font: Font, size_pt: f64, width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = prefix.to_string();

    for (index, item) in items.iter().enumerate() {
        let suffix = if index + 1 < items.len() { "," } else { "." };
        let piece = format!("{item}{suffix}");
        let candidate = if current.is_empty() {
            piece.clone()
        } else {
            format!("{current} {piece}")
        };

        if text_width_mm(&candidate, font, size_pt) <= width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if text_width_mm(&piece, font, size_pt) <= width {
            current = piece;
        } else {
            let mut pieces = wrap_words(&piece, font, size_pt, width);
            current = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_pendencies(flow: &mut PageFlow<'_>) {
    let outline = flow.outline;
    flow.ensure_space(14.0);
    flow.page.fill_color(PENDING_FILL);
    flow.page.rect(MARGIN, flow.y, CONTENT_WIDTH, 8.0, PaintStyle::Fill);
    flow.page.text(
        MARGIN + 1.5,
        flow.y + 5.5,
        Font::Bold,
        10.0,
        NAVY,
        "DIAGNÓSTICO DE PENDÊNCIAS",
    );
    flow.y += 10.0;

    if outline.pendencies.is_empty() {
        flow.page.text(
            MARGIN + 1.5,
            flow.y + 3.0,
            Font::Regular,
            8.0,
            BODY_TEXT,
            "Nenhuma pendência: todos os documentos foram entregues.",
        );
        flow.y += LINE_STEP;
        return;
    }

    for pending in &outline.pendencies {
        let heading = format!("> {} ({:.1}%):", pending.phase.label(), pending.percent);
        let lines = wrap_items(
            "Pendências:",
            &pending.documents,
            Font::Regular,
            7.0,
            CONTENT_WIDTH - 4.0,
        );

        flow.ensure_space(4.5 + LINE_STEP);
        flow.page.text(MARGIN + 1.5, flow.y + 3.0, Font::Bold, 7.0, NAVY, &heading);
        flow.y += 4.5;

        for line in lines {
            flow.ensure_space(LINE_STEP);
            flow.page
                .text(MARGIN + 4.0, flow.y + 2.5, Font::Regular, 7.0, BODY_TEXT, &line);
            flow.y += LINE_STEP;
        }
        flow.y += 1.0;
    }
}
