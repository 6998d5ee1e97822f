use std::f64::consts::PI;

use anyhow::{Result, anyhow};
use plotters::prelude::{
    BitMapBackend, Circle, Color, IntoDrawingArea, PathElement, Polygon, RGBColor,
};
use serde::Serialize;

use super::pdf::RasterImage;
use crate::methodology::Phase;
use crate::model::PhasePercentages;

/// Raster resolution of the radar chart.
pub const RADAR_PX_PER_MM: f64 = 6.0;

const CHART_BACKGROUND: RGBColor = RGBColor(255, 255, 255);
const CHART_GRID: RGBColor = RGBColor(205, 205, 205);
const CHART_NAVY: RGBColor = RGBColor(20, 50, 100);
const CHART_AMBER: RGBColor = RGBColor(255, 179, 14);
const CHART_AMBER_WASH: RGBColor = RGBColor(255, 232, 183);

/// State of one phase marker on the progression scale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMarker {
    NotStarted,
    InProgress,
    Complete,
}

impl ProgressMarker {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 100.0 {
            Self::Complete
        } else if percent > 0.0 {
            Self::InProgress
        } else {
            Self::NotStarted
        }
    }
}

/// Angle of spoke `index` out of `count`, starting at 12 o'clock and running
/// clockwise on the page.
pub fn spoke_angle(index: usize, count: usize) -> f64 {
    2.0 * PI * index as f64 / count as f64 - PI / 2.0
}

/// Point at `percent` of `radius` along a spoke, in page coordinates
/// (y grows downward).
pub fn spoke_point(center: (f64, f64), radius: f64, angle: f64, percent: f64) -> (f64, f64) {
    let scale = radius * percent.clamp(0.0, 100.0) / 100.0;
    (center.0 + scale * angle.cos(), center.1 + scale * angle.sin())
}

/// Polygon vertices for the per-phase percentages, one per [`Phase`].
pub fn radar_vertices(
    center: (f64, f64),
    radius: f64,
    percentages: &PhasePercentages,
) -> Vec<(f64, f64)> {
    Phase::ALL
        .iter()
        .enumerate()
        .map(|(index, phase)| {
            spoke_point(
                center,
                radius,
                spoke_angle(index, Phase::COUNT),
                percentages.get_or_zero(*phase),
            )
        })
        .collect()
}

/// The "ideal" polygon: every phase at 100 %.
pub fn ideal_vertices(center: (f64, f64), radius: f64) -> Vec<(f64, f64)> {
    (0..Phase::COUNT)
        .map(|index| spoke_point(center, radius, spoke_angle(index, Phase::COUNT), 100.0))
        .collect()
}

/// X positions of the sparkline markers across `[x_start, x_start + width]`.
pub fn sparkline_positions(x_start: f64, width: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![x_start + width / 2.0],
        _ => {
            let step = width / (count - 1) as f64;
            (0..count).map(|index| x_start + step * index as f64).collect()
        }
    }
}

/// Splits the closed outline through `points` into dash segments of
/// `dash` length separated by `gap`.
pub fn dash_segments(points: &[(f64, f64)], dash: f64, gap: f64) -> Vec<[(f64, f64); 2]> {
    let mut segments = Vec::new();
    if points.len() < 2 || dash <= 0.0 {
        return segments;
    }

    let period = dash + gap.max(0.0);
    for (index, start) in points.iter().enumerate() {
        let end = points[(index + 1) % points.len()];
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 {
            continue;
        }

        let mut offset = 0.0;
        while offset < length {
            let stop = (offset + dash).min(length);
            segments.push([
                (start.0 + dx * offset / length, start.1 + dy * offset / length),
                (start.0 + dx * stop / length, start.1 + dy * stop / length),
            ]);
            offset += period;
        }
    }

    segments
}

fn to_pixel(point: (f64, f64)) -> (i32, i32) {
    (point.0.round() as i32, point.1.round() as i32)
}

fn closed_path(points: &[(f64, f64)]) -> Vec<(i32, i32)> {
    let mut path: Vec<(i32, i32)> = points.iter().copied().map(to_pixel).collect();
    if let Some(first) = path.first().copied() {
        path.push(first);
    }
    path
}

fn chart_error(err: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("failed to draw radar chart: {err}")
}

/// Draws the radar chart (grid rings, dashed ideal polygon at 100 %, realized
/// polygon) as a square raster `side_mm` wide. Background pixels are fully
/// transparent in the returned alpha mask.
pub fn render_radar(
    percentages: &PhasePercentages,
    radius_mm: f64,
    side_mm: f64,
) -> Result<RasterImage> {
    let side = (side_mm * RADAR_PX_PER_MM).round().max(1.0) as u32;
    let center = (f64::from(side) / 2.0, f64::from(side) / 2.0);
    let radius = radius_mm * RADAR_PX_PER_MM;
    let mut buffer = vec![255u8; side as usize * side as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (side, side)).into_drawing_area();
        root.fill(&CHART_BACKGROUND).map_err(chart_error)?;

        for vertex in ideal_vertices(center, radius) {
            root.draw(&PathElement::new(
                vec![to_pixel(center), to_pixel(vertex)],
                CHART_GRID.stroke_width(1),
            ))
            .map_err(chart_error)?;
        }
        for ring in [25.0, 50.0, 75.0] {
            let ring_points: Vec<(f64, f64)> = (0..Phase::COUNT)
                .map(|index| spoke_point(center, radius, spoke_angle(index, Phase::COUNT), ring))
                .collect();
            root.draw(&PathElement::new(closed_path(&ring_points), CHART_GRID.stroke_width(1)))
                .map_err(chart_error)?;
        }

        let realized = radar_vertices(center, radius, percentages);
        if Phase::ALL.iter().any(|phase| percentages.get_or_zero(*phase) > 0.0) {
            root.draw(&Polygon::new(
                realized.iter().copied().map(to_pixel).collect::<Vec<_>>(),
                CHART_AMBER_WASH.filled(),
            ))
            .map_err(chart_error)?;
        }
        for [from, to] in dash_segments(&ideal_vertices(center, radius), 9.0, 6.0) {
            root.draw(&PathElement::new(
                vec![to_pixel(from), to_pixel(to)],
                CHART_NAVY.stroke_width(2),
            ))
            .map_err(chart_error)?;
        }

        root.draw(&PathElement::new(closed_path(&realized), CHART_AMBER.stroke_width(4)))
            .map_err(chart_error)?;
        for vertex in &realized {
            root.draw(&Circle::new(to_pixel(*vertex), 4, CHART_AMBER.filled()))
                .map_err(chart_error)?;
        }

        root.present().map_err(chart_error)?;
    }

    let alpha = buffer
        .chunks_exact(3)
        .map(|pixel| if pixel == [255, 255, 255] { 0 } else { 255 })
        .collect();

    Ok(RasterImage {
        width: side,
        height: side,
        rgb: buffer,
        alpha: Some(alpha),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn marker_tracks_completion_state() {
        assert_eq!(ProgressMarker::from_percent(0.0), ProgressMarker::NotStarted);
        assert_eq!(ProgressMarker::from_percent(12.5), ProgressMarker::InProgress);
        assert_eq!(ProgressMarker::from_percent(100.0), ProgressMarker::Complete);
    }

    #[test]
    fn radar_vertices_scale_with_percent() {
        let center = (50.0, 50.0);
        let percentages: PhasePercentages = Phase::ALL
            .into_iter()
            .zip([100.0, 50.0, 0.0, 75.0, 25.0, 100.0, 0.0])
            .collect();

        let vertices = radar_vertices(center, 30.0, &percentages);
        assert_eq!(vertices.len(), Phase::COUNT);
        assert!((distance(vertices[0], center) - 30.0).abs() < 1e-9);
        assert!((distance(vertices[1], center) - 15.0).abs() < 1e-9);
        assert!(distance(vertices[2], center) < 1e-9);

        // first spoke points straight up the page
        assert!((vertices[0].0 - 50.0).abs() < 1e-9);
        assert!((vertices[0].1 - 20.0).abs() < 1e-9);
    }

    #[test]
    fn ideal_polygon_sits_on_the_outer_ring() {
        let center = (0.0, 0.0);
        for vertex in ideal_vertices(center, 10.0) {
            assert!((distance(vertex, center) - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn dash_segments_leave_gaps_along_each_edge() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let segments = dash_segments(&square, 3.0, 2.0);

        // 0..3 and 5..8 on each edge
        assert_eq!(segments.len(), 4 * 2);
        assert_eq!(segments[0], [(0.0, 0.0), (3.0, 0.0)]);
        assert_eq!(segments[1], [(5.0, 0.0), (8.0, 0.0)]);
        assert!(dash_segments(&square[..1], 3.0, 2.0).is_empty());
    }

    fn pixel(image: &RasterImage, x: u32, y: u32) -> [u8; 3] {
        let offset = (y * image.width + x) as usize * 3;
        [image.rgb[offset], image.rgb[offset + 1], image.rgb[offset + 2]]
    }

    #[test]
    fn rendered_radar_fills_the_realized_polygon() {
        let full: PhasePercentages = Phase::ALL.into_iter().map(|phase| (phase, 100.0)).collect();
        let empty: PhasePercentages = Phase::ALL.into_iter().map(|phase| (phase, 0.0)).collect();

        let filled = render_radar(&full, 30.0, 64.0).expect("radar renders");
        let blank = render_radar(&empty, 30.0, 64.0).expect("radar renders");
        assert_eq!((filled.width, filled.height), (384, 384));
        assert_eq!(filled.rgb.len(), 384 * 384 * 3);

        // between the first two spokes, clear of the grid rings
        let angle = (spoke_angle(0, Phase::COUNT) + spoke_angle(1, Phase::COUNT)) / 2.0;
        let radius = 30.0 * RADAR_PX_PER_MM * 0.3;
        let x = (192.0 + radius * angle.cos()).round() as u32;
        let y = (192.0 + radius * angle.sin()).round() as u32;

        assert_eq!(pixel(&filled, x, y), [255, 232, 183]);
        assert_eq!(pixel(&blank, x, y), [255, 255, 255]);

        let alpha = blank.alpha.as_ref().expect("background mask");
        assert_eq!(alpha[(y * blank.width + x) as usize], 0);
        assert_eq!(alpha[(192 * blank.width + 192) as usize], 255);
    }

    #[test]
    fn sparkline_positions_span_the_width() {
        let positions = sparkline_positions(20.0, 170.0, 7);
        assert_eq!(positions.len(), 7);
        assert_eq!(positions[0], 20.0);
        assert!((positions[6] - 190.0).abs() < 1e-9);
        assert_eq!(sparkline_positions(20.0, 170.0, 1), vec![105.0]);
    }
}
