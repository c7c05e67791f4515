// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map image rendering for simplified routes.

use crate::services::geometry::lines;
use geo::Coord;
use geojson::FeatureCollection;
use std::fmt::Write;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Nothing to draw")]
    Empty,

    #[error("Render failed: {0}")]
    Failed(String),
}

/// Turns route geometry into an image document.
pub trait ImageRenderer: Send + Sync {
    fn render(&self, collection: &FeatureCollection) -> Result<String, RenderError>;

    /// File extension of rendered images.
    fn extension(&self) -> &'static str {
        "svg"
    }
}

/// Plain SVG renderer: equirectangular projection scaled into a fixed
/// view box, one `<polyline>` per line.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 400.0,
            padding: 10.0,
            stroke: "#fc4c02".to_string(),
            stroke_width: 2.0,
        }
    }
}

struct Bounds {
    min: Coord<f64>,
    max: Coord<f64>,
}

impl Bounds {
    fn of(points: impl Iterator<Item = Coord<f64>>) -> Option<Self> {
        points.fold(None, |acc: Option<Bounds>, p| {
            Some(match acc {
                None => Bounds { min: p, max: p },
                Some(b) => Bounds {
                    min: Coord {
                        x: b.min.x.min(p.x),
                        y: b.min.y.min(p.y),
                    },
                    max: Coord {
                        x: b.max.x.max(p.x),
                        y: b.max.y.max(p.y),
                    },
                },
            })
        })
    }
}

impl SvgRenderer {
    /// Project every line to view box coordinates.
    fn project(&self, lines: &[Vec<Coord<f64>>]) -> Option<Vec<Vec<Coord<f64>>>> {
        let all = || lines.iter().flatten().copied();
        let geo_bounds = Bounds::of(all())?;

        // Shrink longitudes by the cosine of the middle latitude
        let mid_lat = ((geo_bounds.min.y + geo_bounds.max.y) / 2.0).to_radians();
        let x_scale = mid_lat.cos().max(0.01);
        let flat = |c: Coord<f64>| Coord {
            x: c.x * x_scale,
            y: -c.y,
        };

        let bounds = Bounds::of(all().map(flat))?;
        let span_x = bounds.max.x - bounds.min.x;
        let span_y = bounds.max.y - bounds.min.y;
        let inner_w = self.width - 2.0 * self.padding;
        let inner_h = self.height - 2.0 * self.padding;
        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (inner_w / span_x).min(inner_h / span_y),
            (true, false) => inner_w / span_x,
            (false, true) => inner_h / span_y,
            (false, false) => 1.0,
        };
        // Center the drawing in the view box
        let offset_x = self.padding + (inner_w - span_x * scale) / 2.0;
        let offset_y = self.padding + (inner_h - span_y * scale) / 2.0;

        Some(
            lines
                .iter()
                .map(|line| {
                    line.iter()
                        .map(|c| {
                            let p = flat(*c);
                            Coord {
                                x: offset_x + (p.x - bounds.min.x) * scale,
                                y: offset_y + (p.y - bounds.min.y) * scale,
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }
}

impl ImageRenderer for SvgRenderer {
    fn render(&self, collection: &FeatureCollection) -> Result<String, RenderError> {
        let lines: Vec<_> = lines(collection)
            .into_iter()
            .filter(|line| line.len() >= 2)
            .collect();
        let projected = self.project(&lines).ok_or(RenderError::Empty)?;

        let mut svg = String::new();
        let fail = |e: std::fmt::Error| RenderError::Failed(e.to_string());
        write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            w = self.width,
            h = self.height
        )
        .map_err(fail)?;
        for line in projected {
            let points: Vec<String> = line
                .iter()
                .map(|c| format!("{:.1},{:.1}", c.x, c.y))
                .collect();
            write!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round" stroke-linecap="round"/>"#,
                points.join(" "),
                self.stroke,
                self.stroke_width
            )
            .map_err(fail)?;
        }
        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geometry::collection;
    use geojson::{Feature, Geometry, Value};

    fn route(coords: &[(f64, f64)]) -> FeatureCollection {
        let line = coords.iter().map(|(x, y)| vec![*x, *y]).collect();
        collection(vec![Feature::from(Geometry::new(Value::LineString(line)))])
    }

    #[test]
    fn renders_one_polyline_per_line() {
        let svg = SvgRenderer::default()
            .render(&route(&[(-122.0, 37.0), (-122.1, 37.1), (-122.2, 37.0)]))
            .unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<polyline").count(), 1);
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn projection_stays_inside_view_box() {
        let renderer = SvgRenderer::default();
        let lines = vec![vec![
            Coord { x: 10.0, y: 50.0 },
            Coord { x: 11.0, y: 51.0 },
            Coord { x: 10.5, y: 50.2 },
        ]];
        let projected = renderer.project(&lines).unwrap();
        for c in projected.iter().flatten() {
            assert!(c.x >= renderer.padding - 1e-9 && c.x <= renderer.width - renderer.padding + 1e-9);
            assert!(c.y >= renderer.padding - 1e-9 && c.y <= renderer.height - renderer.padding + 1e-9);
        }
        // North is up
        assert!(projected[0][1].y < projected[0][0].y);
    }

    #[test]
    fn empty_collection_is_an_error() {
        assert!(matches!(
            SvgRenderer::default().render(&route(&[(1.0, 1.0)])),
            Err(RenderError::Empty)
        ));
    }
}
