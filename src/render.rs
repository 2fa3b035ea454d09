use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use ordered_float::OrderedFloat;
use plotters::prelude::*;
use tracing::warn;

use crate::graph::{BatchSink, UpdateBatch};
use crate::models::GeoDataset;
use crate::outputs::{
    BubbleFigure, CountryOptions, MapFigure, OutputKind, OutputValue, SeriesChart, SummaryCards,
};

/// Fixed continent colors so the same continent looks the same in every
/// chart.
fn continent_color(name: &str) -> RGBColor {
    match name {
        "Africa" => RGBColor(31, 119, 180),
        "Asia" => RGBColor(255, 127, 14),
        "Europe" => RGBColor(44, 160, 44),
        "North America" => RGBColor(214, 39, 40),
        "Oceania" => RGBColor(148, 103, 189),
        "South America" => RGBColor(140, 86, 75),
        _ => RGBColor(127, 127, 127),
    }
}

fn pad_range(range: (f64, f64), headroom: f64) -> std::ops::Range<f64> {
    let (min, max) = range;
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        min..(max + (max - min) * headroom)
    }
}

/// Writes one file per output into a directory. This is the downstream
/// consumer of published batches; it never reaches back into the graph.
pub struct FileRenderer<'d> {
    output_dir: PathBuf,
    geo: Option<&'d GeoDataset>,
}

impl<'d> FileRenderer<'d> {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        geo: Option<&'d GeoDataset>,
    ) -> Result<Self, std::io::Error> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(FileRenderer { output_dir, geo })
    }

    fn path(&self, kind: OutputKind, ext: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", kind.name(), ext))
    }

    fn render_one(&self, kind: OutputKind, value: &OutputValue) -> Result<(), Box<dyn Error>> {
        match value {
            OutputValue::Lines(chart) => render_series_chart(chart, &self.path(kind, "png")),
            OutputValue::Bubble(fig) => render_bubble_chart(fig, &self.path(kind, "png")),
            OutputValue::Map(fig) => match self.geo {
                Some(geo) => render_map_chart(fig, geo, &self.path(kind, "png")),
                None => Ok(()),
            },
            OutputValue::SummaryCards(cards) => {
                fs::write(self.path(kind, "txt"), cards_text(cards))?;
                Ok(())
            }
            OutputValue::CountryOptions(opts) => {
                fs::write(self.path(kind, "txt"), options_text(opts))?;
                Ok(())
            }
        }
    }
}

impl BatchSink for FileRenderer<'_> {
    fn publish(&mut self, batch: &UpdateBatch) {
        for (kind, value) in &batch.values {
            if let Err(err) = self.render_one(*kind, value) {
                // a drawing failure is a presentation problem, not a reason
                // to stop consuming the batch
                warn!(output = kind.name(), error = %err, "render failed");
            }
        }
    }
}

/// Line+point chart for the two trend payloads.
pub fn render_series_chart(chart: &SeriesChart, path: &Path) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let years: Vec<i32> = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|&(year, _)| i32::from(year)))
        .collect();
    let values: Vec<f64> = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|&(_, v)| v))
        .collect();
    let x_range = match (years.iter().min(), years.iter().max()) {
        (Some(&lo), Some(&hi)) if lo < hi => lo..hi,
        (Some(&lo), _) => (lo - 1)..(lo + 1),
        _ => 0..1,
    };
    let y_min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let y_range = if values.is_empty() {
        0.0..1.0
    } else {
        pad_range((y_min, y_max), 0.05)
    };

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;
    ctx.configure_mesh()
        .x_desc("Year")
        .y_desc(chart.y_label.as_str())
        .draw()?;

    for (i, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(i32, f64)> = series
            .points
            .iter()
            .map(|&(year, v)| (i32::from(year), v))
            .collect();
        ctx.draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(series.name.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 10, y)], color.stroke_width(2))
            });
        ctx.draw_series(
            points
                .into_iter()
                .map(|p| Circle::new(p, 3, color.filled())),
        )?;
    }
    if !chart.series.is_empty() {
        ctx.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .draw()?;
    }
    root.present()?;
    Ok(())
}

/// Scatter with per-continent colors and CO2-scaled bubble sizes.
pub fn render_bubble_chart(fig: &BubbleFigure, path: &Path) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&fig.title, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(pad_range(fig.x_range, 0.1), pad_range(fig.y_range, 0.1))?;
    ctx.configure_mesh()
        .x_desc(fig.x_label.as_str())
        .y_desc("Life Expectancy")
        .draw()?;

    // draw the big bubbles first so small ones stay visible on top
    let mut points = fig.points.clone();
    points.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.size)));
    let (size_min, size_max) = fig.size_range;
    let size_span = (size_max - size_min).max(f64::EPSILON);
    ctx.draw_series(points.iter().map(|p| {
        let frac = ((p.size - size_min) / size_span).clamp(0.0, 1.0);
        let radius = 4 + (16.0 * frac) as i32;
        Circle::new(
            (p.x, p.y),
            radius,
            continent_color(&p.continent).mix(0.7).filled(),
        )
    }))?;
    root.present()?;
    Ok(())
}

/// Choropleth: boundary polygons filled on a white-to-dark-green scale.
pub fn render_map_chart(
    fig: &MapFigure,
    geo: &GeoDataset,
    path: &Path,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&fig.title, ("sans-serif", 30))
        .margin(10)
        .build_cartesian_2d(-180.0..180.0, -90.0..90.0)?;
    ctx.configure_mesh().disable_mesh().draw()?;

    let (color_min, color_max) = fig.color_range;
    let span = (color_max - color_min).max(f64::EPSILON);
    for (country, value) in &fig.values {
        let Some(feature) = geo.get(country) else {
            continue;
        };
        let frac = ((value - color_min) / span).clamp(0.0, 1.0);
        // white (low) to dark green (high)
        let color = RGBColor(
            (255.0 - frac * 255.0) as u8,
            (255.0 - frac * 155.0) as u8,
            (255.0 - frac * 255.0) as u8,
        );
        for ring in &feature.rings {
            ctx.draw_series(std::iter::once(Polygon::new(
                ring.clone(),
                color.filled(),
            )))?;
        }
    }
    root.present()?;
    Ok(())
}

fn cards_text(cards: &SummaryCards) -> String {
    let mut out = String::new();
    for card in &cards.cards {
        out.push_str(&format!("{}: {} ({})\n", card.title, card.value, card.change));
    }
    out
}

fn options_text(opts: &CountryOptions) -> String {
    let mut out = opts.options.join("\n");
    out.push('\n');
    out
}
