use std::error::Error;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use longevity_visualizer::catalog;
use longevity_visualizer::config::DashboardConfig;
use longevity_visualizer::graph::RecomputationGraph;
use longevity_visualizer::models::MetricId;
use longevity_visualizer::outputs::{dashboard_outputs, DashboardData, OutputKind, OutputValue};
use longevity_visualizer::render::FileRenderer;
use longevity_visualizer::selection::{ContinentSelection, Selection, SelectionChange};
use longevity_visualizer::store::DatasetStore;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DashboardConfig::load(config_path.as_deref())?;

    let store = DatasetStore::new(config.clone());
    let dataset = store.load()?;
    let geo = if config.geo_path.exists() {
        Some(store.load_geo()?)
    } else {
        warn!(path = %config.geo_path.display(), "no boundary file; the map chart stays empty");
        None
    };
    info!(
        rows = dataset.len(),
        continents = catalog::continents(&dataset).len(),
        years = catalog::years(&dataset).len(),
        "dataset ready"
    );

    let data = DashboardData { dataset, geo };
    let initial = Selection::initial(&data.dataset);
    let mut graph = RecomputationGraph::new(&data, dashboard_outputs(), initial)?;
    let mut renderer = FileRenderer::new(&config.output_dir, data.geo.as_ref())?;

    let seed = graph.initial_batch();
    graph.publish(&seed, &mut renderer);

    // A scripted session standing in for live widget events: narrow to the
    // first continent, step the year slider, switch the metric.
    let mut events = Vec::new();
    if let Some(first) = catalog::continents(&data.dataset).first() {
        events.push(SelectionChange::Continents(ContinentSelection::only([
            first.clone(),
        ])));
    }
    if let Some(&year) = catalog::years_decimated(&data.dataset, config.year_step).last() {
        events.push(SelectionChange::Year(year));
    }
    events.push(SelectionChange::Metric(MetricId::Gdp));

    for event in events {
        let batch = graph.apply(event);
        graph.publish(&batch, &mut renderer);
    }

    if let Some(OutputValue::SummaryCards(cards)) = graph.value(OutputKind::SummaryCards) {
        for card in &cards.cards {
            info!("{}: {} ({})", card.title, card.value, card.change);
        }
    }
    info!(dir = %config.output_dir.display(), "charts written");
    Ok(())
}
