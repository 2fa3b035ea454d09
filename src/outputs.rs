use thiserror::Error;

use crate::catalog::{countries_in, metric_label};
use crate::filter::{
    continent_year_means, filter_records, metric_extent, metric_mean, pct_change, Change,
    YearFilter,
};
use crate::models::{Dataset, GeoDataset, MetricId};
use crate::selection::{CountrySelection, Selection, SelectionField, ALL_SENTINEL};

/// Card text shown when the filtered row set is empty.
pub const NO_DATA: &str = "No Data Available";

/// Everything the compute functions read: the cleaned dataset and the
/// optional boundary data. Built once at startup and passed by reference into
/// the recomputation graph; there are no process-wide globals.
#[derive(Debug)]
pub struct DashboardData {
    pub dataset: Dataset,
    pub geo: Option<GeoDataset>,
}

/// The renderable outputs of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    CountryOptions,
    SummaryCards,
    MapChart,
    BubbleChart,
    CountryTrend,
    ContinentTrend,
}

impl OutputKind {
    pub const ALL: [OutputKind; 6] = [
        OutputKind::CountryOptions,
        OutputKind::SummaryCards,
        OutputKind::MapChart,
        OutputKind::BubbleChart,
        OutputKind::CountryTrend,
        OutputKind::ContinentTrend,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputKind::CountryOptions => "country-options",
            OutputKind::SummaryCards => "summary-cards",
            OutputKind::MapChart => "map-chart",
            OutputKind::BubbleChart => "bubble-chart",
            OutputKind::CountryTrend => "country-trend",
            OutputKind::ContinentTrend => "continent-trend",
        }
    }

    /// The defined empty-state value for this output. Also what a failed
    /// compute downgrades to, so one bad output never blanks the rest. Takes
    /// the selection so the trend charts keep their metric axis label, the
    /// same shape their compute functions produce for an empty filter.
    pub fn empty_value(self, selection: &Selection) -> OutputValue {
        match self {
            OutputKind::CountryOptions => OutputValue::CountryOptions(CountryOptions {
                options: Vec::new(),
                corrected: CountrySelection::Only(Default::default()),
            }),
            OutputKind::SummaryCards => OutputValue::SummaryCards(SummaryCards::no_data()),
            OutputKind::MapChart => OutputValue::Map(MapFigure::empty()),
            OutputKind::BubbleChart => OutputValue::Bubble(BubbleFigure::empty()),
            OutputKind::CountryTrend | OutputKind::ContinentTrend => {
                OutputValue::Lines(SeriesChart::no_data(metric_label(selection.metric)))
            }
        }
    }
}

/// Failures a compute function can report. Caught at the output boundary and
/// downgraded to the empty state.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no boundary data loaded for the map chart")]
    MissingGeo,
}

/// Country dropdown contents plus the corrected selection value. The one
/// output that reads and writes the same selection field.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryOptions {
    /// Dropdown labels: the "(All)" sentinel followed by the valid countries,
    /// or empty when the continent filter matches no country at all.
    pub options: Vec<String>,
    pub corrected: CountrySelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCard {
    pub title: &'static str,
    pub value: String,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCards {
    pub cards: [SummaryCard; 3],
}

impl SummaryCards {
    fn no_data() -> Self {
        let card = |title| SummaryCard {
            title,
            value: NO_DATA.to_string(),
            change: Change::Unavailable,
        };
        SummaryCards {
            cards: [
                card("Average Longevity"),
                card("Average GDP per Capita"),
                card("Average Service Workers Percentage"),
            ],
        }
    }
}

/// Choropleth payload: life expectancy per country for one year, joined
/// against the boundary data, with the global color range.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFigure {
    pub title: String,
    pub values: Vec<(String, f64)>,
    pub color_range: (f64, f64),
}

impl MapFigure {
    fn empty() -> Self {
        MapFigure {
            title: String::new(),
            values: Vec::new(),
            color_range: (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubblePoint {
    pub country: String,
    pub continent: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Scatter payload: x = selected metric, y = life expectancy, bubble size =
/// CO2 per person. Axis and size ranges come from the global extents so the
/// frame does not jump when the filter changes.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleFigure {
    pub title: String,
    pub x_label: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub size_range: (f64, f64),
    pub points: Vec<BubblePoint>,
}

impl BubbleFigure {
    fn empty() -> Self {
        BubbleFigure {
            title: String::new(),
            x_label: String::new(),
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.0),
            size_range: (0.0, 1.0),
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(u16, f64)>,
}

/// Line+point chart payload for the two trend charts.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesChart {
    pub title: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl SeriesChart {
    fn no_data(y_label: &str) -> Self {
        SeriesChart {
            title: "No data available".to_string(),
            y_label: y_label.to_string(),
            series: Vec::new(),
        }
    }
}

/// One output's current value, handed to a renderer as an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    CountryOptions(CountryOptions),
    SummaryCards(SummaryCards),
    Map(MapFigure),
    Bubble(BubbleFigure),
    Lines(SeriesChart),
}

/// A pure output descriptor: which selection fields it reads, and how to
/// compute its value. The declared inputs are what the graph builds its
/// dependency edges from.
pub struct OutputSpec {
    pub kind: OutputKind,
    pub inputs: &'static [SelectionField],
    pub compute: fn(&DashboardData, &Selection) -> Result<OutputValue, OutputError>,
}

/// The full set of outputs this dashboard drives.
pub fn dashboard_outputs() -> Vec<OutputSpec> {
    vec![
        OutputSpec {
            kind: OutputKind::CountryOptions,
            inputs: &[
                SelectionField::Continents,
                SelectionField::MapClick,
                SelectionField::Countries,
            ],
            compute: compute_country_options,
        },
        OutputSpec {
            kind: OutputKind::SummaryCards,
            inputs: &[SelectionField::Continents, SelectionField::Year],
            compute: compute_summary_cards,
        },
        OutputSpec {
            kind: OutputKind::MapChart,
            inputs: &[SelectionField::Continents, SelectionField::Year],
            compute: compute_map_chart,
        },
        OutputSpec {
            kind: OutputKind::BubbleChart,
            inputs: &[
                SelectionField::Continents,
                SelectionField::Year,
                SelectionField::Metric,
            ],
            compute: compute_bubble_chart,
        },
        OutputSpec {
            kind: OutputKind::CountryTrend,
            inputs: &[
                SelectionField::Metric,
                SelectionField::Continents,
                SelectionField::Countries,
                SelectionField::YearRange,
            ],
            compute: compute_country_trend,
        },
        OutputSpec {
            kind: OutputKind::ContinentTrend,
            inputs: &[
                SelectionField::Metric,
                SelectionField::Continents,
                SelectionField::YearRange,
            ],
            compute: compute_continent_trend,
        },
    ]
}

/// Decide the corrected country selection for a set of valid options. A map
/// click wins over the dropdown value; an invalid dropdown value falls back
/// to the first valid option; no valid option at all resolves to the explicit
/// empty subset rather than a dangling name.
fn correct_countries(
    valid: &[String],
    current: &CountrySelection,
    click: Option<&str>,
) -> CountrySelection {
    if let Some(click) = click {
        if valid.iter().any(|c| c == click) {
            return CountrySelection::one(click);
        }
    }
    match current {
        CountrySelection::All => CountrySelection::All,
        CountrySelection::Only(set) => {
            if !set.is_empty() && set.iter().all(|c| valid.contains(c)) {
                current.clone()
            } else {
                match valid.first() {
                    Some(first) => CountrySelection::one(first.clone()),
                    None => CountrySelection::Only(Default::default()),
                }
            }
        }
    }
}

fn compute_country_options(
    data: &DashboardData,
    sel: &Selection,
) -> Result<OutputValue, OutputError> {
    let valid = countries_in(&data.dataset, &sel.continents);
    let corrected = correct_countries(&valid, &sel.countries, sel.map_click.as_deref());
    let options = if valid.is_empty() {
        Vec::new()
    } else {
        std::iter::once(ALL_SENTINEL.to_string())
            .chain(valid)
            .collect()
    };
    Ok(OutputValue::CountryOptions(CountryOptions {
        options,
        corrected,
    }))
}

fn compute_summary_cards(
    data: &DashboardData,
    sel: &Selection,
) -> Result<OutputValue, OutputError> {
    let rows = filter_records(
        &data.dataset,
        YearFilter::Exact(sel.year),
        &sel.continents,
        None,
    );
    if rows.is_empty() {
        return Ok(OutputValue::SummaryCards(SummaryCards::no_data()));
    }
    let prev_rows = match sel.year.checked_sub(1) {
        Some(prev) => filter_records(
            &data.dataset,
            YearFilter::Exact(prev),
            &sel.continents,
            None,
        ),
        None => Vec::new(),
    };

    let card = |title, metric, fmt: fn(f64) -> String| {
        let avg = metric_mean(&rows, metric);
        let prev = metric_mean(&prev_rows, metric);
        SummaryCard {
            title,
            value: avg.map(fmt).unwrap_or_else(|| NO_DATA.to_string()),
            change: pct_change(avg, prev),
        }
    };

    Ok(OutputValue::SummaryCards(SummaryCards {
        cards: [
            card("Average Longevity", MetricId::LifeExp, |v| {
                format!("{:.2} years", v)
            }),
            card("Average GDP per Capita", MetricId::Gdp, |v| {
                format!("${}", thousands(v))
            }),
            card(
                "Average Service Workers Percentage",
                MetricId::Services,
                |v| format!("{:.2}%", v),
            ),
        ],
    }))
}

fn compute_map_chart(data: &DashboardData, sel: &Selection) -> Result<OutputValue, OutputError> {
    let geo = data.geo.as_ref().ok_or(OutputError::MissingGeo)?;
    let rows = filter_records(
        &data.dataset,
        YearFilter::Exact(sel.year),
        &sel.continents,
        None,
    );
    if rows.is_empty() {
        return Ok(OutputValue::Map(MapFigure::empty()));
    }
    let values: Vec<(String, f64)> = rows
        .iter()
        .filter(|r| geo.contains_key(&r.country))
        .map(|r| (r.country.clone(), r.life_exp))
        .collect();
    Ok(OutputValue::Map(MapFigure {
        title: format!("Life Expectancy in {}", sel.year),
        values,
        color_range: metric_extent(&data.dataset, MetricId::LifeExp).unwrap_or((0.0, 1.0)),
    }))
}

fn compute_bubble_chart(data: &DashboardData, sel: &Selection) -> Result<OutputValue, OutputError> {
    let rows = filter_records(
        &data.dataset,
        YearFilter::Exact(sel.year),
        &sel.continents,
        None,
    );
    if rows.is_empty() {
        return Ok(OutputValue::Bubble(BubbleFigure::empty()));
    }
    let points = rows
        .iter()
        .map(|r| BubblePoint {
            country: r.country.clone(),
            continent: r.continent.clone(),
            x: r.metric(sel.metric),
            y: r.life_exp,
            size: r.co2_consump,
        })
        .collect();
    let label = metric_label(sel.metric);
    Ok(OutputValue::Bubble(BubbleFigure {
        title: format!("Life Expectancy vs. {} in {}", label, sel.year),
        x_label: label.to_string(),
        x_range: metric_extent(&data.dataset, sel.metric).unwrap_or((0.0, 1.0)),
        y_range: metric_extent(&data.dataset, MetricId::LifeExp).unwrap_or((0.0, 1.0)),
        size_range: metric_extent(&data.dataset, MetricId::Co2Consump).unwrap_or((0.0, 1.0)),
        points,
    }))
}

fn compute_country_trend(
    data: &DashboardData,
    sel: &Selection,
) -> Result<OutputValue, OutputError> {
    let (lo, hi) = sel.year_range;
    let rows = filter_records(
        &data.dataset,
        YearFilter::Range(lo, hi),
        &sel.continents,
        Some(&sel.countries),
    );
    let label = metric_label(sel.metric);
    if rows.is_empty() {
        return Ok(OutputValue::Lines(SeriesChart::no_data(label)));
    }
    let mut by_country: std::collections::BTreeMap<String, Vec<(u16, f64)>> = Default::default();
    for r in &rows {
        by_country
            .entry(r.country.clone())
            .or_default()
            .push((r.year, r.metric(sel.metric)));
    }
    let series = by_country
        .into_iter()
        .map(|(name, mut points)| {
            points.sort_by_key(|&(year, _)| year);
            Series { name, points }
        })
        .collect();
    Ok(OutputValue::Lines(SeriesChart {
        title: format!("{} Over Time by Country", label),
        y_label: label.to_string(),
        series,
    }))
}

fn compute_continent_trend(
    data: &DashboardData,
    sel: &Selection,
) -> Result<OutputValue, OutputError> {
    let (lo, hi) = sel.year_range;
    let rows = filter_records(
        &data.dataset,
        YearFilter::Range(lo, hi),
        &sel.continents,
        None,
    );
    let label = metric_label(sel.metric);
    if rows.is_empty() {
        return Ok(OutputValue::Lines(SeriesChart::no_data(label)));
    }
    let mut by_continent: std::collections::BTreeMap<String, Vec<(u16, f64)>> = Default::default();
    for (year, continent, mean) in continent_year_means(&rows, sel.metric) {
        by_continent.entry(continent).or_default().push((year, mean));
    }
    let series = by_continent
        .into_iter()
        .map(|(name, points)| Series { name, points })
        .collect();
    Ok(OutputValue::Lines(SeriesChart {
        title: format!("Average {} Over Time by Continent", label),
        y_label: format!("Avg {}", label),
        series,
    }))
}

/// Integer formatting with thousands separators, e.g. 44500 -> "44,500".
fn thousands(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::selection::ContinentSelection;

    fn rec(country: &str, continent: &str, year: u16, life_exp: f64, gdp: f64) -> Record {
        Record {
            country: country.into(),
            continent: continent.into(),
            year,
            life_exp,
            hdi_index: 0.7,
            co2_consump: 4.0,
            gdp,
            services: 50.0,
        }
    }

    fn sample_data() -> DashboardData {
        DashboardData {
            dataset: vec![
                rec("Japan", "Asia", 2009, 8.0, 40_000.0),
                rec("Japan", "Asia", 2010, 10.0, 44_500.0),
                rec("India", "Asia", 2010, 66.0, 1_400.0),
                rec("Chile", "South America", 2010, 78.0, 13_000.0),
            ],
            geo: None,
        }
    }

    fn selection(data: &DashboardData) -> Selection {
        let mut sel = Selection::initial(&data.dataset);
        sel.year = 2010;
        sel
    }

    #[test]
    fn options_carry_sentinel_and_valid_countries() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.continents = ContinentSelection::only(["Asia"]);
        let value = compute_country_options(&data, &sel).unwrap();
        match value {
            OutputValue::CountryOptions(opts) => {
                assert_eq!(opts.options, vec!["(All)", "Japan", "India"]);
                assert_eq!(opts.corrected, CountrySelection::All);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn invalid_country_corrects_to_first_option() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.continents = ContinentSelection::only(["Asia"]);
        sel.countries = CountrySelection::one("Chile");
        let corrected = correct_countries(
            &countries_in(&data.dataset, &sel.continents),
            &sel.countries,
            None,
        );
        assert_eq!(corrected, CountrySelection::one("Japan"));
    }

    #[test]
    fn map_click_wins_over_dropdown_value() {
        let data = sample_data();
        let valid = countries_in(&data.dataset, &ContinentSelection::only(["Asia"]));
        let corrected = correct_countries(&valid, &CountrySelection::one("Japan"), Some("India"));
        assert_eq!(corrected, CountrySelection::one("India"));
        // a click outside the continent filter falls back to normal correction
        let corrected = correct_countries(&valid, &CountrySelection::one("Japan"), Some("Chile"));
        assert_eq!(corrected, CountrySelection::one("Japan"));
    }

    #[test]
    fn continent_without_countries_resolves_to_empty_subset() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.continents = ContinentSelection::only(["Oceania"]);
        sel.countries = CountrySelection::one("Japan");
        let value = compute_country_options(&data, &sel).unwrap();
        match value {
            OutputValue::CountryOptions(opts) => {
                assert!(opts.options.is_empty());
                assert_eq!(opts.corrected, CountrySelection::Only(Default::default()));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn cards_report_averages_and_change() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.continents = ContinentSelection::only(["Asia"]);
        sel.countries = CountrySelection::one("Japan");
        // cards ignore the country filter; Asia 2010 averages Japan + India
        let value = compute_summary_cards(&data, &sel).unwrap();
        match value {
            OutputValue::SummaryCards(cards) => {
                assert_eq!(cards.cards[0].value, "38.00 years");
                assert_eq!(cards.cards[1].value, "$22,950");
                assert_eq!(cards.cards[2].value, "50.00%");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn card_change_matches_the_contract() {
        // Japan only: 8.0 in 2009, 10.0 in 2010 -> +25.00%
        let data = DashboardData {
            dataset: vec![
                rec("Japan", "Asia", 2009, 8.0, 100.0),
                rec("Japan", "Asia", 2010, 10.0, 100.0),
            ],
            geo: None,
        };
        let sel = selection(&data);
        let value = compute_summary_cards(&data, &sel).unwrap();
        match value {
            OutputValue::SummaryCards(cards) => {
                assert_eq!(cards.cards[0].change, Change::Up(25.0));
                assert_eq!(cards.cards[0].change.to_string(), "\u{25b2}25.00%");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn empty_filters_yield_empty_states_not_errors() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.year = 1900;
        sel.year_range = (1900, 1901);

        match compute_summary_cards(&data, &sel).unwrap() {
            OutputValue::SummaryCards(cards) => {
                for card in &cards.cards {
                    assert_eq!(card.value, NO_DATA);
                    assert_eq!(card.change, Change::Unavailable);
                }
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        match compute_bubble_chart(&data, &sel).unwrap() {
            OutputValue::Bubble(fig) => assert!(fig.points.is_empty()),
            other => panic!("unexpected payload: {:?}", other),
        }
        match compute_country_trend(&data, &sel).unwrap() {
            OutputValue::Lines(chart) => {
                assert_eq!(chart.title, "No data available");
                assert!(chart.series.is_empty());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn downgraded_trend_state_matches_the_natural_empty_state() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.year_range = (1900, 1901);
        assert_eq!(
            compute_country_trend(&data, &sel).unwrap(),
            OutputKind::CountryTrend.empty_value(&sel)
        );
        assert_eq!(
            compute_continent_trend(&data, &sel).unwrap(),
            OutputKind::ContinentTrend.empty_value(&sel)
        );
    }

    #[test]
    fn map_without_geo_is_a_compute_failure() {
        let data = sample_data();
        let sel = selection(&data);
        assert!(matches!(
            compute_map_chart(&data, &sel),
            Err(OutputError::MissingGeo)
        ));
    }

    #[test]
    fn map_joins_against_boundaries() {
        let mut data = sample_data();
        let mut geo = crate::models::GeoDataset::new();
        geo.insert(
            "Japan".into(),
            crate::models::GeoFeature {
                country: "Japan".into(),
                rings: vec![vec![(138.0, 36.0), (140.0, 36.0), (139.0, 38.0)]],
            },
        );
        data.geo = Some(geo);
        let sel = selection(&data);
        match compute_map_chart(&data, &sel).unwrap() {
            OutputValue::Map(fig) => {
                assert_eq!(fig.values, vec![("Japan".to_string(), 10.0)]);
                assert_eq!(fig.title, "Life Expectancy in 2010");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn bubble_axes_use_global_extents() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.continents = ContinentSelection::only(["South America"]);
        match compute_bubble_chart(&data, &sel).unwrap() {
            OutputValue::Bubble(fig) => {
                assert_eq!(fig.points.len(), 1);
                // frame spans the whole dataset, not just the filtered rows
                assert_eq!(fig.y_range, (8.0, 78.0));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn continent_trend_averages_per_year() {
        let data = sample_data();
        let mut sel = selection(&data);
        sel.year_range = (2010, 2010);
        match compute_continent_trend(&data, &sel).unwrap() {
            OutputValue::Lines(chart) => {
                assert_eq!(chart.series.len(), 2);
                assert_eq!(chart.series[0].name, "Asia");
                assert_eq!(chart.series[0].points, vec![(2010, 38.0)]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.4), "999");
        assert_eq!(thousands(44_500.0), "44,500");
        assert_eq!(thousands(1_234_567.0), "1,234,567");
        assert_eq!(thousands(-5_000.0), "-5,000");
    }
}
