use std::fmt;

use itertools::Itertools;
use ndarray::Array1;
use ndarray_stats::QuantileExt;
use statrs::statistics::{Data, Distribution};

use crate::models::{MetricId, Record};
use crate::selection::{ContinentSelection, CountrySelection};

/// Year predicate shared by all chart outputs: the single-year slider or the
/// range slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearFilter {
    Exact(u16),
    Range(u16, u16),
}

impl YearFilter {
    fn matches(self, year: u16) -> bool {
        match self {
            YearFilter::Exact(y) => year == y,
            YearFilter::Range(lo, hi) => (lo..=hi).contains(&year),
        }
    }
}

/// The base filter pipeline every output applies before its own aggregation:
/// year membership, then continent membership, then (for country-scoped
/// outputs) country membership. `All` filters are skipped.
pub fn filter_records<'a>(
    data: &'a [Record],
    years: YearFilter,
    continents: &ContinentSelection,
    countries: Option<&CountrySelection>,
) -> Vec<&'a Record> {
    data.iter()
        .filter(|r| years.matches(r.year))
        .filter(|r| continents.matches(&r.continent))
        .filter(|r| countries.map_or(true, |c| c.matches(&r.country)))
        .collect()
}

/// Mean of one metric over a filtered row set. None when the set is empty.
pub fn metric_mean(rows: &[&Record], metric: MetricId) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let values: Vec<f64> = rows.iter().map(|r| r.metric(metric)).collect();
    Data::new(values).mean()
}

/// Per-(year, continent) mean of one metric, years ascending, continents
/// ascending within a year. Feeds the continent trend chart.
pub fn continent_year_means(rows: &[&Record], metric: MetricId) -> Vec<(u16, String, f64)> {
    rows.iter()
        .map(|r| ((r.year, r.continent.clone()), r.metric(metric)))
        .into_group_map()
        .into_iter()
        .filter_map(|((year, continent), values)| {
            Data::new(values).mean().map(|m| (year, continent, m))
        })
        .sorted_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)))
        .collect()
}

/// Global (min, max) of a metric over the whole dataset. Used to pin chart
/// axes and the map color scale so the frame stays put while filters change.
pub fn metric_extent(data: &[Record], metric: MetricId) -> Option<(f64, f64)> {
    if data.is_empty() {
        return None;
    }
    let arr = Array1::from_iter(data.iter().map(|r| r.metric(metric)));
    let min = *arr.min().ok()?;
    let max = *arr.max().ok()?;
    Some((min, max))
}

/// Year-over-year percentage change for the summary cards. A missing or zero
/// previous average is reported as unavailable, never computed as a division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Up(f64),
    Down(f64),
    Unavailable,
}

pub fn pct_change(current: Option<f64>, previous: Option<f64>) -> Change {
    let (current, previous) = match (current, previous) {
        (Some(c), Some(p)) => (c, p),
        _ => return Change::Unavailable,
    };
    if previous == 0.0 || previous.is_nan() || current.is_nan() {
        return Change::Unavailable;
    }
    let change = (current - previous) / previous * 100.0;
    if change > 0.0 {
        Change::Up(change)
    } else {
        Change::Down(change.abs())
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Up(pct) => write!(f, "\u{25b2}{:.2}%", pct),
            Change::Down(pct) => write!(f, "\u{1f53b}{:.2}%", pct),
            Change::Unavailable => f.write_str("n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, continent: &str, year: u16, life_exp: f64) -> Record {
        Record {
            country: country.into(),
            continent: continent.into(),
            year,
            life_exp,
            hdi_index: 0.7,
            co2_consump: 4.0,
            gdp: 10_000.0,
            services: 50.0,
        }
    }

    #[test]
    fn pipeline_filters_year_then_continent_then_country() {
        let data = vec![
            rec("Japan", "Asia", 2010, 82.0),
            rec("India", "Asia", 2010, 66.0),
            rec("Japan", "Asia", 2011, 82.2),
            rec("Chile", "South America", 2010, 78.0),
        ];
        let asia = ContinentSelection::only(["Asia"]);
        let japan = CountrySelection::one("Japan");

        let rows = filter_records(&data, YearFilter::Exact(2010), &asia, None);
        assert_eq!(rows.len(), 2);

        let rows = filter_records(&data, YearFilter::Exact(2010), &asia, Some(&japan));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country, "Japan");

        let rows = filter_records(
            &data,
            YearFilter::Range(2010, 2011),
            &ContinentSelection::All,
            Some(&CountrySelection::All),
        );
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn means_and_grouping() {
        let data = vec![
            rec("Japan", "Asia", 2010, 80.0),
            rec("India", "Asia", 2010, 60.0),
            rec("Chile", "South America", 2010, 78.0),
            rec("Japan", "Asia", 2011, 81.0),
        ];
        let rows = filter_records(
            &data,
            YearFilter::Range(2010, 2011),
            &ContinentSelection::All,
            None,
        );
        assert_eq!(
            metric_mean(
                &filter_records(
                    &data,
                    YearFilter::Exact(2010),
                    &ContinentSelection::only(["Asia"]),
                    None
                ),
                MetricId::LifeExp
            ),
            Some(70.0)
        );
        let grouped = continent_year_means(&rows, MetricId::LifeExp);
        assert_eq!(
            grouped,
            vec![
                (2010, "Asia".to_string(), 70.0),
                (2010, "South America".to_string(), 78.0),
                (2011, "Asia".to_string(), 81.0),
            ]
        );
    }

    #[test]
    fn empty_rows_have_no_mean() {
        assert_eq!(metric_mean(&[], MetricId::Gdp), None);
        assert_eq!(metric_extent(&[], MetricId::Gdp), None);
    }

    #[test]
    fn extent_spans_the_whole_dataset() {
        let data = vec![
            rec("Japan", "Asia", 2010, 82.0),
            rec("India", "Asia", 2010, 66.0),
            rec("Chile", "South America", 2010, 78.0),
        ];
        assert_eq!(metric_extent(&data, MetricId::LifeExp), Some((66.0, 82.0)));
    }

    #[test]
    fn change_up_formats_per_contract() {
        assert_eq!(pct_change(Some(10.0), Some(8.0)), Change::Up(25.0));
        assert_eq!(pct_change(Some(10.0), Some(8.0)).to_string(), "\u{25b2}25.00%");
    }

    #[test]
    fn zero_or_missing_previous_is_unavailable() {
        assert_eq!(pct_change(Some(10.0), Some(0.0)), Change::Unavailable);
        assert_eq!(pct_change(Some(10.0), None), Change::Unavailable);
        assert_eq!(pct_change(None, Some(5.0)), Change::Unavailable);
        assert_eq!(pct_change(Some(10.0), Some(0.0)).to_string(), "n/a");
    }

    #[test]
    fn decrease_reports_absolute_percentage() {
        assert_eq!(pct_change(Some(8.0), Some(10.0)), Change::Down(20.0));
    }
}
