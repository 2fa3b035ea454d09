use itertools::Itertools;

use crate::models::{MetricId, MetricInfo, Record};
use crate::selection::ContinentSelection;

/// Distinct continent names, sorted ascending. Sorting (rather than
/// first-seen order) keeps the list stable regardless of row order in the
/// source.
pub fn continents(data: &[Record]) -> Vec<String> {
    data.iter()
        .map(|r| r.continent.clone())
        .sorted()
        .dedup()
        .collect()
}

/// Distinct years, ascending.
pub fn years(data: &[Record]) -> Vec<u16> {
    data.iter().map(|r| r.year).sorted().dedup().collect()
}

/// Every `step`-th distinct year, for coarse slider marks.
pub fn years_decimated(data: &[Record], step: usize) -> Vec<u16> {
    years(data).into_iter().step_by(step.max(1)).collect()
}

/// Distinct countries under a continent filter, in the dataset's first-seen
/// order (the order the dropdown shows them in).
pub fn countries_in(data: &[Record], continents: &ContinentSelection) -> Vec<String> {
    data.iter()
        .filter(|r| continents.matches(&r.continent))
        .map(|r| r.country.clone())
        .unique()
        .collect()
}

const METRIC_CATALOG: [MetricInfo; 5] = [
    MetricInfo {
        id: MetricId::LifeExp,
        label: "Life Expectancy",
        definition: "Average number of years a newborn is expected to live.",
    },
    MetricInfo {
        id: MetricId::HdiIndex,
        label: "HDI",
        definition: "Human Development Index, a composite of health, education and income.",
    },
    MetricInfo {
        id: MetricId::Co2Consump,
        label: "CO2 Emissions per Person (tonnes)",
        definition: "Consumption-based carbon dioxide emissions per person per year.",
    },
    MetricInfo {
        id: MetricId::Gdp,
        label: "GDP per Capita (USD)",
        definition: "Gross domestic product per person in US dollars.",
    },
    MetricInfo {
        id: MetricId::Services,
        label: "Service Workers Percentage (%)",
        definition: "Share of the workforce employed in the service sector.",
    },
];

/// Fixed, hand-authored metric table. Not derived from data.
pub fn metric_catalog() -> &'static [MetricInfo] {
    &METRIC_CATALOG
}

/// Display label for a metric id.
pub fn metric_label(id: MetricId) -> &'static str {
    METRIC_CATALOG
        .iter()
        .find(|m| m.id == id)
        .map(|m| m.label)
        .unwrap_or(id.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(country: &str, continent: &str, year: u16) -> Record {
        Record {
            country: country.into(),
            continent: continent.into(),
            year,
            life_exp: 70.0,
            hdi_index: 0.7,
            co2_consump: 4.0,
            gdp: 10_000.0,
            services: 50.0,
        }
    }

    #[test]
    fn continents_are_sorted_and_distinct() {
        let data = vec![
            rec("Japan", "Asia", 2000),
            rec("Chile", "South America", 2000),
            rec("India", "Asia", 2001),
            rec("Kenya", "Africa", 2000),
        ];
        assert_eq!(continents(&data), vec!["Africa", "Asia", "South America"]);
    }

    #[test]
    fn years_ascending_and_decimated() {
        let data: Vec<Record> = (2000..=2010).map(|y| rec("Japan", "Asia", y)).collect();
        assert_eq!(years(&data).len(), 11);
        assert_eq!(
            years_decimated(&data, 4),
            vec![2000, 2004, 2008]
        );
        // step 0 behaves like step 1 instead of panicking
        assert_eq!(years_decimated(&data, 0).len(), 11);
    }

    #[test]
    fn countries_follow_first_seen_order() {
        let data = vec![
            rec("India", "Asia", 2000),
            rec("Japan", "Asia", 2000),
            rec("Chile", "South America", 2000),
            rec("India", "Asia", 2001),
        ];
        let asia = countries_in(&data, &ContinentSelection::only(["Asia"]));
        assert_eq!(asia, vec!["India", "Japan"]);
        let all = countries_in(&data, &ContinentSelection::All);
        assert_eq!(all, vec!["India", "Japan", "Chile"]);
    }

    #[test]
    fn every_metric_has_a_catalog_entry() {
        for id in MetricId::ALL {
            assert!(metric_catalog().iter().any(|m| m.id == id));
        }
        assert_eq!(metric_label(MetricId::Gdp), "GDP per Capita (USD)");
    }
}
