use std::collections::BTreeSet;

use crate::models::{MetricId, Record};

/// Dropdown sentinel meaning "no filter".
pub const ALL_SENTINEL: &str = "(All)";

/// The controls a user can change, one variant per selection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionField {
    Continents,
    Countries,
    Metric,
    Year,
    YearRange,
    MapClick,
}

impl SelectionField {
    pub const ALL: [SelectionField; 6] = [
        SelectionField::Continents,
        SelectionField::Countries,
        SelectionField::Metric,
        SelectionField::Year,
        SelectionField::YearRange,
        SelectionField::MapClick,
    ];
}

/// Continent filter: everything, or an explicit set. A tagged variant instead
/// of a value that is sometimes a string and sometimes a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinentSelection {
    All,
    Only(BTreeSet<String>),
}

impl ContinentSelection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContinentSelection::Only(names.into_iter().map(Into::into).collect())
    }

    /// Normalize a widget's label list: the "(All)" sentinel anywhere in the
    /// list means no filter.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            if label.as_ref() == ALL_SENTINEL {
                return ContinentSelection::All;
            }
            set.insert(label.as_ref().to_string());
        }
        ContinentSelection::Only(set)
    }

    pub fn matches(&self, continent: &str) -> bool {
        match self {
            ContinentSelection::All => true,
            ContinentSelection::Only(set) => set.contains(continent),
        }
    }
}

/// Country filter, same shape as the continent filter. `Only` with an empty
/// set is the explicit empty selection a correction falls back to when a
/// continent has no countries at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountrySelection {
    All,
    Only(BTreeSet<String>),
}

impl CountrySelection {
    pub fn one(name: impl Into<String>) -> Self {
        CountrySelection::Only(BTreeSet::from([name.into()]))
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CountrySelection::Only(names.into_iter().map(Into::into).collect())
    }

    /// Normalize a widget value that may be a single label or a label list.
    /// This is the one place the scalar-vs-list shape is resolved.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            if label.as_ref() == ALL_SENTINEL {
                return CountrySelection::All;
            }
            set.insert(label.as_ref().to_string());
        }
        CountrySelection::Only(set)
    }

    pub fn matches(&self, country: &str) -> bool {
        match self {
            CountrySelection::All => true,
            CountrySelection::Only(set) => set.contains(country),
        }
    }
}

/// Live state of every control in one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub continents: ContinentSelection,
    pub countries: CountrySelection,
    pub metric: MetricId,
    /// Single-year slider driving the map, bubble chart and cards.
    pub year: u16,
    /// Range slider driving the trend charts.
    pub year_range: (u16, u16),
    /// Pending map click. Takes precedence during the event that delivers
    /// it and is consumed by that event's update pass.
    pub map_click: Option<String>,
}

impl Selection {
    /// Starting state for a fresh session: no filters, the latest year, the
    /// full year span, life expectancy as the metric.
    pub fn initial(data: &[Record]) -> Self {
        let min_year = data.iter().map(|r| r.year).min().unwrap_or(0);
        let max_year = data.iter().map(|r| r.year).max().unwrap_or(0);
        Selection {
            continents: ContinentSelection::All,
            countries: CountrySelection::All,
            metric: MetricId::LifeExp,
            year: max_year,
            year_range: (min_year, max_year),
            map_click: None,
        }
    }

    /// Apply one typed change event and report which field it touched.
    pub fn apply(&mut self, change: SelectionChange) -> SelectionField {
        let field = change.field();
        match change {
            SelectionChange::Continents(v) => self.continents = v,
            SelectionChange::Countries(v) => self.countries = v,
            SelectionChange::Metric(v) => self.metric = v,
            SelectionChange::Year(v) => self.year = v,
            SelectionChange::YearRange(lo, hi) => self.year_range = (lo.min(hi), lo.max(hi)),
            SelectionChange::MapClick(v) => self.map_click = v,
        }
        field
    }
}

/// A typed control-change event, `{field, newValue}` at the UI boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    Continents(ContinentSelection),
    Countries(CountrySelection),
    Metric(MetricId),
    Year(u16),
    YearRange(u16, u16),
    MapClick(Option<String>),
}

impl SelectionChange {
    pub fn field(&self) -> SelectionField {
        match self {
            SelectionChange::Continents(_) => SelectionField::Continents,
            SelectionChange::Countries(_) => SelectionField::Countries,
            SelectionChange::Metric(_) => SelectionField::Metric,
            SelectionChange::Year(_) => SelectionField::Year,
            SelectionChange::YearRange(_, _) => SelectionField::YearRange,
            SelectionChange::MapClick(_) => SelectionField::MapClick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sentinel_normalizes_to_all() {
        let sel = CountrySelection::from_labels(["Japan", ALL_SENTINEL, "Chile"]);
        assert_eq!(sel, CountrySelection::All);
        let sel = ContinentSelection::from_labels([ALL_SENTINEL]);
        assert_eq!(sel, ContinentSelection::All);
    }

    #[test]
    fn single_label_becomes_a_singleton_subset() {
        let sel = CountrySelection::from_labels(["Japan"]);
        assert_eq!(sel, CountrySelection::one("Japan"));
        assert!(sel.matches("Japan"));
        assert!(!sel.matches("Chile"));
    }

    #[test]
    fn year_range_is_reordered() {
        let mut sel = Selection {
            continents: ContinentSelection::All,
            countries: CountrySelection::All,
            metric: MetricId::Gdp,
            year: 2010,
            year_range: (2000, 2020),
            map_click: None,
        };
        let field = sel.apply(SelectionChange::YearRange(2015, 2005));
        assert_eq!(field, SelectionField::YearRange);
        assert_eq!(sel.year_range, (2005, 2015));
    }
}
