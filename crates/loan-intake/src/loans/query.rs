use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::domain::LoanApplication;

/// Raw dashboard/export filter parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl FilterParams {
    pub fn to_query(&self) -> LoanQuery {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        let dates = match (
            self.start_date.as_deref().and_then(parse_day),
            self.end_date.as_deref().and_then(parse_day),
        ) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        LoanQuery { search, dates }
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Inclusive calendar-day window over `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Upper bound (exclusive): midnight after the end day.
    pub fn upper_exclusive(&self) -> Option<NaiveDateTime> {
        self.end
            .checked_add_days(Days::new(1))
            .map(|day| day.and_time(NaiveTime::MIN))
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.start && day <= self.end
    }
}

/// Composable filter over the loan table. An empty query selects every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanQuery {
    pub search: Option<String>,
    pub dates: Option<DateRange>,
}

impl LoanQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_string())
        };
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.dates = Some(DateRange { start, end });
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.search.is_none() && self.dates.is_none()
    }

    pub fn matches(&self, record: &LoanApplication) -> bool {
        let search_hit = match &self.search {
            Some(term) => {
                let needle = term.to_lowercase();
                [
                    &record.name,
                    &record.cnic,
                    &record.purpose,
                    &record.district,
                    &record.tehsil,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        };

        let date_hit = self
            .dates
            .map(|range| range.contains(record.created_at))
            .unwrap_or(true);

        search_hit && date_hit
    }

    /// Applies the filter to an in-memory slice, returning rows newest first.
    pub fn apply<'a, I>(&self, records: I) -> Vec<LoanApplication>
    where
        I: IntoIterator<Item = &'a LoanApplication>,
    {
        let mut selected: Vec<LoanApplication> = records
            .into_iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect();
        sort_newest_first(&mut selected);
        selected
    }
}

/// Dashboard ordering: `created_at` descending, ties broken by `id` descending.
pub fn sort_newest_first(records: &mut [LoanApplication]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
