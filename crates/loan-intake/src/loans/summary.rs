use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::LoanApplication;

/// Headline figures shown above the dashboard table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanSummary {
    pub total: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
    pub today_count: usize,
    pub purpose_counts: BTreeMap<String, usize>,
}

impl LoanSummary {
    /// `total`, `total_amount` and `avg_amount` describe the filtered rows;
    /// `today_count` and `purpose_counts` always describe the whole store.
    pub fn compute(
        filtered: &[LoanApplication],
        all: &[LoanApplication],
        today: NaiveDate,
    ) -> Self {
        let total = filtered.len();
        let total_amount: f64 = filtered.iter().map(|record| record.amount).sum();
        let avg_amount = if total == 0 {
            0.0
        } else {
            total_amount / total as f64
        };

        let today_count = all
            .iter()
            .filter(|record| record.created_at.date() == today)
            .count();

        let mut purpose_counts = BTreeMap::new();
        for record in all {
            *purpose_counts.entry(record.purpose.clone()).or_insert(0) += 1;
        }

        Self {
            total,
            total_amount,
            avg_amount,
            today_count,
            purpose_counts,
        }
    }
}
