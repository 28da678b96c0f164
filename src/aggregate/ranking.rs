//! Deterministic leaderboard ranking
//!
//! Ties on the metric are always broken by name ascending, so a leaderboard
//! depends only on its inputs and never on their order.

use crate::models::RankedEntry;
use std::cmp::Ordering;

/// Direction of the primary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Highest value first (top lists)
    Descending,
    /// Lowest value first (bottom lists)
    Ascending,
}

/// One entity competing for a leaderboard slot.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub display_name: Option<&'a str>,
    pub value: i64,
}

impl<'a> Candidate<'a> {
    pub fn new(name: &'a str, value: i64) -> Self {
        Self {
            name,
            display_name: None,
            value,
        }
    }

    pub fn with_display_name(mut self, display_name: &'a str) -> Self {
        self.display_name = Some(display_name);
        self
    }
}

fn compare(a: &Candidate<'_>, b: &Candidate<'_>, order: Order) -> Ordering {
    let primary = match order {
        Order::Descending => b.value.cmp(&a.value),
        Order::Ascending => a.value.cmp(&b.value),
    };
    primary.then_with(|| a.name.cmp(b.name))
}

/// Sort `candidates` and keep the first `limit`, numbering from 1.
pub fn rank<'a>(
    candidates: impl IntoIterator<Item = Candidate<'a>>,
    order: Order,
    limit: usize,
) -> Vec<RankedEntry> {
    let mut candidates: Vec<Candidate<'a>> = candidates.into_iter().collect();
    candidates.sort_by(|a, b| compare(a, b, order));

    candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| RankedEntry {
            rank: i + 1,
            name: c.name.to_string(),
            display_name: c.display_name.map(str::to_string),
            value: c.value,
        })
        .collect()
}
