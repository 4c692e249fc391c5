use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::ComparableResult;

/// Field the caller asked to sort comparables by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    /// Composite similarity score with documented tie-breaks.
    #[default]
    Score,
    SalePrice,
    Distance,
    SaleDate,
}

impl SortField {
    /// Unsupported field names fall back to score ordering.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sale_price" => Self::SalePrice,
            "distance" => Self::Distance,
            "sale_date" => Self::SaleDate,
            _ => Self::Score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Self::Asc,
            _ => Self::Desc,
        }
    }
}

/// Sort parameters recorded alongside a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Sorts in place, truncates to `limit`, then assigns dense 1-based ranks.
pub fn rank_comparables(comparables: &mut Vec<ComparableResult>, sort: SortSpec, limit: usize) {
    comparables.sort_by(|a, b| compare(a, b, sort));
    comparables.truncate(limit);
    for (index, comp) in comparables.iter_mut().enumerate() {
        comp.inclusion_rank = (index + 1) as u32;
    }
}

fn compare(a: &ComparableResult, b: &ComparableResult, sort: SortSpec) -> Ordering {
    // The direction applies only to present-key comparisons; rows missing the
    // sort key sink to the end either way.
    let directed = |ordering: Ordering| match sort.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    };
    match sort.field {
        SortField::Score => score_ordering(a, b),
        SortField::SalePrice => directed(a.sale_price.total_cmp(&b.sale_price)),
        SortField::Distance => option_cmp(a.distance_meters, b.distance_meters, |x, y| {
            directed(x.total_cmp(y))
        }),
        SortField::SaleDate => option_cmp(a.sale_date, b.sale_date, |x, y| directed(x.cmp(y))),
    }
}

/// Default ordering: total score descending, then location, time, and
/// physical sub-scores descending, then more recent sale date, then shorter
/// distance. Missing dates/distances sort last.
fn score_ordering(a: &ComparableResult, b: &ComparableResult) -> Ordering {
    b.score
        .total()
        .total_cmp(&a.score.total())
        .then_with(|| b.score.location().total_cmp(&a.score.location()))
        .then_with(|| b.score.time().total_cmp(&a.score.time()))
        .then_with(|| b.score.physical().total_cmp(&a.score.physical()))
        .then_with(|| option_cmp(b.sale_date, a.sale_date, Ord::cmp))
        .then_with(|| option_cmp(a.distance_meters, b.distance_meters, f64::total_cmp))
}

/// Compares optional keys with None ordered after any present value, so that
/// incomparable rows sink regardless of sort direction.
fn option_cmp<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (&a, &b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
