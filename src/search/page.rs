use std::cmp::Ordering;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Property;

pub const DEFAULT_LIMIT: i64 = 20;

/// Offset/limit window over the fixed `price ASC, id ASC` order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Slice an already-ordered result set the way `LIMIT/OFFSET` would.
    pub fn window<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(0);
        rows.into_iter().skip(offset).take(limit).collect()
    }
}

/// Store order for every search: cheapest first, id breaks ties so pages
/// never overlap.
pub fn store_order(a: &Property, b: &Property) -> Ordering {
    a.price.cmp(&b.price).then(a.id.cmp(&b.id))
}

/// Re-ordering of a fetched page. Does not change which rows the page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    PriceLow,
    PriceHigh,
    Distance,
    Rating,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort: {0}")]
pub struct UnknownSort(pub String);

impl FromStr for SortBy {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_low" => Ok(SortBy::PriceLow),
            "price_high" => Ok(SortBy::PriceHigh),
            "distance" => Ok(SortBy::Distance),
            "rating" => Ok(SortBy::Rating),
            other => Err(UnknownSort(other.to_string())),
        }
    }
}

impl SortBy {
    pub fn sort(self, page: &mut [Property]) {
        match self {
            SortBy::PriceLow => page.sort_by_key(|p| p.price),
            SortBy::PriceHigh => page.sort_by(|a, b| b.price.cmp(&a.price)),
            SortBy::Distance => page.sort_by(|a, b| {
                let a = a.distance_to_campus.unwrap_or(0.0);
                let b = b.distance_to_campus.unwrap_or(0.0);
                a.total_cmp(&b)
            }),
            SortBy::Rating => page.sort_by(|a, b| {
                let a = a.rating.unwrap_or(0.0);
                let b = b.rating.unwrap_or(0.0);
                b.total_cmp(&a)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::listing;

    #[test]
    fn window_behaves_like_limit_offset() {
        let rows: Vec<i32> = (0..10).collect();
        assert_eq!(PageRequest::new(3, 0).window(rows.clone()), vec![0, 1, 2]);
        assert_eq!(PageRequest::new(3, 8).window(rows.clone()), vec![8, 9]);
        assert!(PageRequest::new(3, 20).window(rows).is_empty());
    }

    #[test]
    fn rating_sort_puts_unrated_last() {
        let mut a = listing(1, 900);
        a.rating = None;
        let mut b = listing(2, 800);
        b.rating = Some(4.5);
        let mut c = listing(3, 700);
        c.rating = Some(3.0);

        let mut page = vec![a, b, c];
        SortBy::Rating.sort(&mut page);
        let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn price_high_reverses_store_order() {
        let mut page = vec![listing(1, 500), listing(2, 1500), listing(3, 1000)];
        SortBy::PriceHigh.sort(&mut page);
        let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn parses_client_sort_names() {
        assert_eq!("distance".parse(), Ok(SortBy::Distance));
        assert!("newest".parse::<SortBy>().is_err());
    }
}
