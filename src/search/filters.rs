//! Query-string boundary for property search. Everything the predicate
//! compiler sees has been validated and coerced here.

use thiserror::Error;
use url::form_urlencoded;

use crate::models::{Cents, PropertyType};
use crate::search::page::{PageRequest, SortBy};

/// Search criteria. Unset fields and empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilters {
    pub search: Option<String>,
    pub min_price: Option<Cents>,
    pub max_price: Option<Cents>,
    pub property_types: Vec<PropertyType>,
    pub amenities: Vec<String>,
    pub max_distance: Option<f64>,
    pub university: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {param}: {reason}")]
pub struct FilterError {
    pub param: &'static str,
    pub reason: String,
}

impl FilterError {
    fn new(param: &'static str, reason: impl ToString) -> Self {
        Self {
            param,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: crate::search::page::DEFAULT_LIMIT,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filters: PropertyFilters,
    pub page: PageRequest,
    pub sort: Option<SortBy>,
}

fn parse_non_negative_f64(param: &'static str, value: &str) -> Result<f64, FilterError> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| FilterError::new(param, "expected a number"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(FilterError::new(param, "expected a non-negative number"));
    }
    Ok(parsed)
}

fn parse_non_negative_int<T>(param: &'static str, value: &str) -> Result<T, FilterError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed: T = value
        .parse()
        .map_err(|_| FilterError::new(param, "expected a whole number"))?;
    if parsed < T::default() {
        return Err(FilterError::new(param, "expected a non-negative number"));
    }
    Ok(parsed)
}

fn push_unique<T: PartialEq>(set: &mut Vec<T>, value: T) {
    if !set.contains(&value) {
        set.push(value);
    }
}

impl SearchRequest {
    /// Parse a raw query string. List parameters are given by repeating the
    /// key (`propertyTypes=studio&propertyTypes=dorm`). Blank values count as
    /// absent; unknown keys are ignored. Prices are dollars.
    pub fn from_query(query: Option<&str>, limits: PageLimits) -> Result<Self, FilterError> {
        let mut filters = PropertyFilters::default();
        let mut page = PageRequest::new(limits.default_limit, 0);
        let mut sort = None;

        let pairs = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect::<Vec<_>>())
            .unwrap_or_default();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.as_str() {
                "search" => filters.search = Some(value.to_string()),
                "minPrice" => {
                    filters.min_price = Some(
                        Cents::from_dollars(value).map_err(|e| FilterError::new("minPrice", e))?,
                    )
                }
                "maxPrice" => {
                    filters.max_price = Some(
                        Cents::from_dollars(value).map_err(|e| FilterError::new("maxPrice", e))?,
                    )
                }
                "propertyTypes" => {
                    let kind = value
                        .parse::<PropertyType>()
                        .map_err(|e| FilterError::new("propertyTypes", e))?;
                    push_unique(&mut filters.property_types, kind);
                }
                "amenities" => push_unique(&mut filters.amenities, value.to_string()),
                "maxDistance" => {
                    filters.max_distance = Some(parse_non_negative_f64("maxDistance", value)?)
                }
                "university" => filters.university = Some(value.to_string()),
                "bedrooms" => filters.bedrooms = Some(parse_non_negative_int("bedrooms", value)?),
                "bathrooms" => {
                    filters.bathrooms = Some(parse_non_negative_f64("bathrooms", value)?)
                }
                "limit" => {
                    let limit: i64 = parse_non_negative_int("limit", value)?;
                    if limit == 0 {
                        return Err(FilterError::new("limit", "must be at least 1"));
                    }
                    page.limit = limit.min(limits.max_limit);
                }
                "offset" => page.offset = parse_non_negative_int("offset", value)?,
                "sort" => {
                    sort = Some(
                        value
                            .parse::<SortBy>()
                            .map_err(|e| FilterError::new("sort", e))?,
                    )
                }
                _ => {}
            }
        }

        Ok(Self {
            filters,
            page,
            sort,
        })
    }
}
