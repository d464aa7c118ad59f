use sqlx::{Postgres, QueryBuilder};

use crate::models::{Cents, Property, PropertyType};
use crate::search::filters::PropertyFilters;

/// One condition over the `properties` table. A search is the conjunction of
/// every predicate `compile` returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Available,
    /// Case-insensitive literal substring of title, description or address
    Text(String),
    MinPrice(Cents),
    MaxPrice(Cents),
    PropertyTypeIn(Vec<PropertyType>),
    University(String),
    /// Exact match, unlike bathrooms
    Bedrooms(i32),
    MinBathrooms(f64),
    MaxDistance(f64),
    HasAmenity(String),
}

pub fn compile(filters: &PropertyFilters) -> Vec<Predicate> {
    let mut predicates = vec![Predicate::Available];

    if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        predicates.push(Predicate::Text(search.to_string()));
    }
    if let Some(min) = filters.min_price {
        predicates.push(Predicate::MinPrice(min));
    }
    if let Some(max) = filters.max_price {
        predicates.push(Predicate::MaxPrice(max));
    }
    if !filters.property_types.is_empty() {
        predicates.push(Predicate::PropertyTypeIn(filters.property_types.clone()));
    }
    if let Some(university) = &filters.university {
        predicates.push(Predicate::University(university.clone()));
    }
    if let Some(bedrooms) = filters.bedrooms {
        predicates.push(Predicate::Bedrooms(bedrooms));
    }
    if let Some(bathrooms) = filters.bathrooms {
        predicates.push(Predicate::MinBathrooms(bathrooms));
    }
    if let Some(distance) = filters.max_distance {
        predicates.push(Predicate::MaxDistance(distance));
    }
    predicates.extend(
        filters
            .amenities
            .iter()
            .map(|amenity| Predicate::HasAmenity(amenity.clone())),
    );

    predicates
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Predicate {
    /// In-process evaluation with the same semantics as the SQL rendering.
    /// A NULL column never satisfies a comparison.
    pub fn matches(&self, property: &Property) -> bool {
        match self {
            Predicate::Available => property.available,
            Predicate::Text(text) => {
                let needle = text.to_lowercase();
                let hit = |field: &str| field.to_lowercase().contains(&needle);
                hit(&property.title)
                    || property.description.as_deref().is_some_and(hit)
                    || hit(&property.address)
            }
            Predicate::MinPrice(min) => property.price >= *min,
            Predicate::MaxPrice(max) => property.price <= *max,
            Predicate::PropertyTypeIn(kinds) => kinds.contains(&property.property_type),
            Predicate::University(university) => property.university == *university,
            Predicate::Bedrooms(bedrooms) => property.bedrooms == Some(*bedrooms),
            Predicate::MinBathrooms(min) => property.bathrooms.is_some_and(|b| b >= *min),
            Predicate::MaxDistance(max) => property.distance_to_campus.is_some_and(|d| d <= *max),
            Predicate::HasAmenity(amenity) => property.amenities.contains(amenity),
        }
    }

    pub fn push_sql<'args>(&self, query: &mut QueryBuilder<'args, Postgres>) {
        match self {
            Predicate::Available => {
                query.push("available = TRUE");
            }
            Predicate::Text(text) => {
                let pattern = format!("%{}%", escape_like(text));
                query
                    .push("(title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR address ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Predicate::MinPrice(min) => {
                query.push("price >= ").push_bind(min.get());
            }
            Predicate::MaxPrice(max) => {
                query.push("price <= ").push_bind(max.get());
            }
            Predicate::PropertyTypeIn(kinds) => {
                let kinds: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
                query.push("property_type = ANY(").push_bind(kinds).push(")");
            }
            Predicate::University(university) => {
                query.push("university = ").push_bind(university.clone());
            }
            Predicate::Bedrooms(bedrooms) => {
                query.push("bedrooms = ").push_bind(*bedrooms);
            }
            Predicate::MinBathrooms(min) => {
                query.push("bathrooms >= ").push_bind(*min);
            }
            Predicate::MaxDistance(max) => {
                query.push("distance_to_campus <= ").push_bind(*max);
            }
            Predicate::HasAmenity(amenity) => {
                query.push_bind(amenity.clone()).push(" = ANY(amenities)");
            }
        }
    }
}

pub fn matches_all(predicates: &[Predicate], property: &Property) -> bool {
    predicates.iter().all(|predicate| predicate.matches(property))
}

/// Append ` WHERE p1 AND p2 ...`. Nothing is appended for an empty slice.
pub fn push_where<'args>(query: &mut QueryBuilder<'args, Postgres>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        predicate.push_sql(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::listing;

    fn cents(dollars: i64) -> Cents {
        Cents::new(dollars * 100).unwrap()
    }

    #[test]
    fn empty_filters_only_require_availability() {
        assert_eq!(compile(&PropertyFilters::default()), vec![Predicate::Available]);
    }

    #[test]
    fn empty_sets_add_no_restriction() {
        let filters = PropertyFilters {
            property_types: vec![],
            amenities: vec![],
            ..Default::default()
        };
        assert_eq!(compile(&filters).len(), 1);
    }

    #[test]
    fn each_amenity_becomes_its_own_predicate() {
        let filters = PropertyFilters {
            amenities: vec!["WiFi Included".to_string(), "Parking".to_string()],
            ..Default::default()
        };
        assert_eq!(
            compile(&filters),
            vec![
                Predicate::Available,
                Predicate::HasAmenity("WiFi Included".to_string()),
                Predicate::HasAmenity("Parking".to_string()),
            ]
        );
    }

    #[test]
    fn renders_parameterized_sql_in_compile_order() {
        let filters = PropertyFilters {
            search: Some("50%".to_string()),
            min_price: Some(cents(500)),
            max_price: Some(cents(1500)),
            property_types: vec![PropertyType::Studio, PropertyType::Dorm],
            amenities: vec!["Parking".to_string()],
            max_distance: Some(1.5),
            university: Some("Cornell University".to_string()),
            bedrooms: Some(2),
            bathrooms: Some(1.5),
        };

        let mut query = QueryBuilder::<Postgres>::new("SELECT id FROM properties");
        push_where(&mut query, &compile(&filters));

        assert_eq!(
            query.sql(),
            "SELECT id FROM properties WHERE available = TRUE \
             AND (title ILIKE $1 OR description ILIKE $2 OR address ILIKE $3) \
             AND price >= $4 AND price <= $5 \
             AND property_type = ANY($6) \
             AND university = $7 \
             AND bedrooms = $8 \
             AND bathrooms >= $9 \
             AND distance_to_campus <= $10 \
             AND $11 = ANY(amenities)"
        );
    }

    #[test]
    fn like_metacharacters_are_literal() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn text_matches_any_of_three_fields_ignoring_case() {
        let mut property = listing(1, 900);
        property.title = "Cozy Studio".to_string();
        property.description = None;
        property.address = "400 Elm Street".to_string();

        assert!(Predicate::Text("cozy".to_string()).matches(&property));
        assert!(Predicate::Text("ELM".to_string()).matches(&property));
        assert!(!Predicate::Text("pool".to_string()).matches(&property));
    }

    #[test]
    fn bedrooms_exact_bathrooms_threshold() {
        let mut property = listing(1, 900);
        property.bedrooms = Some(3);
        property.bathrooms = Some(2.0);

        assert!(!Predicate::Bedrooms(2).matches(&property));
        assert!(Predicate::Bedrooms(3).matches(&property));
        assert!(Predicate::MinBathrooms(1.5).matches(&property));
        assert!(!Predicate::MinBathrooms(2.5).matches(&property));
    }

    #[test]
    fn university_must_match_exactly() {
        let property = listing(1, 900);

        assert!(Predicate::University("Cornell University".to_string()).matches(&property));
        assert!(!Predicate::University("Ithaca College".to_string()).matches(&property));
        assert!(!Predicate::University("Cornell".to_string()).matches(&property));
    }

    #[test]
    fn max_distance_includes_the_boundary() {
        let mut property = listing(1, 900);
        property.distance_to_campus = Some(1.5);

        assert!(Predicate::MaxDistance(1.5).matches(&property));
        assert!(Predicate::MaxDistance(2.0).matches(&property));
        assert!(!Predicate::MaxDistance(1.49).matches(&property));
    }

    #[test]
    fn null_columns_fail_comparisons() {
        let mut property = listing(1, 900);
        property.bedrooms = None;
        property.bathrooms = None;
        property.distance_to_campus = None;

        assert!(!Predicate::Bedrooms(0).matches(&property));
        assert!(!Predicate::MinBathrooms(0.0).matches(&property));
        assert!(!Predicate::MaxDistance(100.0).matches(&property));
    }

    #[test]
    fn price_bounds_compare_in_cents() {
        let property = listing(1, 1000);
        assert!(Predicate::MinPrice(Cents::new(100_000).unwrap()).matches(&property));
        assert!(!Predicate::MinPrice(Cents::new(100_001).unwrap()).matches(&property));
        assert!(Predicate::MaxPrice(Cents::new(100_000).unwrap()).matches(&property));
    }
}
