use std::str::FromStr;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::order::{OrderSearchParams, OrderStatus};
use crate::error::FulfillmentError;
use crate::pagination::Pageable;

// ============================================================================
// Query string parsing
// ============================================================================
//
// Search endpoints take repeatable keys (`status=A&status=B`), so they read
// the raw pairs instead of a derived struct.
//
// ============================================================================

pub type QueryPairs = Vec<(String, String)>;

pub fn order_search(pairs: &QueryPairs) -> Result<(OrderSearchParams, Pageable), FulfillmentError> {
    let mut params = OrderSearchParams::default();

    for (key, value) in pairs {
        match key.as_str() {
            "supplyingFacility" | "supplyingFacilityId" => params.supplying_facility_id = Some(parse(key, value)?),
            "requestingFacility" | "requestingFacilityId" => params.requesting_facility_id = Some(parse(key, value)?),
            "program" | "programId" => params.program_id = Some(parse(key, value)?),
            "processingPeriod" | "processingPeriodId" => params.processing_period_id = Some(parse(key, value)?),
            "status" => {
                params.statuses.insert(value.parse::<OrderStatus>()?);
            }
            "periodStartDate" => params.period_start_date = Some(parse::<NaiveDate>(key, value)?),
            "periodEndDate" => params.period_end_date = Some(parse::<NaiveDate>(key, value)?),
            _ => {}
        }
    }

    Ok((params, pageable(pairs)?))
}

/// `page` and `size`, defaulting to the first page of the default size.
pub fn pageable(pairs: &QueryPairs) -> Result<Pageable, FulfillmentError> {
    let mut pageable = Pageable::default();
    for (key, value) in pairs {
        match key.as_str() {
            "page" => pageable.page = parse(key, value)?,
            "size" => pageable.size = parse(key, value)?,
            _ => {}
        }
    }
    Ok(pageable)
}

pub fn optional_uuid(pairs: &QueryPairs, key: &str) -> Result<Option<Uuid>, FulfillmentError> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(k, value)| parse(k, value))
        .transpose()
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, FulfillmentError> {
    value
        .trim()
        .parse()
        .map_err(|_| FulfillmentError::Validation { key: "invalidValue", field: key.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderError;

    fn pairs(raw: &[(&str, &str)]) -> QueryPairs {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_repeated_status_builds_a_set() {
        let facility = Uuid::new_v4();
        let (params, pageable) = order_search(&pairs(&[
            ("supplyingFacility", &facility.to_string()),
            ("status", "SHIPPED"),
            ("status", "received"),
            ("periodStartDate", "2017-01-01"),
            ("size", "5"),
        ]))
        .unwrap();

        assert_eq!(params.supplying_facility_id, Some(facility));
        assert_eq!(
            params.statuses,
            [OrderStatus::Shipped, OrderStatus::Received].into_iter().collect()
        );
        assert_eq!(params.period_start_date, NaiveDate::from_ymd_opt(2017, 1, 1));
        assert_eq!(pageable, Pageable { page: 0, size: 5 });
    }

    #[test]
    fn test_unknown_status_is_invalid_status() {
        let result = order_search(&pairs(&[("status", "LOST")]));
        assert!(matches!(result, Err(FulfillmentError::Order(OrderError::UnknownStatus(_)))));
    }

    #[test]
    fn test_malformed_values_name_the_parameter() {
        let result = order_search(&pairs(&[("program", "not-a-uuid")]));
        assert!(matches!(
            result,
            Err(FulfillmentError::Validation { key: "invalidValue", ref field }) if field == "program"
        ));

        let result = pageable(&pairs(&[("page", "-1")]));
        assert!(matches!(result, Err(FulfillmentError::Validation { .. })));
    }

    #[test]
    fn test_no_parameters_means_defaults() {
        let (params, pageable) = order_search(&Vec::new()).unwrap();
        assert_eq!(params, OrderSearchParams::default());
        assert_eq!(pageable, Pageable::default());
    }
}
