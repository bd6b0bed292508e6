use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use super::aggregate::Order;
use super::value_objects::OrderStatus;

/// Optional order filters. Every supplied filter must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSearchParams {
    pub supplying_facility_id: Option<Uuid>,
    pub requesting_facility_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub processing_period_id: Option<Uuid>,
    pub statuses: HashSet<OrderStatus>,
    pub period_start_date: Option<NaiveDate>,
    pub period_end_date: Option<NaiveDate>,
}

impl OrderSearchParams {
    pub fn matches(&self, order: &Order) -> bool {
        let created = order.created_date.date_naive();

        self.supplying_facility_id.map_or(true, |id| order.supplying_facility_id == id)
            && self.requesting_facility_id.map_or(true, |id| order.requesting_facility_id == id)
            && self.program_id.map_or(true, |id| order.program_id == id)
            && self.processing_period_id.map_or(true, |id| order.processing_period_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.period_start_date.map_or(true, |start| created >= start)
            && self.period_end_date.map_or(true, |end| created <= end)
    }
}
