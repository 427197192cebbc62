//! Back-office business flows built on the interaction engine.
//!
//! - [`login`]: authentication and tenant identity
//! - [`order`]: the daily-demand listing, order detail and line items
//!
//! [`daily_demand_scenario`] strings them together into the end-to-end
//! scenario the CLI runs.

pub mod login;
pub mod order;

use crate::driver::PageDriver;
use crate::scenario::Scenario;
use order::{DateRange, LineItemExpectation, OrderExpectation};
use serde::{Deserialize, Serialize};

/// Tenant label shown in the header after login
pub const DEFAULT_TENANT: &str = "合阔x";

/// Everything the daily-demand scenario asserts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDemandExpectations {
    /// Tenant label expected after login
    pub tenant: String,
    /// Date filter applied to the listing
    pub date_range: DateRange,
    /// Order header values
    pub order: OrderExpectation,
    /// Line item values
    pub line_items: LineItemExpectation,
}

impl Default for DailyDemandExpectations {
    fn default() -> Self {
        Self {
            tenant: DEFAULT_TENANT.to_string(),
            date_range: DateRange::default(),
            order: OrderExpectation::default(),
            line_items: LineItemExpectation::default(),
        }
    }
}

impl DailyDemandExpectations {
    /// Same expectations for another order number
    #[must_use]
    pub fn with_order_number(mut self, order_number: impl Into<String>) -> Self {
        self.order.order_number = order_number.into();
        self
    }
}

/// The eight-step daily-demand scenario
pub fn daily_demand_scenario<D: PageDriver + 'static>(expectations: DailyDemandExpectations) -> Scenario<D> {
    let DailyDemandExpectations {
        tenant,
        date_range,
        order,
        line_items,
    } = expectations;
    let list_order = order.clone();
    let detail_number = order.order_number.clone();
    let detail_order = order;

    Scenario::<D>::new(format!("daily demand {}", detail_order.order_number))
        .step("login", |page, config| {
            Box::pin(async move {
                login::authenticate(page, config, &config.profile.credentials).await
            })
        })
        .step("verify tenant", move |page, config| {
            Box::pin(async move { login::verify_tenant(page, config, &tenant).await })
        })
        .step("open daily demand", |page, config| {
            Box::pin(async move { order::navigate_to_daily_demand(page, config).await })
        })
        .step("filter by date and query", move |page, config| {
            Box::pin(async move {
                order::select_date_range_and_query(page, config, &date_range).await
            })
        })
        .step("verify order in list", move |page, config| {
            Box::pin(async move { order::find_order_in_list(page, config, &list_order).await })
        })
        .step("open order detail", move |page, config| {
            Box::pin(async move { order::open_order_detail(page, config, &detail_number).await })
        })
        .step("verify order detail", move |page, config| {
            Box::pin(async move { order::verify_order_detail(page, config, &detail_order).await })
        })
        .step("verify line items", move |page, config| {
            Box::pin(async move { order::verify_line_items(page, config, &line_items).await })
        })
}
