//! The closed set of job kinds and their payload shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of job, used for routing to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Post the accounting entries of a confirmed order.
    OrderAccounting,
    /// Recalculate stock levels and alerts for one inventory item.
    InventoryMaintenance,
    /// Refresh the KPI aggregates of a tenant.
    AnalyticsKpi,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::OrderAccounting,
        JobKind::InventoryMaintenance,
        JobKind::AnalyticsKpi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::OrderAccounting => "order-accounting",
            JobKind::InventoryMaintenance => "inventory-maintenance",
            JobKind::AnalyticsKpi => "analytics-kpi",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = crate::QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::QueueError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAccountingPayload {
    pub order_id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl OrderAccountingPayload {
    pub fn new(order_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            tenant_id: tenant_id.into(),
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMaintenancePayload {
    pub inventory_id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl InventoryMaintenancePayload {
    pub fn new(inventory_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            tenant_id: tenant_id.into(),
            trigger: None,
            user_id: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsKpiPayload {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    /// Day to aggregate. Absent means "today" for the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl AnalyticsKpiPayload {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger: None,
            date: None,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// A job payload tagged with its kind.
///
/// Every kind has exactly one variant, so matching on this enum is the
/// exhaustive dispatch point for handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum JobPayload {
    OrderAccounting(OrderAccountingPayload),
    InventoryMaintenance(InventoryMaintenancePayload),
    AnalyticsKpi(AnalyticsKpiPayload),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::OrderAccounting(_) => JobKind::OrderAccounting,
            JobPayload::InventoryMaintenance(_) => JobKind::InventoryMaintenance,
            JobPayload::AnalyticsKpi(_) => JobKind::AnalyticsKpi,
        }
    }

    /// The untagged payload object, as stored next to the kind.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            JobPayload::OrderAccounting(p) => serde_json::to_value(p),
            JobPayload::InventoryMaintenance(p) => serde_json::to_value(p),
            JobPayload::AnalyticsKpi(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild a typed payload from a stored kind and payload object.
    pub fn from_parts(kind: &str, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "kind": kind, "payload": payload }))
    }
}

impl From<OrderAccountingPayload> for JobPayload {
    fn from(payload: OrderAccountingPayload) -> Self {
        JobPayload::OrderAccounting(payload)
    }
}

impl From<InventoryMaintenancePayload> for JobPayload {
    fn from(payload: InventoryMaintenancePayload) -> Self {
        JobPayload::InventoryMaintenance(payload)
    }
}

impl From<AnalyticsKpiPayload> for JobPayload {
    fn from(payload: AnalyticsKpiPayload) -> Self {
        JobPayload::AnalyticsKpi(payload)
    }
}
