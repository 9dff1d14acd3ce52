//! Static plan catalog: the three Karbill tiers with prices, display
//! features, and per-resource limits. Loaded once, immutable at runtime.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::subscription::PlanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Vehicles,
    Clients,
    Invoices,
    Users,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Vehicles => "vehicles",
            ResourceType::Clients => "clients",
            ResourceType::Invoices => "invoices",
            ResourceType::Users => "users",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vehicles" => Some(ResourceType::Vehicles),
            "clients" => Some(ResourceType::Clients),
            "invoices" => Some(ResourceType::Invoices),
            "users" => Some(ResourceType::Users),
            _ => None,
        }
    }
}

/// Per-resource ceiling, with an explicit unbounded sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanLimit {
    Limited(u32),
    Unlimited,
}

impl PlanLimit {
    /// Whether `current_count` resources still leave room for one more.
    pub fn allows(&self, current_count: i64) -> bool {
        match self {
            PlanLimit::Unlimited => true,
            PlanLimit::Limited(max) => current_count < i64::from(*max),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanLimits {
    pub vehicles: PlanLimit,
    pub clients: PlanLimit,
    pub invoices: PlanLimit,
    pub users: PlanLimit,
}

impl PlanLimits {
    pub fn for_resource(&self, resource: ResourceType) -> PlanLimit {
        match resource {
            ResourceType::Vehicles => self.vehicles,
            ResourceType::Clients => self.clients,
            ResourceType::Invoices => self.invoices,
            ResourceType::Users => self.users,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDefinition {
    pub plan_type: PlanType,
    pub name: &'static str,
    /// Monthly price in cents, CAD, VAT-exclusive.
    pub price_cents: i32,
    pub currency: &'static str,
    /// Ordered display list for the pricing page.
    pub features: &'static [&'static str],
    pub limits: PlanLimits,
}

static CATALOG: Lazy<[PlanDefinition; 3]> = Lazy::new(|| {
    [
        PlanDefinition {
            plan_type: PlanType::Free,
            name: "Gratuit",
            price_cents: 0,
            currency: "cad",
            features: &[
                "50 vehicles in inventory",
                "50 client records",
                "50 invoices",
                "1 user account",
            ],
            limits: PlanLimits {
                vehicles: PlanLimit::Limited(50),
                clients: PlanLimit::Limited(50),
                invoices: PlanLimit::Limited(50),
                users: PlanLimit::Limited(1),
            },
        },
        PlanDefinition {
            plan_type: PlanType::Basic,
            name: "Basique",
            price_cents: 2499,
            currency: "cad",
            features: &[
                "500 vehicles in inventory",
                "500 client records",
                "500 invoices",
                "5 user accounts",
                "Warranty and repair-order tracking",
            ],
            limits: PlanLimits {
                vehicles: PlanLimit::Limited(500),
                clients: PlanLimit::Limited(500),
                invoices: PlanLimit::Limited(500),
                users: PlanLimit::Limited(5),
            },
        },
        PlanDefinition {
            plan_type: PlanType::Pro,
            name: "Pro",
            price_cents: 4999,
            currency: "cad",
            features: &[
                "Unlimited vehicles",
                "Unlimited clients",
                "Unlimited invoices",
                "Unlimited user accounts",
                "Warranty and repair-order tracking",
                "Priority support",
            ],
            limits: PlanLimits {
                vehicles: PlanLimit::Unlimited,
                clients: PlanLimit::Unlimited,
                invoices: PlanLimit::Unlimited,
                users: PlanLimit::Unlimited,
            },
        },
    ]
});

/// All tiers, in display order.
pub fn plan_catalog() -> &'static [PlanDefinition] {
    &*CATALOG
}

/// Lookup a single tier's definition.
pub fn plan_definition(plan_type: PlanType) -> &'static PlanDefinition {
    CATALOG
        .iter()
        .find(|p| p.plan_type == plan_type)
        .expect("catalog covers every plan type")
}
