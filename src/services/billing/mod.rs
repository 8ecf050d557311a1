mod error;
pub mod plan_catalog;
pub mod provisioning;
pub mod upgrade;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::BillingError;
pub use plan_catalog::PlanCatalog;
pub use provisioning::WorkspaceProvisioner;
pub use upgrade::PlanUpgrader;
pub use webhook::{DispatchOutcome, WebhookDispatcher};

/// Keys of the checkout metadata that round-trips through Stripe back to our webhook.
pub mod metadata {
    pub const WORKSPACE_NAME: &str = "workspace_name";
    pub const USER_ID: &str = "user_id";
    pub const PLAN_ID: &str = "plan_id";
}
