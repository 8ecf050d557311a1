pub mod memory_workspace_stage_repository;
pub mod plan_repository;
pub mod postgres_plan_repository;
pub mod postgres_stripe_event_log_repository;
pub mod postgres_subscription_repository;
pub mod postgres_workspace_repository;
pub mod postgres_workspace_stage_repository;
pub mod stripe_event_log_repository;
pub mod subscription_repository;
pub mod workspace_repository;
pub mod workspace_stage_repository;

#[cfg(test)]
pub mod mock_db;
#[cfg(test)]
pub mod mock_stripe_event_log_repository;
