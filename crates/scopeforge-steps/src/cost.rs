//! Cost calculation from the rate sheet, team size, and duration.

use crate::context::{StepContext, session_id_field, store_err};
use async_trait::async_trait;
use log::info;
use scopeforge_core::Step;
use scopeforge_core::store::SessionUpdate;
use scopeforge_protocol::{StepError, StepName};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const HOURS_PER_MEMBER_WEEK: f64 = 40.0;
const DEFAULT_EFFORT_SHARE: f64 = 0.25;

/// Produces a per-role cost breakdown and total from the session's team
/// size and duration.
pub struct CalculateCostStep {
    ctx: Arc<StepContext>,
}

impl CalculateCostStep {
    /// Create the step over shared dependencies.
    pub fn new(ctx: Arc<StepContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Step for CalculateCostStep {
    fn name(&self) -> StepName {
        StepName::CalculateCost
    }

    async fn run(&self, payload: Value) -> Result<Value, StepError> {
        let session_id = session_id_field(&payload)?;
        let session = self.ctx.store.get(session_id).await.map_err(store_err)?;

        let weeks = session.duration.weeks() as f64;
        let hours_per_week = session.team_size as f64 * HOURS_PER_MEMBER_WEEK;
        let rates = self
            .ctx
            .rates
            .list_rates()
            .await
            .map_err(|err| StepError::Internal(err.to_string()))?;

        let mut total_cost = 0.0;
        let mut breakdown = Map::new();
        for role in &rates {
            let share = effort_share(&role.role_id);
            let hours = round2(hours_per_week * weeks * share);
            let subtotal = round2(hours * role.hourly_rate);
            breakdown.insert(
                role.role_id.clone(),
                json!({
                    "hours": hours,
                    "rate": role.hourly_rate,
                    "subtotal": subtotal,
                }),
            );
            total_cost += subtotal;
        }

        let total_cost = round2(total_cost);
        let cost_data = json!({
            "total_cost": total_cost,
            "breakdown": breakdown,
            "currency": "USD",
            "team_size": session.team_size,
            "duration_weeks": session.duration.weeks(),
            "hours_per_week": hours_per_week,
        });
        info!(
            "calculated cost (session_id={}, total={:.2}, roles={})",
            session_id,
            total_cost,
            rates.len()
        );

        self.ctx
            .store
            .update(
                session_id,
                SessionUpdate {
                    cost_data: Some(cost_data.clone()),
                    ..SessionUpdate::default()
                },
            )
            .await
            .map_err(store_err)?;

        Ok(cost_data)
    }
}

/// Keep monetary and hour figures at cents precision.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of total delivery effort attributed to a role.
fn effort_share(role_id: &str) -> f64 {
    match role_id {
        "architect" => 0.10,
        "senior_dev" => 0.20,
        "dev" => 0.35,
        "qa" => 0.10,
        "pm" => 0.10,
        "devops" => 0.15,
        _ => DEFAULT_EFFORT_SHARE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn effort_shares_sum_to_one_for_the_standard_roles() {
        let total: f64 = ["architect", "senior_dev", "dev", "qa", "pm", "devops"]
            .iter()
            .map(|role| effort_share(role))
            .sum();
        assert!((total - 1.0).abs() < f64::EPSILON);
        assert_eq!(effort_share("designer"), DEFAULT_EFFORT_SHARE);
    }
}
