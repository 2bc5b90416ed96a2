//! Role rate sheet used by the costing step.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors returned while loading a rate sheet.
#[derive(Debug, Error)]
pub enum RateSheetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Hourly rate for one delivery role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleRate {
    /// Stable role identifier.
    pub role_id: String,
    /// Display name.
    pub role_name: String,
    /// Hourly rate in USD.
    pub hourly_rate: f64,
}

/// Read access to the role rate table.
#[async_trait]
pub trait RateSheetProvider: Send + Sync {
    /// All roles with their hourly rates.
    async fn list_rates(&self) -> Result<Vec<RoleRate>, RateSheetError>;
}

/// Fixed rate sheet, seeded with the standard delivery roles or loaded from
/// a JSON file.
#[derive(Debug, Clone)]
pub struct StaticRateSheet {
    rates: Vec<RoleRate>,
}

impl StaticRateSheet {
    /// The standard delivery role rates.
    pub fn standard() -> Self {
        let rates = [
            ("architect", "Solutions Architect", 200.0),
            ("senior_dev", "Senior Developer", 150.0),
            ("dev", "Developer", 100.0),
            ("qa", "Quality Assurance", 90.0),
            ("pm", "Project Manager", 125.0),
            ("devops", "DevOps Engineer", 140.0),
        ]
        .into_iter()
        .map(|(role_id, role_name, hourly_rate)| RoleRate {
            role_id: role_id.to_string(),
            role_name: role_name.to_string(),
            hourly_rate,
        })
        .collect();
        Self { rates }
    }

    /// Load a rate sheet from a JSON array file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RateSheetError> {
        let contents = std::fs::read_to_string(path)?;
        let rates: Vec<RoleRate> = serde_json::from_str(&contents)?;
        Ok(Self { rates })
    }

    /// Build a sheet from explicit rates.
    pub fn new(rates: Vec<RoleRate>) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl RateSheetProvider for StaticRateSheet {
    async fn list_rates(&self) -> Result<Vec<RoleRate>, RateSheetError> {
        Ok(self.rates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn standard_sheet_covers_the_delivery_roles() {
        let rates = StaticRateSheet::standard().list_rates().await.expect("rates");
        let ids: Vec<&str> = rates.iter().map(|rate| rate.role_id.as_str()).collect();
        assert_eq!(ids, vec!["architect", "senior_dev", "dev", "qa", "pm", "devops"]);
        assert_eq!(rates[0].hourly_rate, 200.0);
    }

    #[test]
    fn from_path_round_trips() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        use std::io::Write;
        write!(
            file,
            r#"[{{"role_id":"dev","role_name":"Developer","hourly_rate":100.0}}]"#
        )
        .expect("write");
        let sheet = StaticRateSheet::from_path(file.path()).expect("load");
        assert_eq!(sheet.rates.len(), 1);
        assert_eq!(sheet.rates[0].role_id, "dev");
    }
}
