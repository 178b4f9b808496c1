// CO2 module: emissions estimate for a material and weight.

pub mod climatiq;

use crate::model::{Co2Error, Co2Estimate};
use async_trait::async_trait;

pub use climatiq::ClimatiqClient;

#[async_trait]
pub trait Co2Estimator: Send + Sync {
    async fn estimate(&self, material: &str, weight_kg: f64) -> Result<Co2Estimate, Co2Error>;
}
