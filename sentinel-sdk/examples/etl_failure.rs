//! Runs an extract → transform → load pipeline whose transform step always
//! fails, with the failure hook attached.
//!
//! Start the diagnosis service first, then:
//!
//! ```text
//! SENTINEL_WEBHOOK_URL=https://hooks.slack.com/services/... \
//!     cargo run -p sentinel-sdk --example etl_failure
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use log::{error, info};
use serde_json::{json, Value};

use sentinel_sdk::{hook_from_env, Pipeline};

async fn extract_data(_: Value) -> anyhow::Result<Value> {
    Ok(json!({
        "time": { "updatedISO": "2025-11-07T08:00:00.000Z" },
        "bpi": { "USD": { "code": "USD", "rate_float": 50000.0 } }
    }))
}

async fn transform_data(data: Value) -> anyhow::Result<Value> {
    let rate = data["bpi"]["USD"]["rate_float"]
        .as_f64()
        .context("bpi.USD.rate_float missing")?;

    let divisor = 0.0_f64;
    if divisor == 0.0 {
        bail!("ZeroDivisionError: division by zero while scaling rate {}", rate);
    }

    Ok(json!({
        "timestamp": data["time"]["updatedISO"],
        "usd_rate": rate / divisor,
    }))
}

async fn load_data(processed: Value) -> anyhow::Result<Value> {
    info!("Loaded {}", processed);
    Ok(Value::Null)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hook = hook_from_env()?;

    let pipeline = Pipeline::new("aio_pipeline")
        .step("extract_data", extract_data)
        .step("transform_data", transform_data)
        .step("load_data", load_data)
        .with_listener(Arc::new(hook));

    let run_id = uuid::Uuid::new_v4().to_string();
    match pipeline.run(&run_id).await {
        Ok(_) => info!("Run {} succeeded", run_id),
        Err(e) => error!("Run {} failed: {}", run_id, e),
    }

    Ok(())
}
