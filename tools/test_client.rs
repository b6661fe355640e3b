//! Smoke-Test Client
//!
//! Drives a running fraud detection API with a fixed sample and a stream of
//! generated transactions.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fraud_detection_api::{
    config::{LogFormat, LoggingConfig},
    telemetry, Label, Prediction, TransactionRecord,
};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "test-client")]
#[command(about = "Send sample transactions to the fraud detection API", long_about = None)]
struct Args {
    /// Base URL of the running service
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Number of generated transactions to send
    #[arg(short, long, default_value_t = 100)]
    count: u64,

    /// Share of generated transactions that look suspicious
    #[arg(short, long, default_value_t = 0.1)]
    fraud_rate: f64,

    /// Pause between requests
    #[arg(short, long, default_value_t = 100)]
    delay_ms: u64,
}

/// A known-legitimate transaction from the dataset.
const SAMPLE: [(&str, f64); 30] = [
    ("Time", 0.0),
    ("Amount", 100.0),
    ("V1", -1.9598071336738172),
    ("V2", -0.0727811733098497),
    ("V3", 2.536346738618042),
    ("V4", 1.978155224101747),
    ("V5", -0.338321856591981),
    ("V6", 0.462387777762292),
    ("V7", 0.239598554061257),
    ("V8", 0.098697901967912),
    ("V9", 0.363787375558171),
    ("V10", 0.090794172742772),
    ("V11", -0.851599533260813),
    ("V12", -0.617800855762348),
    ("V13", -0.991389847235408),
    ("V14", -0.311169353699879),
    ("V15", 1.468176972444344),
    ("V16", -0.470400525259478),
    ("V17", 0.807971241929242),
    ("V18", 0.025790930276891),
    ("V19", 0.403992960255733),
    ("V20", 0.251412098239705),
    ("V21", -0.018306777944153),
    ("V22", 0.277837575558899),
    ("V23", -0.110473910188767),
    ("V24", 0.066928075074387),
    ("V25", 0.128539358273528),
    ("V26", -0.189114843888824),
    ("V27", 0.433558376740387),
    ("V28", -0.021053053283880),
];

/// Random transaction generator
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    elapsed: f64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            elapsed: 0.0,
        }
    }

    /// Seconds since the first generated transaction, like the dataset's Time column
    fn next_time(&mut self) -> f64 {
        self.elapsed += self.rng.gen_range(0.0..120.0_f64).round();
        self.elapsed
    }

    /// PCA components near zero and a modest amount
    fn generate_legitimate(&mut self) -> Result<TransactionRecord> {
        let mut values = [0.0; 30];
        values[0] = self.next_time();
        values[1] = (self.rng.gen_range(1.0..250.0_f64) * 100.0).round() / 100.0;
        for v in values.iter_mut().skip(2) {
            *v = self.rng.gen_range(-1.5..1.5);
        }
        Ok(TransactionRecord::from_values(values)?)
    }

    /// Strongly negative V10, V12, V14 and V17 with a high V4
    fn generate_suspicious(&mut self) -> Result<TransactionRecord> {
        let mut record = self.generate_legitimate()?;
        record = record
            .with_field("Amount", self.rng.gen_range(0.0..2000.0_f64).round())?
            .with_field("V4", self.rng.gen_range(3.0..8.0))?
            .with_field("V10", self.rng.gen_range(-12.0..-4.0))?
            .with_field("V12", self.rng.gen_range(-15.0..-5.0))?
            .with_field("V14", self.rng.gen_range(-15.0..-6.0))?
            .with_field("V17", self.rng.gen_range(-20.0..-5.0))?;
        Ok(record)
    }
}

/// `gen_bool` panics outside [0, 1], NaN included.
fn check_fraud_rate(rate: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&rate) {
        bail!("--fraud-rate must be within [0, 1], got {}", rate);
    }
    Ok(rate)
}

async fn post_record(client: &reqwest::Client, url: &str, body: &Value) -> Result<Label> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("Request failed with {}: {}", status, text);
    }

    let prediction: Prediction = response.json().await.context("Invalid prediction body")?;
    Ok(prediction.prediction)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let fraud_rate = check_fraud_rate(args.fraud_rate)?;

    telemetry::init(&LoggingConfig {
        level: "info".to_string(),
        format: LogFormat::Pretty,
    })?;

    info!(
        url = %args.url,
        count = args.count,
        fraud_rate = args.fraud_rate,
        delay_ms = args.delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let base = args.url.trim_end_matches('/');
    let predict_url = format!("{}/predict", base);

    let info: Value = client
        .get(format!("{}/", base))
        .send()
        .await
        .with_context(|| format!("Could not connect to {}. Is the server running?", base))?
        .json()
        .await?;
    info!("Service: {}", info);

    let sample: serde_json::Map<String, Value> = SAMPLE
        .iter()
        .map(|&(name, value)| (name.to_string(), Value::from(value)))
        .collect();
    let label = post_record(&client, &predict_url, &Value::Object(sample)).await?;
    info!(
        "Sample transaction is {}",
        if label.is_fraud() { "fraudulent" } else { "legitimate" }
    );

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut sent_suspicious = 0;
    let mut flagged = 0;
    let mut flagged_suspicious = 0;
    let mut failures = 0;

    for i in 0..args.count {
        let suspicious = rng.gen_bool(fraud_rate);
        let record = if suspicious {
            sent_suspicious += 1;
            generator.generate_suspicious()?
        } else {
            generator.generate_legitimate()?
        };

        match post_record(&client, &predict_url, &serde_json::to_value(record)?).await {
            Ok(label) if label.is_fraud() => {
                flagged += 1;
                if suspicious {
                    flagged_suspicious += 1;
                }
            }
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                warn!(error = %e, "Prediction request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} transactions ({} suspicious, {} flagged)",
                i + 1,
                args.count,
                sent_suspicious,
                flagged
            );
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    info!(
        sent = args.count,
        suspicious = sent_suspicious,
        flagged = flagged,
        flagged_suspicious = flagged_suspicious,
        failures = failures,
        "Completed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_bounds() {
        assert_eq!(check_fraud_rate(0.0).unwrap(), 0.0);
        assert_eq!(check_fraud_rate(1.0).unwrap(), 1.0);
        assert!(check_fraud_rate(f64::NAN).is_err());
        assert!(check_fraud_rate(1.5).is_err());
        assert!(check_fraud_rate(-0.1).is_err());
    }

    #[test]
    fn test_nan_rate_rejected_from_command_line() {
        let args = Args::try_parse_from(["test-client", "--fraud-rate", "NaN"]).unwrap();
        assert!(check_fraud_rate(args.fraud_rate).is_err());
    }

    #[test]
    fn test_generated_records_are_valid() {
        let mut generator = TransactionGenerator::new();
        let legitimate = generator.generate_legitimate().unwrap();
        assert!(legitimate.amount() >= 1.0);
        let suspicious = generator.generate_suspicious().unwrap();
        assert!(suspicious.get("V14").unwrap() < -5.0);
        assert!(suspicious.time() >= legitimate.time());
    }
}
