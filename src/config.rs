use chrono::Duration;
use dotenv::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::net::SocketAddr;

use crate::domain::services::fees::FeeSchedule;
use crate::domain::services::matching::EngineSettings;

const BIND_ADDR: &str = "BIND_ADDR";
const MAX_SCAN_DEPTH: &str = "MAX_SCAN_DEPTH";
const KYC_THRESHOLD: &str = "KYC_THRESHOLD";
const DEFAULT_ORDER_LIFETIME_HOURS: &str = "DEFAULT_ORDER_LIFETIME_HOURS";
const FEE_SCHEDULE: &str = "FEE_SCHEDULE";

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_scan_depth: usize,
    pub kyc_threshold: Decimal,
    pub default_order_lifetime_hours: i64,
    pub fee_schedule: FeeSchedule,
}

impl Config {
    pub fn from_env() -> Config {
        match Self::try_from_env() {
            Ok(config) => config,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_from_env() -> Result<Config, String> {
        // Load .env file
        dotenv().ok();

        let bind_addr = env::var(BIND_ADDR)
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|_| format!("failed to parse environment variable {}", BIND_ADDR))?;

        let max_scan_depth = match env::var(MAX_SCAN_DEPTH) {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| format!("failed to parse environment variable {}", MAX_SCAN_DEPTH))?,
            Err(_) => 10,
        };

        let kyc_threshold = match env::var(KYC_THRESHOLD) {
            Ok(raw) => raw
                .parse::<Decimal>()
                .map_err(|_| format!("failed to parse environment variable {}", KYC_THRESHOLD))?,
            Err(_) => dec!(50000),
        };

        let default_order_lifetime_hours = match env::var(DEFAULT_ORDER_LIFETIME_HOURS) {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                format!(
                    "failed to parse environment variable {}",
                    DEFAULT_ORDER_LIFETIME_HOURS
                )
            })?,
            Err(_) => 24,
        };

        let fee_schedule = match env::var(FEE_SCHEDULE) {
            Ok(raw) => match raw.to_lowercase().as_str() {
                "detailed" => FeeSchedule::Detailed,
                "flat" => FeeSchedule::Flat,
                other => return Err(format!("unknown fee schedule: {}", other)),
            },
            Err(_) => FeeSchedule::Detailed,
        };

        Ok(Config {
            bind_addr,
            max_scan_depth,
            kyc_threshold,
            default_order_lifetime_hours,
            fee_schedule,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_scan_depth: self.max_scan_depth,
            kyc_threshold: self.kyc_threshold,
            default_order_lifetime: Duration::hours(self.default_order_lifetime_hours),
            fee_schedule: self.fee_schedule,
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bind_addr: "0.0.0.0:8080".parse().expect("static address"),
            max_scan_depth: 10,
            kyc_threshold: dec!(50000),
            default_order_lifetime_hours: 24,
            fee_schedule: FeeSchedule::Detailed,
        }
    }
}
