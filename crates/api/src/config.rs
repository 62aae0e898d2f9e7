//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use inkwell_core::Money;
use inkwell_infra::checkout::CheckoutSettings;
use inkwell_pricing::PricingPolicy;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Which payment gateway the server talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayConfig {
    /// Deterministic in-process gateway for development and tests.
    Simulated,
    Razorpay { key_id: String, key_secret: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub gateway: GatewayConfig,
    /// Secret for checkout signatures; the simulated gateway still needs one.
    pub key_secret: String,
    pub webhook_secret: Option<String>,
    pub store_name: String,
    pub store_email: String,
    pub upi_vpa: Option<String>,
    pub pricing: PricingPolicy,
    pub products_per_page: u32,
    /// Postgres URL when persistent stores are enabled.
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            gateway: GatewayConfig::Simulated,
            key_secret: "dev-key-secret".to_string(),
            webhook_secret: None,
            store_name: "Inkwell".to_string(),
            store_email: "orders@inkwell.in".to_string(),
            upi_vpa: None,
            pricing: PricingPolicy::default(),
            products_per_page: 20,
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &addr)?;
        }

        match var("JWT_SECRET") {
            Some(secret) => config.jwt_secret = secret,
            None => tracing::warn!("JWT_SECRET not set; using insecure dev default"),
        }

        let key_id = var("RAZORPAY_KEY_ID");
        let key_secret = var("RAZORPAY_KEY_SECRET");
        config.gateway = match var("PAYMENT_GATEWAY").as_deref().unwrap_or("simulated") {
            "simulated" => GatewayConfig::Simulated,
            "razorpay" => GatewayConfig::Razorpay {
                key_id: key_id.clone().ok_or(ConfigError::Missing("RAZORPAY_KEY_ID"))?,
                key_secret: key_secret.clone().ok_or(ConfigError::Missing("RAZORPAY_KEY_SECRET"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "PAYMENT_GATEWAY",
                    value: other.to_string(),
                });
            }
        };
        if let Some(secret) = key_secret {
            config.key_secret = secret;
        }
        config.webhook_secret = var("RAZORPAY_WEBHOOK_SECRET");
        if config.webhook_secret.is_none() {
            tracing::warn!("RAZORPAY_WEBHOOK_SECRET not set; payment webhooks will be rejected");
        }

        if let Some(name) = var("STORE_NAME") {
            config.store_name = name;
        }
        if let Some(email) = var("STORE_EMAIL") {
            config.store_email = email;
        }
        config.upi_vpa = var("UPI_VPA");

        let shipping = &mut config.pricing.shipping;
        if let Some(v) = var("LOCAL_SHIPPING_RATE") {
            shipping.local_rate = Money::from_paise(parse("LOCAL_SHIPPING_RATE", &v)?);
        }
        if let Some(v) = var("NATIONAL_SHIPPING_RATE") {
            shipping.national_rate = Money::from_paise(parse("NATIONAL_SHIPPING_RATE", &v)?);
        }
        if let Some(v) = var("FREE_SHIPPING_THRESHOLD") {
            shipping.free_threshold = Money::from_paise(parse("FREE_SHIPPING_THRESHOLD", &v)?);
        }
        if let Some(v) = var("CHARGE_COD_FEE") {
            config.pricing.charge_cod_fee = parse("CHARGE_COD_FEE", &v)?;
        }
        if let Some(v) = var("PRODUCTS_PER_PAGE") {
            let per_page: u32 = parse("PRODUCTS_PER_PAGE", &v)?;
            if per_page == 0 {
                return Err(ConfigError::Invalid {
                    name: "PRODUCTS_PER_PAGE",
                    value: v,
                });
            }
            config.products_per_page = per_page;
        }

        let persistent = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse::<bool>("USE_PERSISTENT_STORES", &v)?,
            None => false,
        };
        if persistent {
            config.database_url = Some(var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?);
        }

        Ok(config)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            pricing: self.pricing.clone(),
            key_secret: self.key_secret.clone(),
            webhook_secret: self.webhook_secret.clone(),
            store_name: self.store_name.clone(),
            upi_vpa: self.upi_vpa.clone(),
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
