use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Target used for every audit-worthy event so it can be routed separately.
pub const AUDIT_TARGET: &str = "audit";

pub fn setup_logging(log_format: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stdout layer logs everything, either human readable or one JSON object per line
    let subscriber = Registry::default().with(filter);
    if log_format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(subscriber.with(fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(subscriber.with(fmt::layer()))
    }
}

pub fn log_audit(actor: Option<&str>, action: &str, entity: &str, details: Option<&Value>) {
    let actor = actor.unwrap_or("system");
    match details {
        Some(d) => {
            info!(
                target: AUDIT_TARGET,
                actor = actor,
                action = action,
                entity = entity,
                details = %d,
                "{} {} {} {}", actor, action, entity, d
            );
        }
        None => {
            info!(
                target: AUDIT_TARGET,
                actor = actor,
                action = action,
                entity = entity,
                "{} {} {}", actor, action, entity
            );
        }
    }
}
