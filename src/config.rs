use camino::Utf8Path;
use config::{Config, ConfigError};

pub use hubsync_api::config::*;

pub fn parse(filename: &Utf8Path) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .set_default("listener.reconnect_delay_secs", 10)?
        .set_default("listener.discovery", true)?
        .set_default("listener.area_sync_on_start", true)?
        .add_source(config::File::with_name(filename.as_str()))
        .add_source(config::Environment::with_prefix("HUBSYNC").separator("__"))
        .build()?;

    settings.try_deserialize()
}
