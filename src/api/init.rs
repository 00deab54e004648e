use crate::{config, logging, utils, Result};

/// Initializes the runtime with default configurations, overridable through
/// the environment.
pub fn init_default() -> Result<()> {
    config::override_items_from_system_env()?;
    init_core()
}

/// Initializes the runtime from a hand-crafted config entity.
pub fn init_with_config(config_entity: config::ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_items_from_system_env()?;
    init_core()
}

/// Initializes the runtime from a YAML configuration file.
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)?;
    init_core()
}

fn init_core() -> Result<()> {
    logging::logger_init(config::log_config_file());
    if config::use_cache_time() {
        utils::start_time_ticker();
    }
    logging::info!("[Init] runtime initialized, app {}", config::app_name());
    Ok(())
}
