use super::{constant::*, ConfigEntity};
use crate::{base::ResourceType, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    *GLOBAL_CONFIG.write().unwrap() = entity;
}

/// init_config_with_yaml loads general configuration from the YAML file under
/// the provided path. Priority: system environment > YAML file > defaults.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    apply_yaml_config_file(config_path)?;
    override_items_from_system_env()?;
    Ok(())
}

fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    if utils::is_blank(config_path) {
        // if the config file path is absent, try to resolve it from the env
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)
}

fn load_global_config_from_yaml_file(path_str: &String) -> Result<()> {
    if path_str == CONFIG_FILENAME {
        // use the default global config
        return Ok(());
    }
    let path = Path::new(path_str);
    if !path.exists() {
        return Err(Error::msg("configuration file does not exist"));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

pub fn override_items_from_system_env() -> Result<()> {
    let app_name = env::var(APP_NAME_ENV_KEY).unwrap_or_default();
    let app_type: ResourceType = env::var(APP_TYPE_ENV_KEY)
        .unwrap_or_else(|_| format!("{}", DEFAULT_APP_TYPE))
        .parse::<u8>()
        .unwrap_or(DEFAULT_APP_TYPE)
        .into();

    let mut cfg = GLOBAL_CONFIG.write().unwrap();
    if !utils::is_blank(&app_name) {
        cfg.config.app.app_name = app_name;
    }
    cfg.config.app.app_type = app_type;
    cfg.check()?;
    Ok(())
}

#[inline]
pub fn app_name() -> String {
    GLOBAL_CONFIG.read().unwrap().config.app.app_name.clone()
}

#[inline]
pub fn app_type() -> ResourceType {
    GLOBAL_CONFIG.read().unwrap().config.app.app_type
}

#[inline]
pub fn log_config_file() -> Option<String> {
    let file = GLOBAL_CONFIG.read().unwrap().config.log.config_file.clone();
    if file.is_empty() {
        None
    } else {
        Some(file)
    }
}

#[inline]
pub fn second_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.second_sample_count
}

#[inline]
pub fn second_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.second_interval_ms
}

#[inline]
pub fn minute_sample_count() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.minute_sample_count
}

#[inline]
pub fn minute_interval_ms() -> u32 {
    GLOBAL_CONFIG.read().unwrap().config.stat.minute_interval_ms
}

#[inline]
pub fn statistic_max_rt() -> u64 {
    GLOBAL_CONFIG.read().unwrap().config.stat.statistic_max_rt
}

#[inline]
pub fn occupy_timeout_ms() -> u64 {
    GLOBAL_CONFIG.read().unwrap().config.stat.occupy_timeout_ms
}

#[inline]
pub fn use_cache_time() -> bool {
    GLOBAL_CONFIG.read().unwrap().config.use_cache_time
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(second_sample_count(), 2);
        assert_eq!(second_interval_ms(), 1000);
        assert_eq!(minute_sample_count(), 60);
        assert_eq!(statistic_max_rt(), 60000);
    }
}
