use crate::utils::env_utils::get_env_var_or_panic;

/// Settings provider abstraction so that the client builders do not read
/// the process environment directly.
pub trait Settings {
    fn get_settings_or_panic(&self, name: &'static str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct EnvSettingsProvider {}

impl Settings for EnvSettingsProvider {
    fn get_settings_or_panic(&self, name: &'static str) -> String {
        get_env_var_or_panic(name)
    }
}
