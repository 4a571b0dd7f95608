use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

/// A config that deserializes from one named section of the TOML config file,
/// falling back to defaults when the section is absent.
pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimConfig {
    pub num_cycles: u64,
    pub seed: u64,
    pub log_level: u64,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_cycles: 100_000,
            seed: 0,
            log_level: 0,
        }
    }
}

/// Map the numeric log-level knob to a `log` filter.
pub fn to_level_filter(ulevel: u64) -> log::LevelFilter {
    match ulevel {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}
