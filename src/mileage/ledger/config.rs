use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mileage::ledger::error::{Result, ToolError};
use crate::mileage::ledger::postcode;

/// Settings file used when the command line does not name one.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Persisted settings of the tool.
///
/// Every field has a default so that older or partial settings files keep
/// loading after new keys are introduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential for the routing service.
    pub api_key: String,
    /// Address every delivery distance is measured from.
    pub origin_address: String,
    /// Postcode written into the origin column of every row.
    pub origin_postcode: String,
    /// Ledger workbook the rows are appended to.
    pub excel_path: PathBuf,
    /// Reimbursement per kilometre.
    pub rate_per_km: f64,
    /// Round-trip distance above which a row is flagged for review.
    pub warning_threshold_km: f64,
    /// ISO 3166 code the geocoder is restricted to.
    pub country_code: String,
    /// Country name appended to every delivery query.
    pub country_name: String,
    pub geocoder_url: String,
    pub router_url: String,
    pub routing_profile: String,
    pub request_timeout_secs: u64,
    /// Courtesy delay after every delivery geocode.
    pub geocode_pause_ms: u64,
    /// Number of delivery slots offered when prompting interactively.
    pub entry_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            origin_address: "Hogebankweg 1, 5331 RD".to_string(),
            origin_postcode: "5331 RD".to_string(),
            excel_path: PathBuf::from("ritten.xlsx"),
            rate_per_km: 0.23,
            warning_threshold_km: 50.0,
            country_code: "nl".to_string(),
            country_name: "Netherlands".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            router_url: "https://api.openrouteservice.org".to_string(),
            routing_profile: "driving-car".to_string(),
            request_timeout_secs: 15,
            geocode_pause_ms: 1000,
            entry_slots: 5,
        }
    }
}

impl Config {
    /// Loads the settings file, falling back to (and writing) the defaults
    /// when the file is missing or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Config {
        match Self::load(path) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), %error, "settings unavailable, using defaults");
                let config = Config::default();
                if let Err(error) = config.save(path) {
                    warn!(path = %path.display(), %error, "could not write default settings");
                }
                config
            }
        }
    }

    /// Loads the settings file, failing on IO or parse errors.
    pub fn load(path: &Path) -> Result<Config> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Persists the settings immediately.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn geocode_pause(&self) -> Duration {
        Duration::from_millis(self.geocode_pause_ms)
    }
}

/// A partial change to the settings; unset fields keep their current value.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigUpdate {
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub origin_address: Option<String>,
    /// Must be a valid `DDDD XX` postcode; stored in canonical form.
    #[arg(long)]
    pub origin_postcode: Option<String>,
    #[arg(long)]
    pub excel_path: Option<PathBuf>,
    #[arg(long)]
    pub rate_per_km: Option<f64>,
    #[arg(long)]
    pub warning_threshold_km: Option<f64>,
    #[arg(long)]
    pub country_code: Option<String>,
    #[arg(long)]
    pub country_name: Option<String>,
    #[arg(long)]
    pub geocoder_url: Option<String>,
    #[arg(long)]
    pub router_url: Option<String>,
    #[arg(long)]
    pub routing_profile: Option<String>,
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,
    #[arg(long)]
    pub geocode_pause_ms: Option<u64>,
    #[arg(long)]
    pub entry_slots: Option<usize>,
}

impl ConfigUpdate {
    /// Applies the change. `config` is left untouched when a value is
    /// rejected.
    pub fn apply(self, config: &mut Config) -> Result<()> {
        let origin_postcode = match self.origin_postcode {
            Some(value) => Some(
                postcode::normalize(&value).ok_or(ToolError::InvalidPostcode(value))?,
            ),
            None => None,
        };

        let mut updated = config.clone();
        set(&mut updated.api_key, self.api_key);
        set(&mut updated.origin_address, self.origin_address);
        set(&mut updated.origin_postcode, origin_postcode);
        set(&mut updated.excel_path, self.excel_path);
        set(&mut updated.rate_per_km, self.rate_per_km);
        set(&mut updated.warning_threshold_km, self.warning_threshold_km);
        set(&mut updated.country_code, self.country_code);
        set(&mut updated.country_name, self.country_name);
        set(&mut updated.geocoder_url, self.geocoder_url);
        set(&mut updated.router_url, self.router_url);
        set(&mut updated.routing_profile, self.routing_profile);
        set(&mut updated.request_timeout_secs, self.request_timeout_secs);
        set(&mut updated.geocode_pause_ms, self.geocode_pause_ms);
        set(&mut updated.entry_slots, self.entry_slots);
        *config = updated;
        Ok(())
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}
