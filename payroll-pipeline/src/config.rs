//! City rate configuration.
//!
//! ## File format
//!
//! The configuration is a TOML document. Each city lives in its own table
//! under `cities`; city codes are matched case-insensitively. An optional
//! `[tax]` table overrides the standard exemption threshold and bracket table.
//!
//! | Key         | Required | Meaning                          |
//! |-------------|----------|----------------------------------|
//! | `JiShuL`    | yes      | lowest contribution base         |
//! | `JiShuH`    | yes      | highest contribution base        |
//! | `YangLao`   | yes      | pension rate                     |
//! | `YiLiao`    | yes      | medical insurance rate           |
//! | `ShiYe`     | yes      | unemployment insurance rate      |
//! | `GongShang` | yes      | work-injury insurance rate       |
//! | `ShengYu`   | yes      | maternity insurance rate         |
//! | `GongJiJin` | yes      | housing fund rate                |
//!
//! Other keys in a city table are ignored.
//!
//! ```toml
//! [tax]
//! exemption_threshold = 3500
//! brackets = [
//!   { threshold = 0, rate = 0.03, quick_subtractor = 0 },
//!   { threshold = 1500, rate = 0.10, quick_subtractor = 105 },
//! ]
//!
//! [cities.CHENGDU]
//! JiShuL = 2193.00
//! JiShuH = 16446.00
//! YangLao = 0.08
//! YiLiao = 0.02
//! ShiYe = 0.005
//! GongShang = 0
//! ShengYu = 0
//! GongJiJin = 0.06
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use payroll_core::{
    PolicyError, SocialInsurance, TaxBracket, TaxPolicy, standard_brackets,
    standard_exemption_threshold,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration or deriving a policy from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("city '{0}' not found in config")]
    UnknownCity(String),

    #[error("city '{city}' is missing required key '{key}'")]
    MissingKey { city: String, key: &'static str },

    #[error("city '{city}' has negative value {value} for '{key}'")]
    NegativeValue {
        city: String,
        key: &'static str,
        value: Decimal,
    },

    #[error("invalid tax policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayrollConfig {
    #[serde(default)]
    pub tax: Option<TaxSchedule>,

    #[serde(default)]
    pub cities: BTreeMap<String, CityRates>,
}

/// Optional override for the exemption threshold and bracket table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxSchedule {
    #[serde(default = "standard_exemption_threshold")]
    pub exemption_threshold: Decimal,

    #[serde(default = "standard_brackets")]
    pub brackets: Vec<TaxBracket>,
}

impl Default for TaxSchedule {
    fn default() -> Self {
        Self {
            exemption_threshold: standard_exemption_threshold(),
            brackets: standard_brackets(),
        }
    }
}

/// Social-insurance settings for one city, as written in the file.
///
/// Every field is optional at parse time so that a missing key can be
/// reported by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CityRates {
    #[serde(rename = "JiShuL")]
    pub base_floor: Option<Decimal>,

    #[serde(rename = "JiShuH")]
    pub base_ceiling: Option<Decimal>,

    #[serde(rename = "YangLao")]
    pub pension: Option<Decimal>,

    #[serde(rename = "YiLiao")]
    pub medical: Option<Decimal>,

    #[serde(rename = "ShiYe")]
    pub unemployment: Option<Decimal>,

    #[serde(rename = "GongShang")]
    pub work_injury: Option<Decimal>,

    #[serde(rename = "ShengYu")]
    pub maternity: Option<Decimal>,

    #[serde(rename = "GongJiJin")]
    pub housing_fund: Option<Decimal>,
}

impl CityRates {
    /// Resolves the floor, ceiling and combined rate for `city`.
    pub fn social_insurance(
        &self,
        city: &str,
    ) -> Result<SocialInsurance, ConfigError> {
        let floor = require(city, "JiShuL", self.base_floor)?;
        let ceiling = require(city, "JiShuH", self.base_ceiling)?;

        let components = [
            ("YangLao", self.pension),
            ("YiLiao", self.medical),
            ("ShiYe", self.unemployment),
            ("GongShang", self.work_injury),
            ("ShengYu", self.maternity),
            ("GongJiJin", self.housing_fund),
        ];
        let mut rate = Decimal::ZERO;
        for (key, value) in components {
            rate += require(city, key, value)?;
        }

        Ok(SocialInsurance {
            floor,
            ceiling,
            rate,
        })
    }
}

fn require(
    city: &str,
    key: &'static str,
    value: Option<Decimal>,
) -> Result<Decimal, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingKey {
        city: city.to_string(),
        key,
    })?;
    if value < Decimal::ZERO {
        return Err(ConfigError::NegativeValue {
            city: city.to_string(),
            key,
            value,
        });
    }
    Ok(value)
}

impl PayrollConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Looks up a city, ignoring ASCII case.
    pub fn city(
        &self,
        city: &str,
    ) -> Result<&CityRates, ConfigError> {
        self.cities
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(city))
            .map(|(_, rates)| rates)
            .ok_or_else(|| ConfigError::UnknownCity(city.to_string()))
    }

    /// Builds the immutable policy for a run in `city`.
    pub fn tax_policy(
        &self,
        city: &str,
    ) -> Result<TaxPolicy, ConfigError> {
        let social_insurance = self.city(city)?.social_insurance(city)?;
        let schedule = self.tax.clone().unwrap_or_default();

        Ok(TaxPolicy::new(
            social_insurance,
            schedule.exemption_threshold,
            schedule.brackets,
        )?)
    }
}
