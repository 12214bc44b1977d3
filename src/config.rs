use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Deserializer};

pub const DEFAULT_INDEX_URL: &str =
    "http://www.nrc.gov/reading-rm/doc-collections/event-status/event/{year}/";
const YEAR_PLACEHOLDER: &str = "{year}";
const CONFIG_FILE: &str = "nrc_events";
const ENV_PREFIX: &str = "NRC";

/// Runtime settings: built-in defaults, then `nrc_events.toml`, then `NRC_*`
/// environment variables. The CLI overrides on top of that.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub index_url_template: String,
    /// No cache when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// A list, a single year, or a comma-separated string (`NRC_YEARS=2001,2002`).
    #[serde(default, deserialize_with = "year_list")]
    pub years: Vec<i32>,
    /// Last page date in the fixed-width text layout.
    pub cutover: NaiveDate,
    /// Minimum spacing between two remote fetches.
    pub delay_ms: u64,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("index_url_template", DEFAULT_INDEX_URL)?
        .set_default("output_dir", "parsed_events")?
        .set_default("years", Vec::<i64>::new())?
        .set_default("cutover", "2003-08-15")?
        .set_default("delay_ms", 250)?)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Year {
    Number(i32),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Years {
    One(Year),
    Many(Vec<Year>),
}

impl Year {
    fn into_years(self) -> std::result::Result<Vec<i32>, String> {
        match self {
            Year::Number(n) => Ok(vec![n]),
            Year::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| t.parse::<i32>().map_err(|_| format!("invalid year {:?}", t)))
                .collect(),
        }
    }
}

fn year_list<'de, D>(deserializer: D) -> std::result::Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let years = match Years::deserialize(deserializer)? {
        Years::One(year) => year.into_years(),
        Years::Many(list) => list.into_iter().try_fold(Vec::new(), |mut all, year| {
            all.extend(year.into_years()?);
            Ok(all)
        }),
    };
    years.map_err(serde::de::Error::custom)
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(environment())
            .build()
            .context("Failed to read settings")?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        let settings: Settings = config
            .try_deserialize()
            .context("Invalid settings")?;
        if !settings.index_url_template.contains(YEAR_PLACEHOLDER) {
            bail!(
                "index_url_template {:?} has no {} placeholder",
                settings.index_url_template,
                YEAR_PLACEHOLDER
            );
        }
        Ok(settings)
    }

    /// Yearly digest page URL.
    pub fn index_url(&self, year: i32) -> String {
        self.index_url_template
            .replace(YEAR_PLACEHOLDER, &year.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use std::collections::HashMap;

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
        Settings::from_config(builder.build()?)
    }

    #[test]
    fn defaults_are_complete() {
        let s = build(defaults().unwrap()).unwrap();
        assert_eq!(s.cutover, NaiveDate::from_ymd_opt(2003, 8, 15).unwrap());
        assert_eq!(s.delay_ms, 250);
        assert!(s.cache_dir.is_none());
        assert!(s.years.is_empty());
        assert_eq!(
            s.index_url(2001),
            "http://www.nrc.gov/reading-rm/doc-collections/event-status/event/2001/"
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let toml = r#"
            cache_dir = "/tmp/nrc_cache"
            years = [2000, 2001]
            delay_ms = 1000
        "#;
        let s = build(defaults().unwrap().add_source(File::from_str(toml, FileFormat::Toml))).unwrap();
        assert_eq!(s.cache_dir, Some(PathBuf::from("/tmp/nrc_cache")));
        assert_eq!(s.years, vec![2000, 2001]);
        assert_eq!(s.delay_ms, 1000);
    }

    #[test]
    fn years_list_from_environment() {
        let vars: HashMap<String, String> = [
            ("NRC_YEARS".to_string(), "2001,2002".to_string()),
            ("NRC_OUTPUT_DIR".to_string(), "out".to_string()),
        ]
        .into_iter()
        .collect();
        let s = build(defaults().unwrap().add_source(environment().source(Some(vars)))).unwrap();
        assert_eq!(s.years, vec![2001, 2002]);
        assert_eq!(s.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn single_year_and_bad_year() {
        let one = defaults().unwrap().set_override("years", 2003).unwrap();
        assert_eq!(build(one).unwrap().years, vec![2003]);
        let bad = defaults().unwrap().set_override("years", "2003,soon").unwrap();
        assert!(build(bad).is_err());
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let builder = defaults()
            .unwrap()
            .set_override("index_url_template", "http://example.com/events/")
            .unwrap();
        assert!(build(builder).is_err());
    }
}
