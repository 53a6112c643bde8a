use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// File name looked up inside the config directory.
pub const CONFIG_FILE: &str = "shaderdeck.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeckConfig {
    pub version: u32,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub visualizations: BTreeMap<String, VisualizationOverride>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            version: 1,
            defaults: Defaults::default(),
            visualizations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    pub visualization: Option<String>,
    pub max_pixel_ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub frame_interval: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<WindowSize>,
    #[serde(default)]
    pub power: Option<PowerSetting>,
    /// Extra shader pack roots searched before the data directory.
    #[serde(default)]
    pub pack_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VisualizationOverride {
    pub max_pixel_ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub frame_interval: Option<Duration>,
    #[serde(default)]
    pub pointer_origin: Option<PointerOrigin>,
    #[serde(default)]
    pub defines: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerOrigin {
    BottomLeft,
    TopLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    High,
}

/// Window inner size written as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for WindowSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid width in size '{value}'"))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid height in size '{value}'"))?;
        if width == 0 || height == 0 {
            return Err("window dimensions must be greater than zero".into());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl<'de> Deserialize<'de> for WindowSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl Serialize for WindowSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Frame pacing requested by config or command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameLimit {
    /// Draw on every host refresh, lifting any cap the manifest sets.
    Unlimited,
    Interval(Duration),
}

impl FrameLimit {
    /// A zero interval means unlimited.
    pub fn from_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            Self::Unlimited
        } else {
            Self::Interval(interval)
        }
    }

    /// `0` means unlimited. Rates too low to pace a frame are rejected.
    pub fn from_fps(fps: f32) -> Result<Self, ConfigError> {
        if fps.is_nan() || fps < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame rate must be non-negative, got {fps}"
            )));
        }
        if fps == 0.0 {
            return Ok(Self::Unlimited);
        }
        Duration::try_from_secs_f64(1.0 / f64::from(fps))
            .map(Self::from_interval)
            .map_err(|_| ConfigError::Invalid(format!("frame rate {fps} is too low to pace frames")))
    }

    pub fn max_fps(self) -> Option<f32> {
        match self {
            Self::Unlimited => None,
            Self::Interval(interval) => Some((1.0 / interval.as_secs_f64()) as f32),
        }
    }
}

/// Values supplied on the command line; they win over every config layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub max_pixel_ratio: Option<f64>,
    pub frame_limit: Option<FrameLimit>,
    pub window_size: Option<WindowSize>,
    pub defines: Vec<(String, String)>,
}

/// Settings for one visualization after layering CLI, per-visualization and
/// default config. `None` leaves the manifest's own value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSettings {
    pub max_pixel_ratio: Option<f64>,
    pub frame_limit: Option<FrameLimit>,
    pub window_size: Option<WindowSize>,
    pub pointer_origin: Option<PointerOrigin>,
    pub power: Option<PowerSetting>,
    /// Applied on top of the manifest's defines.
    pub defines: BTreeMap<String, String>,
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration_opt<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(duration) => serializer.collect_str(&humantime::format_duration(*duration)),
        None => serializer.serialize_none(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_ratio(ratio: Option<f64>, field: &str) -> Result<(), ConfigError> {
    match ratio {
        Some(value) if !value.is_finite() || value <= 0.0 => Err(ConfigError::Invalid(format!(
            "{field} must be a positive number, got {value}"
        ))),
        _ => Ok(()),
    }
}

impl DeckConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: DeckConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads `path` when it exists, otherwise returns the empty config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_visualization(&self) -> Option<&str> {
        self.defaults.visualization.as_deref()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(name) = &self.defaults.visualization {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "defaults.visualization may not be empty".into(),
                ));
            }
        }
        validate_ratio(self.defaults.max_pixel_ratio, "defaults.max_pixel_ratio")?;

        for (name, section) in &self.visualizations {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "visualization section name may not be empty".into(),
                ));
            }
            validate_ratio(
                section.max_pixel_ratio,
                &format!("visualizations.{name}.max_pixel_ratio"),
            )?;
            for key in section.defines.keys() {
                if !is_identifier(key) {
                    return Err(ConfigError::Invalid(format!(
                        "visualization '{name}' define '{key}' is not a valid identifier"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Layers CLI overrides over the `[visualizations.<name>]` section over
    /// `[defaults]`.
    pub fn settings_for(&self, name: &str, cli: &Overrides) -> ResolvedSettings {
        let section = self.visualizations.get(name);
        let defaults = &self.defaults;

        let max_pixel_ratio = cli
            .max_pixel_ratio
            .or(section.and_then(|s| s.max_pixel_ratio))
            .or(defaults.max_pixel_ratio);
        let frame_limit = cli.frame_limit.or_else(|| {
            section
                .and_then(|s| s.frame_interval)
                .or(defaults.frame_interval)
                .map(FrameLimit::from_interval)
        });

        let mut defines = section.map(|s| s.defines.clone()).unwrap_or_default();
        for (key, value) in &cli.defines {
            defines.insert(key.clone(), value.clone());
        }

        ResolvedSettings {
            max_pixel_ratio,
            frame_limit,
            window_size: cli.window_size.or(defaults.window_size),
            pointer_origin: section.and_then(|s| s.pointer_origin),
            power: defaults.power,
            defines,
        }
    }
}
