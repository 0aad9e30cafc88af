use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub server: ServerConfig,
    pub render: RenderConfig,
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub countries: PathBuf,
    pub districts_suffix: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub background: String, // Hex code
    pub output: PathBuf,
}

/// Initial view and basemaps handed to the map client.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    pub zoom_control: bool,
    pub scroll_wheel_zoom: bool,
    pub switcher_collapsed: bool,
    pub basemaps: Vec<Basemap>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Basemap {
    pub name: String,
    /// roadmap | satellite | terrain | hybrid
    pub kind: String,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

fn default_max_zoom() -> u8 {
    18
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            countries: PathBuf::from("africa_countries.geojson"),
            districts_suffix: "_districts.geojson".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            static_dir: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            background: "#f8fafc".to_string(),
            output: PathBuf::from("map.png"),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [7.5, 21.0],
            zoom: 3,
            zoom_control: true,
            scroll_wheel_zoom: true,
            switcher_collapsed: true,
            basemaps: vec![
                Basemap { name: "Google Roadmap".to_string(), kind: "roadmap".to_string(), max_zoom: 18 },
                Basemap { name: "Google Hybrid".to_string(), kind: "hybrid".to_string(), max_zoom: 18 },
            ],
        }
    }
}

impl MapConfig {
    /// The first basemap is shown on load; the rest sit in the layer switcher.
    pub fn default_basemap(&self) -> Option<&Basemap> {
        self.basemaps.first()
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    pub fn countries_path(&self) -> PathBuf {
        self.data.dir.join(&self.data.countries)
    }

    /// On-disk location of a country's district file, e.g. `data/kenya_districts.geojson`.
    pub fn districts_path(&self, country: &str) -> PathBuf {
        let slug = crate::district::slugify(country);
        self.data.dir.join(format!("{}{}", slug, self.data.districts_suffix))
    }
}
