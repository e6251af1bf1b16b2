use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{env, fs};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmChoice {
    KMeans,
    MedianCut,
    Octree,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub algorithm: AlgorithmChoice,
    pub palette_size: usize,
    pub use_dithering: bool,
    pub use_median_cut_for_nearest_color: bool,
    pub use_custom_palette: bool,
    pub custom_palette: Vec<(u8, u8, u8)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            algorithm: AlgorithmChoice::KMeans,
            palette_size: 256,
            use_dithering: false,
            use_median_cut_for_nearest_color: true,
            use_custom_palette: false,
            custom_palette: vec![],
        }
    }
}

const CFG_FILENAME: &str = "config.toml";

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path(CFG_FILENAME)?;
        let cfg = if !config_path.exists() {
            let cfg = Config::default();
            cfg.save()?;
            cfg
        } else {
            toml::from_str::<Config>(&fs::read_to_string(config_path.as_path())?)?
        };
        Ok(cfg)
    }

    fn get_config_path(filename: &str) -> Result<PathBuf> {
        let exe_path = env::current_exe()?;
        let exe_dir = exe_path.parent().unwrap();
        Ok(exe_dir.join(filename))
    }

    fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path(CFG_FILENAME)?;
        fs::write(config_path.as_path(), toml::to_string(&self)?)?;
        Ok(())
    }

    fn validate(&self) -> Vec<String> {
        let mut validation_messages = vec![];

        if self.use_custom_palette {
            if self.custom_palette.is_empty() {
                validation_messages
                    .push("Warning: invalid configuration: custom_palette is empty.".to_string());
            }
        } else if !(2..=256).contains(&self.palette_size) {
            validation_messages.push(format!(
                "Warning: invalid configuration: palette_size {} is outside the valid range 2-256.",
                self.palette_size
            ));
        } else if self.algorithm == AlgorithmChoice::MedianCut && !self.palette_size.is_power_of_two()
        {
            validation_messages.push(format!(
                "Warning: invalid configuration: palette_size {} must be a power of two for median-cut.",
                self.palette_size
            ));
        }

        validation_messages
    }

    pub fn is_valid(&self) -> bool {
        let errors = self.validate();
        errors.iter().for_each(|e| eprintln!("{}", e));
        errors.is_empty()
    }
}
