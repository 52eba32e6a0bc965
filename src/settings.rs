use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{FilterError, Result};

/// Largest accepted `kernel_size`. The composite samples an ellipse up to twice
/// this radius per axis, so larger kernels stall the GPU instead of failing.
pub const MAX_KERNEL_SIZE: i32 = 32;

/// Live numeric parameters of the anisotropic Kuwahara filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Filter radius in pixels
    pub kernel_size: i32,
    /// Number of angular sectors
    pub n: i32,
    /// Sharpness of the sector weighting
    pub hardness: f32,
    /// Exponent of the sector weighting
    pub q: f32,
    /// Sector overlap/falloff along the dominant orientation
    pub alpha: f32,
    pub zero_crossing: f32,
    /// Additional falloff of the sector weight polynomial
    pub zeta: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kernel_size: 7,
            n: 8,
            hardness: 8.0,
            q: 8.0,
            alpha: 1.0,
            zero_crossing: 0.58,
            zeta: 1.0,
        }
    }
}

/// A partial settings change. Fields left as `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub kernel_size: Option<i32>,
    pub n: Option<i32>,
    pub hardness: Option<f32>,
    pub q: Option<f32>,
    pub alpha: Option<f32>,
    pub zero_crossing: Option<f32>,
    pub zeta: Option<f32>,
}

impl From<Settings> for SettingsUpdate {
    fn from(settings: Settings) -> Self {
        Self {
            kernel_size: Some(settings.kernel_size),
            n: Some(settings.n),
            hardness: Some(settings.hardness),
            q: Some(settings.q),
            alpha: Some(settings.alpha),
            zero_crossing: Some(settings.zero_crossing),
            zeta: Some(settings.zeta),
        }
    }
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Settings {
    /// Returns a copy of `self` with every field present in `update` replaced.
    pub fn merged(&self, update: &SettingsUpdate) -> Settings {
        Settings {
            kernel_size: update.kernel_size.unwrap_or(self.kernel_size),
            n: update.n.unwrap_or(self.n),
            hardness: update.hardness.unwrap_or(self.hardness),
            q: update.q.unwrap_or(self.q),
            alpha: update.alpha.unwrap_or(self.alpha),
            zero_crossing: update.zero_crossing.unwrap_or(self.zero_crossing),
            zeta: update.zeta.unwrap_or(self.zeta),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_KERNEL_SIZE).contains(&self.kernel_size) {
            return Err(FilterError::InvalidSettings {
                message: format!("kernelSize must be within 1..={MAX_KERNEL_SIZE}, got {}", self.kernel_size),
            });
        }
        if self.n < 1 {
            return Err(FilterError::InvalidSettings {
                message: format!("n must be >= 1, got {}", self.n),
            });
        }
        let floats = [
            ("hardness", self.hardness),
            ("q", self.q),
            ("alpha", self.alpha),
            ("zeroCrossing", self.zero_crossing),
            ("zeta", self.zeta),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FilterError::InvalidSettings {
                message: format!("{name} must be finite, got {value}"),
            });
        }
        Ok(())
    }

    /// Loads settings from the platform config directory, falling back to
    /// defaults when nothing usable is stored there.
    pub fn load() -> Self {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "kuwahara", "KuwaharaWgpu") {
            let config_path = proj_dirs.config_dir().join("settings.json");
            if config_path.exists() {
                match Self::load_from(&config_path) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "ignoring stored settings"),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        let proj_dirs = directories::ProjectDirs::from("com", "kuwahara", "KuwaharaWgpu").ok_or_else(|| {
            FilterError::InvalidOperation {
                message: "no configuration directory available".to_string(),
            }
        })?;
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        self.save_to(&config_dir.join("settings.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
