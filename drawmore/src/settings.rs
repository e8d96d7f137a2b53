use drawmore_core::io::{EncodeSettings, Version};

const DOCUMENTATION: &str = r#"# Drawmore settings. You may edit this file, but be aware that formatting and comments will not
# be preserved, and all keys are case sensitive.

# version: container version written by `convert`, 3 or 4.
# compress_textures: store snapshot textures as PNG inside containers rather than raw pixels.
# compression_level: zlib level 0-9, for compressed containers and pictures.

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub version: Version,
    pub compress_textures: bool,
    pub compression_level: u32,
}
impl Default for Settings {
    fn default() -> Self {
        let encode = EncodeSettings::default();
        Self {
            version: Version::CURRENT,
            compress_textures: encode.compress_textures,
            compression_level: encode.compression_level,
        }
    }
}
impl Settings {
    const FILENAME: &'static str = "settings.toml";
    /// Shared global settings, loaded from user preferences.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Loaded {
        static GLOBAL_SETTINGS: std::sync::OnceLock<Loaded> = std::sync::OnceLock::new();

        GLOBAL_SETTINGS.get_or_init(|| match preferences_dir() {
            None => {
                log::warn!("No preferences dir, settings defaulted.");
                Loaded {
                    settings: Settings::default(),
                    missing: false,
                }
            }
            Some(mut dir) => {
                dir.push(Self::FILENAME);
                Self::load_or_default(&dir)
            }
        })
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Loaded {
        let settings: anyhow::Result<Settings> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&string)?;
            Ok(settings)
        };

        match settings {
            Ok(settings) => Loaded {
                settings,
                missing: false,
            },
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound);
                if !missing {
                    log::warn!("Failed to load settings from {path:?}, defaulting:\n{e:#}");
                }
                Loaded {
                    settings: Settings::default(),
                    missing,
                }
            }
        }
    }
    #[must_use]
    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            compress_textures: self.compress_textures,
            compression_level: self.compression_level.min(9),
        }
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        // Ignore errors (could already exist). Any real errors will be emitted by file access below.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let string = DOCUMENTATION.to_owned() + &toml::ser::to_string_pretty(self)?;
        std::fs::write(preferences, string)?;
        Ok(())
    }
}

/// Settings along with how they were found.
pub struct Loaded {
    pub settings: Settings,
    /// There was no settings file at all, as opposed to one that failed to load.
    pub missing: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_file() {
        let settings: Settings = toml::from_str("compression_level = 9").unwrap();
        assert_eq!(
            settings,
            Settings {
                compression_level: 9,
                ..Settings::default()
            }
        );
        let settings: Settings = toml::from_str("version = 3").unwrap();
        assert_eq!(settings.version, Version::V3);
        assert!(toml::from_str::<Settings>("version = 7").is_err());
    }
    #[test]
    fn round_trips_through_toml() {
        let settings = Settings {
            version: Version::V3,
            compress_textures: true,
            compression_level: 2,
        };
        let string = DOCUMENTATION.to_owned() + &toml::ser::to_string_pretty(&settings).unwrap();
        assert_eq!(toml::from_str::<Settings>(&string).unwrap(), settings);
    }
    #[test]
    fn unreadable_file_defaults() {
        let loaded = Settings::load_or_default(std::path::Path::new(
            "/this/path/should/not/exist/settings.toml",
        ));
        assert!(loaded.missing);
        assert_eq!(loaded.settings, Settings::default());
    }
    #[test]
    fn level_is_clamped() {
        let settings = Settings {
            compression_level: 40,
            ..Settings::default()
        };
        assert_eq!(settings.encode_settings().compression_level, 9);
    }
}
