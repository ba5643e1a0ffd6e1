// Pitch -> screen coordinate mapping
//
// A key map lists where each playable pitch sits on the instrument's on-screen
// keyboard. Maps are written either in percent of the screen, which works on
// any resolution as-is, or in pixels measured on a reference screen, which are
// rescaled to the current screen.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Lowest pitch of the built-in layout (C3)
pub const DEFAULT_LOWEST_PITCH: u8 = 48;

/// Keys per row of the built-in layout
pub const DEFAULT_KEYS_PER_ROW: usize = 7;

/// Row heights of the built-in layout in percent, lowest notes first
const DEFAULT_ROW_Y: [f64; 3] = [80.0, 65.0, 50.0];

/// Resolves a pitch to the point that plays it
pub trait PitchLocator: Send + Sync {
    fn locate(&self, pitch: u8) -> Option<ScreenPoint>;

    fn supports(&self, pitch: u8) -> bool {
        self.locate(pitch).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateUnits {
    Percent,
    Pixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub pitch: u8,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key map: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Pixel key maps need a reference screen size")]
    MissingReference,

    #[error("Reference screen size must be non-zero")]
    ZeroReference,

    #[error("Pitch out of MIDI range: {0}")]
    InvalidPitch(u8),

    #[error("Pitch mapped twice: {0}")]
    DuplicatePitch(u8),

    #[error("Coordinate for pitch {0} is not a finite number")]
    InvalidCoordinate(u8),
}

/// Key map as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMap {
    pub name: String,

    pub units: CoordinateUnits,

    /// Screen the pixel coordinates were measured on
    #[serde(default)]
    pub reference: Option<ScreenSize>,

    pub keys: Vec<KeyEntry>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::default_layout()
    }
}

impl KeyMap {
    /// 21 white keys from C3 to B5 in three rows of seven, lowest row at the
    /// bottom of the screen.
    pub fn default_layout() -> Self {
        let white_keys = (DEFAULT_LOWEST_PITCH..=u8::MAX)
            .filter(|p| !crate::transform::is_black_key(*p))
            .take(DEFAULT_KEYS_PER_ROW * DEFAULT_ROW_Y.len());

        let keys = white_keys
            .enumerate()
            .map(|(i, pitch)| {
                let row = i / DEFAULT_KEYS_PER_ROW;
                let column = i % DEFAULT_KEYS_PER_ROW;
                KeyEntry {
                    pitch,
                    x: 20.0 + 10.0 * column as f64,
                    y: DEFAULT_ROW_Y[row],
                }
            })
            .collect();

        Self {
            name: "Default 21-key".to_string(),
            units: CoordinateUnits::Percent,
            reference: None,
            keys,
        }
    }

    pub fn load(path: &Path) -> Result<Self, KeyMapError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KeyMapError> {
        let map: KeyMap = toml::from_str(contents)?;
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), KeyMapError> {
        if self.units == CoordinateUnits::Pixels {
            match self.reference {
                None => return Err(KeyMapError::MissingReference),
                Some(r) if r.width == 0 || r.height == 0 => return Err(KeyMapError::ZeroReference),
                Some(_) => {}
            }
        }

        let mut seen = BTreeSet::new();
        for key in &self.keys {
            if key.pitch > 127 {
                return Err(KeyMapError::InvalidPitch(key.pitch));
            }
            if !seen.insert(key.pitch) {
                return Err(KeyMapError::DuplicatePitch(key.pitch));
            }
            if !key.x.is_finite() || !key.y.is_finite() {
                return Err(KeyMapError::InvalidCoordinate(key.pitch));
            }
        }

        Ok(())
    }

    /// Pitches allowed to open a note
    pub fn supported_pitches(&self) -> BTreeSet<u8> {
        self.keys.iter().map(|k| k.pitch).collect()
    }

    /// Resolve coordinates for the current screen.
    ///
    /// Percent coordinates pass through unchanged. Pixel coordinates are
    /// scaled per axis by `screen / reference`; with no known screen they are
    /// used as measured.
    pub fn locator(&self, screen: Option<ScreenSize>) -> Result<ScreenLocator, KeyMapError> {
        self.validate()?;

        let (scale_x, scale_y) = match (self.units, self.reference, screen) {
            (CoordinateUnits::Pixels, Some(reference), Some(screen)) => (
                screen.width as f64 / reference.width as f64,
                screen.height as f64 / reference.height as f64,
            ),
            _ => (1.0, 1.0),
        };

        let points = self
            .keys
            .iter()
            .map(|k| (k.pitch, ScreenPoint { x: k.x * scale_x, y: k.y * scale_y }))
            .collect();

        Ok(ScreenLocator { points })
    }
}

/// Key map resolved against a concrete screen
#[derive(Debug, Clone, Default)]
pub struct ScreenLocator {
    points: HashMap<u8, ScreenPoint>,
}

impl ScreenLocator {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PitchLocator for ScreenLocator {
    fn locate(&self, pitch: u8) -> Option<ScreenPoint> {
        self.points.get(&pitch).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_covers_white_keys_c3_to_b5() {
        let map = KeyMap::default_layout();
        let pitches: Vec<u8> = map.supported_pitches().into_iter().collect();

        assert_eq!(pitches.len(), 21);
        assert_eq!(pitches.first(), Some(&48));
        assert_eq!(pitches.last(), Some(&83));
        assert!(pitches.iter().all(|p| !crate::transform::is_black_key(*p)));
        assert!(map.validate().is_ok());

        let locator = map.locator(None).unwrap();
        assert_eq!(locator.len(), 21);
        assert!(!locator.is_empty());
        // C4 opens the middle row
        assert_eq!(locator.locate(60), Some(ScreenPoint { x: 20.0, y: 65.0 }));
        assert_eq!(locator.locate(61), None);
    }

    #[test]
    fn percent_coordinates_ignore_screen_size() {
        let map = KeyMap::from_toml_str(
            r#"
            name = "tiny"
            units = "percent"

            [[keys]]
            pitch = 60
            x = 12.5
            y = 90.0
            "#,
        )
        .unwrap();

        let locator = map.locator(Some(ScreenSize { width: 3000, height: 1000 })).unwrap();
        assert_eq!(locator.locate(60), Some(ScreenPoint { x: 12.5, y: 90.0 }));
    }

    #[test]
    fn pixel_coordinates_scale_with_screen() {
        let map = KeyMap::from_toml_str(
            r#"
            name = "phone"
            units = "pixels"
            reference = { width = 1920, height = 1080 }

            [[keys]]
            pitch = 60
            x = 960.0
            y = 540.0

            [[keys]]
            pitch = 62
            x = 100.0
            y = 1000.0
            "#,
        )
        .unwrap();

        let locator = map.locator(Some(ScreenSize { width: 2400, height: 1080 })).unwrap();
        assert_eq!(locator.locate(60), Some(ScreenPoint { x: 1200.0, y: 540.0 }));
        assert_eq!(locator.locate(62), Some(ScreenPoint { x: 125.0, y: 1000.0 }));

        let unscaled = map.locator(None).unwrap();
        assert_eq!(unscaled.locate(60), Some(ScreenPoint { x: 960.0, y: 540.0 }));
    }

    #[test]
    fn rejects_bad_maps() {
        let missing_reference = r#"
            name = "x"
            units = "pixels"
            keys = []
        "#;
        assert!(matches!(
            KeyMap::from_toml_str(missing_reference),
            Err(KeyMapError::MissingReference)
        ));

        let duplicate = r#"
            name = "x"
            units = "percent"
            keys = [{ pitch = 60, x = 1.0, y = 1.0 }, { pitch = 60, x = 2.0, y = 2.0 }]
        "#;
        assert!(matches!(
            KeyMap::from_toml_str(duplicate),
            Err(KeyMapError::DuplicatePitch(60))
        ));

        let out_of_range = r#"
            name = "x"
            units = "percent"
            keys = [{ pitch = 128, x = 1.0, y = 1.0 }]
        "#;
        assert!(matches!(
            KeyMap::from_toml_str(out_of_range),
            Err(KeyMapError::InvalidPitch(128))
        ));

        assert!(matches!(KeyMap::from_toml_str("units = 3"), Err(KeyMapError::Parse(_))));
    }

    #[test]
    fn round_trips_through_toml() {
        let map = KeyMap::default_layout();
        let text = toml::to_string_pretty(&map).unwrap();
        assert_eq!(KeyMap::from_toml_str(&text).unwrap(), map);
    }

    #[test]
    fn map_without_keys_locates_nothing() {
        let map = KeyMap::from_toml_str("name = \"blank\"\nunits = \"percent\"\nkeys = []\n").unwrap();
        let locator = map.locator(None).unwrap();
        assert!(locator.is_empty());
        assert_eq!(locator.locate(60), None);
    }
}
