//! Filter specifications and their option blocks

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{FilterId, MatchFinder, Mode};
use crate::{Error, Result};

/// Compression preset: a level from 0 to 9, optionally marked extreme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
pub struct Preset(u32);

impl Preset {
    /// Bits holding the level
    pub const LEVEL_MASK: u32 = 0x1f;
    /// Flag selecting the slower, slightly stronger variant of a level
    pub const EXTREME: u32 = 0x8000_0000;
    /// Highest level
    pub const MAX_LEVEL: u32 = 9;
    /// Default preset
    pub const DEFAULT: Self = Self(6);

    /// Create a preset from a level
    pub fn new(level: u32) -> Result<Self> {
        Self::from_raw(level)
    }

    /// Parse a raw preset value, level bits plus the optional extreme flag
    pub fn from_raw(raw: u32) -> Result<Self> {
        let level = raw & Self::LEVEL_MASK;
        if raw & !(Self::LEVEL_MASK | Self::EXTREME) != 0 || level > Self::MAX_LEVEL {
            return Err(Error::invalid_argument(
                "preset",
                format!("{:#x} is not a valid preset", raw),
            ));
        }
        Ok(Self(raw))
    }

    /// The same level with the extreme flag set
    pub fn extreme(self) -> Self {
        Self(self.0 | Self::EXTREME)
    }

    /// Level from 0 to 9
    pub fn level(self) -> u32 {
        self.0 & Self::LEVEL_MASK
    }

    /// Whether the extreme flag is set
    pub fn is_extreme(self) -> bool {
        self.0 & Self::EXTREME != 0
    }

    /// Raw value as understood by liblzma
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Preset {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<Preset> for u32 {
    fn from(preset: Preset) -> Self {
        preset.raw()
    }
}

/// Options for the delta filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaOptions {
    /// Distance in bytes between compared samples, 1 to 256
    pub distance: u16,
}

impl DeltaOptions {
    /// Smallest accepted distance
    pub const MIN_DISTANCE: u16 = 1;
    /// Largest accepted distance
    pub const MAX_DISTANCE: u16 = 256;

    /// Create delta options, validating the distance
    pub fn new(distance: u16) -> Result<Self> {
        let options = Self { distance };
        options.validate()?;
        Ok(options)
    }

    /// Check that the distance is in range
    pub fn validate(&self) -> Result<()> {
        if (Self::MIN_DISTANCE..=Self::MAX_DISTANCE).contains(&self.distance) {
            Ok(())
        } else {
            Err(Error::invalid_argument(
                "distance",
                format!(
                    "{} is outside {}..={}",
                    self.distance,
                    Self::MIN_DISTANCE,
                    Self::MAX_DISTANCE
                ),
            ))
        }
    }

    /// liblzma's single-byte encoding of the distance
    pub fn property_byte(&self) -> u8 {
        self.distance.saturating_sub(1) as u8
    }
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self { distance: 1 }
    }
}

/// Options for the LZMA1 and LZMA2 filters
///
/// Every field is optional. Missing fields take the preset's value when a
/// preset is given and the library defaults otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LzmaOptions {
    /// Dictionary size in bytes
    pub dict_size: Option<u32>,
    /// Literal context bits
    pub lc: Option<u32>,
    /// Literal position bits
    pub lp: Option<u32>,
    /// Position bits
    pub pb: Option<u32>,
    /// Compression mode
    pub mode: Option<Mode>,
    /// Nice length of a match
    pub nice_len: Option<u32>,
    /// Match finder
    pub match_finder: Option<MatchFinder>,
    /// Maximum search depth, 0 lets the encoder choose
    pub depth: Option<u32>,
    /// Preset used as the base for the fields above
    pub preset: Option<Preset>,
}

impl LzmaOptions {
    /// Options based on a preset
    pub fn with_preset(preset: Preset) -> Self {
        Self {
            preset: Some(preset),
            ..Self::default()
        }
    }
}

/// Option block attached to a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OptionBlock {
    /// Delta filter options
    Delta(DeltaOptions),
    /// LZMA1/LZMA2 options
    Lzma(LzmaOptions),
}

/// One entry of a caller-supplied filter chain
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterSpec {
    /// Filter name, resolved through [`FilterId::from_name`]
    pub id: String,
    /// Optional option block, written as a `{ delta: {...} }` style map
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "serde_yaml::with::singleton_map")
    )]
    pub options: Option<OptionBlock>,
}

impl FilterSpec {
    /// Spec for a known filter without options
    pub fn new(id: FilterId) -> Self {
        Self {
            id: id.name().to_string(),
            options: None,
        }
    }

    /// Spec for a filter given by name
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            id: name.into(),
            options: None,
        }
    }

    /// Attach an option block
    pub fn with_options(mut self, options: OptionBlock) -> Self {
        self.options = Some(options);
        self
    }

    /// LZMA2 at the given preset
    pub fn lzma2(preset: Preset) -> Self {
        Self::new(FilterId::Lzma2).with_options(OptionBlock::Lzma(LzmaOptions::with_preset(preset)))
    }

    /// Delta filter with the given distance
    pub fn delta(distance: u16) -> Self {
        Self::new(FilterId::Delta).with_options(OptionBlock::Delta(DeltaOptions { distance }))
    }

    /// Resolve the filter name
    pub fn filter_id(&self) -> FilterId {
        FilterId::from_name(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, true)]
    #[case(9, true)]
    #[case(10, false)]
    #[case(6 | Preset::EXTREME, true)]
    #[case(0x100, false)]
    fn test_preset_validation(#[case] raw: u32, #[case] valid: bool) {
        assert_eq!(Preset::from_raw(raw).is_ok(), valid);
    }

    #[test]
    fn test_preset_extreme() {
        let preset = Preset::new(6).unwrap().extreme();
        assert_eq!(preset.level(), 6);
        assert!(preset.is_extreme());
        assert_eq!(preset.raw(), 0x8000_0006);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(256, true)]
    #[case(257, false)]
    fn test_delta_distance_range(#[case] distance: u16, #[case] valid: bool) {
        assert_eq!(DeltaOptions::new(distance).is_ok(), valid);
    }

    #[test]
    fn test_delta_property_byte() {
        assert_eq!(DeltaOptions { distance: 1 }.property_byte(), 0);
        assert_eq!(DeltaOptions { distance: 256 }.property_byte(), 255);
        assert_eq!(DeltaOptions { distance: 0 }.property_byte(), 0);
    }

    #[test]
    fn test_filter_spec_constructors() {
        let spec = FilterSpec::lzma2(Preset::DEFAULT);
        assert_eq!(spec.id, "LZMA_FILTER_LZMA2");
        assert_eq!(spec.filter_id(), FilterId::Lzma2);
        assert!(matches!(
            spec.options,
            Some(OptionBlock::Lzma(LzmaOptions { preset: Some(p), .. })) if p == Preset::DEFAULT
        ));

        assert_eq!(FilterSpec::named("bogus").filter_id(), FilterId::Unknown);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_filter_spec_serde() {
        let json = r#"{"id":"LZMA_FILTER_DELTA","options":{"delta":{"distance":4}}}"#;
        let spec: FilterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, FilterSpec::delta(4));

        let json = r#"{"id":"LZMA_FILTER_LZMA2","options":{"lzma":{"preset":9,"nice_len":128}}}"#;
        let spec: FilterSpec = serde_json::from_str(json).unwrap();
        match spec.options {
            Some(OptionBlock::Lzma(options)) => {
                assert_eq!(options.preset.map(Preset::level), Some(9));
                assert_eq!(options.nice_len, Some(128));
                assert_eq!(options.dict_size, None);
            }
            other => panic!("unexpected options {:?}", other),
        }

        let invalid = r#"{"id":"LZMA_FILTER_LZMA2","options":{"lzma":{"preset":42}}}"#;
        assert!(serde_json::from_str::<FilterSpec>(invalid).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_filter_spec_yaml_uses_plain_maps() {
        let specs = vec![
            FilterSpec::delta(8),
            FilterSpec::lzma2(Preset::new(4).unwrap()),
            FilterSpec::new(FilterId::X86),
        ];
        let yaml = serde_yaml::to_string(&specs).unwrap();
        assert!(!yaml.contains('!'), "tagged enum in {}", yaml);
        assert!(yaml.contains("delta:"));
        assert!(yaml.contains("lzma:"));

        let parsed: Vec<FilterSpec> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, specs);

        let parsed: FilterSpec = serde_yaml::from_str("id: LZMA_FILTER_X86\n").unwrap();
        assert_eq!(parsed.options, None);
    }
}
