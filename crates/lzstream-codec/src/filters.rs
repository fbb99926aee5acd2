//! Filter chain construction
//!
//! [`FilterChainBuilder::build`] turns caller-supplied [`FilterSpec`]s into a
//! validated [`FilterChain`]: every name is resolved, option blocks are only
//! accepted where the filter understands them, LZMA stages without options get
//! synthesized defaults, and a single terminator entry is appended.

use lzstream_types::{
    DeltaOptions, Error, FilterId, FilterSpec, LzmaOptions, MatchFinder, Mode, OptionBlock,
    Result,
};
use tracing::trace;

/// Most filters liblzma accepts in one chain, terminator excluded
pub const FILTERS_MAX: usize = 4;

/// Default dictionary size (8MB)
pub const DICT_SIZE_DEFAULT: u32 = 1 << 23;
/// Default number of literal context bits
pub const LC_DEFAULT: u32 = 3;
/// Default number of literal position bits
pub const LP_DEFAULT: u32 = 0;
/// Default number of position bits
pub const PB_DEFAULT: u32 = 2;
/// Default nice match length
pub const NICE_LEN_DEFAULT: u32 = 64;

/// LZMA options used when a stage has no option block or leaves fields unset
pub fn default_lzma_options() -> LzmaOptions {
    LzmaOptions {
        dict_size: Some(DICT_SIZE_DEFAULT),
        lc: Some(LC_DEFAULT),
        lp: Some(LP_DEFAULT),
        pb: Some(PB_DEFAULT),
        mode: Some(Mode::Fast),
        nice_len: Some(NICE_LEN_DEFAULT),
        match_finder: Some(MatchFinder::Hc4),
        depth: Some(0),
        preset: None,
    }
}

/// Fill in LZMA options for a stage
///
/// A preset is expanded last and replaces every field, so only the preset is
/// kept. Without one, unset fields take the library defaults.
pub fn resolve_lzma_options(options: Option<LzmaOptions>) -> LzmaOptions {
    let Some(given) = options else {
        return default_lzma_options();
    };
    if let Some(preset) = given.preset {
        if given != LzmaOptions::with_preset(preset) {
            trace!("Preset {} overrides explicit LZMA fields", preset.level());
        }
        return LzmaOptions::with_preset(preset);
    }

    let defaults = default_lzma_options();
    LzmaOptions {
        dict_size: given.dict_size.or(defaults.dict_size),
        lc: given.lc.or(defaults.lc),
        lp: given.lp.or(defaults.lp),
        pb: given.pb.or(defaults.pb),
        mode: given.mode.or(defaults.mode),
        nice_len: given.nice_len.or(defaults.nice_len),
        match_finder: given.match_finder.or(defaults.match_finder),
        depth: given.depth.or(defaults.depth),
        preset: None,
    }
}

/// One materialized stage of a [`FilterChain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    id: FilterId,
    options: Option<OptionBlock>,
}

impl FilterEntry {
    fn terminator() -> Self {
        Self {
            id: FilterId::Unknown,
            options: None,
        }
    }

    /// Filter identifier
    pub fn id(&self) -> FilterId {
        self.id
    }

    /// Option block, if the stage carries one
    pub fn options(&self) -> Option<&OptionBlock> {
        self.options.as_ref()
    }

    /// Whether this is the chain terminator
    pub fn is_terminator(&self) -> bool {
        self.id == FilterId::Unknown
    }
}

/// A validated filter chain, owning both its entries and their option blocks
///
/// The last entry is always the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    entries: Vec<FilterEntry>,
}

impl FilterChain {
    /// A chain with no filters, only the terminator
    pub fn empty() -> Self {
        Self {
            entries: vec![FilterEntry::terminator()],
        }
    }

    /// All entries including the terminator
    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    /// The filter stages, without the terminator
    pub fn stages(&self) -> &[FilterEntry] {
        &self.entries[..self.entries.len() - 1]
    }

    /// Number of filter stages, terminator excluded
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// Whether the chain has no filter stages
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds [`FilterChain`]s from caller-supplied specs
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterChainBuilder;

impl FilterChainBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self
    }

    /// Validate and materialize a sequence of filter specs
    pub fn build<'a, I>(&self, specs: I) -> Result<FilterChain>
    where
        I: IntoIterator<Item = &'a FilterSpec>,
    {
        let mut entries = Vec::new();

        for spec in specs {
            if entries.len() == FILTERS_MAX {
                return Err(Error::invalid_argument(
                    "filters",
                    format!("at most {} filters are supported", FILTERS_MAX),
                ));
            }
            entries.push(Self::materialize(spec)?);
        }

        entries.push(FilterEntry::terminator());
        trace!("Built filter chain with {} stage(s)", entries.len() - 1);
        Ok(FilterChain { entries })
    }

    fn materialize(spec: &FilterSpec) -> Result<FilterEntry> {
        let id = spec.filter_id();

        let options = match (id, spec.options) {
            (FilterId::Unknown, _) => {
                return Err(Error::UnknownFilter {
                    name: spec.id.clone(),
                })
            }
            (FilterId::Delta, None) => Some(OptionBlock::Delta(DeltaOptions::default())),
            (FilterId::Delta, Some(OptionBlock::Delta(delta))) => {
                delta.validate()?;
                Some(OptionBlock::Delta(delta))
            }
            (FilterId::Lzma1 | FilterId::Lzma2, None) => {
                Some(OptionBlock::Lzma(resolve_lzma_options(None)))
            }
            (FilterId::Lzma1 | FilterId::Lzma2, Some(OptionBlock::Lzma(lzma))) => {
                Some(OptionBlock::Lzma(resolve_lzma_options(Some(lzma))))
            }
            (FilterId::Delta | FilterId::Lzma1 | FilterId::Lzma2, Some(_)) => {
                return Err(Error::invalid_argument(
                    "options",
                    format!("option block does not match filter {}", id),
                ))
            }
            (_, None) => None,
            (_, Some(_)) => {
                return Err(Error::UnsupportedOptions {
                    filter: id.name().to_string(),
                })
            }
        };

        Ok(FilterEntry { id, options })
    }
}

/// Build a filter chain with the default builder
pub fn build(specs: &[FilterSpec]) -> Result<FilterChain> {
    FilterChainBuilder::new().build(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzstream_types::{ErrorKind, Preset};
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_empty_input_yields_terminator_only() {
        let chain = build(&[]).unwrap();
        assert!(chain.is_empty());
        assert_eq!(chain.entries().len(), 1);
        assert!(chain.entries()[0].is_terminator());
        assert!(chain.entries()[0].options().is_none());
    }

    #[test]
    fn test_exactly_one_terminator_is_appended() {
        let specs = vec![FilterSpec::new(FilterId::X86), FilterSpec::new(FilterId::Lzma2)];
        let chain = build(&specs).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.entries().iter().filter(|e| e.is_terminator()).count(),
            1
        );
        assert!(chain.entries().last().unwrap().is_terminator());
        assert_eq!(chain.stages()[0].id(), FilterId::X86);
        assert_eq!(chain.stages()[1].id(), FilterId::Lzma2);
    }

    #[rstest]
    #[case("LZMA_FILTER_LZMA3")]
    #[case("LZMA_FILTERS_MAX")]
    #[case("lzma2")]
    fn test_unknown_filter_is_rejected(#[case] name: &str) {
        let err = build(&[FilterSpec::named(name)]).unwrap_err();
        assert_eq!(err, Error::UnknownFilter { name: name.to_string() });
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[rstest]
    #[case(FilterId::X86)]
    #[case(FilterId::PowerPc)]
    #[case(FilterId::Ia64)]
    #[case(FilterId::Arm)]
    #[case(FilterId::ArmThumb)]
    #[case(FilterId::Sparc)]
    fn test_branch_filters_reject_options(#[case] id: FilterId) {
        let spec = FilterSpec::new(id).with_options(OptionBlock::Delta(DeltaOptions::default()));
        let err = build(&[spec]).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedOptions {
                filter: id.name().to_string()
            }
        );

        let plain = build(&[FilterSpec::new(id)]).unwrap();
        assert!(plain.stages()[0].options().is_none());
    }

    #[rstest]
    #[case(FilterId::Lzma1)]
    #[case(FilterId::Lzma2)]
    fn test_lzma_defaults_are_synthesized(#[case] id: FilterId) {
        let chain = build(&[FilterSpec::new(id)]).unwrap();
        let Some(OptionBlock::Lzma(options)) = chain.stages()[0].options() else {
            panic!("expected LZMA options");
        };
        assert_eq!(*options, default_lzma_options());
        assert_eq!(options.dict_size, Some(8 * 1024 * 1024));
        assert_eq!(options.mode, Some(Mode::Fast));
        assert_eq!(options.nice_len, Some(64));
        assert_eq!(options.match_finder, Some(MatchFinder::Hc4));
        assert_eq!(options.depth, Some(0));
    }

    #[test]
    fn test_delta_defaults_are_synthesized() {
        let chain = build(&[FilterSpec::new(FilterId::Delta)]).unwrap();
        assert_eq!(
            chain.stages()[0].options(),
            Some(&OptionBlock::Delta(DeltaOptions { distance: 1 }))
        );
    }

    #[test]
    fn test_explicit_fields_apply_on_top_of_defaults() {
        let options = LzmaOptions {
            dict_size: Some(1 << 20),
            mode: Some(Mode::Normal),
            ..LzmaOptions::default()
        };
        let spec = FilterSpec::new(FilterId::Lzma2).with_options(OptionBlock::Lzma(options));
        let chain = build(&[spec]).unwrap();
        let Some(OptionBlock::Lzma(resolved)) = chain.stages()[0].options() else {
            panic!("expected LZMA options");
        };
        assert_eq!(resolved.dict_size, Some(1 << 20));
        assert_eq!(resolved.mode, Some(Mode::Normal));
        assert_eq!(resolved.lc, Some(LC_DEFAULT));
        assert_eq!(resolved.nice_len, Some(NICE_LEN_DEFAULT));
    }

    #[test]
    fn test_preset_replaces_explicit_fields() {
        let options = LzmaOptions {
            dict_size: Some(4096),
            nice_len: Some(8),
            ..LzmaOptions::with_preset(Preset::new(9).unwrap())
        };
        let spec = FilterSpec::new(FilterId::Lzma2).with_options(OptionBlock::Lzma(options));
        let chain = build(&[spec]).unwrap();
        let Some(OptionBlock::Lzma(resolved)) = chain.stages()[0].options() else {
            panic!("expected LZMA options");
        };
        assert_eq!(*resolved, LzmaOptions::with_preset(Preset::new(9).unwrap()));
    }

    #[test]
    fn test_preset_leaves_unset_fields_to_expansion() {
        let chain = build(&[FilterSpec::lzma2(Preset::new(9).unwrap())]).unwrap();
        let Some(OptionBlock::Lzma(resolved)) = chain.stages()[0].options() else {
            panic!("expected LZMA options");
        };
        assert_eq!(resolved.preset.map(Preset::level), Some(9));
        assert_eq!(resolved.dict_size, None);
    }

    #[test]
    fn test_invalid_delta_distance() {
        let spec = FilterSpec::delta(0);
        assert!(matches!(
            build(&[spec]),
            Err(Error::InvalidArgument { ref argument, .. }) if argument == "distance"
        ));
    }

    #[test]
    fn test_mismatched_option_block() {
        let spec = FilterSpec::new(FilterId::Delta)
            .with_options(OptionBlock::Lzma(LzmaOptions::default()));
        assert!(matches!(build(&[spec]), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_too_many_filters() {
        let specs = vec![FilterSpec::new(FilterId::Delta); FILTERS_MAX + 1];
        assert!(matches!(build(&specs), Err(Error::InvalidArgument { .. })));
        assert!(build(&specs[..FILTERS_MAX]).is_ok());
    }

    fn non_option_filter() -> impl Strategy<Value = FilterId> {
        prop_oneof![
            Just(FilterId::X86),
            Just(FilterId::PowerPc),
            Just(FilterId::Ia64),
            Just(FilterId::Arm),
            Just(FilterId::ArmThumb),
            Just(FilterId::Sparc),
        ]
    }

    fn option_filter() -> impl Strategy<Value = FilterId> {
        prop_oneof![
            Just(FilterId::Delta),
            Just(FilterId::Lzma1),
            Just(FilterId::Lzma2),
        ]
    }

    proptest! {
        #[test]
        fn prop_options_on_other_filters_always_fail(id in non_option_filter(), distance in 1u16..=256) {
            let spec = FilterSpec::new(id).with_options(OptionBlock::Delta(DeltaOptions { distance }));
            let is_unsupported = matches!(build(&[spec]), Err(Error::UnsupportedOptions { .. }));
            prop_assert!(is_unsupported);
        }

        #[test]
        fn prop_option_filters_without_options_never_fail(ids in prop::collection::vec(option_filter(), 0..=FILTERS_MAX)) {
            let specs: Vec<_> = ids.iter().copied().map(FilterSpec::new).collect();
            let chain = build(&specs).unwrap();
            prop_assert_eq!(chain.len(), ids.len());
            for entry in chain.stages() {
                prop_assert!(entry.options().is_some());
            }
        }
    }
}
