//! The in-memory shape of a parsed `GSUB` table.

use crate::tag::Tag;

/// The required-feature sentinel in a language system table.
pub const NO_REQUIRED_FEATURE: u16 = 0xffff;

/// A script table: the language systems a script declares.
#[derive(Debug, Default)]
pub struct ScriptTable {
    /// The default language system, if the script declares one.
    pub default_lang_sys: Option<LangSysTable>,
    /// Named language systems, in declaration order.
    pub lang_sys_tables: Vec<(Tag, LangSysTable)>,
}

/// A language system table: which features apply for one script/language
/// combination.
#[derive(Debug, Default)]
pub struct LangSysTable {
    /// Reserved, always zero in practice.
    pub lookup_order: u16,
    /// Index of the required feature, or [`NO_REQUIRED_FEATURE`].
    pub required_feature_index: u16,
    /// Indices of the optional features.
    pub feature_indices: Vec<u16>,
}

/// A feature record: the feature tag plus its table.
#[derive(Debug)]
pub struct FeatureRecord {
    /// The feature tag, e.g. `vert` or `liga`.
    pub tag: Tag,
    /// The feature table itself.
    pub table: FeatureTable,
}

/// A feature table: the lookups a feature applies.
#[derive(Debug)]
pub struct FeatureTable {
    /// Offset to feature parameters, zero if absent.
    pub feature_params: u16,
    /// Indices into the lookup list, in application order.
    pub lookup_indices: Vec<u16>,
}

/// A lookup table: one substitution rule set.
#[derive(Debug)]
pub struct LookupTable {
    /// The lookup type after extension resolution.
    pub lookup_type: u16,
    /// The raw lookup flag.
    pub lookup_flag: u16,
    /// The mark filtering set, present when bit 4 of the flag is set.
    pub mark_filtering_set: Option<u16>,
    /// The subtables, in declaration order.
    pub subtables: Vec<LookupSubtable>,
}

/// One substitution subtable.
#[derive(Debug)]
pub enum LookupSubtable {
    /// Single substitution, format 1: output is input plus a delta.
    SingleDelta {
        /// The glyphs this subtable covers.
        coverage: CoverageTable,
        /// The delta added to a covered glyph id.
        delta: i16,
    },
    /// Single substitution, format 2: output listed per covered glyph.
    SingleList {
        /// The glyphs this subtable covers.
        coverage: CoverageTable,
        /// One substitute per coverage index.
        substitutes: Vec<u16>,
    },
    /// One-to-many substitution.
    Multiple {
        /// The glyphs this subtable covers.
        coverage: CoverageTable,
        /// One output sequence per coverage index.
        sequences: Vec<Vec<u16>>,
    },
    /// One-from-many substitution.
    Alternate {
        /// The glyphs this subtable covers.
        coverage: CoverageTable,
        /// One alternate set per coverage index.
        alternates: Vec<Vec<u16>>,
    },
    /// Many-to-one substitution.
    Ligature {
        /// The glyphs a ligature may start with.
        coverage: CoverageTable,
        /// One ligature set per coverage index.
        sets: Vec<LigatureSet>,
    },
}

impl LookupSubtable {
    /// The coverage table of this subtable.
    pub fn coverage(&self) -> &CoverageTable {
        match self {
            Self::SingleDelta { coverage, .. }
            | Self::SingleList { coverage, .. }
            | Self::Multiple { coverage, .. }
            | Self::Alternate { coverage, .. }
            | Self::Ligature { coverage, .. } => coverage,
        }
    }

    /// The one-to-one substitute for `gid` at `coverage_index`.
    ///
    /// Only the single substitution formats map one glyph to one glyph;
    /// every other subtable kind leaves the glyph alone here.
    pub fn substitute(&self, gid: i32, coverage_index: usize) -> i32 {
        match self {
            Self::SingleDelta { delta, .. } => gid + i32::from(*delta),
            Self::SingleList { substitutes, .. } => substitutes
                .get(coverage_index)
                .map_or(gid, |s| i32::from(*s)),
            _ => gid,
        }
    }
}

/// A set of ligatures sharing a first component.
#[derive(Debug)]
pub struct LigatureSet {
    /// The ligatures, in declaration (priority) order.
    pub ligatures: Vec<LigatureTable>,
}

/// One ligature: its components and the glyph they compose to.
#[derive(Debug)]
pub struct LigatureTable {
    /// The glyph the components compose to.
    pub ligature_glyph: u16,
    /// All components including the first, which comes from coverage.
    pub component_glyphs: Vec<u16>,
}

/// A coverage table, normalized to a flat glyph list.
///
/// Range records are expanded at parse time so lookups only ever scan one
/// list; the position of a glyph in the list is its coverage index.
#[derive(Debug)]
pub struct CoverageTable {
    /// The declared format, kept for diagnostics.
    pub format: u16,
    /// The covered glyphs, in coverage index order.
    pub glyphs: Vec<u16>,
}

impl CoverageTable {
    /// The coverage index of `gid`, if covered.
    pub fn coverage_index(&self, gid: i32) -> Option<usize> {
        let gid = u16::try_from(gid).ok()?;

        self.glyphs.iter().position(|g| *g == gid)
    }

    /// How many glyphs are covered.
    pub fn size(&self) -> usize {
        self.glyphs.len()
    }

    /// The glyph at a coverage index.
    pub fn glyph_id(&self, index: usize) -> Option<u16> {
        self.glyphs.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{CoverageTable, LookupSubtable};

    #[test]
    fn coverage_index_is_the_list_position() {
        let coverage = CoverageTable {
            format: 1,
            glyphs: vec![5, 7, 9],
        };

        assert_eq!(coverage.coverage_index(5), Some(0));
        assert_eq!(coverage.coverage_index(9), Some(2));
        assert_eq!(coverage.coverage_index(6), None);
        assert_eq!(coverage.coverage_index(-1), None);
        assert_eq!(coverage.size(), 3);
        assert_eq!(coverage.glyph_id(1), Some(7));
    }

    #[test]
    fn both_coverage_formats_agree_on_the_same_glyph_set() {
        let explicit = CoverageTable {
            format: 1,
            glyphs: vec![5, 6, 7, 8, 9],
        };
        // What a single (5, 9) range record expands to.
        let expanded = CoverageTable {
            format: 2,
            glyphs: (5..=9).collect(),
        };

        for gid in 0..20 {
            assert_eq!(explicit.coverage_index(gid), expanded.coverage_index(gid));
        }
    }

    #[test]
    fn delta_substitution_wraps_in_i32() {
        let subtable = LookupSubtable::SingleDelta {
            coverage: CoverageTable {
                format: 1,
                glyphs: vec![10],
            },
            delta: -3,
        };

        assert_eq!(subtable.substitute(10, 0), 7);
    }

    #[test]
    fn list_substitution_indexes_by_coverage() {
        let subtable = LookupSubtable::SingleList {
            coverage: CoverageTable {
                format: 1,
                glyphs: vec![10, 11],
            },
            substitutes: vec![100, 101],
        };

        assert_eq!(subtable.substitute(11, 1), 101);
    }
}
