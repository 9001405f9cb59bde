/*!
A tolerant reader for the OpenType `GSUB` table.

The reader is deliberately forgiving: real-world fonts ship with mildly
damaged substitution tables, so structural damage that can be contained is
logged and the affected part degrades to "no substitutions" instead of
failing the whole table. Damage that would make the remaining data
meaningless (truncated reads, impossible counts) still surfaces as an
[`Error`].

Only single (one-to-one) substitutions are applied; the other subtable
kinds are parsed and retained but act as the identity when a substitution
is requested.
*/

use crate::Error;
use crate::stream::TableStream;
use crate::tag::Tag;
use log::{debug, warn};
use rustc_hash::FxHashMap;

pub mod tables;

use tables::{
    CoverageTable, FeatureRecord, FeatureTable, LangSysTable, LigatureSet, LigatureTable,
    LookupSubtable, LookupTable, ScriptTable, NO_REQUIRED_FEATURE,
};

/// The pseudo-script assigned to characters that take their script from
/// context.
pub const INHERITED: &str = "Inherited";

/// The default OpenType script tag.
pub const TAG_DEFAULT: &str = "DFLT";

trait StreamExt {
    fn u16(&mut self) -> Result<u16, Error>;
    fn i16(&mut self) -> Result<i16, Error>;
    fn u32(&mut self) -> Result<u32, Error>;
    fn tag(&mut self) -> Result<Tag, Error>;
    fn u16_array(&mut self, count: usize) -> Result<Vec<u16>, Error>;
}

impl StreamExt for TableStream<'_> {
    fn u16(&mut self) -> Result<u16, Error> {
        self.read_u16().ok_or(Error::ReadOutOfBounds)
    }

    fn i16(&mut self) -> Result<i16, Error> {
        self.read_i16().ok_or(Error::ReadOutOfBounds)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        self.read_u32().ok_or(Error::ReadOutOfBounds)
    }

    fn tag(&mut self) -> Result<Tag, Error> {
        self.read_tag().ok_or(Error::ReadOutOfBounds)
    }

    fn u16_array(&mut self, count: usize) -> Result<Vec<u16>, Error> {
        self.read_u16_array(count).ok_or(Error::ReadOutOfBounds)
    }
}

/// A parsed `GSUB` table with a cached substitution interface.
///
/// Substitutions are memoized: once a glyph has been substituted, later
/// requests for the same glyph return the same answer regardless of script
/// or enabled features, and the mapping can be walked backwards through
/// [`get_unsubstitution`](Self::get_unsubstitution).
#[derive(Debug)]
pub struct GsubTable {
    scripts: Vec<(Tag, ScriptTable)>,
    features: Vec<FeatureRecord>,
    lookups: Vec<LookupTable>,
    lookup_cache: FxHashMap<i32, i32>,
    reverse_lookup: FxHashMap<i32, i32>,
    last_used_supported_script: Option<Tag>,
}

impl GsubTable {
    /// Parse a `GSUB` table from its raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut stream = TableStream::new(data);

        let _major_version = stream.u16()?;
        let minor_version = stream.u16()?;
        let script_list_offset = stream.u16()? as usize;
        let feature_list_offset = stream.u16()? as usize;
        let lookup_list_offset = stream.u16()? as usize;

        if minor_version == 1 {
            let _feature_variations_offset = stream.u32()?;
        }

        let scripts = read_script_list(&mut stream, script_list_offset)?;
        let features = read_feature_list(&mut stream, feature_list_offset)?;
        let lookups = read_lookup_list(&mut stream, lookup_list_offset)?;

        Ok(Self {
            scripts,
            features,
            lookups,
            lookup_cache: FxHashMap::default(),
            reverse_lookup: FxHashMap::default(),
            last_used_supported_script: None,
        })
    }

    /// Apply glyph substitution to `gid`.
    ///
    /// `script_tags` are the candidate OpenType scripts for the glyph, in
    /// preference order; `enabled_features` optionally restricts which
    /// optional features apply (`None` allows all). Required features apply
    /// regardless.
    ///
    /// The result is memoized by input glyph so the mapping stays
    /// one-to-one across calls.
    pub fn get_substitution(
        &mut self,
        gid: i32,
        script_tags: &[&str],
        enabled_features: Option<&[&str]>,
    ) -> i32 {
        if gid == -1 {
            return -1;
        }

        if let Some(cached) = self.lookup_cache.get(&gid) {
            // Script detection for indeterminate scripts depends on context,
            // so the same gid could resolve differently across calls. Keep
            // the first answer so the mapping stays one-to-one.
            return *cached;
        }

        let lang_sys = match self.select_script_tag(script_tags) {
            Some(script) => self.lang_sys_tables(script),
            None => Vec::new(),
        };
        let feature_indices = self.feature_record_indices(&lang_sys, enabled_features);

        let mut sgid = gid;
        for index in feature_indices {
            sgid = self.apply_feature(index, sgid);
        }

        self.lookup_cache.insert(gid, sgid);
        self.reverse_lookup.insert(sgid, gid);

        sgid
    }

    /// Walk a substitution backwards: for a glyph previously produced by
    /// [`get_substitution`](Self::get_substitution), return the input glyph.
    ///
    /// Glyphs this instance never produced come back unchanged.
    pub fn get_unsubstitution(&self, sgid: i32) -> i32 {
        match self.reverse_lookup.get(&sgid) {
            Some(gid) => *gid,
            None => {
                warn!("trying to un-substitute a never-before-seen gid: {sgid}");

                sgid
            }
        }
    }

    /// Pick the best supported script from the candidates.
    fn select_script_tag(&mut self, tags: &[&str]) -> Option<Tag> {
        if let [tag] = tags {
            let is_supported = |t: &str| self.scripts.iter().any(|(s, _)| *s == t);

            if *tag == INHERITED || (*tag == TAG_DEFAULT && !is_supported(tag)) {
                // We don't know what script this really is. Reuse the last
                // supported script we saw; with no past context, guess the
                // first script the font declares.
                if self.last_used_supported_script.is_none() {
                    self.last_used_supported_script =
                        self.scripts.first().map(|(script, _)| *script);
                }

                return self.last_used_supported_script;
            }
        }

        for tag in tags {
            if let Some((script, _)) = self.scripts.iter().find(|(s, _)| *s == *tag) {
                // Use the first recognized tag, assuming a font that knows
                // several versions of a script prefers the latest.
                self.last_used_supported_script = Some(*script);

                return self.last_used_supported_script;
            }
        }

        Tag::parse(tags.first()?)
    }

    /// All language systems of a script, named ones first, the default last.
    fn lang_sys_tables(&self, script: Tag) -> Vec<&LangSysTable> {
        let Some((_, table)) = self.scripts.iter().find(|(s, _)| *s == script) else {
            return Vec::new();
        };

        let mut result: Vec<&LangSysTable> =
            table.lang_sys_tables.iter().map(|(_, t)| t).collect();

        if let Some(default) = &table.default_lang_sys {
            result.push(default);
        }

        result
    }

    /// Indices into the feature list selected by the given language systems.
    ///
    /// Required features apply even when not enabled. When an enabled list
    /// is given, the result is ordered by it.
    fn feature_record_indices(
        &self,
        lang_sys_tables: &[&LangSysTable],
        enabled_features: Option<&[&str]>,
    ) -> Vec<usize> {
        let mut result = Vec::new();

        for lang_sys in lang_sys_tables {
            let required = lang_sys.required_feature_index;

            if required != NO_REQUIRED_FEATURE && (required as usize) < self.features.len() {
                result.push(required as usize);
            }

            for index in &lang_sys.feature_indices {
                let index = *index as usize;

                let Some(record) = self.features.get(index) else {
                    continue;
                };

                let enabled = enabled_features
                    .is_none_or(|enabled| enabled.iter().any(|t| record.tag == *t));

                if enabled {
                    result.push(index);
                }
            }
        }

        // 'vrt2' supersedes 'vert' and they should not be used together.
        if result.iter().any(|i| self.features[*i].tag == "vrt2") {
            result.retain(|i| self.features[*i].tag != "vert");
        }

        if let Some(enabled) = enabled_features
            && result.len() > 1
        {
            result.sort_by_key(|i| {
                enabled
                    .iter()
                    .position(|t| self.features[*i].tag == *t)
                    .map_or(-1, |p| p as i64)
            });
        }

        result
    }

    /// Run one feature's lookups over `gid`.
    fn apply_feature(&self, feature_index: usize, gid: i32) -> i32 {
        let record = &self.features[feature_index];
        let mut result = gid;

        for lookup_index in &record.table.lookup_indices {
            let Some(lookup) = self.lookups.get(*lookup_index as usize) else {
                continue;
            };

            if lookup.lookup_type != 1 {
                debug!(
                    "skipping feature '{}' because it requires unsupported lookup type {}",
                    record.tag, lookup.lookup_type
                );

                continue;
            }

            result = do_lookup(lookup, result);
        }

        result
    }
}

/// Apply the first subtable that covers `gid`.
fn do_lookup(lookup: &LookupTable, gid: i32) -> i32 {
    for subtable in &lookup.subtables {
        if let Some(index) = subtable.coverage().coverage_index(gid) {
            return subtable.substitute(gid, index);
        }
    }

    gid
}

fn read_script_list(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<Vec<(Tag, ScriptTable)>, Error> {
    stream.seek(offset);
    let script_count = stream.u16()? as usize;

    let mut records = Vec::with_capacity(script_count);
    for i in 0..script_count {
        let tag = stream.tag()?;
        let script_offset = stream.u16()? as usize;

        if i > 0
            && let Some((prev, _)) = records.last()
            && tag < *prev
        {
            debug!("script records not sorted by tag: {tag} < {prev}");
        }

        records.push((tag, script_offset));
    }

    let mut scripts = Vec::with_capacity(script_count);
    for (tag, script_offset) in records {
        scripts.push((tag, read_script_table(stream, offset + script_offset)?));
    }

    Ok(scripts)
}

fn read_script_table(stream: &mut TableStream<'_>, offset: usize) -> Result<ScriptTable, Error> {
    stream.seek(offset);
    let default_lang_sys_offset = stream.u16()? as usize;
    let lang_sys_count = stream.u16()? as usize;

    let mut records: Vec<(Tag, usize)> = Vec::with_capacity(lang_sys_count);
    for i in 0..lang_sys_count {
        let tag = stream.tag()?;
        let lang_sys_offset = stream.u16()? as usize;

        if lang_sys_offset < stream.position() - offset {
            // An offset into the record array itself cannot be right.
            warn!("language system offset points before the end of its record array");

            return Ok(ScriptTable::default());
        }

        if i > 0
            && let Some((prev, _)) = records.last()
            && tag < *prev
        {
            warn!("language system records not sorted by tag: {tag} < {prev}");

            return Ok(ScriptTable::default());
        }

        records.push((tag, lang_sys_offset));
    }

    let default_lang_sys = if default_lang_sys_offset != 0 {
        Some(read_lang_sys_table(
            stream,
            offset + default_lang_sys_offset,
        )?)
    } else {
        None
    };

    let mut lang_sys_tables = Vec::with_capacity(lang_sys_count);
    for (tag, lang_sys_offset) in records {
        lang_sys_tables.push((tag, read_lang_sys_table(stream, offset + lang_sys_offset)?));
    }

    Ok(ScriptTable {
        default_lang_sys,
        lang_sys_tables,
    })
}

fn read_lang_sys_table(stream: &mut TableStream<'_>, offset: usize) -> Result<LangSysTable, Error> {
    stream.seek(offset);
    let lookup_order = stream.u16()?;
    let required_feature_index = stream.u16()?;
    let feature_index_count = stream.u16()? as usize;
    let feature_indices = stream.u16_array(feature_index_count)?;

    Ok(LangSysTable {
        lookup_order,
        required_feature_index,
        feature_indices,
    })
}

fn read_feature_list(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<Vec<FeatureRecord>, Error> {
    stream.seek(offset);
    let feature_count = stream.u16()? as usize;

    let mut records: Vec<(Tag, usize)> = Vec::with_capacity(feature_count);
    for i in 0..feature_count {
        let tag = stream.tag()?;
        // Each record carries its tag twice back to back; skip the echo.
        let _echo = stream.tag()?;

        if i > 0
            && let Some((prev, _)) = records.last()
            && tag < *prev
        {
            // Some widely shipped fonts merely declare their features out of
            // order, so only tags with trash bytes count as real corruption.
            if tag.is_plausible() && prev.is_plausible() {
                debug!("feature records not sorted by tag: {tag} < {prev}");
            } else {
                warn!("feature records not sorted by tag: {tag} < {prev}");

                return Ok(Vec::new());
            }
        }

        let feature_offset = stream.u16()? as usize;
        records.push((tag, feature_offset));
    }

    let mut features = Vec::with_capacity(feature_count);
    for (tag, feature_offset) in records {
        features.push(FeatureRecord {
            tag,
            table: read_feature_table(stream, offset + feature_offset)?,
        });
    }

    Ok(features)
}

fn read_feature_table(stream: &mut TableStream<'_>, offset: usize) -> Result<FeatureTable, Error> {
    stream.seek(offset);
    let feature_params = stream.u16()?;
    let lookup_index_count = stream.u16()? as usize;
    let lookup_indices = stream.u16_array(lookup_index_count)?;

    Ok(FeatureTable {
        feature_params,
        lookup_indices,
    })
}

fn read_lookup_list(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<Vec<LookupTable>, Error> {
    stream.seek(offset);
    let lookup_count = stream.u16()? as usize;
    let offsets = stream.u16_array(lookup_count)?;

    let mut lookups = Vec::with_capacity(lookup_count);
    for lookup_offset in offsets {
        lookups.push(read_lookup_table(stream, offset + lookup_offset as usize)?);
    }

    Ok(lookups)
}

fn read_lookup_table(stream: &mut TableStream<'_>, offset: usize) -> Result<LookupTable, Error> {
    stream.seek(offset);
    let mut lookup_type = stream.u16()?;
    let lookup_flag = stream.u16()?;
    let subtable_count = stream.u16()? as usize;

    let empty = |lookup_type| LookupTable {
        lookup_type,
        lookup_flag,
        mark_filtering_set: None,
        subtables: Vec::new(),
    };

    let mut subtable_offsets = Vec::with_capacity(subtable_count);
    for i in 0..subtable_count {
        let subtable_offset = stream.u16()? as usize;

        if subtable_offset == 0 {
            warn!("subtable offset {i} of lookup at {offset} is zero");

            return Ok(empty(lookup_type));
        }

        if offset + subtable_offset > stream.original_size() {
            warn!(
                "subtable offset {} of lookup at {offset} points past the end of the table",
                subtable_offset
            );

            return Ok(empty(lookup_type));
        }

        subtable_offsets.push(subtable_offset);
    }

    let mark_filtering_set = if lookup_flag & 0x0010 != 0 {
        Some(stream.u16()?)
    } else {
        None
    };

    let mut subtables = Vec::with_capacity(subtable_count);
    match lookup_type {
        1..=4 => {
            for subtable_offset in subtable_offsets {
                if let Some(subtable) =
                    read_lookup_subtable(stream, offset + subtable_offset, lookup_type)?
                {
                    subtables.push(subtable);
                }
            }
        }
        7 => {
            // Extension substitution: a level of indirection that lifts the
            // real subtable out of the 16-bit offset range.
            for subtable_offset in subtable_offsets {
                stream.seek(offset + subtable_offset);
                let subst_format = stream.u16()?;

                if subst_format != 1 {
                    warn!(
                        "extension subtable at {} declares format {subst_format}, expected 1",
                        offset + subtable_offset
                    );

                    continue;
                }

                let extension_lookup_type = stream.u16()?;

                if lookup_type != 7 && lookup_type != extension_lookup_type {
                    // All extension subtables of one lookup must agree on
                    // the wrapped type.
                    warn!(
                        "extension lookup type changed from {lookup_type} to \
                         {extension_lookup_type} at {}",
                        offset + subtable_offset
                    );

                    continue;
                }

                lookup_type = extension_lookup_type;
                let extension_offset = stream.u32()? as usize;

                if let Some(subtable) = read_lookup_subtable(
                    stream,
                    offset + subtable_offset + extension_offset,
                    extension_lookup_type,
                )? {
                    subtables.push(subtable);
                }
            }
        }
        _ => {
            warn!("type {lookup_type} GSUB lookup table is not supported and will be ignored");
        }
    }

    Ok(LookupTable {
        lookup_type,
        lookup_flag,
        mark_filtering_set,
        subtables,
    })
}

fn read_lookup_subtable(
    stream: &mut TableStream<'_>,
    offset: usize,
    lookup_type: u16,
) -> Result<Option<LookupSubtable>, Error> {
    match lookup_type {
        1 => read_single_subtable(stream, offset),
        2 => read_multiple_subtable(stream, offset).map(Some),
        3 => read_alternate_subtable(stream, offset).map(Some),
        4 => read_ligature_subtable(stream, offset).map(Some),
        _ => {
            debug!("type {lookup_type} GSUB lookup table is not supported and will be ignored");

            Ok(None)
        }
    }
}

fn read_single_subtable(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<Option<LookupSubtable>, Error> {
    stream.seek(offset);
    let subst_format = stream.u16()?;

    match subst_format {
        1 => {
            let coverage_offset = stream.u16()? as usize;
            let delta = stream.i16()?;
            let coverage = read_coverage_table(stream, offset + coverage_offset)?;

            Ok(Some(LookupSubtable::SingleDelta { coverage, delta }))
        }
        2 => {
            let coverage_offset = stream.u16()? as usize;
            let glyph_count = stream.u16()? as usize;
            let substitutes = stream.u16_array(glyph_count)?;
            let coverage = read_coverage_table(stream, offset + coverage_offset)?;

            Ok(Some(LookupSubtable::SingleList {
                coverage,
                substitutes,
            }))
        }
        _ => Ok(None),
    }
}

fn read_multiple_subtable(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<LookupSubtable, Error> {
    stream.seek(offset);
    let subst_format = stream.u16()?;

    if subst_format != 1 {
        return Err(Error::InvalidSubstFormat(subst_format));
    }

    let coverage_offset = stream.u16()? as usize;
    let sequence_count = stream.u16()? as usize;
    let sequence_offsets = stream.u16_array(sequence_count)?;

    let coverage = read_coverage_table(stream, offset + coverage_offset)?;

    if sequence_count != coverage.size() {
        return Err(Error::CoverageMismatch);
    }

    let mut sequences = Vec::with_capacity(sequence_count);
    for sequence_offset in sequence_offsets {
        stream.seek(offset + sequence_offset as usize);
        let glyph_count = stream.u16()? as usize;
        sequences.push(stream.u16_array(glyph_count)?);
    }

    Ok(LookupSubtable::Multiple {
        coverage,
        sequences,
    })
}

fn read_alternate_subtable(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<LookupSubtable, Error> {
    stream.seek(offset);
    let subst_format = stream.u16()?;

    if subst_format != 1 {
        return Err(Error::InvalidSubstFormat(subst_format));
    }

    let coverage_offset = stream.u16()? as usize;
    let alternate_set_count = stream.u16()? as usize;
    let alternate_offsets = stream.u16_array(alternate_set_count)?;

    let coverage = read_coverage_table(stream, offset + coverage_offset)?;

    if alternate_set_count != coverage.size() {
        return Err(Error::CoverageMismatch);
    }

    let mut alternates = Vec::with_capacity(alternate_set_count);
    for alternate_offset in alternate_offsets {
        stream.seek(offset + alternate_offset as usize);
        let glyph_count = stream.u16()? as usize;
        alternates.push(stream.u16_array(glyph_count)?);
    }

    Ok(LookupSubtable::Alternate {
        coverage,
        alternates,
    })
}

fn read_ligature_subtable(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<LookupSubtable, Error> {
    stream.seek(offset);
    let subst_format = stream.u16()?;

    if subst_format != 1 {
        return Err(Error::InvalidSubstFormat(subst_format));
    }

    let coverage_offset = stream.u16()? as usize;
    let ligature_set_count = stream.u16()? as usize;
    let ligature_set_offsets = stream.u16_array(ligature_set_count)?;

    let coverage = read_coverage_table(stream, offset + coverage_offset)?;

    if ligature_set_count != coverage.size() {
        return Err(Error::CoverageMismatch);
    }

    let mut sets = Vec::with_capacity(ligature_set_count);
    for (i, set_offset) in ligature_set_offsets.into_iter().enumerate() {
        let first_component = coverage.glyph_id(i).ok_or(Error::CoverageMismatch)?;
        sets.push(read_ligature_set(
            stream,
            offset + set_offset as usize,
            first_component,
        )?);
    }

    Ok(LookupSubtable::Ligature { coverage, sets })
}

fn read_ligature_set(
    stream: &mut TableStream<'_>,
    offset: usize,
    first_component: u16,
) -> Result<LigatureSet, Error> {
    stream.seek(offset);
    let ligature_count = stream.u16()? as usize;
    let ligature_offsets = stream.u16_array(ligature_count)?;

    let mut ligatures = Vec::with_capacity(ligature_count);
    for ligature_offset in ligature_offsets {
        ligatures.push(read_ligature_table(
            stream,
            offset + ligature_offset as usize,
            first_component,
        )?);
    }

    Ok(LigatureSet { ligatures })
}

fn read_ligature_table(
    stream: &mut TableStream<'_>,
    offset: usize,
    first_component: u16,
) -> Result<LigatureTable, Error> {
    stream.seek(offset);
    let ligature_glyph = stream.u16()?;
    let component_count = stream.u16()?;

    if component_count > 100 {
        return Err(Error::InvalidComponentCount(component_count));
    }

    let mut component_glyphs = Vec::with_capacity(component_count as usize);

    if component_count > 0 {
        // The first component is implicit: it is the coverage glyph.
        component_glyphs.push(first_component);
        component_glyphs.extend(stream.u16_array(component_count as usize - 1)?);
    }

    Ok(LigatureTable {
        ligature_glyph,
        component_glyphs,
    })
}

fn read_coverage_table(
    stream: &mut TableStream<'_>,
    offset: usize,
) -> Result<CoverageTable, Error> {
    stream.seek(offset);
    let format = stream.u16()?;

    match format {
        1 => {
            let glyph_count = stream.u16()? as usize;
            let glyphs = stream.u16_array(glyph_count)?;

            Ok(CoverageTable { format, glyphs })
        }
        2 => {
            let range_count = stream.u16()? as usize;
            let mut glyphs = Vec::new();

            for _ in 0..range_count {
                let start = stream.u16()?;
                let end = stream.u16()?;
                let _start_coverage_index = stream.u16()?;

                for gid in start..=end {
                    glyphs.push(gid);
                }
            }

            Ok(CoverageTable { format, glyphs })
        }
        _ => Err(Error::UnknownCoverageFormat(format)),
    }
}
