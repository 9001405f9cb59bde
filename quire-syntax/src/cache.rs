//! A capability-partitioned cache for expensive derived resources.

use crate::object::ObjectKey;
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use std::any::Any;
use std::sync::Arc;

/// How many removals of one key a slot tolerates before the key is promoted
/// to the stability set.
const MAX_REMOVALS: u32 = 3;

/// How many live values one slot holds before the least recently used one is
/// dropped.
const SOFT_CAPACITY: usize = 64;

type CachedValue = Arc<dyn Any + Send + Sync>;

/// An entry whose value may have been dropped under memory pressure.
///
/// The entry itself stays in the map so removal bookkeeping keeps working
/// for the key.
struct SoftEntry {
    value: Option<CachedValue>,
    last_used: u64,
}

/// One capability partition of the cache.
#[derive(Default)]
struct SoftSlot {
    entries: FxHashMap<ObjectKey, SoftEntry>,
    removals: FxHashMap<u64, u32>,
    stable: FxHashSet<u64>,
    tick: u64,
}

impl SoftSlot {
    fn get(&mut self, key: &ObjectKey) -> Option<CachedValue> {
        let entry = self.entries.get_mut(key)?;
        let value = entry.value.clone()?;
        self.tick += 1;
        entry.last_used = self.tick;

        Some(value)
    }

    fn put(&mut self, key: ObjectKey, value: CachedValue) {
        self.tick += 1;
        self.entries.insert(
            key,
            SoftEntry {
                value: Some(value),
                last_used: self.tick,
            },
        );
        self.enforce_capacity();
    }

    /// Drop the least recently used values until the slot is back under
    /// capacity. Entries stay in the map with an empty value.
    fn enforce_capacity(&mut self) {
        loop {
            let live = self.entries.values().filter(|e| e.value.is_some()).count();

            if live <= SOFT_CAPACITY {
                return;
            }

            let oldest = self
                .entries
                .values_mut()
                .filter(|e| e.value.is_some())
                .min_by_key(|e| e.last_used);

            if let Some(entry) = oldest {
                entry.value = None;
            } else {
                return;
            }
        }
    }

    fn remove(&mut self, key: &ObjectKey, stable_enabled: bool) -> Option<CachedValue> {
        if stable_enabled {
            let hash = key.internal_hash();

            if self.stable.contains(&hash) {
                return None;
            }

            let counter = self.removals.get(&hash).copied().unwrap_or(0) + 1;

            if counter <= MAX_REMOVALS {
                self.removals.insert(hash, counter);
            } else {
                // The key keeps coming back; pin it and refuse the removal.
                self.stable.insert(hash);
                self.removals.remove(&hash);

                return None;
            }
        }

        self.entries.remove(key)?.value
    }
}

macro_rules! capability {
    ($slot:ident, $get:ident, $put:ident, $remove:ident, $label:literal) => {
        #[doc = concat!("Look up a cached ", $label, ".")]
        pub fn $get<T: Any + Send + Sync>(&mut self, key: &ObjectKey) -> Option<Arc<T>> {
            let value = self.$slot.get(key)?;

            match value.downcast::<T>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("cached {} for {key} has an unexpected type", $label);

                    None
                }
            }
        }

        #[doc = concat!("Cache a ", $label, ".")]
        pub fn $put<T: Any + Send + Sync>(&mut self, key: ObjectKey, value: T) {
            self.$slot.put(key, Arc::new(value));
        }

        #[doc = concat!(
            "Remove a cached ", $label,
            ", returning it unless the key has been pinned as stable."
        )]
        pub fn $remove<T: Any + Send + Sync>(&mut self, key: &ObjectKey) -> Option<Arc<T>> {
            let value = self.$slot.remove(key, self.stable_cache_enabled)?;

            value.downcast::<T>().ok()
        }
    };
}

/// A cache of derived resources, partitioned by resource class.
///
/// Each class lives in its own slot: an entry cached as a font is invisible
/// to the color space accessors even under the same key. Values are held
/// softly; when a slot exceeds its capacity the least recently used value is
/// dropped while its entry (and its removal history) stays behind.
///
/// When the stable cache is enabled, a key that gets removed repeatedly is
/// eventually pinned: further removals are refused so that a resource which
/// keeps being re-derived stops churning.
pub struct ResourceCache {
    stable_cache_enabled: bool,
    fonts: SoftSlot,
    color_spaces: SoftSlot,
    xobjects: SoftSlot,
    ext_g_states: SoftSlot,
    shadings: SoftSlot,
    patterns: SoftSlot,
    properties: SoftSlot,
}

impl ResourceCache {
    /// A cache with the stable set enabled.
    pub fn new() -> Self {
        Self::with_stable_cache(true)
    }

    /// A cache with explicit control over the stable set.
    pub fn with_stable_cache(enabled: bool) -> Self {
        Self {
            stable_cache_enabled: enabled,
            fonts: SoftSlot::default(),
            color_spaces: SoftSlot::default(),
            xobjects: SoftSlot::default(),
            ext_g_states: SoftSlot::default(),
            shadings: SoftSlot::default(),
            patterns: SoftSlot::default(),
            properties: SoftSlot::default(),
        }
    }

    capability!(fonts, get_font, put_font, remove_font, "font");
    capability!(
        color_spaces,
        get_color_space,
        put_color_space,
        remove_color_space,
        "color space"
    );
    capability!(xobjects, get_xobject, put_xobject, remove_xobject, "xobject");
    capability!(
        ext_g_states,
        get_ext_g_state,
        put_ext_g_state,
        remove_ext_g_state,
        "graphics state"
    );
    capability!(shadings, get_shading, put_shading, remove_shading, "shading");
    capability!(patterns, get_pattern, put_pattern, remove_pattern, "pattern");
    capability!(
        properties,
        get_property_list,
        put_property_list,
        remove_property_list,
        "property list"
    );
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
