//! Durable user preferences.
//!
//! Preferences are a single versioned document stored under a fixed key.
//! Older on-disk layouts are migrated forward on first read; unknown
//! fields are dropped on import rather than rejected.

use crate::error::{CacheError, CacheResult};
use crate::events::{ChangeOp, EventBus, StorageEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use songvault_storage::StorageBackend;
use std::sync::Arc;

/// Backend key the preference document lives under.
pub(crate) const PREFS_KEY: &str = "prefs";

/// Current preference schema version.
pub const PREFS_SCHEMA_VERSION: u32 = 2;

/// Smallest permitted cache budget, in bytes.
const MIN_CACHE_SIZE_BYTES: u64 = 1 << 20;

/// Visual theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light backgrounds, dark text.
    #[default]
    Light,
    /// Dark backgrounds, light text.
    Dark,
    /// Follow the operating system's theme.
    System,
}

/// How songs are rendered on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettings {
    /// Render chord annotations above the lyrics.
    pub show_chords: bool,
    /// Render the lyric text itself.
    pub show_lyrics: bool,
    /// Tighter line spacing, smaller section headers.
    pub compact_mode: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_chords: true,
            show_lyrics: true,
            compact_mode: false,
        }
    }
}

/// Cache behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    /// Upper bound on cached payload bytes. Never below 1 MiB.
    pub max_cache_size_bytes: u64,
    /// Evict stale records automatically when thresholds are crossed.
    pub auto_cleanup: bool,
    /// Age in days past which an unaccessed record is a cleanup
    /// candidate. At least 1.
    pub retention_days: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: 50 * 1024 * 1024,
            auto_cleanup: true,
            retention_days: 30,
        }
    }
}

/// The complete preference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// Visual theme.
    pub theme: Theme,
    /// Lyric font size in points, 10 through 32.
    pub font_size: u8,
    /// Transpose songs into the user's default key automatically.
    pub auto_transpose: bool,
    /// Key songs are transposed into when auto-transpose is on.
    pub default_key: String,
    /// Rendering options.
    pub display_settings: DisplaySettings,
    /// Cache options.
    pub cache_settings: CacheSettings,
    /// Layout version of this document.
    pub schema_version: u32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: 14,
            auto_transpose: false,
            default_key: "C".to_string(),
            display_settings: DisplaySettings::default(),
            cache_settings: CacheSettings::default(),
            schema_version: PREFS_SCHEMA_VERSION,
        }
    }
}

impl UserPreferences {
    /// Checks field-level validity.
    pub fn validate(&self) -> CacheResult<()> {
        if !(10..=32).contains(&self.font_size) {
            return Err(CacheError::validation(format!(
                "font size must be between 10 and 32, got {}",
                self.font_size
            )));
        }
        if self.default_key.trim().is_empty() {
            return Err(CacheError::validation("default key must not be empty"));
        }
        if self.cache_settings.max_cache_size_bytes < MIN_CACHE_SIZE_BYTES {
            return Err(CacheError::validation(format!(
                "cache budget must be at least {MIN_CACHE_SIZE_BYTES} bytes"
            )));
        }
        if self.cache_settings.retention_days == 0 {
            return Err(CacheError::validation(
                "retention must be at least one day",
            ));
        }
        Ok(())
    }

    /// Serializes to the on-disk representation.
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    /// Deserializes from the on-disk representation, migrating older
    /// layouts forward. Returns the document and whether it was migrated.
    pub fn decode(bytes: &[u8]) -> CacheResult<(Self, bool)> {
        let raw: StoredPreferences = ciborium::from_reader(bytes).map_err(|err| {
            CacheError::corrupted(format!("preference document undecodable: {err}"))
        })?;
        raw.into_current()
    }

    /// Applies a partial update, leaving unmentioned fields untouched.
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(font_size) = patch.font_size {
            self.font_size = font_size;
        }
        if let Some(auto_transpose) = patch.auto_transpose {
            self.auto_transpose = auto_transpose;
        }
        if let Some(ref key) = patch.default_key {
            self.default_key = key.clone();
        }
        if let Some(ref display) = patch.display_settings {
            if let Some(v) = display.show_chords {
                self.display_settings.show_chords = v;
            }
            if let Some(v) = display.show_lyrics {
                self.display_settings.show_lyrics = v;
            }
            if let Some(v) = display.compact_mode {
                self.display_settings.compact_mode = v;
            }
        }
        if let Some(ref cache) = patch.cache_settings {
            if let Some(v) = cache.max_cache_size_bytes {
                self.cache_settings.max_cache_size_bytes = v;
            }
            if let Some(v) = cache.auto_cleanup {
                self.cache_settings.auto_cleanup = v;
            }
            if let Some(v) = cache.retention_days {
                self.cache_settings.retention_days = v;
            }
        }
    }
}

/// Partial update to [`DisplaySettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplaySettingsPatch {
    /// New value for `show_chords`, if any.
    pub show_chords: Option<bool>,
    /// New value for `show_lyrics`, if any.
    pub show_lyrics: Option<bool>,
    /// New value for `compact_mode`, if any.
    pub compact_mode: Option<bool>,
}

/// Partial update to [`CacheSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettingsPatch {
    /// New value for `max_cache_size_bytes`, if any.
    pub max_cache_size_bytes: Option<u64>,
    /// New value for `auto_cleanup`, if any.
    pub auto_cleanup: Option<bool>,
    /// New value for `retention_days`, if any.
    pub retention_days: Option<u32>,
}

/// Partial update to [`UserPreferences`]. Unset fields are left as-is;
/// unknown fields in a serialized patch are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferencesPatch {
    /// New theme, if any.
    pub theme: Option<Theme>,
    /// New font size, if any.
    pub font_size: Option<u8>,
    /// New auto-transpose flag, if any.
    pub auto_transpose: Option<bool>,
    /// New default key, if any.
    pub default_key: Option<String>,
    /// Display settings changes, if any.
    pub display_settings: Option<DisplaySettingsPatch>,
    /// Cache settings changes, if any.
    pub cache_settings: Option<CacheSettingsPatch>,
}

/// A typed path into the preference document, parsed from a dotted
/// camelCase string such as `"displaySettings.showChords"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefPath {
    /// `theme`
    Theme,
    /// `fontSize`
    FontSize,
    /// `autoTranspose`
    AutoTranspose,
    /// `defaultKey`
    DefaultKey,
    /// `displaySettings.showChords`
    ShowChords,
    /// `displaySettings.showLyrics`
    ShowLyrics,
    /// `displaySettings.compactMode`
    CompactMode,
    /// `cacheSettings.maxCacheSizeBytes`
    MaxCacheSizeBytes,
    /// `cacheSettings.autoCleanup`
    AutoCleanup,
    /// `cacheSettings.retentionDays`
    RetentionDays,
}

impl PrefPath {
    /// Parses a dotted path string.
    pub fn parse(path: &str) -> CacheResult<Self> {
        match path {
            "theme" => Ok(Self::Theme),
            "fontSize" => Ok(Self::FontSize),
            "autoTranspose" => Ok(Self::AutoTranspose),
            "defaultKey" => Ok(Self::DefaultKey),
            "displaySettings.showChords" => Ok(Self::ShowChords),
            "displaySettings.showLyrics" => Ok(Self::ShowLyrics),
            "displaySettings.compactMode" => Ok(Self::CompactMode),
            "cacheSettings.maxCacheSizeBytes" => Ok(Self::MaxCacheSizeBytes),
            "cacheSettings.autoCleanup" => Ok(Self::AutoCleanup),
            "cacheSettings.retentionDays" => Ok(Self::RetentionDays),
            other => Err(CacheError::validation(format!(
                "unknown preference path: {other}"
            ))),
        }
    }
}

/// A value assignable through a [`PrefPath`].
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    /// A boolean field.
    Bool(bool),
    /// An integer field.
    Integer(u64),
    /// A string field.
    Text(String),
}

impl PrefValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
        }
    }
}

fn type_mismatch(path: &str, expected: &str, value: &PrefValue) -> CacheError {
    CacheError::validation(format!(
        "{path} expects a {expected}, got {}",
        value.type_name()
    ))
}

/// Builds a single-field patch from a path and value.
fn patch_for(path: PrefPath, value: &PrefValue) -> CacheResult<PreferencesPatch> {
    let mut patch = PreferencesPatch::default();
    match (path, value) {
        (PrefPath::Theme, PrefValue::Text(s)) => {
            patch.theme = Some(match s.as_str() {
                "light" => Theme::Light,
                "dark" => Theme::Dark,
                "system" => Theme::System,
                other => {
                    return Err(CacheError::validation(format!("unknown theme: {other}")))
                }
            });
        }
        (PrefPath::FontSize, PrefValue::Integer(n)) => {
            let n = u8::try_from(*n)
                .map_err(|_| CacheError::validation(format!("font size out of range: {n}")))?;
            patch.font_size = Some(n);
        }
        (PrefPath::AutoTranspose, PrefValue::Bool(b)) => patch.auto_transpose = Some(*b),
        (PrefPath::DefaultKey, PrefValue::Text(s)) => patch.default_key = Some(s.clone()),
        (PrefPath::ShowChords, PrefValue::Bool(b)) => {
            patch.display_settings = Some(DisplaySettingsPatch {
                show_chords: Some(*b),
                ..Default::default()
            });
        }
        (PrefPath::ShowLyrics, PrefValue::Bool(b)) => {
            patch.display_settings = Some(DisplaySettingsPatch {
                show_lyrics: Some(*b),
                ..Default::default()
            });
        }
        (PrefPath::CompactMode, PrefValue::Bool(b)) => {
            patch.display_settings = Some(DisplaySettingsPatch {
                compact_mode: Some(*b),
                ..Default::default()
            });
        }
        (PrefPath::MaxCacheSizeBytes, PrefValue::Integer(n)) => {
            patch.cache_settings = Some(CacheSettingsPatch {
                max_cache_size_bytes: Some(*n),
                ..Default::default()
            });
        }
        (PrefPath::AutoCleanup, PrefValue::Bool(b)) => {
            patch.cache_settings = Some(CacheSettingsPatch {
                auto_cleanup: Some(*b),
                ..Default::default()
            });
        }
        (PrefPath::RetentionDays, PrefValue::Integer(n)) => {
            let n = u32::try_from(*n).map_err(|_| {
                CacheError::validation(format!("retention days out of range: {n}"))
            })?;
            patch.cache_settings = Some(CacheSettingsPatch {
                retention_days: Some(n),
                ..Default::default()
            });
        }
        (PrefPath::Theme | PrefPath::DefaultKey, v) => {
            return Err(type_mismatch(&format!("{path:?}"), "text", v))
        }
        (
            PrefPath::FontSize | PrefPath::MaxCacheSizeBytes | PrefPath::RetentionDays,
            v,
        ) => return Err(type_mismatch(&format!("{path:?}"), "integer", v)),
        (_, v) => return Err(type_mismatch(&format!("{path:?}"), "bool", v)),
    }
    Ok(patch)
}

/// On-disk wrapper tolerant of older layouts.
///
/// Version 1 predates `cache_settings` and allowed an empty default key;
/// both are filled with current defaults on migration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPreferences {
    #[serde(default)]
    theme: Theme,
    #[serde(default = "default_font_size")]
    font_size: u8,
    #[serde(default)]
    auto_transpose: bool,
    #[serde(default)]
    default_key: String,
    #[serde(default)]
    display_settings: DisplaySettings,
    #[serde(default)]
    cache_settings: Option<CacheSettings>,
    #[serde(default = "default_schema_version")]
    schema_version: u32,
}

fn default_font_size() -> u8 {
    14
}

fn default_schema_version() -> u32 {
    1
}

impl StoredPreferences {
    fn into_current(self) -> CacheResult<(UserPreferences, bool)> {
        if self.schema_version > PREFS_SCHEMA_VERSION {
            return Err(CacheError::migration_failed(format!(
                "preference schema {} is newer than supported {}",
                self.schema_version, PREFS_SCHEMA_VERSION
            )));
        }

        let migrated = self.schema_version < PREFS_SCHEMA_VERSION;
        let mut prefs = UserPreferences {
            theme: self.theme,
            font_size: self.font_size,
            auto_transpose: self.auto_transpose,
            default_key: self.default_key,
            display_settings: self.display_settings,
            cache_settings: self.cache_settings.unwrap_or_default(),
            schema_version: PREFS_SCHEMA_VERSION,
        };
        if prefs.default_key.trim().is_empty() {
            prefs.default_key = "C".to_string();
        }
        Ok((prefs, migrated))
    }
}

/// Durable store for the preference document.
pub struct PreferenceStore {
    backend: Arc<dyn StorageBackend>,
    bus: Arc<EventBus>,
    write_guard: Mutex<()>,
}

impl PreferenceStore {
    /// Creates a store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>, bus: Arc<EventBus>) -> Self {
        Self {
            backend,
            bus,
            write_guard: Mutex::new(()),
        }
    }

    /// Loads the preference document, migrating older layouts forward
    /// and persisting the migrated form. Falls back to defaults when no
    /// document exists.
    pub fn get(&self) -> CacheResult<UserPreferences> {
        let _guard = self.write_guard.lock();
        match self.backend.get(PREFS_KEY)? {
            None => Ok(UserPreferences::default()),
            Some(bytes) => {
                let (prefs, migrated) = UserPreferences::decode(&bytes)?;
                if migrated {
                    tracing::info!(
                        version = PREFS_SCHEMA_VERSION,
                        "migrated preference document"
                    );
                    self.backend.put(PREFS_KEY, &prefs.encode()?)?;
                }
                Ok(prefs)
            }
        }
    }

    /// Replaces the entire document after validating it.
    pub fn save(&self, prefs: &UserPreferences) -> CacheResult<()> {
        prefs.validate()?;
        let mut normalized = prefs.clone();
        normalized.schema_version = PREFS_SCHEMA_VERSION;

        let _guard = self.write_guard.lock();
        self.backend.put(PREFS_KEY, &normalized.encode()?)?;
        self.backend.flush()?;
        self.emit_changed();
        Ok(())
    }

    /// Sets a single field by dotted path.
    ///
    /// The merged document is validated before it is written, so an
    /// invalid value leaves the stored document untouched.
    pub fn set_path(&self, path: &str, value: &PrefValue) -> CacheResult<UserPreferences> {
        let parsed = PrefPath::parse(path)?;
        let patch = patch_for(parsed, value)?;
        self.update(&patch)
    }

    /// Applies a partial update and returns the merged document.
    pub fn update(&self, patch: &PreferencesPatch) -> CacheResult<UserPreferences> {
        let mut prefs = self.get()?;
        prefs.apply(patch);
        self.save(&prefs)?;
        Ok(prefs)
    }

    /// Applies a partial update to the display settings only.
    pub fn update_display_settings(
        &self,
        patch: &DisplaySettingsPatch,
    ) -> CacheResult<UserPreferences> {
        self.update(&PreferencesPatch {
            display_settings: Some(patch.clone()),
            ..Default::default()
        })
    }

    /// Applies a partial update to the cache settings only.
    pub fn update_cache_settings(
        &self,
        patch: &CacheSettingsPatch,
    ) -> CacheResult<UserPreferences> {
        self.update(&PreferencesPatch {
            cache_settings: Some(patch.clone()),
            ..Default::default()
        })
    }

    /// Restores defaults, removing the stored document.
    pub fn reset(&self) -> CacheResult<UserPreferences> {
        let _guard = self.write_guard.lock();
        self.backend.delete(PREFS_KEY)?;
        self.backend.flush()?;
        self.emit_changed();
        Ok(UserPreferences::default())
    }

    /// Serializes the current document as JSON for transfer between
    /// devices.
    pub fn export(&self) -> CacheResult<String> {
        let prefs = self.get()?;
        serde_json::to_string_pretty(&prefs)
            .map_err(|err| CacheError::validation(format!("export failed: {err}")))
    }

    /// Imports a JSON export.
    ///
    /// With `merge`, fields absent from the payload keep their current
    /// values and unknown fields are ignored. Without it the payload
    /// replaces the document wholesale and must be complete.
    pub fn import(&self, json: &str, merge: bool) -> CacheResult<UserPreferences> {
        if merge {
            let patch: PreferencesPatch = serde_json::from_str(json)
                .map_err(|err| CacheError::validation(format!("import payload invalid: {err}")))?;
            self.update(&patch)
        } else {
            let prefs: UserPreferences = serde_json::from_str(json)
                .map_err(|err| CacheError::validation(format!("import payload invalid: {err}")))?;
            self.save(&prefs)?;
            self.get()
        }
    }

    fn emit_changed(&self) {
        self.bus.emit(&StorageEvent::DataChanged {
            operation: ChangeOp::Update,
            id: PREFS_KEY.to_string(),
        });
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songvault_storage::MemoryBackend;

    fn create_store() -> PreferenceStore {
        PreferenceStore::new(Arc::new(MemoryBackend::new()), Arc::new(EventBus::new()))
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let store = create_store();
        let prefs = store.get().unwrap();
        assert_eq!(prefs, UserPreferences::default());
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(prefs.font_size, 14);
        assert_eq!(prefs.default_key, "C");
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = create_store();
        let mut prefs = UserPreferences::default();
        prefs.theme = Theme::Dark;
        prefs.font_size = 18;

        store.save(&prefs).unwrap();
        assert_eq!(store.get().unwrap(), prefs);
    }

    #[test]
    fn font_size_bounds_are_enforced() {
        let store = create_store();
        let mut prefs = UserPreferences::default();

        prefs.font_size = 9;
        assert!(matches!(
            store.save(&prefs),
            Err(CacheError::Validation { .. })
        ));
        prefs.font_size = 33;
        assert!(matches!(
            store.save(&prefs),
            Err(CacheError::Validation { .. })
        ));
        prefs.font_size = 10;
        store.save(&prefs).unwrap();
    }

    #[test]
    fn cache_budget_floor_is_enforced() {
        let store = create_store();
        let mut prefs = UserPreferences::default();
        prefs.cache_settings.max_cache_size_bytes = 1024;
        assert!(matches!(
            store.save(&prefs),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn partial_update_leaves_other_fields_alone() {
        let store = create_store();
        let patch = PreferencesPatch {
            theme: Some(Theme::Dark),
            ..Default::default()
        };

        let merged = store.update(&patch).unwrap();
        assert_eq!(merged.theme, Theme::Dark);
        assert_eq!(merged.font_size, 14);
        assert!(merged.display_settings.show_chords);
    }

    #[test]
    fn nested_patch_touches_only_named_fields() {
        let store = create_store();
        let patch = PreferencesPatch {
            display_settings: Some(DisplaySettingsPatch {
                show_chords: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = store.update(&patch).unwrap();
        assert!(!merged.display_settings.show_chords);
        assert!(merged.display_settings.show_lyrics);
        assert!(!merged.display_settings.compact_mode);
    }

    #[test]
    fn set_path_updates_nested_field() {
        let store = create_store();
        store
            .set_path("displaySettings.showChords", &PrefValue::Bool(false))
            .unwrap();
        store
            .set_path("displaySettings.compactMode", &PrefValue::Bool(true))
            .unwrap();
        store
            .set_path("cacheSettings.autoCleanup", &PrefValue::Bool(false))
            .unwrap();
        store
            .set_path("cacheSettings.retentionDays", &PrefValue::Integer(7))
            .unwrap();
        store.set_path("fontSize", &PrefValue::Integer(20)).unwrap();
        store
            .set_path("theme", &PrefValue::Text("system".to_string()))
            .unwrap();

        let prefs = store.get().unwrap();
        assert!(!prefs.display_settings.show_chords);
        assert!(prefs.display_settings.compact_mode);
        assert!(!prefs.cache_settings.auto_cleanup);
        assert_eq!(prefs.cache_settings.retention_days, 7);
        assert_eq!(prefs.font_size, 20);
        assert_eq!(prefs.theme, Theme::System);
    }

    #[test]
    fn set_path_rejects_unknown_path_and_wrong_type() {
        let store = create_store();
        assert!(matches!(
            store.set_path("notAField", &PrefValue::Bool(true)),
            Err(CacheError::Validation { .. })
        ));
        assert!(matches!(
            store.set_path("fontSize", &PrefValue::Bool(true)),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn invalid_update_leaves_stored_document_untouched() {
        let store = create_store();
        let patch = PreferencesPatch {
            font_size: Some(99),
            ..Default::default()
        };
        assert!(store.update(&patch).is_err());
        assert_eq!(store.get().unwrap().font_size, 14);
    }

    #[test]
    fn reset_restores_defaults() {
        let store = create_store();
        store
            .update(&PreferencesPatch {
                theme: Some(Theme::Dark),
                ..Default::default()
            })
            .unwrap();

        let prefs = store.reset().unwrap();
        assert_eq!(prefs, UserPreferences::default());
        assert_eq!(store.get().unwrap(), UserPreferences::default());
    }

    #[test]
    fn export_import_round_trips() {
        let store = create_store();
        store
            .update(&PreferencesPatch {
                theme: Some(Theme::Dark),
                font_size: Some(22),
                ..Default::default()
            })
            .unwrap();
        let json = store.export().unwrap();

        let other = create_store();
        let imported = other.import(&json, false).unwrap();
        assert_eq!(imported.theme, Theme::Dark);
        assert_eq!(imported.font_size, 22);

        // A wholesale import round-trips the entire document.
        assert_eq!(imported, store.get().unwrap());
    }

    #[test]
    fn merge_import_ignores_unknown_fields() {
        let store = create_store();
        let imported = store
            .import(r#"{"theme":"dark","relic":"ignored"}"#, true)
            .unwrap();
        assert_eq!(imported.theme, Theme::Dark);
        assert_eq!(imported.font_size, 14);
    }

    #[test]
    fn merge_import_preserves_unmentioned_fields() {
        let store = create_store();
        store
            .update(&PreferencesPatch {
                auto_transpose: Some(true),
                default_key: Some("G".to_string()),
                ..Default::default()
            })
            .unwrap();

        let imported = store
            .import(r#"{"theme":"system","fontSize":18}"#, true)
            .unwrap();
        assert_eq!(imported.theme, Theme::System);
        assert_eq!(imported.font_size, 18);
        assert!(imported.auto_transpose);
        assert_eq!(imported.default_key, "G");
    }

    #[test]
    fn wholesale_import_rejects_incomplete_payloads() {
        let store = create_store();
        assert!(matches!(
            store.import(r#"{"theme":"dark"}"#, false),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn settings_sections_update_independently() {
        let store = create_store();
        store
            .update_display_settings(&DisplaySettingsPatch {
                show_lyrics: Some(false),
                ..Default::default()
            })
            .unwrap();
        store
            .update_cache_settings(&CacheSettingsPatch {
                auto_cleanup: Some(false),
                ..Default::default()
            })
            .unwrap();

        let prefs = store.get().unwrap();
        assert!(!prefs.display_settings.show_lyrics);
        assert!(prefs.display_settings.show_chords);
        assert!(!prefs.cache_settings.auto_cleanup);
        assert_eq!(
            prefs.cache_settings.max_cache_size_bytes,
            CacheSettings::default().max_cache_size_bytes
        );
        assert_eq!(
            prefs.cache_settings.retention_days,
            CacheSettings::default().retention_days
        );
    }

    #[test]
    fn retention_must_be_at_least_one_day() {
        let store = create_store();
        let mut prefs = UserPreferences::default();
        prefs.cache_settings.retention_days = 0;
        assert!(matches!(
            store.save(&prefs),
            Err(CacheError::Validation { .. })
        ));
    }

    #[test]
    fn v1_document_is_migrated_on_read() {
        // A version 1 document has no cache_settings and may carry an
        // empty default key.
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct V1 {
            theme: Theme,
            font_size: u8,
            auto_transpose: bool,
            default_key: String,
            display_settings: DisplaySettings,
            schema_version: u32,
        }
        let v1 = V1 {
            theme: Theme::Dark,
            font_size: 16,
            auto_transpose: true,
            default_key: String::new(),
            display_settings: DisplaySettings::default(),
            schema_version: 1,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&v1, &mut bytes).unwrap();

        let backend = Arc::new(MemoryBackend::new());
        backend.put(PREFS_KEY, &bytes).unwrap();
        let store = PreferenceStore::new(backend.clone(), Arc::new(EventBus::new()));

        let prefs = store.get().unwrap();
        assert_eq!(prefs.schema_version, PREFS_SCHEMA_VERSION);
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.default_key, "C");
        assert_eq!(prefs.cache_settings, CacheSettings::default());

        // The migrated form was persisted.
        let stored = backend.get(PREFS_KEY).unwrap().unwrap();
        let (again, migrated) = UserPreferences::decode(&stored).unwrap();
        assert!(!migrated);
        assert_eq!(again, prefs);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut prefs = UserPreferences::default();
        prefs.schema_version = PREFS_SCHEMA_VERSION + 1;
        let bytes = prefs.encode().unwrap();
        assert!(matches!(
            UserPreferences::decode(&bytes),
            Err(CacheError::MigrationFailed { .. })
        ));
    }

    #[test]
    fn corrupted_document_reports_corruption() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put(PREFS_KEY, b"not cbor").unwrap();
        let store = PreferenceStore::new(backend, Arc::new(EventBus::new()));
        assert!(matches!(
            store.get(),
            Err(CacheError::CorruptedData { .. })
        ));
    }
}
