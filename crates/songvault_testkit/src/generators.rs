//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use songvault_core::{CachedSong, PreferencesPatch, Theme, UserPreferences};

/// Strategy for generating valid song ids.
pub fn song_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating non-empty song titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,47}").expect("Invalid regex")
}

/// Strategy for generating lyric bodies of varying size.
pub fn lyrics_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z \n]{0,512}").expect("Invalid regex")
}

/// Strategy for generating musical keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ])
    .prop_map(str::to_string)
}

/// Strategy for generating valid songs with distinct random ids.
pub fn song_strategy() -> impl Strategy<Value = CachedSong> {
    (
        song_id_strategy(),
        title_strategy(),
        prop::option::of(title_strategy()),
        lyrics_strategy(),
        prop::option::of(key_strategy()),
        prop::collection::vec(song_id_strategy(), 0..4),
    )
        .prop_map(|(id, title, artist, lyrics, key, tags)| {
            let mut song = CachedSong::new(id, title).with_lyrics(lyrics).with_tags(tags);
            song.artist = artist;
            song.key = key;
            song
        })
}

/// Strategy for generating any of the three themes.
pub fn theme_strategy() -> impl Strategy<Value = Theme> {
    prop::sample::select(vec![Theme::Light, Theme::Dark, Theme::System])
}

/// Strategy for generating valid preference documents.
pub fn preferences_strategy() -> impl Strategy<Value = UserPreferences> {
    (
        theme_strategy(),
        10u8..=32,
        prop::bool::ANY,
        key_strategy(),
    )
        .prop_map(|(theme, font_size, auto_transpose, default_key)| {
            let mut prefs = UserPreferences::default();
            prefs.theme = theme;
            prefs.font_size = font_size;
            prefs.auto_transpose = auto_transpose;
            prefs.default_key = default_key;
            prefs
        })
}

/// Strategy for generating partial preference updates.
pub fn preferences_patch_strategy() -> impl Strategy<Value = PreferencesPatch> {
    (
        prop::option::of(theme_strategy()),
        prop::option::of(10u8..=32),
        prop::option::of(prop::bool::ANY),
        prop::option::of(key_strategy()),
    )
        .prop_map(|(theme, font_size, auto_transpose, default_key)| PreferencesPatch {
            theme,
            font_size,
            auto_transpose,
            default_key,
            ..Default::default()
        })
}
