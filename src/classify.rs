//! IME conversion bits -> indicator glyph.

use crate::probe::ProbeResult;

/// IME conversion-mode bitset (`IME_CMODE_*` values).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionMode(pub u32);

impl ConversionMode {
    /// Kana/kanji input instead of Latin.
    pub const NATIVE: u32 = 0x0001;
    /// Katakana instead of hiragana (only meaningful with `NATIVE`).
    pub const KATAKANA: u32 = 0x0002;
    /// Full-width instead of half-width characters.
    pub const FULLSHAPE: u32 = 0x0008;

    pub fn native(self) -> bool {
        self.0 & Self::NATIVE != 0
    }

    pub fn katakana(self) -> bool {
        self.0 & Self::KATAKANA != 0
    }

    pub fn full_shape(self) -> bool {
        self.0 & Self::FULLSHAPE != 0
    }
}

/// What the indicator shows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DisplayState {
    #[default]
    Latin,
    FullLatin,
    Hiragana,
    Katakana,
    FullKatakana,
}

impl DisplayState {
    pub fn glyph(self) -> &'static str {
        match self {
            DisplayState::Latin => "A",
            DisplayState::FullLatin => "Ａ",
            DisplayState::Hiragana => "あ",
            DisplayState::Katakana => "ｶ",
            DisplayState::FullKatakana => "カ",
        }
    }
}

/// Classify a probe. Unavailable status and a closed IME both map to half-width Latin.
pub fn classify(probe: &ProbeResult) -> DisplayState {
    if !probe.retrieved || !probe.is_open {
        return DisplayState::Latin;
    }
    let mode = probe.conversion_mode;
    match (mode.native(), mode.katakana(), mode.full_shape()) {
        (false, _, true) => DisplayState::FullLatin,
        (false, _, false) => DisplayState::Latin,
        (true, false, _) => DisplayState::Hiragana,
        (true, true, true) => DisplayState::FullKatakana,
        (true, true, false) => DisplayState::Katakana,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(native: bool, katakana: bool, full: bool) -> ProbeResult {
        let bit = |on: bool, b: u32| if on { b } else { 0 };
        ProbeResult {
            retrieved: true,
            is_open: true,
            conversion_mode: ConversionMode(
                bit(native, ConversionMode::NATIVE)
                    | bit(katakana, ConversionMode::KATAKANA)
                    | bit(full, ConversionMode::FULLSHAPE),
            ),
        }
    }

    #[test]
    fn all_open_bit_combinations_follow_the_table() {
        let cases = [
            ((false, false, false), DisplayState::Latin),
            ((false, false, true), DisplayState::FullLatin),
            ((false, true, false), DisplayState::Latin),
            ((false, true, true), DisplayState::FullLatin),
            ((true, false, false), DisplayState::Hiragana),
            ((true, false, true), DisplayState::Hiragana),
            ((true, true, false), DisplayState::Katakana),
            ((true, true, true), DisplayState::FullKatakana),
        ];
        for ((n, k, f), expected) in cases {
            assert_eq!(classify(&open(n, k, f)), expected, "native={n} kata={k} full={f}");
        }
    }

    #[test]
    fn unavailable_and_closed_are_indistinguishable() {
        let unavailable = ProbeResult::unavailable();
        let closed = ProbeResult {
            retrieved: true,
            is_open: false,
            conversion_mode: ConversionMode(ConversionMode::NATIVE | ConversionMode::FULLSHAPE),
        };
        assert_eq!(classify(&unavailable), DisplayState::Latin);
        assert_eq!(classify(&closed), DisplayState::Latin);
        assert_eq!(classify(&unavailable).glyph(), classify(&closed).glyph());
    }

    #[test]
    fn unrelated_mode_bits_are_ignored() {
        // IME_CMODE_ROMAN (0x10) and IME_CMODE_CHARCODE (0x20) do not change the glyph.
        let probe = ProbeResult {
            retrieved: true,
            is_open: true,
            conversion_mode: ConversionMode(ConversionMode::NATIVE | 0x10 | 0x20),
        };
        assert_eq!(classify(&probe), DisplayState::Hiragana);
    }

    #[test]
    fn glyphs_are_distinct() {
        let all = [
            DisplayState::Latin,
            DisplayState::FullLatin,
            DisplayState::Hiragana,
            DisplayState::Katakana,
            DisplayState::FullKatakana,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.glyph(), b.glyph());
            }
        }
    }
}
