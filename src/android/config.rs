//! Resource configurations (`ResTable_config`) and best-match selection.
//!
//! A configured value is usable for a target device when [`ResConfig::matches`] holds; among the
//! usable ones, [`ResConfig::is_better_than`] decides axis by axis in the platform's precedence
//! order (mcc/mnc, locale, layout direction, widths, screen size, orientation, ui mode, density,
//! touchscreen, input, screen pixels, version).

use crate::android::chunk::{BinaryReader, DecodeError, DecodeResult};
use crate::android::value::Value;
use std::fmt;

pub const ORIENTATION_PORT: u8 = 1;
pub const ORIENTATION_LAND: u8 = 2;
pub const ORIENTATION_SQUARE: u8 = 3;

pub const DENSITY_LOW: u16 = 120;
pub const DENSITY_MEDIUM: u16 = 160;
pub const DENSITY_TV: u16 = 213;
pub const DENSITY_HIGH: u16 = 240;
pub const DENSITY_XHIGH: u16 = 320;
pub const DENSITY_XXHIGH: u16 = 480;
pub const DENSITY_XXXHIGH: u16 = 640;
pub const DENSITY_ANY: u16 = 0xFFFE;
pub const DENSITY_NONE: u16 = 0xFFFF;

pub const SCREENSIZE_SMALL: u8 = 0x01;
pub const SCREENSIZE_NORMAL: u8 = 0x02;
pub const SCREENSIZE_LARGE: u8 = 0x03;
pub const SCREENSIZE_XLARGE: u8 = 0x04;

const MASK_SCREENSIZE: u8 = 0x0F;
const MASK_SCREENLONG: u8 = 0x30;
const MASK_LAYOUTDIR: u8 = 0xC0;
const MASK_UI_MODE_TYPE: u8 = 0x0F;
const MASK_UI_MODE_NIGHT: u8 = 0x30;
const MASK_KEYSHIDDEN: u8 = 0x03;
const MASK_NAVHIDDEN: u8 = 0x0C;
const MASK_SCREENROUND: u8 = 0x03;
const MASK_WIDE_COLOR_GAMUT: u8 = 0x03;
const MASK_HDR: u8 = 0x0C;

const KEYSHIDDEN_NO: u8 = 0x01;
const KEYSHIDDEN_SOFT: u8 = 0x03;

const UI_MODE_NIGHT_YES: u8 = 0x20;
const SCREENLONG_YES: u8 = 0x20;

// Fields up to and including colorMode; newer platforms append more.
const CONFIG_KNOWN_SIZE: usize = 52;

/// One `ResTable_config`. Zero in any axis means "unconstrained".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResConfig {
    pub mcc: u16,
    pub mnc: u16,
    pub language: [u8; 2],
    pub country: [u8; 2],
    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,
    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,
    pub screen_width: u16,
    pub screen_height: u16,
    pub sdk_version: u16,
    pub minor_version: u16,
    pub screen_layout: u8,
    pub ui_mode: u8,
    pub smallest_screen_width_dp: u16,
    pub screen_width_dp: u16,
    pub screen_height_dp: u16,
    pub locale_script: [u8; 4],
    pub locale_variant: [u8; 8],
    pub screen_layout2: u8,
    pub color_mode: u8,
}

/// A language/region pair as stored in a configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locale {
    pub language: [u8; 2],
    pub country: [u8; 2],
}

impl Locale {
    pub fn is_default(&self) -> bool {
        self.language == [0, 0] && self.country == [0, 0]
    }

    /// `""` for the default locale, otherwise `lang` or `lang-REGION`.
    pub fn tag(&self) -> String {
        let language = unpack_code(self.language, b'a');
        let region = unpack_code(self.country, b'0');
        match (language.is_empty(), region.is_empty()) {
            (true, true) => String::new(),
            (false, true) => language,
            (true, false) => format!("und-{region}"),
            (false, false) => format!("{language}-{region}"),
        }
    }
}

/// Two ASCII letters, or the packed three-letter form flagged by the high bit.
fn unpack_code(code: [u8; 2], base: u8) -> String {
    if code[0] & 0x80 != 0 {
        let first = code[1] & 0x1F;
        let second = ((code[1] & 0xE0) >> 5) | ((code[0] & 0x03) << 3);
        let third = (code[0] & 0x7C) >> 2;
        [first, second, third]
            .iter()
            .map(|c| (c + base) as char)
            .collect()
    } else if code[0] != 0 {
        code.iter().map(|c| *c as char).collect()
    } else {
        String::new()
    }
}

impl ResConfig {
    /// The fixed device configuration used to pick one value per resource.
    ///
    /// This is a rendering policy, not device detection: portrait, medium density, a 320x480dp
    /// normal-size screen, no locale, and the highest platform version so that the newest
    /// version-qualified value wins.
    pub fn canonical() -> Self {
        ResConfig {
            orientation: ORIENTATION_PORT,
            density: DENSITY_MEDIUM,
            sdk_version: u16::MAX,
            screen_width_dp: 320,
            screen_height_dp: 480,
            smallest_screen_width_dp: 320,
            screen_layout: SCREENSIZE_NORMAL,
            ..ResConfig::default()
        }
    }

    /// [`ResConfig::canonical`] with a locale requested.
    pub fn canonical_for_locale(locale: Locale) -> Self {
        ResConfig::canonical().with_locale(locale)
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.language = locale.language;
        self.country = locale.country;
        self
    }

    pub fn locale(&self) -> Locale {
        Locale {
            language: self.language,
            country: self.country,
        }
    }

    /// Read a size-prefixed `ResTable_config`. Short structures leave the missing axes
    /// unconstrained; trailing fields beyond the known layout are skipped.
    pub(crate) fn parse(reader: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        let size = reader.read_u32()? as usize;
        if size < 4 {
            return Err(DecodeError::malformed(format!("configuration size {size} too small")));
        }
        let body = reader.read_bytes(size - 4)?;
        let mut raw = [0u8; CONFIG_KNOWN_SIZE];
        let known = body.len().min(CONFIG_KNOWN_SIZE - 4);
        raw[4..4 + known].copy_from_slice(&body[..known]);

        let u16_at = |offset: usize| u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let mut locale_script = [0u8; 4];
        locale_script.copy_from_slice(&raw[36..40]);
        let mut locale_variant = [0u8; 8];
        locale_variant.copy_from_slice(&raw[40..48]);

        Ok(ResConfig {
            mcc: u16_at(4),
            mnc: u16_at(6),
            language: [raw[8], raw[9]],
            country: [raw[10], raw[11]],
            orientation: raw[12],
            touchscreen: raw[13],
            density: u16_at(14),
            keyboard: raw[16],
            navigation: raw[17],
            input_flags: raw[18],
            screen_width: u16_at(20),
            screen_height: u16_at(22),
            sdk_version: u16_at(24),
            minor_version: u16_at(26),
            screen_layout: raw[28],
            ui_mode: raw[29],
            smallest_screen_width_dp: u16_at(30),
            screen_width_dp: u16_at(32),
            screen_height_dp: u16_at(34),
            locale_script,
            locale_variant,
            screen_layout2: raw[48],
            color_mode: raw[49],
        })
    }

    fn has_imsi(&self) -> bool {
        self.mcc != 0 || self.mnc != 0
    }

    fn has_locale(&self) -> bool {
        self.language != [0, 0] || self.country != [0, 0]
    }

    fn has_screen_type(&self) -> bool {
        self.orientation != 0 || self.touchscreen != 0 || self.density != 0
    }

    fn has_input(&self) -> bool {
        self.keyboard != 0 || self.navigation != 0 || self.input_flags != 0
    }

    fn has_screen_size(&self) -> bool {
        self.screen_width != 0 || self.screen_height != 0
    }

    fn has_version(&self) -> bool {
        self.sdk_version != 0 || self.minor_version != 0
    }

    fn has_screen_config(&self) -> bool {
        self.screen_layout != 0 || self.ui_mode != 0 || self.smallest_screen_width_dp != 0
    }

    fn has_screen_size_dp(&self) -> bool {
        self.screen_width_dp != 0 || self.screen_height_dp != 0
    }

    /// Whether a value qualified with `self` may be used on a device configured as `target`.
    pub fn matches(&self, target: &ResConfig) -> bool {
        if self.has_imsi() {
            if self.mcc != 0 && self.mcc != target.mcc {
                return false;
            }
            if self.mnc != 0 && self.mnc != target.mnc {
                return false;
            }
        }
        if self.has_locale() {
            if self.language[0] != 0 && self.language != target.language {
                return false;
            }
            if self.country[0] != 0 && self.country != target.country {
                return false;
            }
        }
        if self.has_screen_config() {
            let layout_dir = self.screen_layout & MASK_LAYOUTDIR;
            if layout_dir != 0 && layout_dir != target.screen_layout & MASK_LAYOUTDIR {
                return false;
            }
            let screen_size = self.screen_layout & MASK_SCREENSIZE;
            // Any screen size up to the device's own fits.
            if screen_size != 0 && screen_size > target.screen_layout & MASK_SCREENSIZE {
                return false;
            }
            let screen_long = self.screen_layout & MASK_SCREENLONG;
            if screen_long != 0 && screen_long != target.screen_layout & MASK_SCREENLONG {
                return false;
            }
            let ui_type = self.ui_mode & MASK_UI_MODE_TYPE;
            if ui_type != 0 && ui_type != target.ui_mode & MASK_UI_MODE_TYPE {
                return false;
            }
            let ui_night = self.ui_mode & MASK_UI_MODE_NIGHT;
            if ui_night != 0 && ui_night != target.ui_mode & MASK_UI_MODE_NIGHT {
                return false;
            }
            if self.smallest_screen_width_dp != 0
                && self.smallest_screen_width_dp > target.smallest_screen_width_dp
            {
                return false;
            }
        }
        if self.screen_layout2 != 0 {
            let round = self.screen_layout2 & MASK_SCREENROUND;
            if round != 0 && round != target.screen_layout2 & MASK_SCREENROUND {
                return false;
            }
        }
        if self.color_mode != 0 {
            let gamut = self.color_mode & MASK_WIDE_COLOR_GAMUT;
            if gamut != 0 && gamut != target.color_mode & MASK_WIDE_COLOR_GAMUT {
                return false;
            }
            let hdr = self.color_mode & MASK_HDR;
            if hdr != 0 && hdr != target.color_mode & MASK_HDR {
                return false;
            }
        }
        if self.has_screen_size_dp() {
            if self.screen_width_dp != 0 && self.screen_width_dp > target.screen_width_dp {
                return false;
            }
            if self.screen_height_dp != 0 && self.screen_height_dp > target.screen_height_dp {
                return false;
            }
        }
        if self.has_screen_type() {
            if self.orientation != 0 && self.orientation != target.orientation {
                return false;
            }
            // Density always matches: the platform scales any bucket.
            if self.touchscreen != 0 && self.touchscreen != target.touchscreen {
                return false;
            }
        }
        if self.has_input() {
            let keys_hidden = self.input_flags & MASK_KEYSHIDDEN;
            let target_keys_hidden = target.input_flags & MASK_KEYSHIDDEN;
            if keys_hidden != 0
                && keys_hidden != target_keys_hidden
                && !(keys_hidden == KEYSHIDDEN_NO && target_keys_hidden == KEYSHIDDEN_SOFT)
            {
                return false;
            }
            let nav_hidden = self.input_flags & MASK_NAVHIDDEN;
            if nav_hidden != 0 && nav_hidden != target.input_flags & MASK_NAVHIDDEN {
                return false;
            }
            if self.keyboard != 0 && self.keyboard != target.keyboard {
                return false;
            }
            if self.navigation != 0 && self.navigation != target.navigation {
                return false;
            }
        }
        if self.has_screen_size() {
            if self.screen_width != 0 && self.screen_width > target.screen_width {
                return false;
            }
            if self.screen_height != 0 && self.screen_height > target.screen_height {
                return false;
            }
        }
        if self.has_version() {
            if self.sdk_version != 0 && self.sdk_version > target.sdk_version {
                return false;
            }
            if self.minor_version != 0 && self.minor_version != target.minor_version {
                return false;
            }
        }
        true
    }

    fn is_locale_better_than(&self, other: &ResConfig, target: &ResConfig) -> bool {
        if target.language == [0, 0] {
            return false;
        }
        if self.language != other.language {
            return self.language == target.language;
        }
        if self.country != other.country && target.country != [0, 0] {
            return self.country == target.country;
        }
        false
    }

    /// Whether `self` is a closer match for `target` than `other`. Both must already match
    /// `target`; equal configurations are never better than each other.
    pub fn is_better_than(&self, other: &ResConfig, target: &ResConfig) -> bool {
        if self.has_imsi() || other.has_imsi() {
            if self.mcc != other.mcc && target.mcc != 0 {
                return self.mcc != 0;
            }
            if self.mnc != other.mnc && target.mnc != 0 {
                return self.mnc != 0;
            }
        }

        if self.is_locale_better_than(other, target) {
            return true;
        } else if other.is_locale_better_than(self, target) {
            return false;
        }

        if (self.screen_layout | other.screen_layout) != 0
            && (self.screen_layout ^ other.screen_layout) & MASK_LAYOUTDIR != 0
            && target.screen_layout & MASK_LAYOUTDIR != 0
        {
            return self.screen_layout & MASK_LAYOUTDIR > other.screen_layout & MASK_LAYOUTDIR;
        }

        if self.smallest_screen_width_dp != other.smallest_screen_width_dp {
            return self.smallest_screen_width_dp > other.smallest_screen_width_dp;
        }

        if self.has_screen_size_dp() || other.has_screen_size_dp() {
            let mut my_delta = 0i32;
            let mut other_delta = 0i32;
            if target.screen_width_dp != 0 {
                my_delta += target.screen_width_dp as i32 - self.screen_width_dp as i32;
                other_delta += target.screen_width_dp as i32 - other.screen_width_dp as i32;
            }
            if target.screen_height_dp != 0 {
                my_delta += target.screen_height_dp as i32 - self.screen_height_dp as i32;
                other_delta += target.screen_height_dp as i32 - other.screen_height_dp as i32;
            }
            if my_delta != other_delta {
                return my_delta < other_delta;
            }
        }

        if (self.screen_layout | other.screen_layout) != 0 {
            let requested_size = target.screen_layout & MASK_SCREENSIZE;
            if (self.screen_layout ^ other.screen_layout) & MASK_SCREENSIZE != 0 && requested_size != 0 {
                let my_size = self.screen_layout & MASK_SCREENSIZE;
                let other_size = other.screen_layout & MASK_SCREENSIZE;
                let (mut fixed_mine, mut fixed_other) = (my_size, other_size);
                // Undefined counts as normal once the device is at least normal.
                if requested_size >= SCREENSIZE_NORMAL {
                    if fixed_mine == 0 {
                        fixed_mine = SCREENSIZE_NORMAL;
                    }
                    if fixed_other == 0 {
                        fixed_other = SCREENSIZE_NORMAL;
                    }
                }
                if fixed_mine == fixed_other {
                    return my_size != 0;
                }
                return fixed_mine > fixed_other;
            }
            if (self.screen_layout ^ other.screen_layout) & MASK_SCREENLONG != 0
                && target.screen_layout & MASK_SCREENLONG != 0
            {
                return self.screen_layout & MASK_SCREENLONG != 0;
            }
        }

        if (self.screen_layout2 ^ other.screen_layout2) & MASK_SCREENROUND != 0
            && target.screen_layout2 & MASK_SCREENROUND != 0
        {
            return self.screen_layout2 & MASK_SCREENROUND != 0;
        }

        if (self.color_mode ^ other.color_mode) != 0 && target.color_mode != 0 {
            if (self.color_mode ^ other.color_mode) & MASK_WIDE_COLOR_GAMUT != 0
                && target.color_mode & MASK_WIDE_COLOR_GAMUT != 0
            {
                return self.color_mode & MASK_WIDE_COLOR_GAMUT != 0;
            }
            if (self.color_mode ^ other.color_mode) & MASK_HDR != 0 && target.color_mode & MASK_HDR != 0 {
                return self.color_mode & MASK_HDR != 0;
            }
        }

        if self.orientation != other.orientation && target.orientation != 0 {
            return self.orientation != 0;
        }

        if (self.ui_mode | other.ui_mode) != 0 {
            if (self.ui_mode ^ other.ui_mode) & MASK_UI_MODE_TYPE != 0
                && target.ui_mode & MASK_UI_MODE_TYPE != 0
            {
                return self.ui_mode & MASK_UI_MODE_TYPE != 0;
            }
            if (self.ui_mode ^ other.ui_mode) & MASK_UI_MODE_NIGHT != 0
                && target.ui_mode & MASK_UI_MODE_NIGHT != 0
            {
                return self.ui_mode & MASK_UI_MODE_NIGHT != 0;
            }
        }

        if self.has_screen_type() || other.has_screen_type() {
            if self.density != other.density {
                return is_density_better(self.density, other.density, target.density);
            }
            if self.touchscreen != other.touchscreen && target.touchscreen != 0 {
                return self.touchscreen != 0;
            }
        }

        if self.has_input() || other.has_input() {
            let mine = self.input_flags & MASK_KEYSHIDDEN;
            let theirs = other.input_flags & MASK_KEYSHIDDEN;
            if mine != theirs && target.input_flags & MASK_KEYSHIDDEN != 0 {
                if mine == 0 {
                    return false;
                }
                if theirs == 0 {
                    return true;
                }
                // An exact match beats the soft-keyboard compatibility match.
                return target.input_flags & MASK_KEYSHIDDEN == mine;
            }
            let mine = self.input_flags & MASK_NAVHIDDEN;
            let theirs = other.input_flags & MASK_NAVHIDDEN;
            if mine != theirs && target.input_flags & MASK_NAVHIDDEN != 0 {
                return mine != 0;
            }
            if self.keyboard != other.keyboard && target.keyboard != 0 {
                return self.keyboard != 0;
            }
            if self.navigation != other.navigation && target.navigation != 0 {
                return self.navigation != 0;
            }
        }

        if self.has_screen_size() || other.has_screen_size() {
            let mut my_delta = 0i32;
            let mut other_delta = 0i32;
            if target.screen_width != 0 {
                my_delta += target.screen_width as i32 - self.screen_width as i32;
                other_delta += target.screen_width as i32 - other.screen_width as i32;
            }
            if target.screen_height != 0 {
                my_delta += target.screen_height as i32 - self.screen_height as i32;
                other_delta += target.screen_height as i32 - other.screen_height as i32;
            }
            if my_delta != other_delta {
                return my_delta < other_delta;
            }
        }

        if self.has_version() || other.has_version() {
            if self.sdk_version != other.sdk_version && target.sdk_version != 0 {
                return self.sdk_version > other.sdk_version;
            }
            if self.minor_version != other.minor_version && target.minor_version != 0 {
                return self.minor_version != 0;
            }
        }

        false
    }
}

/// Density preference: `any` beats a concrete bucket, otherwise the closest bucket at or above
/// the requested density, with scaling down weighted as twice as good as scaling up.
fn is_density_better(mine: u16, theirs: u16, requested: u16) -> bool {
    let mine = if mine == 0 { DENSITY_MEDIUM } else { mine } as i64;
    let theirs = if theirs == 0 { DENSITY_MEDIUM } else { theirs } as i64;
    if mine == DENSITY_ANY as i64 {
        return true;
    }
    if theirs == DENSITY_ANY as i64 {
        return false;
    }
    let requested = match requested {
        0 | DENSITY_ANY => DENSITY_MEDIUM,
        other => other,
    } as i64;

    let (high, low, mine_is_bigger) = if mine >= theirs {
        (mine, theirs, true)
    } else {
        (theirs, mine, false)
    };
    if requested >= high {
        return mine_is_bigger;
    }
    if low >= requested {
        return !mine_is_bigger;
    }
    if (2 * low - requested) * high > requested * requested {
        !mine_is_bigger
    } else {
        mine_is_bigger
    }
}

/// Pick the value whose configuration best fits `target`.
///
/// Non-matching configurations are discarded; the remaining ones are folded left to right and a
/// later candidate only replaces the current best when it is strictly better, so the first of
/// several equally specific values wins.
pub fn best_value<'a, I>(values: I, target: &ResConfig) -> Option<&'a Value>
where
    I: IntoIterator<Item = &'a (ResConfig, Value)>,
{
    let mut best: Option<&'a (ResConfig, Value)> = None;
    for candidate in values {
        if !candidate.0.matches(target) {
            continue;
        }
        best = match best {
            Some(current) if !candidate.0.is_better_than(&current.0, target) => Some(current),
            _ => Some(candidate),
        };
    }
    best.map(|(_, value)| value)
}

impl fmt::Display for ResConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if self.mcc != 0 {
            parts.push(format!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            parts.push(format!("mnc{}", self.mnc));
        }
        let locale = self.locale().tag();
        if !locale.is_empty() {
            parts.push(locale);
        }
        if self.smallest_screen_width_dp != 0 {
            parts.push(format!("sw{}dp", self.smallest_screen_width_dp));
        }
        if self.screen_width_dp != 0 {
            parts.push(format!("w{}dp", self.screen_width_dp));
        }
        if self.screen_height_dp != 0 {
            parts.push(format!("h{}dp", self.screen_height_dp));
        }
        match self.screen_layout & MASK_SCREENSIZE {
            SCREENSIZE_SMALL => parts.push("small".into()),
            SCREENSIZE_NORMAL => parts.push("normal".into()),
            SCREENSIZE_LARGE => parts.push("large".into()),
            SCREENSIZE_XLARGE => parts.push("xlarge".into()),
            _ => {}
        }
        match self.screen_layout & MASK_SCREENLONG {
            0 => {}
            SCREENLONG_YES => parts.push("long".into()),
            _ => parts.push("notlong".into()),
        }
        match self.orientation {
            ORIENTATION_PORT => parts.push("port".into()),
            ORIENTATION_LAND => parts.push("land".into()),
            ORIENTATION_SQUARE => parts.push("square".into()),
            _ => {}
        }
        match self.ui_mode & MASK_UI_MODE_NIGHT {
            0 => {}
            UI_MODE_NIGHT_YES => parts.push("night".into()),
            _ => parts.push("notnight".into()),
        }
        match self.density {
            0 => {}
            DENSITY_LOW => parts.push("ldpi".into()),
            DENSITY_MEDIUM => parts.push("mdpi".into()),
            DENSITY_TV => parts.push("tvdpi".into()),
            DENSITY_HIGH => parts.push("hdpi".into()),
            DENSITY_XHIGH => parts.push("xhdpi".into()),
            DENSITY_XXHIGH => parts.push("xxhdpi".into()),
            DENSITY_XXXHIGH => parts.push("xxxhdpi".into()),
            DENSITY_ANY => parts.push("anydpi".into()),
            DENSITY_NONE => parts.push("nodpi".into()),
            other => parts.push(format!("{other}dpi")),
        }
        if self.sdk_version != 0 {
            parts.push(format!("v{}", self.sdk_version));
        }
        if parts.is_empty() {
            write!(f, "default")
        } else {
            write!(f, "{}", parts.join("-"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(text: &str) -> Value {
        Value::String(text.to_string())
    }

    fn lang(code: &str) -> Locale {
        let bytes = code.as_bytes();
        Locale {
            language: [bytes[0], bytes[1]],
            country: [0, 0],
        }
    }

    #[test]
    fn canonical_target_fields() {
        let target = ResConfig::canonical();
        assert_eq!(target.orientation, ORIENTATION_PORT);
        assert_eq!(target.density, DENSITY_MEDIUM);
        assert_eq!(target.sdk_version, u16::MAX);
        assert_eq!((target.screen_width_dp, target.screen_height_dp), (320, 480));
        assert_eq!(target.smallest_screen_width_dp, 320);
        assert_eq!(target.screen_layout & MASK_SCREENSIZE, SCREENSIZE_NORMAL);
        assert!(target.locale().is_default());
        assert_eq!(target.to_string(), "sw320dp-w320dp-h480dp-normal-port-mdpi-v65535");
    }

    #[test]
    fn default_config_matches_everything() {
        assert!(ResConfig::default().matches(&ResConfig::canonical()));
        assert!(ResConfig::default().matches(&ResConfig::default()));
    }

    #[test]
    fn constrained_axes_must_fit() {
        let target = ResConfig::canonical();
        let land = ResConfig { orientation: ORIENTATION_LAND, ..ResConfig::default() };
        assert!(!land.matches(&target));
        let large = ResConfig { screen_layout: SCREENSIZE_LARGE, ..ResConfig::default() };
        assert!(!large.matches(&target));
        let small = ResConfig { screen_layout: SCREENSIZE_SMALL, ..ResConfig::default() };
        assert!(small.matches(&target));
        let sw600 = ResConfig { smallest_screen_width_dp: 600, ..ResConfig::default() };
        assert!(!sw600.matches(&target));
        let night = ResConfig { ui_mode: UI_MODE_NIGHT_YES, ..ResConfig::default() };
        assert!(!night.matches(&target));
        let french = ResConfig::default().with_locale(lang("fr"));
        assert!(!french.matches(&target));
        assert!(french.matches(&target.with_locale(lang("fr"))));
        let v21 = ResConfig { sdk_version: 21, ..ResConfig::default() };
        assert!(v21.matches(&target));
    }

    #[test]
    fn newer_version_and_exact_density_win() {
        let target = ResConfig::canonical();
        let v21 = ResConfig { sdk_version: 21, ..ResConfig::default() };
        let v28 = ResConfig { sdk_version: 28, ..ResConfig::default() };
        assert!(v28.is_better_than(&v21, &target));
        assert!(!v21.is_better_than(&v28, &target));
        assert!(v21.is_better_than(&ResConfig::default(), &target));

        let mdpi = ResConfig { density: DENSITY_MEDIUM, ..ResConfig::default() };
        let hdpi = ResConfig { density: DENSITY_HIGH, ..ResConfig::default() };
        let ldpi = ResConfig { density: DENSITY_LOW, ..ResConfig::default() };
        assert!(mdpi.is_better_than(&hdpi, &target));
        // Scaling a higher bucket down beats scaling a lower one up.
        assert!(hdpi.is_better_than(&ldpi, &target));
        let any = ResConfig { density: DENSITY_ANY, ..ResConfig::default() };
        assert!(any.is_better_than(&mdpi, &target));
    }

    #[test]
    fn locale_preference_only_when_requested() {
        let target = ResConfig::canonical().with_locale(Locale {
            language: *b"en",
            country: *b"GB",
        });
        let en = ResConfig::default().with_locale(lang("en"));
        let en_gb = ResConfig::default().with_locale(Locale {
            language: *b"en",
            country: *b"GB",
        });
        assert!(en.is_better_than(&ResConfig::default(), &target));
        assert!(en_gb.is_better_than(&en, &target));
        assert!(!en.is_better_than(&ResConfig::default(), &ResConfig::canonical()));
    }

    #[test]
    fn best_value_prefers_closer_match() {
        let values = vec![
            (ResConfig::default(), string("default")),
            (ResConfig { orientation: ORIENTATION_LAND, ..ResConfig::default() }, string("land")),
            (ResConfig { sdk_version: 26, ..ResConfig::default() }, string("v26")),
            (ResConfig { sdk_version: 21, ..ResConfig::default() }, string("v21")),
        ];
        assert_eq!(best_value(&values, &ResConfig::canonical()), Some(&string("v26")));
    }

    #[test]
    fn best_value_first_seen_wins_ties() {
        let values = vec![
            (ResConfig::default(), string("first")),
            (ResConfig::default(), string("second")),
        ];
        assert_eq!(best_value(&values, &ResConfig::canonical()), Some(&string("first")));
    }

    #[test]
    fn best_value_absent_without_match() {
        let values = vec![(ResConfig::default().with_locale(lang("de")), string("de"))];
        assert_eq!(best_value(&values, &ResConfig::canonical()), None);
        assert_eq!(best_value(&Vec::new(), &ResConfig::canonical()), None);
    }

    #[test]
    fn locale_tags() {
        assert_eq!(Locale::default().tag(), "");
        assert_eq!(lang("fr").tag(), "fr");
        assert_eq!(
            Locale {
                language: *b"zh",
                country: *b"CN"
            }
            .tag(),
            "zh-CN"
        );
        // "fil" packed: f=5, i=8, l=11 with base 'a'.
        let packed = [0x80 | (11 << 2) | (8 >> 3), ((8 & 0x07) << 5) | 5];
        assert_eq!(unpack_code(packed, b'a'), "fil");
    }

    #[test]
    fn parses_short_config() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&28u32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 4]); // imsi
        raw.extend_from_slice(b"enUS");
        raw.extend_from_slice(&[ORIENTATION_LAND, 0]);
        raw.extend_from_slice(&DENSITY_HIGH.to_le_bytes());
        raw.extend_from_slice(&[0u8; 4]); // input
        raw.extend_from_slice(&[0u8; 4]); // screen size
        raw.extend_from_slice(&21u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        let mut reader = BinaryReader::new(&raw);
        let config = ResConfig::parse(&mut reader).expect("config");
        assert_eq!(reader.position(), 28);
        assert_eq!(config.locale().tag(), "en-US");
        assert_eq!(config.orientation, ORIENTATION_LAND);
        assert_eq!(config.density, DENSITY_HIGH);
        assert_eq!(config.sdk_version, 21);
        assert_eq!(config.screen_width_dp, 0);
        assert_eq!(config.to_string(), "en-US-land-hdpi-v21");
    }
}
