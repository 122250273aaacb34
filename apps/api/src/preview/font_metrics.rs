//! Approximate glyph metrics for the fonts a resume can be customized with.
//!
//! One reference table (a humanist sans at 1em) holds per-character advance
//! widths for printable ASCII. Every other family is modelled as a uniform
//! scale of that table. That is coarse, but the preview only needs line
//! counts that are right to within a line or two per page, and the fitting
//! loop re-measures at every size it tries.

use serde::{Deserialize, Serialize};

/// Font families offered by the customization panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Inter,
    Roboto,
    Lato,
    Merriweather,
    Garamond,
    Oswald,
}

impl FontFamily {
    /// Average advance width relative to the reference table.
    fn width_scale(&self) -> f32 {
        match self {
            FontFamily::Inter => 1.00,
            FontFamily::Roboto => 0.97,
            FontFamily::Lato => 1.05,
            FontFamily::Merriweather => 1.10,
            FontFamily::Garamond => 0.85,
            FontFamily::Oswald => 0.68,
        }
    }
}

/// Advance widths in em for ASCII 0x20..=0x7E; index = code point - 32.
#[rustfmt::skip]
const REFERENCE_WIDTHS: [f32; 95] = [
    // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
    0.25, 0.30, 0.38, 0.56, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
    // 0-9
    0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
    // :     ;     <     =     >     ?     @
    0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
    // A-M
    0.67, 0.61, 0.61, 0.67, 0.56, 0.50, 0.67, 0.67, 0.25, 0.39, 0.61, 0.53, 0.78,
    // N-Z
    0.67, 0.72, 0.56, 0.72, 0.61, 0.50, 0.56, 0.67, 0.67, 0.89, 0.61, 0.61, 0.56,
    // [     \     ]     ^     _     `
    0.28, 0.31, 0.28, 0.47, 0.56, 0.34,
    // a-m
    0.56, 0.56, 0.50, 0.56, 0.56, 0.31, 0.56, 0.56, 0.22, 0.22, 0.53, 0.22, 0.83,
    // n-z
    0.56, 0.56, 0.56, 0.56, 0.33, 0.44, 0.39, 0.56, 0.50, 0.72, 0.50, 0.50, 0.44,
    // {     |     }     ~
    0.33, 0.26, 0.33, 0.59,
];

/// Used for anything outside printable ASCII.
const REFERENCE_FALLBACK: f32 = 0.52;

#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    pub family: FontFamily,
    scale: f32,
}

impl FontMetrics {
    pub fn for_family(family: FontFamily) -> Self {
        Self {
            family,
            scale: family.width_scale(),
        }
    }

    pub fn char_width(&self, c: char) -> f32 {
        let code = c as usize;
        let base = if (32..=126).contains(&code) {
            REFERENCE_WIDTHS[code - 32]
        } else {
            REFERENCE_FALLBACK
        };
        base * self.scale
    }

    pub fn space_width(&self) -> f32 {
        self.char_width(' ')
    }

    /// Rendered width of `s` in em.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars().map(|c| self.char_width(c)).sum()
    }

    /// Greedy word wrap of `text` into lines of `line_width_em`.
    ///
    /// Returns 0 for blank text. A single word wider than the line is split
    /// across as many lines as it needs.
    pub fn wrap_lines(&self, text: &str, line_width_em: f32) -> u16 {
        if line_width_em <= 0.0 {
            return 0;
        }
        let space = self.space_width();
        let mut lines = 0u16;
        let mut current = 0.0_f32;

        for word in text.split_whitespace() {
            let w = self.measure_str(word);
            if lines == 0 {
                lines = 1;
                current = w;
            } else if current + space + w > line_width_em {
                lines = lines.saturating_add(1);
                current = w;
            } else {
                current += space + w;
            }

            if current > line_width_em {
                let overflow_lines = (current / line_width_em).ceil() as u16 - 1;
                lines = lines.saturating_add(overflow_lines);
                current -= overflow_lines as f32 * line_width_em;
            }
        }
        lines
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

const POINTS_PER_INCH: f32 = 72.0;

/// Physical page the preview lays content onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_in: f32,
    pub height_in: f32,
    pub margin_in: f32,
    /// Line height as a multiple of the font size.
    pub leading: f32,
}

impl Default for PageGeometry {
    /// US letter with 0.75" margins.
    fn default() -> Self {
        Self {
            width_in: 8.5,
            height_in: 11.0,
            margin_in: 0.75,
            leading: 1.25,
        }
    }
}

impl PageGeometry {
    /// Usable text width in em at the given font size.
    pub fn text_width_em(&self, font_size_pt: f32) -> f32 {
        (self.width_in - 2.0 * self.margin_in) * POINTS_PER_INCH / font_size_pt
    }

    /// Number of body lines that fit on one page at the given font size.
    pub fn line_capacity(&self, font_size_pt: f32) -> u16 {
        let usable_pt = (self.height_in - 2.0 * self.margin_in) * POINTS_PER_INCH;
        (usable_pt / (font_size_pt * self.leading)).floor() as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inter() -> FontMetrics {
        FontMetrics::for_family(FontFamily::Inter)
    }

    #[test]
    fn test_measure_empty_is_zero() {
        assert_eq!(inter().measure_str(""), 0.0);
    }

    #[test]
    fn test_measure_ascii_word() {
        // R(0.61) + u(0.56) + s(0.44) + t(0.39)
        let width = inter().measure_str("Rust");
        assert!((width - 2.00).abs() < 1e-3, "got {width}");
    }

    #[test]
    fn test_non_ascii_uses_fallback() {
        let width = inter().measure_str("é");
        assert!((width - REFERENCE_FALLBACK).abs() < 1e-4);
    }

    #[test]
    fn test_condensed_family_is_narrower() {
        let text = "Architected distributed caching layer";
        let oswald = FontMetrics::for_family(FontFamily::Oswald).measure_str(text);
        let lato = FontMetrics::for_family(FontFamily::Lato).measure_str(text);
        assert!(oswald < lato);
    }

    #[test]
    fn test_wrap_blank_is_zero_lines() {
        assert_eq!(inter().wrap_lines("   ", 40.0), 0);
    }

    #[test]
    fn test_wrap_short_text_is_one_line() {
        assert_eq!(inter().wrap_lines("Senior Engineer", 40.0), 1);
    }

    #[test]
    fn test_wrap_long_text_spans_lines() {
        let text = "word ".repeat(60);
        let lines = inter().wrap_lines(&text, 40.0);
        assert!(lines >= 3, "got {lines}");
    }

    #[test]
    fn test_wrap_overlong_word_splits() {
        let word = "x".repeat(200); // 100em at 0.50em per char
        assert_eq!(inter().wrap_lines(&word, 40.0), 3);
    }

    #[test]
    fn test_smaller_font_gives_more_room() {
        let page = PageGeometry::default();
        assert!(page.text_width_em(8.0) > page.text_width_em(11.0));
        assert!(page.line_capacity(8.0) > page.line_capacity(11.0));
    }

    #[test]
    fn test_letter_capacity_at_eleven_points() {
        let page = PageGeometry::default();
        // 9.5in * 72 = 684pt; 684 / (11 * 1.25) = 49.7
        assert_eq!(page.line_capacity(11.0), 49);
    }
}
