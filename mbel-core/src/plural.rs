//! CLDR cardinal plural rules for integers.
//!
//! Every rule is a total function: any `i64` maps to exactly one
//! category from that rule's own set (see [`PluralRule::categories`]).
//! Negative numbers use their absolute value.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    /// Case keyword used in source files, e.g. `few` in `[few] => "..."`.
    pub fn as_str(self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl fmt::Display for PluralCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A family of languages sharing one cardinal rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralRule {
    /// `1 → one`, else `other` (English, German, Spanish, ...).
    OneOther,
    /// `0, 1 → one`, else `other`.
    French,
    /// `one`, `few`, `many` with `one` only for exactly 1.
    Polish,
    /// `one` for 1, 21, 31, ...; `few`, `many` (Russian, Ukrainian, ...).
    EastSlavic,
    /// `1 → one`, `2..4 → few`, else `other`.
    Czech,
    Romanian,
    Lithuanian,
    /// All six categories.
    Arabic,
    /// Always `other` (Chinese, Japanese, Korean, ...).
    NoPlural,
}

/// Language registry, keyed by lowercase 2-letter code.
pub const LANGUAGES: &[(&str, PluralRule)] = &[
    // Germanic
    ("en", PluralRule::OneOther),
    ("de", PluralRule::OneOther),
    ("nl", PluralRule::OneOther),
    ("sv", PluralRule::OneOther),
    ("da", PluralRule::OneOther),
    ("no", PluralRule::OneOther),
    ("nb", PluralRule::OneOther),
    ("nn", PluralRule::OneOther),
    // Romance
    ("fr", PluralRule::French),
    ("es", PluralRule::OneOther),
    ("it", PluralRule::OneOther),
    ("pt", PluralRule::OneOther),
    ("ro", PluralRule::Romanian),
    // Slavic
    ("pl", PluralRule::Polish),
    ("ru", PluralRule::EastSlavic),
    ("uk", PluralRule::EastSlavic),
    ("be", PluralRule::EastSlavic),
    ("hr", PluralRule::EastSlavic),
    ("sr", PluralRule::EastSlavic),
    ("cs", PluralRule::Czech),
    ("sk", PluralRule::Czech),
    // Baltic
    ("lt", PluralRule::Lithuanian),
    // Semitic
    ("ar", PluralRule::Arabic),
    ("he", PluralRule::OneOther),
    // Asian
    ("zh", PluralRule::NoPlural),
    ("ja", PluralRule::NoPlural),
    ("ko", PluralRule::NoPlural),
    ("vi", PluralRule::NoPlural),
    ("th", PluralRule::NoPlural),
    ("id", PluralRule::NoPlural),
    ("ms", PluralRule::NoPlural),
    // Other
    ("tr", PluralRule::OneOther),
    ("hu", PluralRule::OneOther),
    ("fi", PluralRule::OneOther),
];

impl PluralRule {
    /// Rule for a locale tag; `pl-PL` and `PL` both resolve to `pl`.
    ///
    /// Unknown languages use [`PluralRule::OneOther`].
    pub fn for_language(lang: &str) -> PluralRule {
        let code: String = lang.chars().take(2).flat_map(char::to_lowercase).collect();
        LANGUAGES
            .iter()
            .find(|(known, _)| *known == code)
            .map_or(PluralRule::OneOther, |(_, rule)| *rule)
    }

    pub fn category(self, n: i64) -> PluralCategory {
        use PluralCategory::*;

        let n = n.unsigned_abs();
        let mod10 = n % 10;
        let mod100 = n % 100;
        match self {
            PluralRule::OneOther => {
                if n == 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::French => {
                if n <= 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::Polish => {
                if n == 1 {
                    One
                } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
                    Few
                } else {
                    Many
                }
            }
            PluralRule::EastSlavic => {
                if mod10 == 1 && mod100 != 11 {
                    One
                } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
                    Few
                } else {
                    Many
                }
            }
            PluralRule::Czech => match n {
                1 => One,
                2..=4 => Few,
                _ => Other,
            },
            PluralRule::Romanian => {
                if n == 1 {
                    One
                } else if n == 0 || (1..=19).contains(&mod100) {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Lithuanian => {
                if mod10 == 1 && mod100 != 11 {
                    One
                } else if (2..=9).contains(&mod10) && !(11..=19).contains(&mod100) {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Arabic => match n {
                0 => Zero,
                1 => One,
                2 => Two,
                _ if (3..=10).contains(&mod100) => Few,
                _ if (11..=99).contains(&mod100) => Many,
                _ => Other,
            },
            PluralRule::NoPlural => Other,
        }
    }

    /// The closed set of categories this rule can return.
    pub fn categories(self) -> &'static [PluralCategory] {
        use PluralCategory::*;

        match self {
            PluralRule::OneOther | PluralRule::French => &[One, Other],
            PluralRule::Polish | PluralRule::EastSlavic => &[One, Few, Many],
            PluralRule::Czech | PluralRule::Romanian | PluralRule::Lithuanian => {
                &[One, Few, Other]
            }
            PluralRule::Arabic => &PluralCategory::ALL,
            PluralRule::NoPlural => &[Other],
        }
    }
}

/// Plural category of `n` in `lang`.
pub fn plural_category(lang: &str, n: i64) -> PluralCategory {
    PluralRule::for_language(lang).category(n)
}

#[cfg(test)]
mod tests {
    use super::PluralCategory::*;
    use super::*;

    use proptest::prelude::*;

    const BOUNDARIES: [i64; 12] = [0, 1, 2, 5, 11, 12, 13, 14, 19, 21, 22, 100];

    fn table(lang: &str) -> Vec<PluralCategory> {
        BOUNDARIES.iter().map(|n| plural_category(lang, *n)).collect()
    }

    #[test]
    fn polish_boundaries() {
        assert_eq!(
            table("pl"),
            vec![Many, One, Few, Many, Many, Many, Many, Many, Many, Many, Few, Many]
        );
    }

    #[test]
    fn russian_boundaries() {
        assert_eq!(
            table("ru"),
            vec![Many, One, Few, Many, Many, Many, Many, Many, Many, One, Few, Many]
        );
    }

    #[test]
    fn arabic_boundaries() {
        assert_eq!(
            table("ar"),
            vec![Zero, One, Two, Few, Many, Many, Many, Many, Many, Many, Many, Other]
        );
        assert_eq!(plural_category("ar", 103), Few);
        assert_eq!(plural_category("ar", 111), Many);
        assert_eq!(plural_category("ar", 200), Other);
    }

    #[test]
    fn lithuanian_boundaries() {
        assert_eq!(
            table("lt"),
            vec![Other, One, Few, Few, Other, Other, Other, Other, Other, One, Few, Other]
        );
    }

    #[test]
    fn romanian_boundaries() {
        assert_eq!(
            table("ro"),
            vec![Few, One, Few, Few, Few, Few, Few, Few, Few, Other, Other, Other]
        );
        assert_eq!(plural_category("ro", 101), Few);
    }

    #[test]
    fn english_and_french_differ_on_zero() {
        assert_eq!(plural_category("en", 0), Other);
        assert_eq!(plural_category("fr", 0), One);
        assert_eq!(plural_category("en", 1), One);
        assert_eq!(plural_category("fr", 2), Other);
    }

    #[test]
    fn czech_uses_absolute_ranges() {
        assert_eq!(plural_category("cs", 3), Few);
        assert_eq!(plural_category("cs", 23), Other);
    }

    #[test]
    fn no_plural_languages_are_always_other() {
        for lang in ["zh", "ja", "ko"] {
            assert!(BOUNDARIES.iter().all(|n| plural_category(lang, *n) == Other));
        }
    }

    #[test]
    fn locale_tags_are_normalized() {
        assert_eq!(PluralRule::for_language("pl-PL"), PluralRule::Polish);
        assert_eq!(PluralRule::for_language("RU"), PluralRule::EastSlavic);
        assert_eq!(PluralRule::for_language("xx"), PluralRule::OneOther);
        assert_eq!(PluralRule::for_language(""), PluralRule::OneOther);
        assert_eq!(PluralRule::for_language("ü"), PluralRule::OneOther);
    }

    #[test]
    fn negative_numbers_use_magnitude() {
        assert_eq!(plural_category("ru", -21), One);
        assert_eq!(plural_category("pl", -3), Few);
    }

    proptest! {
        #[test]
        fn every_language_stays_within_its_categories(n in any::<i64>()) {
            for (lang, rule) in LANGUAGES {
                let category = plural_category(lang, n);
                prop_assert!(rule.categories().contains(&category), "{lang} {n} -> {category}");
            }
        }

        #[test]
        fn unknown_languages_follow_english(n in any::<i64>(), lang in "[a-z]{2}") {
            if !LANGUAGES.iter().any(|(known, _)| *known == lang) {
                prop_assert_eq!(plural_category(&lang, n), plural_category("en", n));
            }
        }
    }
}
