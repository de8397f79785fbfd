//! Language support: spoken number parsing and localized feedback
//!
//! Pure lookup tables; no game logic lives here. The controller depends on
//! this module for turning transcripts into integers and for the phrasing
//! of spoken questions and status messages.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Supported drill languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian
    #[default]
    Ru,
    /// English
    En,
}

impl Language {
    /// Short language code ("ru" / "en")
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    /// BCP-47 tag used by speech backends ("ru-RU" / "en-US")
    #[must_use]
    pub const fn bcp47(self) -> &'static str {
        match self {
            Self::Ru => "ru-RU",
            Self::En => "en-US",
        }
    }

    /// Parse a short code or BCP-47 tag
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("ru") {
            Some(Self::Ru)
        } else if lower.starts_with("en") {
            Some(Self::En)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unsupported language: {s}"))
    }
}

/// Category of a user-visible status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    /// Positive feedback (correct answer)
    Success,
    /// Negative feedback (wrong answer)
    Error,
    /// Neutral warning (timeout, skip)
    Warning,
}

/// Extract an integer from a recognized transcript.
///
/// Tries, in order: two-word compound number phrases ("twenty one",
/// "двадцать один"), single number words ("five", "пять"), and finally a
/// bare digit sequence. Matching is token-bounded, so "одиннадцать" never
/// matches "один". Returns `None` when the text carries no number at all —
/// the caller treats that as noise and keeps listening.
#[must_use]
pub fn extract_number(text: &str, language: Language) -> Option<i64> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    // Compound phrases first: tens word followed by a unit word
    for pair in tokens.windows(2) {
        if let (Some(tens), Some(unit)) =
            (tens_word(language, pair[0]), unit_word(language, pair[1]))
        {
            return Some(tens + unit);
        }
    }

    // Single number words
    for token in &tokens {
        if let Some(value) = number_word(language, token) {
            return Some(value);
        }
    }

    // Bare digits
    tokens.iter().find_map(|t| t.parse::<i64>().ok())
}

/// Unit words 1-9 (compound second halves)
fn unit_word(language: Language, token: &str) -> Option<i64> {
    let value = match (language, token) {
        (Language::Ru, "один" | "одна") | (Language::En, "one") => 1,
        (Language::Ru, "два" | "две") | (Language::En, "two") => 2,
        (Language::Ru, "три") | (Language::En, "three") => 3,
        (Language::Ru, "четыре") | (Language::En, "four") => 4,
        (Language::Ru, "пять") | (Language::En, "five") => 5,
        (Language::Ru, "шесть") | (Language::En, "six") => 6,
        (Language::Ru, "семь") | (Language::En, "seven") => 7,
        (Language::Ru, "восемь") | (Language::En, "eight") => 8,
        (Language::Ru, "девять") | (Language::En, "nine") => 9,
        _ => return None,
    };
    Some(value)
}

/// Tens words 20-90 (compound first halves)
fn tens_word(language: Language, token: &str) -> Option<i64> {
    let value = match (language, token) {
        (Language::Ru, "двадцать") | (Language::En, "twenty") => 20,
        (Language::Ru, "тридцать") | (Language::En, "thirty") => 30,
        (Language::Ru, "сорок") | (Language::En, "forty") => 40,
        (Language::Ru, "пятьдесят") | (Language::En, "fifty") => 50,
        (Language::Ru, "шестьдесят") | (Language::En, "sixty") => 60,
        (Language::Ru, "семьдесят") | (Language::En, "seventy") => 70,
        (Language::Ru, "восемьдесят") | (Language::En, "eighty") => 80,
        (Language::Ru, "девяносто") | (Language::En, "ninety") => 90,
        _ => return None,
    };
    Some(value)
}

/// Standalone number words 0-20, tens, and one hundred
fn number_word(language: Language, token: &str) -> Option<i64> {
    if let Some(value) = unit_word(language, token).or_else(|| tens_word(language, token)) {
        return Some(value);
    }

    let value = match (language, token) {
        (Language::Ru, "ноль") | (Language::En, "zero") => 0,
        (Language::Ru, "десять") | (Language::En, "ten") => 10,
        (Language::Ru, "одиннадцать") | (Language::En, "eleven") => 11,
        (Language::Ru, "двенадцать") | (Language::En, "twelve") => 12,
        (Language::Ru, "тринадцать") | (Language::En, "thirteen") => 13,
        (Language::Ru, "четырнадцать") | (Language::En, "fourteen") => 14,
        (Language::Ru, "пятнадцать") | (Language::En, "fifteen") => 15,
        (Language::Ru, "шестнадцать") | (Language::En, "sixteen") => 16,
        (Language::Ru, "семнадцать") | (Language::En, "seventeen") => 17,
        (Language::Ru, "восемнадцать") | (Language::En, "eighteen") => 18,
        (Language::Ru, "девятнадцать") | (Language::En, "nineteen") => 19,
        (Language::Ru, "сто") | (Language::En, "hundred") => 100,
        _ => return None,
    };
    Some(value)
}

/// Random praise message for a correct answer
pub fn praise<R: Rng + ?Sized>(language: Language, rng: &mut R) -> &'static str {
    static RU: [&str; 5] = ["Отлично!", "Правильно!", "Молодец!", "Супер!", "Здорово!"];
    static EN: [&str; 5] = ["Excellent!", "Correct!", "Great!", "Awesome!", "Perfect!"];

    let pool = match language {
        Language::Ru => &RU,
        Language::En => &EN,
    };
    pool[rng.gen_range(0..pool.len())]
}

/// Feedback line for a wrong answer
#[must_use]
pub fn wrong_answer(language: Language, correct: i64) -> String {
    match language {
        Language::Ru => format!("Правильный ответ: {correct}"),
        Language::En => format!("Correct answer: {correct}"),
    }
}

/// Feedback line for a timed-out or skipped question
#[must_use]
pub fn times_up(language: Language, correct: i64) -> String {
    match language {
        Language::Ru => format!("Время вышло! Ответ: {correct}"),
        Language::En => format!("Time's up! Answer: {correct}"),
    }
}

/// Final summary line
#[must_use]
pub fn summary_line(language: Language, correct: usize, total: usize, percent: u32) -> String {
    match language {
        Language::Ru => format!("Результат: {correct}/{total} ({percent}%)"),
        Language::En => format!("Result: {correct}/{total} ({percent}%)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_phrases_match_first() {
        assert_eq!(extract_number("двадцать один", Language::Ru), Some(21));
        assert_eq!(extract_number("forty two", Language::En), Some(42));
        assert_eq!(extract_number("it is ninety nine", Language::En), Some(99));
    }

    #[test]
    fn single_words() {
        assert_eq!(extract_number("пять", Language::Ru), Some(5));
        assert_eq!(extract_number("the answer is seven", Language::En), Some(7));
        assert_eq!(extract_number("zero", Language::En), Some(0));
        assert_eq!(extract_number("сто", Language::Ru), Some(100));
    }

    #[test]
    fn bare_digits() {
        assert_eq!(extract_number("7", Language::En), Some(7));
        assert_eq!(extract_number("maybe 42?", Language::En), Some(42));
        assert_eq!(extract_number("1024", Language::Ru), Some(1024));
    }

    #[test]
    fn no_number_is_none() {
        assert_eq!(extract_number("banana", Language::En), None);
        assert_eq!(extract_number("", Language::Ru), None);
        assert_eq!(extract_number("ну не знаю", Language::Ru), None);
    }

    #[test]
    fn word_matching_is_token_bounded() {
        // "одиннадцать" contains "один" but must parse as eleven
        assert_eq!(extract_number("одиннадцать", Language::Ru), Some(11));
        assert_eq!(extract_number("seventeen", Language::En), Some(17));
    }

    #[test]
    fn gendered_russian_units() {
        assert_eq!(extract_number("одна", Language::Ru), Some(1));
        assert_eq!(extract_number("двадцать две", Language::Ru), Some(22));
    }

    #[test]
    fn language_tags_round_trip() {
        assert_eq!(Language::parse("ru-RU"), Some(Language::Ru));
        assert_eq!(Language::parse("en"), Some(Language::En));
        assert_eq!(Language::parse("fr"), None);
        assert_eq!(Language::En.bcp47(), "en-US");
    }
}
