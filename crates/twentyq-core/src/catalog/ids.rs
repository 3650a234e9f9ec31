//! Deterministic id minting for runtime-created entities and attributes.

const ARTICLES: [&str; 3] = ["the ", "an ", "a "];
const QUESTION_STOPWORDS: [&str; 7] = ["is", "it", "a", "an", "the", "does", "can"];
const QUESTION_WORD_LIMIT: usize = 5;

/// Lowercases and strips a leading article: "An Elephant" -> "elephant".
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    for article in ARTICLES {
        if let Some(rest) = lowered.strip_prefix(article) {
            return rest.trim_start().to_string();
        }
    }
    lowered
}

/// Unique entity id derived from a display name.
pub fn slug_entity_id(name: &str, exists: impl Fn(&str) -> bool) -> String {
    let base = snake_case(&normalize_name(name));
    let base = if base.is_empty() {
        "entity".to_string()
    } else {
        base
    };
    dedupe(base, exists)
}

/// Unique attribute id derived from free-text question wording.
pub fn slug_attribute_id(question: &str, exists: impl Fn(&str) -> bool) -> String {
    let lowered = question.to_lowercase();
    let words: Vec<String> = lowered
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty() && !QUESTION_STOPWORDS.contains(&word.as_str()))
        .take(QUESTION_WORD_LIMIT)
        .collect();
    let base = if words.is_empty() {
        "learned_question".to_string()
    } else {
        words.join("_")
    };
    dedupe(base, exists)
}

fn snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn dedupe(base: String, exists: impl Fn(&str) -> bool) -> String {
    if !exists(&base) {
        return base;
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{base}_{counter}");
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_strips_articles_and_punctuation() {
        assert_eq!(slug_entity_id("An Elephant", |_| false), "elephant");
        assert_eq!(slug_entity_id("a guinea pig", |_| false), "guinea_pig");
        assert_eq!(slug_entity_id("The  T-Rex!", |_| false), "t_rex");
        assert_eq!(slug_entity_id("  ", |_| false), "entity");
    }

    #[test]
    fn entity_id_dedupes_with_counter() {
        let taken = ["dog", "dog_1"];
        assert_eq!(slug_entity_id("a dog", |id| taken.contains(&id)), "dog_2");
    }

    #[test]
    fn attribute_id_drops_stopwords_and_limits_length() {
        assert_eq!(
            slug_attribute_id("Does it live in the sea?", |_| false),
            "live_in_sea"
        );
        assert_eq!(
            slug_attribute_id("Is it one, two, three, four, five or six?", |_| false),
            "one_two_three_four_five"
        );
        assert_eq!(slug_attribute_id("Is it?", |_| false), "learned_question");
    }

    #[test]
    fn attribute_id_dedupes_against_existing() {
        assert_eq!(
            slug_attribute_id("Can it bark?", |id| id == "bark"),
            "bark_1"
        );
    }

    #[test]
    fn normalize_name_handles_articles() {
        assert_eq!(normalize_name("A Cat"), "cat");
        assert_eq!(normalize_name("an owl"), "owl");
        assert_eq!(normalize_name("theater"), "theater");
    }
}
