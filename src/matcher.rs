//! Decides whether two free-text team names denote the same team. This is
//! the only primitive available for linking the two providers' records,
//! which share no common numeric id.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use strsim::levenshtein;

/// Maximum edit distance tolerated between long normalized names.
const MAX_EDIT_DISTANCE: usize = 3;
/// Names at or below this length must match exactly (or via alias) to avoid
/// false positives between short unrelated names.
const MIN_FUZZY_LEN: usize = 5;

/// Common nicknames and short forms mapped to one canonical spelling.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // England
        ("man united", "manchester united"),
        ("man utd", "manchester united"),
        ("man city", "manchester city"),
        ("wolves", "wolverhampton wanderers"),
        ("spurs", "tottenham hotspur"),
        ("newcastle", "newcastle united"),
        ("leicester", "leicester city"),
        ("leeds", "leeds united"),
        ("norwich", "norwich city"),
        ("nottm forest", "nottingham forest"),
        ("sheffield utd", "sheffield united"),
        ("brighton", "brighton hove albion"),
        ("west ham", "west ham united"),
        // Spain
        ("atletico", "atletico madrid"),
        ("atleti", "atletico madrid"),
        ("betis", "real betis"),
        ("celta", "celta vigo"),
        ("athletic", "athletic bilbao"),
        ("athletic club", "athletic bilbao"),
        ("barca", "barcelona"),
        // Italy
        ("inter", "inter milan"),
        ("internazionale", "inter milan"),
        ("milan", "ac milan"),
        // Germany
        ("bayern", "bayern munich"),
        ("bayern munchen", "bayern munich"),
        ("bayer", "bayer leverkusen"),
        ("leverkusen", "bayer leverkusen"),
        ("gladbach", "borussia monchengladbach"),
        ("monchengladbach", "borussia monchengladbach"),
        ("dortmund", "borussia dortmund"),
        // France
        ("psg", "paris saint germain"),
        ("saint etienne", "as saint etienne"),
        // Portugal
        ("sporting", "sporting cp"),
        ("sporting lisbon", "sporting cp"),
    ])
});

/// Club-type tokens carrying no identity information.
const CLUB_TOKENS: [&str; 5] = ["fc", "cf", "club", "sc", "sv"];

fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            cleaned.push(ch);
        } else if ch.is_whitespace() {
            cleaned.push(' ');
        }
        // Punctuation is dropped outright ("St. Pauli" -> "st pauli").
    }

    let cleaned = cleaned.replace("football club", " ");
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| !CLUB_TOKENS.contains(token))
        .collect();
    let joined = tokens.join(" ");

    match ALIASES.get(joined.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => joined,
    }
}

/// True when the two names plausibly denote the same team. Pure and
/// symmetric; deterministic for any input pair.
pub fn same_team(name_a: &str, name_b: &str) -> bool {
    let a = normalize(name_a);
    let b = normalize(name_b);

    if a == b {
        return true;
    }
    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        return true;
    }

    let longer = a.chars().count().max(b.chars().count());
    longer > MIN_FUZZY_LEN && levenshtein(&a, &b) <= MAX_EDIT_DISTANCE
}
