//! Ranking learned patterns against a filename.

use manuals_core::{
    Candidate, LearningState, Pattern, SuggestionField, Suggestions, association_key, tokenize,
};

pub const EXACT_MATCH_CONFIDENCE: f64 = 0.9;
pub const EXACT_MATCH_REASON: &str = "exact filename match";

/// Learned suggestions never reach the exact-match tier.
pub const LEARNED_CONFIDENCE_CAP: f64 = 0.8;
pub const MAX_CANDIDATES_PER_FIELD: usize = 3;

const STRONG_CANDIDATE: f64 = 0.5;
const HIGH_OVERALL_CONFIDENCE: f64 = 0.7;
const LOW_OVERALL_CONFIDENCE: f64 = 0.3;

/// Suggest brand, model and type values for `filename`. Read-only.
pub fn suggest(state: &LearningState, filename: &str) -> Suggestions {
    if let Some(exact) = exact_match(state, filename) {
        return exact;
    }

    let tokens = tokenize(filename);
    let mut out = Suggestions::default();
    for field in SuggestionField::ALL {
        *out.candidates_mut(field) = ranked_candidates(state, field, &tokens);
    }

    let strong = SuggestionField::ALL
        .iter()
        .flat_map(|field| out.candidates(*field))
        .any(|c| c.confidence > STRONG_CANDIDATE);
    out.confidence = if strong {
        HIGH_OVERALL_CONFIDENCE
    } else {
        LOW_OVERALL_CONFIDENCE
    };
    out
}

fn exact_match(state: &LearningState, filename: &str) -> Option<Suggestions> {
    let assoc = state.filename_associations.get(&association_key(filename))?;
    let mut out = Suggestions {
        confidence: EXACT_MATCH_CONFIDENCE,
        ..Suggestions::default()
    };
    for field in SuggestionField::ALL {
        let value = assoc.value(field).trim();
        if !value.is_empty() {
            out.candidates_mut(field).push(Candidate {
                value: value.to_string(),
                confidence: EXACT_MATCH_CONFIDENCE,
                reason: EXACT_MATCH_REASON.to_string(),
            });
        }
    }
    (!out.is_empty()).then_some(out)
}

fn ranked_candidates(
    state: &LearningState,
    field: SuggestionField,
    tokens: &[String],
) -> Vec<Candidate> {
    let mut scored: Vec<(f64, &String, &Pattern)> = state
        .patterns(field)
        .iter()
        .filter_map(|(key, pattern)| score(pattern, tokens).map(|s| (s, key, pattern)))
        .collect();
    // Stable: equal scores keep key order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(MAX_CANDIDATES_PER_FIELD)
        .map(|(score, key, pattern)| Candidate {
            value: if pattern.original_value.is_empty() {
                key.clone()
            } else {
                pattern.original_value.clone()
            },
            confidence: score.min(LEARNED_CONFIDENCE_CAP),
            reason: format!("learned from {} files", pattern.count),
        })
        .collect()
}

/// Sum of normalized word weights over matched tokens, scaled by the fraction of tokens
/// matched. `None` when nothing matched.
fn score(pattern: &Pattern, tokens: &[String]) -> Option<f64> {
    if pattern.count == 0 || tokens.is_empty() {
        return None;
    }
    let count = f64::from(pattern.count);
    let mut matched = 0usize;
    let mut total = 0.0;
    for token in tokens {
        if let Some(weight) = pattern.associated_words.get(token) {
            matched += 1;
            total += f64::from(*weight) / count;
        }
    }
    if matched == 0 {
        return None;
    }
    Some(total * matched as f64 / tokens.len() as f64)
}
