//! Normalized edit-distance similarity.

/// Levenshtein distance over Unicode scalar values; insert, delete and substitute cost 1.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Single rolling row of the (len(b)+1) x (len(a)+1) table.
    let mut row: Vec<usize> = (0..=a.len()).collect();
    for (i, cb) in b.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, ca) in a.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[a.len()]
}

/// `(maxLen - editDistance) / maxLen`, in `[0, 1]`.
///
/// Two empty strings are identical and score `1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - edit_distance(a, b)) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        for s in ["", "a", "Honda_CBR", "yamaha r1 2005"] {
            assert_eq!(similarity(s, s), 1.0);
        }
    }

    #[test]
    fn empty_pair_is_identical() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            ("kitten", "sitting"),
            ("yamahaa_r1", "yamaha_r1"),
            ("", "abc"),
            ("flaw", "lawn"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
            assert_eq!(edit_distance(a, b), edit_distance(b, a));
        }
    }

    #[test]
    fn classic_distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn one_typo_clears_relocation_threshold() {
        assert!(similarity("yamahaa_r1", "yamaha_r1") > 0.7);
        assert!(similarity("yamahaa_r1.pdf", "yamaha_r1.pdf") > 0.7);
        assert!(similarity("honda_cbr", "suzuki_gsx") < 0.7);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(edit_distance("moto", "motö"), 1);
        assert_eq!(similarity("ñ", "n"), 0.0);
    }
}
