//! Winner selection across candidate models

use std::collections::BTreeMap;

/// Pick the candidate with the highest score.
///
/// NaN scores never win. On equal scores the name that sorts first wins, so
/// the choice is deterministic. `None` when no candidate has a real score.
pub fn select_best(scores: &BTreeMap<String, f64>) -> Option<(String, f64)> {
    scores
        .iter()
        .filter(|(_, s)| !s.is_nan())
        .fold(None::<(&String, f64)>, |best, (name, &score)| match best {
            Some((_, b)) if b >= score => best,
            _ => Some((name, score)),
        })
        .map(|(name, score)| (name.clone(), score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_picks_maximum() {
        let s = scores(&[("logreg", 0.84), ("random_forest", 0.83), ("gradient_boosting", 0.85)]);
        assert_eq!(select_best(&s), Some(("gradient_boosting".to_string(), 0.85)));
    }

    #[test]
    fn test_not_first_entry_by_default() {
        let s = scores(&[("a_model", 0.5), ("z_model", 0.9)]);
        assert_eq!(select_best(&s).unwrap().0, "z_model");
    }

    #[test]
    fn test_tie_goes_to_first_name() {
        let s = scores(&[("random_forest", 0.8), ("logreg", 0.8)]);
        assert_eq!(select_best(&s).unwrap().0, "logreg");
    }

    #[test]
    fn test_nan_never_wins() {
        let s = scores(&[("broken", f64::NAN), ("logreg", 0.1)]);
        assert_eq!(select_best(&s).unwrap().0, "logreg");
        assert_eq!(select_best(&scores(&[("broken", f64::NAN)])), None);
        assert_eq!(select_best(&BTreeMap::new()), None);
    }
}
