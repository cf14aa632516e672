use super::FaceError;

/// Number of best scores averaged by the top-k rule.
pub const TOP_K: usize = 3;

// Unit vectors compared with themselves land a few ULPs under 1.0, so a
// threshold of 1.0 is capped just below it.
const SCORE_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    pub accepted: bool,
    /// Best single similarity.
    pub score: f32,
    pub top_k_average: f32,
}

/// L2-normalises `v`. Fails on empty, non-finite or zero vectors.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, FaceError> {
    if v.is_empty() {
        return Err(FaceError::Model("Empty embedding".into()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(FaceError::Model("Embedding contains non-finite values".into()));
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Err(FaceError::Model("Embedding has zero norm".into()));
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Cosine similarity of two unit vectors.
pub fn compare(enrolled: &[f32], sample: &[f32]) -> Result<f32, FaceError> {
    if enrolled.len() != sample.len() {
        return Err(FaceError::DimensionMismatch {
            enrolled: enrolled.len(),
            sample: sample.len(),
        });
    }
    let dot: f32 = enrolled.iter().zip(sample).map(|(a, b)| a * b).sum();
    Ok(dot.clamp(-1.0, 1.0))
}

/// Compares `sample` with every enrolled template.
///
/// Accepts when either the best score or the mean of the best `min(3, n)` scores
/// reaches `threshold`. The reported score is always the best one.
pub fn decide(
    enrolled: &[Vec<f32>],
    sample: &[f32],
    threshold: f32,
) -> Result<MatchDecision, FaceError> {
    if enrolled.is_empty() {
        return Err(FaceError::NoEnrollment);
    }

    let mut scores = enrolled
        .iter()
        .map(|template| compare(template, sample))
        .collect::<Result<Vec<f32>, _>>()?;
    scores.sort_by(|a, b| b.total_cmp(a));

    let score = scores[0];
    let k = TOP_K.min(scores.len());
    let top_k_average = scores[..k].iter().sum::<f32>() / k as f32;

    let threshold = threshold.min(1.0 - SCORE_EPSILON);
    let clears = |value: f32| value >= threshold;
    Ok(MatchDecision {
        accepted: clears(score) || clears(top_k_average),
        score,
        top_k_average,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unit vector in the x/y plane with cosine `c` against `[1, 0, 0]`.
    fn at_cosine(c: f32) -> Vec<f32> {
        vec![c, (1.0 - c * c).sqrt(), 0.0]
    }

    #[test]
    fn exact_template_match_accepts_at_threshold_one() {
        let sample = normalize(&[0.3, -1.2, 2.5]).unwrap();
        let enrolled = vec![
            normalize(&[1.0, 0.0, 0.0]).unwrap(),
            sample.clone(),
            normalize(&[0.0, 1.0, 0.0]).unwrap(),
        ];
        for threshold in [0.0, 0.5, 0.8, 0.99, 1.0] {
            assert!(decide(&enrolled, &sample, threshold).unwrap().accepted);
        }
    }

    #[test]
    fn strong_single_template_wins_over_poor_others() {
        let sample = vec![1.0, 0.0, 0.0];
        let enrolled = vec![at_cosine(0.95), at_cosine(0.2), at_cosine(0.1)];
        let d = decide(&enrolled, &sample, 0.80).unwrap();
        assert!(d.accepted);
        assert!((d.score - 0.95).abs() < 1e-5);
    }

    #[test]
    fn consistent_near_misses_still_reject() {
        // The top-k mean never exceeds the best score.
        let sample = vec![1.0, 0.0, 0.0];
        let enrolled = vec![at_cosine(0.79), at_cosine(0.78), at_cosine(0.77)];
        let d = decide(&enrolled, &sample, 0.80).unwrap();
        assert!(!d.accepted);
        assert!((d.top_k_average - 0.78).abs() < 1e-5);
    }

    #[test]
    fn score_just_under_threshold_is_rejected() {
        let sample = vec![1.0, 0.0, 0.0];
        let d = decide(&[at_cosine(0.799_999_5)], &sample, 0.80).unwrap();
        assert!(d.score < 0.80);
        assert!(!d.accepted);

        let d = decide(&[at_cosine(0.80)], &sample, 0.80).unwrap();
        assert!(d.accepted);
    }

    #[test]
    fn top_k_uses_all_templates_when_fewer_than_three() {
        let sample = vec![1.0, 0.0, 0.0];
        let d = decide(&[at_cosine(0.9), at_cosine(0.5)], &sample, 0.95).unwrap();
        assert!(!d.accepted);
        assert!((d.top_k_average - 0.7).abs() < 1e-5);
    }

    #[test]
    fn empty_enrollment_is_an_error() {
        assert!(matches!(decide(&[], &[1.0], 0.8), Err(FaceError::NoEnrollment)));
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let err = decide(&[vec![1.0, 0.0]], &[1.0, 0.0, 0.0], 0.8).unwrap_err();
        assert!(matches!(err, FaceError::DimensionMismatch { enrolled: 2, sample: 3 }));
    }

    #[test]
    fn normalize_produces_unit_length() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(normalize(&[0.0, 0.0]).is_err());
        assert!(normalize(&[f32::NAN]).is_err());
    }
}
