/// Categorical cross-entropy for a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Computes `-log(predicted[label] + eps)`.
    ///
    /// A missing label (`None`) or one outside the output width contributes
    /// no loss, mirroring how the update treats it: no unit is the target.
    pub fn loss(predicted: &[f32], label: Option<usize>) -> f64 {
        match label.and_then(|l| predicted.get(l)) {
            Some(p) => -(*p as f64 + EPS).ln(),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn confident_correct_prediction_is_cheap() {
        let l = CrossEntropyLoss::loss(&[0.999, 0.001], Some(0));
        assert!(l < 0.01);
    }

    #[test]
    fn uniform_prediction_costs_ln2() {
        let l = CrossEntropyLoss::loss(&[0.5, 0.5], Some(1));
        assert_abs_diff_eq!(l, std::f64::consts::LN_2, epsilon = 1e-9);
    }

    #[test]
    fn missing_label_costs_nothing() {
        assert_eq!(CrossEntropyLoss::loss(&[0.2, 0.8], None), 0.0);
        assert_eq!(CrossEntropyLoss::loss(&[0.2, 0.8], Some(7)), 0.0);
    }
}
