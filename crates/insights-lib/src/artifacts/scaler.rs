//! Fitted standard scaler

use serde::{Deserialize, Serialize};

/// Per-column standardization fitted at training time.
///
/// `transform(x)[i] = (x[i] - mean[i]) / scale[i]`. Columns with zero
/// variance were stored with a scale of 0 and are divided by 1 instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} columns but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler parameters must be finite".to_string());
        }
        Ok(())
    }

    /// Apply the fitted transform. Never refits.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, String> {
        if values.len() != self.n_features() {
            return Err(format!(
                "scaler expects {} values, got {}",
                self.n_features(),
                values.len()
            ));
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 0.5, 3.0],
            scale: vec![2.0, 0.25, 0.0],
        };
        let out = scaler.transform(&[14.0, 0.0, 5.0]).unwrap();
        assert_eq!(out, vec![2.0, -2.0, 2.0]);
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = StandardScaler {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        assert!(scaler.transform(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_validate() {
        let ragged = StandardScaler {
            mean: vec![0.0; 3],
            scale: vec![1.0; 2],
        };
        assert!(ragged.validate().is_err());

        let nan = StandardScaler {
            mean: vec![f64::NAN],
            scale: vec![1.0],
        };
        assert!(nan.validate().is_err());
    }
}
