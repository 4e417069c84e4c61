//! Error taxonomy for the training core
//!
//! Every failure is fatal for the run. The variants exist so callers can
//! tell a misconfigured run apart from a numerically diverged one after
//! downcasting the `anyhow::Error` returned by the public API.

use thiserror::Error;

/// Fatal training errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurioError {
    /// A tensor written to the rollout buffer does not match the declared shape
    #[error("shape mismatch for `{field}`: expected {expected:?}, got {actual:?}")]
    Shape {
        /// Buffer field being written
        field: &'static str,
        /// Declared shape
        expected: Vec<i64>,
        /// Shape that was supplied
        actual: Vec<i64>,
    },

    /// An invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Loss terms were requested before the rollout was complete
    #[error("rollout incomplete: {filled} of {expected} steps filled")]
    Incomplete {
        /// Steps written so far
        filled: usize,
        /// Steps required
        expected: usize,
    },

    /// The total objective became NaN or infinite
    #[error("non-finite loss {value} at update {update}")]
    NonFiniteLoss {
        /// Update index (0-based)
        update: usize,
        /// Offending loss value
        value: f64,
    },

    /// The objective was finite but backpropagation produced NaN or infinite gradients
    #[error("non-finite gradient norm {norm} at update {update}")]
    NonFiniteGradient {
        /// Update index (0-based)
        update: usize,
        /// Global gradient norm before clipping
        norm: f64,
    },
}

/// Check that `actual` equals `expected`, reporting the offending field otherwise
pub(crate) fn check_shape(
    field: &'static str,
    expected: &[i64],
    actual: &[i64],
) -> Result<(), CurioError> {
    if expected == actual {
        Ok(())
    } else {
        Err(CurioError::Shape { field, expected: expected.to_vec(), actual: actual.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_shape() {
        assert!(check_shape("states", &[2, 3], &[2, 3]).is_ok());

        let err = check_shape("states", &[2, 3], &[3, 2]).unwrap_err();
        assert_eq!(
            err,
            CurioError::Shape { field: "states", expected: vec![2, 3], actual: vec![3, 2] }
        );
    }

    #[test]
    fn test_error_messages() {
        let err = CurioError::NonFiniteLoss { update: 7, value: f64::NAN };
        assert_eq!(err.to_string(), "non-finite loss NaN at update 7");

        let err = CurioError::NonFiniteGradient { update: 3, norm: f64::INFINITY };
        assert_eq!(err.to_string(), "non-finite gradient norm inf at update 3");

        let err = CurioError::Incomplete { filled: 2, expected: 5 };
        assert!(err.to_string().contains("2 of 5"));
    }
}
