//! Numeric constants shared by the solvers.
//!
//! Every solver copies these into its own fields on construction, so a
//! caller can override any of them through the builder methods.

/// Penalty attached to artificial variables by the Big-M method.
pub const BIG_M: f64 = 1_000_000.0;

/// Pivot cap for the standard simplex method.
pub const SIMPLEX_MAX_ITERATIONS: usize = 50;

/// Pivot cap for the dual simplex method.
pub const DUAL_MAX_ITERATIONS: usize = 50;

/// Pivot cap for the Big-M method.
pub const BIG_M_MAX_ITERATIONS: usize = 20;

/// Parallel-line, feasibility and optimality tolerance.
pub const TOLERANCE: f64 = 1e-9;

/// Distance under which two graphical vertices are the same point.
pub const VERTEX_TOLERANCE: f64 = 1e-5;

/// Value above which a basic artificial variable makes Big-M infeasible.
/// Also used as the Big-M pivot tolerance, since entries scaled by `M`
/// carry round-off far above `TOLERANCE`.
pub const ARTIFICIAL_TOLERANCE: f64 = 1e-4;

/// Decimal places kept by the graphical method before comparing values.
pub const DISPLAY_DECIMALS: i32 = 5;

/// Cap on Hungarian matrix adjustments before giving up.
pub const ASSIGNMENT_MAX_ADJUSTMENTS: usize = 1_000;

/// Default cap on binary variables (2^16 combinations).
pub const BINARY_MAX_VARIABLES: usize = 16;

/// Hard ceiling for the binary enumeration cap.
pub const BINARY_VARIABLE_LIMIT: usize = 20;

/// Round `value` to `decimals` places, normalising `-0.0` to `0.0`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor + 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.234_567, 5), 1.234_57);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
        assert!(round_to(-0.000_001, 5).is_sign_positive());
    }
}
