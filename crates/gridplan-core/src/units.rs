//! Compile-time unit safety for power system quantities.
//!
//! Prevents mixing incompatible units like MW and MWh, or per-unit
//! impedance and per-unit admittance.
//!
//! # Zero Runtime Overhead
//!
//! All types use `#[repr(transparent)]` so they share `f64`'s layout;
//! the compiler optimizes away the wrapper entirely.
//!
//! ```
//! use gridplan_core::units::{Megawatts, Hours};
//!
//! let p = Megawatts(100.0);
//! let total = p + Megawatts(20.0);
//! assert_eq!(total.value(), 120.0);
//!
//! let weighting = Hours(3.0);
//! assert_eq!((weighting.value() * p.value()), 300.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            #[inline]
            pub fn clamp(self, min: Self, max: Self) -> Self {
                Self(self.0.clamp(min.0, max.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power in megawatts (MW).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);
impl_unit_ops!(Megawatts, "MW");

/// Energy in megawatt-hours (MWh), used for storage state of charge.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegawattHours(pub f64);
impl_unit_ops!(MegawattHours, "MWh");

impl Megawatts {
    /// Energy dispatched over a weighted snapshot: E = P * weighting.
    #[inline]
    pub fn over(self, duration: Hours) -> MegawattHours {
        MegawattHours(self.0 * duration.0)
    }
}

/// Voltage in kilovolts (kV), used for per-unit base conversions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);
impl_unit_ops!(Kilovolts, "kV");

/// A dimensionless per-unit quantity (voltage, impedance-ratio, etc).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);
impl_unit_ops!(PerUnit, "pu");

impl PerUnit {
    pub const ONE: Self = Self(1.0);
    pub const ZERO: Self = Self(0.0);
}

/// Angle in radians.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);
impl_unit_ops!(Radians, "rad");

impl Radians {
    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }

    pub const ZERO: Self = Self(0.0);
}

/// Impedance in per-unit, normalized to `v_nom^2 / s_base`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ImpedancePu(pub f64);
impl_unit_ops!(ImpedancePu, "pu");

/// Admittance in per-unit (Y = 1/Z).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AdmittancePu(pub f64);
impl_unit_ops!(AdmittancePu, "pu");

impl ImpedancePu {
    #[inline]
    pub fn to_admittance(self) -> AdmittancePu {
        if self.0.abs() < 1e-12 {
            AdmittancePu(f64::INFINITY)
        } else {
            AdmittancePu(1.0 / self.0)
        }
    }
}

impl AdmittancePu {
    #[inline]
    pub fn to_impedance(self) -> ImpedancePu {
        if self.0.abs() < 1e-12 {
            ImpedancePu(f64::INFINITY)
        } else {
            ImpedancePu(1.0 / self.0)
        }
    }
}

/// A duration in hours: the unit snapshot weightings are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Hours(pub f64);
impl_unit_ops!(Hours, "h");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megawatts_arithmetic() {
        let p1 = Megawatts(100.0);
        let p2 = Megawatts(50.0);

        assert_eq!((p1 + p2).value(), 150.0);
        assert_eq!((p1 - p2).value(), 50.0);
        assert_eq!((-p1).value(), -100.0);
        assert_eq!((p1 * 2.0).value(), 200.0);
        assert_eq!((2.0 * p1).value(), 200.0);
        assert_eq!((p1 / 2.0).value(), 50.0);
        assert_eq!(p1 / p2, 2.0);
    }

    #[test]
    fn test_energy_over_weighting() {
        let p = Megawatts(10.0);
        let e = p.over(Hours(3.0));
        assert_eq!(e.value(), 30.0);
    }

    #[test]
    fn test_impedance_admittance_roundtrip() {
        let z = ImpedancePu(0.1);
        let y = z.to_admittance();
        assert!((y.value() - 10.0).abs() < 1e-10);
        assert!((y.to_impedance().value() - 0.1).abs() < 1e-10);
    }

    #[test]
    fn test_sum_iterator() {
        let powers = vec![Megawatts(10.0), Megawatts(20.0), Megawatts(30.0)];
        let total: Megawatts = powers.into_iter().sum();
        assert_eq!(total.value(), 60.0);
    }

    #[test]
    fn test_min_max_clamp() {
        let p1 = Megawatts(100.0);
        let p2 = Megawatts(50.0);
        assert_eq!(p1.min(p2).value(), 50.0);
        assert_eq!(p1.max(p2).value(), 100.0);
        assert_eq!(
            Megawatts(150.0)
                .clamp(Megawatts(0.0), Megawatts(100.0))
                .value(),
            100.0
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Megawatts(100.0)), "100.0000 MW");
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
    }
}
