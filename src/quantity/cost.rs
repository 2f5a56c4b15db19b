use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Minor currency units (pence).
pub type Cost = Quantity<f64, 0, 0, 1>;

impl Cost {
    pub const fn from_pence(pence: f64) -> Self {
        Self(pence)
    }

    pub fn to_pounds(self) -> f64 {
        self.0 / 100.0
    }

    /// Round the cost to four decimal places.
    ///
    /// Ties are broken away from zero on the binary value, so a decimal tie that is stored
    /// slightly below the midpoint rounds down, the same as `{:.4}` formatting would.
    #[must_use]
    pub fn round_to_ten_thousandths(self) -> Self {
        Self((self.0 * 10_000.0).round() / 10_000.0)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "£{:.2}", self.to_pounds())
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}p", self.0)
    }
}
