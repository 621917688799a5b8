/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::fmt;

use darkfi_serial::{SerialDecodable, SerialEncodable};
use num_bigint::BigUint;

/// Decimal places of the currency. One coin is 10^24 base units.
pub const COIN_DECIMALS: u32 = 24;

/// Proportional network fee charged on contract-related spending,
/// expressed as parts per thousand.
pub const TAX_PER_MILLE: u64 = 39;

/// Arbitrary-precision fixed-point currency amount, counted in
/// indivisible base units. Host prices, collateral and the derived
/// selection weights are all `Currency` values, since weighting
/// multiplies amounts far past any primitive integer range.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, SerialEncodable, SerialDecodable)]
pub struct Currency(pub BigUint);

impl Currency {
    pub fn zero() -> Self {
        Self(BigUint::from(0u32))
    }

    /// Amount of `n` whole coins.
    pub fn coins(n: u64) -> Self {
        Self(BigUint::from(n) * BigUint::from(10u32).pow(COIN_DECIMALS))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::from(0u32)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self(&self.0 * &other.0)
    }

    /// Flooring division. Panics on a zero divisor, callers guarantee
    /// the divisor is nonzero.
    pub fn div(&self, other: &Self) -> Self {
        Self(&self.0 / &other.0)
    }

    pub fn div_u64(&self, d: u64) -> Self {
        Self(&self.0 / BigUint::from(d))
    }

    /// The network fee charged on top of this amount.
    pub fn mul_tax(&self) -> Self {
        Self(&self.0 * BigUint::from(TAX_PER_MILLE) / BigUint::from(1000u32))
    }
}

impl From<u64> for Currency {
    fn from(n: u64) -> Self {
        Self(BigUint::from(n))
    }
}

impl From<BigUint> for Currency {
    fn from(n: BigUint) -> Self {
        Self(n)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_arithmetic() {
        let a = Currency::from(600u64);
        let b = Currency::from(7u64);

        assert_eq!(a.add(&b), Currency::from(607));
        assert_eq!(a.mul(&b), Currency::from(4200));
        assert_eq!(a.div(&b), Currency::from(85));
        assert_eq!(a.div_u64(600), Currency::from(1));
        assert_eq!(Currency::zero().add(&b), b);
        assert!(Currency::zero().is_zero());
        assert!(!b.is_zero());
    }

    #[test]
    fn currency_tax() {
        // 3.9% of 1000 base units
        assert_eq!(Currency::from(1000).mul_tax(), Currency::from(39));
        // Fees on amounts below the tax granularity round down to zero
        assert_eq!(Currency::from(25).mul_tax(), Currency::zero());
        assert_eq!(Currency::coins(1).mul_tax(), Currency::coins(39).div_u64(1000));
    }

    #[test]
    fn currency_ordering() {
        assert!(Currency::coins(1) > Currency::from(u64::MAX));
        assert!(Currency::from(1) < Currency::from(2));
    }
}
