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

use log::error;
use num_bigint::BigUint;
use semver::Version;

use super::{settings::HostDbSettings, HostEntry};
use crate::currency::Currency;

/// Number of times the collateral is multiplied into the weight.
const COLLATERAL_EXPONENTIATION: usize = 2;

/// Number of times the weight is divided by the adjusted price.
const PRICE_EXPONENTIATION: usize = 4;

/// Hosts below this version take a 5x penalty.
fn min_recommended_version() -> Version {
    Version::new(0, 4, 1)
}

/// Hosts below this version take a further 20x penalty.
fn min_supported_version() -> Version {
    Version::new(0, 4, 0)
}

/// Because most weights would otherwise be fractional, the base weight
/// is set very large so the repeated divisions below retain precision.
fn base_weight() -> Currency {
    Currency(BigUint::from(10u32).pow(20))
}

/// Minimum price. Setting prices below this bar buys no additional
/// score, which closes the Sybil vector of escaping collateral burn by
/// advertising absurdly cheap storage.
fn min_div_price() -> Currency {
    Currency::coins(250)
}

/// Reduces the raw price divisor so the weight needs far fewer digits
/// when operated on. Also lets the base weight stay a lot lower.
fn price_div_normalization() -> Currency {
    Currency::coins(1).div_u64(100)
}

/// Improve the host's weight according to the collateral it pledges.
fn collateral_adjustments(entry: &HostEntry, mut weight: Currency) -> Currency {
    if entry.collateral.is_zero() {
        // Instead of zeroing out the weight, treat the collateral as a
        // single base unit. Competitively speaking that is still zero,
        // but the host cannot erase its score this way.
        return weight
    }
    for _ in 0..COLLATERAL_EXPONENTIATION {
        weight = weight.mul(&entry.collateral);
    }
    weight
}

/// Adjust the weight according to the prices the host has set.
///
/// Amortization assumptions: a contract covers 6048 blocks and 10 GB
/// of storage, an upload happens once per 24192 blocks, a download
/// once per 12096 blocks. The network fee is charged on top.
fn price_adjustments(entry: &HostEntry, mut weight: Currency) -> Currency {
    let adjusted_contract = entry.contract_price.div_u64(6048).div_u64(10_000_000_000);
    let adjusted_upload = entry.upload_price.div_u64(24192);
    let adjusted_download = entry.download_price.div_u64(12096);

    let fee = adjusted_contract
        .add(&adjusted_upload)
        .add(&adjusted_download)
        .add(&entry.collateral)
        .mul_tax();

    let total_price = entry
        .storage_price
        .add(&adjusted_contract)
        .add(&adjusted_upload)
        .add(&adjusted_download)
        .add(&fee);

    // Floor the divisor, then shrink it so the arithmetic is a lot
    // less intense. The floor keeps the divisor nonzero.
    let mut div_price = total_price;
    if div_price < min_div_price() {
        div_price = min_div_price();
    }
    let div_price = div_price.div(&price_div_normalization());

    for _ in 0..PRICE_EXPONENTIATION {
        weight = weight.div(&div_price);
    }
    weight
}

/// Penalize hosts that are running out of storage to sell. The tiers
/// stack, so a nearly full host ends up multiple orders of magnitude
/// below a roomy one.
fn storage_remaining_adjustments(
    entry: &HostEntry,
    mut weight: Currency,
    required_storage: u64,
) -> Currency {
    let remaining = entry.remaining_storage as u128;
    let required = required_storage as u128;

    if remaining < 200 * required {
        weight = weight.div_u64(2);
    }
    if remaining < 100 * required {
        weight = weight.div_u64(3);
    }
    if remaining < 50 * required {
        weight = weight.div_u64(4);
    }
    if remaining < 25 * required {
        weight = weight.div_u64(5);
    }
    if remaining < 10 * required {
        weight = weight.div_u64(6);
    }
    if remaining < 5 * required {
        weight = weight.div_u64(10);
    }
    if remaining < required {
        weight = weight.div_u64(100);
    }
    weight
}

/// Penalize hosts running outdated software. A version that does not
/// parse takes both penalties.
fn version_adjustments(entry: &HostEntry, mut weight: Currency) -> Currency {
    let version = Version::parse(&entry.version).unwrap_or_else(|_| Version::new(0, 0, 0));
    if version < min_recommended_version() {
        weight = weight.div_u64(5);
    }
    if version < min_supported_version() {
        weight = weight.div_u64(20); // 100x total penalty
    }
    weight
}

/// Reward hosts that have been announced for a long time. Young hosts
/// start out heavily discounted and shed the penalty tiers as the
/// chain grows past their first-seen height.
fn lifetime_adjustments(entry: &HostEntry, mut weight: Currency, height: u32) -> Currency {
    if height >= entry.first_seen {
        let age = height - entry.first_seen;
        if age < 6000 {
            weight = weight.div_u64(2);
        }
        if age < 4000 {
            weight = weight.div_u64(2);
        }
        if age < 2000 {
            weight = weight.div_u64(4);
        }
        if age < 1000 {
            weight = weight.div_u64(4);
        }
        if age < 288 {
            weight = weight.div_u64(10); // 640x total penalty
        }
    } else {
        // Cannot happen while consensus changes arrive in order. Trust
        // this host very little and flag the inconsistency loudly.
        error!(
            target: "hostdb::weight::lifetime_adjustments()",
            "CRITICAL: host {} first seen at height {} above current height {}",
            entry.public_key, entry.first_seen, height
        );
        weight = weight.div_u64(1000);
    }
    weight
}

/// Score a host entry at the given chain height. The returned weight
/// biases random host selection and is always strictly positive.
pub fn calculate_host_weight(
    entry: &HostEntry,
    height: u32,
    settings: &HostDbSettings,
) -> Currency {
    let mut weight = base_weight();
    weight = collateral_adjustments(entry, weight);
    weight = price_adjustments(entry, weight);
    weight = storage_remaining_adjustments(entry, weight, settings.required_storage);
    weight = version_adjustments(entry, weight);
    weight = lifetime_adjustments(entry, weight, height);

    // A weight of zero breaks the sampling structure invariant.
    if weight.is_zero() {
        return Currency::from(1)
    }
    weight
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::chain::HostPublicKey;

    // Collateral of 3 * 10^12 base units keeps every division in the
    // pipeline exact: the weight entering the storage stage is
    // 3^2 * 2^32 * 5^24, which the stacked tier divisors divide evenly.
    fn test_entry() -> HostEntry {
        let mut entry = HostEntry::new(
            HostPublicKey([1u8; 32]),
            Url::parse("tcp://host.example.com:7777").unwrap(),
            0,
        );
        entry.collateral = Currency::from(3_000_000_000_000);
        entry.remaining_storage = 1_000_000_000_000;
        entry.version = "0.4.1".to_string();
        entry
    }

    fn settings() -> HostDbSettings {
        HostDbSettings::production()
    }

    const HEIGHT: u32 = 10000;

    #[test]
    fn weight_never_zero() {
        let mut entry = test_entry();
        entry.collateral = Currency::zero();
        entry.remaining_storage = 0;
        entry.version = String::new();
        entry.first_seen = HEIGHT;

        let weight = calculate_host_weight(&entry, HEIGHT, &settings());
        assert!(weight > Currency::zero());

        // Even an absurd price cannot push the weight to zero
        entry.storage_price = Currency::coins(u64::MAX);
        let weight = calculate_host_weight(&entry, HEIGHT, &settings());
        assert!(weight > Currency::zero());
    }

    #[test]
    fn collateral_zero_equals_one_base_unit() {
        let mut zero = test_entry();
        zero.collateral = Currency::zero();
        let mut one = test_entry();
        one.collateral = Currency::from(1);

        assert_eq!(
            calculate_host_weight(&zero, HEIGHT, &settings()),
            calculate_host_weight(&one, HEIGHT, &settings()),
        );
    }

    #[test]
    fn higher_collateral_wins() {
        let low = test_entry();
        let mut high = test_entry();
        high.collateral = Currency::from(6_000_000_000_000);

        assert!(
            calculate_host_weight(&high, HEIGHT, &settings()) >
                calculate_host_weight(&low, HEIGHT, &settings())
        );
    }

    #[test]
    fn higher_prices_lose() {
        let cheap = test_entry();
        let mut pricey = test_entry();
        pricey.storage_price = Currency::coins(100_000);

        assert!(
            calculate_host_weight(&cheap, HEIGHT, &settings()) >
                calculate_host_weight(&pricey, HEIGHT, &settings())
        );
    }

    #[test]
    fn prices_below_floor_buy_nothing() {
        // Both prices sit below the minimum divisor, so they score the
        // same despite one being cheaper.
        let mut a = test_entry();
        a.storage_price = Currency::coins(1);
        let mut b = test_entry();
        b.storage_price = Currency::coins(200);

        assert_eq!(
            calculate_host_weight(&a, HEIGHT, &settings()),
            calculate_host_weight(&b, HEIGHT, &settings()),
        );
    }

    #[test]
    fn storage_tiers_stack_monotonically() {
        // required_storage is 5 * 10^9, tiers start at 200x that.
        let steps: Vec<u64> = vec![
            2_000_000_000_000, // above every tier
            900_000_000_000,
            400_000_000_000,
            200_000_000_000,
            100_000_000_000,
            40_000_000_000,
            20_000_000_000,
            4_000_000_000, // below the 1x tier
        ];

        let mut last: Option<Currency> = None;
        for remaining in steps {
            let mut entry = test_entry();
            entry.remaining_storage = remaining;
            let weight = calculate_host_weight(&entry, HEIGHT, &settings());
            if let Some(prev) = last {
                assert!(weight < prev, "weight must strictly drop at {} bytes", remaining);
            }
            last = Some(weight);
        }
    }

    #[test]
    fn storage_tier_penalties_are_exact() {
        // All seven tiers crossed
        let mut starving = test_entry();
        starving.remaining_storage = 4_000_000_000;
        // First six tiers crossed, 1x tier not
        let mut tight = test_entry();
        tight.remaining_storage = 6_000_000_000;
        // No tiers crossed
        let mut roomy = test_entry();
        roomy.remaining_storage = 1_000_000_000_000;

        let starving = calculate_host_weight(&starving, HEIGHT, &settings());
        let tight = calculate_host_weight(&tight, HEIGHT, &settings());
        let roomy = calculate_host_weight(&roomy, HEIGHT, &settings());

        // The final tier is worth exactly 100x, the full stack 720000x
        assert_eq!(starving.mul(&Currency::from(100)), tight);
        assert_eq!(starving.mul(&Currency::from(720_000)), roomy);
    }

    #[test]
    fn version_tiers_stack_to_100x() {
        let current = test_entry();
        let mut stale = test_entry();
        stale.version = "0.4.0".to_string();
        let mut ancient = test_entry();
        ancient.version = "0.3.9".to_string();
        let mut garbage = test_entry();
        garbage.version = "not-a-version".to_string();

        let current = calculate_host_weight(&current, HEIGHT, &settings());
        let stale = calculate_host_weight(&stale, HEIGHT, &settings());
        let ancient = calculate_host_weight(&ancient, HEIGHT, &settings());
        let garbage = calculate_host_weight(&garbage, HEIGHT, &settings());

        assert_eq!(stale.mul(&Currency::from(5)), current);
        assert_eq!(ancient.mul(&Currency::from(100)), current);
        assert_eq!(garbage, ancient);
    }

    #[test]
    fn longevity_is_rewarded() {
        let old = test_entry();
        let mut adult = test_entry();
        adult.first_seen = HEIGHT - 5000;
        let mut newborn = test_entry();
        newborn.first_seen = HEIGHT - 100;

        let old = calculate_host_weight(&old, HEIGHT, &settings());
        let adult = calculate_host_weight(&adult, HEIGHT, &settings());
        let newborn = calculate_host_weight(&newborn, HEIGHT, &settings());

        assert_eq!(adult.mul(&Currency::from(2)), old);
        assert_eq!(newborn.mul(&Currency::from(640)), old);
    }

    #[test]
    fn future_first_seen_is_penalized() {
        let sane = test_entry();
        let mut weird = test_entry();
        weird.first_seen = HEIGHT + 1;

        let sane = calculate_host_weight(&sane, HEIGHT, &settings());
        let weird = calculate_host_weight(&weird, HEIGHT, &settings());

        assert_eq!(weird.mul(&Currency::from(1000)), sane);
    }
}
