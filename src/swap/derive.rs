//! Price, direction and volume derivation from swap attributes.
//!
//! Prices are expressed in ZIG per whole subject token. Amounts are kept in
//! [`Decimal`] until the final ratio so base-unit scaling stays exact.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::models::{
    Direction, NATIVE_DENOM, NATIVE_EXPONENT, ParsedSwap, SwapAttributes, TokenContext,
};

/// Prices above this are candidates for micro-unit rescaling.
const MICRO_SCALE_TRIGGER: f64 = 1e4;

/// Scale factor between base and whole native units.
const MICRO: f64 = 1e6;

/// Parses a `reserves` attribute (`denom:amount,denom:amount`) in listed order.
///
/// Returns `None` unless at least two well-formed pairs are present.
pub fn parse_reserves(raw: &str) -> Option<Vec<(String, Decimal)>> {
    let pairs = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (denom, amount) = part.rsplit_once(':')?;
            let denom = denom.trim();
            if denom.is_empty() {
                return None;
            }
            let amount: Decimal = amount.trim().parse().ok()?;
            Some((denom.to_string(), amount))
        })
        .collect::<Option<Vec<_>>>()?;

    (pairs.len() >= 2).then_some(pairs)
}

/// Returns `true` if `denom` names the chain's native token.
pub fn is_native(denom: &str) -> bool {
    denom.contains(NATIVE_DENOM)
}

/// Undoes micro-unit artifacts in upstream prices.
///
/// A price above `1e4` whose value divided by `1e6` lands in `(0, 1e4)` is
/// assumed to have been emitted in micro-units and is divided by `1e6`.
pub fn normalize_micro_scale(price: f64) -> f64 {
    let rescaled = price / MICRO;
    if price > MICRO_SCALE_TRIGGER && rescaled > 0.0 && rescaled < MICRO_SCALE_TRIGGER {
        rescaled
    } else {
        price
    }
}

/// Converts a base-unit amount into whole units.
fn to_human(amount: Decimal, exponent: u32) -> Option<Decimal> {
    let mut human = amount;
    human.set_scale(amount.scale().checked_add(exponent)?).ok()?;
    Some(human)
}

/// Derives the unit price and direction from the pool reserves.
pub fn price_from_reserves(
    attrs: &SwapAttributes,
    token: &TokenContext,
) -> Option<(f64, Direction)> {
    let reserves = parse_reserves(attrs.get("reserves")?)?;

    let native = reserves
        .iter()
        .find(|(denom, _)| denom == NATIVE_DENOM)
        .or_else(|| reserves.iter().find(|(denom, _)| is_native(denom)))?;
    let subject = reserves
        .iter()
        .find(|(denom, _)| *denom == token.denom)
        .or_else(|| reserves.iter().find(|(denom, _)| denom != &native.0))?;

    let native_human = to_human(native.1, NATIVE_EXPONENT)?;
    let token_human = to_human(subject.1, token.exponent)?;
    if token_human.is_zero() {
        return None;
    }

    let price = native_human.checked_div(token_human)?.to_f64()?;
    if !(price.is_finite() && price > 0.0) {
        return None;
    }

    let direction = if is_native(&reserves[0].0) {
        Direction::Buy
    } else {
        Direction::Sell
    };

    Some((price, direction))
}

/// Reads the `belief_price` attribute as a plain decimal.
pub fn belief_price(attrs: &SwapAttributes) -> Option<f64> {
    let price = attrs.get("belief_price")?.parse::<Decimal>().ok()?.to_f64()?;
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Infers direction from which leg carried the native token.
pub fn direction_from_legs(attrs: &SwapAttributes) -> Option<Direction> {
    if attrs.get("offer_asset").is_some_and(is_native) {
        Some(Direction::Buy)
    } else if attrs.get("ask_asset").is_some_and(is_native) {
        Some(Direction::Sell)
    } else {
        None
    }
}

/// Amount of native token moved by the swap, in whole ZIG.
pub fn native_volume(attrs: &SwapAttributes) -> Option<f64> {
    let raw = if attrs.get("offer_asset").is_some_and(is_native) {
        attrs.get("offer_amount")?
    } else if attrs.get("ask_asset").is_some_and(is_native) {
        attrs.get("return_amount")?
    } else {
        return None;
    };

    let amount: Decimal = raw.parse().ok()?;
    let volume = to_human(amount, NATIVE_EXPONENT)?.to_f64()?;
    (volume.is_finite() && volume >= 0.0).then_some(volume)
}

/// Turns swap attributes into a ZIG-denominated trade print.
///
/// Swaps without a derivable price or direction are dropped.
pub fn derive_swap(
    attrs: &SwapAttributes,
    token: &TokenContext,
    timestamp_ms: i64,
) -> Option<ParsedSwap> {
    let (price, direction) = match price_from_reserves(attrs, token) {
        Some((price, direction)) => (price, Some(direction)),
        None => {
            let Some(price) = belief_price(attrs) else {
                debug!("Swap has neither usable reserves nor belief_price");
                return None;
            };
            (price, None)
        }
    };

    let Some(direction) = direction.or_else(|| direction_from_legs(attrs)) else {
        debug!(price, "Dropping swap without a derivable direction");
        return None;
    };

    Some(ParsedSwap {
        price: normalize_micro_scale(price),
        volume: native_volume(attrs).unwrap_or(0.0),
        direction,
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::EventAttribute;

    fn attrs(pairs: &[(&str, &str)]) -> SwapAttributes {
        SwapAttributes::new(
            pairs
                .iter()
                .map(|(k, v)| EventAttribute {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        )
    }

    fn token() -> TokenContext {
        TokenContext::new("tokenX", 6)
    }

    #[test]
    fn parses_reserves_in_order() {
        let reserves = parse_reserves("uzig:1000000, tokenX:500000").unwrap();
        assert_eq!(reserves[0], ("uzig".to_string(), dec!(1000000)));
        assert_eq!(reserves[1], ("tokenX".to_string(), dec!(500000)));
    }

    #[test]
    fn malformed_reserves_are_rejected() {
        assert!(parse_reserves("").is_none());
        assert!(parse_reserves("uzig:1000000").is_none());
        assert!(parse_reserves("uzig:abc,tokenX:1").is_none());
        assert!(parse_reserves("uzig1000000,tokenX:1").is_none());
    }

    #[test]
    fn price_uses_both_exponents() {
        let token = TokenContext::new("tokenX", 8);
        let a = attrs(&[("reserves", "uzig:2000000,tokenX:100000000")]);
        let (price, direction) = price_from_reserves(&a, &token).unwrap();
        assert!((price - 2.0).abs() < 1e-12);
        assert_eq!(direction, Direction::Buy);
    }

    #[test]
    fn direction_follows_first_listed_reserve() {
        let a = attrs(&[("reserves", "tokenX:500000,uzig:1000000")]);
        let (price, direction) = price_from_reserves(&a, &token()).unwrap();
        assert!((price - 2.0).abs() < 1e-12);
        assert_eq!(direction, Direction::Sell);
    }

    #[test]
    fn subject_falls_back_to_non_native_key() {
        let a = attrs(&[("reserves", "uzig:3000000,other:1000000")]);
        let (price, _) = price_from_reserves(&a, &token()).unwrap();
        assert!((price - 3.0).abs() < 1e-12);
    }

    #[test]
    fn belief_price_fallback_needs_a_leg_direction() {
        let with_leg = attrs(&[
            ("action", "swap"),
            ("belief_price", "0.25"),
            ("offer_asset", "uzig"),
            ("offer_amount", "4000000"),
        ]);
        let swap = derive_swap(&with_leg, &token(), 42).unwrap();
        assert_eq!(swap.price, 0.25);
        assert_eq!(swap.direction, Direction::Buy);
        assert_eq!(swap.volume, 4.0);
        assert_eq!(swap.timestamp_ms, 42);

        let no_leg = attrs(&[("action", "swap"), ("belief_price", "0.25")]);
        assert!(derive_swap(&no_leg, &token(), 42).is_none());
    }

    #[test]
    fn volume_comes_from_native_leg() {
        let sell = attrs(&[
            ("reserves", "tokenX:500000,uzig:1000000"),
            ("offer_asset", "tokenX"),
            ("ask_asset", "uzig"),
            ("offer_amount", "9000000"),
            ("return_amount", "2500000"),
        ]);
        let swap = derive_swap(&sell, &token(), 0).unwrap();
        assert_eq!(swap.volume, 2.5);
        assert_eq!(swap.direction, Direction::Sell);
    }

    #[test]
    fn missing_legs_yield_zero_volume() {
        let a = attrs(&[("reserves", "uzig:1000000,tokenX:500000")]);
        assert_eq!(derive_swap(&a, &token(), 0).unwrap().volume, 0.0);
    }

    #[test]
    fn micro_scale_normalization() {
        assert_eq!(normalize_micro_scale(2_500_000.0), 2.5);
        assert_eq!(normalize_micro_scale(9_999.0), 9_999.0);
        assert_eq!(normalize_micro_scale(0.001), 0.001);
        // Divided value would still be implausibly large.
        assert_eq!(normalize_micro_scale(2e10), 2e10);
    }
}
