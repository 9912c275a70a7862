//! Wallet balance mutation guard.
//!
//! Every create, edit and delete of a transaction moves its wallet balance
//! through [`apply`] and [`reverse`]. Amounts are exact decimals at
//! [`LEDGER_SCALE`] fractional digits, so an apply followed by a reverse of
//! the same effect always nets to zero.

use rust_decimal::Decimal;

use crate::errors::{Result, ValidationError};
use crate::transactions::Transaction;

/// Fractional digits carried by balances and amounts.
pub const LEDGER_SCALE: u32 = 2;

/// Rejects amounts finer than the ledger scale and pads the rest to it.
pub fn normalize_amount(amount: Decimal) -> std::result::Result<Decimal, ValidationError> {
    if amount.normalize().scale() > LEDGER_SCALE {
        return Err(ValidationError::invalid_field(
            "amount",
            format!("at most {} decimal places are allowed", LEDGER_SCALE),
        ));
    }
    let mut scaled = amount;
    scaled.rescale(LEDGER_SCALE);
    Ok(scaled)
}

/// The (wallet, amount, income flag) triple a transaction contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEffect {
    pub wallet_id: String,
    pub amount: Decimal,
    pub is_income: bool,
}

impl BalanceEffect {
    pub fn new(wallet_id: impl Into<String>, amount: Decimal, is_income: bool) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            amount,
            is_income,
        }
    }

    pub fn of(transaction: &Transaction) -> Self {
        Self::new(
            transaction.wallet_id.clone(),
            transaction.amount,
            transaction.is_income,
        )
    }

    /// Signed change this effect makes to its wallet when applied.
    pub fn delta(&self) -> Decimal {
        if self.is_income {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn applied_to(&self, balance: Decimal) -> Decimal {
        balance + self.delta()
    }

    pub fn reversed_from(&self, balance: Decimal) -> Decimal {
        balance - self.delta()
    }
}

/// Storage that can atomically shift a wallet balance by a signed delta.
pub trait BalanceStore {
    fn adjust_balance(&mut self, wallet_id: &str, delta: Decimal) -> Result<()>;
}

pub fn apply<S: BalanceStore + ?Sized>(store: &mut S, effect: &BalanceEffect) -> Result<()> {
    store.adjust_balance(&effect.wallet_id, effect.delta())
}

pub fn reverse<S: BalanceStore + ?Sized>(store: &mut S, effect: &BalanceEffect) -> Result<()> {
    store.adjust_balance(&effect.wallet_id, -effect.delta())
}

/// Edit path: undo the old triple, then apply the new one, even across wallets.
pub fn reapply<S: BalanceStore + ?Sized>(
    store: &mut S,
    old: &BalanceEffect,
    new: &BalanceEffect,
) -> Result<()> {
    reverse(store, old)?;
    apply(store, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryBalances {
        balances: HashMap<String, Decimal>,
        calls: Vec<(String, Decimal)>,
    }

    impl BalanceStore for MemoryBalances {
        fn adjust_balance(&mut self, wallet_id: &str, delta: Decimal) -> Result<()> {
            *self.balances.entry(wallet_id.to_string()).or_default() += delta;
            self.calls.push((wallet_id.to_string(), delta));
            Ok(())
        }
    }

    #[test]
    fn expense_subtracts_and_income_adds() {
        let mut store = MemoryBalances::default();
        apply(&mut store, &BalanceEffect::new("w", dec!(25.00), false)).unwrap();
        apply(&mut store, &BalanceEffect::new("w", dec!(100.00), true)).unwrap();
        assert_eq!(store.balances["w"], dec!(75.00));
    }

    #[test]
    fn apply_then_reverse_is_exact_for_repeating_decimals() {
        let mut store = MemoryBalances::default();
        let effect = BalanceEffect::new("w", dec!(0.10), true);
        for _ in 0..3 {
            apply(&mut store, &effect).unwrap();
        }
        assert_eq!(store.balances["w"], dec!(0.30));
        for _ in 0..3 {
            reverse(&mut store, &effect).unwrap();
        }
        assert!(store.balances["w"].is_zero());
    }

    #[test]
    fn reverse_then_apply_also_nets_to_zero() {
        let mut store = MemoryBalances::default();
        let effect = BalanceEffect::new("w", dec!(19.99), false);
        reverse(&mut store, &effect).unwrap();
        apply(&mut store, &effect).unwrap();
        assert!(store.balances["w"].is_zero());
    }

    #[test]
    fn reapply_reverses_old_wallet_before_applying_new() {
        let mut store = MemoryBalances::default();
        let old = BalanceEffect::new("cash", dec!(40.00), false);
        let new = BalanceEffect::new("bank", dec!(15.50), true);
        apply(&mut store, &old).unwrap();
        reapply(&mut store, &old, &new).unwrap();

        assert!(store.balances["cash"].is_zero());
        assert_eq!(store.balances["bank"], dec!(15.50));
        assert_eq!(
            store.calls[1..],
            [
                ("cash".to_string(), dec!(40.00)),
                ("bank".to_string(), dec!(15.50))
            ]
        );
    }

    #[test]
    fn pure_helpers_are_inverse() {
        let effect = BalanceEffect::new("w", dec!(3.33), false);
        let balance = dec!(10.00);
        assert_eq!(effect.reversed_from(effect.applied_to(balance)), balance);
    }

    #[test]
    fn normalize_amount_enforces_scale() {
        assert_eq!(normalize_amount(dec!(7)).unwrap().to_string(), "7.00");
        assert_eq!(normalize_amount(dec!(7.100)).unwrap().to_string(), "7.10");
        assert!(normalize_amount(dec!(0.001)).is_err());
    }
}
