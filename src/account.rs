//! Accounts
//!
//! Per-currency balances with cash and margin variants. Cash accounts
//! require order cost to be fully backed by free balance; margin accounts
//! lock initial margin scaled by leverage and track per-instrument margin
//! separately.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::enums::{AccountType, OrderSide};
use crate::identifiers::{AccountId, InstrumentId};
use crate::instrument::Instrument;
use crate::money::Money;

/// Balance snapshot for one currency: `free = max(0, total - locked)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub total: Money,
    pub locked: Money,
    pub free: Money,
}

impl AccountBalance {
    pub fn new(currency: Currency, total: Decimal, locked: Decimal) -> Self {
        let free = (total - locked).max(Decimal::ZERO);
        Self {
            total: Money::new(total, currency.clone()),
            locked: Money::new(locked, currency.clone()),
            free: Money::new(free, currency),
        }
    }
}

/// Trading account holding per-currency balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_type: AccountType,
    pub base_currency: Currency,
    /// Leverage divisor for margin accounts (1 = unlevered).
    pub leverage: Decimal,
    /// Fallback initial margin ratio when the instrument carries none.
    pub default_margin_init: Decimal,
    balances: IndexMap<Currency, AccountBalance>,
    /// Cumulative commissions paid, per currency.
    commissions: IndexMap<Currency, Decimal>,
    /// Initial margin locked per instrument (margin accounts).
    margin_locked: IndexMap<InstrumentId, Decimal>,
}

impl Account {
    pub fn cash(id: AccountId, base_currency: Currency) -> Self {
        Self {
            id,
            account_type: AccountType::Cash,
            base_currency,
            leverage: Decimal::ONE,
            default_margin_init: Decimal::ZERO,
            balances: IndexMap::new(),
            commissions: IndexMap::new(),
            margin_locked: IndexMap::new(),
        }
    }

    pub fn margin(id: AccountId, base_currency: Currency, leverage: Decimal) -> Self {
        Self {
            id,
            account_type: AccountType::Margin,
            base_currency,
            leverage,
            default_margin_init: Decimal::new(5, 2), // 0.05
            balances: IndexMap::new(),
            commissions: IndexMap::new(),
            margin_locked: IndexMap::new(),
        }
    }

    // === Balance management ===

    /// Set a currency's total and locked amounts; free is derived.
    pub fn update_balance(&mut self, currency: Currency, total: Decimal, locked: Decimal) {
        self.balances
            .insert(currency.clone(), AccountBalance::new(currency, total, locked));
    }

    pub fn balance(&self, currency: &Currency) -> Option<&AccountBalance> {
        self.balances.get(currency)
    }

    pub fn balance_total(&self, currency: &Currency) -> Option<&Money> {
        self.balances.get(currency).map(|b| &b.total)
    }

    pub fn balance_free(&self, currency: &Currency) -> Option<&Money> {
        self.balances.get(currency).map(|b| &b.free)
    }

    pub fn balances(&self) -> &IndexMap<Currency, AccountBalance> {
        &self.balances
    }

    /// Add to total balance (proceeds, credits).
    pub fn credit(&mut self, amount: Decimal, currency: &Currency) {
        let (total, locked) = match self.balances.get(currency) {
            Some(b) => (b.total.amount + amount, b.locked.amount),
            None => (amount, Decimal::ZERO),
        };
        self.update_balance(currency.clone(), total, locked);
    }

    /// Subtract from total balance, clamping at zero.
    pub fn debit(&mut self, amount: Decimal, currency: &Currency) {
        let (total, locked) = match self.balances.get(currency) {
            Some(b) => ((b.total.amount - amount).max(Decimal::ZERO), b.locked.amount),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        self.update_balance(currency.clone(), total, locked);
    }

    // === Fill settlement ===

    /// Apply a fill in the account's base currency:
    /// BUY debits `qty*px + commission`; SELL credits `qty*px - commission`.
    pub fn apply_fill(
        &mut self,
        side: OrderSide,
        qty: Decimal,
        px: Decimal,
        commission: Decimal,
    ) {
        let currency = self.base_currency.clone();
        match side {
            OrderSide::Buy => self.debit(qty * px + commission, &currency),
            OrderSide::Sell => self.credit(qty * px - commission, &currency),
        }
        self.add_commission(commission, &currency);
    }

    pub fn add_commission(&mut self, amount: Decimal, currency: &Currency) {
        *self
            .commissions
            .entry(currency.clone())
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn commissions(&self, currency: &Currency) -> Decimal {
        self.commissions
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_commissions(&self) -> Decimal {
        self.commissions.values().copied().sum()
    }

    // === Margin ===

    pub fn update_margin(&mut self, instrument_id: InstrumentId, initial: Decimal) {
        if initial.is_zero() {
            self.margin_locked.shift_remove(&instrument_id);
        } else {
            self.margin_locked.insert(instrument_id, initial);
        }
    }

    pub fn total_margin_locked(&self) -> Decimal {
        self.margin_locked.values().copied().sum()
    }

    // === Pre-trade checking ===

    /// Required balance to admit an order at `price`:
    /// cash = `qty * price`; margin = `qty * price * margin_init / leverage`.
    pub fn order_cost(&self, instrument: Option<&Instrument>, qty: Decimal, price: Decimal) -> Decimal {
        match self.account_type {
            AccountType::Cash => qty * price,
            AccountType::Margin => {
                let margin_init = instrument
                    .map(|i| i.margin_init)
                    .filter(|m| !m.is_zero())
                    .unwrap_or(self.default_margin_init);
                qty * price * margin_init / self.leverage
            }
        }
    }

    /// Check free balance covers the order cost. Returns a reject reason on
    /// failure.
    pub fn can_submit_order(
        &self,
        instrument: Option<&Instrument>,
        qty: Decimal,
        price: Decimal,
    ) -> Result<(), String> {
        let required = self.order_cost(instrument, qty, price);
        let free = self
            .balance_free(&self.base_currency)
            .map(|m| m.amount)
            .unwrap_or(Decimal::ZERO);
        if free < required {
            return Err(format!(
                "insufficient balance: need {required} {}, have {free}",
                self.base_currency
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::usd;
    use crate::identifiers::Venue;
    use crate::money::{Price, Quantity};
    use rust_decimal_macros::dec;

    fn cash_account(balance: Decimal) -> Account {
        let mut account = Account::cash(AccountId::new("SIM-001").unwrap(), usd());
        account.update_balance(usd(), balance, dec!(0));
        account
    }

    #[test]
    fn test_free_is_total_minus_locked() {
        let mut account = cash_account(dec!(1000));
        account.update_balance(usd(), dec!(1000), dec!(300));
        let bal = account.balance(&usd()).unwrap();
        assert_eq!(bal.total.amount, dec!(1000));
        assert_eq!(bal.locked.amount, dec!(300));
        assert_eq!(bal.free.amount, dec!(700));
    }

    #[test]
    fn test_buy_fill_debits_cost_plus_commission() {
        let mut account = cash_account(dec!(100000));
        account.apply_fill(OrderSide::Buy, dec!(10), dec!(100), dec!(2.50));
        assert_eq!(
            account.balance_total(&usd()).unwrap().amount,
            dec!(98997.50)
        );
        assert_eq!(account.commissions(&usd()), dec!(2.50));
    }

    #[test]
    fn test_sell_fill_credits_proceeds_net_of_commission() {
        let mut account = cash_account(dec!(99000));
        account.apply_fill(OrderSide::Sell, dec!(10), dec!(94), dec!(0));
        assert_eq!(account.balance_total(&usd()).unwrap().amount, dec!(99940));
    }

    #[test]
    fn test_cash_pre_trade_check() {
        let account = cash_account(dec!(1000));
        assert!(account.can_submit_order(None, dec!(10), dec!(100)).is_ok());
        assert!(account.can_submit_order(None, dec!(11), dec!(100)).is_err());
    }

    #[test]
    fn test_margin_pre_trade_check_scales_with_leverage() {
        let mut account = Account::margin(AccountId::new("SIM-001").unwrap(), usd(), dec!(10));
        account.update_balance(usd(), dec!(1000), dec!(0));

        let mut instrument = Instrument::new(
            InstrumentId::new("AAPL", Venue::new("SIM").unwrap()).unwrap(),
            usd(),
            2,
            0,
            Price::new(dec!(0.01), 2),
            Quantity::new(dec!(1), 0).unwrap(),
            dec!(0),
            dec!(0),
        );
        instrument.margin_init = dec!(0.10);

        // 100 * 1000 * 0.10 / 10 = 1000 required, exactly at the limit.
        assert!(account
            .can_submit_order(Some(&instrument), dec!(100), dec!(1000))
            .is_ok());
        assert!(account
            .can_submit_order(Some(&instrument), dec!(101), dec!(1000))
            .is_err());
    }
}
