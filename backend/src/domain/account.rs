use rand::Rng;

use types::domain::Account;
use types::error::Error;

pub const DEFAULT_BALANCE: i64 = 1000;

/// Account tokens look like `SIM-CA-123-4567`.
pub fn generate_token<R: Rng>(rng: &mut R) -> String {
    format!(
        "SIM-CA-{}-{}",
        rng.gen_range(100..=999),
        rng.gen_range(1000..=9999)
    )
}

// both balances change or neither does; caller holds both rows locked
pub fn settle(sender: &mut Account, receiver: &mut Account, amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount);
    }
    if sender.user_id == receiver.user_id {
        return Err(Error::SelfTransfer);
    }
    if sender.balance < amount {
        return Err(Error::InsufficientFunds);
    }
    let credited = receiver
        .balance
        .checked_add(amount)
        .ok_or(Error::InvalidAmount)?;
    sender.balance -= amount;
    receiver.balance = credited;
    Ok(())
}
