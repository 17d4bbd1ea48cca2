use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::recipient::ServiceOptions;

/// Commission rate (percent) applied to guided-recipient prices.
pub const GUIDED_COMMISSION_RATE: Decimal = dec!(15);
/// Secondary platform fee, as a percent of the commission.
pub const PLATFORM_FEE_RATE: Decimal = dec!(5);
/// Flat surcharge for rush service.
pub const RUSH_SURCHARGE: Decimal = dec!(50);
/// Flat surcharge for remote-area service.
pub const REMOTE_SURCHARGE: Decimal = dec!(40);

const ONE_HUNDRED: Decimal = dec!(100);

/// The two ways a price enters the platform. On the bidding path the bid
/// amount is the gross the customer pays; on the guided path the agreed
/// amount is the agent's payout and the customer pays the markup on top.
/// The asymmetry is intentional legacy behavior and must not be unified
/// without product sign-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingPath {
    Bidding,
    Guided,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentSplit {
    pub customer_payment: Decimal,
    pub agent_payout: Decimal,
    pub platform_commission: Decimal,
    pub platform_fee: Decimal,
    pub tenant_profit: Decimal,
}

/// Five-way split of a base amount at the given commission rate (percent).
pub fn split(base: Decimal, rate_percent: Decimal, path: PricingPath) -> PaymentSplit {
    let platform_commission = round2(base * rate_percent / ONE_HUNDRED);
    let platform_fee = round2(platform_commission * PLATFORM_FEE_RATE / ONE_HUNDRED);
    let tenant_profit = platform_commission - platform_fee;

    let (customer_payment, agent_payout) = match path {
        PricingPath::Bidding => (base, base - platform_commission),
        PricingPath::Guided => (base + platform_commission + platform_fee, base),
    };

    PaymentSplit {
        customer_payment,
        agent_payout,
        platform_commission,
        platform_fee,
        tenant_profit,
    }
}

/// Flat surcharges owed for the selected service options.
pub fn surcharges(options: &ServiceOptions) -> (Decimal, Decimal) {
    let rush = if options.rush { RUSH_SURCHARGE } else { Decimal::ZERO };
    let remote = if options.remote { REMOTE_SURCHARGE } else { Decimal::ZERO };
    (rush, remote)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
