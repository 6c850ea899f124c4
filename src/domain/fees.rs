//! Fee calculation.
//!
//! [`compute_fees`] is the only place a service fee is derived. The quote
//! rendered to the customer and the amount sent to the payment processor both
//! come from it, so the two can never disagree.

use crate::domain::money::{Amount, Cents};
use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Percentage part of the customer service fee (2.9%).
pub const SERVICE_FEE_RATE: Decimal = dec!(0.029);
/// Fixed part of the customer service fee, in cents.
pub const SERVICE_FEE_FIXED: Cents = Cents(30);
/// Platform cut taken from the expert's net price.
pub const MARKETPLACE_FEE_RATE: Decimal = dec!(0.2);
/// Highest price whose total, fee included, still fits in
/// [`MAX_AMOUNT`](crate::domain::money::MAX_AMOUNT).
pub const MAX_PRICE_PER_SUBMISSION: Decimal = dec!(971817.00);

/// Price summary shown to the customer before paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub price_per_submission: Amount,
    pub service_fee: Amount,
    pub total: Amount,
}

/// Computes the service fee and total for a base price.
///
/// `service_fee = round2(price * 0.029 + 0.30)` with half-up rounding on
/// cents, and `total = price + service_fee`. The arithmetic runs on integer
/// cents, so `19.99` yields a fee of `0.88`, not a binary-float artefact.
pub fn compute_fees(price_per_submission: Decimal) -> Result<FeeQuote> {
    let price = Amount::new(price_per_submission)?;
    if price.value() > MAX_PRICE_PER_SUBMISSION {
        return Err(BookingError::InvalidAmount(format!(
            "{price} exceeds the maximum price per submission of {MAX_PRICE_PER_SUBMISSION}"
        )));
    }
    let price_cents = price.to_cents();

    let fee_cents = Cents::round_half_up(
        Decimal::from(price_cents.value()) * SERVICE_FEE_RATE
            + Decimal::from(SERVICE_FEE_FIXED.value()),
    )?;

    Ok(FeeQuote {
        price_per_submission: price,
        service_fee: fee_cents.to_amount()?,
        total: (price_cents + fee_cents).to_amount()?,
    })
}

/// How an authorized total is divided between the platform and the expert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChargeBreakdown {
    /// Full amount held on the customer's instrument.
    pub amount: Cents,
    /// Customer-facing service fee.
    pub service_fee: Cents,
    /// 20% of the expert's net price.
    pub marketplace_fee: Cents,
    /// `marketplace_fee + service_fee`, routed to the platform.
    pub application_fee: Cents,
    /// Remainder earmarked for the expert's payout account.
    pub payout: Cents,
}

impl ChargeBreakdown {
    pub fn new(total: Amount, service_fee: Amount) -> Result<Self> {
        let amount = total.to_cents();
        let service_fee = service_fee.to_cents();
        if service_fee >= amount {
            return Err(BookingError::InvalidAmount(format!(
                "service fee {service_fee} must be below the total {amount} (cents)"
            )));
        }

        let marketplace_fee =
            Cents::round_half_up(Decimal::from((amount - service_fee).value()) * MARKETPLACE_FEE_RATE)?;
        let application_fee = marketplace_fee + service_fee;

        Ok(Self {
            amount,
            service_fee,
            marketplace_fee,
            application_fee,
            payout: amount - application_fee,
        })
    }
}
