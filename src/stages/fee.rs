//! Fee deduction and the node-local minimum gas price check
use crate::coins::{required_fees, Coins};
use crate::context::{Event, ExecutionContext};
use crate::crypto::address_to_hex;
use crate::error::AdmissionError;
use crate::keepers::{AccountKeeper, BankKeeper, FeegrantKeeper, FEE_COLLECTOR};
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::Tx;
use std::sync::Arc;
use tracing::trace;

/// Returns the effective fee and the mempool priority for a transaction.
pub type TxFeeChecker =
    Arc<dyn Fn(&ExecutionContext, &Tx) -> Result<(Coins, i64), AdmissionError> + Send + Sync>;

/// Rejects transactions whose fee is below the node's own minimum gas prices.
///
/// Only applies in check mode; blocks are never filtered by local settings.
/// Priority is the lowest per-gas price across the fee's denominations.
pub fn check_tx_fee_with_validator_min_gas_prices(
    ctx: &ExecutionContext,
    tx: &Tx,
) -> Result<(Coins, i64), AdmissionError> {
    let fee = tx.fee();
    let gas = tx.gas();

    if ctx.is_check_tx() && !ctx.min_gas_prices.is_empty() {
        let required = required_fees(&ctx.min_gas_prices, gas)?;
        if !fee.is_any_gte(&required) {
            return Err(AdmissionError::InsufficientFee {
                got: fee.to_string(),
                required: required.to_string(),
            });
        }
    }

    Ok((fee.clone(), tx_priority(fee, gas)))
}

/// Minimum over fee denominations of `amount / gas`, saturating at `i64::MAX`.
pub fn tx_priority(fee: &Coins, gas: u64) -> i64 {
    let gas = u128::from(gas.max(1));
    fee.iter()
        .map(|coin| i64::try_from(coin.amount / gas).unwrap_or(i64::MAX))
        .min()
        .unwrap_or(0)
}

/// Moves the fee from the payer (or its granter) to the fee collector and sets priority.
pub struct DeductFeeStage {
    accounts: Arc<dyn AccountKeeper>,
    bank: Arc<dyn BankKeeper>,
    feegrant: Option<Arc<dyn FeegrantKeeper>>,
    fee_checker: TxFeeChecker,
}

impl DeductFeeStage {
    pub fn new(
        accounts: Arc<dyn AccountKeeper>,
        bank: Arc<dyn BankKeeper>,
        feegrant: Option<Arc<dyn FeegrantKeeper>>,
        fee_checker: TxFeeChecker,
    ) -> Self {
        DeductFeeStage {
            accounts,
            bank,
            feegrant,
            fee_checker,
        }
    }

    fn deduct(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        fee: &Coins,
        simulate: bool,
    ) -> Result<(), AdmissionError> {
        let payer = tx.fee_payer().ok_or_else(|| {
            AdmissionError::InvalidRequest("transaction has no fee payer".to_string())
        })?;
        let mut deduct_from = payer;

        if let Some(granter) = tx.auth_info.fee.granter {
            let feegrant = self.feegrant.as_ref().ok_or_else(|| {
                AdmissionError::InvalidRequest("fee grants are not enabled".to_string())
            })?;
            if granter != payer {
                let granted = if simulate {
                    feegrant.check_granted_fees(&granter, &payer, fee, &tx.body.messages)
                } else {
                    feegrant.use_granted_fees(&granter, &payer, fee, &tx.body.messages)
                };
                granted.map_err(|e| {
                    AdmissionError::Unauthorized(format!(
                        "{} does not allow to pay fees for {}: {}",
                        address_to_hex(&granter),
                        address_to_hex(&payer),
                        e
                    ))
                })?;
            }
            deduct_from = granter;
        }

        if self.accounts.account(&deduct_from).is_none() {
            return Err(AdmissionError::UnknownAddress(format!(
                "fee payer address: {} does not exist",
                address_to_hex(&deduct_from)
            )));
        }

        if !fee.is_zero() {
            if simulate {
                self.bank
                    .spendable_coins(&deduct_from)
                    .checked_sub(fee)?;
            } else {
                self.bank
                    .send_coins_to_module(&deduct_from, FEE_COLLECTOR, fee)?;
            }
        }

        trace!(payer = %address_to_hex(&deduct_from), fee = %fee, simulate, "fee deducted");
        ctx.emit(
            Event::new("tx")
                .attr("fee", fee.to_string())
                .attr("fee_payer", address_to_hex(&deduct_from)),
        );
        Ok(())
    }
}

impl Stage for DeductFeeStage {
    fn kind(&self) -> StageKind {
        StageKind::DeductFee
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        if !simulate && ctx.block_height > 0 && tx.gas() == 0 {
            return Err(AdmissionError::InvalidRequest(
                "must provide positive gas".to_string(),
            ));
        }

        let (fee, priority) = if simulate {
            (tx.fee().clone(), tx_priority(tx.fee(), tx.gas()))
        } else {
            (self.fee_checker)(ctx, tx)?
        };

        self.deduct(ctx, tx, &fee, simulate)?;
        ctx.set_priority(priority)?;
        next.run(ctx, tx, simulate)
    }
}
