/// Stateless shape checks, separated from the type definitions
use crate::coins::{validate_denom, Coins};
use crate::crypto::Address;
use crate::error::AdmissionError;
use crate::transaction::types::{
    Msg, PacketId, Tx, WeightedVoteOption, MAX_GAS_WANTED, MAX_TRANSACTION_SIZE,
};
use rust_decimal::Decimal;

const EMPTY_ADDRESS: Address = [0; 32];

fn require_address(addr: &Address, field: &str) -> Result<(), AdmissionError> {
    if *addr == EMPTY_ADDRESS {
        return Err(AdmissionError::InvalidRequest(format!(
            "{} address cannot be empty",
            field
        )));
    }
    Ok(())
}

fn require_coins(coins: &Coins, field: &str) -> Result<(), AdmissionError> {
    for denom in coins.denoms() {
        validate_denom(denom)?;
    }
    if coins.is_zero() {
        return Err(AdmissionError::InvalidRequest(format!(
            "{} must be positive",
            field
        )));
    }
    Ok(())
}

fn validate_packet(packet: &PacketId, signer: &Address) -> Result<(), AdmissionError> {
    require_address(signer, "signer")?;
    let ids = [
        &packet.source_port,
        &packet.source_channel,
        &packet.destination_port,
        &packet.destination_channel,
    ];
    if ids.iter().any(|id| id.is_empty()) {
        return Err(AdmissionError::InvalidRequest(
            "packet port and channel identifiers cannot be empty".to_string(),
        ));
    }
    if packet.sequence == 0 {
        return Err(AdmissionError::InvalidRequest(
            "packet sequence cannot be 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_weighted_options(options: &[WeightedVoteOption]) -> Result<(), AdmissionError> {
    if options.is_empty() {
        return Err(AdmissionError::InvalidRequest(
            "weighted vote needs at least one option".to_string(),
        ));
    }
    let mut total = Decimal::ZERO;
    for (i, opt) in options.iter().enumerate() {
        if opt.weight <= Decimal::ZERO || opt.weight > Decimal::ONE {
            return Err(AdmissionError::InvalidRequest(format!(
                "invalid weight {} for option {:?}",
                opt.weight, opt.option
            )));
        }
        if options[..i].iter().any(|o| o.option == opt.option) {
            return Err(AdmissionError::InvalidRequest(format!(
                "duplicated vote option {:?}",
                opt.option
            )));
        }
        total += opt.weight;
    }
    if total != Decimal::ONE {
        return Err(AdmissionError::InvalidRequest(format!(
            "total weight must be 1, got {}",
            total
        )));
    }
    Ok(())
}

impl Msg {
    pub fn validate_basic(&self) -> Result<(), AdmissionError> {
        match self {
            Msg::Send {
                from_address,
                to_address,
                amount,
            } => {
                require_address(from_address, "sender")?;
                require_address(to_address, "recipient")?;
                require_coins(amount, "send amount")
            }
            Msg::SubmitProposal {
                proposer,
                initial_deposit,
                ..
            } => {
                require_address(proposer, "proposer")?;
                for denom in initial_deposit.denoms() {
                    validate_denom(denom)?;
                }
                Ok(())
            }
            Msg::Deposit {
                depositor, amount, ..
            } => {
                require_address(depositor, "depositor")?;
                require_coins(amount, "deposit amount")
            }
            Msg::Vote { voter, .. } => require_address(voter, "voter"),
            Msg::WeightedVote { voter, options, .. } => {
                require_address(voter, "voter")?;
                validate_weighted_options(options)
            }
            Msg::Exec { grantee, msgs } => {
                require_address(grantee, "grantee")?;
                if msgs.is_empty() {
                    return Err(AdmissionError::InvalidRequest(
                        "exec must wrap at least one message".to_string(),
                    ));
                }
                Ok(())
            }
            Msg::RecvPacket { packet, signer }
            | Msg::Acknowledgement { packet, signer }
            | Msg::Timeout { packet, signer } => validate_packet(packet, signer),
            Msg::UpdateClient { client_id, signer } => {
                require_address(signer, "signer")?;
                if client_id.is_empty() {
                    return Err(AdmissionError::InvalidRequest(
                        "client id cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Tx {
    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), AdmissionError> {
        let size = self.to_bytes()?.len();
        if size > MAX_TRANSACTION_SIZE {
            return Err(AdmissionError::InvalidRequest(format!(
                "Transaction too large: {} bytes (max: {})",
                size, MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    /// Stateless checks that need neither storage nor signatures to be verified.
    pub fn validate_basic(&self) -> Result<(), AdmissionError> {
        if self.body.messages.is_empty() {
            return Err(AdmissionError::InvalidRequest(
                "must contain at least one message".to_string(),
            ));
        }

        let fee = &self.auth_info.fee;
        if fee.gas_limit > MAX_GAS_WANTED {
            return Err(AdmissionError::InvalidRequest(format!(
                "invalid gas supplied; {} > {}",
                fee.gas_limit, MAX_GAS_WANTED
            )));
        }
        for denom in fee.amount.denoms() {
            validate_denom(denom)?;
        }

        if self.signatures.is_empty() {
            return Err(AdmissionError::NoSignatures);
        }

        let signers = self.signers();
        if self.signatures.len() != signers.len() {
            return Err(AdmissionError::Unauthorized(format!(
                "wrong number of signers; expected {}, got {}",
                signers.len(),
                self.signatures.len()
            )));
        }
        if self.auth_info.signer_infos.len() != signers.len() {
            return Err(AdmissionError::Unauthorized(format!(
                "wrong number of signer infos; expected {}, got {}",
                signers.len(),
                self.auth_info.signer_infos.len()
            )));
        }

        for msg in &self.body.messages {
            msg.validate_basic()?;
        }

        self.validate_size()
    }
}
