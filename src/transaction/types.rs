/// Transaction and message types seen by the admission pipeline
use crate::coins::Coins;
use crate::crypto::{Address, PubKey};
use crate::error::AdmissionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum serialized transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Largest gas limit a transaction may request.
pub const MAX_GAS_WANTED: u64 = (1 << 63) - 1;

/// An encoded message whose concrete type is named by `type_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Any {
    pub type_url: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    Abstain,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVoteOption {
    pub option: VoteOption,
    pub weight: Decimal,
}

/// Identity of a cross-chain packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId {
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    pub sequence: u64,
}

/// Decoded transaction message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Send {
        from_address: Address,
        to_address: Address,
        amount: Coins,
    },
    SubmitProposal {
        proposer: Address,
        title: String,
        initial_deposit: Coins,
        /// Messages executed if the proposal passes, kept encoded.
        messages: Vec<Any>,
    },
    Deposit {
        proposal_id: u64,
        depositor: Address,
        amount: Coins,
    },
    Vote {
        proposal_id: u64,
        voter: Address,
        option: VoteOption,
    },
    WeightedVote {
        proposal_id: u64,
        voter: Address,
        options: Vec<WeightedVoteOption>,
    },
    /// Authorization wrapper: `grantee` executes `msgs` on behalf of their signers.
    Exec { grantee: Address, msgs: Vec<Any> },
    RecvPacket { packet: PacketId, signer: Address },
    Acknowledgement { packet: PacketId, signer: Address },
    Timeout { packet: PacketId, signer: Address },
    UpdateClient { client_id: String, signer: Address },
}

impl Msg {
    pub fn type_url(&self) -> &'static str {
        match self {
            Msg::Send { .. } => "/cosmos.bank.v1beta1.MsgSend",
            Msg::SubmitProposal { .. } => "/atomone.gov.v1.MsgSubmitProposal",
            Msg::Deposit { .. } => "/atomone.gov.v1.MsgDeposit",
            Msg::Vote { .. } => "/atomone.gov.v1.MsgVote",
            Msg::WeightedVote { .. } => "/atomone.gov.v1.MsgVoteWeighted",
            Msg::Exec { .. } => "/cosmos.authz.v1beta1.MsgExec",
            Msg::RecvPacket { .. } => "/ibc.core.channel.v1.MsgRecvPacket",
            Msg::Acknowledgement { .. } => "/ibc.core.channel.v1.MsgAcknowledgement",
            Msg::Timeout { .. } => "/ibc.core.channel.v1.MsgTimeout",
            Msg::UpdateClient { .. } => "/ibc.core.client.v1.MsgUpdateClient",
        }
    }

    /// The address that must sign for this message.
    pub fn signer(&self) -> Address {
        match self {
            Msg::Send { from_address, .. } => *from_address,
            Msg::SubmitProposal { proposer, .. } => *proposer,
            Msg::Deposit { depositor, .. } => *depositor,
            Msg::Vote { voter, .. } | Msg::WeightedVote { voter, .. } => *voter,
            Msg::Exec { grantee, .. } => *grantee,
            Msg::RecvPacket { signer, .. }
            | Msg::Acknowledgement { signer, .. }
            | Msg::Timeout { signer, .. }
            | Msg::UpdateClient { signer, .. } => *signer,
        }
    }

    /// Voter address if this message casts a governance vote.
    pub fn voter(&self) -> Option<Address> {
        match self {
            Msg::Vote { voter, .. } | Msg::WeightedVote { voter, .. } => Some(*voter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMode {
    /// Binary encoding of body, auth info, chain id and account number.
    Direct,
    /// JSON document, readable by hardware wallets.
    LegacyJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureData {
    Single {
        mode: SignMode,
        signature: Vec<u8>,
    },
    /// `bitarray[i]` marks whether sub-key `i` signed; `signatures` holds only the set entries.
    Multi {
        bitarray: Vec<bool>,
        signatures: Vec<SignatureData>,
    },
}

impl SignatureData {
    pub fn is_empty(&self) -> bool {
        match self {
            SignatureData::Single { signature, .. } => signature.is_empty(),
            SignatureData::Multi { signatures, .. } => signatures.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// May be omitted once the key has been bound to the account.
    pub public_key: Option<PubKey>,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Coins,
    pub gas_limit: u64,
    #[serde(default)]
    pub payer: Option<Address>,
    #[serde(default)]
    pub granter: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<Msg>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub timeout_height: u64,
    #[serde(default)]
    pub extension_options: Vec<Any>,
    #[serde(default)]
    pub non_critical_extension_options: Vec<Any>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    #[serde(default)]
    pub signatures: Vec<SignatureData>,
}

impl Tx {
    pub fn new(messages: Vec<Msg>, fee: Fee) -> Self {
        Tx {
            body: TxBody {
                messages,
                ..TxBody::default()
            },
            auth_info: AuthInfo {
                signer_infos: Vec::new(),
                fee,
            },
            signatures: Vec::new(),
        }
    }

    pub fn with_memo(mut self, memo: &str) -> Self {
        self.body.memo = memo.to_string();
        self
    }

    pub fn with_timeout_height(mut self, height: u64) -> Self {
        self.body.timeout_height = height;
        self
    }

    /// Required signers in first-appearance order, without duplicates.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers = Vec::new();
        for msg in &self.body.messages {
            let signer = msg.signer();
            if !signers.contains(&signer) {
                signers.push(signer);
            }
        }
        signers
    }

    /// Explicit fee payer, or the first signer.
    pub fn fee_payer(&self) -> Option<Address> {
        self.auth_info
            .fee
            .payer
            .or_else(|| self.signers().first().copied())
    }

    pub fn fee(&self) -> &Coins {
        &self.auth_info.fee.amount
    }

    pub fn gas(&self) -> u64 {
        self.auth_info.fee.gas_limit
    }

    /// Canonical binary encoding, used for size accounting.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AdmissionError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn hash(&self) -> Result<[u8; 32], AdmissionError> {
        Ok(Sha256::digest(self.to_bytes()?).into())
    }

    pub fn hash_str(&self) -> String {
        self.hash().map(hex::encode).unwrap_or_default()
    }
}
