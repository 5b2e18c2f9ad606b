//! Ledger Transfer Definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Amount, Principal, decimal};

pub mod transfer_codes {
    pub const MINT: u16 = 1;
    pub const DEPOSIT: u16 = 2;
    pub const WITHDRAWAL: u16 = 3;
    pub const INTEREST_PAYOUT: u16 = 4;
    pub const ESCROW_FUNDING: u16 = 5;
    pub const DISBURSEMENT: u16 = 6;
    pub const REPAYMENT: u16 = 7;
    pub const REFUND: u16 = 8;
    pub const SETTLEMENT: u16 = 9;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferCode {
    Mint,
    Deposit,
    Withdrawal,
    InterestPayout,
    EscrowFunding,
    Disbursement,
    Repayment,
    Refund,
    Settlement,
}

impl TransferCode {
    pub fn code(&self) -> u16 {
        match self {
            TransferCode::Mint => transfer_codes::MINT,
            TransferCode::Deposit => transfer_codes::DEPOSIT,
            TransferCode::Withdrawal => transfer_codes::WITHDRAWAL,
            TransferCode::InterestPayout => transfer_codes::INTEREST_PAYOUT,
            TransferCode::EscrowFunding => transfer_codes::ESCROW_FUNDING,
            TransferCode::Disbursement => transfer_codes::DISBURSEMENT,
            TransferCode::Repayment => transfer_codes::REPAYMENT,
            TransferCode::Refund => transfer_codes::REFUND,
            TransferCode::Settlement => transfer_codes::SETTLEMENT,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            transfer_codes::MINT => Some(TransferCode::Mint),
            transfer_codes::DEPOSIT => Some(TransferCode::Deposit),
            transfer_codes::WITHDRAWAL => Some(TransferCode::Withdrawal),
            transfer_codes::INTEREST_PAYOUT => Some(TransferCode::InterestPayout),
            transfer_codes::ESCROW_FUNDING => Some(TransferCode::EscrowFunding),
            transfer_codes::DISBURSEMENT => Some(TransferCode::Disbursement),
            transfer_codes::REPAYMENT => Some(TransferCode::Repayment),
            transfer_codes::REFUND => Some(TransferCode::Refund),
            transfer_codes::SETTLEMENT => Some(TransferCode::Settlement),
            _ => None,
        }
    }
}

/// One posted movement; `from` is `None` for mints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: u64,
    pub from: Option<Principal>,
    pub to: Principal,
    #[serde(with = "decimal")]
    pub amount: Amount,
    pub code: TransferCode,
    pub at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn touches(&self, who: &Principal) -> bool {
        &self.to == who || self.from.as_ref() == Some(who)
    }
}
