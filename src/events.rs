//! Outbound Event Stream
//!
//! Every committed mutation appends one `LendingEvent` to the log. Records are
//! numbered from 1, kept for replay and fanned out to live subscribers over a
//! broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{Amount, LoanId, Principal, Score, decimal, signed_decimal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LendingEvent {
    Deposited {
        principal: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        #[serde(with = "decimal")]
        interest_paid: Amount,
    },
    Withdrawn {
        principal: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        #[serde(with = "decimal")]
        interest_paid: Amount,
    },
    LoanCreated {
        loan_id: LoanId,
        borrower: Principal,
        #[serde(with = "decimal")]
        principal: Amount,
        apr_bps: u32,
        term_days: u32,
    },
    LoanFunded {
        loan_id: LoanId,
        borrower: Principal,
        escrow: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    LoanDisbursed {
        loan_id: LoanId,
        borrower: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        due_date: DateTime<Utc>,
    },
    LoanRepaid {
        loan_id: LoanId,
        borrower: Principal,
        payer: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        #[serde(with = "decimal")]
        interest: Amount,
        on_time: bool,
    },
    LoanDefaulted {
        loan_id: LoanId,
        borrower: Principal,
        #[serde(with = "decimal")]
        principal: Amount,
    },
    Minted {
        principal: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        #[serde(with = "signed_decimal")]
        new_balance: Score,
    },
    Burned {
        principal: Principal,
        #[serde(with = "decimal")]
        amount: Amount,
        #[serde(with = "signed_decimal")]
        new_balance: Score,
    },
    UserInitialized {
        principal: Principal,
        #[serde(with = "decimal")]
        initial_score: Amount,
    },
    ControllerChanged {
        previous: Option<Principal>,
        current: Principal,
    },
}

impl LendingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LendingEvent::Deposited { .. } => "Deposited",
            LendingEvent::Withdrawn { .. } => "Withdrawn",
            LendingEvent::LoanCreated { .. } => "LoanCreated",
            LendingEvent::LoanFunded { .. } => "LoanFunded",
            LendingEvent::LoanDisbursed { .. } => "LoanDisbursed",
            LendingEvent::LoanRepaid { .. } => "LoanRepaid",
            LendingEvent::LoanDefaulted { .. } => "LoanDefaulted",
            LendingEvent::Minted { .. } => "Minted",
            LendingEvent::Burned { .. } => "Burned",
            LendingEvent::UserInitialized { .. } => "UserInitialized",
            LendingEvent::ControllerChanged { .. } => "ControllerChanged",
        }
    }

    pub fn loan_id(&self) -> Option<LoanId> {
        match self {
            LendingEvent::LoanCreated { loan_id, .. }
            | LendingEvent::LoanFunded { loan_id, .. }
            | LendingEvent::LoanDisbursed { loan_id, .. }
            | LendingEvent::LoanRepaid { loan_id, .. }
            | LendingEvent::LoanDefaulted { loan_id, .. } => Some(*loan_id),
            _ => None,
        }
    }

    /// Whether the event concerns `who` as lender, borrower, payer or score holder
    pub fn involves(&self, who: &Principal) -> bool {
        match self {
            LendingEvent::Deposited { principal, .. }
            | LendingEvent::Withdrawn { principal, .. }
            | LendingEvent::Minted { principal, .. }
            | LendingEvent::Burned { principal, .. }
            | LendingEvent::UserInitialized { principal, .. } => principal == who,
            LendingEvent::LoanCreated { borrower, .. }
            | LendingEvent::LoanFunded { borrower, .. }
            | LendingEvent::LoanDisbursed { borrower, .. }
            | LendingEvent::LoanDefaulted { borrower, .. } => borrower == who,
            LendingEvent::LoanRepaid {
                borrower, payer, ..
            } => borrower == who || payer == who,
            LendingEvent::ControllerChanged { previous, current } => {
                current == who || previous.as_ref() == Some(who)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LendingEvent,
}

pub struct EventLog {
    records: Vec<EventRecord>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            records: Vec::new(),
            sender,
        }
    }

    pub fn emit(&mut self, event: LendingEvent) -> u64 {
        let seq = self.records.len() as u64 + 1;
        let record = EventRecord {
            seq,
            at: Utc::now(),
            event,
        };

        debug!(seq = seq, event = record.event.name(), "Event emitted");

        // No live subscribers is not an error
        let _ = self.sender.send(record.clone());
        self.records.push(record);
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn latest_seq(&self) -> u64 {
        self.records.len() as u64
    }

    /// Records with `seq > after`, oldest first
    pub fn since(&self, after: u64) -> &[EventRecord] {
        let start = (after as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn for_principal(&self, who: &Principal) -> Vec<EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.involves(who))
            .cloned()
            .collect()
    }

    pub fn for_loan(&self, loan_id: LoanId) -> Vec<EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.loan_id() == Some(loan_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}
