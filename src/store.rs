//! Transaction admission and query orchestration.
//!
//! `TransactionStore` owns the ledger, the recent-history window, and the
//! fraud scorer, and funnels every admission through one exclusive write
//! section so concurrent submissions can never fork the chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Timelike, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::fraud::{features, FraudScorer, HistorySnapshot, ModelStatus};
use crate::ledger::{Block, Ledger, ValidationReport};
use crate::persistence::{frequency_index, Persistence};
use crate::transaction::{validate_submission, Transaction, TxStatus};

/// A transaction together with the ledger block that commits to it.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub transaction: Transaction,
    pub block: Block,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
    pub search: Option<String>,
    pub status: Option<TxStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Transaction>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

const MAX_PER_PAGE: usize = 100;

/// Everything guarded by the store's lock. Reads take the shared side;
/// admission takes the exclusive side for the persist + append section.
struct StoreInner {
    ledger: Ledger,
    /// Creation order; never reordered or truncated.
    transactions: Vec<Transaction>,
    /// Recent submission timestamps (millis) per lowercased sender,
    /// pruned to the configured trailing window.
    sender_window: HashMap<String, Vec<i64>>,
    sender_totals: HashMap<String, usize>,
    receiver_totals: HashMap<String, usize>,
}

impl StoreInner {
    fn window_count(&self, sender_key: &str, cutoff: i64) -> usize {
        self.sender_window
            .get(sender_key)
            .map_or(0, |stamps| stamps.iter().filter(|&&t| t >= cutoff).count())
    }
}

pub struct TransactionStore {
    persistence: Box<dyn Persistence>,
    clock: Box<dyn Clock>,
    scorer: FraudScorer,
    config: Config,
    inner: RwLock<StoreInner>,
    seq: AtomicU64,
}

impl TransactionStore {
    /// Build a store over the given backend, replaying previously persisted
    /// transactions and blocks into memory. The replayed chain is taken
    /// as-is; run [`TransactionStore::validate_chain`] to audit it.
    pub fn open(persistence: Box<dyn Persistence>, clock: Box<dyn Clock>, config: Config) -> Result<Self> {
        config.validate()?;

        let transactions = persistence.load_transactions()?;
        let blocks = persistence.load_blocks()?;
        if transactions.len() != blocks.len() {
            return Err(ChainError::Database(format!(
                "store has {} transactions but {} blocks",
                transactions.len(),
                blocks.len()
            )));
        }

        let ledger = Ledger::from_blocks(blocks);

        let mut sender_window: HashMap<String, Vec<i64>> = HashMap::new();
        let mut sender_totals: HashMap<String, usize> = HashMap::new();
        let mut receiver_totals: HashMap<String, usize> = HashMap::new();
        let cutoff = clock.now().timestamp_millis() - config.scoring.frequency_window_secs * 1_000;
        for tx in &transactions {
            let sender_key = tx.sender.to_lowercase();
            *sender_totals.entry(sender_key.clone()).or_insert(0) += 1;
            *receiver_totals.entry(tx.receiver.to_lowercase()).or_insert(0) += 1;
            if tx.timestamp >= cutoff {
                sender_window.entry(sender_key).or_default().push(tx.timestamp);
            }
        }

        let seq = AtomicU64::new(transactions.len() as u64);
        let scorer = FraudScorer::new(config.scoring.clone(), config.model.clone());

        Ok(TransactionStore {
            persistence,
            clock,
            scorer,
            config,
            inner: RwLock::new(StoreInner {
                ledger,
                transactions,
                sender_window,
                sender_totals,
                receiver_totals,
            }),
            seq,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }

    /// Admit a transaction: validate, score against a consistent history
    /// snapshot, persist, and append its ledger block. All-or-nothing; a
    /// validation failure leaves no partial state behind.
    pub fn submit(&self, sender: &str, receiver: &str, amount: f64) -> Result<TransactionRecord> {
        validate_submission(sender, receiver, amount)?;

        let sender = sender.trim().to_string();
        let receiver = receiver.trim().to_string();
        let sender_key = sender.to_lowercase();
        let receiver_key = receiver.to_lowercase();

        let now = self.clock.now();
        let timestamp = now.timestamp_millis();
        let cutoff = timestamp - self.config.scoring.frequency_window_secs * 1_000;

        // History snapshot under the shared lock; scoring itself runs outside
        // the exclusive append section.
        let history = {
            let inner = self.inner.read();
            HistorySnapshot {
                sender_in_window: inner.window_count(&sender_key, cutoff) + 1,
                sender_frequency: inner.sender_totals.get(&sender_key).copied().unwrap_or(0) + 1,
                receiver_frequency: inner.receiver_totals.get(&receiver_key).copied().unwrap_or(0) + 1,
            }
        };

        let fraud_score = self.scorer.score(amount, now, &history);

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("TX-{}-{}", timestamp, seq);
        let transaction = Transaction {
            id: id.clone(),
            sender: sender.clone(),
            receiver: receiver.clone(),
            amount,
            fraud_score,
            timestamp,
        };

        // Single-writer critical section: reading the tip and appending the
        // next block must not interleave with another admission.
        let mut inner = self.inner.write();

        let block_timestamp = self.clock.now().timestamp_millis();
        let block = Block::new(
            inner.ledger.len() as u64,
            id.clone(),
            inner.ledger.tip_hash(),
            block_timestamp,
        );
        // Durable first; the in-memory append below reproduces the exact
        // same block from the same tip.
        self.persistence.save_record(&transaction, &block)?;
        let appended = inner.ledger.append_block(&id, block_timestamp);
        debug_assert_eq!(appended, block);

        inner.transactions.push(transaction.clone());
        *inner.sender_totals.entry(sender_key.clone()).or_insert(0) += 1;
        *inner.receiver_totals.entry(receiver_key).or_insert(0) += 1;
        let stamps = inner.sender_window.entry(sender_key).or_default();
        stamps.retain(|&t| t >= cutoff);
        stamps.push(timestamp);

        debug!(
            id = %id,
            amount,
            fraud_score,
            block_index = block.index,
            "admitted transaction"
        );

        Ok(TransactionRecord { transaction, block })
    }

    pub fn get(&self, id: &str) -> Option<TransactionRecord> {
        let inner = self.inner.read();
        let transaction = inner.transactions.iter().find(|t| t.id == id)?.clone();
        let block = inner.ledger.block_for_transaction(id)?.clone();
        Some(TransactionRecord { transaction, block })
    }

    /// Page through transactions, newest first. Read-only: status is derived
    /// from the stored score at read time, never written back.
    pub fn list(&self, query: &ListQuery) -> Page {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
        let search = query.search.as_deref().map(str::to_lowercase).filter(|s| !s.is_empty());

        let inner = self.inner.read();
        let matches: Vec<&Transaction> = inner
            .transactions
            .iter()
            .rev()
            .filter(|tx| {
                if let Some(status) = query.status {
                    if tx.status(&self.config.scoring) != status {
                        return false;
                    }
                }
                match &search {
                    Some(needle) => {
                        tx.id.to_lowercase().contains(needle)
                            || tx.sender.to_lowercase().contains(needle)
                            || tx.receiver.to_lowercase().contains(needle)
                            || tx.amount.to_string().contains(needle)
                    }
                    None => true,
                }
            })
            .collect();

        let total = matches.len();
        let total_pages = (total.max(1) + per_page - 1) / per_page;
        let items = matches
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .cloned()
            .collect();

        Page {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }

    /// Transactions in the Suspicious band, newest first.
    pub fn fraud_alerts(&self) -> Vec<Transaction> {
        let inner = self.inner.read();
        inner
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.fraud_score >= self.config.scoring.suspicious_threshold)
            .cloned()
            .collect()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.inner.read().ledger.blocks().to_vec()
    }

    /// Full-chain tamper audit over a consistent point-in-time snapshot.
    pub fn validate_chain(&self) -> ValidationReport {
        self.inner.read().ledger.validate()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.scorer.status()
    }

    /// Retrain the anomaly model from all recorded transactions. Runs as a
    /// periodic background step; submissions keep using the previous
    /// committed snapshot until this returns.
    pub fn retrain(&self) -> bool {
        let samples: Vec<features::FeatureVector> = {
            let inner = self.inner.read();
            let (senders, receivers) = frequency_index(&inner.transactions);
            inner
                .transactions
                .iter()
                .map(|tx| {
                    features::extract(
                        tx.amount,
                        senders.get(&tx.sender.to_lowercase()).copied().unwrap_or(1),
                        receivers.get(&tx.receiver.to_lowercase()).copied().unwrap_or(1),
                        hour_of(tx.timestamp),
                    )
                })
                .collect()
        };

        let committed = self.scorer.retrain(&samples);
        if committed {
            info!(samples = samples.len(), "anomaly model retrained");
        }
        committed
    }
}

fn hour_of(timestamp_millis: i64) -> u32 {
    Utc.timestamp_millis_opt(timestamp_millis)
        .single()
        .map_or(0, |dt: DateTime<Utc>| dt.hour())
}
