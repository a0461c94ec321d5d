//! Database persistence layer for SecureChain.
//!
//! Transactions and blocks are insert-only records; nothing here updates or
//! deletes a row. Tampering with the stored data is exactly what
//! `Ledger::validate` exists to detect.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ChainError, Result};
use crate::ledger::Block;
use crate::transaction::Transaction;

/// Abstraction for persistence backends. The store writes each admitted
/// transaction together with its block as one atomic record.
pub trait Persistence: Send + Sync {
    fn save_record(&self, transaction: &Transaction, block: &Block) -> Result<()>;
    fn load_transactions(&self) -> Result<Vec<Transaction>>;
    fn load_blocks(&self) -> Result<Vec<Block>>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                sender TEXT NOT NULL,
                receiver TEXT NOT NULL,
                amount REAL NOT NULL,
                fraud_score REAL NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::Database(format!("Failed to create transactions table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                block_index INTEGER PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                previous_hash BLOB NOT NULL,
                current_hash BLOB NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::Database(format!("Failed to create blocks table: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChainError::Database("Mutex poisoned".to_string()))
    }
}

fn hash_from_row(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    if bytes.len() != 32 {
        return Err(ChainError::Database(format!(
            "{} has {} bytes, expected 32",
            column,
            bytes.len()
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

impl Persistence for Database {
    /// Insert the transaction and its block in one SQL transaction so a
    /// crash can never leave a scored transaction without its chain entry.
    fn save_record(&self, transaction: &Transaction, block: &Block) -> Result<()> {
        let conn_guard = self.lock()?;
        let tx = conn_guard
            .unchecked_transaction()
            .map_err(|e| ChainError::Database(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO transactions (id, sender, receiver, amount, fraud_score, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transaction.id,
                transaction.sender,
                transaction.receiver,
                transaction.amount,
                transaction.fraud_score,
                transaction.timestamp,
            ],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO blocks (block_index, transaction_id, previous_hash, current_hash, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                block.index as i64,
                block.transaction_id,
                block.previous_hash.to_vec(),
                block.current_hash.to_vec(),
                block.timestamp,
            ],
        )
        .map_err(|e| ChainError::Database(format!("Failed to save block: {}", e)))?;

        tx.commit()
            .map_err(|e| ChainError::Database(format!("Failed to commit record: {}", e)))?;

        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let conn_guard = self.lock()?;
        let mut stmt = conn_guard
            .prepare(
                "SELECT id, sender, receiver, amount, fraud_score, timestamp
                 FROM transactions ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| ChainError::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Transaction {
                    id: row.get(0)?,
                    sender: row.get(1)?,
                    receiver: row.get(2)?,
                    amount: row.get(3)?,
                    fraud_score: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            })
            .map_err(|e| ChainError::Database(format!("Failed to query transactions: {}", e)))?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(|e| ChainError::Database(format!("Failed to read row: {}", e)))?);
        }
        Ok(transactions)
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        let conn_guard = self.lock()?;
        let mut stmt = conn_guard
            .prepare(
                "SELECT block_index, transaction_id, previous_hash, current_hash, timestamp
                 FROM blocks ORDER BY block_index ASC",
            )
            .map_err(|e| ChainError::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let transaction_id: String = row.get(1)?;
                let previous_hash: Vec<u8> = row.get(2)?;
                let current_hash: Vec<u8> = row.get(3)?;
                let timestamp: i64 = row.get(4)?;
                Ok((index, transaction_id, previous_hash, current_hash, timestamp))
            })
            .map_err(|e| ChainError::Database(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for row in rows {
            let (index, transaction_id, previous_hash, current_hash, timestamp) =
                row.map_err(|e| ChainError::Database(format!("Failed to read row: {}", e)))?;
            blocks.push(Block {
                index: index as u64,
                transaction_id,
                previous_hash: hash_from_row(previous_hash, "previous_hash")?,
                current_hash: hash_from_row(current_hash, "current_hash")?,
                timestamp,
            });
        }
        Ok(blocks)
    }
}

/// Simple in-memory persistence implementation useful for tests and
/// ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    records: std::sync::Arc<Mutex<(Vec<Transaction>, Vec<Block>)>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_record(&self, transaction: &Transaction, block: &Block) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| ChainError::Database("Mutex poisoned".to_string()))?;
        if records.0.iter().any(|t| t.id == transaction.id) {
            return Err(ChainError::Database(format!("duplicate transaction id {}", transaction.id)));
        }
        records.0.push(transaction.clone());
        records.1.push(block.clone());
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let records = self
            .records
            .lock()
            .map_err(|_| ChainError::Database("Mutex poisoned".to_string()))?;
        Ok(records.0.clone())
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        let records = self
            .records
            .lock()
            .map_err(|_| ChainError::Database("Mutex poisoned".to_string()))?;
        Ok(records.1.clone())
    }
}

/// Counts appearances of each lowercased party across all transactions, for
/// building anomaly-model training features.
pub fn frequency_index(transactions: &[Transaction]) -> (HashMap<String, usize>, HashMap<String, usize>) {
    let mut senders: HashMap<String, usize> = HashMap::new();
    let mut receivers: HashMap<String, usize> = HashMap::new();
    for tx in transactions {
        *senders.entry(tx.sender.to_lowercase()).or_insert(0) += 1;
        *receivers.entry(tx.receiver.to_lowercase()).or_insert(0) += 1;
    }
    (senders, receivers)
}
