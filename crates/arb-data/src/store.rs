//! SQLite storage for classification output and derived aggregates.
//!
//! Uses WAL mode for concurrent read performance and prepared statements
//! for batch insert throughput. Classification runs are resumable: each
//! completed block-range chunk leaves a marker row, and re-running the
//! same range skips finished chunks.

use eyre::Result;
use rusqlite::Connection;
use std::cell::RefCell;

/// One detected arbitrage transaction, flattened for persistence.
///
/// Column order is stable: the `summarize` aggregation stage keys on
/// `senders` and `profit_token`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArbTxRow {
    /// Transaction hash, 0x-prefixed hex.
    pub tx_hash: String,
    /// Chain the transaction executed on.
    pub chain_id: u64,
    /// Block number.
    pub block_number: u64,
    /// Transaction index within the block.
    pub tx_index: u64,
    /// Profit token symbol.
    pub profit_token: String,
    /// Profit token contract address, 0x-prefixed hex.
    pub profit_token_address: String,
    /// Profit amount in normalized token units.
    pub profit_amount: f64,
    /// Hop path, e.g. `WETH->USDC->WETH`.
    pub path: String,
    /// Sorted distinct event senders.
    pub senders: Vec<String>,
}

/// One per-address aggregate row produced by `summarize`.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressSummaryRow {
    /// Chain id.
    pub chain_id: u64,
    /// Sender address, 0x-prefixed hex.
    pub address: String,
    /// Number of classified transactions this address appears in.
    pub arb_count: u64,
    /// Most frequent profit token for this address.
    pub main_profit_token: String,
    /// Occurrences of the most frequent profit token.
    pub main_profit_count: u64,
    /// Deployed bytecode length in bytes, when fetched.
    pub bytecode_len: Option<u64>,
}

/// One filtered call-trace row for a classified transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRow {
    /// Transaction hash, 0x-prefixed hex.
    pub tx_hash: String,
    /// Positional path of the frame inside the call tree.
    pub depth_path: String,
    /// Caller address.
    pub from_address: String,
    /// Callee address.
    pub to_address: String,
    /// 4-byte function selector, 0x-prefixed hex.
    pub selector: String,
    /// Gas used by the frame.
    pub gas_used: u64,
}

/// Store statistics for the `status` command.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoreStats {
    /// Classified arbitrage transactions.
    pub arb_count: u64,
    /// Lowest classified block number, 0 when empty.
    pub min_block: u64,
    /// Highest classified block number, 0 when empty.
    pub max_block: u64,
    /// Completed range chunks.
    pub chunk_count: u64,
    /// Address summary rows.
    pub summary_count: u64,
    /// Interesting trace rows.
    pub trace_count: u64,
}

pub struct Store {
    conn: RefCell<Connection>,
}

impl Store {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: RefCell::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.borrow_mut().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS arb_transactions (
                tx_hash TEXT,
                chain_id INTEGER,
                block_number INTEGER,
                tx_index INTEGER,
                profit_token TEXT,
                profit_token_address TEXT,
                profit_amount REAL,
                path TEXT,
                senders TEXT,
                classified_at TEXT,
                PRIMARY KEY (chain_id, tx_hash)
            );

            CREATE TABLE IF NOT EXISTS processed_chunks (
                chain_id INTEGER,
                start_block INTEGER,
                end_block INTEGER,
                PRIMARY KEY (chain_id, start_block, end_block)
            );

            CREATE TABLE IF NOT EXISTS address_summaries (
                chain_id INTEGER,
                address TEXT,
                arb_count INTEGER,
                main_profit_token TEXT,
                main_profit_count INTEGER,
                bytecode_len INTEGER,
                PRIMARY KEY (chain_id, address)
            );

            CREATE TABLE IF NOT EXISTS interesting_traces (
                tx_hash TEXT,
                depth_path TEXT,
                from_address TEXT,
                to_address TEXT,
                selector TEXT,
                gas_used INTEGER
            );
            ",
        )?;
        Ok(())
    }

    /// Batch insert classified transactions, replacing rows from a
    /// previous run of the same chunk.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_arb_rows(&self, rows: &[ArbTxRow]) -> Result<usize> {
        let classified_at = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR REPLACE INTO arb_transactions (
                    tx_hash, chain_id, block_number, tx_index, profit_token,
                    profit_token_address, profit_amount, path, senders, classified_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for row in rows {
                stmt.execute(rusqlite::params![
                    row.tx_hash,
                    row.chain_id,
                    row.block_number,
                    row.tx_index,
                    row.profit_token,
                    row.profit_token_address,
                    row.profit_amount,
                    row.path,
                    serde_json::to_string(&row.senders)?,
                    classified_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(rows.len())
    }

    /// Load all classified transactions for a chain, ordered by block
    /// and transaction index.
    ///
    /// # Errors
    /// Returns error if the query fails or a senders column does not parse.
    pub fn get_arb_rows(&self, chain_id: u64) -> Result<Vec<ArbTxRow>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "
            SELECT tx_hash, chain_id, block_number, tx_index, profit_token,
                   profit_token_address, profit_amount, path, senders
            FROM arb_transactions
            WHERE chain_id = ?
            ORDER BY block_number, tx_index
            ",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![chain_id], |row| {
                Ok((
                    ArbTxRow {
                        tx_hash: row.get(0)?,
                        chain_id: row.get(1)?,
                        block_number: row.get(2)?,
                        tx_index: row.get(3)?,
                        profit_token: row.get(4)?,
                        profit_token_address: row.get(5)?,
                        profit_amount: row.get(6)?,
                        path: row.get(7)?,
                        senders: Vec::new(),
                    },
                    row.get::<_, String>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut row, senders_json)| {
                row.senders = serde_json::from_str(&senders_json)?;
                Ok(row)
            })
            .collect()
    }

    /// Whether a range chunk has already been classified.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn is_chunk_processed(&self, chain_id: u64, start: u64, end: u64) -> Result<bool> {
        let conn = self.conn.borrow();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_chunks
             WHERE chain_id = ? AND start_block = ? AND end_block = ?",
            rusqlite::params![chain_id, start, end],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a completed range chunk.
    ///
    /// # Errors
    /// Returns error if the insert fails.
    pub fn mark_chunk_processed(&self, chain_id: u64, start: u64, end: u64) -> Result<()> {
        self.conn.borrow_mut().execute(
            "INSERT OR REPLACE INTO processed_chunks (chain_id, start_block, end_block)
             VALUES (?, ?, ?)",
            rusqlite::params![chain_id, start, end],
        )?;
        Ok(())
    }

    /// Batch insert address summaries, replacing any previous run.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_address_summaries(&self, rows: &[AddressSummaryRow]) -> Result<usize> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR REPLACE INTO address_summaries (
                    chain_id, address, arb_count, main_profit_token,
                    main_profit_count, bytecode_len
                ) VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.chain_id,
                    row.address,
                    row.arb_count,
                    row.main_profit_token,
                    row.main_profit_count,
                    row.bytecode_len,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Batch insert filtered trace rows.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_trace_rows(&self, rows: &[TraceRow]) -> Result<usize> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO interesting_traces (
                    tx_hash, depth_path, from_address, to_address, selector, gas_used
                ) VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for row in rows {
                stmt.execute(rusqlite::params![
                    row.tx_hash,
                    row.depth_path,
                    row.from_address,
                    row.to_address,
                    row.selector,
                    row.gas_used,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Store statistics for one chain.
    ///
    /// # Errors
    /// Returns error if any count query fails.
    pub fn stats(&self, chain_id: u64) -> Result<StoreStats> {
        let conn = self.conn.borrow();
        let (arb_count, min_block, max_block): (u64, u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(MIN(block_number), 0), COALESCE(MAX(block_number), 0)
             FROM arb_transactions WHERE chain_id = ?",
            rusqlite::params![chain_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let chunk_count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_chunks WHERE chain_id = ?",
            rusqlite::params![chain_id],
            |row| row.get(0),
        )?;
        let summary_count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM address_summaries WHERE chain_id = ?",
            rusqlite::params![chain_id],
            |row| row.get(0),
        )?;
        let trace_count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM interesting_traces",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStats {
            arb_count,
            min_block,
            max_block,
            chunk_count,
            summary_count,
            trace_count,
        })
    }
}
