use crate::classifier::ClassifiedTransaction;
use crate::store::{DerivationIndex, LedgerStore};
use crate::validator::check_spent_marks;
use async_trait::async_trait;
use dg_utxo_core::blockchain::coin::{
    AssetExtra, CoinClass, CoinExtra, LeasedCoin, MarketExtra, SpentCoin, SpentMark, UnspentCoin,
};
use dg_utxo_core::blockchain::derivation_record::DerivationRecord;
use dg_utxo_core::blockchain::outpoint::OutPoint;
use dg_utxo_core::blockchain::script::Script;
use dg_utxo_core::blockchain::sized_bytes::Bytes32;
use dg_utxo_core::blockchain::transaction_record::TransactionRecord;
use dg_utxo_core::errors::LedgerError;
use log::{debug, info, warn};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use time::OffsetDateTime;

const SCHEMA: &str = include_str!("../../sql/schema.sql");

fn store_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Store(e.to_string())
}

fn vout_param(vout: u32) -> Result<i32, LedgerError> {
    i32::try_from(vout).map_err(|_| LedgerError::Store(format!("Output index {vout} exceeds column range")))
}

fn amount_param(amount: u64) -> Result<i64, LedgerError> {
    i64::try_from(amount).map_err(|_| LedgerError::Store(format!("Amount {amount} exceeds column range")))
}

fn extra_columns(class: CoinClass) -> &'static [&'static str] {
    match class {
        CoinClass::Fund => &[],
        CoinClass::Asset => &["origin", "kind", "type"],
        CoinClass::Market => &["origin", "user_id"],
    }
}

fn column_list(prefix: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!(", {prefix}\"{c}\""))
        .collect()
}

fn unspent_columns(class: CoinClass) -> String {
    format!(
        "txid, vout, scripthash, satoshis, lock_until{}",
        column_list("", extra_columns(class))
    )
}

fn spent_columns(class: CoinClass) -> String {
    format!(
        "txid, vout, scripthash, satoshis, spend_txid{}{}",
        if class.records_pubkey() { ", pubkey" } else { "" },
        column_list("", extra_columns(class))
    )
}

fn bytes32(row: &PgRow, column: &str) -> Result<Bytes32, LedgerError> {
    let bytes: Vec<u8> = row.try_get(column).map_err(store_err)?;
    Bytes32::try_from(bytes.as_slice()).map_err(LedgerError::from)
}

fn outpoint(row: &PgRow) -> Result<OutPoint, LedgerError> {
    let vout: i32 = row.try_get("vout").map_err(store_err)?;
    Ok(OutPoint::new(bytes32(row, "txid")?, vout as u32))
}

fn decode_extra(class: CoinClass, row: &PgRow) -> Result<CoinExtra, LedgerError> {
    Ok(match class {
        CoinClass::Fund => CoinExtra::None,
        CoinClass::Asset => CoinExtra::Asset(AssetExtra {
            origin: row.try_get("origin").map_err(store_err)?,
            kind: row.try_get("kind").map_err(store_err)?,
            type_: row.try_get("type").map_err(store_err)?,
        }),
        CoinClass::Market => CoinExtra::Market(MarketExtra {
            origin: row.try_get("origin").map_err(store_err)?,
            user_id: row.try_get("user_id").map_err(store_err)?,
        }),
    })
}

fn decode_unspent(class: CoinClass, row: &PgRow) -> Result<UnspentCoin, LedgerError> {
    let satoshis: i64 = row.try_get("satoshis").map_err(store_err)?;
    Ok(UnspentCoin {
        outpoint: outpoint(row)?,
        script_hash: bytes32(row, "scripthash")?,
        amount: satoshis as u64,
        lease_expiry: row.try_get("lock_until").map_err(store_err)?,
        extra: decode_extra(class, row)?,
    })
}

fn decode_spent(class: CoinClass, row: &PgRow) -> Result<SpentCoin, LedgerError> {
    let script_hash: Option<Vec<u8>> = row.try_get("scripthash").map_err(store_err)?;
    let satoshis: Option<i64> = row.try_get("satoshis").map_err(store_err)?;
    let pubkey: Option<Vec<u8>> = if class.records_pubkey() {
        row.try_get("pubkey").map_err(store_err)?
    } else {
        None
    };
    Ok(SpentCoin {
        outpoint: outpoint(row)?,
        script_hash: script_hash
            .map(|b| Bytes32::try_from(b.as_slice()))
            .transpose()?,
        amount: satoshis.map(|s| s as u64),
        spend_txid: bytes32(row, "spend_txid")?,
        pubkey,
        extra: decode_extra(class, row)?,
    })
}

fn outpoint_params(outpoints: &[OutPoint]) -> Result<(Vec<Vec<u8>>, Vec<i32>), LedgerError> {
    let txids = outpoints.iter().map(|o| o.txid.to_vec()).collect();
    let vouts = outpoints
        .iter()
        .map(|o| vout_param(o.vout))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((txids, vouts))
}

async fn spent_marks(
    conn: &mut PgConnection,
    class: CoinClass,
    outpoints: &[OutPoint],
) -> Result<Vec<SpentMark>, LedgerError> {
    let (txids, vouts) = outpoint_params(outpoints)?;
    let sql = format!(
        "SELECT s.txid, s.vout, s.spend_txid
        FROM {} s
        JOIN UNNEST($1::bytea[], $2::int4[]) AS o(txid, vout) ON s.txid = o.txid AND s.vout = o.vout",
        class.spent_table()
    );
    let rows = sqlx::query(&sql)
        .bind(txids)
        .bind(vouts)
        .fetch_all(&mut *conn)
        .await
        .map_err(store_err)?;
    rows.iter()
        .map(|row| {
            Ok(SpentMark {
                outpoint: outpoint(row)?,
                spend_txid: bytes32(row, "spend_txid")?,
            })
        })
        .collect()
}

/// Moves every consumed coin of `class` into its spent table. A spend of a coin
/// never seen unspent still writes the spent row, without amount or script hash.
async fn record_spends(
    conn: &mut PgConnection,
    classified: &ClassifiedTransaction,
    class: CoinClass,
) -> Result<(), LedgerError> {
    let spends = classified.spends(class);
    if spends.is_empty() {
        return Ok(());
    }
    let outpoints: Vec<OutPoint> = spends.iter().map(|s| s.outpoint).collect();
    let (txids, vouts) = outpoint_params(&outpoints)?;
    let pubkeys: Vec<Option<Vec<u8>>> = spends.iter().map(|s| s.pubkey.clone()).collect();
    let extras = extra_columns(class);
    let (pubkey_insert, pubkey_select) = if class.records_pubkey() {
        (", pubkey", ", s.pubkey")
    } else {
        ("", "")
    };
    let sql = format!(
        "WITH spends AS (
            SELECT * FROM UNNEST($2::bytea[], $3::int4[], $4::bytea[]) AS s(txid, vout, pubkey)
        ), moved AS (
            DELETE FROM {unspent} u USING spends s
            WHERE u.txid = s.txid AND u.vout = s.vout
            RETURNING u.*
        )
        INSERT INTO {spent} (txid, vout, scripthash, satoshis, spend_txid{pubkey_insert}{extra_insert})
        SELECT s.txid, s.vout, m.scripthash, m.satoshis, $1{pubkey_select}{extra_select}
        FROM spends s
        LEFT JOIN moved m ON m.txid = s.txid AND m.vout = s.vout
        ON CONFLICT DO NOTHING",
        unspent = class.unspent_table(),
        spent = class.spent_table(),
        extra_insert = column_list("", extras),
        extra_select = column_list("m.", extras),
    );
    let result = sqlx::query(&sql)
        .bind(classified.txid.to_vec())
        .bind(txids)
        .bind(vouts)
        .bind(pubkeys)
        .execute(&mut *conn)
        .await
        .map_err(store_err)?;
    debug!(
        "{}: {} of {} {class} spends written",
        classified.txid,
        result.rows_affected(),
        spends.len()
    );
    Ok(())
}

/// Inserts new coins of `class`, skipping duplicates and anything already spent.
async fn record_unspent(
    conn: &mut PgConnection,
    classified: &ClassifiedTransaction,
    class: CoinClass,
) -> Result<(), LedgerError> {
    let coins = classified.coins(class);
    if coins.is_empty() {
        return Ok(());
    }
    let outpoints: Vec<OutPoint> = coins.iter().map(|c| c.outpoint).collect();
    let (txids, vouts) = outpoint_params(&outpoints)?;
    let script_hashes: Vec<Vec<u8>> = coins.iter().map(|c| c.script_hash.to_vec()).collect();
    let amounts = coins
        .iter()
        .map(|c| amount_param(c.amount))
        .collect::<Result<Vec<_>, _>>()?;
    let sql = format!(
        "INSERT INTO {unspent} (txid, vout, scripthash, satoshis)
        SELECT c.txid, c.vout, c.scripthash, c.satoshis
        FROM UNNEST($1::bytea[], $2::int4[], $3::bytea[], $4::int8[]) AS c(txid, vout, scripthash, satoshis)
        WHERE NOT EXISTS (SELECT 1 FROM {spent} s WHERE s.txid = c.txid AND s.vout = c.vout)
        ON CONFLICT DO NOTHING",
        unspent = class.unspent_table(),
        spent = class.spent_table(),
    );
    sqlx::query(&sql)
        .bind(txids)
        .bind(vouts)
        .bind(script_hashes)
        .bind(amounts)
        .execute(&mut *conn)
        .await
        .map_err(store_err)?;
    Ok(())
}

async fn commit_in(
    conn: &mut PgConnection,
    classified: &ClassifiedTransaction,
    created_at: OffsetDateTime,
) -> Result<(), LedgerError> {
    for class in CoinClass::ALL {
        record_spends(conn, classified, class).await?;
    }
    // Spent rows of a concurrent winner become visible once its commit lands,
    // so the marks are read only after our own inserts have waited on it.
    for class in CoinClass::ALL {
        let outpoints = classified.spent_outpoints(class);
        if outpoints.is_empty() {
            continue;
        }
        let marks = spent_marks(conn, class, &outpoints).await?;
        check_spent_marks(class, &marks, &classified.txid)?;
    }
    for class in CoinClass::ALL {
        record_unspent(conn, classified, class).await?;
    }
    sqlx::query(
        "INSERT INTO transactions (txid, created_at) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(classified.txid.to_vec())
    .bind(created_at)
    .execute(&mut *conn)
    .await
    .map_err(store_err)?;
    Ok(())
}

pub struct PgLedgerStore {
    pool: PgPool,
}
impl PgLedgerStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        info!("Ledger schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_spent(
        &self,
        class: CoinClass,
        outpoints: &[OutPoint],
    ) -> Result<Vec<SpentMark>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        spent_marks(&mut conn, class, outpoints).await
    }

    async fn commit(
        &self,
        classified: &ClassifiedTransaction,
        created_at: OffsetDateTime,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        match commit_in(&mut tx, classified, created_at).await {
            Ok(()) => {
                tx.commit().await.map_err(store_err)?;
                debug!("{}: committed", classified.txid);
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("{}: rollback failed: {rollback}", classified.txid);
                }
                Err(e)
            }
        }
    }

    async fn get_transaction(&self, txid: &Bytes32) -> Result<Option<TransactionRecord>, LedgerError> {
        let row = sqlx::query("SELECT txid, created_at, node_ack_time FROM transactions WHERE txid = $1")
            .bind(txid.to_vec())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(|row| {
            Ok(TransactionRecord {
                txid: bytes32(&row, "txid")?,
                created_at: row.try_get("created_at").map_err(store_err)?,
                node_ack_time: row.try_get("node_ack_time").map_err(store_err)?,
            })
        })
        .transpose()
    }

    async fn mark_acknowledged(&self, txid: &Bytes32, at: OffsetDateTime) -> Result<(), LedgerError> {
        sqlx::query("UPDATE transactions SET node_ack_time = $2 WHERE txid = $1")
            .bind(txid.to_vec())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn lease_one(
        &self,
        script_hash: &Bytes32,
        now: OffsetDateTime,
        expiry: OffsetDateTime,
    ) -> Result<Option<LeasedCoin>, LedgerError> {
        let row = sqlx::query(
            "UPDATE fund_txos_unspent f
            SET lock_until = $1
            FROM (SELECT txid, vout
                FROM fund_txos_unspent
                WHERE scripthash = $2 AND (lock_until IS NULL OR lock_until < $3)
                LIMIT 1
                FOR UPDATE SKIP LOCKED) l
            WHERE l.txid = f.txid AND l.vout = f.vout
            RETURNING f.txid, f.vout, f.scripthash, f.satoshis, f.lock_until",
        )
        .bind(expiry)
        .bind(script_hash.to_vec())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(|row| {
            let satoshis: i64 = row.try_get("satoshis").map_err(store_err)?;
            Ok(LeasedCoin {
                outpoint: outpoint(&row)?,
                script_hash: bytes32(&row, "scripthash")?,
                amount: satoshis as u64,
                lease_expiry: row.try_get("lock_until").map_err(store_err)?,
            })
        })
        .transpose()
    }

    async fn get_unspent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<UnspentCoin>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE txid = $1 AND vout = $2",
            unspent_columns(class),
            class.unspent_table()
        );
        let row = sqlx::query(&sql)
            .bind(outpoint.txid.to_vec())
            .bind(vout_param(outpoint.vout)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(|row| decode_unspent(class, &row)).transpose()
    }

    async fn get_spent(
        &self,
        class: CoinClass,
        outpoint: &OutPoint,
    ) -> Result<Option<SpentCoin>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE txid = $1 AND vout = $2",
            spent_columns(class),
            class.spent_table()
        );
        let row = sqlx::query(&sql)
            .bind(outpoint.txid.to_vec())
            .bind(vout_param(outpoint.vout)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(|row| decode_spent(class, &row)).transpose()
    }

    async fn unspent_by_script_hash(
        &self,
        class: CoinClass,
        script_hash: &Bytes32,
        limit: usize,
    ) -> Result<Vec<UnspentCoin>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE scripthash = $1 ORDER BY txid, vout LIMIT $2",
            unspent_columns(class),
            class.unspent_table()
        );
        let rows = sqlx::query(&sql)
            .bind(script_hash.to_vec())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(|row| decode_unspent(class, row)).collect()
    }

    async fn unspent_count(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE scripthash = $1",
            class.unspent_table()
        );
        let count: i64 = sqlx::query(&sql)
            .bind(script_hash.to_vec())
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("count"))
            .map_err(store_err)?;
        Ok(count as u64)
    }

    async fn balance(&self, class: CoinClass, script_hash: &Bytes32) -> Result<u64, LedgerError> {
        let sql = format!(
            "SELECT COALESCE(SUM(satoshis), 0)::BIGINT AS balance FROM {} WHERE scripthash = $1",
            class.unspent_table()
        );
        let balance: i64 = sqlx::query(&sql)
            .bind(script_hash.to_vec())
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("balance"))
            .map_err(store_err)?;
        Ok(balance as u64)
    }
}

#[async_trait]
impl DerivationIndex for PgLedgerStore {
    async fn derivations(
        &self,
        pubkeys: &[Vec<u8>],
        scripts: &[Script],
    ) -> Result<Vec<DerivationRecord>, LedgerError> {
        let scripts: Vec<Vec<u8>> = scripts.iter().map(|s| s.as_bytes().to_vec()).collect();
        let rows = sqlx::query(
            "SELECT script, pubkey, path FROM derivations WHERE pubkey = ANY($1) OR script = ANY($2)",
        )
        .bind(pubkeys.to_vec())
        .bind(scripts)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter()
            .map(|row| {
                let script: Vec<u8> = row.try_get("script").map_err(store_err)?;
                Ok(DerivationRecord {
                    script: Script::new(script),
                    pubkey: row.try_get("pubkey").map_err(store_err)?,
                    path: row.try_get("path").map_err(store_err)?,
                })
            })
            .collect()
    }
}
