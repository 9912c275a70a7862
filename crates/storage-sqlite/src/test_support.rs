//! Fixtures shared by the repository tests.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::tempdir;

use accountant_core::transactions::{NewTransaction, TransactionType};

use crate::db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
use crate::schema::wallets;
use crate::sync::escape_sqlite_str;

pub const USER: &str = "3f9c1f4e-2a51-4d55-9e0e-6f1a4b7c8d01";
pub const OTHER_USER: &str = "9b2e7d10-5c3a-4f7e-8a61-0d4c2b9e1f02";

pub fn setup_db() -> (Arc<DbPool>, WriteHandle) {
    let app_data = tempdir()
        .expect("tempdir")
        .keep()
        .to_string_lossy()
        .to_string();
    let db_path = init(&app_data).expect("init db");
    run_migrations(&db_path).expect("migrate db");
    let pool = create_pool(&db_path).expect("create pool");
    let writer = spawn_writer(pool.as_ref().clone());
    (pool, writer)
}

pub fn insert_wallet(pool: &DbPool, user_id: &str, balance: &str) -> uuid::Uuid {
    let id = uuid::Uuid::new_v4();
    let mut conn = get_connection(pool).expect("conn");
    insert_wallet_with_id(&mut conn, &id.to_string(), user_id, balance);
    id
}

pub fn insert_wallet_with_id(conn: &mut SqliteConnection, id: &str, user_id: &str, balance: &str) {
    let sql = format!(
        "INSERT INTO wallets (id, user_id, name, balance) VALUES ('{}', '{}', 'Checking', '{}')",
        escape_sqlite_str(id),
        escape_sqlite_str(user_id),
        escape_sqlite_str(balance)
    );
    diesel::sql_query(sql).execute(conn).expect("insert wallet");
}

pub fn wallet_balance(pool: &DbPool, wallet_id: &uuid::Uuid) -> Decimal {
    let mut conn = get_connection(pool).expect("conn");
    let raw = wallets::table
        .find(wallet_id.to_string())
        .select(wallets::balance)
        .first::<String>(&mut conn)
        .expect("wallet balance");
    Decimal::from_str(&raw).expect("decimal balance")
}

pub fn expense(wallet_id: uuid::Uuid, amount: Decimal, date: &str) -> NewTransaction {
    NewTransaction {
        wallet_id,
        category_id: None,
        payment_method_id: None,
        amount,
        title: "Rent".to_string(),
        notes: None,
        date: chrono::DateTime::parse_from_rfc3339(date)
            .expect("rfc3339 date")
            .with_timezone(&chrono::Utc),
        is_income: false,
        transaction_type: TransactionType::Regular,
        special_type: 0,
        is_paid: true,
        original_due_date: None,
        skip_paid: false,
        paired_transaction_id: None,
        recurring_config_id: None,
        receipt_image_url: None,
    }
}
