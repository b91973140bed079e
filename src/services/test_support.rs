//! Fixtures for tests that need a scratch Postgres database in
//! `TEST_PG_DATABASE_URL`.

use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::PgConnection;

use crate::services::db_models::{Restaurant, User};
use crate::services::db_utils::{bootstrap_schema, get_db_pool, PgPool};
use crate::services::directory::{create_restaurant, register_user, RestaurantCreate, TableSpec, UserCreate};
use crate::services::reservations::generate_reservation_code;

/// `None` (with a notice on stderr) when no database is configured.
pub fn test_pool(test: &str) -> Option<PgPool> {
    dotenv::dotenv().ok();
    let Ok(url) = std::env::var("TEST_PG_DATABASE_URL") else {
        eprintln!("skipping {test}: TEST_PG_DATABASE_URL is not set");
        return None;
    };
    let pool = get_db_pool(&url, 4).unwrap();
    bootstrap_schema(&mut pool.get().unwrap()).unwrap();
    Some(pool)
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", generate_reservation_code().to_lowercase())
}

pub fn at(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

pub fn day() -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(7)
}

pub const PASSWORD: &str = "correct horse battery";

pub fn register(conn: &mut PgConnection) -> User {
    register_user(
        conn,
        UserCreate {
            email: format!("{}@example.com", unique("guest")),
            password: PASSWORD.into(),
            full_name: "Test Guest".into(),
            phone: None,
        },
    )
    .unwrap()
}

/// Open 18:00 to 22:00 on an hourly grid.
pub fn restaurant(conn: &mut PgConnection, capacities: &[i32]) -> Restaurant {
    create_restaurant(
        conn,
        RestaurantCreate {
            restaurant_name: unique("bistro"),
            address: "1 Test Street".into(),
            cuisine: None,
            description: None,
            opening_time: at(18),
            closing_time: at(22),
            slot_minutes: 60,
            tables: capacities.iter().map(|&capacity| TableSpec { capacity }).collect(),
        },
    )
    .unwrap()
    .restaurant
}
