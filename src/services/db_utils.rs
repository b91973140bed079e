use actix::{Actor, Addr, SyncContext};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;

use crate::types::ServiceError;

const INIT_SCHEMA: &str = include_str!("../../migrations/00000000000000_init/up.sql");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub struct PgActor(pub PgPool);

pub struct AppState {
    pub pg_db: Addr<PgActor>,
}

impl Actor for PgActor {
    type Context = SyncContext<Self>;
}

impl PgActor {
    pub fn connection(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, ServiceError> {
        Ok(self.0.get()?)
    }
}

pub fn get_db_pool(db_url: &str, max_size: u32) -> Result<PgPool, ServiceError> {
    let manager: ConnectionManager<PgConnection> = ConnectionManager::<PgConnection>::new(db_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|err| ServiceError::Internal(format!("Pool initialization failed: {err}")))
}

/// Creates missing tables and indexes; safe to run on every start.
pub fn bootstrap_schema(conn: &mut PgConnection) -> Result<(), ServiceError> {
    conn.batch_execute(INIT_SCHEMA)?;
    Ok(())
}
