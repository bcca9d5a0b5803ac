use actix::{Actor, Addr, SyncContext};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl, SqliteConnection};

use crate::services::auth;
use crate::services::email::EmailNotifier;
use crate::types::{AppConfig, BootstrapError, PoolInitializationError};

pub struct DbActor(pub Pool<ConnectionManager<SqliteConnection>>);

#[derive(Clone)]
pub struct AppState {
    pub db: Addr<DbActor>,
    pub config: AppConfig,
    pub notifier: EmailNotifier,
}

impl Actor for DbActor {
    type Context = SyncContext<Self>;
}

#[derive(Debug, Clone, Copy)]
struct SqliteOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqliteOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        // Several sync workers share one database file.
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn get_db_pool(
    db_url: &str,
) -> Result<Pool<ConnectionManager<SqliteConnection>>, PoolInitializationError> {
    let manager: ConnectionManager<SqliteConnection> = ConnectionManager::new(db_url);
    match Pool::builder()
        .connection_customizer(Box::new(SqliteOptions))
        .build(manager)
    {
        Ok(val) => Ok(val),
        Err(err) => Err(PoolInitializationError(err.to_string())),
    }
}

const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS guests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    attending INTEGER NOT NULL DEFAULT 0,
    meal_type TEXT NOT NULL DEFAULT 'normal',
    needs_transport INTEGER NOT NULL DEFAULT 0,
    allergies TEXT,
    notes TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    capacity INTEGER,
    shape TEXT NOT NULL DEFAULT 'round',
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'admin'
);

CREATE TABLE IF NOT EXISTS companions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guest_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    relation TEXT,
    meal_type TEXT DEFAULT 'normal',
    allergies TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS preferences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guest_id INTEGER NOT NULL,
    music_preference TEXT,
    seat_location TEXT,
    dietary_restriction TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

INSERT OR IGNORE INTO settings (key, value) VALUES ('default_table_capacity', '10');
";

// Seating columns arrived after the first deployments; databases created
// before that lack them, so the ALTERs run every startup and a failure on an
// already-present column is ignored.
const SCHEMA_EVOLUTION: &[&str] = &[
    "ALTER TABLE guests ADD COLUMN table_id BIGINT",
    "ALTER TABLE guests ADD COLUMN table_name TEXT",
];

/// Creates or upgrades the schema on one connection. Idempotent.
pub fn init_schema(conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
    conn.batch_execute(SCHEMA_DDL)?;
    for stmt in SCHEMA_EVOLUTION {
        let _ = diesel::sql_query(*stmt).execute(conn);
    }
    Ok(())
}

/// Schema bootstrap plus first-run seeding of the admin account.
pub fn init_db(
    pool: &Pool<ConnectionManager<SqliteConnection>>,
    config: &AppConfig,
) -> Result<(), BootstrapError> {
    use crate::schema::users::dsl::users;
    use crate::schema::users::{password, role, username};

    let mut conn = pool
        .get()
        .map_err(|err| BootstrapError::Pool(err.to_string()))?;

    init_schema(&mut conn)?;

    let user_count: i64 = users.count().get_result(&mut conn)?;
    if user_count == 0 {
        let hash = auth::hash_password(&config.admin_password)
            .map_err(|err| BootstrapError::PasswordHash(err.to_string()))?;
        diesel::insert_into(users)
            .values((
                username.eq("admin"),
                password.eq(hash),
                role.eq(auth::Role::Admin.as_str()),
            ))
            .execute(&mut conn)?;
        tracing::info!("seeded default admin user");
    }

    Ok(())
}
