use std::collections::HashMap;

use diesel::{ExpressionMethods, QueryDsl, QueryResult, RunQueryDsl, SqliteConnection};
use rand::seq::SliceRandom;
use tracing::warn;

use crate::services::db_handling;

pub const DEFAULT_CAPACITY_KEY: &str = "default_table_capacity";
pub const DEFAULT_TABLE_CAPACITY: i64 = 10;

/// Snapshot of one table's seating state, in listing order (name ascending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAvailability {
    pub id: i64,
    pub effective_capacity: i64,
    pub occupancy: i64,
}

impl TableAvailability {
    pub fn free_seats(&self) -> i64 {
        self.effective_capacity - self.occupancy
    }
}

/// Picks a table with at least `needed` free seats.
///
/// The choice among qualifying tables is uniform-random on purpose; callers
/// must not rely on any particular table being returned, only on the
/// capacity invariant. When nothing qualifies the first table in listing
/// order is returned as a soft-fail default, and `None` only when no tables
/// exist at all.
pub fn pick_table(tables: &[TableAvailability], needed: i64) -> Option<i64> {
    let candidates: Vec<i64> = tables
        .iter()
        .filter(|t| t.free_seats() >= needed)
        .map(|t| t.id)
        .collect();

    if let Some(id) = candidates.choose(&mut rand::thread_rng()) {
        return Some(*id);
    }

    tables.first().map(|t| t.id)
}

/// Assigns a table for a party of `needed` guests from live database state.
///
/// Never fails upward: a lookup error is logged and mapped to `None`, which
/// callers treat as "unassigned".
pub fn assign(conn: &mut SqliteConnection, needed: i64) -> Option<i64> {
    match availability_snapshot(conn) {
        Ok(snapshot) => pick_table(&snapshot, needed),
        Err(err) => {
            warn!(error = %err, "table assignment lookup failed, leaving party unassigned");
            None
        }
    }
}

/// Current (effective capacity, occupancy) per table, in listing order.
pub fn availability_snapshot(conn: &mut SqliteConnection) -> QueryResult<Vec<TableAvailability>> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::table_id;

    let default_capacity = db_handling::get_setting(conn, DEFAULT_CAPACITY_KEY)?
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TABLE_CAPACITY);

    let tables = db_handling::list_tables(conn)?;

    let occupancy: HashMap<i64, i64> = guests
        .filter(table_id.is_not_null())
        .group_by(table_id)
        .select((table_id, diesel::dsl::count_star()))
        .load::<(Option<i64>, i64)>(conn)?
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect();

    Ok(tables
        .into_iter()
        .map(|table| TableAvailability {
            id: table.id,
            effective_capacity: table
                .capacity
                .map(i64::from)
                .unwrap_or(default_capacity),
            occupancy: occupancy.get(&table.id).copied().unwrap_or(0),
        })
        .collect())
}
