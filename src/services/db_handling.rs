use actix::Handler;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error};
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, QueryDsl,
    QueryResult, RunQueryDsl, SqliteConnection, TextExpressionMethods,
};
use tracing::warn;

use crate::services::assignment;
use crate::services::db_models::{Guest, Setting, TableShape, User, WeddingTable};
use crate::services::db_utils::DbActor;
use crate::services::insertable::{GuestPatch, NewGuest, NewTable, TableChangeset};
use crate::services::messages::{
    CreateGuestParty, CreateTable, DeleteGuest, DeleteTable, FetchGuest, FetchGuests,
    FetchSettings, FetchTable, FetchTables, FindUserByUsername, GuestDeleted, PatchGuest,
    ResetGuestData, ResetOutcome, SeedSampleGuests, SettingUpdated, TableRemoval, TableUnassigned,
    UpdateGuest, UpdateSetting, UpdateTable,
};

fn establish_connection(
    pool: &Pool<ConnectionManager<SqliteConnection>>,
) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, Error> {
    match pool.get() {
        Ok(val) => Ok(val),
        Err(_) => Err(connection_err()),
    }
}

fn connection_err() -> Error {
    Error::DatabaseError(
        DatabaseErrorKind::ClosedConnection,
        Box::new("Failed to establish connection".to_owned()),
    )
}

// ---- guests ----

pub fn list_guests(conn: &mut SqliteConnection, msg: &FetchGuests) -> QueryResult<Vec<Guest>> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::{attending, email, name, needs_transport, phone};

    let mut query = guests.into_boxed();

    if let Some(flag) = msg.attending {
        query = query.filter(attending.eq(flag));
    }
    if let Some(flag) = msg.needs_transport {
        query = query.filter(needs_transport.eq(flag));
    }
    if let Some(term) = &msg.search {
        // SQLite LIKE is case-insensitive for ASCII.
        let pattern = format!("%{term}%");
        query = query.filter(
            name.like(pattern.clone())
                .or(email.like(pattern.clone()))
                .or(phone.like(pattern)),
        );
    }

    query.order(name.asc()).load::<Guest>(conn)
}

pub fn get_guest(conn: &mut SqliteConnection, id: i64) -> QueryResult<Guest> {
    use crate::schema::guests::dsl::guests;

    guests.find(id).first(conn)
}

pub fn create_guest(conn: &mut SqliteConnection, new_guest: &NewGuest) -> QueryResult<Guest> {
    use crate::schema::guests::dsl::guests;

    diesel::insert_into(guests)
        .values(new_guest)
        .get_result::<Guest>(conn)
}

/// Inserts the primary guest and the companions in one transaction, with one
/// table chosen for the whole party. Assignment failures degrade to an
/// unassigned party instead of aborting the insert.
pub fn create_party(conn: &mut SqliteConnection, msg: &CreateGuestParty) -> QueryResult<Vec<Guest>> {
    conn.transaction(|conn| {
        let chosen_table = assignment::assign(conn, msg.party_size);

        let mut created = Vec::with_capacity(msg.party_size.max(1) as usize);
        created.push(create_guest(
            conn,
            &NewGuest {
                name: msg.name.clone(),
                email: msg.email.clone(),
                phone: msg.phone.clone(),
                attending: msg.attending,
                meal_type: msg.meal_type.clone(),
                needs_transport: msg.needs_transport,
                allergies: msg.allergies.clone(),
                notes: msg.notes.clone(),
                table_id: chosen_table,
            },
        )?);

        for i in 1..msg.party_size {
            created.push(create_guest(
                conn,
                &NewGuest {
                    name: format!("{} - Companion {i}", msg.name),
                    email: None,
                    phone: None,
                    attending: msg.attending,
                    meal_type: "normal".to_owned(),
                    needs_transport: msg.needs_transport,
                    allergies: None,
                    notes: Some(format!("Companion of {}", msg.name)),
                    table_id: chosen_table,
                },
            )?);
        }

        Ok(created)
    })
}

pub fn update_guest(conn: &mut SqliteConnection, msg: &UpdateGuest) -> QueryResult<Guest> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::{
        allergies, attending, email, meal_type, name, needs_transport, notes, phone, table_id,
        updated_at,
    };

    let existing = get_guest(conn, msg.id)?;

    diesel::update(guests.find(msg.id))
        .set((
            name.eq(msg.name.clone()),
            email.eq(msg.email.clone()),
            phone.eq(msg.phone.clone()),
            attending.eq(msg.attending.unwrap_or(existing.attending)),
            meal_type.eq(msg
                .meal_type
                .clone()
                .unwrap_or_else(|| "normal".to_owned())),
            needs_transport.eq(msg.needs_transport.unwrap_or(existing.needs_transport)),
            allergies.eq(msg.allergies.clone()),
            notes.eq(msg.notes.clone()),
            table_id.eq(msg.table_id),
            updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;

    get_guest(conn, msg.id)
}

pub fn patch_guest(conn: &mut SqliteConnection, id: i64, patch: &GuestPatch) -> QueryResult<Guest> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::updated_at;

    // An empty patch returns the stored row as-is, updated_at untouched.
    let existing = get_guest(conn, id)?;
    if patch.is_empty() {
        return Ok(existing);
    }

    diesel::update(guests.find(id))
        .set((patch, updated_at.eq(diesel::dsl::now)))
        .execute(conn)?;

    get_guest(conn, id)
}

pub fn delete_guest(conn: &mut SqliteConnection, id: i64) -> QueryResult<GuestDeleted> {
    use crate::schema::guests::dsl::guests;

    get_guest(conn, id)?;
    let rows = diesel::delete(guests.find(id)).execute(conn)?;

    Ok(GuestDeleted {
        deleted_id: id,
        rows_affected: rows,
    })
}

pub fn unassign_guests_from_table(
    conn: &mut SqliteConnection,
    table: i64,
) -> QueryResult<TableUnassigned> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::{table_id, updated_at};

    let rows = diesel::update(guests.filter(table_id.eq(table)))
        .set((table_id.eq(None::<i64>), updated_at.eq(diesel::dsl::now)))
        .execute(conn)?;

    Ok(TableUnassigned {
        table_id: table,
        rows_affected: rows,
    })
}

// ---- tables ----

pub fn list_tables(conn: &mut SqliteConnection) -> QueryResult<Vec<WeddingTable>> {
    use crate::schema::tables::dsl::tables;
    use crate::schema::tables::name;

    tables.order(name.asc()).load::<WeddingTable>(conn)
}

pub fn get_table(conn: &mut SqliteConnection, id: i64) -> QueryResult<WeddingTable> {
    use crate::schema::tables::dsl::tables;

    tables.find(id).first(conn)
}

/// Next free auto-generated name, "Table N". Scans both the registered table
/// names and the legacy per-guest table name column so renames and residual
/// data never produce a collision.
pub fn next_table_name(conn: &mut SqliteConnection) -> QueryResult<String> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::table_name;
    use crate::schema::tables::dsl::tables;
    use crate::schema::tables::name;

    let mut names: Vec<String> = tables.select(name).load(conn)?;
    let legacy: Vec<Option<String>> = guests.select(table_name).distinct().load(conn)?;
    names.extend(legacy.into_iter().flatten());

    Ok(next_in_sequence(&names))
}

fn next_in_sequence(names: &[String]) -> String {
    let mut highest: i64 = 0;
    for candidate in names {
        if let Some(rest) = candidate.strip_prefix("Table ") {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = rest.parse::<i64>() {
                    highest = highest.max(n);
                }
            }
        }
    }
    format!("Table {}", highest + 1)
}

pub fn create_table(conn: &mut SqliteConnection, msg: &CreateTable) -> QueryResult<WeddingTable> {
    use crate::schema::tables::dsl::tables;

    let table_name = match &msg.name {
        Some(n) => n.clone(),
        None => next_table_name(conn)?,
    };

    diesel::insert_into(tables)
        .values(&NewTable {
            name: table_name,
            capacity: msg.capacity,
            shape: msg.shape.unwrap_or(TableShape::Round),
        })
        .get_result::<WeddingTable>(conn)
}

/// Applies only the supplied fields. Zero rows affected is the caller's
/// not-found signal.
pub fn update_table(
    conn: &mut SqliteConnection,
    id: i64,
    changes: &TableChangeset,
) -> QueryResult<usize> {
    use crate::schema::tables::dsl::tables;
    use crate::schema::tables::updated_at;

    if changes.is_empty() {
        return Ok(0);
    }

    diesel::update(tables.find(id))
        .set((changes, updated_at.eq(diesel::dsl::now)))
        .execute(conn)
}

/// Dual-path removal: an id-shaped key that resolves to a table takes the
/// primary path; otherwise the key is treated as a table name (clients used
/// to address tables by name). Unassignment and row removal are both
/// attempted even when one of them fails.
pub fn delete_table(conn: &mut SqliteConnection, key: &str) -> QueryResult<TableRemoval> {
    use crate::schema::tables::dsl::tables;
    use crate::schema::tables::name;

    if let Ok(id) = key.parse::<i64>() {
        let found: Option<WeddingTable> = tables.find(id).first(conn).optional()?;
        if let Some(table) = found {
            let unassigned = match unassign_guests_from_table(conn, table.id) {
                Ok(res) => res.rows_affected,
                Err(err) => {
                    warn!(table = table.id, error = %err, "failed to unassign guests");
                    0
                }
            };
            let removed = match diesel::delete(tables.find(table.id)).execute(conn) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(table = table.id, error = %err, "failed to delete table row");
                    0
                }
            };
            return Ok(TableRemoval {
                id: Some(table.id),
                name: table.name,
                unassigned_guests: unassigned,
                config_deleted: removed > 0,
            });
        }
    }

    // Legacy path: the key is a table name.
    let by_name: Option<WeddingTable> = tables
        .filter(name.eq(key))
        .first(conn)
        .optional()?;

    let mut unassigned = 0;
    if let Some(table) = &by_name {
        unassigned += unassign_guests_from_table(conn, table.id)?.rows_affected;
    }
    unassigned += clear_legacy_table_name(conn, key)?;

    let removed = diesel::delete(tables.filter(name.eq(key))).execute(conn)?;

    if removed == 0 && unassigned == 0 {
        return Err(Error::NotFound);
    }

    Ok(TableRemoval {
        id: by_name.map(|t| t.id),
        name: key.to_owned(),
        unassigned_guests: unassigned,
        config_deleted: removed > 0,
    })
}

fn clear_legacy_table_name(conn: &mut SqliteConnection, key: &str) -> QueryResult<usize> {
    use crate::schema::guests::dsl::guests;
    use crate::schema::guests::{table_name, updated_at};

    diesel::update(guests.filter(table_name.eq(key)))
        .set((
            table_name.eq(None::<String>),
            updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
}

// ---- settings ----

pub fn get_setting(conn: &mut SqliteConnection, key_name: &str) -> QueryResult<Option<String>> {
    use crate::schema::settings::dsl::settings;
    use crate::schema::settings::value;

    settings
        .find(key_name)
        .select(value)
        .first::<String>(conn)
        .optional()
}

/// Updates an existing key only; the key space is pre-seeded and `set` never
/// creates rows.
pub fn update_setting(
    conn: &mut SqliteConnection,
    key_name: &str,
    new_value: &str,
) -> QueryResult<SettingUpdated> {
    use crate::schema::settings::dsl::settings;
    use crate::schema::settings::{updated_at, value};

    let rows = diesel::update(settings.find(key_name))
        .set((value.eq(new_value), updated_at.eq(diesel::dsl::now)))
        .execute(conn)?;

    Ok(SettingUpdated {
        key: key_name.to_owned(),
        value: new_value.to_owned(),
        rows_affected: rows,
    })
}

pub fn list_settings(conn: &mut SqliteConnection) -> QueryResult<Vec<Setting>> {
    use crate::schema::settings::dsl::settings;
    use crate::schema::settings::key;

    settings.order(key.asc()).load::<Setting>(conn)
}

// ---- users ----

pub fn find_user_by_username(conn: &mut SqliteConnection, needle: &str) -> QueryResult<User> {
    use crate::schema::users::dsl::users;
    use crate::schema::users::username;

    users.filter(username.eq(needle)).first(conn)
}

// ---- dev/test surface ----

pub fn seed_sample_guests(conn: &mut SqliteConnection) -> QueryResult<usize> {
    let samples = [
        NewGuest {
            name: "Alice Harper".to_owned(),
            email: Some("alice.harper@example.com".to_owned()),
            phone: Some("612345678".to_owned()),
            attending: true,
            meal_type: "normal".to_owned(),
            needs_transport: true,
            allergies: None,
            notes: Some("Friend of the family".to_owned()),
            table_id: None,
        },
        NewGuest {
            name: "Ben Castillo".to_owned(),
            email: Some("ben.castillo@example.com".to_owned()),
            phone: Some("623456789".to_owned()),
            attending: true,
            meal_type: "vegetarian".to_owned(),
            needs_transport: false,
            allergies: Some("Gluten".to_owned()),
            notes: None,
            table_id: None,
        },
        NewGuest {
            name: "Carla Nguyen".to_owned(),
            email: Some("carla.nguyen@example.com".to_owned()),
            phone: Some("634567890".to_owned()),
            attending: true,
            meal_type: "normal".to_owned(),
            needs_transport: true,
            allergies: None,
            notes: Some("Coworker".to_owned()),
            table_id: None,
        },
        NewGuest {
            name: "Daniel Moore".to_owned(),
            email: Some("daniel.moore@example.com".to_owned()),
            phone: Some("645678901".to_owned()),
            attending: false,
            meal_type: "normal".to_owned(),
            needs_transport: false,
            allergies: None,
            notes: Some("Cannot attend for work reasons".to_owned()),
            table_id: None,
        },
        NewGuest {
            name: "Elena Petrov".to_owned(),
            email: Some("elena.petrov@example.com".to_owned()),
            phone: Some("656789012".to_owned()),
            attending: true,
            meal_type: "normal".to_owned(),
            needs_transport: false,
            allergies: Some("Lactose".to_owned()),
            notes: None,
            table_id: None,
        },
        NewGuest {
            name: "Frank Osei".to_owned(),
            email: Some("frank.osei@example.com".to_owned()),
            phone: Some("667890123".to_owned()),
            attending: true,
            meal_type: "vegan".to_owned(),
            needs_transport: true,
            allergies: Some("Nuts".to_owned()),
            notes: None,
            table_id: None,
        },
    ];

    conn.transaction(|conn| {
        for sample in &samples {
            create_guest(conn, sample)?;
        }
        Ok(samples.len())
    })
}

/// Clears guest data and the dependent legacy rows, then resets their
/// identity counters. `sqlite_sequence` only exists once an AUTOINCREMENT
/// insert has happened, so that cleanup is best-effort.
pub fn reset_guest_data(conn: &mut SqliteConnection) -> QueryResult<ResetOutcome> {
    use crate::schema::guests::dsl::guests;

    let guests_deleted = diesel::delete(guests).execute(conn)?;
    let companions = diesel::sql_query("DELETE FROM companions").execute(conn)?;
    let preferences = diesel::sql_query("DELETE FROM preferences").execute(conn)?;
    let _ = diesel::sql_query(
        "DELETE FROM sqlite_sequence WHERE name IN ('guests', 'companions', 'preferences')",
    )
    .execute(conn);

    Ok(ResetOutcome {
        guests: guests_deleted,
        companions,
        preferences,
    })
}

// ---- actor plumbing ----

impl Handler<FetchGuests> for DbActor {
    type Result = QueryResult<Vec<Guest>>;

    fn handle(&mut self, msg: FetchGuests, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        list_guests(&mut conn, &msg)
    }
}

impl Handler<FetchGuest> for DbActor {
    type Result = QueryResult<Guest>;

    fn handle(&mut self, msg: FetchGuest, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        get_guest(&mut conn, msg.0)
    }
}

impl Handler<CreateGuestParty> for DbActor {
    type Result = QueryResult<Vec<Guest>>;

    fn handle(&mut self, msg: CreateGuestParty, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        create_party(&mut conn, &msg)
    }
}

impl Handler<UpdateGuest> for DbActor {
    type Result = QueryResult<Guest>;

    fn handle(&mut self, msg: UpdateGuest, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        update_guest(&mut conn, &msg)
    }
}

impl Handler<PatchGuest> for DbActor {
    type Result = QueryResult<Guest>;

    fn handle(&mut self, msg: PatchGuest, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        patch_guest(&mut conn, msg.id, &msg.patch)
    }
}

impl Handler<DeleteGuest> for DbActor {
    type Result = QueryResult<GuestDeleted>;

    fn handle(&mut self, msg: DeleteGuest, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        delete_guest(&mut conn, msg.0)
    }
}

impl Handler<FetchTables> for DbActor {
    type Result = QueryResult<Vec<WeddingTable>>;

    fn handle(&mut self, _msg: FetchTables, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        list_tables(&mut conn)
    }
}

impl Handler<FetchTable> for DbActor {
    type Result = QueryResult<WeddingTable>;

    fn handle(&mut self, msg: FetchTable, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        get_table(&mut conn, msg.0)
    }
}

impl Handler<CreateTable> for DbActor {
    type Result = QueryResult<WeddingTable>;

    fn handle(&mut self, msg: CreateTable, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        create_table(&mut conn, &msg)
    }
}

impl Handler<UpdateTable> for DbActor {
    type Result = QueryResult<usize>;

    fn handle(&mut self, msg: UpdateTable, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        update_table(&mut conn, msg.id, &msg.changes)
    }
}

impl Handler<DeleteTable> for DbActor {
    type Result = QueryResult<TableRemoval>;

    fn handle(&mut self, msg: DeleteTable, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        delete_table(&mut conn, &msg.0)
    }
}

impl Handler<UpdateSetting> for DbActor {
    type Result = QueryResult<SettingUpdated>;

    fn handle(&mut self, msg: UpdateSetting, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        update_setting(&mut conn, &msg.key, &msg.value)
    }
}

impl Handler<FetchSettings> for DbActor {
    type Result = QueryResult<Vec<Setting>>;

    fn handle(&mut self, _msg: FetchSettings, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        list_settings(&mut conn)
    }
}

impl Handler<FindUserByUsername> for DbActor {
    type Result = QueryResult<User>;

    fn handle(&mut self, msg: FindUserByUsername, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        find_user_by_username(&mut conn, &msg.0)
    }
}

impl Handler<SeedSampleGuests> for DbActor {
    type Result = QueryResult<usize>;

    fn handle(&mut self, _msg: SeedSampleGuests, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        seed_sample_guests(&mut conn)
    }
}

impl Handler<ResetGuestData> for DbActor {
    type Result = QueryResult<ResetOutcome>;

    fn handle(&mut self, _msg: ResetGuestData, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = establish_connection(&self.0)?;
        reset_guest_data(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use diesel::Connection;

    use super::*;
    use crate::services::db_utils::init_schema;

    fn test_conn() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").expect("in-memory db");
        init_schema(&mut conn).expect("schema");
        conn
    }

    fn plain_guest(name: &str) -> NewGuest {
        NewGuest {
            name: name.to_owned(),
            email: None,
            phone: None,
            attending: false,
            meal_type: "normal".to_owned(),
            needs_transport: false,
            allergies: None,
            notes: None,
            table_id: None,
        }
    }

    #[test]
    fn auto_name_starts_at_one() {
        let mut conn = test_conn();
        assert_eq!(next_table_name(&mut conn).unwrap(), "Table 1");
    }

    #[test]
    fn auto_name_skips_past_highest_existing_number() {
        let mut conn = test_conn();
        create_table(
            &mut conn,
            &CreateTable {
                name: Some("Table 3".to_owned()),
                capacity: None,
                shape: None,
            },
        )
        .unwrap();
        assert_eq!(next_table_name(&mut conn).unwrap(), "Table 4");

        // Lower numbers created later do not lower the sequence.
        create_table(
            &mut conn,
            &CreateTable {
                name: Some("Table 1".to_owned()),
                capacity: None,
                shape: None,
            },
        )
        .unwrap();
        assert_eq!(next_table_name(&mut conn).unwrap(), "Table 4");
    }

    #[test]
    fn auto_name_considers_legacy_guest_table_names() {
        let mut conn = test_conn();
        create_guest(&mut conn, &plain_guest("Legacy Holder")).unwrap();
        diesel::sql_query("UPDATE guests SET table_name = 'Table 7'")
            .execute(&mut conn)
            .unwrap();

        assert_eq!(next_table_name(&mut conn).unwrap(), "Table 8");
    }

    #[test]
    fn non_matching_names_are_ignored_by_the_sequence() {
        assert_eq!(next_in_sequence(&["Head table".to_owned()]), "Table 1");
        assert_eq!(
            next_in_sequence(&["Table 2b".to_owned(), "Table ".to_owned()]),
            "Table 1"
        );
        assert_eq!(
            next_in_sequence(&["Table 10".to_owned(), "Table 2".to_owned()]),
            "Table 11"
        );
    }

    #[test]
    fn duplicate_table_name_is_a_unique_violation() {
        let mut conn = test_conn();
        let msg = CreateTable {
            name: Some("Head table".to_owned()),
            capacity: Some(8),
            shape: Some(TableShape::Square),
        };
        create_table(&mut conn, &msg).unwrap();
        let err = create_table(&mut conn, &msg).unwrap_err();
        assert!(matches!(
            err,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
        ));
    }

    #[test]
    fn list_guests_filters_are_conjunctive() {
        let mut conn = test_conn();
        let mut attending_with_bus = plain_guest("Ada");
        attending_with_bus.attending = true;
        attending_with_bus.needs_transport = true;
        create_guest(&mut conn, &attending_with_bus).unwrap();

        let mut attending_no_bus = plain_guest("Bob");
        attending_no_bus.attending = true;
        create_guest(&mut conn, &attending_no_bus).unwrap();

        let found = list_guests(
            &mut conn,
            &FetchGuests {
                attending: Some(true),
                needs_transport: Some(true),
                search: None,
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ada");
    }

    #[test]
    fn list_guests_search_matches_name_email_and_phone() {
        let mut conn = test_conn();
        let mut by_mail = plain_guest("Cleo");
        by_mail.email = Some("cleo@example.com".to_owned());
        create_guest(&mut conn, &by_mail).unwrap();

        let mut by_phone = plain_guest("Dora");
        by_phone.phone = Some("698111222".to_owned());
        create_guest(&mut conn, &by_phone).unwrap();

        let by_search = |conn: &mut SqliteConnection, term: &str| {
            list_guests(
                conn,
                &FetchGuests {
                    attending: None,
                    needs_transport: None,
                    search: Some(term.to_owned()),
                },
            )
            .unwrap()
        };

        assert_eq!(by_search(&mut conn, "example.com").len(), 1);
        assert_eq!(by_search(&mut conn, "698").len(), 1);
        // Case-insensitive containment on the name.
        assert_eq!(by_search(&mut conn, "cLeO").len(), 1);
        assert!(by_search(&mut conn, "nobody").is_empty());
    }

    #[test]
    fn guests_are_listed_by_name_ascending() {
        let mut conn = test_conn();
        create_guest(&mut conn, &plain_guest("Zoe")).unwrap();
        create_guest(&mut conn, &plain_guest("Abe")).unwrap();

        let all = list_guests(&mut conn, &FetchGuests::default()).unwrap();
        let names: Vec<&str> = all.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Abe", "Zoe"]);
    }

    #[test]
    fn empty_patch_returns_row_unmodified() {
        let mut conn = test_conn();
        let guest = create_guest(&mut conn, &plain_guest("Eve")).unwrap();

        let same = patch_guest(&mut conn, guest.id, &GuestPatch::default()).unwrap();
        assert_eq!(same.name, "Eve");
        assert_eq!(same.updated_at, guest.updated_at);
    }

    #[test]
    fn patch_updates_only_supplied_fields() {
        let mut conn = test_conn();
        let mut full = plain_guest("Finn");
        full.email = Some("finn@example.com".to_owned());
        full.allergies = Some("Shellfish".to_owned());
        let guest = create_guest(&mut conn, &full).unwrap();

        let patched = patch_guest(
            &mut conn,
            guest.id,
            &GuestPatch {
                attending: Some(true),
                allergies: Some(None),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(patched.attending);
        assert_eq!(patched.allergies, None);
        assert_eq!(patched.email.as_deref(), Some("finn@example.com"));
        assert_eq!(patched.name, "Finn");
    }

    #[test]
    fn patch_missing_guest_is_not_found() {
        let mut conn = test_conn();
        let err = patch_guest(&mut conn, 99, &GuestPatch::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn update_falls_back_to_stored_flags_and_overwrites_table_ref() {
        let mut conn = test_conn();
        let mut full = plain_guest("Gail");
        full.attending = true;
        full.needs_transport = true;
        full.table_id = Some(12);
        let guest = create_guest(&mut conn, &full).unwrap();

        let updated = update_guest(
            &mut conn,
            &UpdateGuest {
                id: guest.id,
                name: "Gail Trent".to_owned(),
                email: None,
                phone: None,
                attending: None,
                meal_type: None,
                needs_transport: None,
                allergies: None,
                notes: None,
                table_id: None,
            },
        )
        .unwrap();

        assert_eq!(updated.name, "Gail Trent");
        assert!(updated.attending);
        assert!(updated.needs_transport);
        assert_eq!(updated.meal_type, "normal");
        // A full update always writes the table reference, null included.
        assert_eq!(updated.table_id, None);
    }

    #[test]
    fn party_of_three_shares_one_table_and_derives_companions() {
        let mut conn = test_conn();
        create_table(
            &mut conn,
            &CreateTable {
                name: None,
                capacity: Some(6),
                shape: None,
            },
        )
        .unwrap();

        let created = create_party(
            &mut conn,
            &CreateGuestParty {
                name: "Hana Sato".to_owned(),
                email: Some("hana@example.com".to_owned()),
                phone: Some("677000111".to_owned()),
                attending: true,
                meal_type: "vegetarian".to_owned(),
                needs_transport: false,
                allergies: None,
                notes: None,
                party_size: 3,
            },
        )
        .unwrap();

        assert_eq!(created.len(), 3);
        let table = created[0].table_id;
        assert!(table.is_some());
        assert!(created.iter().all(|g| g.table_id == table));

        assert_eq!(created[1].name, "Hana Sato - Companion 1");
        assert_eq!(created[2].name, "Hana Sato - Companion 2");
        for companion in &created[1..] {
            assert_eq!(companion.email, None);
            assert_eq!(companion.phone, None);
            assert_eq!(companion.meal_type, "normal");
            assert_eq!(companion.notes.as_deref(), Some("Companion of Hana Sato"));
        }
    }

    #[test]
    fn party_with_no_tables_is_created_unassigned() {
        let mut conn = test_conn();
        let created = create_party(
            &mut conn,
            &CreateGuestParty {
                name: "Iris".to_owned(),
                email: None,
                phone: None,
                attending: true,
                meal_type: "normal".to_owned(),
                needs_transport: false,
                allergies: None,
                notes: None,
                party_size: 2,
            },
        )
        .unwrap();

        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|g| g.table_id.is_none()));
    }

    #[test]
    fn deleting_a_table_by_id_unassigns_its_guests() {
        let mut conn = test_conn();
        let table = create_table(
            &mut conn,
            &CreateTable {
                name: Some("Table 1".to_owned()),
                capacity: Some(4),
                shape: None,
            },
        )
        .unwrap();

        let mut seated = plain_guest("Jules");
        seated.table_id = Some(table.id);
        let guest = create_guest(&mut conn, &seated).unwrap();

        let removal = delete_table(&mut conn, &table.id.to_string()).unwrap();
        assert_eq!(removal.unassigned_guests, 1);
        assert!(removal.config_deleted);

        assert_eq!(get_guest(&mut conn, guest.id).unwrap().table_id, None);
        assert!(matches!(
            get_table(&mut conn, table.id).unwrap_err(),
            Error::NotFound
        ));
    }

    #[test]
    fn deleting_a_table_by_name_takes_the_legacy_path() {
        let mut conn = test_conn();
        let table = create_table(
            &mut conn,
            &CreateTable {
                name: Some("Garden".to_owned()),
                capacity: None,
                shape: None,
            },
        )
        .unwrap();

        let mut seated = plain_guest("Kira");
        seated.table_id = Some(table.id);
        let guest = create_guest(&mut conn, &seated).unwrap();

        let removal = delete_table(&mut conn, "Garden").unwrap();
        assert_eq!(removal.id, Some(table.id));
        assert_eq!(removal.unassigned_guests, 1);
        assert!(removal.config_deleted);
        assert_eq!(get_guest(&mut conn, guest.id).unwrap().table_id, None);
    }

    #[test]
    fn deleting_an_unknown_table_is_not_found() {
        let mut conn = test_conn();
        assert!(matches!(
            delete_table(&mut conn, "nope").unwrap_err(),
            Error::NotFound
        ));
        assert!(matches!(
            delete_table(&mut conn, "424242").unwrap_err(),
            Error::NotFound
        ));
    }

    #[test]
    fn update_table_reports_zero_rows_for_missing_id() {
        let mut conn = test_conn();
        let rows = update_table(
            &mut conn,
            31337,
            &TableChangeset {
                name: Some("Moved".to_owned()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn table_capacity_can_be_cleared_back_to_default() {
        let mut conn = test_conn();
        let table = create_table(
            &mut conn,
            &CreateTable {
                name: None,
                capacity: Some(14),
                shape: None,
            },
        )
        .unwrap();

        let rows = update_table(
            &mut conn,
            table.id,
            &TableChangeset {
                capacity: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(get_table(&mut conn, table.id).unwrap().capacity, None);
    }

    #[test]
    fn settings_are_seeded_and_update_only_existing_keys() {
        let mut conn = test_conn();
        assert_eq!(
            get_setting(&mut conn, "default_table_capacity").unwrap(),
            Some("10".to_owned())
        );
        assert_eq!(get_setting(&mut conn, "missing").unwrap(), None);

        let updated = update_setting(&mut conn, "default_table_capacity", "12").unwrap();
        assert_eq!(updated.rows_affected, 1);
        assert_eq!(
            get_setting(&mut conn, "default_table_capacity").unwrap(),
            Some("12".to_owned())
        );

        let unknown = update_setting(&mut conn, "brand_new_key", "x").unwrap();
        assert_eq!(unknown.rows_affected, 0);
        assert_eq!(get_setting(&mut conn, "brand_new_key").unwrap(), None);
    }

    #[test]
    fn reset_clears_guests_and_restarts_ids() {
        let mut conn = test_conn();
        create_guest(&mut conn, &plain_guest("Lena")).unwrap();
        create_guest(&mut conn, &plain_guest("Marc")).unwrap();

        let outcome = reset_guest_data(&mut conn).unwrap();
        assert_eq!(outcome.guests, 2);
        assert!(list_guests(&mut conn, &FetchGuests::default())
            .unwrap()
            .is_empty());

        let fresh = create_guest(&mut conn, &plain_guest("Nora")).unwrap();
        assert_eq!(fresh.id, 1);
    }

    #[test]
    fn schema_init_is_idempotent() {
        let mut conn = test_conn();
        init_schema(&mut conn).unwrap();
        create_guest(&mut conn, &plain_guest("Omar")).unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(list_guests(&mut conn, &FetchGuests::default()).unwrap().len(), 1);
    }
}
