use actix::Message;
use diesel::QueryResult;
use serde::Serialize;

use crate::services::db_models::{Guest, Setting, TableShape, User, WeddingTable};
use crate::services::insertable::{GuestPatch, TableChangeset};

// ---- guests ----

#[derive(Message, Debug, Clone, Default)]
#[rtype(result = "QueryResult<Vec<Guest>>")]
pub struct FetchGuests {
    pub attending: Option<bool>,
    pub needs_transport: Option<bool>,
    pub search: Option<String>,
}

#[derive(Message)]
#[rtype(result = "QueryResult<Guest>")]
pub struct FetchGuest(pub i64);

/// Creates a whole party in one transaction: the primary guest plus
/// `party_size - 1` companions, all sharing one table assignment.
#[derive(Message, Debug, Clone)]
#[rtype(result = "QueryResult<Vec<Guest>>")]
pub struct CreateGuestParty {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub attending: bool,
    pub meal_type: String,
    pub needs_transport: bool,
    pub allergies: Option<String>,
    pub notes: Option<String>,
    pub party_size: i64,
}

#[derive(Message, Debug, Clone)]
#[rtype(result = "QueryResult<Guest>")]
pub struct UpdateGuest {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub attending: Option<bool>,
    pub meal_type: Option<String>,
    pub needs_transport: Option<bool>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
    pub table_id: Option<i64>,
}

#[derive(Message)]
#[rtype(result = "QueryResult<Guest>")]
pub struct PatchGuest {
    pub id: i64,
    pub patch: GuestPatch,
}

#[derive(Message)]
#[rtype(result = "QueryResult<GuestDeleted>")]
pub struct DeleteGuest(pub i64);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestDeleted {
    pub deleted_id: i64,
    pub rows_affected: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUnassigned {
    pub table_id: i64,
    pub rows_affected: usize,
}

// ---- tables ----

#[derive(Message)]
#[rtype(result = "QueryResult<Vec<WeddingTable>>")]
pub struct FetchTables;

#[derive(Message)]
#[rtype(result = "QueryResult<WeddingTable>")]
pub struct FetchTable(pub i64);

#[derive(Message, Debug, Clone)]
#[rtype(result = "QueryResult<WeddingTable>")]
pub struct CreateTable {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub shape: Option<TableShape>,
}

#[derive(Message)]
#[rtype(result = "QueryResult<usize>")]
pub struct UpdateTable {
    pub id: i64,
    pub changes: TableChangeset,
}

/// Deletion takes the raw path segment: an id-shaped value is tried first,
/// then the legacy delete-by-name fallback.
#[derive(Message)]
#[rtype(result = "QueryResult<TableRemoval>")]
pub struct DeleteTable(pub String);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRemoval {
    pub id: Option<i64>,
    pub name: String,
    pub unassigned_guests: usize,
    pub config_deleted: bool,
}

// ---- settings ----

#[derive(Message)]
#[rtype(result = "QueryResult<SettingUpdated>")]
pub struct UpdateSetting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpdated {
    pub key: String,
    pub value: String,
    pub rows_affected: usize,
}

#[derive(Message)]
#[rtype(result = "QueryResult<Vec<Setting>>")]
pub struct FetchSettings;

// ---- users ----

#[derive(Message)]
#[rtype(result = "QueryResult<User>")]
pub struct FindUserByUsername(pub String);

// ---- dev/test surface ----

#[derive(Message)]
#[rtype(result = "QueryResult<usize>")]
pub struct SeedSampleGuests;

#[derive(Message)]
#[rtype(result = "QueryResult<ResetOutcome>")]
pub struct ResetGuestData;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub guests: usize,
    pub companions: usize,
    pub preferences: usize,
}
