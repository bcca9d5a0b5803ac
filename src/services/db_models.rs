use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::Queryable;
use serde::{Deserialize, Serialize};

use crate::services::auth::Role;

#[derive(Queryable, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub attending: bool,
    pub meal_type: String,
    pub needs_transport: bool,
    pub allergies: Option<String>,
    pub notes: Option<String>,
    /// Weak reference to a table; stale ids are tolerated.
    pub table_id: Option<i64>,
    /// Legacy column kept for the auto-name scan; no current flow writes it.
    pub table_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeddingTable {
    pub id: i64,
    pub name: String,
    /// None means "use the global default capacity setting".
    pub capacity: Option<i32>,
    pub shape: TableShape,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum TableShape {
    Round,
    Square,
}

impl TableShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableShape::Round => "round",
            TableShape::Square => "square",
        }
    }
}

impl ToSql<Text, Sqlite> for TableShape {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for TableShape {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        match value.as_str() {
            "round" => Ok(TableShape::Round),
            "square" => Ok(TableShape::Square),
            other => Err(format!("unrecognized table shape: {other}").into()),
        }
    }
}
