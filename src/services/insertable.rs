use diesel::{AsChangeset, Insertable};
use serde::{Deserialize, Deserializer};

use crate::schema::guests;
use crate::schema::tables;
use crate::services::db_models::TableShape;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = guests)]
pub struct NewGuest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub attending: bool,
    pub meal_type: String,
    pub needs_transport: bool,
    pub allergies: Option<String>,
    pub notes: Option<String>,
    pub table_id: Option<i64>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = tables)]
pub struct NewTable {
    pub name: String,
    pub capacity: Option<i32>,
    pub shape: TableShape,
}

/// Partial guest update. Only the whitelisted fields below are recognized;
/// anything else in the payload is ignored by serde. Nullable columns use
/// the double-`Option` convention: absent = keep, `null` = clear.
#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name = guests)]
#[serde(rename_all = "camelCase")]
pub struct GuestPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    pub attending: Option<bool>,
    pub meal_type: Option<String>,
    pub needs_transport: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub allergies: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub table_id: Option<Option<i64>>,
}

impl GuestPatch {
    /// True when no recognized field was supplied; the patch endpoint then
    /// returns the stored row untouched.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.attending.is_none()
            && self.meal_type.is_none()
            && self.needs_transport.is_none()
            && self.allergies.is_none()
            && self.notes.is_none()
            && self.table_id.is_none()
    }
}

#[derive(AsChangeset, Deserialize, Debug, Clone, Default)]
#[diesel(table_name = tables)]
#[serde(rename_all = "camelCase")]
pub struct TableChangeset {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i32>>,
    pub shape: Option<TableShape>,
}

impl TableChangeset {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.capacity.is_none() && self.shape.is_none()
    }
}

/// Distinguishes "field absent" from "field set to null" during
/// deserialization, so patches can clear nullable columns explicitly.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
