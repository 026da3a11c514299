/// Database row types. The record column holds the JSON form of a
/// `pssst_types::UserRecord`; the store never looks inside it.

pub struct UserRow {
    pub name: String,
    pub record: String,
    pub created_at: String,
    pub updated_at: String,
}
