use diesel::prelude::*;

#[derive(Clone, Debug, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::star::accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub id: uuid::Uuid,
    pub email: String,
    pub password_hash: String,
    pub created: jiff_diesel::Timestamp,
    pub updated: jiff_diesel::Timestamp,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub created: jiff_diesel::Timestamp,
    pub updated: jiff_diesel::Timestamp,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser {
    pub id: uuid::Uuid,
    pub email: String,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Clone, Debug, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::star::branches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Branch {
    pub id: uuid::Uuid,
    pub name: String,
    pub owner_id: uuid::Uuid,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::branches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBranch {
    pub name: String,
    pub owner_id: uuid::Uuid,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Clone, Debug, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::star::employees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(belongs_to(Branch))]
pub struct Employee {
    pub id: uuid::Uuid,
    pub name: String,
    pub image_url: String,
    pub branch_id: uuid::Uuid,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::employees)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewEmployee {
    pub name: String,
    pub image_url: String,
    pub branch_id: uuid::Uuid,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Clone, Debug, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::star::ratings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(belongs_to(Employee))]
pub struct Rating {
    pub id: i64,
    pub employee_id: uuid::Uuid,
    pub encrypted_phone_number: Vec<u8>,
    pub stars: i16,
    pub created: jiff_diesel::Timestamp,
}

/// The two columns needed to roll ratings up into per-employee totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::star::ratings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RatingStars {
    pub employee_id: uuid::Uuid,
    pub stars: i16,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::ratings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewRating {
    pub employee_id: uuid::Uuid,
    pub encrypted_phone_number: Vec<u8>,
    pub stars: i16,
    pub created: jiff_diesel::Timestamp,
}

#[derive(Clone, Debug, Identifiable, Queryable, Selectable, Associations)]
#[diesel(table_name = crate::schema::star::password_resets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(primary_key(uuid))]
#[diesel(belongs_to(Account))]
pub struct PasswordReset {
    pub uuid: uuid::Uuid,
    pub account_id: uuid::Uuid,
    pub redirect_url: String,
    pub sent: bool,
    pub expires: jiff_diesel::Timestamp,
    pub created: jiff_diesel::Timestamp,
    pub updated: jiff_diesel::Timestamp,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::star::password_resets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPasswordReset {
    pub uuid: uuid::Uuid,
    pub account_id: uuid::Uuid,
    pub redirect_url: String,
    pub sent: bool,
    pub expires: jiff_diesel::Timestamp,
    pub created: jiff_diesel::Timestamp,
    pub updated: jiff_diesel::Timestamp,
}
