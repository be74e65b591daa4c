//! Capability traits for the persistence collaborators. Handlers only ever
//! see these traits; `star_db::Store` is the production implementation.

use star_db::{
    models::{Account, Branch, Employee, PasswordReset, Rating, RatingStars},
    Error,
};
use uuid::Uuid;

/// Persistence behind the auth provider: credentials and reset requests.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_account(&self, email: &str, password_hash: String) -> Result<Account, Error>;
    async fn load_account_by_email(&self, email: &str) -> Result<Option<Account>, Error>;
    async fn load_account_by_id(&self, id: Uuid) -> Result<Option<Account>, Error>;
    async fn create_password_reset(
        &self,
        account_id: Uuid,
        redirect_url: String,
        expires: jiff::Timestamp,
    ) -> Result<PasswordReset, Error>;
    async fn load_password_reset(&self, token: Uuid) -> Result<Option<PasswordReset>, Error>;
    async fn complete_password_reset(
        &self,
        token: Uuid,
        password_hash: String,
    ) -> Result<(), Error>;
}

/// The relational collections every screen reads and writes.
#[async_trait::async_trait]
pub trait DataStore: Send + Sync {
    async fn insert_user(&self, id: Uuid, email: &str) -> Result<(), Error>;
    async fn list_branches_by_owner(&self, owner: Uuid) -> Result<Vec<Branch>, Error>;
    async fn load_branch(&self, owner: Uuid, id: Uuid) -> Result<Option<Branch>, Error>;
    async fn load_public_branch(&self, id: Uuid) -> Result<Option<Branch>, Error>;
    async fn insert_branch(&self, owner: Uuid, name: &str) -> Result<Branch, Error>;
    async fn delete_branch(&self, owner: Uuid, id: Uuid) -> Result<(), Error>;
    async fn list_employees_by_branch(&self, branch: Uuid) -> Result<Vec<Employee>, Error>;
    async fn insert_employee(
        &self,
        name: &str,
        image_url: &str,
        branch: Uuid,
    ) -> Result<Employee, Error>;
    async fn delete_employee(&self, branch: Uuid, id: Uuid) -> Result<(), Error>;
    async fn list_ratings_for_employees(
        &self,
        employee_ids: &[Uuid],
    ) -> Result<Vec<RatingStars>, Error>;
    async fn insert_rating(
        &self,
        employee: Uuid,
        encrypted_phone_number: Vec<u8>,
        stars: i16,
    ) -> Result<Rating, Error>;
}

#[async_trait::async_trait]
impl AccountStore for star_db::Store {
    async fn create_account(&self, email: &str, password_hash: String) -> Result<Account, Error> {
        star_db::Store::create_account(self, email, password_hash).await
    }

    async fn load_account_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        star_db::Store::load_account_by_email(self, email).await
    }

    async fn load_account_by_id(&self, id: Uuid) -> Result<Option<Account>, Error> {
        star_db::Store::load_account_by_id(self, id).await
    }

    async fn create_password_reset(
        &self,
        account_id: Uuid,
        redirect_url: String,
        expires: jiff::Timestamp,
    ) -> Result<PasswordReset, Error> {
        star_db::Store::create_password_reset(self, account_id, redirect_url, expires).await
    }

    async fn load_password_reset(&self, token: Uuid) -> Result<Option<PasswordReset>, Error> {
        star_db::Store::load_password_reset(self, token).await
    }

    async fn complete_password_reset(
        &self,
        token: Uuid,
        password_hash: String,
    ) -> Result<(), Error> {
        star_db::Store::complete_password_reset(self, token, password_hash).await
    }
}

#[async_trait::async_trait]
impl DataStore for star_db::Store {
    async fn insert_user(&self, id: Uuid, email: &str) -> Result<(), Error> {
        star_db::Store::insert_user(self, id, email).await
    }

    async fn list_branches_by_owner(&self, owner: Uuid) -> Result<Vec<Branch>, Error> {
        star_db::Store::list_branches_by_owner(self, owner).await
    }

    async fn load_branch(&self, owner: Uuid, id: Uuid) -> Result<Option<Branch>, Error> {
        star_db::Store::load_branch(self, owner, id).await
    }

    async fn load_public_branch(&self, id: Uuid) -> Result<Option<Branch>, Error> {
        star_db::Store::load_public_branch(self, id).await
    }

    async fn insert_branch(&self, owner: Uuid, name: &str) -> Result<Branch, Error> {
        star_db::Store::insert_branch(self, owner, name).await
    }

    async fn delete_branch(&self, owner: Uuid, id: Uuid) -> Result<(), Error> {
        star_db::Store::delete_branch(self, owner, id).await
    }

    async fn list_employees_by_branch(&self, branch: Uuid) -> Result<Vec<Employee>, Error> {
        star_db::Store::list_employees_by_branch(self, branch).await
    }

    async fn insert_employee(
        &self,
        name: &str,
        image_url: &str,
        branch: Uuid,
    ) -> Result<Employee, Error> {
        star_db::Store::insert_employee(self, name, image_url, branch).await
    }

    async fn delete_employee(&self, branch: Uuid, id: Uuid) -> Result<(), Error> {
        star_db::Store::delete_employee(self, branch, id).await
    }

    async fn list_ratings_for_employees(
        &self,
        employee_ids: &[Uuid],
    ) -> Result<Vec<RatingStars>, Error> {
        star_db::Store::list_ratings_for_employees(self, employee_ids).await
    }

    async fn insert_rating(
        &self,
        employee: Uuid,
        encrypted_phone_number: Vec<u8>,
        stars: i16,
    ) -> Result<Rating, Error> {
        star_db::Store::insert_rating(self, employee, encrypted_phone_number, stars).await
    }
}
