use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::{
    pooled_connection::{
        mobc::{Builder, Pool},
        AsyncDieselConnectionManager,
    },
    scoped_futures::{ScopedBoxFuture, ScopedFutureExt},
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use std::time::Duration;
use uuid::Uuid;

pub mod models;
mod schema;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("getting connection from pool: {0}")]
    GetConnectionPool(#[from] mobc::Error<diesel_async::pooled_connection::PoolError>),
    #[error("{0}")]
    Result(#[from] diesel::result::Error),
    #[error("{0} already registered")]
    AlreadyExists(String),
    #[error("{0}")]
    OtherGeneral(String),
    #[error("Skipped")]
    Skipped,
    #[error("Not Found")]
    NotFound,
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: Pool<AsyncPgConnection>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    db_url: String,
    max_open: u64,
    max_idle: u64,
    #[serde(with = "humantime_serde", default)]
    max_lifetime: Option<Duration>,
    #[serde(with = "humantime_serde", default)]
    max_idle_lifetime: Option<Duration>,
    #[serde(with = "humantime_serde")]
    timeout_for_get: Duration,
}

pub fn create(config: &Config) -> Store {
    Store {
        pool: create_pool(config),
    }
}

fn create_pool(config: &Config) -> mobc::Pool<AsyncDieselConnectionManager<AsyncPgConnection>> {
    let builder = Builder::new()
        .max_open(config.max_open)
        .max_idle(config.max_idle)
        .max_lifetime(
            config
                .max_lifetime
                .map(|v| v.max(Duration::from_secs(3600))),
        )
        .max_idle_lifetime(
            config
                .max_idle_lifetime
                .map(|v| v.max(Duration::from_secs(900))),
        )
        .get_timeout(Some(config.timeout_for_get.max(Duration::from_secs(5))));
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.db_url);
    builder.build(manager)
}

fn not_found_as_none<T>(result: Result<T, DieselError>) -> Result<Option<T>, Error> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(DieselError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn at_least_one(result: Result<usize, DieselError>) -> Result<(), Error> {
    match result {
        Ok(0) => Err(Error::NotFound),
        Ok(_) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

impl Store {
    async fn connection(
        &self,
    ) -> Result<mobc::Connection<AsyncDieselConnectionManager<AsyncPgConnection>>, Error> {
        self.pool.get().await.map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_account_by_email(
        &self,
        account_email: &str,
    ) -> Result<Option<models::Account>, Error> {
        use schema::star::accounts::dsl::*;
        let mut conn = self.connection().await?;
        not_found_as_none(
            accounts
                .filter(email.eq(account_email.to_lowercase()))
                .select(models::Account::as_select())
                .first(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_account_by_id(
        &self,
        account_id: Uuid,
    ) -> Result<Option<models::Account>, Error> {
        use schema::star::accounts::dsl::*;
        let mut conn = self.connection().await?;
        not_found_as_none(
            accounts
                .filter(id.eq(account_id))
                .select(models::Account::as_select())
                .first(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self, password_hash))]
    pub async fn create_account(
        &self,
        email: &str,
        password_hash: String,
    ) -> Result<models::Account, Error> {
        use schema::star::accounts;
        let now = jiff::Timestamp::now().into();
        let new_account = models::NewAccount {
            email: email.to_lowercase(),
            password_hash,
            created: now,
            updated: now,
        };
        let mut conn = self.connection().await?;
        match diesel::insert_into(accounts::table)
            .values(new_account)
            .returning(models::Account::as_returning())
            .get_result(&mut conn)
            .await
        {
            Ok(account) => Ok(account),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(Error::AlreadyExists(format!("email {email}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_password_reset(
        &self,
        account_id: Uuid,
        redirect_url: String,
        expires: jiff::Timestamp,
    ) -> Result<models::PasswordReset, Error> {
        use schema::star::password_resets;
        let now = jiff::Timestamp::now().into();
        let new_reset = models::NewPasswordReset {
            uuid: Uuid::new_v4(),
            account_id,
            redirect_url,
            sent: false,
            expires: expires.into(),
            created: now,
            updated: now,
        };
        let mut conn = self.connection().await?;
        diesel::insert_into(password_resets::table)
            .values(new_reset)
            .returning(models::PasswordReset::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(Into::into)
    }

    /// Loads an outstanding reset request, ignoring expired ones.
    #[tracing::instrument(skip(self, token))]
    pub async fn load_password_reset(
        &self,
        token: Uuid,
    ) -> Result<Option<models::PasswordReset>, Error> {
        use schema::star::password_resets::dsl::*;
        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        let mut conn = self.connection().await?;
        not_found_as_none(
            password_resets
                .filter(uuid.eq(token).and(expires.gt(now)))
                .select(models::PasswordReset::as_select())
                .first(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self, token, new_password_hash))]
    pub async fn complete_password_reset(
        &self,
        token: Uuid,
        new_password_hash: String,
    ) -> Result<(), Error> {
        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        self.connection()
            .await?
            .transaction(move |conn| {
                use schema::star::{accounts, password_resets};
                async move {
                    let reset = diesel::delete(password_resets::table)
                        .filter(
                            password_resets::uuid
                                .eq(token)
                                .and(password_resets::expires.gt(now)),
                        )
                        .returning(models::PasswordReset::as_returning())
                        .get_result(conn)
                        .await
                        .map_err(|err| match err {
                            DieselError::NotFound => Error::NotFound,
                            err => err.into(),
                        })?;
                    at_least_one(
                        diesel::update(accounts::table)
                            .filter(accounts::id.eq(reset.account_id))
                            .set((
                                accounts::password_hash.eq(new_password_hash),
                                accounts::updated.eq(now),
                            ))
                            .execute(conn)
                            .await,
                    )
                }
                .scope_boxed()
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_unsent_password_resets(
        &self,
    ) -> Result<Vec<(models::Account, models::PasswordReset)>, Error> {
        use schema::star::{accounts, password_resets};
        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        let mut conn = self.connection().await?;
        let unsent = accounts::table
            .inner_join(password_resets::table)
            .filter(
                password_resets::sent
                    .eq(false)
                    .and(password_resets::expires.gt(now)),
            )
            .select((
                models::Account::as_select(),
                models::PasswordReset::as_select(),
            ))
            .load(&mut conn)
            .await?;
        Ok(unsent)
    }

    /// Marks the reset request as sent and runs `callback` inside the same
    /// transaction, so a failed send leaves the request unsent.
    #[tracing::instrument(skip(self, token, callback))]
    pub async fn record_password_reset_email<'a, F>(
        &self,
        token: Uuid,
        callback: F,
    ) -> Result<(), Error>
    where
        F: FnOnce() -> ScopedBoxFuture<'a, 'a, Result<(), String>> + Send + 'a,
    {
        let now: jiff_diesel::Timestamp = jiff::Timestamp::now().into();
        self.connection()
            .await?
            .transaction(move |conn| {
                use schema::star::password_resets;
                async move {
                    match diesel::update(password_resets::table)
                        .filter(
                            password_resets::uuid
                                .eq(token)
                                .and(password_resets::sent.eq(false)),
                        )
                        .set((
                            password_resets::sent.eq(true),
                            password_resets::updated.eq(now),
                        ))
                        .execute(conn)
                        .await
                    {
                        Ok(0) => Err(Error::Skipped),
                        Ok(_) => callback().await.map_err(Error::OtherGeneral),
                        Err(err) => Err(err.into()),
                    }
                }
                .scope_boxed()
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn insert_user(&self, user_id: Uuid, email: &str) -> Result<(), Error> {
        use schema::star::users;
        let new_user = models::NewUser {
            id: user_id,
            email: email.to_owned(),
            created: jiff::Timestamp::now().into(),
        };
        let mut conn = self.connection().await?;
        diesel::insert_into(users::table)
            .values(new_user)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_branches_by_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<models::Branch>, Error> {
        use schema::star::branches::dsl::*;
        let mut conn = self.connection().await?;
        branches
            .filter(owner_id.eq(owner))
            .select(models::Branch::as_select())
            .load(&mut conn)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_branch(
        &self,
        owner: Uuid,
        branch_id: Uuid,
    ) -> Result<Option<models::Branch>, Error> {
        use schema::star::branches::dsl::*;
        let mut conn = self.connection().await?;
        not_found_as_none(
            branches
                .filter(id.eq(branch_id).and(owner_id.eq(owner)))
                .select(models::Branch::as_select())
                .first(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn load_public_branch(
        &self,
        branch_id: Uuid,
    ) -> Result<Option<models::Branch>, Error> {
        use schema::star::branches::dsl::*;
        let mut conn = self.connection().await?;
        not_found_as_none(
            branches
                .filter(id.eq(branch_id))
                .select(models::Branch::as_select())
                .first(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn insert_branch(&self, owner: Uuid, name: &str) -> Result<models::Branch, Error> {
        use schema::star::branches;
        let new_branch = models::NewBranch {
            name: name.to_owned(),
            owner_id: owner,
            created: jiff::Timestamp::now().into(),
        };
        let mut conn = self.connection().await?;
        diesel::insert_into(branches::table)
            .values(new_branch)
            .returning(models::Branch::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(Into::into)
    }

    /// Deletes the branch; employees and their ratings go with it through
    /// the foreign key cascades.
    #[tracing::instrument(skip(self))]
    pub async fn delete_branch(&self, owner: Uuid, branch_id: Uuid) -> Result<(), Error> {
        use schema::star::branches::dsl::*;
        let mut conn = self.connection().await?;
        at_least_one(
            diesel::delete(branches)
                .filter(id.eq(branch_id).and(owner_id.eq(owner)))
                .execute(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_employees_by_branch(
        &self,
        branch: Uuid,
    ) -> Result<Vec<models::Employee>, Error> {
        use schema::star::employees::dsl::*;
        let mut conn = self.connection().await?;
        employees
            .filter(branch_id.eq(branch))
            .select(models::Employee::as_select())
            .load(&mut conn)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn insert_employee(
        &self,
        name: &str,
        image_url: &str,
        branch_id: Uuid,
    ) -> Result<models::Employee, Error> {
        use schema::star::employees;
        let new_employee = models::NewEmployee {
            name: name.to_owned(),
            image_url: image_url.to_owned(),
            branch_id,
            created: jiff::Timestamp::now().into(),
        };
        let mut conn = self.connection().await?;
        diesel::insert_into(employees::table)
            .values(new_employee)
            .returning(models::Employee::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_employee(&self, branch: Uuid, employee_id: Uuid) -> Result<(), Error> {
        use schema::star::employees::dsl::*;
        let mut conn = self.connection().await?;
        at_least_one(
            diesel::delete(employees)
                .filter(id.eq(employee_id).and(branch_id.eq(branch)))
                .execute(&mut conn)
                .await,
        )
    }

    #[tracing::instrument(skip(self, employee_ids))]
    pub async fn list_ratings_for_employees(
        &self,
        employee_ids: &[Uuid],
    ) -> Result<Vec<models::RatingStars>, Error> {
        use schema::star::ratings::dsl::*;
        let mut conn = self.connection().await?;
        ratings
            .filter(employee_id.eq_any(employee_ids))
            .select(models::RatingStars::as_select())
            .load(&mut conn)
            .await
            .map_err(Into::into)
    }

    #[tracing::instrument(skip(self, encrypted_phone_number))]
    pub async fn insert_rating(
        &self,
        employee_id: Uuid,
        encrypted_phone_number: Vec<u8>,
        stars: i16,
    ) -> Result<models::Rating, Error> {
        use schema::star::ratings;
        let new_rating = models::NewRating {
            employee_id,
            encrypted_phone_number,
            stars,
            created: jiff::Timestamp::now().into(),
        };
        let mut conn = self.connection().await?;
        diesel::insert_into(ratings::table)
            .values(new_rating)
            .returning(models::Rating::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(Into::into)
    }
}
