use crate::{
    cipher::Cipher,
    storage::{self, ObjectStorage},
    store::{AccountStore, DataStore},
    AppState, Settings,
};
use axum::{
    body::Body,
    http::{header, request, Request, Response, StatusCode},
    Router,
};
use star_db::models::{Account, Branch, Employee, PasswordReset, Rating, RatingStars};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "QX9KIEJlheDC15h59zlourDPxCucXz8a8EXGr7YtNdc";
const OWNER_EMAIL: &str = "owner@example.com";
const OWNER_PASSWORD: &str = "correct-horse";
const FINISH_URL: &str = "https://finished.example.com";
const BOUNDARY: &str = "star-service-test-boundary";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Calls {
    list_branches: usize,
    insert_branch: usize,
    delete_branch: usize,
    insert_employee: usize,
    delete_employee: usize,
    insert_rating: usize,
}

#[derive(Default)]
struct FakeState {
    accounts: Vec<Account>,
    users: Vec<(Uuid, String)>,
    password_resets: Vec<PasswordReset>,
    branches: Vec<Branch>,
    employees: Vec<Employee>,
    ratings: Vec<Rating>,
    calls: Calls,
    failures: Vec<(&'static str, String)>,
}

impl FakeState {
    /// Fails the named operation with the configured message, if any.
    fn check(&self, operation: &str) -> Result<(), star_db::Error> {
        match self.failures.iter().find(|(failing, _)| *failing == operation) {
            Some((_, message)) => Err(star_db::Error::OtherGeneral(message.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory stand-in for the database, counting the calls that matter.
#[derive(Default)]
struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().expect("fake store lock should not be poisoned"))
    }

    fn calls(&self) -> Calls {
        self.with(|state| state.calls)
    }

    fn fail(&self, operation: &'static str, message: &str) {
        self.with(|state| state.failures.push((operation, message.to_owned())));
    }

    fn recover(&self) {
        self.with(|state| state.failures.clear());
    }

    fn add_account(&self, email: &str, password: &str) -> Account {
        let now = jiff::Timestamp::now().into();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password_hash: crate::login::hash_password(password).expect("password should hash"),
            created: now,
            updated: now,
        };
        self.with(|state| state.accounts.push(account.clone()));
        account
    }

    fn add_password_reset(&self, account_id: Uuid) -> Uuid {
        let now = jiff::Timestamp::now();
        let token = Uuid::new_v4();
        self.with(|state| {
            state.password_resets.push(PasswordReset {
                uuid: token,
                account_id,
                redirect_url: "http://localhost:3000/reset-password".to_owned(),
                sent: true,
                expires: (now + jiff::SignedDuration::from_hours(1)).into(),
                created: now.into(),
                updated: now.into(),
            })
        });
        token
    }

    fn add_branch(&self, owner_id: Uuid, name: &str) -> Branch {
        let branch = Branch {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            owner_id,
            created: jiff::Timestamp::now().into(),
        };
        self.with(|state| state.branches.push(branch.clone()));
        branch
    }

    fn add_employee(&self, branch_id: Uuid, name: &str) -> Employee {
        let employee = Employee {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            image_url: format!("http://localhost:3000/storage/employees/{branch_id}/{name}.png"),
            branch_id,
            created: jiff::Timestamp::now().into(),
        };
        self.with(|state| state.employees.push(employee.clone()));
        employee
    }

    fn add_rating(&self, employee_id: Uuid, stars: i16) {
        self.with(|state| {
            let id = state.ratings.len() as i64 + 1;
            state.ratings.push(Rating {
                id,
                employee_id,
                encrypted_phone_number: Vec::new(),
                stars,
                created: jiff::Timestamp::now().into(),
            })
        });
    }

    fn branch_names(&self) -> Vec<String> {
        self.with(|state| state.branches.iter().map(|b| b.name.clone()).collect())
    }
}

#[async_trait::async_trait]
impl AccountStore for FakeStore {
    async fn create_account(
        &self,
        email: &str,
        password_hash: String,
    ) -> Result<Account, star_db::Error> {
        self.with(|state| {
            if state.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
                return Err(star_db::Error::AlreadyExists(email.to_owned()));
            }
            let now = jiff::Timestamp::now().into();
            let account = Account {
                id: Uuid::new_v4(),
                email: email.to_lowercase(),
                password_hash,
                created: now,
                updated: now,
            };
            state.accounts.push(account.clone());
            Ok(account)
        })
    }

    async fn load_account_by_email(&self, email: &str) -> Result<Option<Account>, star_db::Error> {
        self.with(|state| {
            Ok(state
                .accounts
                .iter()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .cloned())
        })
    }

    async fn load_account_by_id(&self, id: Uuid) -> Result<Option<Account>, star_db::Error> {
        self.with(|state| Ok(state.accounts.iter().find(|a| a.id == id).cloned()))
    }

    async fn create_password_reset(
        &self,
        account_id: Uuid,
        redirect_url: String,
        expires: jiff::Timestamp,
    ) -> Result<PasswordReset, star_db::Error> {
        let now = jiff::Timestamp::now().into();
        let reset = PasswordReset {
            uuid: Uuid::new_v4(),
            account_id,
            redirect_url,
            sent: false,
            expires: expires.into(),
            created: now,
            updated: now,
        };
        self.with(|state| state.password_resets.push(reset.clone()));
        Ok(reset)
    }

    async fn load_password_reset(
        &self,
        token: Uuid,
    ) -> Result<Option<PasswordReset>, star_db::Error> {
        self.with(|state| {
            Ok(state
                .password_resets
                .iter()
                .find(|r| r.uuid == token)
                .cloned())
        })
    }

    async fn complete_password_reset(
        &self,
        token: Uuid,
        password_hash: String,
    ) -> Result<(), star_db::Error> {
        self.with(|state| {
            let position = state
                .password_resets
                .iter()
                .position(|r| r.uuid == token)
                .ok_or(star_db::Error::NotFound)?;
            let reset = state.password_resets.remove(position);
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.id == reset.account_id)
                .ok_or(star_db::Error::NotFound)?;
            account.password_hash = password_hash;
            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl DataStore for FakeStore {
    async fn insert_user(&self, id: Uuid, email: &str) -> Result<(), star_db::Error> {
        self.with(|state| state.users.push((id, email.to_owned())));
        Ok(())
    }

    async fn list_branches_by_owner(&self, owner: Uuid) -> Result<Vec<Branch>, star_db::Error> {
        self.with(|state| {
            state.calls.list_branches += 1;
            state.check("list_branches_by_owner")?;
            Ok(state
                .branches
                .iter()
                .filter(|b| b.owner_id == owner)
                .cloned()
                .collect())
        })
    }

    async fn load_branch(&self, owner: Uuid, id: Uuid) -> Result<Option<Branch>, star_db::Error> {
        self.with(|state| {
            Ok(state
                .branches
                .iter()
                .find(|b| b.id == id && b.owner_id == owner)
                .cloned())
        })
    }

    async fn load_public_branch(&self, id: Uuid) -> Result<Option<Branch>, star_db::Error> {
        self.with(|state| Ok(state.branches.iter().find(|b| b.id == id).cloned()))
    }

    async fn insert_branch(&self, owner: Uuid, name: &str) -> Result<Branch, star_db::Error> {
        self.with(|state| {
            state.calls.insert_branch += 1;
            state.check("insert_branch")
        })?;
        Ok(self.add_branch(owner, name))
    }

    async fn delete_branch(&self, owner: Uuid, id: Uuid) -> Result<(), star_db::Error> {
        self.with(|state| {
            state.calls.delete_branch += 1;
            state.check("delete_branch")?;
            let before = state.branches.len();
            state
                .branches
                .retain(|b| !(b.id == id && b.owner_id == owner));
            if state.branches.len() == before {
                return Err(star_db::Error::NotFound);
            }
            state.employees.retain(|e| e.branch_id != id);
            Ok(())
        })
    }

    async fn list_employees_by_branch(&self, branch: Uuid) -> Result<Vec<Employee>, star_db::Error> {
        self.with(|state| {
            Ok(state
                .employees
                .iter()
                .filter(|e| e.branch_id == branch)
                .cloned()
                .collect())
        })
    }

    async fn insert_employee(
        &self,
        name: &str,
        image_url: &str,
        branch: Uuid,
    ) -> Result<Employee, star_db::Error> {
        let employee = Employee {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            image_url: image_url.to_owned(),
            branch_id: branch,
            created: jiff::Timestamp::now().into(),
        };
        self.with(|state| {
            state.calls.insert_employee += 1;
            state.check("insert_employee")?;
            state.employees.push(employee.clone());
            Ok(employee)
        })
    }

    async fn delete_employee(&self, branch: Uuid, id: Uuid) -> Result<(), star_db::Error> {
        self.with(|state| {
            state.calls.delete_employee += 1;
            state.check("delete_employee")?;
            let before = state.employees.len();
            state
                .employees
                .retain(|e| !(e.id == id && e.branch_id == branch));
            if state.employees.len() == before {
                return Err(star_db::Error::NotFound);
            }
            Ok(())
        })
    }

    async fn list_ratings_for_employees(
        &self,
        employee_ids: &[Uuid],
    ) -> Result<Vec<RatingStars>, star_db::Error> {
        self.with(|state| {
            Ok(state
                .ratings
                .iter()
                .filter(|r| employee_ids.contains(&r.employee_id))
                .map(|r| RatingStars {
                    employee_id: r.employee_id,
                    stars: r.stars,
                })
                .collect())
        })
    }

    async fn insert_rating(
        &self,
        employee: Uuid,
        encrypted_phone_number: Vec<u8>,
        stars: i16,
    ) -> Result<Rating, star_db::Error> {
        self.with(|state| {
            state.calls.insert_rating += 1;
            state.check("insert_rating")?;
            let rating = Rating {
                id: state.ratings.len() as i64 + 1,
                employee_id: employee,
                encrypted_phone_number,
                stars,
                created: jiff::Timestamp::now().into(),
            };
            state.ratings.push(rating.clone());
            Ok(rating)
        })
    }
}

/// Object storage that keeps uploads in memory and can be told to fail.
#[derive(Default)]
struct FakeStorage {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    failure: Mutex<Option<String>>,
}

impl FakeStorage {
    fn fail_with(&self, message: &str) {
        *self.failure.lock().expect("lock") = Some(message.to_owned());
    }

    fn upload_count(&self) -> usize {
        self.objects.lock().expect("lock").len()
    }

    fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("lock")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), storage::Error> {
        if let Some(message) = self.failure.lock().expect("lock").clone() {
            return Err(storage::Error::Io(std::io::Error::other(message)));
        }
        self.objects
            .lock()
            .expect("lock")
            .push((format!("{bucket}/{path}"), bytes.to_vec()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, storage::Error> {
        Ok(format!("http://localhost:3000/storage/{bucket}/{path}"))
    }

    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, storage::Error> {
        let key = format!("{bucket}/{path}");
        self.objects
            .lock()
            .expect("lock")
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(storage::Error::NotFound)
    }
}

/// The full router over fake collaborators, with a one-cookie jar so
/// consecutive requests share a session like a browser would.
struct TestApp {
    router: Router,
    store: Arc<FakeStore>,
    storage: Arc<FakeStorage>,
    cipher: Arc<Cipher>,
    cookie: Option<String>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(FakeStore::default());
        let storage = Arc::new(FakeStorage::default());
        let cipher =
            Arc::new(Cipher::from_base64_encoded(SECRET).expect("secret should be a valid key"));
        let app_state = AppState {
            accounts: store.clone(),
            data: store.clone(),
            storage: storage.clone(),
            cipher: cipher.clone(),
            settings: Arc::new(Settings {
                public_base_url: "http://localhost:3000".to_owned(),
                rating_finish_url: FINISH_URL.to_owned(),
                reset_token_lifetime: Duration::from_secs(3600),
                max_upload_bytes: 1024 * 1024,
                secure_cookies: false,
            }),
        };
        Self {
            router: crate::app(app_state),
            store,
            storage,
            cipher,
            cookie: None,
        }
    }

    async fn send(&mut self, builder: request::Builder, body: Body) -> Response<Body> {
        let builder = match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request should build"))
            .await
            .expect("router should not fail");
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .expect("cookie should be ascii")
                .split(';')
                .next()
                .unwrap_or_default();
            self.cookie = Some(pair.to_owned());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri), Body::empty()).await
    }

    async fn post_form(&mut self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(form.to_owned()),
        )
        .await
    }

    async fn post_employee(
        &mut self,
        uri: &str,
        name: &str,
        photo: (&str, &[u8]),
    ) -> Response<Body> {
        let (file_name, bytes) = photo;
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n\
             --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{file_name}\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        self.send(
            Request::post(uri).header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ),
            Body::from(body),
        )
        .await
    }

    async fn log_in(&mut self) -> Uuid {
        let account = self.store.add_account(OWNER_EMAIL, OWNER_PASSWORD);
        let response = self
            .post_form(
                "/login",
                &format!("email=owner%40example.com&password={OWNER_PASSWORD}"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");
        account.id
    }
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response should redirect")
        .to_str()
        .expect("location should be ascii")
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

mod public_pages {
    use super::*;

    #[tokio::test]
    async fn it_renders_the_landing_page_with_a_star_backdrop() {
        let mut app = TestApp::new();
        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Star Service"));
        assert!(body.contains("Register now"));
        assert_eq!(body.matches("animation-duration").count(), crate::backdrop::STAR_COUNT);
    }

    #[tokio::test]
    async fn it_answers_unknown_paths_with_not_found() {
        let mut app = TestApp::new();
        assert_eq!(app.get("/no-such-page").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn it_serves_uploaded_photos_with_an_image_content_type() {
        let mut app = TestApp::new();
        app.storage
            .upload("employees", "b1/1.png", b"png-bytes")
            .await
            .expect("upload should succeed");
        let response = app.get("/storage/employees/b1/1.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"image/png"[..])
        );
        assert_eq!(body_text(response).await, "png-bytes");
        assert_eq!(
            app.get("/storage/employees/b1/2.png").await.status(),
            StatusCode::NOT_FOUND
        );
    }
}

mod accounts {
    use super::*;

    #[tokio::test]
    async fn it_registers_an_owner_and_mirrors_the_user_row() {
        let mut app = TestApp::new();
        let response = app
            .post_form("/register", "email=new%40example.com&password=secret1")
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        let (accounts, users) = app.store.with(|state| {
            (
                state.accounts.iter().map(|a| a.id).collect::<Vec<_>>(),
                state.users.clone(),
            )
        });
        assert_eq!(accounts.len(), 1);
        assert_eq!(users, vec![(accounts[0], "new@example.com".to_owned())]);
        let body = body_text(app.get("/login").await).await;
        assert!(body.contains("You have successfully registered! Please log in."));
    }

    #[tokio::test]
    async fn it_shows_registration_errors_inline() {
        let mut app = TestApp::new();
        app.store.add_account(OWNER_EMAIL, OWNER_PASSWORD);
        let body = body_text(
            app.post_form("/register", "email=owner%40example.com&password=secret1")
                .await,
        )
        .await;
        assert!(body.contains("Registration error"));
        assert!(body.contains("already registered"));
        let body = body_text(
            app.post_form("/register", "email=not-an-email&password=secret1")
                .await,
        )
        .await;
        assert!(body.contains("email address is invalid"));
        assert!(app.store.with(|state| state.users.is_empty()));
    }

    #[tokio::test]
    async fn it_rejects_a_wrong_password() {
        let mut app = TestApp::new();
        app.store.add_account(OWNER_EMAIL, OWNER_PASSWORD);
        let response = app
            .post_form("/login", "email=owner%40example.com&password=wrong-horse")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Incorrect email or password"));
    }

    #[tokio::test]
    async fn it_logs_out_back_to_the_login_page() {
        let mut app = TestApp::new();
        app.log_in().await;
        let response = app.post_form("/logout", "").await;
        assert_eq!(location(&response), "/login");
        let response = app.get("/dashboard").await;
        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/login"));
    }

    #[tokio::test]
    async fn it_records_a_reset_request_only_for_known_accounts() {
        let mut app = TestApp::new();
        let account = app.store.add_account(OWNER_EMAIL, OWNER_PASSWORD);
        let unknown = body_text(
            app.post_form("/forgot-password", "email=stranger%40example.com")
                .await,
        )
        .await;
        assert!(unknown.contains("is on its way"));
        assert!(app.store.with(|state| state.password_resets.is_empty()));
        let known = body_text(
            app.post_form("/forgot-password", "email=owner%40example.com")
                .await,
        )
        .await;
        assert!(known.contains("is on its way"));
        let resets = app.store.with(|state| state.password_resets.clone());
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].account_id, account.id);
        assert_eq!(resets[0].redirect_url, "http://localhost:3000/reset-password");
        assert!(!resets[0].sent);
    }

    #[tokio::test]
    async fn it_resets_a_password_through_the_emailed_link() {
        let mut app = TestApp::new();
        let account = app.store.add_account(OWNER_EMAIL, "old-password");
        let token = app.store.add_password_reset(account.id);
        let uri = format!("/reset-password/{token}");
        assert!(body_text(app.get(&uri).await).await.contains("Reset password"));
        let mismatch = body_text(
            app.post_form(&uri, "password=new-password&repeat_password=other-password")
                .await,
        )
        .await;
        assert!(mismatch.contains("match"));
        let response = app
            .post_form(&uri, "password=new-password&repeat_password=new-password")
            .await;
        assert_eq!(location(&response), "/login");
        assert!(app.store.with(|state| state.password_resets.is_empty()));
        let response = app
            .post_form("/login", "email=owner%40example.com&password=new-password")
            .await;
        assert_eq!(location(&response), "/dashboard");
        let reused = body_text(app.get(&uri).await).await;
        assert!(reused.contains("invalid or has expired"));
    }
}

mod dashboard {
    use super::*;

    #[tokio::test]
    async fn it_redirects_to_login_before_loading_any_branches() {
        let mut app = TestApp::new();
        let response = app.get("/dashboard").await;
        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/login"));
        assert_eq!(app.store.calls().list_branches, 0);
    }

    #[tokio::test]
    async fn it_lists_only_the_owners_branches() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        app.store.add_branch(owner, "Downtown");
        app.store.add_branch(Uuid::new_v4(), "Competitor");
        let body = body_text(app.get("/dashboard").await).await;
        assert!(body.contains("Downtown"));
        assert!(!body.contains("Competitor"));
        assert_eq!(app.store.calls().list_branches, 1);
    }

    #[tokio::test]
    async fn it_adds_a_branch() {
        let mut app = TestApp::new();
        app.log_in().await;
        let response = app.post_form("/dashboard/branches", "name=+Downtown+").await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(app.store.calls().insert_branch, 1);
        assert_eq!(app.store.branch_names(), vec!["Downtown".to_owned()]);
    }

    #[tokio::test]
    async fn it_issues_no_insert_for_a_blank_branch_name() {
        let mut app = TestApp::new();
        app.log_in().await;
        let response = app.post_form("/dashboard/branches", "name=+++").await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(app.store.calls().insert_branch, 0);
        let body = body_text(app.get("/dashboard").await).await;
        assert!(body.contains("Please enter a branch name."));
    }

    #[tokio::test]
    async fn it_deletes_exactly_the_chosen_branch() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        app.store.add_branch(owner, "Uptown");
        let response = app
            .post_form(&format!("/dashboard/branch/{}/delete", downtown.id), "")
            .await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(app.store.calls().delete_branch, 1);
        let body = body_text(app.get("/dashboard").await).await;
        assert!(!body.contains("Downtown"));
        assert!(body.contains("Uptown"));
    }

    #[tokio::test]
    async fn it_leaves_other_owners_branches_alone() {
        let mut app = TestApp::new();
        app.log_in().await;
        let foreign = app.store.add_branch(Uuid::new_v4(), "Competitor");
        app.post_form(&format!("/dashboard/branch/{}/delete", foreign.id), "")
            .await;
        assert_eq!(app.store.branch_names(), vec!["Competitor".to_owned()]);
    }

    #[tokio::test]
    async fn it_shows_a_qr_code_only_for_an_owned_branch() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let foreign = app.store.add_branch(Uuid::new_v4(), "Competitor");
        let body = body_text(app.get(&format!("/dashboard?qr={}", downtown.id)).await).await;
        assert!(body.contains("<svg"));
        let body = body_text(app.get(&format!("/dashboard?qr={}", foreign.id)).await).await;
        assert!(!body.contains("<svg"));
    }

    #[tokio::test]
    async fn it_flashes_a_failed_delete_and_keeps_the_list() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        app.store.add_branch(owner, "Uptown");
        app.store.fail("delete_branch", "connection reset");
        let response = app
            .post_form(&format!("/dashboard/branch/{}/delete", downtown.id), "")
            .await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(app.store.calls().delete_branch, 1);
        let body = body_text(app.get("/dashboard").await).await;
        assert!(body.contains("An error occurred while deleting the branch."));
        assert!(body.contains("Downtown"));
        assert!(body.contains("Uptown"));
    }
}

mod employees {
    use super::*;

    #[tokio::test]
    async fn it_totals_downtown_ratings_per_employee() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let a = app.store.add_employee(downtown.id, "Avery");
        app.store.add_employee(downtown.id, "Blake");
        app.store.add_rating(a.id, 5);
        app.store.add_rating(a.id, 4);
        let response = app
            .get(&format!("/dashboard/branch/{}/employees", downtown.id))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        let avery = body.find("Avery").expect("Avery should be listed");
        let blake = body.find("Blake").expect("Blake should be listed");
        let nine = body.find("Total stars: 9").expect("Avery should total 9");
        let zero = body.find("Total stars: 0").expect("Blake should total 0");
        assert!(avery < nine && nine < blake && blake < zero);
    }

    #[tokio::test]
    async fn it_ignores_ratings_of_employees_in_other_branches() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let uptown = app.store.add_branch(owner, "Uptown");
        let a = app.store.add_employee(downtown.id, "Avery");
        let c = app.store.add_employee(uptown.id, "Casey");
        app.store.add_rating(c.id, 5);
        app.store.add_rating(a.id, 2);
        app.store.add_rating(c.id, 5);
        let body = body_text(
            app.get(&format!("/dashboard/branch/{}/employees", downtown.id))
                .await,
        )
        .await;
        assert!(body.contains("Total stars: 2"));
        assert!(!body.contains("Casey"));
        assert!(!body.contains("Total stars: 10"));
    }

    #[tokio::test]
    async fn it_hides_branches_of_other_owners() {
        let mut app = TestApp::new();
        app.log_in().await;
        let foreign = app.store.add_branch(Uuid::new_v4(), "Competitor");
        for uri in [
            format!("/dashboard/branch/{}/employees", foreign.id),
            format!("/dashboard/branch/{}/add-employee", foreign.id),
        ] {
            assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn it_deletes_an_employee_and_returns_to_the_list() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let a = app.store.add_employee(downtown.id, "Avery");
        app.store.add_employee(downtown.id, "Blake");
        let list = format!("/dashboard/branch/{}/employees", downtown.id);
        let response = app
            .post_form(&format!("{list}/{}/delete", a.id), "")
            .await;
        assert_eq!(location(&response), list);
        assert_eq!(app.store.calls().delete_employee, 1);
        let body = body_text(app.get(&list).await).await;
        assert!(!body.contains("Avery"));
        assert!(body.contains("Blake"));
    }

    #[tokio::test]
    async fn it_uploads_the_photo_then_inserts_the_employee() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let response = app
            .post_employee(
                &format!("/dashboard/branch/{}/add-employee", downtown.id),
                "Avery",
                ("avery.png", b"png-bytes"),
            )
            .await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(app.storage.upload_count(), 1);
        let key = &app.storage.keys()[0];
        assert!(key.starts_with(&format!("employees/{}/", downtown.id)));
        assert!(key.ends_with(".png"));
        let employees = app.store.with(|state| state.employees.clone());
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].name, "Avery");
        assert_eq!(
            employees[0].image_url,
            format!("http://localhost:3000/storage/{key}")
        );
    }

    #[tokio::test]
    async fn it_uploads_nothing_without_a_photo() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        let response = app
            .post_employee(
                &format!("/dashboard/branch/{}/add-employee", downtown.id),
                "Avery",
                ("", b""),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("Please fill in all fields including a picture."));
        assert_eq!(app.storage.upload_count(), 0);
        assert_eq!(app.store.calls().insert_employee, 0);
    }

    #[tokio::test]
    async fn it_skips_the_insert_when_the_upload_fails() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        app.storage.fail_with("disk quota exceeded");
        let response = app
            .post_employee(
                &format!("/dashboard/branch/{}/add-employee", downtown.id),
                "Avery",
                ("avery.png", b"png-bytes"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Error uploading image"));
        assert!(body.contains("disk quota exceeded"));
        assert_eq!(app.store.calls().insert_employee, 0);
    }

    #[tokio::test]
    async fn it_keeps_the_uploaded_photo_when_the_insert_fails() {
        let mut app = TestApp::new();
        let owner = app.log_in().await;
        let downtown = app.store.add_branch(owner, "Downtown");
        app.store.fail("insert_employee", "employees table is locked");
        let response = app
            .post_employee(
                &format!("/dashboard/branch/{}/add-employee", downtown.id),
                "Avery",
                ("avery.png", b"png-bytes"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Error adding employee: employees table is locked"));
        assert_eq!(app.store.calls().insert_employee, 1);
        assert_eq!(app.storage.upload_count(), 1);
        assert!(app.store.with(|state| state.employees.is_empty()));
    }
}

mod rating {
    use super::*;

    async fn rate(app: &mut TestApp, branch: &Branch, employee: &Employee, stars: u8) -> Response<Body> {
        app.post_form(
            &format!("/rate/{}/employee/{}", branch.id, employee.id),
            &format!("stars={stars}"),
        )
        .await
    }

    #[tokio::test]
    async fn it_asks_for_a_phone_number_before_listing_employees() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        app.store.add_employee(downtown.id, "Avery");
        let page = format!("/rate/{}", downtown.id);
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("Continue to rating"));
        assert!(!body.contains("Avery"));
        app.post_form(&page, "phone_number=+++").await;
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("Please enter a phone number."));
        assert!(!body.contains("Avery"));
        app.post_form(&page, "phone_number=050-1234567").await;
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("Avery"));
        assert!(body.contains("End of rating"));
    }

    #[tokio::test]
    async fn it_accepts_one_rating_per_employee_per_visit() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        let avery = app.store.add_employee(downtown.id, "Avery");
        let page = format!("/rate/{}", downtown.id);
        app.post_form(&page, "phone_number=050-1234567").await;

        let response = rate(&mut app, &downtown, &avery, 4).await;
        assert_eq!(location(&response), page);
        assert_eq!(app.store.calls().insert_rating, 1);
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("You gave 4 stars"));

        rate(&mut app, &downtown, &avery, 5).await;
        assert_eq!(app.store.calls().insert_rating, 1);
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("You have already rated this employee."));

        app.post_form(&page, "phone_number=050-7654321").await;
        let body = body_text(app.get(&page).await).await;
        assert!(!body.contains("You gave"));
        rate(&mut app, &downtown, &avery, 2).await;
        assert_eq!(app.store.calls().insert_rating, 2);
    }

    #[tokio::test]
    async fn it_carries_the_star_value_in_a_field_the_browser_submits() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        app.store.add_employee(downtown.id, "Avery");
        let page = format!("/rate/{}", downtown.id);
        app.post_form(&page, "phone_number=050-1234567").await;
        let body = body_text(app.get(&page).await).await;
        for star in crate::rate::STAR_VALUES {
            assert!(body.contains(&format!(
                "<input type=\"hidden\" name=\"stars\" value=\"{star}\">"
            )));
        }
        assert!(!body.contains("<button type=\"submit\" name=\"stars\""));
    }

    #[tokio::test]
    async fn it_keeps_an_employee_rateable_after_a_failed_insert() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        let avery = app.store.add_employee(downtown.id, "Avery");
        let page = format!("/rate/{}", downtown.id);
        app.post_form(&page, "phone_number=050-1234567").await;
        app.store.fail("insert_rating", "connection reset");
        let response = rate(&mut app, &downtown, &avery, 4).await;
        assert_eq!(location(&response), page);
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("Error saving rating."));
        assert!(!body.contains("You gave"));
        app.store.recover();
        rate(&mut app, &downtown, &avery, 5).await;
        assert_eq!(app.store.calls().insert_rating, 2);
        assert_eq!(app.store.with(|state| state.ratings.len()), 1);
        assert!(body_text(app.get(&page).await).await.contains("You gave 5 stars"));
    }

    #[tokio::test]
    async fn it_stores_the_phone_number_encrypted() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        let avery = app.store.add_employee(downtown.id, "Avery");
        app.post_form(&format!("/rate/{}", downtown.id), "phone_number=050-1234567")
            .await;
        rate(&mut app, &downtown, &avery, 3).await;
        let rating = app.store.with(|state| state.ratings[0].clone());
        assert_eq!(rating.stars, 3);
        assert_ne!(rating.encrypted_phone_number, b"050-1234567");
        assert_eq!(
            app.cipher
                .decrypt(&rating.encrypted_phone_number)
                .expect("phone number should decrypt"),
            b"050-1234567"
        );
    }

    #[tokio::test]
    async fn it_rejects_out_of_range_stars_and_foreign_employees() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        let avery = app.store.add_employee(downtown.id, "Avery");
        let elsewhere = app.store.add_branch(Uuid::new_v4(), "Uptown");
        let stranger = app.store.add_employee(elsewhere.id, "Casey");
        app.post_form(&format!("/rate/{}", downtown.id), "phone_number=050-1234567")
            .await;
        for stars in [0, 6] {
            assert_eq!(
                rate(&mut app, &downtown, &avery, stars).await.status(),
                StatusCode::BAD_REQUEST
            );
        }
        assert_eq!(
            rate(&mut app, &downtown, &stranger, 5).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(app.store.calls().insert_rating, 0);
    }

    #[tokio::test]
    async fn it_answers_an_unknown_branch_with_not_found() {
        let mut app = TestApp::new();
        let response = app.get(&format!("/rate/{}", Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn it_ends_the_visit_and_leaves_for_the_finish_url() {
        let mut app = TestApp::new();
        let downtown = app.store.add_branch(Uuid::new_v4(), "Downtown");
        let page = format!("/rate/{}", downtown.id);
        app.post_form(&page, "phone_number=050-1234567").await;
        let response = app.post_form(&format!("{page}/finish"), "").await;
        assert_eq!(location(&response), FINISH_URL);
        let body = body_text(app.get(&page).await).await;
        assert!(body.contains("Continue to rating"));
    }
}
