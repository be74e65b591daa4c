use super::{
    application, dashboard, employees,
    login::{login, logout, register_new_user, BackEnd},
    password_reset::{forgot_password, reset_password},
    rate, storage,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use axum_login::{login_required, tower_sessions::MemoryStore, AuthManagerLayer};
use axum_messages::MessagesManagerLayer;

pub(super) fn setup(
    app_state: super::AppState,
    auth_manager: AuthManagerLayer<BackEnd, MemoryStore>,
) -> axum::routing::Router {
    let max_upload_bytes = app_state.settings.max_upload_bytes;
    axum::Router::new()
        .route("/dashboard", get(dashboard::get))
        .route("/dashboard/branches", post(dashboard::add_branch))
        .route(
            "/dashboard/branch/{id}/delete",
            post(dashboard::delete_branch),
        )
        .route(
            "/dashboard/branch/{id}/add-employee",
            get(employees::add_employee::get)
                .post(employees::add_employee::post)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/dashboard/branch/{id}/employees", get(employees::list))
        .route(
            "/dashboard/branch/{id}/employees/{employee_id}/delete",
            post(employees::delete),
        )
        .route_layer(login_required!(BackEnd, login_url = "/login"))
        .route("/", get(application::main::get))
        .route("/login", get(login::get).post(login::post))
        .route("/logout", post(logout::post))
        .route(
            "/register",
            get(register_new_user::get).post(register_new_user::post),
        )
        .route(
            "/forgot-password",
            get(forgot_password::get).post(forgot_password::post),
        )
        .route(
            "/reset-password/{token}",
            get(reset_password::get).post(reset_password::post),
        )
        .route("/rate/{branch_id}", get(rate::get).post(rate::enter_phone))
        .route(
            "/rate/{branch_id}/employee/{employee_id}",
            post(rate::submit),
        )
        .route("/rate/{branch_id}/finish", post(rate::finish))
        .route("/storage/{bucket}/{*path}", get(storage::serve))
        .layer(MessagesManagerLayer)
        .layer(auth_manager)
        .fallback(application::fallback)
        .with_state(app_state)
}
