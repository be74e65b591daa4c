use crate::{
    application::{notices, Notice},
    error::AppError,
    login::BackEnd,
};
use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_login::AuthSession;
use axum_messages::Messages;
use qrcode::{render::svg, QrCode};
use star_db::models::Branch;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    stars: Vec<crate::backdrop::Star>,
    messages: Vec<Notice>,
    email: String,
    branches: Vec<BranchRow>,
}

pub struct BranchRow {
    branch: Branch,
    /// Present for the one branch whose QR code was asked for.
    qr_svg: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DashboardQuery {
    qr: Option<Uuid>,
}

#[derive(Debug, serde::Deserialize)]
pub struct NewBranchForm {
    name: String,
}

pub fn rating_link(public_base_url: &str, branch_id: Uuid) -> String {
    format!("{public_base_url}/rate/{branch_id}")
}

/// Inline SVG QR code encoding the branch's public rating link.
pub fn rating_qr_svg(public_base_url: &str, branch_id: Uuid) -> Result<String, AppError> {
    Ok(QrCode::new(rating_link(public_base_url, branch_id).as_bytes())?
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .build())
}

pub async fn get(
    auth_session: AuthSession<BackEnd>,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Query(DashboardQuery { qr }): Query<DashboardQuery>,
) -> Result<Response, AppError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };
    let mut messages = notices(messages);
    let branches = match app_state.data.list_branches_by_owner(user.id).await {
        Ok(branches) => branches,
        Err(err) => {
            tracing::error!("loading branches of {}: {err}", user.id);
            messages.push(Notice {
                text: format!("Error loading branches: {err}"),
                is_error: true,
            });
            Vec::new()
        }
    };
    let branches = branches
        .into_iter()
        .map(|branch| {
            let qr_svg = (qr == Some(branch.id))
                .then(|| rating_qr_svg(&app_state.settings.public_base_url, branch.id))
                .transpose()?;
            Ok(BranchRow { branch, qr_svg })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(Html(
        DashboardTemplate {
            stars: crate::backdrop::generate(),
            messages,
            email: user.email,
            branches,
        }
        .render()?,
    )
    .into_response())
}

pub async fn add_branch(
    auth_session: AuthSession<BackEnd>,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Form(NewBranchForm { name }): Form<NewBranchForm>,
) -> Response {
    let Some(user) = auth_session.user else {
        return Redirect::to("/login").into_response();
    };
    let name = name.trim();
    if name.is_empty() {
        messages.error("Please enter a branch name.");
        return Redirect::to("/dashboard").into_response();
    }
    if let Err(err) = app_state.data.insert_branch(user.id, name).await {
        tracing::error!("adding branch for {}: {err}", user.id);
        messages.error(format!("Error adding branch: {err}"));
    }
    Redirect::to("/dashboard").into_response()
}

pub async fn delete_branch(
    auth_session: AuthSession<BackEnd>,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path(branch_id): Path<Uuid>,
) -> Response {
    let Some(user) = auth_session.user else {
        return Redirect::to("/login").into_response();
    };
    if let Err(err) = app_state.data.delete_branch(user.id, branch_id).await {
        tracing::error!("deleting branch {branch_id}: {err}");
        messages.error("An error occurred while deleting the branch.");
    }
    Redirect::to("/dashboard").into_response()
}
