//! The public, unauthenticated rating page reached through a branch's QR
//! code.

use crate::{
    application::{notices, Notice},
    error::AppError,
};
use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_login::tower_sessions::Session;
use axum_messages::Messages;
use star_db::models::{Branch, Employee};
use std::collections::HashMap;
use uuid::Uuid;

pub const STAR_VALUES: [u8; 5] = [1, 2, 3, 4, 5];

/// State of one rating visit, kept in the rater's session. Entering a phone
/// number starts a fresh visit.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Visit {
    pub phone_number: String,
    /// Stars already given during this visit, by employee.
    pub rated: HashMap<Uuid, u8>,
}

fn visit_key(branch_id: Uuid) -> String {
    format!("rate-visit-{branch_id}")
}

pub struct EmployeeCard {
    pub employee: Employee,
    pub given: Option<u8>,
}

impl EmployeeCard {
    pub fn lit(&self, star: &u8) -> bool {
        self.given.is_some_and(|given| given >= *star)
    }
}

#[derive(Template)]
#[template(path = "rate.html")]
pub struct RateTemplate {
    messages: Vec<Notice>,
    branch: Branch,
    phone_entered: bool,
    cards: Vec<EmployeeCard>,
    star_values: [u8; 5],
}

#[derive(Debug, serde::Deserialize)]
pub struct PhoneForm {
    phone_number: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct StarsForm {
    stars: u8,
}

async fn public_branch(app_state: &crate::AppState, branch_id: Uuid) -> Result<Branch, AppError> {
    app_state
        .data
        .load_public_branch(branch_id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get(
    session: Session,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let branch = public_branch(&app_state, branch_id).await?;
    let mut messages = notices(messages);
    let visit = session.get::<Visit>(&visit_key(branch_id)).await?;
    let cards = match &visit {
        None => Vec::new(),
        Some(visit) => match app_state.data.list_employees_by_branch(branch_id).await {
            Ok(employees) => employees
                .into_iter()
                .map(|employee| EmployeeCard {
                    given: visit.rated.get(&employee.id).copied(),
                    employee,
                })
                .collect(),
            Err(err) => {
                tracing::error!("loading employees of branch {branch_id}: {err}");
                messages.push(Notice {
                    text: format!("Error retrieving employees: {err}"),
                    is_error: true,
                });
                Vec::new()
            }
        },
    };
    Ok(Html(
        RateTemplate {
            messages,
            branch,
            phone_entered: visit.is_some(),
            cards,
            star_values: STAR_VALUES,
        }
        .render()?,
    )
    .into_response())
}

pub async fn enter_phone(
    session: Session,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path(branch_id): Path<Uuid>,
    Form(PhoneForm { phone_number }): Form<PhoneForm>,
) -> Result<Response, AppError> {
    public_branch(&app_state, branch_id).await?;
    let phone_number = phone_number.trim();
    if phone_number.is_empty() {
        messages.error("Please enter a phone number.");
    } else {
        session
            .insert(
                &visit_key(branch_id),
                Visit {
                    phone_number: phone_number.to_owned(),
                    rated: HashMap::new(),
                },
            )
            .await?;
    }
    Ok(Redirect::to(&format!("/rate/{branch_id}")).into_response())
}

pub async fn submit(
    session: Session,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path((branch_id, employee_id)): Path<(Uuid, Uuid)>,
    Form(StarsForm { stars }): Form<StarsForm>,
) -> Result<Response, AppError> {
    let back = Redirect::to(&format!("/rate/{branch_id}")).into_response();
    if !STAR_VALUES.contains(&stars) {
        return Err(AppError::BadRequest(format!("{stars} is not a star value")));
    }
    let key = visit_key(branch_id);
    let Some(mut visit) = session.get::<Visit>(&key).await? else {
        return Ok(back);
    };
    if visit.rated.contains_key(&employee_id) {
        messages.error("You have already rated this employee.");
        return Ok(back);
    }
    let employees = app_state.data.list_employees_by_branch(branch_id).await?;
    if !employees.iter().any(|employee| employee.id == employee_id) {
        return Err(AppError::NotFound);
    }
    let encrypted_phone_number = app_state.cipher.encrypt(visit.phone_number.as_bytes())?;
    if let Err(err) = app_state
        .data
        .insert_rating(employee_id, encrypted_phone_number, i16::from(stars))
        .await
    {
        tracing::error!("saving rating for employee {employee_id}: {err}");
        messages.error("Error saving rating.");
        return Ok(back);
    }
    visit.rated.insert(employee_id, stars);
    session.insert(&key, visit).await?;
    Ok(back)
}

pub async fn finish(
    session: Session,
    State(app_state): State<crate::AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Response, AppError> {
    session.remove::<Visit>(&visit_key(branch_id)).await?;
    Ok(Redirect::to(&app_state.settings.rating_finish_url).into_response())
}
