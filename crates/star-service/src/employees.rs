use crate::{
    application::{notices, Notice},
    error::AppError,
    login::BackEnd,
    rollup::{self, RatedEmployee},
};
use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_login::AuthSession;
use axum_messages::Messages;
use star_db::models::Branch;
use uuid::Uuid;

#[derive(Template)]
#[template(path = "employees.html")]
pub struct EmployeesTemplate {
    messages: Vec<Notice>,
    branch: Branch,
    employees: Vec<RatedEmployee>,
}

/// Loads the branch only when the signed-in owner owns it.
async fn owned_branch(
    app_state: &crate::AppState,
    owner: Uuid,
    branch_id: Uuid,
) -> Result<Branch, AppError> {
    app_state
        .data
        .load_branch(owner, branch_id)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list(
    auth_session: AuthSession<BackEnd>,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };
    let branch = owned_branch(&app_state, user.id, branch_id).await?;
    let mut messages = notices(messages);
    let employees = match load_rated_employees(&app_state, branch_id).await {
        Ok(employees) => employees,
        Err(err) => {
            tracing::error!("loading employees of branch {branch_id}: {err}");
            messages.push(Notice {
                text: format!("Error loading employees: {err}"),
                is_error: true,
            });
            Vec::new()
        }
    };
    Ok(Html(
        EmployeesTemplate {
            messages,
            branch,
            employees,
        }
        .render()?,
    )
    .into_response())
}

async fn load_rated_employees(
    app_state: &crate::AppState,
    branch_id: Uuid,
) -> Result<Vec<RatedEmployee>, star_db::Error> {
    let employees = app_state.data.list_employees_by_branch(branch_id).await?;
    let employee_ids: Vec<Uuid> = employees.iter().map(|employee| employee.id).collect();
    let ratings = app_state
        .data
        .list_ratings_for_employees(&employee_ids)
        .await?;
    Ok(rollup::attach_totals(employees, ratings))
}

pub async fn delete(
    auth_session: AuthSession<BackEnd>,
    messages: Messages,
    State(app_state): State<crate::AppState>,
    Path((branch_id, employee_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };
    owned_branch(&app_state, user.id, branch_id).await?;
    if let Err(err) = app_state.data.delete_employee(branch_id, employee_id).await {
        tracing::error!("deleting employee {employee_id}: {err}");
        messages.error("An error occurred while deleting the employee.");
    }
    Ok(Redirect::to(&format!("/dashboard/branch/{branch_id}/employees")).into_response())
}

pub mod add_employee {
    use super::*;
    use crate::storage::EMPLOYEES_BUCKET;
    use axum::extract::Multipart;

    #[derive(Template)]
    #[template(path = "add-employee.html")]
    pub struct AddEmployeeTemplate {
        branch: Branch,
        error: Option<String>,
        name: String,
    }

    fn render(branch: Branch, error: Option<String>, name: String) -> Result<Response, AppError> {
        Ok(Html(AddEmployeeTemplate { branch, error, name }.render()?).into_response())
    }

    /// `<branch>/<milliseconds>.<extension>`, the extension being whatever
    /// follows the last period of the uploaded file's name.
    pub(crate) fn upload_path(branch_id: Uuid, file_name: &str, timestamp_millis: i64) -> String {
        let extension = file_name
            .rsplit_once('.')
            .map_or(file_name, |(_, extension)| extension)
            .replace(['/', '\\'], "");
        format!("{branch_id}/{timestamp_millis}.{extension}")
    }

    pub async fn get(
        auth_session: AuthSession<BackEnd>,
        State(app_state): State<crate::AppState>,
        Path(branch_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let Some(user) = auth_session.user else {
            return Ok(Redirect::to("/login").into_response());
        };
        let branch = owned_branch(&app_state, user.id, branch_id).await?;
        render(branch, None, String::new())
    }

    pub async fn post(
        auth_session: AuthSession<BackEnd>,
        State(app_state): State<crate::AppState>,
        Path(branch_id): Path<Uuid>,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let Some(user) = auth_session.user else {
            return Ok(Redirect::to("/login").into_response());
        };
        let branch = owned_branch(&app_state, user.id, branch_id).await?;
        let mut name = String::new();
        let mut photo = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::BadRequest(err.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_owned();
            match field_name.as_str() {
                "name" => {
                    name = field
                        .text()
                        .await
                        .map_err(|err| AppError::BadRequest(err.to_string()))?;
                }
                "photo" => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| AppError::BadRequest(err.to_string()))?;
                    if !file_name.is_empty() {
                        photo = Some((file_name, bytes));
                    }
                }
                _ => {}
            }
        }
        let name = name.trim().to_owned();
        let Some((file_name, bytes)) = photo.filter(|_| !name.is_empty()) else {
            return render(
                branch,
                Some("Please fill in all fields including a picture.".to_owned()),
                name,
            );
        };
        let path = upload_path(
            branch_id,
            &file_name,
            jiff::Timestamp::now().as_millisecond(),
        );
        if let Err(err) = app_state
            .storage
            .upload(EMPLOYEES_BUCKET, &path, &bytes)
            .await
        {
            tracing::error!("uploading {path}: {err}");
            return render(branch, Some(format!("Error uploading image: {err}")), name);
        }
        let image_url = match app_state.storage.public_url(EMPLOYEES_BUCKET, &path) {
            Ok(image_url) => image_url,
            Err(err) => {
                tracing::error!("minting public url for {path}: {err}");
                return render(branch, Some(format!("Error uploading image: {err}")), name);
            }
        };
        // No compensating delete: a failed insert leaves the uploaded photo behind.
        if let Err(err) = app_state
            .data
            .insert_employee(&name, &image_url, branch_id)
            .await
        {
            tracing::error!("adding employee to branch {branch_id}: {err}");
            return render(branch, Some(format!("Error adding employee: {err}")), name);
        }
        Ok(Redirect::to("/dashboard").into_response())
    }

}
