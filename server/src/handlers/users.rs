use axum::extract::{Path, Query};
use axum::response::Response;
use serde::Deserialize;

use crate::table::{ClientPagination, SortDirection, DEFAULT_PAGE_SIZE};
use crate::users::{find_user, mock_users, users_table};
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsersParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub async fn list_users(Query(params): Query<UsersParams>) -> Result<Response, AppError> {
    let total = mock_users().len();
    let pagination = ClientPagination::new(params.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
        .at_page(params.page.unwrap_or(0), total);
    let mut table = users_table(pagination);

    if let Some(key) = params.sort.as_deref() {
        let direction = params
            .order
            .as_deref()
            .map(|order| {
                SortDirection::parse(order).ok_or_else(|| {
                    AppError::ValidationError(format!("Unknown sort order '{}'", order))
                })
            })
            .transpose()?
            .unwrap_or(SortDirection::Asc);
        if !table.sort_by(key, direction) {
            return Err(AppError::ValidationError(format!("Cannot sort by '{}'", key)));
        }
    }

    Ok(success(table.view(), "Users retrieved successfully"))
}

pub async fn user_details(Path(id): Path<String>) -> Result<Response, AppError> {
    let user = find_user(&id)
        .ok_or_else(|| AppError::NotFound(format!("User '{}' was not found", id)))?;
    Ok(success(user, "User retrieved successfully"))
}
