//! Placeholder users page. No users collection exists yet, so the rows are
//! a fixed set paged and sorted in memory.

use crate::models::DashboardUser;
use crate::table::{ClientPagination, Column, SortValue, Table};

const MOCK_USERS: [(&str, &str, &str, &str, &str, &str); 12] = [
    ("1", "John Smith", "john.smith@example.com", "Admin", "Active", "Today at 2:34 PM"),
    ("2", "Sarah Johnson", "sarah.johnson@example.com", "Editor", "Active", "Today at 11:20 AM"),
    ("3", "Michael Brown", "michael.brown@example.com", "Viewer", "Inactive", "Yesterday at 3:45 PM"),
    ("4", "Emily Davis", "emily.davis@example.com", "Editor", "Active", "Today at 9:12 AM"),
    ("5", "Robert Wilson", "robert.wilson@example.com", "Viewer", "Active", "Yesterday at 5:30 PM"),
    ("6", "Jennifer Taylor", "jennifer.taylor@example.com", "Admin", "Active", "Today at 10:45 AM"),
    ("7", "David Martinez", "david.martinez@example.com", "Editor", "Inactive", "3 days ago"),
    ("8", "Lisa Anderson", "lisa.anderson@example.com", "Viewer", "Active", "Today at 1:15 PM"),
    ("9", "James Thomas", "james.thomas@example.com", "Editor", "Active", "Yesterday at 11:30 AM"),
    ("10", "Patricia White", "patricia.white@example.com", "Viewer", "Inactive", "1 week ago"),
    ("11", "Richard Harris", "richard.harris@example.com", "Admin", "Active", "Today at 8:30 AM"),
    ("12", "Linda Clark", "linda.clark@example.com", "Editor", "Active", "Yesterday at 2:00 PM"),
];

pub fn mock_users() -> Vec<DashboardUser> {
    MOCK_USERS
        .iter()
        .map(|(id, name, email, role, status, last_active)| DashboardUser {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            status: status.to_string(),
            last_active: last_active.to_string(),
        })
        .collect()
}

pub fn find_user(id: &str) -> Option<DashboardUser> {
    mock_users().into_iter().find(|u| u.id == id)
}

pub fn user_columns() -> Vec<Column<DashboardUser>> {
    vec![
        Column::new("name", "Name", |u: &DashboardUser| u.name.clone())
            .sortable_by(|u| SortValue::Text(u.name.clone())),
        Column::new("email", "Email", |u: &DashboardUser| u.email.clone())
            .sortable_by(|u| SortValue::Text(u.email.clone())),
        Column::new("role", "Role", |u: &DashboardUser| u.role.clone())
            .sortable_by(|u| SortValue::Text(u.role.clone())),
        Column::new("status", "Status", |u: &DashboardUser| u.status.clone())
            .sortable_by(|u| SortValue::Flag(u.is_active())),
        Column::new("lastActive", "Last Active", |u: &DashboardUser| u.last_active.clone()),
    ]
}

pub fn users_table(pagination: ClientPagination) -> Table<DashboardUser, ClientPagination> {
    Table::with_pagination(mock_users(), user_columns(), pagination)
        .with_row_key(|u: &DashboardUser| u.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{PaginationStrategy, SortDirection};

    #[test]
    fn test_find_user() {
        assert_eq!(find_user("3").map(|u| u.name), Some("Michael Brown".to_string()));
        assert!(find_user("99").is_none());
    }

    #[test]
    fn test_users_page_in_memory() {
        let mut table = users_table(ClientPagination::new(5));
        assert!(table.pagination().can_next(12));
        table.next_page();
        table.next_page();

        let view = table.view();
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.footer.summary, "Showing 11 to 12 of 12 entries");
        assert!(view.footer.page_size_options.is_some());
    }

    #[test]
    fn test_last_active_is_not_sortable() {
        let mut table = users_table(ClientPagination::default());
        assert!(!table.toggle_sort("lastActive"));
        assert!(table.sort_by("name", SortDirection::Asc));
        assert_eq!(table.row(0).map(|u| u.name.as_str()), Some("David Martinez"));
    }
}
