use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, QueryBuilder};

use super::{BackendError, EventTable, Filter, SelectQuery, SelectResult};
use crate::models::{Event, EventPatch, NewEvent};

/// `events` table on PostgreSQL. Column names follow the hosted schema
/// (quoted camelCase for the record fields).
#[derive(Clone)]
pub struct PgEventTable {
    pool: PgPool,
}

impl PgEventTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: Option<&Filter>) {
    match filter {
        Some(Filter::Id(id)) => {
            builder.push(" WHERE id = ").push_bind(*id);
        }
        Some(Filter::HasEnded(ended)) => {
            builder.push(" WHERE \"hasEnded\" = ").push_bind(*ended);
        }
        None => {}
    }
}

#[async_trait]
impl EventTable for PgEventTable {
    async fn select(&self, query: &SelectQuery) -> Result<SelectResult, BackendError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM events");
        push_filter(&mut builder, query.filter.as_ref());
        if let Some(order) = query.order {
            builder
                .push(" ORDER BY ")
                .push(order.column.sql_name())
                .push(if order.ascending { " ASC" } else { " DESC" });
        }
        if let Some((from, to)) = query.range {
            // Clamp to BIGINT; an offset past every row yields no rows.
            let limit = i64::try_from(to.saturating_sub(from).saturating_add(1)).unwrap_or(i64::MAX);
            let offset = i64::try_from(from).unwrap_or(i64::MAX);
            builder
                .push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);
        }
        let rows = builder
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await?;

        let count = if query.count_exact {
            let mut counter = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
            push_filter(&mut counter, query.filter.as_ref());
            let total: i64 = counter
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await?;
            Some(total as u64)
        } else {
            None
        };

        tracing::debug!(rows = rows.len(), ?count, "Selected events");
        Ok(SelectResult { rows, count })
    }

    async fn insert(&self, rows: Vec<NewEvent>) -> Result<Vec<Event>, BackendError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let event = sqlx::query_as::<_, Event>(
                r#"
                INSERT INTO events
                    (title, location, "startDateTime", timezone, description, speakers,
                     "isVirtual", "ticketLink", "bannerImage", "hasEnded")
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
                "#,
            )
            .bind(row.title)
            .bind(row.location)
            .bind(row.start_date_time)
            .bind(row.timezone)
            .bind(row.description)
            .bind(row.speakers)
            .bind(row.is_virtual)
            .bind(row.ticket_link)
            .bind(row.banner_image)
            .bind(row.has_ended)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(event);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn update(&self, patch: &EventPatch, filter: &Filter) -> Result<Vec<Event>, BackendError> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE events SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(title) = &patch.title {
                set.push("title = ").push_bind_unseparated(title.clone());
            }
            if let Some(location) = &patch.location {
                set.push("location = ").push_bind_unseparated(location.clone());
            }
            if let Some(start) = patch.start_date_time {
                set.push("\"startDateTime\" = ").push_bind_unseparated(start);
            }
            if let Some(timezone) = &patch.timezone {
                set.push("timezone = ").push_bind_unseparated(timezone.clone());
            }
            if let Some(description) = &patch.description {
                set.push("description = ")
                    .push_bind_unseparated(description.clone());
            }
            if let Some(speakers) = &patch.speakers {
                set.push("speakers = ").push_bind_unseparated(speakers.clone());
            }
            if let Some(is_virtual) = patch.is_virtual {
                set.push("\"isVirtual\" = ").push_bind_unseparated(is_virtual);
            }
            if let Some(ticket_link) = &patch.ticket_link {
                set.push("\"ticketLink\" = ")
                    .push_bind_unseparated(ticket_link.clone());
            }
            if let Some(banner_image) = &patch.banner_image {
                set.push("\"bannerImage\" = ")
                    .push_bind_unseparated(banner_image.clone());
            }
            if let Some(has_ended) = patch.has_ended {
                set.push("\"hasEnded\" = ").push_bind_unseparated(has_ended);
            }
            set.push("updated_at = NOW()");
        }
        push_filter(&mut builder, Some(filter));
        builder.push(" RETURNING *");

        let rows = builder
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, BackendError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM events");
        push_filter(&mut builder, Some(filter));
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
