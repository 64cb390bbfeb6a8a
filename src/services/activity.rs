use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    entities::activity_log::{self, Entity as ActivityLog},
    errors::ServiceError,
};

/// One audit row describing a status change or other notable action.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub store_id: Uuid,
    pub subject_type: &'static str,
    pub subject_id: Uuid,
    pub action: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub user_id: Option<Uuid>,
    pub description: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        store_id: Uuid,
        subject_type: &'static str,
        subject_id: Uuid,
        action: impl Into<String>,
    ) -> Self {
        Self {
            store_id,
            subject_type,
            subject_id,
            action: action.into(),
            from_status: None,
            to_status: None,
            user_id: None,
            description: None,
        }
    }

    pub fn status_change(mut self, from: impl ToString, to: impl ToString) -> Self {
        self.from_status = Some(from.to_string());
        self.to_status = Some(to.to_string());
        self
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn describe(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub async fn record<C>(self, conn: &C) -> Result<activity_log::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        activity_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(self.store_id),
            subject_type: Set(self.subject_type.to_string()),
            subject_id: Set(self.subject_id),
            action: Set(self.action),
            from_status: Set(self.from_status),
            to_status: Set(self.to_status),
            user_id: Set(self.user_id),
            description: Set(self.description),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)
    }
}

/// Activity for one subject, oldest first.
pub async fn history<C>(
    conn: &C,
    store_id: Uuid,
    subject_type: &str,
    subject_id: Uuid,
) -> Result<Vec<activity_log::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    ActivityLog::find()
        .filter(activity_log::Column::StoreId.eq(store_id))
        .filter(activity_log::Column::SubjectType.eq(subject_type))
        .filter(activity_log::Column::SubjectId.eq(subject_id))
        .order_by_asc(activity_log::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}
