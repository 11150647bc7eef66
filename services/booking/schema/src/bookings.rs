use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub service_id: i32,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub start_at: chrono::DateTime<chrono::Utc>,
    pub end_at: chrono::DateTime<chrono::Utc>,
    pub timezone: String,
    /// pending | confirmed | cancelled | completed
    pub status: String,
    pub calendar_event_id: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_join_url: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub notes: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::services::Entity",
        from = "Column::ServiceId",
        to = "super::services::Column::Id"
    )]
    Service,
    #[sea_orm(has_many = "super::action_tokens::Entity")]
    ActionTokens,
    #[sea_orm(has_many = "super::scheduled_messages::Entity")]
    ScheduledMessages,
}

impl Related<super::services::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl Related<super::action_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActionTokens.def()
    }
}

impl Related<super::scheduled_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
