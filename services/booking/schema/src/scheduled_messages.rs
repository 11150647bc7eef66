use sea_orm::entity::prelude::*;

/// Deferred outbound message. Claimed and delivered by the dispatch worker.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scheduled_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub booking_id: Uuid,
    pub message_type: String,
    pub recipient: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub media_url: Option<String>,
    pub send_at: chrono::DateTime<chrono::Utc>,
    /// Dispatch lease; null when no worker holds the row.
    pub claimed_until: Option<chrono::DateTime<chrono::Utc>>,
    /// pending | sent | failed
    pub status: String,
    pub attempts: i32,
    pub provider_message_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bookings::Entity",
        from = "Column::BookingId",
        to = "super::bookings::Column::Id",
        on_delete = "Cascade"
    )]
    Booking,
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
