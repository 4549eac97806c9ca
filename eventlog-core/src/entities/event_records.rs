use crate::entities::StoreError;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde_json::{Map, Value};

/// A validated, durably stored event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    pub event_type: String,
    pub event_data: Map<String, Value>,
    pub event_timestamp: f64,
}

/// Row shape of `event_records`; `event_data` is the JSON text as stored.
#[derive(Debug, sqlx::FromRow)]
struct EventRecordRow {
    id: i64,
    event_type: String,
    event_data: String,
    event_timestamp: f64,
}

impl TryFrom<EventRecordRow> for EventRecord {
    type Error = StoreError;

    fn try_from(row: EventRecordRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            event_type: row.event_type,
            event_data: serde_json::from_str(&row.event_data)?,
            event_timestamp: row.event_timestamp,
        })
    }
}

impl From<EventRecord> for eventlog_sdk::objects::EventResponse {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id,
            event_type: record.event_type,
            data: record.event_data,
            timestamp: record.event_timestamp,
        }
    }
}

#[derive(Debug, Clone)]
/// Append one event and return it with its assigned id.
///
/// The insert runs in its own transaction, committed before this returns;
/// the id comes from `AUTOINCREMENT` and is never reused.
pub struct AppendEvent {
    pub event_type: String,
    pub event_data: Map<String, Value>,
    pub event_timestamp: f64,
}

impl Processor<AppendEvent> for DatabaseProcessor {
    type Output = EventRecord;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:AppendEvent")]
    async fn process(&self, append: AppendEvent) -> Result<EventRecord, StoreError> {
        let encoded = serde_json::to_string(&append.event_data)?;

        // Dropping the transaction on an error path rolls it back.
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO event_records (event_type, event_data, event_timestamp)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&append.event_type)
        .bind(&encoded)
        .bind(append.event_timestamp)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(EventRecord {
            id,
            event_type: append.event_type,
            event_data: append.event_data,
            event_timestamp: append.event_timestamp,
        })
    }
}

#[derive(Debug, Clone, Default)]
/// List stored events in insertion order, optionally restricted to one type.
pub struct ListEvents {
    pub event_type: Option<String>,
}

impl Processor<ListEvents> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:ListEvents")]
    async fn process(&self, query: ListEvents) -> Result<Vec<EventRecord>, StoreError> {
        let mut query_builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id, event_type, event_data, event_timestamp FROM event_records",
        );
        if let Some(event_type) = query.event_type {
            query_builder.push(" WHERE event_type = ").push_bind(event_type);
        }
        query_builder.push(" ORDER BY id");

        let rows: Vec<EventRecordRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(EventRecord::try_from).collect()
    }
}

#[derive(Debug, Clone, Default)]
/// Count stored events, optionally restricted to one type.
pub struct CountEvents {
    pub event_type: Option<String>,
}

impl Processor<CountEvents> for DatabaseProcessor {
    type Output = i64;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:CountEvents")]
    async fn process(&self, query: CountEvents) -> Result<i64, StoreError> {
        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT COUNT(*) FROM event_records");
        if let Some(event_type) = query.event_type {
            query_builder.push(" WHERE event_type = ").push_bind(event_type);
        }

        let count: i64 = query_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
