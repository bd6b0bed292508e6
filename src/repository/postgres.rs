use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{OrderRepository, ProofOfDeliveryRepository, RepositoryError};
use crate::domain::audit::AuditLogEntry;
use crate::domain::order::{Order, OrderLineItem, OrderSearchParams, OrderStatus, UpdateDetails};
use crate::domain::proof_of_delivery::{
    ProofOfDelivery, ProofOfDeliveryLineItem, ProofOfDeliveryStatus, Shipment,
};

// ============================================================================
// PostgreSQL store
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.into()))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn load_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items: Vec<OrderLineItemRow> = sqlx::query_as(
            "SELECT * FROM order_line_items WHERE order_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderLineItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.into());
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn load_pods(&self, rows: Vec<PodRow>) -> Result<Vec<ProofOfDelivery>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items: Vec<PodLineItemRow> = sqlx::query_as(
            "SELECT * FROM proof_of_delivery_line_items WHERE proof_of_delivery_id = ANY($1) ORDER BY position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_pod: HashMap<Uuid, Vec<ProofOfDeliveryLineItem>> = HashMap::new();
        for item in items {
            by_pod.entry(item.proof_of_delivery_id).or_default().push(item.into());
        }

        rows.into_iter()
            .map(|row| {
                let items = by_pod.remove(&row.id).unwrap_or_default();
                row.into_pod(items)
            })
            .collect()
    }
}

const POD_SELECT: &str = "SELECT p.id, p.program_id, p.receiving_facility_id, p.status, \
     p.delivered_by, p.received_by, p.received_date, \
     s.id AS shipment_id, s.order_id, s.shipped_by_id, s.shipped_date, s.notes AS shipment_notes \
     FROM proofs_of_delivery p JOIN shipments s ON s.id = p.shipment_id";

#[async_trait]
impl OrderRepository for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders ORDER BY inserted_seq")
            .fetch_all(&self.pool)
            .await?;
        self.load_orders(rows).await
    }

    async fn search(&self, params: &OrderSearchParams) -> Result<Vec<Order>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM orders WHERE TRUE");

        if let Some(id) = params.supplying_facility_id {
            query.push(" AND supplying_facility_id = ").push_bind(id);
        }
        if let Some(id) = params.requesting_facility_id {
            query.push(" AND requesting_facility_id = ").push_bind(id);
        }
        if let Some(id) = params.program_id {
            query.push(" AND program_id = ").push_bind(id);
        }
        if let Some(id) = params.processing_period_id {
            query.push(" AND processing_period_id = ").push_bind(id);
        }
        if !params.statuses.is_empty() {
            let statuses: Vec<String> = params.statuses.iter().map(|s| s.as_str().to_string()).collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(start) = params.period_start_date {
            query.push(" AND (created_date AT TIME ZONE 'UTC')::date >= ").push_bind(start);
        }
        if let Some(end) = params.period_end_date {
            query.push(" AND (created_date AT TIME ZONE 'UTC')::date <= ").push_bind(end);
        }
        query.push(" ORDER BY inserted_seq");

        let rows = query.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;
        self.load_orders(rows).await
    }

    async fn requesting_facilities(&self, supplying_facility_id: Option<Uuid>) -> Result<Vec<Uuid>, RepositoryError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT requesting_facility_id FROM orders \
             WHERE $1::uuid IS NULL OR supplying_facility_id = $1 \
             GROUP BY requesting_facility_id ORDER BY MIN(inserted_seq)",
        )
        .bind(supplying_facility_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        write_order_status_if(&mut conn, order, expected).await
    }
}

#[async_trait]
impl ProofOfDeliveryRepository for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError> {
        let row: Option<PodRow> = sqlx::query_as(&format!("{} WHERE p.id = $1", POD_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.load_pods(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_order_id(&self, order_id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError> {
        let row: Option<PodRow> = sqlx::query_as(&format!("{} WHERE s.order_id = $1 LIMIT 1", POD_SELECT))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.load_pods(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        shipment_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> Result<Vec<ProofOfDelivery>, RepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(POD_SELECT);
        query.push(" WHERE TRUE");
        if let Some(id) = shipment_id {
            query.push(" AND s.id = ").push_bind(id);
        }
        if let Some(id) = order_id {
            query.push(" AND s.order_id = ").push_bind(id);
        }
        query.push(" ORDER BY p.id");

        let rows = query.build_query_as::<PodRow>().fetch_all(&self.pool).await?;
        self.load_pods(rows).await
    }

    async fn update(&self, pod: &ProofOfDelivery, audit: &[AuditLogEntry]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        write_pod_if_initiated(&mut tx, pod).await?;
        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn confirm(
        &self,
        pod: &ProofOfDelivery,
        order: &Order,
        order_status: OrderStatus,
        audit: &[AuditLogEntry],
    ) -> Result<(), RepositoryError> {
        // Dropping the transaction on either failed check rolls back the other write.
        let mut tx = self.pool.begin().await?;
        write_pod_if_initiated(&mut tx, pod).await?;
        write_order_status_if(&mut tx, order, order_status).await?;
        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn audit_log(&self, pod_id: Uuid) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT id, entity_id, entity_type, author_id, changed_property, old_value, new_value, commit_date \
             FROM audit_log WHERE entity_id = $1 ORDER BY seq",
        )
        .bind(pod_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Writes shared by the transactional operations
// ============================================================================

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO orders (id, external_id, order_code, emergency, status, program_id, \
         processing_period_id, requesting_facility_id, receiving_facility_id, supplying_facility_id, \
         facility_id, created_by_id, created_date, updater_id, updated_date, quoted_cost) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(order.id)
    .bind(order.external_id)
    .bind(&order.order_code)
    .bind(order.emergency)
    .bind(order.status.as_str())
    .bind(order.program_id)
    .bind(order.processing_period_id)
    .bind(order.requesting_facility_id)
    .bind(order.receiving_facility_id)
    .bind(order.supplying_facility_id)
    .bind(order.facility_id)
    .bind(order.created_by_id)
    .bind(order.created_date)
    .bind(order.update_details.updater_id)
    .bind(order.update_details.updated_date)
    .bind(&order.quoted_cost)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, &order.order_code))?;

    for (position, item) in order.order_line_items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_line_items \
             (id, order_id, orderable_id, ordered_quantity, filled_quantity, packs_to_ship, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(item.id)
        .bind(order.id)
        .bind(item.orderable_id)
        .bind(item.ordered_quantity)
        .bind(item.filled_quantity)
        .bind(item.packs_to_ship)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Compare-and-set on the stored order status.
async fn write_order_status_if(
    conn: &mut PgConnection,
    order: &Order,
    expected: OrderStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE orders SET status = $2, updater_id = $3, updated_date = $4 \
         WHERE id = $1 AND status = $5",
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(order.update_details.updater_id)
    .bind(order.update_details.updated_date)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::StaleOrder { order_id: order.id, expected });
    }
    Ok(())
}

/// Compare-and-set on the stored status.
async fn write_pod_if_initiated(conn: &mut PgConnection, pod: &ProofOfDelivery) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE proofs_of_delivery SET status = $2, delivered_by = $3, received_by = $4, received_date = $5 \
         WHERE id = $1 AND status = 'INITIATED'",
    )
    .bind(pod.id)
    .bind(pod.status.as_str())
    .bind(&pod.delivered_by)
    .bind(&pod.received_by)
    .bind(pod.received_date)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::ConcurrentConfirmation);
    }

    for item in &pod.line_items {
        sqlx::query(
            "UPDATE proof_of_delivery_line_items SET quantity_accepted = $2, quantity_rejected = $3, \
             rejection_reason_id = $4, notes = $5 WHERE id = $1",
        )
        .bind(item.id)
        .bind(item.quantity_accepted)
        .bind(item.quantity_rejected)
        .bind(item.rejection_reason_id)
        .bind(&item.notes)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn insert_audit(conn: &mut PgConnection, entries: &[AuditLogEntry]) -> Result<(), RepositoryError> {
    for entry in entries {
        sqlx::query(
            "INSERT INTO audit_log (id, entity_id, entity_type, author_id, changed_property, old_value, new_value, commit_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.entity_id)
        .bind(&entry.entity_type)
        .bind(entry.author_id)
        .bind(&entry.changed_property)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.commit_date)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn map_unique_violation(error: sqlx::Error, order_code: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(order_code.to_string())
        }
        _ => RepositoryError::Database(error),
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    external_id: Option<Uuid>,
    order_code: String,
    emergency: bool,
    status: String,
    program_id: Uuid,
    processing_period_id: Uuid,
    requesting_facility_id: Uuid,
    receiving_facility_id: Uuid,
    supplying_facility_id: Uuid,
    facility_id: Uuid,
    created_by_id: Uuid,
    created_date: DateTime<Utc>,
    updater_id: Uuid,
    updated_date: DateTime<Utc>,
    quoted_cost: Option<String>,
}

impl OrderRow {
    fn into_order(self, order_line_items: Vec<OrderLineItem>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("order {}: {}", self.id, e)))?;

        Ok(Order {
            id: self.id,
            external_id: self.external_id,
            order_code: self.order_code,
            emergency: self.emergency,
            status,
            program_id: self.program_id,
            processing_period_id: self.processing_period_id,
            requesting_facility_id: self.requesting_facility_id,
            receiving_facility_id: self.receiving_facility_id,
            supplying_facility_id: self.supplying_facility_id,
            facility_id: self.facility_id,
            created_by_id: self.created_by_id,
            created_date: self.created_date,
            update_details: UpdateDetails::new(self.updater_id, self.updated_date),
            quoted_cost: self.quoted_cost,
            order_line_items,
        })
    }
}

#[derive(FromRow)]
struct OrderLineItemRow {
    id: Uuid,
    order_id: Uuid,
    orderable_id: Uuid,
    ordered_quantity: i64,
    filled_quantity: i64,
    packs_to_ship: i64,
}

impl From<OrderLineItemRow> for OrderLineItem {
    fn from(row: OrderLineItemRow) -> Self {
        Self {
            id: row.id,
            orderable_id: row.orderable_id,
            ordered_quantity: row.ordered_quantity,
            filled_quantity: row.filled_quantity,
            packs_to_ship: row.packs_to_ship,
        }
    }
}

#[derive(FromRow)]
struct PodRow {
    id: Uuid,
    program_id: Uuid,
    receiving_facility_id: Uuid,
    status: String,
    delivered_by: Option<String>,
    received_by: Option<String>,
    received_date: Option<NaiveDate>,
    shipment_id: Uuid,
    order_id: Uuid,
    shipped_by_id: Uuid,
    shipped_date: DateTime<Utc>,
    shipment_notes: Option<String>,
}

impl PodRow {
    fn into_pod(self, line_items: Vec<ProofOfDeliveryLineItem>) -> Result<ProofOfDelivery, RepositoryError> {
        let status: ProofOfDeliveryStatus = self
            .status
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("proof of delivery {}: {}", self.id, e)))?;

        Ok(ProofOfDelivery {
            id: self.id,
            shipment: Shipment {
                id: self.shipment_id,
                order_id: self.order_id,
                shipped_by_id: self.shipped_by_id,
                shipped_date: self.shipped_date,
                notes: self.shipment_notes,
            },
            program_id: self.program_id,
            receiving_facility_id: self.receiving_facility_id,
            status,
            delivered_by: self.delivered_by,
            received_by: self.received_by,
            received_date: self.received_date,
            line_items,
        })
    }
}

#[derive(FromRow)]
struct PodLineItemRow {
    id: Uuid,
    proof_of_delivery_id: Uuid,
    orderable_id: Uuid,
    lot_id: Option<Uuid>,
    quantity_accepted: Option<i64>,
    quantity_rejected: Option<i64>,
    rejection_reason_id: Option<Uuid>,
    notes: Option<String>,
}

impl From<PodLineItemRow> for ProofOfDeliveryLineItem {
    fn from(row: PodLineItemRow) -> Self {
        Self {
            id: row.id,
            orderable_id: row.orderable_id,
            lot_id: row.lot_id,
            quantity_accepted: row.quantity_accepted,
            quantity_rejected: row.quantity_rejected,
            rejection_reason_id: row.rejection_reason_id,
            notes: row.notes,
        }
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    entity_id: Uuid,
    entity_type: String,
    author_id: Uuid,
    changed_property: String,
    old_value: Option<String>,
    new_value: Option<String>,
    commit_date: DateTime<Utc>,
}

impl From<AuditRow> for AuditLogEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            entity_type: row.entity_type,
            author_id: row.author_id,
            changed_property: row.changed_property,
            old_value: row.old_value,
            new_value: row.new_value,
            commit_date: row.commit_date,
        }
    }
}
