use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    entities::store_sequence::{self, Entity as StoreSequence},
    errors::ServiceError,
};

const MAX_ATTEMPTS: usize = 5;

/// Document families that get a per-store running number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SequenceScope {
    Adjustment,
    Transaction,
    PurchaseOrder,
    Receipt,
}

impl SequenceScope {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Adjustment => "ADJ",
            Self::Transaction => "TXN",
            Self::PurchaseOrder => "PO",
            Self::Receipt => "RCV",
        }
    }
}

pub fn format_reference(scope: SequenceScope, value: i64) -> String {
    format!("{}-{:06}", scope.prefix(), value)
}

/// Claims the next number for `scope` in `store_id` and renders it, e.g.
/// `ADJ-000042`. Run it on the same connection as the write that uses the
/// number so a rollback releases it.
pub async fn next_reference<C>(
    conn: &C,
    store_id: Uuid,
    scope: SequenceScope,
) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let value = claim(conn, store_id, scope).await?;
    Ok(format_reference(scope, value))
}

async fn claim<C>(conn: &C, store_id: Uuid, scope: SequenceScope) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let scope_key = scope.to_string();

    for _ in 0..MAX_ATTEMPTS {
        let existing = StoreSequence::find()
            .filter(store_sequence::Column::StoreId.eq(store_id))
            .filter(store_sequence::Column::Scope.eq(scope_key.clone()))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(row) => {
                let claimed = row.next_value;
                let result = StoreSequence::update_many()
                    .col_expr(store_sequence::Column::NextValue, Expr::value(claimed + 1))
                    .filter(store_sequence::Column::Id.eq(row.id))
                    .filter(store_sequence::Column::NextValue.eq(claimed))
                    .exec(conn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if result.rows_affected == 1 {
                    return Ok(claimed);
                }
            }
            None => {
                let row = store_sequence::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    store_id: Set(store_id),
                    scope: Set(scope_key.clone()),
                    next_value: Set(2),
                };
                // A concurrent first claim wins the unique index; loop back and update.
                let inserted = StoreSequence::insert(row)
                    .on_conflict(
                        OnConflict::columns([
                            store_sequence::Column::StoreId,
                            store_sequence::Column::Scope,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(conn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if inserted == 1 {
                    return Ok(1);
                }
            }
        }
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a {} number, please retry",
        scope
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_zero_padded() {
        assert_eq!(format_reference(SequenceScope::Adjustment, 1), "ADJ-000001");
        assert_eq!(format_reference(SequenceScope::PurchaseOrder, 42), "PO-000042");
        assert_eq!(format_reference(SequenceScope::Receipt, 1234567), "RCV-1234567");
    }

    #[tokio::test]
    async fn numbers_are_sequential_per_store_and_scope() {
        let db = crate::db::establish_connection("sqlite::memory:")
            .await
            .expect("connect");
        crate::db::run_migrations(&db).await.expect("migrate");

        let store_a = Uuid::new_v4();
        let store_b = Uuid::new_v4();

        let a1 = next_reference(&db, store_a, SequenceScope::Transaction).await.unwrap();
        let a2 = next_reference(&db, store_a, SequenceScope::Transaction).await.unwrap();
        let b1 = next_reference(&db, store_b, SequenceScope::Transaction).await.unwrap();
        let a_po = next_reference(&db, store_a, SequenceScope::PurchaseOrder).await.unwrap();

        assert_eq!(a1, "TXN-000001");
        assert_eq!(a2, "TXN-000002");
        assert_eq!(b1, "TXN-000001");
        assert_eq!(a_po, "PO-000001");
    }
}
