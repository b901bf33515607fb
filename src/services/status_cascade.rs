//! Deactivation propagation for descriptions.
//!
//! Setting a description to `inactive` sets its *direct* children inactive in
//! the same transaction. Grandchildren only follow when a child is itself saved
//! through [`save_description`] with a status change. Reactivation never
//! propagates.

use crate::entities::{description, RecordStatus};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter,
};
use tracing::{debug, instrument};

/// True when a save moves a description from any other status to `inactive`.
pub fn is_deactivation(previous: RecordStatus, next: RecordStatus) -> bool {
    !previous.is_inactive() && next.is_inactive()
}

/// Marks every not-yet-inactive direct child of `description_id` inactive.
///
/// Returns the number of children changed.
#[instrument(skip(conn))]
pub async fn propagate_deactivation<C>(conn: &C, description_id: &str) -> Result<u64, ServiceError>
where
    C: ConnectionTrait,
{
    let result = description::Entity::update_many()
        .col_expr(
            description::Column::Status,
            Expr::value(RecordStatus::Inactive),
        )
        .col_expr(description::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(description::Column::ParentId.eq(description_id))
        .filter(description::Column::Status.ne(RecordStatus::Inactive))
        .exec(conn)
        .await?;

    debug!(
        description_id,
        children = result.rows_affected,
        "propagated deactivation to children"
    );
    Ok(result.rows_affected)
}

/// The single write path for existing descriptions.
///
/// `previous_status` is the status the row had when it was loaded. When the
/// pending change is a deactivation, children are updated before the row itself.
pub async fn save_description<C>(
    conn: &C,
    model: description::ActiveModel,
    previous_status: RecordStatus,
) -> Result<description::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let next_status = match &model.status {
        ActiveValue::Set(status) | ActiveValue::Unchanged(status) => *status,
        ActiveValue::NotSet => previous_status,
    };

    if is_deactivation(previous_status, next_status) {
        let id = match &model.id {
            ActiveValue::Set(id) | ActiveValue::Unchanged(id) => id.clone(),
            ActiveValue::NotSet => {
                return Err(ServiceError::InternalError(
                    "description saved without an id".to_string(),
                ))
            }
        };
        propagate_deactivation(conn, &id).await?;
    }

    Ok(model.update(conn).await?)
}

/// Soft delete: status `inactive`, cascading to direct children.
pub async fn deactivate<C>(
    conn: &C,
    existing: description::Model,
) -> Result<description::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let previous = existing.status;
    let mut active: description::ActiveModel = existing.into();
    active.status = ActiveValue::Set(RecordStatus::Inactive);
    save_description(conn, active, previous).await
}

/// Restore: status `active`. Children are left as they are.
pub async fn restore<C>(
    conn: &C,
    existing: description::Model,
) -> Result<description::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let previous = existing.status;
    let mut active: description::ActiveModel = existing.into();
    active.status = ActiveValue::Set(RecordStatus::Active);
    save_description(conn, active, previous).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RecordStatus::Active, RecordStatus::Inactive, true)]
    #[case(RecordStatus::Archived, RecordStatus::Inactive, true)]
    #[case(RecordStatus::Inactive, RecordStatus::Inactive, false)]
    #[case(RecordStatus::Inactive, RecordStatus::Active, false)]
    #[case(RecordStatus::Active, RecordStatus::Archived, false)]
    #[case(RecordStatus::Active, RecordStatus::Active, false)]
    fn only_transitions_into_inactive_cascade(
        #[case] previous: RecordStatus,
        #[case] next: RecordStatus,
        #[case] expected: bool,
    ) {
        assert_eq!(is_deactivation(previous, next), expected);
    }
}
