//! SKU formats and per-category sequence counters.
//!
//! A format mixes literal characters with `{token}` placeholders, for
//! example `{prefix}-{category_code}-{sequence:5}`.

use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        category,
        sku_sequence::{self, Entity as SkuSequence},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::categories::{load_arena, CategoryArena},
};

pub const MAX_FORMAT_LEN: usize = 100;
pub const MAX_SEQUENCE_WIDTH: usize = 12;
/// Largest sequence value; the widest padding holds twelve digits.
pub const MAX_SEQUENCE_VALUE: i64 = 999_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkuToken {
    Literal(String),
    Prefix,
    CategoryCode,
    CategoryId,
    /// Zero-padded to the width when one is given
    Sequence(Option<usize>),
    Year,
    ShortYear,
    Month,
    Day,
}

impl SkuToken {
    fn from_placeholder(name: &str) -> Result<Self, String> {
        match name {
            "prefix" => Ok(Self::Prefix),
            "category_code" => Ok(Self::CategoryCode),
            "category_id" => Ok(Self::CategoryId),
            "sequence" => Ok(Self::Sequence(None)),
            "year" => Ok(Self::Year),
            "yy" => Ok(Self::ShortYear),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            _ => match name.strip_prefix("sequence:") {
                Some(width) => match width.parse::<usize>() {
                    Ok(n) if (1..=MAX_SEQUENCE_WIDTH).contains(&n) => Ok(Self::Sequence(Some(n))),
                    _ => Err(format!(
                        "Sequence width must be between 1 and {}, got '{}'",
                        MAX_SEQUENCE_WIDTH, width
                    )),
                },
                None => Err(format!("Unknown token '{{{}}}'", name)),
            },
        }
    }
}

fn is_literal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

/// Splits a format into tokens, collecting every problem found.
pub fn parse_format(format: &str) -> Result<Vec<SkuToken>, Vec<String>> {
    let mut errors = Vec::new();
    if format.trim().is_empty() {
        errors.push("SKU format cannot be empty".to_string());
    }
    if format.chars().count() > MAX_FORMAT_LEN {
        errors.push(format!(
            "SKU format cannot be longer than {} characters",
            MAX_FORMAT_LEN
        ));
    }

    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    tokens.push(SkuToken::Literal(std::mem::take(&mut literal)));
                }
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => break,
                        other => name.push(other),
                    }
                }
                if !closed {
                    errors.push("Unbalanced braces in SKU format".to_string());
                    break;
                }
                match SkuToken::from_placeholder(&name) {
                    Ok(token) => tokens.push(token),
                    Err(message) => errors.push(message),
                }
            }
            '}' => errors.push("Unbalanced braces in SKU format".to_string()),
            c if is_literal_char(c) => literal.push(c),
            c => errors.push(format!("Character '{}' is not allowed in a SKU format", c)),
        }
    }
    if !literal.is_empty() {
        tokens.push(SkuToken::Literal(literal));
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        errors.dedup();
        Err(errors)
    }
}

pub fn validate_format(format: &str) -> Result<(), Vec<String>> {
    parse_format(format).map(|_| ())
}

pub fn uses_sequence(tokens: &[SkuToken]) -> bool {
    tokens.iter().any(|t| matches!(t, SkuToken::Sequence(_)))
}

/// First three alphanumerics of the name, upper-cased.
pub fn category_code(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase()
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_ascii_uppercase()
}

/// Values substituted into a format.
#[derive(Debug, Clone)]
pub struct SkuContext<'a> {
    pub prefix: &'a str,
    pub category_name: &'a str,
    pub category_id: Uuid,
    pub sequence: i64,
    pub date: NaiveDate,
}

pub fn render(tokens: &[SkuToken], ctx: &SkuContext<'_>) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            SkuToken::Literal(text) => out.push_str(text),
            SkuToken::Prefix => out.push_str(ctx.prefix),
            SkuToken::CategoryCode => out.push_str(&category_code(ctx.category_name)),
            SkuToken::CategoryId => out.push_str(&short_id(ctx.category_id)),
            SkuToken::Sequence(None) => out.push_str(&ctx.sequence.to_string()),
            SkuToken::Sequence(Some(width)) => {
                out.push_str(&format!("{:0width$}", ctx.sequence, width = *width))
            }
            SkuToken::Year => out.push_str(&format!("{:04}", ctx.date.year())),
            SkuToken::ShortYear => out.push_str(&format!("{:02}", ctx.date.year() % 100)),
            SkuToken::Month => out.push_str(&format!("{:02}", ctx.date.month())),
            SkuToken::Day => out.push_str(&format!("{:02}", ctx.date.day())),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkuPreview {
    pub sku: String,
    pub format: String,
    /// Sequence number the next generated SKU will use
    pub next_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FormatCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct SkuGeneratorService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SkuGeneratorService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    pub fn check_format(format: &str) -> FormatCheck {
        match validate_format(format) {
            Ok(()) => FormatCheck {
                valid: true,
                errors: Vec::new(),
            },
            Err(errors) => FormatCheck {
                valid: false,
                errors,
            },
        }
    }

    /// Renders the next SKU without consuming the sequence.
    pub async fn preview(
        &self,
        store_id: Uuid,
        category_id: Uuid,
    ) -> Result<SkuPreview, ServiceError> {
        let db = self.db_pool.as_ref();
        let arena = load_arena(db, store_id).await?;
        let leaf = leaf_category(&arena, category_id)?;
        let next_value = current_value(db, category_id).await?;
        build(&arena, leaf, next_value)
    }

    #[instrument(skip(self))]
    pub async fn generate(&self, store_id: Uuid, category_id: Uuid) -> Result<String, ServiceError> {
        let sku = self
            .db_pool
            .transaction::<_, String, ServiceError>(move |txn| {
                Box::pin(async move {
                    let arena = load_arena(txn, store_id).await?;
                    let leaf = leaf_category(&arena, category_id)?;
                    let format = arena.effective_sku_format(leaf.id);
                    let tokens = parse_format(&format).map_err(format_error)?;

                    let row = ensure_sequence(txn, store_id, category_id).await?;
                    let rendered = build(&arena, leaf, row.next_value)?;

                    if uses_sequence(&tokens) {
                        let next_value = row
                            .next_value
                            .checked_add(1)
                            .filter(|next| *next <= MAX_SEQUENCE_VALUE + 1)
                            .ok_or_else(|| {
                                ServiceError::InvalidOperation(format!(
                                    "SKU sequence for category {} is exhausted",
                                    category_id
                                ))
                            })?;
                        let result = SkuSequence::update_many()
                            .col_expr(sku_sequence::Column::NextValue, Expr::value(next_value))
                            .col_expr(sku_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
                            .filter(sku_sequence::Column::Id.eq(row.id))
                            .filter(sku_sequence::Column::NextValue.eq(row.next_value))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if result.rows_affected == 0 {
                            return Err(ServiceError::ConcurrentModification(category_id));
                        }
                    }
                    Ok(rendered.sku)
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(%category_id, %sku, "sku generated");
        self.event_sender
            .send_or_log(Event::SkuGenerated {
                store_id,
                category_id,
                sku: sku.clone(),
            })
            .await;
        Ok(sku)
    }

    /// Sets the number the next generated SKU will carry.
    pub async fn reset_to(
        &self,
        store_id: Uuid,
        category_id: Uuid,
        value: i64,
    ) -> Result<SkuPreview, ServiceError> {
        if !(1..=MAX_SEQUENCE_VALUE).contains(&value) {
            return Err(ServiceError::ValidationError(format!(
                "Sequence value must be between 1 and {}",
                MAX_SEQUENCE_VALUE
            )));
        }

        let db = self.db_pool.as_ref();
        let arena = load_arena(db, store_id).await?;
        let leaf = leaf_category(&arena, category_id)?;
        let row = ensure_sequence(db, store_id, category_id).await?;
        SkuSequence::update_many()
            .col_expr(sku_sequence::Column::NextValue, Expr::value(value))
            .col_expr(sku_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sku_sequence::Column::Id.eq(row.id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(%category_id, value, "sku sequence reset");
        build(&arena, leaf, value)
    }
}

fn format_error(errors: Vec<String>) -> ServiceError {
    ServiceError::ValidationError(errors.join("; "))
}

fn leaf_category(arena: &CategoryArena, id: Uuid) -> Result<&category::Model, ServiceError> {
    let node = arena
        .get(id)
        .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;
    if arena.has_children(id) {
        return Err(ServiceError::InvalidOperation(
            "SKUs can only be generated for leaf categories".to_string(),
        ));
    }
    Ok(node)
}

fn build(
    arena: &CategoryArena,
    leaf: &category::Model,
    next_value: i64,
) -> Result<SkuPreview, ServiceError> {
    let format = arena.effective_sku_format(leaf.id);
    let prefix = arena.effective_sku_prefix(leaf.id);
    let tokens = parse_format(&format).map_err(format_error)?;
    let sku = render(
        &tokens,
        &SkuContext {
            prefix: &prefix,
            category_name: &leaf.name,
            category_id: leaf.id,
            sequence: next_value,
            date: Utc::now().date_naive(),
        },
    );
    Ok(SkuPreview {
        sku,
        format,
        next_value,
    })
}

async fn current_value<C>(conn: &C, category_id: Uuid) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(SkuSequence::find()
        .filter(sku_sequence::Column::CategoryId.eq(category_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|row| row.next_value)
        .unwrap_or(1))
}

async fn ensure_sequence<C>(
    conn: &C,
    store_id: Uuid,
    category_id: Uuid,
) -> Result<sku_sequence::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let row = sku_sequence::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        category_id: Set(category_id),
        next_value: Set(1),
        updated_at: Set(Utc::now()),
    };
    SkuSequence::insert(row)
        .on_conflict(
            OnConflict::column(sku_sequence::Column::CategoryId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;

    SkuSequence::find()
        .filter(sku_sequence::Column::CategoryId.eq(category_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::InternalError("SKU sequence row missing".to_string()))
}
