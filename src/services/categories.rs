use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        category::{self, Entity as Category},
        product::{self, Entity as Product},
        sku_sequence::{self, Entity as SkuSequence},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::sku::validate_format,
};

pub const DEFAULT_SKU_FORMAT: &str = "{prefix}-{sequence:5}";
pub const DEFAULT_SKU_PREFIX: &str = "SKU";
pub const DEFAULT_TITLE_FORMAT: &str = "{title}";

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Settings stored directly on a category. Unset fields are inherited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategorySettings {
    pub sku_format: Option<String>,
    pub sku_prefix: Option<String>,
    pub title_format: Option<String>,
    pub default_template_id: Option<Uuid>,
    pub label_template_id: Option<Uuid>,
    pub charge_taxes: Option<bool>,
    pub barcode_attributes: Option<Vec<String>>,
}

impl CategorySettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn validate_format(&self) -> Result<(), ServiceError> {
        if let Some(format) = &self.sku_format {
            validate_format(format).map_err(|errors| {
                ServiceError::ValidationError(format!("Invalid SKU format: {}", errors.join("; ")))
            })?;
        }
        Ok(())
    }

    fn apply(self, active: &mut category::ActiveModel) -> Result<(), ServiceError> {
        if let Some(v) = self.sku_format {
            active.sku_format = Set(Some(v));
        }
        if let Some(v) = self.sku_prefix {
            active.sku_prefix = Set(Some(v));
        }
        if let Some(v) = self.title_format {
            active.title_format = Set(Some(v));
        }
        if let Some(v) = self.default_template_id {
            active.default_template_id = Set(Some(v));
        }
        if let Some(v) = self.label_template_id {
            active.label_template_id = Set(Some(v));
        }
        if let Some(v) = self.charge_taxes {
            active.charge_taxes = Set(Some(v));
        }
        if let Some(v) = self.barcode_attributes {
            let raw = serde_json::to_string(&v)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?;
            active.barcode_attributes = Set(Some(raw));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub settings: CategorySettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub sort_order: Option<i32>,
    /// `null` moves the category to the root
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub settings: CategorySettings,
    /// Drops every direct setting before applying `settings`
    #[serde(default)]
    pub clear_settings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EffectiveSettings {
    pub sku_format: String,
    pub sku_prefix: String,
    pub title_format: String,
    pub default_template_id: Option<Uuid>,
    pub label_template_id: Option<Uuid>,
    pub charge_taxes: bool,
    pub barcode_attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryNode {
    pub category: category::Model,
    #[schema(no_recursion)]
    pub children: Vec<CategoryNode>,
}

/// A store's categories keyed by id, with parent links held as ids.
#[derive(Debug, Clone, Default)]
pub struct CategoryArena {
    nodes: HashMap<Uuid, category::Model>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl CategoryArena {
    pub fn new(rows: Vec<category::Model>) -> Self {
        let mut arena = Self::default();
        for row in rows {
            arena.nodes.insert(row.id, row);
        }
        arena.index_children();
        arena
    }

    fn index_children(&mut self) {
        self.children.clear();
        let mut ids: Vec<&category::Model> = self.nodes.values().collect();
        ids.sort_by(|a, b| (a.sort_order, &a.name, a.id).cmp(&(b.sort_order, &b.name, b.id)));
        for node in ids {
            if let Some(parent) = node.parent_id {
                self.children.entry(parent).or_default().push(node.id);
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&category::Model> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_children(&self, id: Uuid) -> bool {
        self.children.get(&id).is_some_and(|c| !c.is_empty())
    }

    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The category followed by its ancestors up to the root. Stops if the
    /// stored links loop.
    pub fn lineage(&self, id: Uuid) -> Vec<&category::Model> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.nodes.get(&id);
        while let Some(node) = cursor {
            if !seen.insert(node.id) {
                break;
            }
            out.push(node);
            cursor = node.parent_id.and_then(|p| self.nodes.get(&p));
        }
        out
    }

    /// True when `ancestor_id` appears in the ancestor chain of `target_id`.
    pub fn is_descendant(&self, ancestor_id: Uuid, target_id: Uuid) -> bool {
        self.lineage(target_id)
            .iter()
            .skip(1)
            .any(|node| node.id == ancestor_id)
    }

    /// Moves `id` under `parent_id` and recomputes levels for the moved
    /// subtree breadth-first.
    pub fn reparent(&mut self, id: Uuid, parent_id: Option<Uuid>) -> Result<(), ServiceError> {
        if !self.nodes.contains_key(&id) {
            return Err(ServiceError::NotFound(format!("Category {} not found", id)));
        }
        let level = match parent_id {
            None => 0,
            Some(parent) if parent == id => {
                return Err(ServiceError::ValidationError(
                    "A category cannot be its own parent".to_string(),
                ))
            }
            Some(parent) => {
                let parent_node = self.nodes.get(&parent).ok_or_else(|| {
                    ServiceError::NotFound(format!("Parent category {} not found", parent))
                })?;
                if self.is_descendant(id, parent) {
                    return Err(ServiceError::ValidationError(
                        "A category cannot be moved under one of its descendants".to_string(),
                    ));
                }
                parent_node.level + 1
            }
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = parent_id;
            node.level = level;
        }
        self.index_children();
        self.recompute_levels(id);
        Ok(())
    }

    fn recompute_levels(&mut self, root: Uuid) {
        let mut queue = VecDeque::from([root]);
        let mut seen = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let level = match self.nodes.get(&id) {
                Some(node) => node.level,
                None => continue,
            };
            let children = self.children.get(&id).cloned().unwrap_or_default();
            for child in children {
                if let Some(node) = self.nodes.get_mut(&child) {
                    node.level = level + 1;
                }
                queue.push_back(child);
            }
        }
    }

    pub fn set_sort_order(&mut self, id: Uuid, sort_order: i32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.sort_order = sort_order;
        }
        self.index_children();
    }

    /// Nearest value of a setting, walking up from `id`.
    fn resolve<T>(&self, id: Uuid, pick: impl Fn(&category::Model) -> Option<T>) -> Option<T> {
        self.lineage(id).into_iter().find_map(pick)
    }

    pub fn effective_sku_format(&self, id: Uuid) -> String {
        self.resolve(id, |c| c.sku_format.clone())
            .unwrap_or_else(|| DEFAULT_SKU_FORMAT.to_string())
    }

    pub fn effective_sku_prefix(&self, id: Uuid) -> String {
        self.resolve(id, |c| c.sku_prefix.clone())
            .unwrap_or_else(|| DEFAULT_SKU_PREFIX.to_string())
    }

    pub fn effective_title_format(&self, id: Uuid) -> String {
        self.resolve(id, |c| c.title_format.clone())
            .unwrap_or_else(|| DEFAULT_TITLE_FORMAT.to_string())
    }

    pub fn effective_default_template(&self, id: Uuid) -> Option<Uuid> {
        self.resolve(id, |c| c.default_template_id)
    }

    pub fn effective_label_template(&self, id: Uuid) -> Option<Uuid> {
        self.resolve(id, |c| c.label_template_id)
    }

    pub fn effective_charge_taxes(&self, id: Uuid) -> bool {
        self.resolve(id, |c| c.charge_taxes).unwrap_or(true)
    }

    pub fn effective_barcode_attributes(&self, id: Uuid) -> Vec<String> {
        self.resolve(id, |c| c.barcode_attribute_list())
            .unwrap_or_default()
    }

    pub fn effective_settings(&self, id: Uuid) -> EffectiveSettings {
        EffectiveSettings {
            sku_format: self.effective_sku_format(id),
            sku_prefix: self.effective_sku_prefix(id),
            title_format: self.effective_title_format(id),
            default_template_id: self.effective_default_template(id),
            label_template_id: self.effective_label_template(id),
            charge_taxes: self.effective_charge_taxes(id),
            barcode_attributes: self.effective_barcode_attributes(id),
        }
    }

    pub fn tree(&self) -> Vec<CategoryNode> {
        let mut roots: Vec<&category::Model> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.map_or(true, |p| !self.nodes.contains_key(&p)))
            .collect();
        roots.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        let mut seen = HashSet::new();
        roots
            .into_iter()
            .map(|root| self.subtree(root, &mut seen))
            .collect()
    }

    fn subtree(&self, node: &category::Model, seen: &mut HashSet<Uuid>) -> CategoryNode {
        seen.insert(node.id);
        let children = self
            .children_of(node.id)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|child| !seen.contains(&child.id))
            .cloned()
            .collect::<Vec<_>>();
        CategoryNode {
            category: node.clone(),
            children: children
                .iter()
                .map(|child| self.subtree(child, seen))
                .collect(),
        }
    }

    /// Rows whose placement differs from `before`.
    fn moved_since<'a>(&'a self, before: &'a CategoryArena) -> Vec<&'a category::Model> {
        self.nodes
            .values()
            .filter(|node| {
                before.nodes.get(&node.id).map_or(true, |old| {
                    old.parent_id != node.parent_id
                        || old.level != node.level
                        || old.sort_order != node.sort_order
                })
            })
            .collect()
    }
}

pub async fn load_arena<C>(conn: &C, store_id: Uuid) -> Result<CategoryArena, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = Category::find()
        .filter(category::Column::StoreId.eq(store_id))
        .order_by_asc(category::Column::SortOrder)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(CategoryArena::new(rows))
}

async fn persist_placement<C>(
    conn: &C,
    before: &CategoryArena,
    after: &CategoryArena,
) -> Result<usize, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let moved = after.moved_since(before);
    for node in &moved {
        Category::update_many()
            .col_expr(category::Column::ParentId, Expr::value(node.parent_id))
            .col_expr(category::Column::Level, Expr::value(node.level))
            .col_expr(category::Column::SortOrder, Expr::value(node.sort_order))
            .col_expr(category::Column::UpdatedAt, Expr::value(now))
            .filter(category::Column::Id.eq(node.id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
    }
    Ok(moved.len())
}

#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        store_id: Uuid,
        input: CreateCategory,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        input.settings.validate_format()?;

        let db = self.db_pool.as_ref();
        let arena = load_arena(db, store_id).await?;
        let (level, siblings) = match input.parent_id {
            Some(parent_id) => {
                let parent = arena.get(parent_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("Parent category {} not found", parent_id))
                })?;
                (parent.level + 1, arena.children_of(parent_id).len())
            }
            None => (0, arena.tree().len()),
        };

        let now = Utc::now();
        let mut active = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            parent_id: Set(input.parent_id),
            name: Set(input.name),
            level: Set(level),
            sort_order: Set(input.sort_order.unwrap_or(siblings as i32)),
            sku_format: Set(None),
            sku_prefix: Set(None),
            title_format: Set(None),
            default_template_id: Set(None),
            label_template_id: Set(None),
            charge_taxes: Set(None),
            barcode_attributes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        input.settings.apply(&mut active)?;
        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        info!(category_id = %created.id, level, "category created");
        self.tree_changed(store_id).await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        store_id: Uuid,
        id: Uuid,
        input: UpdateCategory,
    ) -> Result<category::Model, ServiceError> {
        input.validate()?;
        input.settings.validate_format()?;

        let updated = self
            .db_pool
            .transaction::<_, category::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let before = load_arena(txn, store_id).await?;
                    let current = before
                        .get(id)
                        .cloned()
                        .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;

                    if !input.settings.is_empty() && before.has_children(id) {
                        return Err(ServiceError::ValidationError(
                            "Settings can only be set on categories without children".to_string(),
                        ));
                    }

                    let mut after = before.clone();
                    if let Some(parent_id) = input.parent_id {
                        after.reparent(id, parent_id)?;
                    }
                    if let Some(sort_order) = input.sort_order {
                        after.set_sort_order(id, sort_order);
                    }
                    persist_placement(txn, &before, &after).await?;

                    let mut active: category::ActiveModel = current.into();
                    if let Some(name) = input.name {
                        active.name = Set(name);
                    }
                    if input.clear_settings {
                        active.sku_format = Set(None);
                        active.sku_prefix = Set(None);
                        active.title_format = Set(None);
                        active.default_template_id = Set(None);
                        active.label_template_id = Set(None);
                        active.charge_taxes = Set(None);
                        active.barcode_attributes = Set(None);
                    }
                    input.settings.apply(&mut active)?;
                    if let Some(node) = after.get(id) {
                        active.parent_id = Set(node.parent_id);
                        active.level = Set(node.level);
                        active.sort_order = Set(node.sort_order);
                    }
                    active.updated_at = Set(Utc::now());
                    active.update(txn).await.map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(category_id = %updated.id, level = updated.level, "category updated");
        self.tree_changed(store_id).await;
        Ok(updated)
    }

    /// Applies a batch of moves in order; the whole batch is rejected if
    /// any entry would create a cycle.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn reorder(
        &self,
        store_id: Uuid,
        entries: Vec<ReorderEntry>,
    ) -> Result<Vec<CategoryNode>, ServiceError> {
        let tree = self
            .db_pool
            .transaction::<_, Vec<CategoryNode>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let before = load_arena(txn, store_id).await?;
                    let mut after = before.clone();
                    for entry in &entries {
                        after.reparent(entry.id, entry.parent_id)?;
                        after.set_sort_order(entry.id, entry.sort_order);
                    }
                    let moved = persist_placement(txn, &before, &after).await?;
                    info!(moved, "categories reordered");
                    Ok(after.tree())
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        self.tree_changed(store_id).await;
        Ok(tree)
    }

    /// Deletes a category without children. Products in it become
    /// uncategorised.
    pub async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let arena = load_arena(txn, store_id).await?;
                    if arena.get(id).is_none() {
                        return Err(ServiceError::NotFound(format!("Category {} not found", id)));
                    }
                    if arena.has_children(id) {
                        return Err(ServiceError::InvalidOperation(
                            "Cannot delete a category that has child categories".to_string(),
                        ));
                    }
                    Product::update_many()
                        .col_expr(product::Column::CategoryId, Expr::value(Option::<Uuid>::None))
                        .filter(product::Column::StoreId.eq(store_id))
                        .filter(product::Column::CategoryId.eq(id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    SkuSequence::delete_many()
                        .filter(sku_sequence::Column::CategoryId.eq(id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Category::delete_by_id(id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Ok(())
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(category_id = %id, "category deleted");
        self.tree_changed(store_id).await;
        Ok(())
    }

    pub async fn get(&self, store_id: Uuid, id: Uuid) -> Result<category::Model, ServiceError> {
        Category::find_by_id(id)
            .filter(category::Column::StoreId.eq(store_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn is_descendant(
        &self,
        store_id: Uuid,
        ancestor_id: Uuid,
        target_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let arena = load_arena(self.db_pool.as_ref(), store_id).await?;
        Ok(arena.is_descendant(ancestor_id, target_id))
    }

    pub async fn effective_settings(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<EffectiveSettings, ServiceError> {
        let arena = load_arena(self.db_pool.as_ref(), store_id).await?;
        if arena.get(id).is_none() {
            return Err(ServiceError::NotFound(format!("Category {} not found", id)));
        }
        Ok(arena.effective_settings(id))
    }

    pub async fn tree(&self, store_id: Uuid) -> Result<Vec<CategoryNode>, ServiceError> {
        Ok(load_arena(self.db_pool.as_ref(), store_id).await?.tree())
    }

    async fn tree_changed(&self, store_id: Uuid) {
        self.event_sender
            .send_or_log(Event::CategoryTreeChanged { store_id })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn node(id: u128, parent: Option<u128>, level: i32, sort_order: i32) -> category::Model {
        let now = Utc::now();
        category::Model {
            id: Uuid::from_u128(id),
            store_id: Uuid::nil(),
            parent_id: parent.map(Uuid::from_u128),
            name: format!("cat-{}", id),
            level,
            sort_order,
            sku_format: None,
            sku_prefix: None,
            title_format: None,
            default_template_id: None,
            label_template_id: None,
            charge_taxes: None,
            barcode_attributes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 1 ─ 2 ─ 3 ─ 4, plus a second root 5
    fn chain() -> CategoryArena {
        CategoryArena::new(vec![
            node(1, None, 0, 0),
            node(2, Some(1), 1, 0),
            node(3, Some(2), 2, 0),
            node(4, Some(3), 3, 0),
            node(5, None, 0, 1),
        ])
    }

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn descendants_follow_ancestor_chain() {
        let arena = chain();
        assert!(arena.is_descendant(id(1), id(4)));
        assert!(arena.is_descendant(id(2), id(3)));
        assert!(!arena.is_descendant(id(4), id(1)));
        assert!(!arena.is_descendant(id(1), id(1)));
        assert!(!arena.is_descendant(id(5), id(4)));
    }

    #[test]
    fn moving_under_a_descendant_is_rejected() {
        let mut arena = chain();
        let err = arena.reparent(id(2), Some(id(4))).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
        let err = arena.reparent(id(2), Some(id(2))).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
        assert_eq!(arena.get(id(2)).unwrap().parent_id, Some(id(1)));
    }

    #[test]
    fn reparent_recomputes_subtree_levels() {
        let mut arena = chain();
        arena.reparent(id(2), Some(id(5))).unwrap();
        assert_eq!(arena.get(id(2)).unwrap().level, 1);

        arena.reparent(id(3), None).unwrap();
        assert_eq!(arena.get(id(3)).unwrap().level, 0);
        assert_eq!(arena.get(id(4)).unwrap().level, 1);

        arena.reparent(id(5), Some(id(4))).unwrap();
        assert_eq!(arena.get(id(5)).unwrap().level, 2);
        assert_eq!(arena.get(id(2)).unwrap().level, 3);
    }

    #[test]
    fn settings_resolve_to_nearest_override() {
        let mut rows = vec![
            node(1, None, 0, 0),
            node(2, Some(1), 1, 0),
            node(3, Some(2), 2, 0),
        ];
        rows[0].sku_prefix = Some("JEW".into());
        rows[0].charge_taxes = Some(false);
        rows[1].sku_format = Some("{prefix}{sequence:4}".into());
        rows[2].barcode_attributes = Some(r#"["karat","weight"]"#.into());
        let arena = CategoryArena::new(rows);

        let effective = arena.effective_settings(id(3));
        assert_eq!(effective.sku_prefix, "JEW");
        assert_eq!(effective.sku_format, "{prefix}{sequence:4}");
        assert_eq!(effective.title_format, DEFAULT_TITLE_FORMAT);
        assert!(!effective.charge_taxes);
        assert_eq!(effective.barcode_attributes, vec!["karat", "weight"]);
        assert_eq!(effective.default_template_id, None);
    }

    #[test]
    fn roots_fall_back_to_defaults() {
        let arena = chain();
        let effective = arena.effective_settings(id(5));
        assert_eq!(effective.sku_format, DEFAULT_SKU_FORMAT);
        assert_eq!(effective.sku_prefix, DEFAULT_SKU_PREFIX);
        assert!(effective.charge_taxes);
        assert!(effective.barcode_attributes.is_empty());
    }

    #[test]
    fn tree_orders_siblings_by_sort_order() {
        let arena = CategoryArena::new(vec![
            node(1, None, 0, 1),
            node(2, None, 0, 0),
            node(3, Some(2), 1, 2),
            node(4, Some(2), 1, 1),
        ]);
        let tree = arena.tree();
        assert_eq!(tree[0].category.id, id(2));
        assert_eq!(tree[1].category.id, id(1));
        let children: Vec<Uuid> = tree[0].children.iter().map(|c| c.category.id).collect();
        assert_eq!(children, vec![id(4), id(3)]);
    }

    #[test]
    fn lineage_stops_on_corrupt_loops() {
        let arena = CategoryArena::new(vec![node(1, Some(2), 1, 0), node(2, Some(1), 1, 0)]);
        assert_eq!(arena.lineage(id(1)).len(), 2);
        assert!(!arena.is_descendant(id(3), id(1)));
    }
}
