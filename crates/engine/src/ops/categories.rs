use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{Category, EngineError, ResultEngine, categories};

use super::{Engine, normalize_required_name};

impl Engine {
    /// Creates a category, or a subcategory when `parent_id` is set.
    ///
    /// The parent must be a top-level category of the same user. Names are
    /// unique among siblings.
    pub async fn create_category(
        &self,
        user_id: &str,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> ResultEngine<Category> {
        let name = normalize_required_name(name, "category", EngineError::InvalidCategory)?;
        self.require_user(&self.database, user_id).await?;

        if let Some(parent_id) = parent_id {
            let parent = categories::Entity::find_by_id(parent_id.to_string())
                .filter(categories::Column::OwnerUserId.eq(user_id))
                .one(&self.database)
                .await?
                .ok_or_else(|| {
                    EngineError::InvalidCategory(format!("parent {parent_id} is not available"))
                })?;
            if parent.parent_id.is_some() {
                return Err(EngineError::InvalidCategory(
                    "subcategories cannot be nested".to_string(),
                ));
            }
        }

        let mut siblings = categories::Entity::find()
            .filter(categories::Column::OwnerUserId.eq(user_id))
            .filter(categories::Column::Name.eq(name.as_str()));
        siblings = match parent_id {
            Some(parent_id) => siblings.filter(categories::Column::ParentId.eq(parent_id.to_string())),
            None => siblings.filter(categories::Column::ParentId.is_null()),
        };
        if siblings.one(&self.database).await?.is_some() {
            return Err(EngineError::ExistingKey(name));
        }

        let category = Category {
            id: Uuid::new_v4(),
            owner_user_id: user_id.to_string(),
            name,
            parent_id,
        };
        categories::ActiveModel::from(&category)
            .insert(&self.database)
            .await?;
        Ok(category)
    }

    pub async fn list_categories(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        categories::Entity::find()
            .filter(categories::Column::OwnerUserId.eq(user_id))
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect()
    }
}
