//! Per-user categories.
//!
//! A category with a `parent_id` is a subcategory. Nesting stops at one level.

use sea_orm::entity::{ActiveValue, prelude::*};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub owner_user_id: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

impl Category {
    pub fn is_subcategory(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id.to_string()),
            owner_user_id: ActiveValue::Set(category.owner_user_id.clone()),
            name: ActiveValue::Set(category.name.clone()),
            parent_id: ActiveValue::Set(category.parent_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "category")?,
            owner_user_id: model.owner_user_id,
            name: model.name,
            parent_id: model
                .parent_id
                .as_deref()
                .map(|id| parse_uuid(id, "parent category"))
                .transpose()?,
        })
    }
}
