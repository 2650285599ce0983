use sea_orm::entity::prelude::*;

/// A submitted link. `slug` is always the slug-transform of `title`, and
/// `approved` stays false until an administrator flips it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_resource")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub link: String,
    pub description: String,
    pub user_id: i32,
    pub created: DateTimeUtc,
    pub updated: DateTimeUtc,
    pub approved: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
