//! Admin-only operations: categories, user roles, dashboard and appearance.

use crate::error::DirectoryResult;
use crate::models::{AppearanceSettings, AppearanceUpdate, Category, DirectoryStats, User, Viewer};
use crate::store::Store;
use crate::visibility::require_admin;

pub fn create_category(store: &Store, viewer: &Viewer, name: &str, description: &str) -> DirectoryResult<Category> {
    require_admin(viewer)?;
    let category = store.create_category(name, description)?;
    log::info!("Category {} '{}' created", category.id, category.name);
    Ok(category)
}

pub fn delete_category(store: &Store, viewer: &Viewer, category_id: i64) -> DirectoryResult<()> {
    require_admin(viewer)?;
    store.delete_category(category_id)?;
    log::info!("Category {} deleted", category_id);
    Ok(())
}

pub fn list_users(store: &Store, viewer: &Viewer) -> DirectoryResult<Vec<User>> {
    require_admin(viewer)?;
    store.list_users()
}

pub fn set_user_roles(
    store: &Store,
    viewer: &Viewer,
    user_id: i64,
    is_moderator: Option<bool>,
    is_admin: Option<bool>,
) -> DirectoryResult<User> {
    require_admin(viewer)?;
    let user = store.set_user_roles(user_id, is_moderator, is_admin)?;
    log::info!(
        "Roles for user {} set to moderator={} admin={} by {:?}",
        user.id,
        user.is_moderator,
        user.is_admin,
        viewer.user_id()
    );
    Ok(user)
}

pub fn dashboard(store: &Store, viewer: &Viewer) -> DirectoryResult<DirectoryStats> {
    require_admin(viewer)?;
    store.stats()
}

pub fn update_appearance(
    store: &Store,
    viewer: &Viewer,
    update: &AppearanceUpdate,
) -> DirectoryResult<AppearanceSettings> {
    require_admin(viewer)?;
    store.update_appearance(update)
}
