use crate::{
    errors::AppError,
    structs::{Category, InventoryItem, User},
    utils, AppState,
};

/// All items owned by `user_id`, optionally narrowed to one category,
/// ordered by id ascending. Never returns another user's rows.
pub async fn list_items(
    state: &AppState,
    user_id: i64,
    category_id: Option<i64>,
) -> Result<Vec<InventoryItem>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let items = match category_id {
        Some(category_id) => {
            sqlx::query_as::<_, InventoryItem>(
                "SELECT * FROM items WHERE user_id = $1 AND category_id = $2 ORDER BY id ASC",
            )
            .bind(user_id)
            .bind(category_id)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, InventoryItem>(
                "SELECT * FROM items WHERE user_id = $1 ORDER BY id ASC",
            )
            .bind(user_id)
            .fetch_all(&pool)
            .await?
        }
    };
    Ok(items)
}

/// Exact barcode match. Not scoped to a user (see DESIGN.md).
pub async fn find_item_by_barcode(
    state: &AppState,
    barcode: &str,
) -> Result<InventoryItem, AppError> {
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM items WHERE barcode = $1")
        .bind(barcode)
        .fetch_optional(&pool)
        .await?;
    item.ok_or(AppError::NotFound)
}

pub async fn find_item_by_id(state: &AppState, id: i64) -> Result<InventoryItem, AppError> {
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM items WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    item.ok_or(AppError::NotFound)
}

/// Lookup by id restricted to the owning user; NotFound hides other
/// users' items from edit/delete.
pub async fn find_item_owned(
    state: &AppState,
    id: i64,
    user_id: i64,
) -> Result<InventoryItem, AppError> {
    let pool = state.db_pool.clone();
    let item =
        sqlx::query_as::<_, InventoryItem>("SELECT * FROM items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&pool)
            .await?;
    item.ok_or(AppError::NotFound)
}

pub async fn create_item(
    state: &AppState,
    user_id: i64,
    name: String,
    quantity: i64,
    barcode: Option<String>,
    category_id: Option<i64>,
) -> Result<InventoryItem, AppError> {
    let created_at = chrono::Utc::now().to_string();
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>(
        "INSERT INTO items (name, quantity, barcode, category_id, user_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(name)
    .bind(quantity)
    .bind(barcode)
    .bind(category_id)
    .bind(user_id)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    log::info!("Item created: {:?}", item);
    Ok(item)
}

/// Writes back every mutable field of the row identified by `item.id`.
pub async fn update_item(state: &AppState, item: &InventoryItem) -> Result<InventoryItem, AppError> {
    let updated_at = chrono::Utc::now().to_string();
    let pool = state.db_pool.clone();
    let item = sqlx::query_as::<_, InventoryItem>(
        "UPDATE items SET name = $1, quantity = $2, barcode = $3, category_id = $4, updated_at = $5 \
         WHERE id = $6 RETURNING *",
    )
    .bind(&item.name)
    .bind(item.quantity)
    .bind(&item.barcode)
    .bind(item.category_id)
    .bind(&updated_at)
    .bind(item.id)
    .fetch_optional(&pool)
    .await?;
    let item = item.ok_or(AppError::NotFound)?;
    log::info!("Item updated: {:?}", item);
    Ok(item)
}

pub async fn delete_item(state: &AppState, id: i64) -> Result<(), AppError> {
    let pool = state.db_pool.clone();
    let result = sqlx::query("DELETE FROM items WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    log::info!("Item with id {} deleted", id);
    Ok(())
}

pub async fn get_all_categories(state: &AppState) -> Result<Vec<Category>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC")
        .fetch_all(&pool)
        .await?;
    Ok(categories)
}

pub async fn create_user(
    state: &AppState,
    username: String,
    password: String,
) -> Result<User, AppError> {
    let created_at = chrono::Utc::now().to_string();
    let pwd_hash = utils::hash_password(&password).map_err(|e| {
        log::error!("Failed to hash password: {}", e);
        AppError::PasswordError(e.to_string())
    })?;
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, pwd_hash, created_at, updated_at) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(username)
    .bind(pwd_hash)
    .bind(&created_at)
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    log::info!("User created: id={} username={}", user.id, user.username);
    Ok(user)
}

pub async fn get_user_by_username(
    state: &AppState,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&pool)
        .await?;
    Ok(user)
}

pub async fn username_taken(state: &AppState, username: &str) -> Result<bool, sqlx::Error> {
    Ok(get_user_by_username(state, username).await?.is_some())
}

pub async fn get_user_by_id(state: &AppState, id: i64) -> Result<User, sqlx::Error> {
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    Ok(user)
}
