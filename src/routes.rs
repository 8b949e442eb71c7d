use actix_files::NamedFile;
use actix_identity::Identity;
use actix_session::Session;
use actix_web::{
    get,
    http::StatusCode,
    post,
    web::{self, Data},
    HttpMessage, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;
use tera::Context;

use crate::{
    db,
    errors::AppError,
    rules::{self, AdjustAction},
    structs::User,
    utils, AppState, TEMPLATES,
};

fn render_html(template: &str, context: &Context, status: StatusCode) -> Result<HttpResponse, AppError> {
    let rendered = TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template: {}", e);
        AppError::TemplateError(e)
    })?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(rendered))
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", location.to_owned()))
        .finish()
}

/// Session guard: resolves the identity cookie to a stored user or fails
/// with `Unauthenticated`, which renders as a redirect to /login.
async fn require_user(state: &AppState, identity: Option<Identity>) -> Result<User, AppError> {
    let identity = identity.ok_or(AppError::Unauthenticated)?;
    let user_id = identity
        .id()?
        .parse::<i64>()
        .map_err(|_| AppError::Unauthenticated)?;
    db::get_user_by_id(state, user_id)
        .await
        .map_err(|_| AppError::Unauthenticated)
}

#[get("/")]
pub async fn index_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let who = match identity {
        None => "anonymous".to_owned(),
        Some(identity) => {
            let id = identity.id()?;
            match id.parse::<i64>() {
                Ok(user_id) => db::get_user_by_id(&state, user_id)
                    .await
                    .map(|user| user.username)
                    .unwrap_or_else(|_| "anonymous".to_owned()),
                Err(_) => "anonymous".to_owned(),
            }
        }
    };

    let mut context = Context::new();
    context.insert("title", "Shelfwatch");
    context.insert("description", "Keep an eye on your stock levels");
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert("identity", &who);

    render_html("home.html", &context, StatusCode::OK)
}

// ---------------------------------------------------------------------------
// accounts

#[derive(Deserialize)]
pub struct SignupForm {
    username: String,
    password: String,
    password2: String,
}

#[get("/signup")]
pub async fn signup_handler() -> Result<impl Responder, AppError> {
    let mut context = Context::new();
    context.insert("title", "Sign up");
    context.insert("errors", &Vec::<String>::new());
    context.insert("username", "");

    render_html("signup.html", &context, StatusCode::OK)
}

#[post("/signup")]
pub async fn signup_form_handler(
    web::Form(form): web::Form<SignupForm>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let username = form.username.trim().to_lowercase();

    let mut errors = Vec::new();
    if username.is_empty() || form.password.is_empty() || form.password2.is_empty() {
        errors.push("All fields are required".to_owned());
    }
    if form.password != form.password2 {
        errors.push("Passwords do not match".to_owned());
    }
    if !form.password.is_empty() && form.password.len() < 12 {
        errors.push("Password must be at least 12 characters long".to_owned());
    }
    if form.password.len() > 128 {
        errors.push("Password must be at most 128 characters long".to_owned());
    }
    if errors.is_empty() && db::username_taken(&state, &username).await? {
        errors.push(format!("Username '{username}' is already taken"));
    }

    if !errors.is_empty() {
        let mut context = Context::new();
        context.insert("title", "Sign up");
        context.insert("errors", &errors);
        context.insert("username", &username);
        return render_html("signup.html", &context, StatusCode::BAD_REQUEST);
    }

    let user = db::create_user(&state, username, form.password).await?;

    // the fresh account is logged in right away, no separate login step
    Identity::login(&request.extensions(), user.id.to_string())?;

    Ok(see_other("/"))
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[get("/login")]
pub async fn login_handler() -> Result<impl Responder, AppError> {
    let mut context = Context::new();
    context.insert("title", "Log in");
    context.insert("errors", &Vec::<String>::new());

    render_html("login.html", &context, StatusCode::OK)
}

#[post("/login")]
pub async fn login_form_handler(
    web::Form(form): web::Form<LoginForm>,
    state: Data<AppState>,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let username = form.username.trim().to_lowercase();

    let rejected = |status: StatusCode| {
        let mut context = Context::new();
        context.insert("title", "Log in");
        context.insert("errors", &vec!["Invalid credentials".to_owned()]);
        render_html("login.html", &context, status)
    };

    if username.is_empty() || form.password.is_empty() {
        return rejected(StatusCode::BAD_REQUEST);
    }

    let user = match db::get_user_by_username(&state, &username).await? {
        Some(user) => user,
        None => return rejected(StatusCode::UNAUTHORIZED),
    };

    match utils::verify_password(&form.password, &user.pwd_hash) {
        Ok(true) => {
            Identity::login(&request.extensions(), user.id.to_string())?;
            Ok(see_other("/dashboard"))
        }
        Ok(false) | Err(_) => rejected(StatusCode::UNAUTHORIZED),
    }
}

#[post("/logout")]
pub async fn logout_handler(user: Identity) -> impl Responder {
    user.logout();
    see_other("/")
}

// ---------------------------------------------------------------------------
// dashboard

#[derive(Deserialize)]
pub struct DashboardQuery {
    category: Option<String>,
}

#[get("/dashboard")]
pub async fn dashboard_handler(
    state: Data<AppState>,
    query: web::Query<DashboardQuery>,
    identity: Option<Identity>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;

    let category_filter = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i64>().ok());

    // low stock is evaluated over everything the user owns; the category
    // filter narrows the listing only
    let all_items = db::list_items(&state, user.id, None).await?;
    let items = match category_filter {
        Some(category_id) => db::list_items(&state, user.id, Some(category_id)).await?,
        None => all_items.clone(),
    };

    let summary = rules::low_stock_summary(&all_items, state.low_stock_threshold);
    if let Some(message) = rules::low_stock_message(&summary) {
        utils::push_flash(&session, message)?;
    }
    let messages = utils::take_flash(&session);

    let categories = db::get_all_categories(&state).await?;

    let mut context = Context::new();
    context.insert("title", "Dashboard");
    context.insert("identity", &user.username);
    context.insert("items", &items);
    context.insert("low_ids", &summary.ids);
    context.insert("messages", &messages);
    context.insert("categories", &categories);
    context.insert("selected_category", &category_filter);

    render_html("dashboard.html", &context, StatusCode::OK)
}

// ---------------------------------------------------------------------------
// barcode search and barcode-driven update

#[derive(Deserialize)]
pub struct BarcodeQuery {
    barcode: Option<String>,
}

#[get("/search")]
pub async fn search_item_handler(
    state: Data<AppState>,
    query: web::Query<BarcodeQuery>,
) -> Result<impl Responder, AppError> {
    let barcode = query
        .barcode
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    // global lookup, not scoped to a user (see DESIGN.md); 404 on no match
    let item = match barcode {
        Some(code) => Some(db::find_item_by_barcode(&state, code).await?),
        None => None,
    };

    let mut context = Context::new();
    context.insert("title", "Search by barcode");
    context.insert("item", &item);

    render_html("search_item.html", &context, StatusCode::OK)
}

#[get("/update-item")]
pub async fn update_item_handler(
    state: Data<AppState>,
    query: web::Query<BarcodeQuery>,
) -> Result<impl Responder, AppError> {
    let barcode = query
        .barcode
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let item = match barcode {
        Some(code) => Some(db::find_item_by_barcode(&state, code).await?),
        None => None,
    };
    let categories = db::get_all_categories(&state).await?;

    let mut context = Context::new();
    context.insert("title", "Update item");
    context.insert("item", &item);
    context.insert("categories", &categories);
    context.insert("errors", &Vec::<String>::new());

    render_html("update_item.html", &context, StatusCode::OK)
}

#[derive(Deserialize)]
pub struct UpdateItemForm {
    barcode: String,
    name: String,
    quantity: String,
    category: Option<String>,
    action: Option<String>,
    quantity_change: Option<String>,
}

#[post("/update-item")]
pub async fn update_item_form_handler(
    web::Form(form): web::Form<UpdateItemForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let barcode = form.barcode.trim();
    if barcode.is_empty() {
        return Err(AppError::NotFound);
    }
    let mut item = db::find_item_by_barcode(&state, barcode).await?;

    let mut errors = Vec::new();

    let name = form.name.trim().to_owned();
    if name.is_empty() {
        errors.push("Name is required".to_owned());
    }
    let quantity = parse_quantity(&form.quantity, &mut errors);
    let category_id = parse_category(form.category.as_deref(), &mut errors);

    let delta = match form
        .quantity_change
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        None => 0,
        Some(raw) => match raw.parse::<i64>() {
            Ok(delta) => delta,
            Err(_) => {
                errors.push("Quantity change must be a whole number".to_owned());
                0
            }
        },
    };
    let action = match form
        .action
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        None => None,
        Some(raw) => match raw.parse::<AdjustAction>() {
            Ok(action) => Some(action),
            Err(message) => {
                errors.push(message);
                None
            }
        },
    };

    if !errors.is_empty() {
        let categories = db::get_all_categories(&state).await?;
        let mut context = Context::new();
        context.insert("title", "Update item");
        context.insert("item", &item);
        context.insert("categories", &categories);
        context.insert("errors", &errors);
        return render_html("update_item.html", &context, StatusCode::BAD_REQUEST);
    }

    item.name = name;
    item.quantity = quantity;
    item.barcode = Some(barcode.to_owned());
    item.category_id = category_id;
    if let Some(action) = action {
        item = rules::apply_adjustment(item, action, delta);
    }

    db::update_item(&state, &item).await?;

    Ok(see_other("/dashboard"))
}

// ---------------------------------------------------------------------------
// create / edit / delete

#[derive(Deserialize)]
pub struct ItemForm {
    name: String,
    quantity: String,
    barcode: Option<String>,
    category: Option<String>,
}

fn parse_quantity(raw: &str, errors: &mut Vec<String>) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(quantity) if quantity >= 0 => quantity,
        Ok(_) => {
            errors.push("Quantity must not be negative".to_owned());
            0
        }
        Err(_) => {
            errors.push("Quantity must be a whole number".to_owned());
            0
        }
    }
}

fn parse_category(raw: Option<&str>, errors: &mut Vec<String>) -> Option<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push("Category must be chosen from the list".to_owned());
                None
            }
        },
    }
}

fn normalize_barcode(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

async fn render_item_form(
    state: &AppState,
    item: Option<&crate::structs::InventoryItem>,
    errors: &[String],
    status: StatusCode,
) -> Result<HttpResponse, AppError> {
    let categories = db::get_all_categories(state).await?;
    let mut context = Context::new();
    context.insert("title", if item.is_some() { "Edit item" } else { "Add item" });
    context.insert("item", &item);
    context.insert("categories", &categories);
    context.insert("errors", errors);
    render_html("item_form.html", &context, status)
}

#[get("/item/add")]
pub async fn add_item_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    require_user(&state, identity).await?;
    render_item_form(&state, None, &[], StatusCode::OK).await
}

#[post("/item/add")]
pub async fn add_item_form_handler(
    web::Form(form): web::Form<ItemForm>,
    state: Data<AppState>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;

    let mut errors = Vec::new();
    let name = form.name.trim().to_owned();
    if name.is_empty() {
        errors.push("Name is required".to_owned());
    }
    let quantity = parse_quantity(&form.quantity, &mut errors);
    let category_id = parse_category(form.category.as_deref(), &mut errors);
    let barcode = normalize_barcode(form.barcode.as_deref());

    if !errors.is_empty() {
        return render_item_form(&state, None, &errors, StatusCode::BAD_REQUEST).await;
    }

    // owner is always the session user, never a submitted field
    db::create_item(&state, user.id, name, quantity, barcode, category_id).await?;

    Ok(see_other("/dashboard"))
}

#[get("/item/edit/{id}")]
pub async fn edit_item_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;
    let item = db::find_item_owned(&state, path.into_inner(), user.id).await?;
    render_item_form(&state, Some(&item), &[], StatusCode::OK).await
}

#[post("/item/edit/{id}")]
pub async fn edit_item_form_handler(
    web::Form(form): web::Form<ItemForm>,
    state: Data<AppState>,
    path: web::Path<i64>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;
    let mut item = db::find_item_owned(&state, path.into_inner(), user.id).await?;

    let mut errors = Vec::new();
    let name = form.name.trim().to_owned();
    if name.is_empty() {
        errors.push("Name is required".to_owned());
    }
    let quantity = parse_quantity(&form.quantity, &mut errors);
    let category_id = parse_category(form.category.as_deref(), &mut errors);
    let barcode = normalize_barcode(form.barcode.as_deref());

    if !errors.is_empty() {
        return render_item_form(&state, Some(&item), &errors, StatusCode::BAD_REQUEST).await;
    }

    item.name = name;
    item.quantity = quantity;
    item.barcode = barcode;
    item.category_id = category_id;
    db::update_item(&state, &item).await?;

    Ok(see_other("/dashboard"))
}

#[get("/item/delete/{id}")]
pub async fn delete_item_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;
    let item = db::find_item_owned(&state, path.into_inner(), user.id).await?;

    let mut context = Context::new();
    context.insert("title", "Delete item");
    context.insert("item", &item);

    render_html("delete_item.html", &context, StatusCode::OK)
}

#[post("/item/delete/{id}")]
pub async fn delete_item_form_handler(
    state: Data<AppState>,
    path: web::Path<i64>,
    identity: Option<Identity>,
) -> Result<impl Responder, AppError> {
    let user = require_user(&state, identity).await?;
    let item = db::find_item_owned(&state, path.into_inner(), user.id).await?;
    db::delete_item(&state, item.id).await?;

    Ok(see_other("/dashboard"))
}

/// favicon handler
#[get("/favicon")]
pub async fn favicon_handler() -> Result<impl Responder, AppError> {
    Ok(NamedFile::open("static/favicon.ico")?)
}
