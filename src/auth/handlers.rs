use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, Result},
    model::{role::Role, user::normalize_email},
    models::{LoginReqDto, RegisterReq},
    store::Store,
    utils::email_filter,
};
use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Serialize, ToSchema)]
pub struct UserInfo {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "warden@example.com")]
    pub email: String,
    #[schema(example = "Warden")]
    pub name: String,
    pub role: Role,
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, store: &Store) -> bool {
    // Cuckoo filter, fast negative
    if !email_filter::might_exist(email) {
        return true;
    }

    // Database fallback
    match store.email_exists(email).await {
        Ok(exists) => !exists,
        Err(e) => {
            error!(error = %e, "Email lookup failed");
            false // fail-safe
        }
    }
}

/// Create the user unless the email is taken, keeping the filter in step.
pub async fn create_user(
    store: &Store,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> Result<()> {
    let hashed = hash_password(password)?;
    store.insert_user(email, name, &hashed, role).await?;
    email_filter::insert(email);
    Ok(())
}

/// User registration handler
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing email, password or name"),
        (status = 403, description = "Staff role requested without a warden token"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    caller: Option<AuthUser>,
    body: web::Json<RegisterReq>,
    store: web::Data<Store>,
) -> actix_web::Result<impl Responder> {
    let email = normalize_email(&body.email);
    let name = body.name.trim();

    if email.is_empty() || body.password.is_empty() || name.is_empty() {
        return Err(AppError::Validation("Email, password and name must not be empty".into()).into());
    }

    let role = body.role.unwrap_or(Role::Student);
    if role != Role::Student && !caller.as_ref().is_some_and(|c| c.role == Role::Warden) {
        info!(email = %email, role = %role, "Staff registration refused");
        return Err(AppError::AccessDenied("Only a warden can register staff accounts".into()).into());
    }

    if !is_email_available(&email, store.get_ref()).await {
        return Err(AppError::Conflict("Email already registered".into()).into());
    }

    create_user(store.get_ref(), &email, &body.password, name, role).await?;
    info!(email = %email, role = %role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

/// Login handler
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, body),
    fields(email = %body.email)
)]
pub async fn login(
    body: web::Json<LoginReqDto>,
    store: web::Data<Store>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    let email = normalize_email(&body.email);
    if email.is_empty() || body.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::Validation("Email and password are required".into()).into());
    }

    debug!("Fetching user from database");

    let user = match store.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()).into());
        }
    };

    if let Err(e) = verify_password(&body.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()).into());
    }

    let token = generate_access_token(&user, &config.jwt_secret, config.access_token_ttl)?;

    info!(user_id = user.id, role = %user.role, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        user: UserInfo {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        },
    }))
}

/// Current caller
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserInfo),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[get("/me")]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(UserInfo {
        id: auth.user_id,
        email: auth.email,
        name: auth.name,
        role: auth.role,
    })
}
