use std::path::{Component, Path, PathBuf};

use actix_files::NamedFile;
use actix_web::{
    cookie::{Cookie, SameSite},
    dev::Payload,
    error::ErrorNotFound,
    get,
    http::header::{ContentType, LOCATION},
    post, web, FromRequest, HttpRequest, HttpResponse, Result,
};
use chrono::Local;
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};
use tera::Tera;
use tracing::{debug, info};

use crate::credential_store::CredentialStore;
use crate::error::AppError;
use crate::message_log::{Message, MessageLog};
use crate::session::{SessionManager, SESSION_COOKIE};

pub struct AppState {
    pub tera: Tera,
    pub messages: MessageLog,
    pub sessions: SessionManager,
    pub credentials: CredentialStore,
    pub static_dir: PathBuf,
}

pub fn load_templates(dir: &Path) -> Result<Tera, tera::Error> {
    Tera::new(&format!("{}/*.html", dir.display()))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_static)
        .service(get_index)
        .service(post_send)
        .service(get_register)
        .service(post_register)
        .service(get_login)
        .service(post_login)
        .service(get_logout);
}

/// Identity of the caller, resolved from the session cookie.
pub struct CurrentUser {
    token: Option<String>,
    username: Option<String>,
}

impl FromRequest for CurrentUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let username = match (&token, req.app_data::<web::Data<AppState>>()) {
            (Some(token), Some(data)) => data.sessions.resolve(token),
            _ => None,
        };

        ready(Ok(CurrentUser { token, username }))
    }
}

// Template view of a message
#[derive(Serialize)]
struct MessageTdo {
    created_at: String,
    user: String,
    text: String,
}

impl From<Message> for MessageTdo {
    fn from(msg: Message) -> Self {
        let created_at = msg.created_at.with_timezone(&Local);
        MessageTdo {
            created_at: created_at.format("%d/%m/%Y %H:%M:%S").to_string(),
            user: msg.username,
            text: msg.text,
        }
    }
}

#[derive(Deserialize)]
struct SendForm {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location))
        .finish()
}

fn render(tera: &Tera, template: &str, context: &tera::Context) -> Result<HttpResponse, AppError> {
    let output = tera.render(template, context)?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(output))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Resolves `requested` inside `dir`, refusing anything but plain path segments.
fn static_path(dir: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    if requested
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(dir.join(requested))
}

#[get("/static/{filename:.*}")]
async fn get_static(req: HttpRequest, data: web::Data<AppState>) -> Result<NamedFile> {
    let filename = req.match_info().query("filename");
    let path = static_path(&data.static_dir, filename).ok_or_else(|| ErrorNotFound("not found"))?;
    Ok(NamedFile::open(path)?)
}

#[get("/")]
async fn get_index(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let messages: Vec<MessageTdo> = data
        .messages
        .list_all()
        .into_iter()
        .map(MessageTdo::from)
        .collect();

    let mut context = tera::Context::new();
    context.insert("messages", &messages);
    context.insert("user", &user.username);
    render(&data.tera, "index.html", &context)
}

#[post("/send")]
async fn post_send(
    user: CurrentUser,
    form: web::Form<SendForm>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let username = match user.username {
        Some(username) => username,
        None => return Ok(redirect("/login")),
    };

    debug!("Got message from {}", username);
    data.messages.append(&username, &form.message);
    Ok(redirect("/"))
}

#[get("/register")]
async fn get_register(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    render(&data.tera, "register.html", &tera::Context::new())
}

#[post("/register")]
async fn post_register(
    form: web::Form<CredentialsForm>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let user = web::block(move || data.credentials.register(&form.username, &form.password)).await??;

    info!("Registered {}", user.username);
    Ok(redirect("/login"))
}

#[get("/login")]
async fn get_login(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    render(&data.tera, "login.html", &tera::Context::new())
}

#[post("/login")]
async fn post_login(
    form: web::Form<CredentialsForm>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let token = web::block(move || {
        data.sessions
            .login(&data.credentials, &form.username, &form.password)
    })
    .await??;

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, "/"))
        .cookie(session_cookie(token))
        .finish())
}

#[get("/logout")]
async fn get_logout(user: CurrentUser, data: web::Data<AppState>) -> HttpResponse {
    if let Some(token) = &user.token {
        data.sessions.logout(token);
    }

    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    HttpResponse::Found()
        .insert_header((LOCATION, "/"))
        .cookie(cookie)
        .finish()
}
