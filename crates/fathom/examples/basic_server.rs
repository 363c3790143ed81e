//! Demo application exercising most of the framework.
//!
//! Routes:
//!
//! - `POST /echo`: echoes `{"echo": ...}` back
//! - `GET /hello`: plain greeting
//! - `POST /profile`: creates a profile through a fake SQL service
//! - `GET /profile/all`: lists stored profiles
//! - `GET|PUT /cache/<key>`: reads or writes an in-memory cache, if configured
//! - `GET /static/<path>`: serves files from `DEMO_STATIC_DIR`, rejecting `..`
//! - `GET /openapi.json`: the generated OpenAPI document
//!
//! Run with `cargo run --example basic_server`, then for example
//! `curl -d '{"name":"ada"}' localhost:8080/profile`.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fathom::prelude::*;
use parking_lot::RwLock;
use tracing::info;

const API_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Application settings, separate from the framework's `[server]` and
/// `[logging]` sections.
struct AppConfig {
    static_dir: PathBuf,
    cache_url: Option<String>,
}

impl AppConfig {
    fn from_env() -> Self {
        Self {
            static_dir: env::var("DEMO_STATIC_DIR")
                .map_or_else(|_| PathBuf::from("www/static"), PathBuf::from),
            cache_url: env::var("DEMO_CACHE_URL")
                .ok()
                .or_else(|| Some("memory://local".to_string()))
                .filter(|url| !url.is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct EchoMessage {
    #[field(description = "Echo Response")]
    echo: String,
}

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct ProfileRequest {
    #[field(description = "User Name")]
    name: String,
}

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct Profile {
    #[field(description = "Profile Name")]
    name: String,
    #[field(description = "Profile Email")]
    email: String,
}

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct ProfileEnvelope {
    #[field(description = "HTTP Status of response")]
    status: u16,
    #[field(description = "API Version")]
    version: String,
    #[field(description = "User Profile")]
    profile: Option<Profile>,
}

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct ProfilesEnvelope {
    #[field(description = "HTTP Status of response")]
    status: u16,
    #[field(description = "API Version")]
    version: String,
    #[field(description = "User Profiles")]
    profiles: Vec<Profile>,
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Stands in for a database client.
#[derive(Default)]
struct FakeSql {
    profiles: RwLock<Vec<Profile>>,
}

impl FakeSql {
    fn create_profile(&self, name: &str) -> Option<Profile> {
        if name.is_empty() {
            return None;
        }
        // Simulated query latency.
        thread::sleep(Duration::from_millis(50));
        let profile = Profile {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        };
        self.profiles.write().push(profile.clone());
        Some(profile)
    }

    fn all_profiles(&self) -> Vec<Profile> {
        self.profiles.read().clone()
    }
}

/// Stands in for a remote cache.
struct FakeCache {
    url: String,
    entries: RwLock<HashMap<String, String>>,
}

impl FakeCache {
    fn connect(url: &str) -> Self {
        info!(url, "Connecting to cache");
        Self {
            url: url.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

/// The OpenAPI document, rendered once at startup.
struct OpenApiDocument(String);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

struct EchoHandler;

impl Handler<AppConfig> for EchoHandler {
    type RequestBody = Json<EchoMessage>;
    type Query = ();
    type ResponseBody = Json<EchoMessage>;
    type State = ();

    const DESCRIPTION: &'static str = "Echo handler";

    fn new(_config: Arc<AppConfig>, _state: ()) -> Self {
        Self
    }

    fn handle(
        &mut self,
        request: &Request<Json<EchoMessage>>,
        response: &mut Response<Json<EchoMessage>>,
    ) -> Result<(), HandlerError> {
        response.body_mut().echo = request.body().echo.clone();
        Ok(())
    }
}

struct HelloHandler;

impl Handler<AppConfig> for HelloHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = ();

    const DESCRIPTION: &'static str = "Hello handler";

    fn new(_config: Arc<AppConfig>, _state: ()) -> Self {
        Self
    }

    fn handle(&mut self, _request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        response.set_body("Hello, World!".to_string());
        Ok(())
    }
}

struct CreateProfileHandler {
    sql: Shared<FakeSql>,
}

impl Handler<AppConfig> for CreateProfileHandler {
    type RequestBody = Json<ProfileRequest>;
    type Query = ();
    type ResponseBody = Json<ProfileEnvelope>;
    type State = Shared<FakeSql>;

    const DESCRIPTION: &'static str = "Create profile";

    fn new(_config: Arc<AppConfig>, sql: Shared<FakeSql>) -> Self {
        Self { sql }
    }

    fn handle(
        &mut self,
        request: &Request<Json<ProfileRequest>>,
        response: &mut Response<Json<ProfileEnvelope>>,
    ) -> Result<(), HandlerError> {
        let status = match self.sql.create_profile(&request.body().name) {
            Some(profile) => {
                response.body_mut().profile = Some(profile);
                StatusCode::OK
            }
            None => StatusCode::NOT_FOUND,
        };
        response.set_status(status);
        let body = response.body_mut();
        body.status = status.as_u16();
        body.version = API_VERSION.to_string();
        Ok(())
    }
}

struct ListProfilesHandler {
    sql: Shared<FakeSql>,
}

impl Handler<AppConfig> for ListProfilesHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = Json<ProfilesEnvelope>;
    type State = Shared<FakeSql>;

    const DESCRIPTION: &'static str = "Get all profiles";

    fn new(_config: Arc<AppConfig>, sql: Shared<FakeSql>) -> Self {
        Self { sql }
    }

    fn handle(
        &mut self,
        _request: &Request<()>,
        response: &mut Response<Json<ProfilesEnvelope>>,
    ) -> Result<(), HandlerError> {
        let profiles = self.sql.all_profiles();
        let status = if profiles.is_empty() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::OK
        };
        response.set_status(status);
        let body = response.body_mut();
        body.status = status.as_u16();
        body.version = API_VERSION.to_string();
        body.profiles = profiles;
        Ok(())
    }
}

struct CacheGetHandler {
    cache: Option<Shared<FakeCache>>,
}

impl Handler<AppConfig> for CacheGetHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = Option<Shared<FakeCache>>;

    const DESCRIPTION: &'static str = "Read a cache entry";

    fn new(_config: Arc<AppConfig>, cache: Option<Shared<FakeCache>>) -> Self {
        Self { cache }
    }

    fn handle(&mut self, request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        let Some(cache) = &self.cache else {
            response.set_status(StatusCode::SERVICE_UNAVAILABLE);
            return Ok(());
        };
        let key = request.param("key").unwrap_or_default();
        match cache.entries.read().get(key) {
            Some(value) => response.set_body(value.clone()),
            None => response.set_status(StatusCode::NOT_FOUND),
        }
        Ok(())
    }
}

struct CachePutHandler {
    cache: Option<Shared<FakeCache>>,
}

impl Handler<AppConfig> for CachePutHandler {
    type RequestBody = String;
    type Query = ();
    type ResponseBody = ();
    type State = Option<Shared<FakeCache>>;

    const DESCRIPTION: &'static str = "Write a cache entry";

    fn new(_config: Arc<AppConfig>, cache: Option<Shared<FakeCache>>) -> Self {
        Self { cache }
    }

    fn handle(&mut self, request: &Request<String>, response: &mut Response<()>) -> Result<(), HandlerError> {
        let Some(cache) = &self.cache else {
            response.set_status(StatusCode::SERVICE_UNAVAILABLE);
            return Ok(());
        };
        let key = request.param("key").unwrap_or_default().to_string();
        info!(cache = %cache.url, key = %key, "Storing cache entry");
        cache.entries.write().insert(key, request.body().clone());
        response.set_status(StatusCode::NO_CONTENT);
        Ok(())
    }
}

struct StaticFilesHandler {
    config: Arc<AppConfig>,
}

impl Handler<AppConfig> for StaticFilesHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = ();

    const DESCRIPTION: &'static str = "Static files handler";

    fn new(config: Arc<AppConfig>, _state: ()) -> Self {
        Self { config }
    }

    fn handle(&mut self, request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        if request.path().contains("..") {
            response.set_status(StatusCode::FORBIDDEN);
            return Ok(());
        }

        let path = self.config.static_dir.join(request.param("path").unwrap_or_default());
        info!(path = %path.display(), "Serving file");

        match fs::read_to_string(&path) {
            Ok(content) => {
                response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
                response.set_body(content);
            }
            Err(_) => response.set_status(StatusCode::NOT_FOUND),
        }
        Ok(())
    }
}

struct OpenApiHandler {
    document: Shared<OpenApiDocument>,
}

impl Handler<AppConfig> for OpenApiHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = Shared<OpenApiDocument>;

    const DESCRIPTION: &'static str = "Open API JSON handler";

    fn new(_config: Arc<AppConfig>, document: Shared<OpenApiDocument>) -> Self {
        Self { document }
    }

    fn handle(&mut self, _request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        response.insert_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.set_body(self.document.0.clone());
        Ok(())
    }
}

fn routes() -> RouteTable<AppConfig> {
    RouteTable::new()
        .post::<EchoHandler>("/echo")
        .get::<HelloHandler>("/hello")
        .post::<CreateProfileHandler>("/profile")
        .get::<ListProfilesHandler>("/profile/all")
        .get::<CacheGetHandler>(r"/cache/(?<key>[\w-]+)")
        .put::<CachePutHandler>(r"/cache/(?<key>[\w-]+)")
        .get::<StaticFilesHandler>("/static/(?<path>.*)")
        .get::<OpenApiHandler>("/openapi.json")
}

fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_development()
        .with_optional_file("fathom.toml")?
        .with_dotenv()?
        .with_env_prefix("FATHOM")
        .load()?;
    init_logging(&LogConfig::from(&config.logging))?;

    let routes = routes();
    let document = OpenApiGenerator::new("Fathom demo", API_VERSION)
        .description("Example service built on Fathom")
        .generate_json(&routes)?;

    let mut state = StateRegistry::new();
    state
        .register_default::<FakeSql>()
        .register(|config: &AppConfig| config.cache_url.as_deref().map(FakeCache::connect))
        .register_instance(Arc::new(OpenApiDocument(document)));

    let server = Server::builder(AppConfig::from_env())
        .config(ServerConfig::from_settings(&config.server))
        .state(state)
        .routes(routes)
        .build()?;
    info!(addr = %server.local_addr(), "Demo listening");

    server.run()?;
    Ok(())
}
