//! Application-level scenarios run through the facade.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fathom::prelude::*;
use fathom::router::RouterError;
use fathom::server::ServerError;
use parking_lot::Mutex;

struct AppConfig {
    static_dir: PathBuf,
    cache_enabled: bool,
}

#[derive(Default)]
struct Counter {
    hits: Mutex<u64>,
}

struct Cache {
    entries: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Default, Clone, Record)]
#[record(crate = "fathom::core")]
struct Hits {
    #[field(description = "Requests counted so far")]
    hits: u64,
}

struct CountHandler {
    counter: Shared<Counter>,
}

impl Handler<AppConfig> for CountHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = Json<Hits>;
    type State = Shared<Counter>;

    const DESCRIPTION: &'static str = "Count requests";

    fn new(_config: Arc<AppConfig>, counter: Shared<Counter>) -> Self {
        Self { counter }
    }

    fn handle(&mut self, _request: &Request<()>, response: &mut Response<Json<Hits>>) -> Result<(), HandlerError> {
        let mut hits = self.counter.hits.lock();
        *hits += 1;
        response.body_mut().hits = *hits;
        Ok(())
    }
}

struct StaticHandler {
    config: Arc<AppConfig>,
}

impl Handler<AppConfig> for StaticHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = ();

    fn new(config: Arc<AppConfig>, _state: ()) -> Self {
        Self { config }
    }

    fn handle(&mut self, request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        if request.path().contains("..") {
            response.set_status(StatusCode::FORBIDDEN);
            return Ok(());
        }
        let path = self.config.static_dir.join(request.param("path").unwrap_or_default());
        match fs::read_to_string(path) {
            Ok(content) => response.set_body(content),
            Err(_) => response.set_status(StatusCode::NOT_FOUND),
        }
        Ok(())
    }
}

struct CacheHandler {
    cache: Shared<Cache>,
}

impl Handler<AppConfig> for CacheHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = Shared<Cache>;

    fn new(_config: Arc<AppConfig>, cache: Shared<Cache>) -> Self {
        Self { cache }
    }

    fn handle(&mut self, request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        let key = request.param("key").unwrap_or_default();
        let value = self.cache.entries.lock().get(key).cloned();
        match value {
            Some(value) => response.set_body(value),
            None => response.set_status(StatusCode::NOT_FOUND),
        }
        Ok(())
    }
}

struct DocHandler {
    document: Shared<String>,
}

impl Handler<AppConfig> for DocHandler {
    type RequestBody = ();
    type Query = ();
    type ResponseBody = String;
    type State = Shared<String>;

    fn new(_config: Arc<AppConfig>, document: Shared<String>) -> Self {
        Self { document }
    }

    fn handle(&mut self, _request: &Request<()>, response: &mut Response<String>) -> Result<(), HandlerError> {
        response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.set_body((*self.document).clone());
        Ok(())
    }
}

fn base_routes() -> RouteTable<AppConfig> {
    RouteTable::new()
        .get::<CountHandler>("/count")
        .get::<StaticHandler>("/static/(?<path>.*)")
}

fn registry() -> StateRegistry<AppConfig> {
    let mut registry = StateRegistry::new();
    registry
        .register_default::<Counter>()
        .register(|config: &AppConfig| {
            config.cache_enabled.then(|| Cache {
                entries: Mutex::new(HashMap::from([("answer".to_string(), "42".to_string())])),
            })
        });
    registry
}

fn server_config(dir: &tempfile::TempDir) -> ServerConfig {
    let path = dir.path().join("fathom.toml");
    fs::write(
        &path,
        "[server]\nhost = \"127.0.0.1\"\nport = 0\nhandle_signals = false\ngraceful_shutdown_secs = 0\n",
    )
    .unwrap();
    let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();
    ServerConfig::from_settings(&config.server)
}

fn get(addr: SocketAddr, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(stream, "GET {path} HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();

    let mut reader = BufReader::new(stream);
    let mut status_line = String::new();
    reader.read_line(&mut status_line).unwrap();
    let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();

    let mut raw = String::new();
    reader.read_to_string(&mut raw).unwrap();
    let body = raw.split_once("\r\n\r\n").map(|(_, b)| b.to_string()).unwrap_or_default();
    (status, body)
}

#[test]
fn test_static_parent_segments_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

    let server = Server::builder(AppConfig {
        static_dir: dir.path().to_path_buf(),
        cache_enabled: false,
    })
    .config(server_config(&dir))
    .state(registry())
    .routes(base_routes())
    .build()
    .unwrap()
    .start()
    .unwrap();
    let addr = server.local_addr();

    assert_eq!(get(addr, "/static/index.html"), (200, "<h1>hi</h1>".to_string()));
    assert_eq!(get(addr, "/static/../etc/passwd").0, 403);
    assert_eq!(get(addr, "/static/missing.html").0, 404);
}

#[test]
fn test_shared_state_is_one_instance_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::builder(AppConfig {
        static_dir: dir.path().to_path_buf(),
        cache_enabled: false,
    })
    .config(server_config(&dir))
    .state(registry())
    .routes(base_routes())
    .build()
    .unwrap()
    .start()
    .unwrap();
    let addr = server.local_addr();

    let bodies: Vec<String> = (0..3).map(|_| get(addr, "/count").1).collect();
    assert_eq!(bodies, [r#"{"hits":1}"#, r#"{"hits":2}"#, r#"{"hits":3}"#]);
}

#[test]
fn test_omitted_service_fails_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let result = Server::builder(AppConfig {
        static_dir: dir.path().to_path_buf(),
        cache_enabled: false,
    })
    .config(server_config(&dir))
    .state(registry())
    .routes(base_routes().get::<CacheHandler>("/cache/(?<key>\\w+)"))
    .build();

    assert!(matches!(
        result,
        Err(ServerError::Configuration(RouterError::MissingState { .. }))
    ));
}

#[test]
fn test_configured_service_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::builder(AppConfig {
        static_dir: dir.path().to_path_buf(),
        cache_enabled: true,
    })
    .config(server_config(&dir))
    .state(registry())
    .routes(base_routes().get::<CacheHandler>("/cache/(?<key>\\w+)"))
    .build()
    .unwrap()
    .start()
    .unwrap();

    assert_eq!(get(server.local_addr(), "/cache/answer"), (200, "42".to_string()));
    assert_eq!(get(server.local_addr(), "/cache/other").0, 404);
}

#[test]
fn test_openapi_document_served_from_state() {
    let dir = tempfile::tempdir().unwrap();
    let routes = base_routes().get::<DocHandler>("/openapi.json");
    let document = OpenApiGenerator::new("Scenario", "1.0")
        .generate_json(&routes)
        .unwrap();

    let mut state = registry();
    state.register_instance(Arc::new(document));

    let server = Server::builder(AppConfig {
        static_dir: dir.path().to_path_buf(),
        cache_enabled: false,
    })
    .config(server_config(&dir))
    .state(state)
    .routes(routes)
    .build()
    .unwrap()
    .start()
    .unwrap();

    let (status, body) = get(server.local_addr(), "/openapi.json");
    assert_eq!(status, 200);

    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(doc["openapi"], "3.0.0");
    assert_eq!(doc["info"]["title"], "Scenario");
    assert_eq!(doc["paths"]["/count"]["get"]["description"], "Count requests");
    assert_eq!(
        doc["paths"]["/count"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]
            ["properties"]["hits"]["type"],
        "integer"
    );
}

#[test]
fn test_serve_rejects_unresolvable_host() {
    let mut config = FathomConfig::default();
    config.server.host = "host.invalid".to_string();
    config.server.handle_signals = false;

    let dir = tempfile::tempdir().unwrap();
    let result = fathom::serve(
        &config,
        AppConfig {
            static_dir: dir.path().to_path_buf(),
            cache_enabled: false,
        },
        registry(),
        base_routes(),
    );
    assert!(matches!(
        result,
        Err(fathom::FathomError::Server(ServerError::Resolve { .. }))
    ));
}
