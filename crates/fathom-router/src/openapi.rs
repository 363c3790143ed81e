//! OpenAPI document generation from a route table.
//!
//! The document is derived entirely from what the route table already
//! knows about each handler type: its body shapes, query fields, path
//! captures and description. Paths are keyed by the declared pattern.

use crate::error::RouterResult;
use crate::route::{Route, RouteTable};
use fathom_core::{FieldDescriptor, Schema as FieldSchema};
use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// OpenAPI version emitted by [`OpenApiGenerator`].
pub const OPENAPI_VERSION: &str = "3.0.0";

/// OpenAPI document root object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApi {
    /// OpenAPI version.
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Operations keyed by route pattern.
    pub paths: IndexMap<String, PathItem>,
}

/// API metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// API description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations sharing one pattern, keyed by lowercase method name.
pub type PathItem = IndexMap<String, Operation>;

/// One route as an API operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// `"<METHOD> <pattern>"`.
    pub summary: String,
    /// Handler description.
    pub description: String,
    /// Path and query parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Request body, for methods that carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "requestBody")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code.
    pub responses: IndexMap<String, Response>,
}

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    /// Query string parameter.
    Query,
    /// Named capture of the path pattern.
    Path,
}

/// An operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    #[serde(rename = "in")]
    pub location: ParameterIn,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Parameter schema.
    pub schema: Schema,
}

/// Request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Content by media type.
    pub content: IndexMap<String, MediaType>,
}

/// Media type content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    /// Body schema.
    pub schema: Schema,
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Description.
    pub description: String,
    /// Content by media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// JSON Schema subset used for bodies and parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// JSON type name.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Object properties.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    /// Required properties.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Array item schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Map value schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<Box<Schema>>,
}

impl Schema {
    /// Converts a field shape into a JSON schema.
    ///
    /// Nested records are expanded inline. A record that contains itself is
    /// expanded once; the inner occurrence is a bare object.
    #[must_use]
    pub fn from_field_schema(schema: &FieldSchema) -> Self {
        convert(schema, &mut Vec::new())
    }

    fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            ..Self::default()
        }
    }

    fn with_description(mut self, description: &str) -> Self {
        if !description.is_empty() {
            self.description = Some(description.to_string());
        }
        self
    }
}

fn convert(schema: &FieldSchema, ancestors: &mut Vec<&'static str>) -> Schema {
    match schema {
        FieldSchema::Array(items) => Schema {
            items: Some(Box::new(convert(items, ancestors))),
            ..Schema::typed(schema.type_name())
        },
        FieldSchema::Map(values) => Schema {
            additional_properties: Some(Box::new(convert(values, ancestors))),
            ..Schema::typed(schema.type_name())
        },
        FieldSchema::Object { name, fields } => {
            let mut object = Schema::typed(schema.type_name());
            if ancestors.contains(name) {
                return object;
            }
            ancestors.push(*name);
            for field in *fields {
                let property = convert(&field.schema(), ancestors).with_description(field.description);
                object.properties.insert(field.label.to_string(), property);
                if field.required {
                    object.required.push(field.label.to_string());
                }
            }
            ancestors.pop();
            object
        }
        leaf => Schema::typed(leaf.type_name()),
    }
}

/// Builds an [`OpenApi`] document from routes.
///
/// # Example
///
/// ```rust
/// use fathom_router::{OpenApiGenerator, RouteTable};
///
/// let table = RouteTable::<()>::new();
/// let doc = OpenApiGenerator::new("Demo", "1.0.0").generate(&table);
/// assert_eq!(doc.openapi, "3.0.0");
/// assert!(doc.paths.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct OpenApiGenerator {
    title: String,
    version: String,
    description: Option<String>,
}

impl OpenApiGenerator {
    /// Creates a generator for an API with the given title and version.
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
        }
    }

    /// Sets the API description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Generates a document for every route in a table.
    pub fn generate<C>(&self, table: &RouteTable<C>) -> OpenApi {
        self.generate_routes(table.routes())
    }

    /// Generates a document for a slice of routes.
    ///
    /// When a pattern is declared twice for one method, the first
    /// declaration is documented since it is the one that serves requests.
    pub fn generate_routes<C>(&self, routes: &[Route<C>]) -> OpenApi {
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        for route in routes {
            let item = paths.entry(route.pattern().to_string()).or_default();
            item.entry(route.method().as_str().to_lowercase())
                .or_insert_with(|| operation(route));
        }

        OpenApi {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: self.title.clone(),
                version: self.version.clone(),
                description: self.description.clone(),
            },
            paths,
        }
    }

    /// Generates the document as pretty-printed JSON.
    pub fn generate_json<C>(&self, table: &RouteTable<C>) -> RouterResult<String> {
        Ok(serde_json::to_string_pretty(&self.generate(table))?)
    }
}

fn operation<C>(route: &Route<C>) -> Operation {
    let doc = route.doc();

    let mut parameters: Vec<Parameter> = doc
        .captures
        .iter()
        .map(|name| Parameter {
            name: name.clone(),
            location: ParameterIn::Path,
            description: None,
            required: true,
            schema: Schema::typed("string"),
        })
        .collect();
    parameters.extend(doc.query.iter().map(query_parameter));

    let mut response = Response {
        description: "Successful response".to_string(),
        content: IndexMap::new(),
    };
    if let (Some(content_type), Some(schema)) = (doc.response_content_type, &doc.response_body) {
        response.content.insert(
            content_type.to_string(),
            MediaType {
                schema: Schema::from_field_schema(schema),
            },
        );
    }
    let mut responses = IndexMap::new();
    responses.insert("200".to_string(), response);

    let carries_body = matches!(*route.method(), Method::POST | Method::PUT | Method::PATCH);
    let request_body = match (doc.request_content_type, &doc.request_body) {
        (Some(content_type), Some(schema)) if carries_body => {
            let mut content = IndexMap::new();
            content.insert(
                content_type.to_string(),
                MediaType {
                    schema: Schema::from_field_schema(schema),
                },
            );
            Some(RequestBody {
                required: true,
                content,
            })
        }
        _ => None,
    };

    Operation {
        summary: format!("{} {}", route.method(), route.pattern()),
        description: route.description().to_string(),
        parameters,
        request_body,
        responses,
    }
}

fn query_parameter(field: &FieldDescriptor) -> Parameter {
    Parameter {
        name: field.label.to_string(),
        location: ParameterIn::Query,
        description: (!field.description.is_empty()).then(|| field.description.to_string()),
        required: field.required,
        schema: Schema::from_field_schema(&field.schema()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_core::{
        Handler, HandlerError, Json, Query, Record, Request, Response as HandlerResponse,
    };
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Default, Record)]
    struct Credentials {
        #[field(description = "Login name")]
        username: String,
        attempts: u32,
        tags: Vec<String>,
        note: Option<String>,
    }

    #[derive(Debug, Default, Record)]
    struct Filter {
        #[field(description = "Page size")]
        limit: Option<u32>,
    }

    #[derive(Debug, Default, Record)]
    struct Tree {
        label: String,
        children: Vec<Tree>,
    }

    struct Login;

    impl Handler<()> for Login {
        type RequestBody = Json<Credentials>;
        type Query = ();
        type ResponseBody = String;
        type State = ();

        const DESCRIPTION: &'static str = "Logs a user in";

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Self
        }

        fn handle(
            &mut self,
            _request: &Request<Json<Credentials>>,
            _response: &mut HandlerResponse<String>,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    struct Listing;

    impl Handler<()> for Listing {
        type RequestBody = Json<Credentials>;
        type Query = Query<Filter>;
        type ResponseBody = Json<Tree>;
        type State = ();

        fn new(_config: Arc<()>, _state: ()) -> Self {
            Self
        }

        fn handle(
            &mut self,
            _request: &Request<Json<Credentials>, Query<Filter>>,
            _response: &mut HandlerResponse<Json<Tree>>,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn table() -> RouteTable<()> {
        RouteTable::new()
            .post::<Login>("/login")
            .get::<Listing>("/users/(?<id>[0-9]+)")
            .post::<Listing>("/users/(?<id>[0-9]+)")
    }

    #[test]
    fn test_document_metadata() {
        let doc = OpenApiGenerator::new("Demo", "2.1.0")
            .description("Demo API")
            .generate(&table());
        assert_eq!(doc.openapi, OPENAPI_VERSION);
        assert_eq!(doc.info.title, "Demo");
        assert_eq!(doc.info.version, "2.1.0");
        assert_eq!(doc.info.description.as_deref(), Some("Demo API"));
        let keys: Vec<_> = doc.paths.keys().cloned().collect();
        assert_eq!(keys, vec!["/login", "/users/(?<id>[0-9]+)"]);
    }

    #[test]
    fn test_operation_summary_and_body() {
        let doc = OpenApiGenerator::new("Demo", "1").generate(&table());
        let login = &doc.paths["/login"]["post"];
        assert_eq!(login.summary, "POST /login");
        assert_eq!(login.description, "Logs a user in");
        assert!(login.parameters.is_empty());

        let body = login.request_body.as_ref().unwrap();
        let schema = &body.content["application/json"].schema;
        assert_eq!(schema.schema_type, "object");
        assert_eq!(schema.properties["username"].schema_type, "string");
        assert_eq!(
            schema.properties["username"].description.as_deref(),
            Some("Login name")
        );
        assert_eq!(schema.properties["attempts"].schema_type, "integer");
        assert_eq!(
            schema.properties["tags"].items.as_deref().map(|s| s.schema_type.as_str()),
            Some("string")
        );
        assert_eq!(schema.required, vec!["username", "attempts", "tags"]);

        let ok = &login.responses["200"];
        assert_eq!(ok.content["text/plain; charset=utf-8"].schema.schema_type, "string");
    }

    #[test]
    fn test_get_has_no_request_body() {
        let doc = OpenApiGenerator::new("Demo", "1").generate(&table());
        let item = &doc.paths["/users/(?<id>[0-9]+)"];
        assert!(item["get"].request_body.is_none());
        assert!(item["post"].request_body.is_some());
        assert_eq!(item["get"].description, fathom_core::DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_parameters_from_captures_and_query() {
        let doc = OpenApiGenerator::new("Demo", "1").generate(&table());
        let params = &doc.paths["/users/(?<id>[0-9]+)"]["get"].parameters;
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "id");
        assert_eq!(params[0].location, ParameterIn::Path);
        assert!(params[0].required);
        assert_eq!(params[1].name, "limit");
        assert_eq!(params[1].location, ParameterIn::Query);
        assert!(!params[1].required);
        assert_eq!(params[1].description.as_deref(), Some("Page size"));
    }

    #[test]
    fn test_recursive_record_expands_once() {
        let doc = OpenApiGenerator::new("Demo", "1").generate(&table());
        let tree = &doc.paths["/users/(?<id>[0-9]+)"]["get"].responses["200"].content
            ["application/json"]
            .schema;
        let children = tree.properties["children"].items.as_deref().unwrap();
        assert_eq!(children.schema_type, "object");
        assert!(children.properties.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = OpenApiGenerator::new("Demo", "1")
            .generate_json(&RouteTable::new().post::<Login>("/login"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["openapi"], json!("3.0.0"));
        assert_eq!(value["paths"]["/login"]["post"]["parameters"], json!([]));
        assert_eq!(
            value["paths"]["/login"]["post"]["requestBody"]["content"]["application/json"]
                ["schema"]["properties"]["tags"]["type"],
            json!("array")
        );
    }
}
