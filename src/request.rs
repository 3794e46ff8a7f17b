//! Script requests as sent by the catalog backend.

use crate::assemble::PortalMetadata;
use crate::context::Context;
use crate::templates::TemplateKind;
use crate::value::{Geometry, Mapping, Value};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

type JsonObject = serde_json::Map<String, serde_json::Value>;

/// A request for one generated script
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    pub info: PortalMetadata,
    pub parameters: Parameters,
    #[serde(default, rename = "query_parameters")]
    pub query_parameters: Option<JsonObject>,
    /// Also register the provider with EODAG inside the script
    #[serde(default)]
    pub bootstrap_provider: bool,
}

/// One collection or several
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    Many(Vec<CollectionParameters>),
    One(CollectionParameters),
}

/// Search parameters for one collection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionParameters {
    pub product_type: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub geom: Option<Extent>,
    /// Any other key is passed to the search as a query argument
    #[serde(flatten)]
    pub extras: JsonObject,
}

/// Keys the templates pass to the search call by name
const NAMED_FIELDS: [&str; 4] = ["productType", "start", "end", "geom"];

/// Spatial extent, given as WKT text or as a GeoJSON polygon
#[derive(Debug, Clone, PartialEq)]
pub enum Extent {
    Wkt(String),
    Polygon(Geometry),
}

impl<'de> Deserialize<'de> for Extent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::String(wkt) => Ok(Extent::Wkt(wkt.clone())),
            other => Geometry::from_geojson(other)
                .map(Extent::Polygon)
                .ok_or_else(|| D::Error::custom("geom must be a WKT string or a GeoJSON Polygon")),
        }
    }
}

impl From<&Extent> for Value {
    fn from(extent: &Extent) -> Self {
        match extent {
            Extent::Wkt(wkt) => Value::String(wkt.clone()),
            Extent::Polygon(geometry) => Value::Geometry(geometry.clone()),
        }
    }
}

impl CollectionParameters {
    pub fn new(product_type: impl Into<String>) -> Self {
        Self {
            product_type: product_type.into(),
            start: None,
            end: None,
            geom: None,
            extras: JsonObject::new(),
        }
    }

    pub fn has_extras(&self) -> bool {
        !self.extras.is_empty()
    }

    /// Named search fields in search-call order, without extras.
    fn fields(&self) -> Mapping {
        let mut fields = Mapping::new();
        fields.insert("productType", self.product_type.as_str());
        if let Some(start) = &self.start {
            fields.insert("start", start.as_str());
        }
        if let Some(end) = &self.end {
            fields.insert("end", end.as_str());
        }
        if let Some(geom) = &self.geom {
            fields.insert("geom", Value::from(geom));
        }
        fields
    }

    /// Named fields followed by `shared` and then this collection's extras;
    /// later keys replace earlier ones.
    fn to_inline_mapping(&self, shared: Option<&JsonObject>) -> Mapping {
        let mut mapping = self.fields();
        for (key, value) in shared.into_iter().flatten().chain(&self.extras) {
            mapping.insert(key.as_str(), field_value(key, value));
        }
        mapping
    }

    /// Named fields and query arguments kept apart, so no key reaches the
    /// search call twice. A shared key naming a search field replaces it.
    fn split_query(&self, shared: Option<&JsonObject>) -> (Mapping, Mapping) {
        let mut fields = self.fields();
        let mut query = Mapping::new();
        for (key, value) in shared.into_iter().flatten().chain(&self.extras) {
            let target = if NAMED_FIELDS.contains(&key.as_str()) { &mut fields } else { &mut query };
            target.insert(key.as_str(), field_value(key, value));
        }
        (fields, query)
    }
}

/// `geom` given as a GeoJSON polygon becomes a geometry wherever it comes from.
fn field_value(key: &str, value: &serde_json::Value) -> Value {
    if key == "geom" {
        if let Some(geometry) = Geometry::from_geojson(value) {
            return Value::Geometry(geometry);
        }
    }
    Value::from(value.clone())
}

impl ScriptRequest {
    /// Template kind implied by the request shape.
    pub fn kind(&self) -> TemplateKind {
        if self.bootstrap_provider {
            return TemplateKind::ProviderBootstrap;
        }
        match self.parameters {
            Parameters::Many(_) => TemplateKind::MultiCollection,
            Parameters::One(_) => TemplateKind::SingleCollection,
        }
    }

    /// Context for the request's own kind.
    pub fn to_context(&self) -> Context {
        self.context_for(self.kind())
    }

    /// Context shaped for `kind`.
    ///
    /// Single-collection templates see `parameters` as a mapping and the
    /// query arguments, extras included, as `query_parameters`. The other
    /// kinds see `parameters` as a sequence with query arguments inlined
    /// into every collection.
    pub fn context_for(&self, kind: TemplateKind) -> Context {
        let mut context = Context::new().with("info", self.info.to_mapping());

        match (&self.parameters, kind) {
            (Parameters::One(collection), TemplateKind::SingleCollection) => {
                let (fields, query) = collection.split_query(self.query_parameters.as_ref());
                context.insert("parameters", fields);
                if !query.is_empty() {
                    context.insert("query_parameters", query);
                }
            }
            (Parameters::One(collection), _) => {
                let shared = self.query_parameters.as_ref();
                context.insert("parameters", vec![collection.to_inline_mapping(shared)]);
            }
            (Parameters::Many(collections), _) => {
                let shared = self.query_parameters.as_ref();
                let list: Vec<Value> = collections
                    .iter()
                    .map(|collection| Value::Map(collection.to_inline_mapping(shared)))
                    .collect();
                context.insert("parameters", list);
            }
        }

        context
    }
}
