//! Redfish Resource Documents
//!
//! Vendors disagree on which properties they populate, so documents are kept as
//! raw JSON and read through dotted field paths (`Status.Health`) that yield
//! `Option`s. Absent and `null` are treated the same.
//!
//! # Resource Kinds
//!
//! The kind tag comes from `@odata.type` (`#Thermal.v1_7_0.Thermal` → `Thermal`).
//! BMCs that omit it are handled by inferring the kind from the resource path.

use serde_json::Value;

/// Path of the Redfish service root
pub const SERVICE_ROOT: &str = "/redfish/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ServiceRoot,
    Collection,
    ComputerSystem,
    Chassis,
    Manager,
    Power,
    Thermal,
    Sensor,
    Processor,
    Memory,
    Storage,
    Drive,
    Other,
}

impl ResourceKind {
    /// Parses an `@odata.type` value such as `#Chassis.v1_14_0.Chassis`.
    pub fn from_odata_type(odata_type: &str) -> Self {
        let name = odata_type.rsplit('.').next().unwrap_or_default();
        if name.ends_with("Collection") {
            return ResourceKind::Collection;
        }
        match name {
            "ServiceRoot" => ResourceKind::ServiceRoot,
            "ComputerSystem" => ResourceKind::ComputerSystem,
            "Chassis" => ResourceKind::Chassis,
            "Manager" => ResourceKind::Manager,
            "Power" => ResourceKind::Power,
            "Thermal" => ResourceKind::Thermal,
            "Sensor" => ResourceKind::Sensor,
            "Processor" => ResourceKind::Processor,
            "Memory" => ResourceKind::Memory,
            "Storage" => ResourceKind::Storage,
            "Drive" => ResourceKind::Drive,
            _ => ResourceKind::Other,
        }
    }

    /// Best guess for documents without `@odata.type`.
    pub fn from_path(path: &str) -> Self {
        if path == SERVICE_ROOT {
            return ResourceKind::ServiceRoot;
        }

        let mut segments = path.rsplit('/');
        let last = segments.next().unwrap_or_default();
        let parent = segments.next().unwrap_or_default();

        match last {
            "Systems" | "Chassis" | "Managers" | "Processors" | "Memory" | "Storage"
            | "Drives" | "Sensors" => return ResourceKind::Collection,
            "Power" => return ResourceKind::Power,
            "Thermal" => return ResourceKind::Thermal,
            _ => {}
        }

        match parent {
            "Systems" => ResourceKind::ComputerSystem,
            "Chassis" => ResourceKind::Chassis,
            "Managers" => ResourceKind::Manager,
            "Processors" => ResourceKind::Processor,
            "Memory" => ResourceKind::Memory,
            "Storage" => ResourceKind::Storage,
            "Drives" => ResourceKind::Drive,
            "Sensors" => ResourceKind::Sensor,
            _ => ResourceKind::Other,
        }
    }
}

/// Normalizes a link target to the path used for deduplication.
///
/// Strips scheme and authority from absolute URLs, drops `#fragment`s and
/// trailing slashes. Returns `None` for anything outside `/redfish/`.
pub fn normalize_path(link: &str) -> Option<String> {
    let mut path = link.trim();

    if let Some(rest) = path
        .strip_prefix("https://")
        .or_else(|| path.strip_prefix("http://"))
    {
        path = rest.find('/').map(|idx| &rest[idx..]).unwrap_or("/");
    }

    if let Some(idx) = path.find('#') {
        path = &path[..idx];
    }

    let path = path.trim_end_matches('/');
    if path.starts_with("/redfish/") {
        Some(path.to_string())
    } else {
        None
    }
}

/// Looks up a dotted field path, treating `null` as absent.
pub fn field_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Extracts the link target of a `{"@odata.id": ...}` (or legacy `href`) object.
fn link_target(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    object
        .get("@odata.id")
        .or_else(|| object.get("href"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// One decoded Redfish resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    path: String,
    kind: ResourceKind,
    body: Value,
}

impl ResourceDocument {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        let path = path.into();
        let kind = body
            .get("@odata.type")
            .and_then(Value::as_str)
            .map(ResourceKind::from_odata_type)
            .filter(|kind| *kind != ResourceKind::Other)
            .unwrap_or_else(|| ResourceKind::from_path(&path));

        Self { path, kind, body }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        field_at(&self.body, path)
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    /// The resource `Id`, falling back to the last path segment.
    pub fn id(&self) -> &str {
        self.text("Id")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.path.rsplit('/').next().unwrap_or_default())
    }

    /// Path segment following `collection`, e.g. the chassis id of
    /// `/redfish/v1/Chassis/1/Thermal` for `"Chassis"`.
    pub fn parent_id(&self, collection: &str) -> Option<&str> {
        let mut segments = self.path.split('/');
        segments.find(|segment| *segment == collection)?;
        segments.next().filter(|segment| !segment.is_empty())
    }

    /// Normalized link targets found under `name`, whether a single link
    /// object or an array of them.
    pub fn links(&self, name: &str) -> Vec<String> {
        match self.body.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(link_target)
                .filter_map(normalize_path)
                .collect(),
            Some(value) => link_target(value)
                .and_then(normalize_path)
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Members of an embedded array such as `Temperatures`.
    pub fn array(&self, name: &str) -> &[Value] {
        self.field(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_from_odata_type() {
        assert_eq!(
            ResourceKind::from_odata_type("#Thermal.v1_7_0.Thermal"),
            ResourceKind::Thermal
        );
        assert_eq!(
            ResourceKind::from_odata_type("#ChassisCollection.ChassisCollection"),
            ResourceKind::Collection
        );
        assert_eq!(
            ResourceKind::from_odata_type("#Oem.Vendor.Thing"),
            ResourceKind::Other
        );
    }

    #[test]
    fn kind_from_path() {
        assert_eq!(
            ResourceKind::from_path("/redfish/v1"),
            ResourceKind::ServiceRoot
        );
        assert_eq!(
            ResourceKind::from_path("/redfish/v1/Systems"),
            ResourceKind::Collection
        );
        assert_eq!(
            ResourceKind::from_path("/redfish/v1/Systems/1"),
            ResourceKind::ComputerSystem
        );
        assert_eq!(
            ResourceKind::from_path("/redfish/v1/Systems/1/Memory"),
            ResourceKind::Collection
        );
        assert_eq!(
            ResourceKind::from_path("/redfish/v1/Systems/1/Memory/DIMM0"),
            ResourceKind::Memory
        );
        assert_eq!(
            ResourceKind::from_path("/redfish/v1/Chassis/Self/Thermal"),
            ResourceKind::Thermal
        );
    }

    #[test]
    fn normalize_strips_host_fragment_and_slash() {
        assert_eq!(
            normalize_path("https://10.0.0.1/redfish/v1/Chassis/1/").as_deref(),
            Some("/redfish/v1/Chassis/1")
        );
        assert_eq!(
            normalize_path("/redfish/v1/Chassis/1/Thermal#/Temperatures/0").as_deref(),
            Some("/redfish/v1/Chassis/1/Thermal")
        );
        assert_eq!(normalize_path("/redfish/v1/").as_deref(), Some("/redfish/v1"));
        assert_eq!(normalize_path("/some/other/api"), None);
    }

    #[test]
    fn field_lookup_treats_null_as_absent() {
        let body = json!({"Status": {"Health": null, "State": "Enabled"}});
        assert!(field_at(&body, "Status.Health").is_none());
        assert_eq!(
            field_at(&body, "Status.State").and_then(Value::as_str),
            Some("Enabled")
        );
        assert!(field_at(&body, "Status.State.Nested").is_none());
    }

    #[test]
    fn links_single_and_array() {
        let doc = ResourceDocument::new(
            "/redfish/v1/Systems/1/Storage/RAID",
            json!({
                "Drives": [
                    {"@odata.id": "/redfish/v1/Systems/1/Storage/RAID/Drives/0"},
                    {"href": "/redfish/v1/Systems/1/Storage/RAID/Drives/1/"},
                    {"@odata.id": ""}
                ],
                "Volumes": {"@odata.id": "/redfish/v1/Systems/1/Storage/RAID/Volumes"}
            }),
        );
        assert_eq!(
            doc.links("Drives"),
            vec![
                "/redfish/v1/Systems/1/Storage/RAID/Drives/0".to_string(),
                "/redfish/v1/Systems/1/Storage/RAID/Drives/1".to_string(),
            ]
        );
        assert_eq!(doc.links("Volumes").len(), 1);
        assert!(doc.links("Missing").is_empty());
        assert_eq!(doc.kind(), ResourceKind::Storage);
    }

    #[test]
    fn id_and_parent_from_path() {
        let doc = ResourceDocument::new("/redfish/v1/Chassis/Self/Sensors/Pwr_Node_Total", json!({}));
        assert_eq!(doc.id(), "Pwr_Node_Total");
        assert_eq!(doc.parent_id("Chassis"), Some("Self"));
        assert_eq!(doc.parent_id("Systems"), None);
    }
}
