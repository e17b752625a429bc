//! Resource service behind the `compute` commands.
//!
//! The trait is the seam between handlers and whatever answers list/get
//! requests. [`FixtureService`] serves an in-memory inventory (built-in or
//! loaded from JSON) and can be told to fail a collection with a given
//! status, which is how remote errors are exercised.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

pub const API_ROOT: &str = "https://compute.example.com/v1";

pub const ZONES: &str = "zones";
pub const INSTANCES: &str = "instances";

/// Self link of a zonal resource, or of the zone itself when `collection`
/// is [`ZONES`].
pub fn self_link(project: &str, zone: &str, collection: &str, name: &str) -> String {
    if collection == ZONES {
        format!("{API_ROOT}/projects/{project}/zones/{name}")
    } else {
        format!("{API_ROOT}/projects/{project}/zones/{zone}/{collection}/{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub region: String,
    #[serde(default = "default_zone_status")]
    pub status: String,
}

fn default_zone_status() -> String {
    "UP".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    pub zone: String,
    #[serde(default = "default_machine_type")]
    pub machine_type: String,
    #[serde(default = "default_instance_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_size_gb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

fn default_machine_type() -> String {
    "n1-standard-1".to_string()
}

fn default_instance_status() -> String {
    "RUNNING".to_string()
}

impl Instance {
    pub fn new(name: &str, zone: &str) -> Self {
        Self {
            name: name.to_string(),
            zone: zone.to_string(),
            machine_type: default_machine_type(),
            status: default_instance_status(),
            labels: BTreeMap::new(),
            boot_disk_size_gb: None,
            scheduling: None,
            max_run_duration_secs: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub project: String,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Collection name to the error every request against it returns.
    #[serde(default)]
    pub failures: BTreeMap<String, Failure>,
}

pub trait ResourceService {
    fn default_project(&self) -> String;

    fn list_zones(&self, project: &str) -> Result<Vec<Zone>, RuntimeError>;

    /// Instances in `zone`, or in every zone when `None`.
    fn list_instances(&self, project: &str, zone: Option<&str>)
    -> Result<Vec<Instance>, RuntimeError>;

    fn get_instance(&self, project: &str, zone: &str, name: &str)
    -> Result<Instance, RuntimeError>;

    fn insert_instance(&self, project: &str, instance: Instance)
    -> Result<Instance, RuntimeError>;

    fn delete_instance(&self, project: &str, zone: &str, name: &str) -> Result<(), RuntimeError>;
}

#[derive(Debug)]
pub struct FixtureService {
    inventory: RefCell<Inventory>,
}

impl FixtureService {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory: RefCell::new(inventory),
        }
    }

    /// Built-in inventory: three zones, `instance-1` present in two of
    /// them.
    pub fn sample() -> Self {
        let zone = |name: &str, region: &str| Zone {
            name: name.to_string(),
            region: region.to_string(),
            status: default_zone_status(),
        };
        let mut stopped = Instance::new("instance-3", "zone-3");
        stopped.status = "TERMINATED".to_string();
        Self::new(Inventory {
            project: "my-project".to_string(),
            zones: vec![
                zone("zone-1", "region-1"),
                zone("zone-2", "region-1"),
                zone("zone-3", "region-2"),
            ],
            instances: vec![
                Instance::new("instance-1", "zone-1"),
                Instance::new("instance-2", "zone-1"),
                Instance::new("instance-1", "zone-2"),
                stopped,
            ],
            failures: BTreeMap::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Makes every request against `collection` fail with `status`.
    pub fn fail(&self, collection: &str, status: u16, message: &str) {
        self.inventory.borrow_mut().failures.insert(
            collection.to_string(),
            Failure {
                status,
                message: message.to_string(),
            },
        );
    }

    fn check(&self, project: &str, collection: &str) -> Result<(), RuntimeError> {
        let inventory = self.inventory.borrow();
        if let Some(failure) = inventory.failures.get(collection) {
            return Err(RuntimeError::Remote {
                status: failure.status,
                message: failure.message.clone(),
            });
        }
        if inventory.project != project {
            return Err(RuntimeError::Remote {
                status: 404,
                message: format!("The resource 'projects/{project}' was not found"),
            });
        }
        Ok(())
    }

    fn not_found(project: &str, zone: &str, name: &str) -> RuntimeError {
        RuntimeError::Remote {
            status: 404,
            message: format!(
                "The resource 'projects/{project}/zones/{zone}/instances/{name}' was not found"
            ),
        }
    }
}

impl ResourceService for FixtureService {
    fn default_project(&self) -> String {
        self.inventory.borrow().project.clone()
    }

    fn list_zones(&self, project: &str) -> Result<Vec<Zone>, RuntimeError> {
        self.check(project, ZONES)?;
        Ok(self.inventory.borrow().zones.clone())
    }

    fn list_instances(
        &self,
        project: &str,
        zone: Option<&str>,
    ) -> Result<Vec<Instance>, RuntimeError> {
        self.check(project, INSTANCES)?;
        Ok(self
            .inventory
            .borrow()
            .instances
            .iter()
            .filter(|i| zone.is_none_or(|z| i.zone == z))
            .cloned()
            .collect())
    }

    fn get_instance(&self, project: &str, zone: &str, name: &str) -> Result<Instance, RuntimeError> {
        self.check(project, INSTANCES)?;
        self.inventory
            .borrow()
            .instances
            .iter()
            .find(|i| i.zone == zone && i.name == name)
            .cloned()
            .ok_or_else(|| Self::not_found(project, zone, name))
    }

    fn insert_instance(&self, project: &str, instance: Instance) -> Result<Instance, RuntimeError> {
        self.check(project, INSTANCES)?;
        let mut inventory = self.inventory.borrow_mut();
        if !inventory.zones.iter().any(|z| z.name == instance.zone) {
            return Err(RuntimeError::Remote {
                status: 400,
                message: format!("Invalid value for field 'zone': '{}'", instance.zone),
            });
        }
        if inventory
            .instances
            .iter()
            .any(|i| i.zone == instance.zone && i.name == instance.name)
        {
            return Err(RuntimeError::Remote {
                status: 409,
                message: format!(
                    "The resource 'projects/{project}/zones/{}/instances/{}' already exists",
                    instance.zone, instance.name
                ),
            });
        }
        inventory.instances.push(instance.clone());
        Ok(instance)
    }

    fn delete_instance(&self, project: &str, zone: &str, name: &str) -> Result<(), RuntimeError> {
        self.check(project, INSTANCES)?;
        let mut inventory = self.inventory.borrow_mut();
        let before = inventory.instances.len();
        inventory
            .instances
            .retain(|i| !(i.zone == zone && i.name == name));
        if inventory.instances.len() == before {
            return Err(Self::not_found(project, zone, name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_lists_by_zone() {
        let service = FixtureService::sample();
        let all = service.list_instances("my-project", None).unwrap();
        assert_eq!(all.len(), 4);
        let zone1 = service.list_instances("my-project", Some("zone-1")).unwrap();
        assert_eq!(zone1.len(), 2);
    }

    #[test]
    fn test_failures_and_unknown_projects_are_remote_errors() {
        let service = FixtureService::sample();
        assert!(matches!(
            service.list_zones("other"),
            Err(RuntimeError::Remote { status: 404, .. })
        ));
        service.fail(INSTANCES, 503, "backend unavailable");
        let err = service.list_instances("my-project", None).unwrap_err();
        assert_eq!(err.to_string(), "HTTPError 503: backend unavailable");
        assert!(service.list_zones("my-project").is_ok());
    }

    #[test]
    fn test_insert_and_delete() {
        let service = FixtureService::sample();
        service
            .insert_instance("my-project", Instance::new("vm", "zone-2"))
            .unwrap();
        assert!(matches!(
            service.insert_instance("my-project", Instance::new("vm", "zone-2")),
            Err(RuntimeError::Remote { status: 409, .. })
        ));
        service.delete_instance("my-project", "zone-2", "vm").unwrap();
        assert!(matches!(
            service.delete_instance("my-project", "zone-2", "vm"),
            Err(RuntimeError::Remote { status: 404, .. })
        ));
    }

    #[test]
    fn test_inventory_json() {
        let service = FixtureService::from_json(
            r#"{"project":"p","zones":[{"name":"z","region":"r"}],
                "instances":[{"name":"i","zone":"z","machineType":"m"}],
                "failures":{"zones":{"status":500,"message":"boom"}}}"#,
        )
        .unwrap();
        assert_eq!(service.default_project(), "p");
        let instances = service.list_instances("p", Some("z")).unwrap();
        assert_eq!(instances[0].machine_type, "m");
        assert_eq!(instances[0].status, "RUNNING");
        assert!(service.list_zones("p").is_err());
    }

    #[test]
    fn test_self_links() {
        assert_eq!(
            self_link("p", "z", INSTANCES, "i"),
            "https://compute.example.com/v1/projects/p/zones/z/instances/i"
        );
        assert_eq!(
            self_link("p", "", ZONES, "z"),
            "https://compute.example.com/v1/projects/p/zones/z"
        );
    }
}
