//! Shared fixtures: a world saveable, a runtime facet, a reference catalog
//! and a player, all observable from the test after being handed to the core.

#![allow(dead_code)]

use nightshade_core::{
    manager::PlayerState,
    registry::{RuntimeSaveableHandle, SaveableHandle},
    types::{Quat, Vec3},
    FacetSet, ObjectHandle, ReferenceCatalog, ReferenceDescriptor, RuntimeSaveable, SaveResult,
    Saveable, StorableCollection, StorableValue,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Route core log output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ── World saveable ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Lantern {
    pub fuel:      i64,
    pub lit:       bool,
    pub loads:     usize,
    pub skip_save: bool,
}

impl Saveable for Lantern {
    fn save(&self) -> Option<StorableCollection> {
        if self.skip_save {
            return None;
        }
        Some(StorableCollection::new().with("fuel", self.fuel).with("lit", self.lit))
    }

    fn load(&mut self, data: &StorableCollection) -> SaveResult<()> {
        self.fuel = data.get_i64("fuel")?;
        self.lit = data.get_bool("lit")?;
        self.loads += 1;
        Ok(())
    }
}

pub fn lantern(fuel: i64) -> (Arc<Mutex<Lantern>>, SaveableHandle) {
    let lantern = Arc::new(Mutex::new(Lantern { fuel, lit: true, ..Lantern::default() }));
    let handle: SaveableHandle = lantern.clone();
    (lantern, handle)
}

// ── Runtime facet ────────────────────────────────────────────

#[derive(Debug)]
pub struct Facet {
    pub type_name: String,
    pub unique_id: String,
    pub value:     i64,
    pub loads:     usize,
}

impl RuntimeSaveable for Facet {
    fn type_name(&self) -> &str { &self.type_name }

    fn unique_id(&self) -> &str { &self.unique_id }

    fn save(&self) -> Option<StorableCollection> {
        Some(StorableCollection::new().with("value", self.value))
    }

    fn load(&mut self, data: &StorableCollection) -> SaveResult<()> {
        self.value = data.get_i64("value")?;
        self.loads += 1;
        Ok(())
    }
}

// ── Reference catalog ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SpawnedObject {
    pub handle:   ObjectHandle,
    pub guid:     String,
    pub name:     String,
    pub position: Vec3,
    pub facets:   Vec<Arc<Mutex<Facet>>>,
}

pub type Spawned = Arc<Mutex<Vec<SpawnedObject>>>;

/// Catalog where each GUID maps to the (type name, unique id) of its facets.
pub struct TestCatalog {
    references: HashMap<String, Vec<(String, String)>>,
    spawned:    Spawned,
    next:       u64,
}

impl TestCatalog {
    pub fn new() -> (Self, Spawned) {
        let spawned: Spawned = Arc::new(Mutex::new(Vec::new()));
        let catalog = Self {
            references: HashMap::new(),
            spawned:    spawned.clone(),
            next:       1,
        };
        (catalog, spawned)
    }

    pub fn with_reference(mut self, guid: &str, facets: &[(&str, &str)]) -> Self {
        self.references.insert(
            guid.to_string(),
            facets.iter().map(|(t, u)| (t.to_string(), u.to_string())).collect(),
        );
        self
    }
}

impl ReferenceCatalog for TestCatalog {
    fn resolve_reference(&self, guid: &str) -> Option<ReferenceDescriptor> {
        self.references.get(guid).map(|_| ReferenceDescriptor {
            guid:         guid.to_string(),
            display_name: format!("{guid}-object"),
        })
    }

    fn instantiate(
        &mut self,
        reference: &ReferenceDescriptor,
        position: Vec3,
        _rotation: Quat,
        name: &str,
        facets: &mut FacetSet,
    ) -> ObjectHandle {
        let handle = ObjectHandle(self.next);
        self.next += 1;

        let mut built = Vec::new();
        for (type_name, unique_id) in &self.references[&reference.guid] {
            let facet = Arc::new(Mutex::new(Facet {
                type_name: type_name.clone(),
                unique_id: unique_id.clone(),
                value:     0,
                loads:     0,
            }));
            let dyn_facet: RuntimeSaveableHandle = facet.clone();
            facets.attach(dyn_facet);
            built.push(facet);
        }

        self.spawned.lock().unwrap().push(SpawnedObject {
            handle,
            guid: reference.guid.clone(),
            name: name.to_string(),
            position,
            facets: built,
        });
        handle
    }
}

// ── Player ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PlayerModel {
    pub position:  Vec3,
    pub rotation:  Quat,
    pub health:    i64,
    pub inventory: Vec<String>,
}

pub struct TestPlayer(pub Arc<Mutex<PlayerModel>>);

impl TestPlayer {
    pub fn new(model: PlayerModel) -> (Box<Self>, Arc<Mutex<PlayerModel>>) {
        let shared = Arc::new(Mutex::new(model));
        (Box::new(Self(shared.clone())), shared)
    }
}

impl PlayerState for TestPlayer {
    fn transform(&self) -> (Vec3, Quat) {
        let m = self.0.lock().unwrap();
        (m.position, m.rotation)
    }

    fn set_transform(&mut self, position: Vec3, rotation: Quat) {
        let mut m = self.0.lock().unwrap();
        m.position = position;
        m.rotation = rotation;
    }

    fn save_local(&self) -> StorableCollection {
        StorableCollection::new().with("health", self.0.lock().unwrap().health)
    }

    fn save_global(&self) -> StorableCollection {
        let items: Vec<StorableValue> = self
            .0
            .lock()
            .unwrap()
            .inventory
            .iter()
            .map(|s| StorableValue::from(s.as_str()))
            .collect();
        StorableCollection::new().with("inventory", items)
    }

    fn load_local(&mut self, data: &StorableCollection) -> SaveResult<()> {
        self.0.lock().unwrap().health = data.get_i64("health")?;
        Ok(())
    }

    fn load_global(&mut self, data: &StorableCollection) -> SaveResult<()> {
        let items = data
            .get_list("inventory")?
            .iter()
            .map(|v| v.as_str("inventory").map(str::to_string))
            .collect::<SaveResult<Vec<_>>>()?;
        self.0.lock().unwrap().inventory = items;
        Ok(())
    }
}
