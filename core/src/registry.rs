//! Token-addressed saveable registry: the reconciliation engine.
//!
//! Two live collections:
//!   - world saveables:   (world token, live saveable), registered once per scene
//!   - runtime saveables: (runtime token, object handle, [(sub-token, facet)]),
//!     registered whenever a tracked object is instantiated or re-instantiated
//!
//! RULES:
//!   - The registry holds weak references. A destroyed object is skipped on
//!     collect, never reported as an error.
//!   - Runtime ordinals come from a per-GUID counter that only grows. Removing
//!     an object never frees its ordinal.
//!   - Load policy is deliberately asymmetric:
//!       * a world token missing from the save aborts the whole dispatch before
//!         any load is applied (world and runtime)
//!       * a runtime facet whose unique id has no match is logged and skipped,
//!         the rest of that object and all other objects still load

use crate::{
    error::{SaveError, SaveResult},
    storable::{StorableCollection, StorableValue},
    token::{self, RuntimeToken, SubToken},
    types::{Quat, Token, Vec3},
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// A scene-resident component with persistent state.
pub trait Saveable: Send {
    /// `None` means nothing to persist this round.
    fn save(&self) -> Option<StorableCollection>;

    fn load(&mut self, data: &StorableCollection) -> SaveResult<()>;
}

/// One saveable facet of a dynamically instantiated object.
pub trait RuntimeSaveable: Send {
    /// Type part of the sub-token.
    fn type_name(&self) -> &str;

    /// Author-assigned id, unique within the owning object.
    fn unique_id(&self) -> &str;

    fn save(&self) -> Option<StorableCollection>;

    fn load(&mut self, data: &StorableCollection) -> SaveResult<()>;
}

pub type SaveableHandle = Arc<Mutex<dyn Saveable>>;
pub type RuntimeSaveableHandle = Arc<Mutex<dyn RuntimeSaveable>>;

/// Engine-side identity of an instantiated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// Facets attach themselves here while their owning object is being built.
#[derive(Default)]
pub struct FacetSet {
    facets: Vec<RuntimeSaveableHandle>,
}

impl FacetSet {
    pub fn attach(&mut self, facet: RuntimeSaveableHandle) {
        self.facets.push(facet);
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    pub guid:         String,
    pub display_name: String,
}

/// The engine's catalog of spawnable objects.
pub trait ReferenceCatalog {
    fn resolve_reference(&self, guid: &str) -> Option<ReferenceDescriptor>;

    /// Build a live object. Its saveable facets must attach themselves to `facets`.
    fn instantiate(
        &mut self,
        reference: &ReferenceDescriptor,
        position: Vec3,
        rotation: Quat,
        name: &str,
        facets: &mut FacetSet,
    ) -> ObjectHandle;
}

/// What a dispatch pass applied and what it tolerated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub world_loaded:       usize,
    pub runtime_restored:   usize,
    /// Runtime tokens whose reference GUID is not in the catalog.
    pub skipped_references: Vec<Token>,
    /// `<runtime token>/<sub-token>` entries with no facet of that unique id.
    pub unmatched_facets:   Vec<String>,
    /// Runtime tokens whose re-instantiated object has colliding unique ids.
    pub duplicate_ids:      Vec<Token>,
    /// Keys that do not parse as runtime tokens or sub-tokens.
    pub invalid_tokens:     Vec<String>,
    /// `<runtime token>/<sub-token>` entries whose facet rejected its document.
    pub failed_facets:      Vec<String>,
}

struct WorldEntry {
    token:    Token,
    saveable: Weak<Mutex<dyn Saveable>>,
}

struct RuntimeFacet {
    sub_token: SubToken,
    facet:     Weak<Mutex<dyn RuntimeSaveable>>,
}

struct RuntimeEntry {
    token:  RuntimeToken,
    object: ObjectHandle,
    facets: Vec<RuntimeFacet>,
}

#[derive(Default)]
pub struct SaveableRegistry {
    world:    Vec<WorldEntry>,
    runtime:  Vec<RuntimeEntry>,
    ordinals: HashMap<String, u32>,
}

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> SaveResult<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| SaveError::LockPoisoned)
}

impl SaveableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ───────────────────────────────────────

    pub fn register_world(&mut self, token: impl Into<Token>, saveable: &SaveableHandle) {
        self.world.push(WorldEntry {
            token:    token.into(),
            saveable: Arc::downgrade(saveable),
        });
    }

    pub fn world_len(&self) -> usize {
        self.world.len()
    }

    pub fn runtime_tokens(&self) -> Vec<String> {
        self.runtime.iter().map(|e| e.token.to_string()).collect()
    }

    pub fn token_of(&self, object: ObjectHandle) -> Option<String> {
        self.runtime
            .iter()
            .find(|e| e.object == object)
            .map(|e| e.token.to_string())
    }

    /// Instantiate a tracked object and register it under a fresh runtime token.
    pub fn instantiate_tracked_object(
        &mut self,
        catalog: &mut dyn ReferenceCatalog,
        reference_guid: &str,
        position: Vec3,
        rotation: Quat,
        name: Option<&str>,
    ) -> SaveResult<ObjectHandle> {
        token::validate_part(reference_guid)?;
        let reference = catalog
            .resolve_reference(reference_guid)
            .ok_or_else(|| SaveError::UnknownReference { guid: reference_guid.to_string() })?;

        let counter = self.ordinals.entry(reference_guid.to_string()).or_insert(0);
        let ordinal = *counter;
        *counter = ordinal.checked_add(1).ok_or_else(|| SaveError::InvalidToken {
            token:  RuntimeToken::new(reference_guid, ordinal).to_string(),
            reason: "ordinal counter exhausted for this reference".into(),
        })?;

        let token = RuntimeToken::new(reference_guid, ordinal);
        let name = name.unwrap_or(&reference.display_name).to_string();
        let (object, _) = self.spawn(catalog, &reference, token, position, rotation, &name)?;
        Ok(object)
    }

    /// Stop tracking an object. Its ordinal is not reused.
    pub fn untrack_object(&mut self, object: ObjectHandle) -> bool {
        let before = self.runtime.len();
        self.runtime.retain(|e| e.object != object);
        before != self.runtime.len()
    }

    fn spawn(
        &mut self,
        catalog: &mut dyn ReferenceCatalog,
        reference: &ReferenceDescriptor,
        token: RuntimeToken,
        position: Vec3,
        rotation: Quat,
        name: &str,
    ) -> SaveResult<(ObjectHandle, Vec<RuntimeSaveableHandle>)> {
        let mut facet_set = FacetSet::default();
        let object = catalog.instantiate(reference, position, rotation, name, &mut facet_set);

        let mut facets = Vec::with_capacity(facet_set.len());
        for handle in &facet_set.facets {
            let facet = lock(handle)?;
            facets.push(RuntimeFacet {
                sub_token: SubToken::new(facet.type_name(), facet.unique_id()),
                facet:     Arc::downgrade(handle),
            });
        }

        log::debug!("registry: tracking {token} ({} facets) as {name}", facets.len());
        self.runtime.push(RuntimeEntry { token, object, facets });
        Ok((object, facet_set.facets))
    }

    // ── Collect ────────────────────────────────────────────

    pub fn collect_world_state(&self) -> SaveResult<StorableCollection> {
        let mut state = StorableCollection::new();
        for entry in &self.world {
            if entry.token.is_empty() {
                continue;
            }
            let Some(saveable) = entry.saveable.upgrade() else {
                continue;
            };
            let doc = lock(&saveable)?.save();
            if let Some(doc) = doc {
                state.insert(entry.token.clone(), doc);
            }
        }
        Ok(state)
    }

    pub fn collect_runtime_state(&self) -> SaveResult<StorableCollection> {
        let mut state = StorableCollection::new();
        for entry in &self.runtime {
            let mut object_doc = StorableCollection::new();
            for facet in &entry.facets {
                let Some(handle) = facet.facet.upgrade() else {
                    continue;
                };
                let doc = lock(&handle)?.save();
                if let Some(doc) = doc {
                    object_doc.insert(facet.sub_token.to_string(), doc);
                }
            }
            state.insert(entry.token.to_string(), object_doc);
        }
        Ok(state)
    }

    // ── Dispatch ───────────────────────────────────────────

    /// Apply loaded state to the live scene.
    ///
    /// Every live world token is checked before anything is loaded. If any is
    /// missing from `world_state`, nothing is applied and TokenMismatch is returned.
    pub fn dispatch(
        &mut self,
        world_state: &StorableCollection,
        runtime_state: &StorableCollection,
        catalog: &mut dyn ReferenceCatalog,
    ) -> SaveResult<DispatchReport> {
        let mut report = DispatchReport::default();

        let mut live = Vec::with_capacity(self.world.len());
        let mut missing = Vec::new();
        for entry in &self.world {
            if entry.token.is_empty() {
                continue;
            }
            let Some(saveable) = entry.saveable.upgrade() else {
                continue;
            };
            if world_state.contains_key(&entry.token) {
                live.push((entry.token.as_str(), saveable));
            } else {
                log::error!("registry: saveable token '{}' not found in save", entry.token);
                missing.push(entry.token.clone());
            }
        }

        if !missing.is_empty() {
            return Err(SaveError::TokenMismatch { missing });
        }

        for (token, saveable) in live {
            let doc = world_state.get_collection(token)?;
            lock(&saveable)?.load(doc)?;
            report.world_loaded += 1;
        }

        for (key, value) in runtime_state.iter() {
            self.restore_runtime_object(key, value, catalog, &mut report)?;
        }

        log::info!(
            "registry: loaded {} world saveables, restored {} runtime objects",
            report.world_loaded,
            report.runtime_restored
        );
        Ok(report)
    }

    fn restore_runtime_object(
        &mut self,
        key: &str,
        value: &StorableValue,
        catalog: &mut dyn ReferenceCatalog,
        report: &mut DispatchReport,
    ) -> SaveResult<()> {
        let token = match RuntimeToken::parse(key) {
            Ok(token) => token,
            Err(e) => {
                log::error!("registry: {e}");
                report.invalid_tokens.push(key.to_string());
                return Ok(());
            }
        };
        let object_doc = match value.as_collection(key) {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("registry: {e}");
                report.invalid_tokens.push(key.to_string());
                return Ok(());
            }
        };

        // The last ordinal is never handed out, so restoring it would leave no successor.
        let Some(next_ordinal) = token.ordinal.checked_add(1) else {
            log::error!("registry: ordinal of {key} leaves no room for new objects");
            report.invalid_tokens.push(key.to_string());
            return Ok(());
        };

        let Some(reference) = catalog.resolve_reference(&token.reference_guid) else {
            log::warn!("registry: reference '{}' not in catalog, skipping {key}", token.reference_guid);
            report.skipped_references.push(key.to_string());
            return Ok(());
        };

        // Keep the saved ordinal and move the counter past it.
        let counter = self.ordinals.entry(token.reference_guid.clone()).or_insert(0);
        *counter = (*counter).max(next_ordinal);

        let name = reference.display_name.clone();
        let (_, facets) = self.spawn(catalog, &reference, token, Vec3::ZERO, Quat::IDENTITY, &name)?;
        report.runtime_restored += 1;

        let mut by_id: HashMap<String, RuntimeSaveableHandle> = HashMap::new();
        let mut seen = HashSet::new();
        let mut duplicated = false;
        for facet in &facets {
            let unique_id = lock(facet)?.unique_id().to_string();
            if !seen.insert(unique_id.clone()) {
                log::error!("registry: duplicate unique id '{unique_id}' on {key}");
                duplicated = true;
            }
            by_id.insert(unique_id, Arc::clone(facet));
        }
        if duplicated {
            report.duplicate_ids.push(key.to_string());
            return Ok(());
        }

        for (sub_key, facet_value) in object_doc.iter() {
            let sub_token = match SubToken::parse(sub_key) {
                Ok(sub) => sub,
                Err(e) => {
                    log::error!("registry: {e}");
                    report.invalid_tokens.push(format!("{key}/{sub_key}"));
                    continue;
                }
            };
            let Some(facet) = by_id.get(&sub_token.unique_id) else {
                log::error!("registry: no facet with unique id '{}' on {key}", sub_token.unique_id);
                report.unmatched_facets.push(format!("{key}/{sub_key}"));
                continue;
            };
            let loaded = facet_value
                .as_collection(sub_key)
                .and_then(|doc| lock(facet)?.load(doc));
            if let Err(e) = loaded {
                log::error!("registry: facet {key}/{sub_key} failed to load: {e}");
                report.failed_facets.push(format!("{key}/{sub_key}"));
            }
        }
        Ok(())
    }
}
