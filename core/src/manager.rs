//! Save/load orchestrator.
//!
//! SAVE PROTOCOL (fixed order):
//!   1. Reject if a save is already running (idle → saving → idle).
//!   2. Pick the folder name from the configured naming policy.
//!   3. Build both documents in memory with the same fresh id.
//!   4. Write the thumbnail (optional), then the info document, then the data document.
//!
//! There is no transaction across step 4. A crash between the info and the
//! data write leaves an info document whose data file is missing or stale;
//! loading it fails with MissingDataFile or IntegrityMismatch.
//!
//! LOAD PROTOCOL: info → data file exists → data → ids equal → dispatch.
//! An integrity mismatch is returned to the caller. Every other load failure
//! during scene bootstrap falls back to a fresh start.

use crate::{
    codec::{PlayerData, SaveData, SaveInfo},
    config::SaveConfig,
    error::{SaveError, SaveResult},
    event::{EventListener, SaveEvent},
    reader::SaveDirectoryReader,
    registry::{lock, DispatchReport, ObjectHandle, ReferenceCatalog, SaveableHandle, SaveableRegistry},
    session::SessionContext,
    storable::StorableCollection,
    storage,
    types::{LoadType, Quat, SaveId, SaveType, Token, Vec3},
};
use chrono::Local;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// The player as seen by the persistence core.
pub trait PlayerState: Send {
    fn transform(&self) -> (Vec3, Quat);

    fn set_transform(&mut self, position: Vec3, rotation: Quat);

    /// State that belongs to the current scene.
    fn save_local(&self) -> StorableCollection;

    /// State that follows the player across scenes.
    fn save_global(&self) -> StorableCollection;

    fn load_local(&mut self, data: &StorableCollection) -> SaveResult<()>;

    fn load_global(&mut self, data: &StorableCollection) -> SaveResult<()>;
}

pub type ThumbnailSource = Box<dyn Fn() -> Option<RgbaImage> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub folder_name: String,
    pub id:          SaveId,
    pub info:        SaveInfo,
}

#[derive(Debug, Clone, Default)]
pub struct BootOutcome {
    pub load_type:       LoadType,
    /// Present when saved world state was dispatched.
    pub report:          Option<DispatchReport>,
    pub player_restored: bool,
    /// Why a requested load was abandoned for a fresh start.
    pub fell_back:       Option<String>,
}

/// Clears the saving flag when a save ends, however it ends.
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SaveGameManager {
    reader:           SaveDirectoryReader,
    scene:            RwLock<String>,
    registry:         Mutex<SaveableRegistry>,
    catalog:          Mutex<Box<dyn ReferenceCatalog + Send>>,
    player:           Mutex<Box<dyn PlayerState>>,
    thumbnail_source: Option<ThumbnailSource>,
    listeners:        Vec<EventListener>,
    saving:           AtomicBool,
    time_played:      Mutex<f64>,
    /// scene → newest save folder; None until first needed.
    scene_index:      RwLock<Option<HashMap<String, String>>>,
    /// scene → folder, for previous-scene persistency.
    session_folders:  Mutex<HashMap<String, String>>,
}

impl SaveGameManager {
    pub fn new(
        config: SaveConfig,
        player: Box<dyn PlayerState>,
        catalog: Box<dyn ReferenceCatalog + Send>,
    ) -> SaveResult<Self> {
        Ok(Self {
            reader:           SaveDirectoryReader::new(config)?,
            scene:            RwLock::new(String::new()),
            registry:         Mutex::new(SaveableRegistry::new()),
            catalog:          Mutex::new(catalog),
            player:           Mutex::new(player),
            thumbnail_source: None,
            listeners:        Vec::new(),
            saving:           AtomicBool::new(false),
            time_played:      Mutex::new(0.0),
            scene_index:      RwLock::new(None),
            session_folders:  Mutex::new(HashMap::new()),
        })
    }

    pub fn with_thumbnail_source(mut self, source: ThumbnailSource) -> Self {
        self.thumbnail_source = Some(source);
        self
    }

    pub fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    pub fn config(&self) -> &SaveConfig {
        self.reader.config()
    }

    pub fn reader(&self) -> &SaveDirectoryReader {
        &self.reader
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    fn emit(&self, event: SaveEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    // ── Scene & tracking ───────────────────────────────────

    /// Switch to a new scene. The previous scene's saveables are forgotten.
    pub fn enter_scene(&self, scene: &str) -> SaveResult<()> {
        *self.scene.write().map_err(|_| SaveError::LockPoisoned)? = scene.to_string();
        *lock(&self.registry)? = SaveableRegistry::new();
        log::info!("save: entered scene {scene}");
        Ok(())
    }

    pub fn scene(&self) -> SaveResult<String> {
        Ok(self.scene.read().map_err(|_| SaveError::LockPoisoned)?.clone())
    }

    pub fn register_world(&self, token: impl Into<Token>, saveable: &SaveableHandle) -> SaveResult<()> {
        lock(&self.registry)?.register_world(token, saveable);
        Ok(())
    }

    pub fn instantiate_tracked_object(
        &self,
        reference_guid: &str,
        position: Vec3,
        rotation: Quat,
        name: Option<&str>,
    ) -> SaveResult<ObjectHandle> {
        let mut catalog = lock(&self.catalog)?;
        lock(&self.registry)?.instantiate_tracked_object(
            &mut **catalog,
            reference_guid,
            position,
            rotation,
            name,
        )
    }

    pub fn untrack_object(&self, object: ObjectHandle) -> SaveResult<bool> {
        Ok(lock(&self.registry)?.untrack_object(object))
    }

    pub fn runtime_token_of(&self, object: ObjectHandle) -> SaveResult<Option<String>> {
        Ok(lock(&self.registry)?.token_of(object))
    }

    pub fn add_play_time(&self, seconds: f64) -> SaveResult<()> {
        *lock(&self.time_played)? += seconds;
        Ok(())
    }

    pub fn time_played(&self) -> SaveResult<f64> {
        Ok(*lock(&self.time_played)?)
    }

    // ── Save ───────────────────────────────────────────────

    /// Manual save or autosave from the player's current transform.
    pub fn save_game(&self, autosave: bool) -> SaveResult<SaveOutcome> {
        let save_type = if autosave { SaveType::Autosave } else { SaveType::Normal };
        self.save_inner(save_type, None)
    }

    /// Manual save with a completion callback.
    pub fn save_game_with(&self, on_saved: impl FnOnce(&SaveOutcome)) -> SaveResult<SaveOutcome> {
        let outcome = self.save_inner(SaveType::Normal, None)?;
        on_saved(&outcome);
        Ok(outcome)
    }

    /// Save before a scene transition, recording an explicit player transform.
    pub fn save_game_at(
        &self,
        position: Vec3,
        rotation: Quat,
        on_saved: impl FnOnce(&SaveOutcome),
    ) -> SaveResult<SaveOutcome> {
        let outcome = self.save_inner(SaveType::NextScene, Some((position, rotation)))?;
        on_saved(&outcome);
        Ok(outcome)
    }

    /// Snapshot the player into the session so the next scene can pick it up.
    pub fn save_player_only(&self, session: &mut SessionContext) -> SaveResult<()> {
        let player = self.capture_player(None)?;
        session.carry_player(player);
        log::debug!("save: player data carried into session");
        Ok(())
    }

    fn save_inner(
        &self,
        save_type: SaveType,
        transform: Option<(Vec3, Quat)>,
    ) -> SaveResult<SaveOutcome> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("save: rejected, a save is already in progress");
            return Err(SaveError::SaveInProgress);
        }
        let _guard = SavingGuard(&self.saving);

        let scene = self.scene()?;
        let folder_name = self.next_folder_name(&scene)?;
        self.emit(SaveEvent::SaveStarted {
            folder: folder_name.clone(),
            save_type,
        });

        match self.write_save(&scene, &folder_name, save_type, transform) {
            Ok(outcome) => {
                self.emit(SaveEvent::SaveCompleted {
                    folder: folder_name,
                    id:     outcome.id.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                log::error!("save: writing {folder_name} failed: {e}");
                self.emit(SaveEvent::SaveFailed {
                    folder: folder_name,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn write_save(
        &self,
        scene: &str,
        folder_name: &str,
        save_type: SaveType,
        transform: Option<(Vec3, Quat)>,
    ) -> SaveResult<SaveOutcome> {
        let config = self.reader.config();
        let encryptor = self.reader.encryptor();
        let folder = config.save_folder(folder_name);

        let player_data = self.capture_player(transform)?;
        let (world_saveables, runtime_saveables) = {
            let registry = lock(&self.registry)?;
            (registry.collect_world_state()?, registry.collect_runtime_state()?)
        };

        let id = uuid::Uuid::new_v4().to_string();
        let data = SaveData {
            id: id.clone(),
            player_data,
            world_saveables,
            runtime_saveables,
        };

        std::fs::create_dir_all(&folder)?;

        let mut thumbnail = String::new();
        if config.create_thumbnails {
            if let Some(image) = self.thumbnail_source.as_ref().and_then(|capture| capture()) {
                let name = config.thumbnail_file_name();
                storage::write_thumbnail(&folder.join(&name), &image)?;
                thumbnail = name;
            }
        }

        let info = SaveInfo {
            id: id.clone(),
            scene: scene.to_string(),
            date_time: Local::now(),
            time_played: self.time_played()?,
            save_type,
            data: config.data_file_name(),
            thumbnail,
        };

        storage::write_document(&folder.join(config.info_file_name()), &info.to_storable(), encryptor)?;
        storage::write_document(&folder.join(config.data_file_name()), &data.to_storable(), encryptor)?;

        if let Some(index) = self
            .scene_index
            .write()
            .map_err(|_| SaveError::LockPoisoned)?
            .as_mut()
        {
            index.insert(scene.to_string(), folder_name.to_string());
        }

        log::info!("save: {save_type:?} save of {scene} written to {folder_name} (id {id})");
        Ok(SaveOutcome {
            folder_name: folder_name.to_string(),
            id,
            info,
        })
    }

    fn capture_player(&self, transform: Option<(Vec3, Quat)>) -> SaveResult<PlayerData> {
        let player = lock(&self.player)?;
        let (position, rotation) = transform.unwrap_or_else(|| player.transform());
        Ok(PlayerData {
            position,
            rotation,
            local_data: player.save_local(),
            global_data: player.save_global(),
        })
    }

    /// Folder the next save of `scene` will be written to.
    ///
    ///   multi-save:                   prefix + 3-digit count of existing folders
    ///   single-save + scene names:    prefix + scene name without spaces
    ///   single-save + persistency:    the folder already used for this scene,
    ///                                 else prefix + 3-digit count
    ///   single-save otherwise:        prefix + "000"
    pub fn next_folder_name(&self, scene: &str) -> SaveResult<String> {
        let config = self.reader.config();
        let prefix = &config.save_folder_prefix;

        if !config.single_save {
            let count = self.reader.count_save_folders()?;
            return Ok(format!("{prefix}{count:03}"));
        }

        if config.use_scene_names {
            let name: String = scene.chars().filter(|c| *c != ' ').collect();
            return Ok(format!("{prefix}{name}"));
        }

        if config.previous_scene_persistency {
            let mut folders = lock(&self.session_folders)?;
            if let Some(folder) = folders.get(scene) {
                return Ok(folder.clone());
            }
            let count = self.reader.count_save_folders()?;
            let folder = format!("{prefix}{count:03}");
            folders.insert(scene.to_string(), folder.clone());
            return Ok(folder);
        }

        Ok(format!("{prefix}000"))
    }

    // ── Scene index ────────────────────────────────────────

    /// Folder of the newest save made in `scene`, if any.
    pub fn last_save_for_scene(&self, scene: &str) -> SaveResult<Option<String>> {
        {
            let index = self.scene_index.read().map_err(|_| SaveError::LockPoisoned)?;
            if let Some(index) = index.as_ref() {
                return Ok(index.get(scene).cloned());
            }
        }

        let mut index = self.scene_index.write().map_err(|_| SaveError::LockPoisoned)?;
        // Another thread may have built it between the two locks.
        if index.is_none() {
            let mut built = HashMap::new();
            for summary in self.reader.read_saves_meta()? {
                built.entry(summary.scene).or_insert(summary.folder_name);
            }
            log::debug!("save: scene index built with {} scenes", built.len());
            *index = Some(built);
        }
        Ok(index.as_ref().and_then(|i| i.get(scene).cloned()))
    }

    /// Delete every save folder and forget the scene index.
    pub fn remove_all_saves(&self) -> SaveResult<()> {
        *self.scene_index.write().map_err(|_| SaveError::LockPoisoned)? = None;
        lock(&self.session_folders)?.clear();
        self.reader.remove_all_saves()
    }

    // ── Load ───────────────────────────────────────────────

    /// Load world and player state from a save folder.
    pub fn load_game_state(&self, folder_name: &str) -> SaveResult<DispatchReport> {
        let (info, data) = self.reader.read_save_pair(folder_name)?;
        let report = self.dispatch(&data)?;

        let mut player = lock(&self.player)?;
        player.set_transform(data.player_data.position, data.player_data.rotation);
        player.load_local(&data.player_data.local_data)?;
        player.load_global(&data.player_data.global_data)?;
        *lock(&self.time_played)? = info.time_played;

        log::info!("save: loaded {folder_name} ({})", info.scene);
        Ok(report)
    }

    /// Load only the world state of a save folder.
    pub fn load_world_state(&self, folder_name: &str) -> SaveResult<DispatchReport> {
        let (_, data) = self.reader.read_save_pair(folder_name)?;
        self.dispatch(&data)
    }

    fn dispatch(&self, data: &SaveData) -> SaveResult<DispatchReport> {
        let mut catalog = lock(&self.catalog)?;
        lock(&self.registry)?.dispatch(
            &data.world_saveables,
            &data.runtime_saveables,
            &mut **catalog,
        )
    }

    /// Drop a pending load intent once its scene has run for the configured TTL.
    /// The clock starts at `SessionContext::mark_scene_started`; hosts call this
    /// periodically so an unconsumed intent cannot leak into a later save or load.
    pub fn expire_load_intent(&self, session: &mut SessionContext) -> bool {
        let ttl = Duration::from_secs(self.reader.config().load_intent_ttl_secs);
        session.expire_stale(Instant::now(), ttl)
    }

    fn apply_carried_player(&self, player_data: &PlayerData) -> SaveResult<()> {
        let mut player = lock(&self.player)?;
        player.load_local(&player_data.local_data)?;
        player.load_global(&player_data.global_data)
    }

    /// Scene bootstrap entry point: consume the session's pending load intent.
    ///
    /// Called once per scene after the scene's world saveables have registered.
    /// Only an IntegrityMismatch is returned as an error; any other failure of
    /// a requested load is logged and the scene starts fresh.
    pub fn begin_scene(&self, session: &mut SessionContext) -> SaveResult<BootOutcome> {
        let scene = self.scene()?;
        let request = session.take_request();
        let mut outcome = BootOutcome {
            load_type: request.load_type,
            ..BootOutcome::default()
        };

        if request.load_type != LoadType::Normal
            && request.scene.as_deref().is_some_and(|s| s != scene)
        {
            let reason = format!(
                "load intent targets scene {:?}, current scene is {scene}",
                request.scene
            );
            log::warn!("save: {reason}");
            outcome.fell_back = Some(reason);
            return Ok(outcome);
        }

        let loaded = match request.load_type {
            LoadType::Normal => Ok(()),
            LoadType::LoadGameState => match request.folder.as_deref() {
                Some(folder) => self.load_game_state(folder).map(|report| {
                    outcome.report = Some(report);
                    outcome.player_restored = true;
                }),
                None => Err(SaveError::FieldMissing { key: "folder".into() }),
            },
            LoadType::LoadWorldState => self.boot_world_state(&scene, session, &mut outcome),
            LoadType::LoadPlayer => match session.take_carried_player() {
                Some(player_data) => self.apply_carried_player(&player_data).map(|()| {
                    outcome.player_restored = true;
                }),
                None => Ok(()),
            },
        };

        match loaded {
            Ok(()) => {}
            Err(e @ SaveError::IntegrityMismatch { .. }) => return Err(e),
            Err(e) => {
                log::error!("save: {:?} failed, starting fresh: {e}", request.load_type);
                outcome.report = None;
                outcome.fell_back = Some(e.to_string());
            }
        }

        self.emit(SaveEvent::LoadCompleted {
            scene,
            load_type: request.load_type,
        });
        Ok(outcome)
    }

    fn boot_world_state(
        &self,
        scene: &str,
        session: &mut SessionContext,
        outcome: &mut BootOutcome,
    ) -> SaveResult<()> {
        if let Some(folder) = self.last_save_for_scene(scene)? {
            outcome.report = Some(self.load_world_state(&folder)?);
        } else {
            log::debug!("save: no previous save of {scene}, world starts fresh");
        }
        if let Some(player_data) = session.take_carried_player() {
            self.apply_carried_player(&player_data)?;
            outcome.player_restored = true;
        }
        Ok(())
    }
}
