// Alert engine - dispatches incoming messages to the first matching alert
// and owns alert management (add, set, bulk toggles, import/export, load/save).
//
// The engine is driven by the client's single-threaded callback dispatcher.
// Emitting a re-rendered line delivers it straight back into `handle`, so an
// in-flight flag suppresses nested processing. The flag is held by a guard
// and cleared on every exit path.

use std::cell::{Cell, Ref, RefCell};
use std::path::PathBuf;

use crate::core::config::Settings;
use crate::core::host::{Context, EventKind, Host, HostError, MessageEvent};
use crate::core::sound::{SoundPlayer, SoundResolver};
use crate::core::store::PreferenceStore;

use super::error::{EngineError, ImportError, RegistryError};
use super::model::{Alert, CopyTarget, Focus};
use super::record::{self, AlertRecord, ImportFailure, ImportReport};
use super::registry::{AlertId, AlertRegistry};
use super::settings::{self, Setting};

/// What the engine did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No alert fired; the client should display the event as usual.
    PassThrough,
    /// An alert fired and re-emitted the event; the original should be
    /// suppressed.
    Handled { alert: String },
}

/// Which alerts a bulk command applies to.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    All,
    Names(&'a [&'a str]),
}

impl<'a> Selection<'a> {
    /// `ALL` anywhere in the list selects every alert.
    pub fn parse(names: &'a [&'a str]) -> Self {
        if names.iter().any(|name| name.eq_ignore_ascii_case("all")) {
            Self::All
        } else {
            Self::Names(names)
        }
    }
}

/// Result of a command over several named alerts. Names that match no
/// alert are skipped and listed in `not_found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub value: T,
    pub not_found: Vec<String>,
}

/// Everything needed to carry out an alert's side effects, captured so the
/// registry is not borrowed while the host runs.
#[derive(Debug)]
struct Dispatch {
    alert: String,
    nick: String,
    text: String,
    sound: Option<PathBuf>,
    copy_to: Option<String>,
    focus: Focus,
    notify: bool,
    flash: bool,
}

struct InFlight<'a>(&'a Cell<bool>);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct AlertEngine {
    registry: RefCell<AlertRegistry>,
    in_flight: Cell<bool>,
    sounds: SoundResolver,
    player: Box<dyn SoundPlayer>,
    copy_window: String,
    filter_cache_capacity: usize,
    store_key: String,
}

impl AlertEngine {
    pub fn new(settings: &Settings, player: Box<dyn SoundPlayer>) -> Self {
        Self {
            registry: RefCell::new(AlertRegistry::new()),
            in_flight: Cell::new(false),
            sounds: settings.sound_resolver(),
            player,
            copy_window: settings.copy_window.clone(),
            filter_cache_capacity: settings.filter_cache_capacity,
            store_key: settings.store_key.clone(),
        }
    }

    /// Read-only view of the alerts, in evaluation order.
    pub fn registry(&self) -> Ref<'_, AlertRegistry> {
        self.registry.borrow()
    }

    pub fn sounds(&self) -> &SoundResolver {
        &self.sounds
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.registry
            .borrow()
            .iter()
            .map(|(_, alert)| alert.name().to_string())
            .collect()
    }

    /// Evaluate alerts in registry order and dispatch the first that matches
    /// and admits the sender.
    pub fn handle(&self, host: &dyn Host, event: &MessageEvent) -> Result<Outcome, HostError> {
        let Some(_guard) = InFlight::enter(&self.in_flight) else {
            return Ok(Outcome::PassThrough);
        };

        let dispatch = {
            let Ok(mut registry) = self.registry.try_borrow_mut() else {
                log::warn!("Alert registry busy; passing '{}' through", event.kind);
                return Ok(Outcome::PassThrough);
            };
            self.find_match(&mut registry, event)
        };

        match dispatch {
            Some(dispatch) => {
                log::debug!("Alert '{}' fired for {}", dispatch.alert, event.nick);
                self.dispatch(host, event, &dispatch)?;
                Ok(Outcome::Handled {
                    alert: dispatch.alert,
                })
            }
            None => Ok(Outcome::PassThrough),
        }
    }

    fn find_match(&self, registry: &mut AlertRegistry, event: &MessageEvent) -> Option<Dispatch> {
        let mut cursor = registry.first();
        while let Some(id) = cursor {
            cursor = registry.next(id);
            let Some(alert) = registry.get_mut(id) else {
                continue;
            };
            if !alert.enabled() || !alert.is_match(&event.text, event.stripped()) {
                continue;
            }
            if !alert.admits(event.hostmask()) {
                log::debug!(
                    "Alert '{}' matched but {} is filtered out",
                    alert.name(),
                    event.hostmask()
                );
                continue;
            }
            return Some(Dispatch {
                alert: alert.name().to_string(),
                nick: alert.wrap_line(&event.nick),
                text: alert.render_text(&event.text),
                sound: alert
                    .sound()
                    .filter(|_| !alert.mute())
                    .and_then(|sound| sound.path.clone()),
                copy_to: alert.copy().map(|target| match target {
                    CopyTarget::Default => self.copy_window.clone(),
                    CopyTarget::Window(window) => window.clone(),
                }),
                focus: alert.focus(),
                notify: alert.notify(),
                flash: alert.flash(),
            });
        }
        None
    }

    fn dispatch(
        &self,
        host: &dyn Host,
        event: &MessageEvent,
        dispatch: &Dispatch,
    ) -> Result<(), HostError> {
        let current = host.current();

        let mut args = vec![dispatch.nick.as_str(), dispatch.text.as_str()];
        args.extend(event.extra.iter().map(String::as_str));
        host.emit_print(&current, event.kind, &args)?;

        if let Some(path) = &dispatch.sound {
            self.player.play(path);
        }

        if let Some(window) = &dispatch.copy_to {
            if let Err(e) = copy_line(host, &current, window, event, &dispatch.text) {
                log::warn!("Alert '{}': unable to copy to '{}': {}", dispatch.alert, window, e);
            }
        }

        let focused = host.focused();
        if !focused.is_same(&current) {
            let grab = match dispatch.focus {
                Focus::Off => false,
                Focus::On => focused.input_box.is_empty(),
                Focus::Force => true,
            };
            let result = if grab {
                host.focus(&current)
            } else if dispatch.notify {
                let line = notice(event, &current, &focused, &dispatch.text);
                host.print(&focused, &line)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                log::warn!("Alert '{}': {}", dispatch.alert, e);
            }
        }

        if dispatch.flash {
            if let Err(e) = host.flash() {
                log::warn!("Alert '{}': flash failed: {}", dispatch.alert, e);
            }
        }
        Ok(())
    }

    fn resolve(&self, registry: &AlertRegistry, name: &str) -> Result<AlertId, EngineError> {
        registry
            .find(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    /// Resolve a selection, returning the alerts found and the names that
    /// matched nothing.
    fn select(&self, registry: &AlertRegistry, selection: Selection<'_>) -> (Vec<AlertId>, Vec<String>) {
        match selection {
            Selection::All => (registry.ids(), Vec::new()),
            Selection::Names(names) => {
                let mut ids = Vec::with_capacity(names.len());
                let mut not_found: Vec<String> = Vec::new();
                for &name in names {
                    match registry.find(name) {
                        Some(id) if !ids.contains(&id) => ids.push(id),
                        Some(_) => {}
                        None if !not_found.iter().any(|n| n.eq_ignore_ascii_case(name)) => {
                            not_found.push(name.to_string());
                        }
                        None => {}
                    }
                }
                (ids, not_found)
            }
        }
    }

    /// Fail when a selection found nothing to work on.
    fn require_any(ids: &[AlertId], not_found: &[String]) -> Result<(), EngineError> {
        if !ids.is_empty() {
            return Ok(());
        }
        match not_found.first() {
            Some(name) => Err(EngineError::NotFound(name.clone())),
            None => Err(EngineError::NoAlerts),
        }
    }

    /// Run `f` against one alert by name.
    pub fn with_alert<R>(&self, name: &str, f: impl FnOnce(&Alert) -> R) -> Result<R, EngineError> {
        let registry = self.registry.borrow();
        let id = self.resolve(&registry, name)?;
        registry
            .get(id)
            .map(f)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    fn with_alert_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Alert) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut registry = self.registry.borrow_mut();
        let id = self.resolve(&registry, name)?;
        match registry.get_mut(id) {
            Some(alert) => f(alert),
            None => Err(EngineError::NotFound(name.to_string())),
        }
    }

    fn insert(&self, mut alert: Alert) -> Result<AlertId, RegistryError> {
        alert.set_filter_cache_capacity(self.filter_cache_capacity);
        self.registry.borrow_mut().append(alert)
    }

    /// Add an alert matching its own name.
    pub fn add(&self, name: &str) -> Result<AlertId, EngineError> {
        let id = self.insert(Alert::new(name)?)?;
        log::info!("Added alert '{}'", name);
        Ok(id)
    }

    /// Delete the selected alerts, returning how many were removed.
    pub fn delete(&self, selection: Selection<'_>) -> Result<Batch<usize>, EngineError> {
        let mut registry = self.registry.borrow_mut();
        let (ids, not_found) = self.select(&registry, selection);
        for &id in &ids {
            let alert = registry.remove(id)?;
            log::info!("Deleted alert '{}'", alert.name());
        }
        Ok(Batch {
            value: ids.len(),
            not_found,
        })
    }

    pub fn rename(&self, name: &str, new_name: &str) -> Result<(), EngineError> {
        let mut registry = self.registry.borrow_mut();
        let id = self.resolve(&registry, name)?;
        registry.rename(id, new_name)?;
        Ok(())
    }

    /// Copy every setting of `name` into a new alert `new_name`, appended.
    pub fn duplicate(&self, name: &str, new_name: &str) -> Result<AlertId, EngineError> {
        let copy = self.with_alert(name, |alert| alert.duplicate(new_name))??;
        Ok(self.insert(copy)?)
    }

    /// Move `name` before `anchor`, or to the end.
    pub fn move_before(&self, name: &str, anchor: Option<&str>) -> Result<(), EngineError> {
        let mut registry = self.registry.borrow_mut();
        let id = self.resolve(&registry, name)?;
        let anchor = anchor.map(|a| self.resolve(&registry, a)).transpose()?;
        registry.move_before(id, anchor)?;
        Ok(())
    }

    /// Move `name` after `anchor`, or to the start.
    pub fn move_after(&self, name: &str, anchor: Option<&str>) -> Result<(), EngineError> {
        let mut registry = self.registry.borrow_mut();
        let id = self.resolve(&registry, name)?;
        let anchor = anchor.map(|a| self.resolve(&registry, a)).transpose()?;
        registry.move_after(id, anchor)?;
        Ok(())
    }

    pub fn set(&self, name: &str, setting: Setting, value: &str) -> Result<String, EngineError> {
        self.with_alert_mut(name, |alert| {
            Ok(settings::set(alert, setting, value, &self.sounds)?)
        })
    }

    pub fn clear(&self, name: &str, setting: Setting) -> Result<String, EngineError> {
        self.with_alert_mut(name, |alert| Ok(settings::clear(alert, setting)?))
    }

    /// Describe the given settings, or all of them when `which` is empty.
    pub fn show(&self, name: &str, which: &[Setting]) -> Result<Vec<String>, EngineError> {
        let which = if which.is_empty() { Setting::all() } else { which };
        self.with_alert(name, |alert| {
            which.iter().map(|&setting| settings::show(alert, setting)).collect()
        })
    }

    fn toggle(
        &self,
        selection: Selection<'_>,
        get: fn(&Alert) -> bool,
        set: fn(&mut Alert, bool),
        value: bool,
    ) -> Batch<usize> {
        let mut registry = self.registry.borrow_mut();
        let (ids, not_found) = self.select(&registry, selection);
        let mut changed = 0;
        for id in ids {
            if let Some(alert) = registry.get_mut(id) {
                if get(alert) != value {
                    set(alert, value);
                    changed += 1;
                }
            }
        }
        Batch {
            value: changed,
            not_found,
        }
    }

    /// Counts how many alerts actually changed state.
    pub fn set_enabled(&self, selection: Selection<'_>, enabled: bool) -> Batch<usize> {
        self.toggle(selection, Alert::enabled, Alert::set_enabled, enabled)
    }

    pub fn set_muted(&self, selection: Selection<'_>, muted: bool) -> Batch<usize> {
        self.toggle(selection, Alert::mute, Alert::set_mute, muted)
    }

    /// Sample of an alert's formatting. Plays its sound when `with_sound`.
    pub fn preview(&self, name: &str, with_sound: bool) -> Result<String, EngineError> {
        let (line, sound) = self.with_alert(name, |alert| {
            let sound = alert.sound().and_then(|sound| sound.path.clone());
            (alert.preview(), sound)
        })?;
        if let Some(path) = sound.filter(|_| with_sound) {
            self.player.play(&path);
        }
        Ok(line)
    }

    /// Commands that recreate the selected alerts.
    pub fn dump(&self, selection: Selection<'_>) -> Result<Batch<Vec<String>>, EngineError> {
        let registry = self.registry.borrow();
        let (ids, not_found) = self.select(&registry, selection);
        Self::require_any(&ids, &not_found)?;
        let value = ids
            .into_iter()
            .filter_map(|id| registry.get(id))
            .flat_map(settings::dump)
            .collect();
        Ok(Batch { value, not_found })
    }

    /// Compact JSON for the selected alerts: a bare record for one alert.
    pub fn export(&self, selection: Selection<'_>) -> Result<Batch<String>, EngineError> {
        let registry = self.registry.borrow();
        let (ids, not_found) = self.select(&registry, selection);
        Self::require_any(&ids, &not_found)?;
        let records: Vec<AlertRecord> = ids
            .into_iter()
            .filter_map(|id| registry.get(id))
            .map(AlertRecord::from_alert)
            .collect();
        Ok(Batch {
            value: record::export(&records)?,
            not_found,
        })
    }

    /// Post each named alert to the current channel as an import command,
    /// one message per alert. Every name must exist.
    pub fn share(&self, host: &dyn Host, names: &[&str]) -> Result<usize, EngineError> {
        if names.is_empty() {
            return Err(EngineError::MissingArgument);
        }
        if matches!(Selection::parse(names), Selection::All) {
            return Err(EngineError::ShareAll);
        }
        let messages = {
            let registry = self.registry.borrow();
            let mut messages = Vec::with_capacity(names.len());
            for name in names {
                let id = self.resolve(&registry, name)?;
                if let Some(alert) = registry.get(id) {
                    let json = serde_json::to_string(&AlertRecord::from_alert(alert))?;
                    messages.push(format!(
                        "[irc-alerts]: Add alert '{}' with /alerts import {}",
                        alert.name(),
                        json
                    ));
                }
            }
            messages
        };
        let current = host.current();
        for message in &messages {
            host.say(&current, message)?;
        }
        Ok(messages.len())
    }

    /// Append every valid record. Bad records, and records whose name is
    /// taken, are skipped and reported.
    pub fn import(&self, json: &str) -> Result<ImportReport, ImportError> {
        let values = record::read_collection(json)?;
        let mut report = ImportReport::default();
        for (index, value) in values.into_iter().enumerate() {
            let name = value.get("n").and_then(|n| n.as_str()).map(str::to_string);
            let result = AlertRecord::from_value(value)
                .and_then(|record| record.into_alert(&self.sounds))
                .and_then(|alert| self.insert(alert).map_err(ImportError::from));
            match result {
                Ok(_) => report.imported.push(name.unwrap_or_default()),
                Err(error) => {
                    log::warn!("Failed to import entry {}: {}", index, error);
                    report.failures.push(ImportFailure { index, name, error });
                }
            }
        }
        Ok(report)
    }

    /// Replace the alerts with those saved in `store`.
    pub fn load(&self, store: &dyn PreferenceStore) -> Result<ImportReport, EngineError> {
        let saved = store.get(&self.store_key)?;
        self.registry.borrow_mut().clear();
        let report = match saved {
            Some(json) => self.import(&json)?,
            None => ImportReport::default(),
        };
        log::info!(
            "{} alert(s) loaded, {} skipped",
            report.imported_count(),
            report.failed_count()
        );
        Ok(report)
    }

    /// Write every alert, in order, as a JSON array.
    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<usize, EngineError> {
        let records: Vec<AlertRecord> = self
            .registry
            .borrow()
            .iter()
            .map(|(_, alert)| AlertRecord::from_alert(alert))
            .collect();
        store.set(&self.store_key, &serde_json::to_string(&records)?)?;
        log::info!("{} alert(s) saved", records.len());
        Ok(records.len())
    }
}

fn copy_line(
    host: &dyn Host,
    current: &Context,
    window: &str,
    event: &MessageEvent,
    text: &str,
) -> Result<(), HostError> {
    let target = match host.find_context(&current.network, window) {
        Some(context) => context,
        None => {
            host.open_query(&current.network, window)?;
            host.find_context(&current.network, window)
                .ok_or_else(|| HostError::NoSuchContext(window.to_string()))?
        }
    };
    let sender = if event.kind.is_channel() {
        format!("{}:{}", event.nick, current.channel)
    } else {
        format!("{}:(PM)", event.nick)
    };
    host.emit_print(&target, EventKind::ChannelMessage, &[sender.as_str(), text])
}

/// Line printed in the focused window when an alert fires elsewhere.
fn notice(event: &MessageEvent, current: &Context, focused: &Context, text: &str) -> String {
    let network = if current.network == focused.network {
        String::new()
    } else {
        format!("/{}", current.network)
    };
    if event.kind.is_channel() {
        format!("[{} on {}{}]: {}", event.nick, current.channel, network, text)
    } else {
        format!("[PM from {}{}]: {}", event.nick, network, text)
    }
}
