// Terminal host: feeds chat lines from stdin through the alert engine and
// prints what the engine emits. Lines are either
//   nick!user@host #channel message text
//   nick!user@host yournick message text      (private message)
// or `/alerts <command> ...` to manage alerts.

use std::cell::{Cell, RefCell};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::core::{
    alerts::{error::EngineError, settings::Setting, AlertEngine, Outcome, Selection},
    config::ConfigManager,
    host::{Context, EventKind, Host, HostError, MessageEvent},
    irc::{self, StripMask},
    sound::SoundPlayer,
    store::FileStore,
};

const NETWORK: &str = "local";
const STATUS: &str = "(status)";
/// Channel mode symbols a nick may carry.
const MODE_PREFIXES: &str = "@+%~&";

/// Logs instead of decoding audio.
struct LogPlayer;

impl SoundPlayer for LogPlayer {
    fn play(&self, path: &Path) {
        log::info!("Playing {}", path.display());
    }
}

struct TerminalHost {
    contexts: RefCell<Vec<Context>>,
    current: Cell<u64>,
    focused: Cell<u64>,
}

impl TerminalHost {
    fn new() -> Self {
        Self {
            contexts: RefCell::new(vec![Context {
                id: 1,
                network: NETWORK.to_string(),
                channel: STATUS.to_string(),
                input_box: String::new(),
            }]),
            current: Cell::new(1),
            focused: Cell::new(1),
        }
    }

    fn context(&self, id: u64) -> Context {
        let contexts = self.contexts.borrow();
        contexts
            .iter()
            .find(|c| c.id == id)
            .or_else(|| contexts.first())
            .cloned()
            .unwrap_or_else(|| Context {
                id,
                network: NETWORK.to_string(),
                channel: STATUS.to_string(),
                input_box: String::new(),
            })
    }

    /// Find or create the context for `channel` and make it current.
    fn enter(&self, channel: &str) {
        let id = match self.find_context(NETWORK, channel) {
            Some(context) => context.id,
            None => self.create(channel),
        };
        self.current.set(id);
    }

    fn create(&self, channel: &str) -> u64 {
        let mut contexts = self.contexts.borrow_mut();
        let id = contexts.len() as u64 + 1;
        contexts.push(Context {
            id,
            network: NETWORK.to_string(),
            channel: channel.to_string(),
            input_box: String::new(),
        });
        id
    }

    fn show(&self, context: &Context, line: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        // Terminals cannot show IRC codes; drop them.
        println!(
            "[{}] {} {}",
            stamp,
            context.channel,
            irc::strip(line, StripMask::ALL)
        );
    }
}

impl Host for TerminalHost {
    fn current(&self) -> Context {
        self.context(self.current.get())
    }

    fn focused(&self) -> Context {
        self.context(self.focused.get())
    }

    fn find_context(&self, network: &str, channel: &str) -> Option<Context> {
        self.contexts
            .borrow()
            .iter()
            .find(|c| c.network == network && c.channel.eq_ignore_ascii_case(channel))
            .cloned()
    }

    fn open_query(&self, network: &str, name: &str) -> Result<(), HostError> {
        if network != NETWORK {
            return Err(HostError::NoSuchContext(network.to_string()));
        }
        self.create(name);
        Ok(())
    }

    fn emit_print(&self, context: &Context, event: EventKind, args: &[&str]) -> Result<(), HostError> {
        let nick = args.first().copied().unwrap_or_default();
        let text = args.get(1).copied().unwrap_or_default();
        let mode = args.get(2).copied().unwrap_or_default();
        let line = match event {
            EventKind::ChannelAction | EventKind::PrivateAction | EventKind::PrivateActionToDialog => {
                format!("* {mode}{nick} {text}")
            }
            _ => format!("<{mode}{nick}> {text}"),
        };
        self.show(context, &line);
        Ok(())
    }

    fn print(&self, context: &Context, text: &str) -> Result<(), HostError> {
        self.show(context, text);
        Ok(())
    }

    fn say(&self, context: &Context, text: &str) -> Result<(), HostError> {
        self.show(context, &format!("<me> {text}"));
        Ok(())
    }

    fn focus(&self, context: &Context) -> Result<(), HostError> {
        self.focused.set(context.id);
        log::info!("Focused {}", context.channel);
        Ok(())
    }

    fn flash(&self) -> Result<(), HostError> {
        log::info!("Window flash requested");
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::args().nth(1) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/irc-alerts")
}

/// Parse `[mode]nick!user@host target text` into an event. A leading
/// channel mode symbol on the nick is carried as the event's extra argument.
fn parse_message(line: &str) -> Option<(String, MessageEvent)> {
    let mut parts = line.splitn(3, ' ');
    let sender = parts.next()?;
    let target = parts.next()?;
    let text = parts.next().unwrap_or_default();

    let (nick, user_host) = match sender.split_once('!') {
        Some((nick, user_host)) => (nick, Some(user_host)),
        None => (sender, None),
    };
    let (mode, nick) = match nick.chars().next() {
        Some(c) if MODE_PREFIXES.contains(c) => (Some(c.to_string()), &nick[c.len_utf8()..]),
        _ => (None, nick),
    };
    if nick.is_empty() {
        return None;
    }
    let (kind, window) = if target.starts_with('#') || target.starts_with('&') {
        (EventKind::ChannelMessage, target)
    } else {
        (EventKind::PrivateMessage, nick)
    };
    let event = MessageEvent::new(kind, nick, text, user_host).with_extra(mode.into_iter().collect());
    Some((window.to_string(), event))
}

/// Split off the first whitespace-delimited word. The remainder keeps its
/// inner whitespace.
fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    let (word, rest) = text.split_at(end);
    Some((word, rest.trim_start()))
}

/// The raw text after the first `skip` words.
fn tail(line: &str, skip: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..skip {
        match split_word(rest) {
            Some((_, after)) => rest = after,
            None => return "",
        }
    }
    rest
}

fn not_found(names: &[String]) -> impl Iterator<Item = String> + '_ {
    names.iter().map(|name| format!("Alert '{name}' not found."))
}

fn command(
    engine: &AlertEngine,
    host: &dyn Host,
    store: &mut FileStore,
    line: &str,
) -> Result<Vec<String>, EngineError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let arg = |ix: usize| words.get(ix).copied().ok_or(EngineError::MissingArgument);
    let Some(&cmd) = words.first() else {
        return Ok(vec!["Type '/alerts help' for usage.".to_string()]);
    };
    let names = &words[1..];

    let out = match cmd.to_lowercase().as_str() {
        "list" => {
            let names = engine.names();
            if names.is_empty() {
                vec!["No alerts are currently defined.".to_string()]
            } else {
                vec![format!("{} alert(s): {}", engine.len(), names.join(", "))]
            }
        }
        "add" => {
            let name = tail(line, 1);
            if name.is_empty() {
                return Err(EngineError::MissingArgument);
            }
            engine.add(name)?;
            vec![format!("Added alert '{name}'")]
        }
        "delete" => {
            let batch = engine.delete(Selection::parse(names))?;
            not_found(&batch.not_found)
                .chain([format!("Deleted {} alert(s)", batch.value)])
                .collect()
        }
        "rename" => {
            engine.rename(arg(1)?, arg(2)?)?;
            vec![format!("Renamed '{}' to '{}'", arg(1)?, arg(2)?)]
        }
        "copy" => {
            engine.duplicate(arg(1)?, arg(2)?)?;
            vec![format!("Copied '{}' to '{}'", arg(1)?, arg(2)?)]
        }
        "before" | "after" => {
            let anchor = words.get(2).copied();
            if cmd.eq_ignore_ascii_case("before") {
                engine.move_before(arg(1)?, anchor)?;
            } else {
                engine.move_after(arg(1)?, anchor)?;
            }
            vec![engine.names().join(", ")]
        }
        "pattern" | "regex" | "sound" => {
            let setting = Setting::parse(cmd)?;
            let name = arg(1)?;
            match tail(line, 2) {
                "" => engine.show(name, &[setting])?,
                value => vec![engine.set(name, setting, value)?],
            }
        }
        "set" => set_many(engine, arg(1)?, tail(line, 2))?,
        "clear" => {
            let name = arg(1)?;
            let which = settings_list(words.get(2..).unwrap_or_default(), Setting::is_clearable)?;
            if which.is_empty() {
                return Err(EngineError::MissingArgument);
            }
            which
                .into_iter()
                .map(|setting| engine.clear(name, setting))
                .collect::<Result<Vec<_>, _>>()?
        }
        "show" => {
            let which = settings_list(words.get(2..).unwrap_or_default(), |_| true)?;
            engine.show(arg(1)?, &which)?
        }
        "enable" | "on" | "disable" | "off" | "mute" | "unmute" => {
            let selection = Selection::parse(names);
            let (batch, verb) = match cmd.to_lowercase().as_str() {
                "enable" | "on" => (engine.set_enabled(selection, true), "Enabled"),
                "disable" | "off" => (engine.set_enabled(selection, false), "Disabled"),
                "mute" => (engine.set_muted(selection, true), "Muted"),
                _ => (engine.set_muted(selection, false), "Unmuted"),
            };
            not_found(&batch.not_found)
                .chain([format!("{verb} {} alert(s)", batch.value)])
                .collect()
        }
        "preview" => vec![engine.preview(arg(1)?, true)?],
        "dump" => {
            let batch = engine.dump(Selection::parse(names))?;
            not_found(&batch.not_found).chain(batch.value).collect()
        }
        "export" => {
            let batch = engine.export(Selection::parse(names))?;
            not_found(&batch.not_found).chain([batch.value]).collect()
        }
        "share" => {
            let shared = engine.share(host, names)?;
            vec![format!("Shared {shared} alert(s)")]
        }
        "import" => {
            let report = engine.import(tail(line, 1))?;
            vec![format!(
                "Imported {} alert(s), {} failed",
                report.imported_count(),
                report.failed_count()
            )]
        }
        "colors" => irc::palette(),
        "save" => vec![format!("{} alert(s) saved", engine.save(store)?)],
        _ => vec!["Type '/alerts help' for usage.".to_string()],
    };
    Ok(out)
}

/// Parse setting names. `ALL` selects every setting accepted by `keep`.
fn settings_list(words: &[&str], keep: fn(Setting) -> bool) -> Result<Vec<Setting>, EngineError> {
    if words.iter().any(|w| w.eq_ignore_ascii_case("all")) {
        return Ok(Setting::all().iter().copied().filter(|s| keep(*s)).collect());
    }
    Ok(words
        .iter()
        .map(|w| Setting::parse(w))
        .collect::<Result<Vec<_>, _>>()?)
}

/// `set <name> <setting> <value> [<setting> <value> ...]`. Settings that
/// take the rest of the line end the list. A setting without a value is
/// shown instead.
fn set_many(engine: &AlertEngine, name: &str, mut args: &str) -> Result<Vec<String>, EngineError> {
    let mut out = Vec::new();
    while let Some((word, rest)) = split_word(args) {
        let setting = Setting::parse(word)?;
        if setting.takes_rest_of_line() {
            match rest {
                "" => out.extend(engine.show(name, &[setting])?),
                value => out.push(engine.set(name, setting, value)?),
            }
            break;
        }
        match split_word(rest) {
            Some((value, after)) => {
                out.push(engine.set(name, setting, value)?);
                args = after;
            }
            None => {
                out.extend(engine.show(name, &[setting])?);
                break;
            }
        }
    }
    Ok(out)
}

pub fn run() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let dir = config_dir();
    let config_manager = ConfigManager::new(dir.clone());
    let settings = config_manager.load();
    if let Err(e) = config_manager.save(&settings) {
        log::warn!("Could not write settings to {}: {}", dir.display(), e);
    }

    let mut store = FileStore::new(dir);
    let engine = AlertEngine::new(&settings, Box::new(LogPlayer));
    log::debug!("Sound search path: {:?}", engine.sounds().search_path());
    if let Err(e) = engine.load(&store) {
        log::error!("Failed to load alerts: {}", e);
    }

    let host = TerminalHost::new();
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(cmd) = line.strip_prefix("/alerts") {
            match command(&engine, &host, &mut store, cmd) {
                Ok(out) => out
                    .iter()
                    .for_each(|l| println!("{}", irc::strip(l, StripMask::ALL))),
                Err(e) => println!("{e}"),
            }
            continue;
        }

        let Some((window, event)) = parse_message(line) else {
            println!("Expected: [@+]nick!user@host <#channel|yournick> <text>");
            continue;
        };
        host.enter(&window);
        match engine.handle(&host, &event) {
            Ok(Outcome::Handled { .. }) => {}
            Ok(Outcome::PassThrough) => {
                let current = host.current();
                let mut args = vec![event.nick.as_str(), event.text.as_str()];
                args.extend(event.extra.iter().map(String::as_str));
                if let Err(e) = host.emit_print(&current, event.kind, &args) {
                    log::warn!("Failed to print message in {}: {}", current.channel, e);
                }
            }
            Err(e) => log::error!("Alert dispatch failed: {}", e),
        }
    }

    if let Err(e) = engine.save(&mut store) {
        log::error!("Failed to save alerts: {}", e);
    }
}
